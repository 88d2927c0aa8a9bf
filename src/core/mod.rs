pub mod error;
pub mod value;

pub use error::{MutateError, Result};
pub use value::{CellValue, DecodedValue};
