use crate::batch::BatchMutator;
use crate::config::MutatorConfig;
use crate::core::{CellValue, Result};
use crate::mutation::{DeleteTarget, Mutation, RowData};
use crate::transport::MutateRowsTransport;
use std::sync::Arc;

/// Write handle for one table.
///
/// # Examples
///
/// ```
/// use cellwrite::{InMemoryTransport, MutatorConfig, RowData, Table};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> cellwrite::Result<()> {
/// let transport = Arc::new(InMemoryTransport::new());
/// let table = Table::new(transport.clone(), MutatorConfig::new("follows"))?;
///
/// table
///     .insert([("gwashington", RowData::new().cell("follows", "jadams", 1))])
///     .await?;
///
/// assert!(transport.row_exists("follows", b"gwashington")?);
/// # Ok(())
/// # }
/// ```
pub struct Table {
    mutator: BatchMutator,
}

impl Table {
    pub fn new(transport: Arc<dyn MutateRowsTransport>, config: MutatorConfig) -> Result<Self> {
        Ok(Self {
            mutator: BatchMutator::new(transport, config)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.mutator.config().table_name
    }

    pub fn mutator(&self) -> &BatchMutator {
        &self.mutator
    }

    pub async fn mutate(&self, mutations: Vec<Mutation>) -> Result<()> {
        self.mutator.mutate(mutations).await
    }

    pub async fn mutate_with_retries(&self, mutations: Vec<Mutation>, max_retries: u32) -> Result<()> {
        self.mutator.mutate_with_retries(mutations, max_retries).await
    }

    /// Writes cells for each `(row key, data)` pair.
    pub async fn insert<K: Into<CellValue>>(
        &self,
        rows: impl IntoIterator<Item = (K, RowData)>,
    ) -> Result<()> {
        let mutations = rows
            .into_iter()
            .map(|(key, data)| Mutation::insert(key, data))
            .collect();
        self.mutate(mutations).await
    }

    /// Removes entire rows.
    pub async fn delete_rows<K: Into<CellValue>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<()> {
        let mutations = keys.into_iter().map(Mutation::delete_row).collect();
        self.mutate(mutations).await
    }

    /// Removes columns or families from a single row.
    pub async fn delete_cells<T: Into<DeleteTarget>>(
        &self,
        key: impl Into<CellValue>,
        targets: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        self.mutate(vec![Mutation::delete_cells(key, targets)]).await
    }
}
