/// Table API tests
///
/// Writes through `Table` into the in-memory store and reads the cells
/// back the way a read response would carry them.
/// Run with: cargo test --test table_tests
use cellwrite::{
    Cell, DecodeOptions, DecodedValue, DeleteTarget, InMemoryTransport, MutatorConfig, RowData,
    ScriptedRound, Table, TimeRange, decode_value,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

const TABLE: &str = "follows";

fn table(transport: &InMemoryTransport) -> Table {
    Table::new(Arc::new(transport.clone()), MutatorConfig::new(TABLE)).unwrap()
}

fn read(transport: &InMemoryTransport, key: &str, family: &str, qualifier: &str) -> Option<DecodedValue> {
    transport
        .read_cell_encoded(TABLE, key.as_bytes(), family, qualifier.as_bytes())
        .unwrap()
        .map(|encoded| decode_value(&encoded, DecodeOptions::default()).unwrap())
}

#[tokio::test]
async fn test_insert_round_trips_integer_values() {
    let transport = InMemoryTransport::new();
    let table = table(&transport);

    table
        .insert([(
            "alincoln",
            RowData::new().cell("follows", "gwashington", 1),
        )])
        .await
        .unwrap();

    assert_eq!(
        read(&transport, "alincoln", "follows", "gwashington"),
        Some(DecodedValue::Integer(1))
    );
}

#[tokio::test]
async fn test_insert_text_and_raw_bytes() {
    let transport = InMemoryTransport::new();
    let table = table(&transport);

    table
        .insert([(
            "gwashington",
            RowData::new()
                .cell("bio", "name", "George Washington")
                .cell("bio", "blob", vec![0xde, 0xad]),
        )])
        .await
        .unwrap();

    assert_eq!(
        read(&transport, "gwashington", "bio", "name"),
        Some(DecodedValue::Text("George Washington".to_string()))
    );

    let raw = transport
        .read_cell_encoded(TABLE, b"gwashington", "bio", b"blob")
        .unwrap()
        .unwrap();
    assert_eq!(
        decode_value(&raw, DecodeOptions::raw()).unwrap(),
        DecodedValue::Bytes(vec![0xde, 0xad])
    );
}

#[tokio::test]
async fn test_explicit_timestamps_keep_versions() {
    let transport = InMemoryTransport::new();
    let table = table(&transport);
    let first = Utc.with_ymd_and_hms(2000, 3, 21, 0, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2001, 3, 21, 0, 0, 0).unwrap();

    table
        .insert([("r", RowData::new().cell("cf", "q", Cell::at("old", first)))])
        .await
        .unwrap();
    table
        .insert([("r", RowData::new().cell("cf", "q", Cell::at("new", second)))])
        .await
        .unwrap();

    assert_eq!(transport.cell_versions(TABLE, b"r", "cf", b"q").unwrap(), 2);
    assert_eq!(
        read(&transport, "r", "cf", "q"),
        Some(DecodedValue::Text("new".to_string()))
    );

    let range = TimeRange::between(second, Utc.with_ymd_and_hms(2002, 1, 1, 0, 0, 0).unwrap());
    table
        .delete_cells("r", [DeleteTarget::column("cf:q").within(range)])
        .await
        .unwrap();

    assert_eq!(transport.cell_versions(TABLE, b"r", "cf", b"q").unwrap(), 1);
    assert_eq!(
        read(&transport, "r", "cf", "q"),
        Some(DecodedValue::Text("old".to_string()))
    );
}

#[tokio::test]
async fn test_delete_rows_and_families() {
    let transport = InMemoryTransport::new();
    let table = table(&transport);

    table
        .insert([
            ("a", RowData::new().cell("cf", "q", 1).cell("other", "q", 2)),
            ("b", RowData::new().cell("cf", "q", 3)),
        ])
        .await
        .unwrap();

    table.delete_cells("a", ["other"]).await.unwrap();
    assert_eq!(read(&transport, "a", "other", "q"), None);
    assert_eq!(read(&transport, "a", "cf", "q"), Some(DecodedValue::Integer(1)));

    table.delete_rows(["a", "b"]).await.unwrap();
    assert!(!transport.row_exists(TABLE, b"a").unwrap());
    assert!(!transport.row_exists(TABLE, b"b").unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_retried_writes_land_once_succeeded() {
    let transport = InMemoryTransport::with_script([ScriptedRound::entry_codes([0, 14])]);
    let table = table(&transport);

    table
        .insert([
            ("a", RowData::new().cell("cf", "q", 1)),
            ("b", RowData::new().cell("cf", "q", 2)),
        ])
        .await
        .unwrap();

    assert_eq!(transport.submissions().unwrap().len(), 2);
    assert_eq!(read(&transport, "b", "cf", "q"), Some(DecodedValue::Integer(2)));
}

#[test]
fn test_table_rejects_invalid_config() {
    let transport = InMemoryTransport::new();
    let config = MutatorConfig::new(TABLE).retryable_codes([0]);
    assert!(Table::new(Arc::new(transport), config).is_err());
}

#[test]
fn test_table_name() {
    let transport = InMemoryTransport::new();
    assert_eq!(table(&transport).name(), TABLE);
}
