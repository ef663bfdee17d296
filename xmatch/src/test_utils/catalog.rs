use std::collections::BTreeMap;

use crate::catalog::MemoryCatalog;
use crate::catalog::memory::DEFAULT_RECORD_SPLIT;
use crate::types::{
    Cell, LATITUDE_COLUMN, LONGITUDE_COLUMN, OBJECT_ID_COLUMN, PARTITION_COLUMN, PartitionKey,
    ProjectionRow, Record,
};

/// Builds the full record of a synthetic object.
///
/// The record holds the projection columns plus a `flux` field derived from the id, and a
/// `{catalog}_band` field unique to the catalog so merged records show where fields came from.
pub fn object_record(catalog: &str, row: &ProjectionRow) -> Record {
    let id_cell = row
        .id
        .as_str()
        .parse::<i64>()
        .map_or_else(|_| Cell::String(row.id.to_string()), Cell::I64);
    let flux = id_cell.as_f64().unwrap_or_default() * 0.5;

    let mut record = Record::new();
    record.insert(OBJECT_ID_COLUMN, id_cell);
    record.insert(LONGITUDE_COLUMN, Cell::F64(row.position.longitude));
    record.insert(LATITUDE_COLUMN, Cell::F64(row.position.latitude));
    record.insert(PARTITION_COLUMN, Cell::I64(row.partition_key));
    record.insert("flux", Cell::F64(flux));
    record.insert(format!("{catalog}_band"), Cell::String(catalog.to_string()));
    record
}

/// Creates a memory catalog holding `rows` in the default record split.
///
/// One data file is created per partition, files in ascending partition order, rows of a file
/// in the order they are given.
pub fn memory_catalog(name: &str, rows: &[ProjectionRow]) -> MemoryCatalog {
    let mut by_partition: BTreeMap<PartitionKey, Vec<Record>> = BTreeMap::new();
    for row in rows {
        by_partition
            .entry(row.partition_key)
            .or_default()
            .push(object_record(name, row));
    }

    let mut catalog = MemoryCatalog::new(name);
    for (partition_key, records) in by_partition {
        catalog.add_file(DEFAULT_RECORD_SPLIT, partition_key, records);
    }

    catalog
}
