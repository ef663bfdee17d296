use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, XmResult};
use crate::types::{Cell, Column, ColumnTable, Position, Record};

/// Column holding object identifiers.
pub const OBJECT_ID_COLUMN: &str = "object_id";

/// Column some catalogs use instead of [`OBJECT_ID_COLUMN`].
pub const SOURCE_ID_COLUMN: &str = "source_id";

/// Column holding the longitude (right ascension) in degrees.
pub const LONGITUDE_COLUMN: &str = "ra";

/// Column holding the latitude (declination) in degrees.
pub const LATITUDE_COLUMN: &str = "dec";

/// Column holding the coarse spatial partition index.
pub const PARTITION_COLUMN: &str = "healpix";

/// Columns extracted from a catalog to build its [`CatalogProjection`].
pub const PROJECTION_COLUMNS: [&str; 4] = [
    OBJECT_ID_COLUMN,
    LONGITUDE_COLUMN,
    LATITUDE_COLUMN,
    PARTITION_COLUMN,
];

/// Coarse spatial partition index, opaque to this crate.
pub type PartitionKey = i64;

/// Identifier of an object inside one catalog.
///
/// Catalogs use integer or string identifiers; both are normalized to their string rendering
/// so that alignment checks can compare ids coming from different providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `other` appears inside this id.
    ///
    /// Record providers may decorate identifiers (for instance with a partition prefix), so
    /// alignment is checked by containment rather than equality.
    pub fn contains(&self, other: &ObjectId) -> bool {
        self.0.contains(other.as_str())
    }

    /// Returns `true` if `other` appears inside this id with no alphanumeric character
    /// directly before or after it.
    ///
    /// `p-11` contains `1` but only holds `11` as a delimited token.
    pub fn contains_delimited(&self, other: &ObjectId) -> bool {
        let (id, token) = (self.as_str(), other.as_str());
        if token.is_empty() {
            return false;
        }

        id.char_indices()
            .filter(|(start, _)| id[*start..].starts_with(token))
            .any(|(start, _)| {
                let before = id[..start].chars().next_back();
                let after = id[start + token.len()..].chars().next();

                !before.is_some_and(char::is_alphanumeric)
                    && !after.is_some_and(char::is_alphanumeric)
            })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ObjectId {
    fn from(value: i64) -> Self {
        ObjectId(value.to_string())
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        ObjectId(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        ObjectId(value)
    }
}

/// One row of a [`CatalogProjection`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRow {
    pub id: ObjectId,
    pub position: Position,
    pub partition_key: PartitionKey,
    /// Values of the configured columns read along with the projection columns.
    pub extra: Record,
}

impl ProjectionRow {
    pub fn new(id: impl Into<ObjectId>, position: Position, partition_key: PartitionKey) -> Self {
        Self {
            id: id.into(),
            position,
            partition_key,
            extra: Record::new(),
        }
    }

    pub fn with_extra(mut self, column: impl Into<String>, value: Cell) -> Self {
        self.extra.insert(column, value);
        self
    }
}

/// Minimal positional view of a catalog: one row per object, in catalog order.
///
/// Row indices of a projection are the indices reported by the matchers and stored in the
/// master catalog, so a projection is never reordered once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProjection {
    name: String,
    extra_columns: Vec<String>,
    rows: Vec<ProjectionRow>,
}

impl CatalogProjection {
    /// Creates a projection whose extra columns are those of its first row.
    pub fn new(name: impl Into<String>, rows: Vec<ProjectionRow>) -> Self {
        let extra_columns = rows
            .first()
            .map(|row| row.extra.keys().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            name: name.into(),
            extra_columns,
            rows,
        }
    }

    /// Builds a projection from a table holding the [`PROJECTION_COLUMNS`].
    ///
    /// Every other column of the table, `source_id` aside, is kept in the rows' extra values.
    /// An empty table yields an empty projection whatever its columns.
    pub fn from_columns(name: impl Into<String>, table: &ColumnTable) -> XmResult<Self> {
        let name = name.into();
        if table.num_rows() == 0 {
            return Ok(Self::new(name, Vec::new()));
        }

        let extra_columns: Vec<(&str, &Column)> = table
            .column_names()
            .into_iter()
            .filter(|column| !PROJECTION_COLUMNS.contains(column) && *column != SOURCE_ID_COLUMN)
            .filter_map(|column| table.column(column).map(|values| (column, values)))
            .collect();

        let ids = required_column(table, OBJECT_ID_COLUMN)?;
        let longitudes = required_column(table, LONGITUDE_COLUMN)?;
        let latitudes = required_column(table, LATITUDE_COLUMN)?;
        let partitions = required_column(table, PARTITION_COLUMN)?;

        let mut rows = Vec::with_capacity(table.num_rows());
        for index in 0..table.num_rows() {
            let Some(id) = ids.cell(index).as_object_id() else {
                bail!(
                    ErrorKind::ConversionError,
                    "Object id column holds a non identifier value",
                    format!("catalog `{name}`, row {index}")
                );
            };
            let (Some(longitude), Some(latitude)) = (
                longitudes.cell(index).as_f64(),
                latitudes.cell(index).as_f64(),
            ) else {
                bail!(
                    ErrorKind::ConversionError,
                    "Coordinate columns hold non numeric values",
                    format!("catalog `{name}`, row {index}")
                );
            };
            let Some(partition_key) = partitions.cell(index).as_i64() else {
                bail!(
                    ErrorKind::ConversionError,
                    "Partition column holds a non integer value",
                    format!("catalog `{name}`, row {index}")
                );
            };

            let mut extra = Record::new();
            for (column, values) in &extra_columns {
                extra.insert(*column, values.cell(index));
            }

            rows.push(ProjectionRow {
                id,
                position: Position::new(longitude, latitude),
                partition_key,
                extra,
            });
        }

        Ok(Self {
            name,
            extra_columns: extra_columns
                .into_iter()
                .map(|(column, _)| column.to_string())
                .collect(),
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the names of the extra columns carried by the rows, in table order.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn rows(&self) -> &[ProjectionRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&ProjectionRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the positions of all rows, in row order.
    pub fn positions(&self) -> Vec<Position> {
        self.rows.iter().map(|row| row.position).collect()
    }
}

fn required_column<'a>(table: &'a ColumnTable, name: &str) -> XmResult<&'a Column> {
    match table.column(name) {
        Some(column) => Ok(column),
        None => bail!(
            ErrorKind::SchemaError,
            "Catalog table is missing a projection column",
            name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_table() -> ColumnTable {
        ColumnTable::new()
            .with_column(OBJECT_ID_COLUMN, Column::I64(vec![10, 11]))
            .and_then(|t| t.with_column(LONGITUDE_COLUMN, Column::F64(vec![1.0, 2.0])))
            .and_then(|t| t.with_column(LATITUDE_COLUMN, Column::F64(vec![-1.0, -2.0])))
            .and_then(|t| t.with_column(PARTITION_COLUMN, Column::I64(vec![7, 8])))
            .unwrap()
    }

    #[test]
    fn test_from_columns() {
        let projection = CatalogProjection::from_columns("sdss", &projection_table()).unwrap();

        assert_eq!(projection.name(), "sdss");
        assert_eq!(projection.len(), 2);
        assert_eq!(
            projection.row(1),
            Some(&ProjectionRow::new(11, Position::new(2.0, -2.0), 8))
        );
    }

    #[test]
    fn test_from_columns_keeps_extra_columns() {
        let table = projection_table()
            .with_column("flux", Column::F64(vec![0.5, 1.5]))
            .and_then(|t| t.with_column(SOURCE_ID_COLUMN, Column::I64(vec![10, 11])))
            .unwrap();

        let projection = CatalogProjection::from_columns("sdss", &table).unwrap();

        assert_eq!(projection.extra_columns(), ["flux".to_string()]);
        assert_eq!(
            projection.row(1),
            Some(
                &ProjectionRow::new(11, Position::new(2.0, -2.0), 8)
                    .with_extra("flux", Cell::F64(1.5))
            )
        );
    }

    #[test]
    fn test_from_columns_missing_column() {
        let table = ColumnTable::new()
            .with_column(OBJECT_ID_COLUMN, Column::I64(vec![1]))
            .unwrap();

        let err = CatalogProjection::from_columns("sdss", &table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaError);
    }

    #[test]
    fn test_from_empty_table() {
        let projection = CatalogProjection::from_columns("sdss", &ColumnTable::new()).unwrap();
        assert!(projection.is_empty());
    }

    #[test]
    fn test_object_id_containment() {
        let decorated = ObjectId::from("healpix_12_4567");

        assert!(decorated.contains(&ObjectId::from(4567)));
        assert!(!decorated.contains(&ObjectId::from(4568)));
    }

    #[test]
    fn test_object_id_delimited_containment() {
        let decorated = ObjectId::from("p-11");

        assert!(decorated.contains(&ObjectId::from(1)));
        assert!(!decorated.contains_delimited(&ObjectId::from(1)));
        assert!(decorated.contains_delimited(&ObjectId::from(11)));
        assert!(ObjectId::from("healpix_12_4567").contains_delimited(&ObjectId::from(12)));
        assert!(ObjectId::from("111-1").contains_delimited(&ObjectId::from(1)));
        assert!(!ObjectId::from("7").contains_delimited(&ObjectId::from("")));
    }
}
