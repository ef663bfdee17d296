use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, XmResult};
use crate::types::{Cell, Record};

/// A typed column of a [`ColumnTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(Vec<bool>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    String(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Bool(values) => values.len(),
            Column::I64(values) => values.len(),
            Column::F64(values) => values.len(),
            Column::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value at `index` as a [`Cell`], or [`Cell::Null`] when out of bounds.
    pub fn cell(&self, index: usize) -> Cell {
        match self {
            Column::Bool(values) => values.get(index).map(|v| Cell::Bool(*v)),
            Column::I64(values) => values.get(index).map(|v| Cell::I64(*v)),
            Column::F64(values) => values.get(index).map(|v| Cell::F64(*v)),
            Column::String(values) => values.get(index).map(|v| Cell::String(v.clone())),
        }
        .unwrap_or(Cell::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Column::Bool(_) => "bool",
            Column::I64(_) => "i64",
            Column::F64(_) => "f64",
            Column::String(_) => "string",
        }
    }

    /// Appends the values of `other`, widening integers to floats when the two disagree.
    fn append(&mut self, other: Column) -> Result<(), Column> {
        if let (Column::I64(values), Column::F64(_)) = (&*self, &other) {
            *self = Column::F64(values.iter().map(|v| *v as f64).collect());
        }

        match (self, other) {
            (Column::Bool(a), Column::Bool(b)) => a.extend(b),
            (Column::I64(a), Column::I64(b)) => a.extend(b),
            (Column::F64(a), Column::F64(b)) => a.extend(b),
            (Column::F64(a), Column::I64(b)) => a.extend(b.into_iter().map(|v| v as f64)),
            (Column::String(a), Column::String(b)) => a.extend(b),
            (_, other) => return Err(other),
        }

        Ok(())
    }

    /// Builds a column from cells, picking the narrowest type able to hold all of them.
    pub(crate) fn from_cells(name: &str, cells: Vec<Cell>) -> XmResult<Column> {
        if cells.iter().all(|c| matches!(c, Cell::Bool(_))) && !cells.is_empty() {
            return Ok(Column::Bool(
                cells
                    .into_iter()
                    .filter_map(|c| match c {
                        Cell::Bool(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            ));
        }

        if cells.iter().all(|c| matches!(c, Cell::I64(_))) {
            return Ok(Column::I64(cells.iter().filter_map(Cell::as_i64).collect()));
        }

        if cells.iter().all(|c| c.as_f64().is_some()) {
            return Ok(Column::F64(cells.iter().filter_map(Cell::as_f64).collect()));
        }

        if cells.iter().all(|c| matches!(c, Cell::String(_))) {
            return Ok(Column::String(
                cells
                    .into_iter()
                    .filter_map(|c| match c {
                        Cell::String(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            ));
        }

        bail!(
            ErrorKind::ConversionError,
            "Column values cannot be represented with a single scalar type",
            name
        );
    }
}

/// A table of equally long, named columns.
///
/// This is what a catalog provider returns when asked for a subset of a catalog's columns;
/// column order follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    columns: Vec<(String, Column)>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, replacing any existing column of the same name.
    ///
    /// Fails if the column length differs from the table's row count.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> XmResult<Self> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            bail!(
                ErrorKind::SchemaError,
                "Column length differs from the table row count",
                format!(
                    "column `{name}` has {} rows, table has {}",
                    column.len(),
                    self.num_rows()
                )
            );
        }

        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }

        Ok(self)
    }

    /// Builds a table holding the `columns` found in `records`.
    ///
    /// A requested column is included only if every record has a non-null value for it, which
    /// lets callers detect missing columns with [`ColumnTable::has_column`].
    pub fn from_records(records: &[Record], columns: &[&str]) -> XmResult<Self> {
        let mut table = ColumnTable::new();
        if records.is_empty() {
            return Ok(table);
        }

        for &name in columns {
            let cells: Option<Vec<Cell>> = records
                .iter()
                .map(|record| match record.get(name) {
                    None | Some(Cell::Null) => None,
                    Some(cell) => Some(cell.clone()),
                })
                .collect();

            if let Some(cells) = cells {
                table = table.with_column(name, Column::from_cells(name, cells)?)?;
            }
        }

        Ok(table)
    }

    /// Concatenates tables row-wise.
    ///
    /// All tables must expose the same column names; integer columns are widened to floats when
    /// another table stores the same column as floats.
    pub fn vstack(tables: Vec<ColumnTable>) -> XmResult<ColumnTable> {
        let mut tables = tables.into_iter();
        let Some(mut stacked) = tables.next() else {
            return Ok(ColumnTable::new());
        };

        for table in tables {
            if table.column_names() != stacked.column_names() {
                bail!(
                    ErrorKind::SchemaError,
                    "Cannot stack tables with different columns",
                    format!(
                        "expected {:?}, got {:?}",
                        stacked.column_names(),
                        table.column_names()
                    )
                );
            }

            for ((name, target), (_, column)) in stacked.columns.iter_mut().zip(table.columns) {
                if let Err(column) = target.append(column) {
                    bail!(
                        ErrorKind::SchemaError,
                        "Cannot stack columns of different types",
                        format!(
                            "column `{name}` is {} in one file and {} in another",
                            target.type_name(),
                            column.type_name()
                        )
                    );
                }
            }
        }

        Ok(stacked)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, column)| column)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Removes and returns the column named `name`.
    pub fn take_column(&mut self, name: &str) -> Option<Column> {
        let index = self.columns.iter().position(|(existing, _)| existing == name)?;
        Some(self.columns.remove(index).1)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Renders the table as a list of JSON objects, one per row.
    pub fn to_json_rows(&self) -> Vec<Value> {
        (0..self.num_rows())
            .map(|index| {
                let row: Map<String, Value> = self
                    .columns
                    .iter()
                    .map(|(name, column)| (name.clone(), column.cell(index).to_json()))
                    .collect();
                Value::Object(row)
            })
            .collect()
    }
}
