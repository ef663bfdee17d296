use crate::error::XmResult;
use crate::merge::merge_keys;
use crate::types::{
    Cell, Column, ColumnTable, ObjectId, PROJECTION_COLUMNS, PartitionKey, Position,
    ProjectionRow,
};

/// A matched pair of objects of two catalogs.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatchRow {
    /// Identifier of the pair, the id of the left object.
    pub id: ObjectId,
    /// Midpoint of both positions.
    pub position: Position,
    /// Partition shared by both objects.
    pub partition_key: PartitionKey,
    pub left: ProjectionRow,
    /// Row index of the left object in its projection.
    pub left_index: usize,
    pub right: ProjectionRow,
    /// Row index of the right object in its projection.
    pub right_index: usize,
    pub separation_arcsec: f64,
}

/// Rows of a [`CrossMatchTable`] sharing one partition, in ascending left row index.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatchGroup {
    pub partition_key: PartitionKey,
    pub rows: Vec<CrossMatchRow>,
}

impl CrossMatchGroup {
    /// Returns the left ids of the group, in row order.
    pub fn left_ids(&self) -> Vec<ObjectId> {
        self.rows.iter().map(|row| row.left.id.clone()).collect()
    }

    /// Returns the right ids of the group, in row order.
    pub fn right_ids(&self) -> Vec<ObjectId> {
        self.rows.iter().map(|row| row.right.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Counts reported by a pairwise cross-match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossMatchStats {
    /// Pairs within the matching radius.
    pub initial_matches: usize,
    /// Pairs discarded because both objects fall in different partitions.
    pub boundary_losses: usize,
    /// Pairs kept in the table.
    pub final_matches: usize,
}

/// Matched pairs of two catalogs, grouped by partition.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatchTable {
    left_name: String,
    right_name: String,
    /// Extra projection columns of the left catalog.
    left_extra: Vec<String>,
    right_extra: Vec<String>,
    groups: Vec<CrossMatchGroup>,
    stats: CrossMatchStats,
}

impl CrossMatchTable {
    pub(crate) fn new(
        left_name: String,
        left_extra: Vec<String>,
        right_name: String,
        right_extra: Vec<String>,
        groups: Vec<CrossMatchGroup>,
        stats: CrossMatchStats,
    ) -> Self {
        Self {
            left_name,
            right_name,
            left_extra,
            right_extra,
            groups,
            stats,
        }
    }

    pub fn left_name(&self) -> &str {
        &self.left_name
    }

    pub fn right_name(&self) -> &str {
        &self.right_name
    }

    pub fn groups(&self) -> &[CrossMatchGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<CrossMatchGroup> {
        self.groups
    }

    pub fn stats(&self) -> CrossMatchStats {
        self.stats
    }

    /// Returns the total number of rows over all groups.
    pub fn num_rows(&self) -> usize {
        self.groups.iter().map(CrossMatchGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Iterates over all rows, group after group.
    pub fn rows(&self) -> impl Iterator<Item = &CrossMatchRow> {
        self.groups.iter().flat_map(|group| group.rows.iter())
    }

    /// Returns the columns of [`CrossMatchTable::to_column_table`].
    ///
    /// The derived pair columns come first, followed by the projection and extra columns of
    /// both catalogs, prefixed with the catalog name when both catalogs share them.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = PROJECTION_COLUMNS.iter().map(|c| c.to_string()).collect();
        names.extend(merge_keys(
            &self.left_name,
            &side_column_names(&self.left_extra),
            &self.right_name,
            &side_column_names(&self.right_extra),
        ));

        names
    }

    /// Renders the table as columns, rows ordered group after group.
    pub fn to_column_table(&self) -> XmResult<ColumnTable> {
        let names = self.column_names();

        let mut columns = vec![
            Column::String(self.rows().map(|row| row.id.to_string()).collect()),
            Column::F64(self.rows().map(|row| row.position.longitude).collect()),
            Column::F64(self.rows().map(|row| row.position.latitude).collect()),
            Column::I64(self.rows().map(|row| row.partition_key).collect()),
        ];
        columns.extend(self.side_columns(&self.left_extra, |row| &row.left)?);
        columns.extend(self.side_columns(&self.right_extra, |row| &row.right)?);

        let mut table = ColumnTable::new();
        for (name, column) in names.into_iter().zip(columns) {
            table = table.with_column(name, column)?;
        }

        Ok(table)
    }

    /// Returns the projection columns of one side followed by its `extra` columns.
    fn side_columns<F>(&self, extra: &[String], side: F) -> XmResult<Vec<Column>>
    where
        F: Fn(&CrossMatchRow) -> &ProjectionRow,
    {
        let mut columns = vec![
            Column::String(self.rows().map(|row| side(row).id.to_string()).collect()),
            Column::F64(self.rows().map(|row| side(row).position.longitude).collect()),
            Column::F64(self.rows().map(|row| side(row).position.latitude).collect()),
            Column::I64(self.rows().map(|row| side(row).partition_key).collect()),
        ];

        for name in extra {
            let cells = self
                .rows()
                .map(|row| side(row).extra.get(name).cloned().unwrap_or(Cell::Null))
                .collect();
            columns.push(Column::from_cells(name, cells)?);
        }

        Ok(columns)
    }

    /// Returns one column of [`CrossMatchTable::to_column_table`], such as `{name}_object_id`.
    pub fn column(&self, name: &str) -> XmResult<Option<Column>> {
        Ok(self.to_column_table()?.take_column(name))
    }
}

fn side_column_names(extra: &[String]) -> Vec<&str> {
    let mut names: Vec<&str> = PROJECTION_COLUMNS.to_vec();
    names.extend(extra.iter().map(String::as_str));
    names
}
