use metrics::counter;
use std::collections::HashSet;
use tracing::{debug, info};
use xmatch_config::shared::{MasterBuildStrategy, MatchingConfig, ProjectionConfig};

use crate::bail;
use crate::catalog::{CatalogSource, project_catalog};
use crate::crossmatch::pairwise::validate_radius;
use crate::error::{ErrorKind, XmResult};
use crate::metrics::{
    CATALOG_LABEL, XM_MASTER_APPENDED_ROWS_TOTAL, XM_MASTER_MATCHED_ROWS_TOTAL, register_metrics,
};
use crate::spatial::{SkyIndex, match_to_catalog};
use crate::types::{
    CatalogProjection, Column, ColumnTable, LATITUDE_COLUMN, LONGITUDE_COLUMN, PARTITION_COLUMN,
    PartitionKey, Position,
};

/// Row index reported for catalogs an object is absent from.
pub const ABSENT_ROW_INDEX: i64 = -1;

/// One distinct object of a [`MasterCatalog`].
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub position: Position,
    pub partition_key: PartitionKey,
    /// Row index of the object in each catalog, in catalog order.
    entries: Vec<Option<usize>>,
}

impl MasterRow {
    /// Returns the row index of the object in the `catalog`-th catalog.
    pub fn entry(&self, catalog: usize) -> Option<usize> {
        self.entries.get(catalog).copied().flatten()
    }
}

/// Counts reported for one catalog folded into a [`MasterCatalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Existing master rows the catalog matched.
    pub matched_existing: usize,
    /// Rows appended for objects of the catalog not yet in the master catalog.
    pub appended: usize,
}

/// Running union of the distinct objects of several catalogs.
///
/// Every row records, for each catalog, whether the object is present there and at which row
/// of that catalog's projection.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterCatalog {
    names: Vec<String>,
    rows: Vec<MasterRow>,
}

impl MasterCatalog {
    /// Creates an empty master catalog over the catalogs `names`.
    pub fn new<S: AsRef<str>>(names: &[S]) -> XmResult<Self> {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name.as_ref()) {
                bail!(
                    ErrorKind::ConfigError,
                    "Catalog names must be unique",
                    name.as_ref()
                );
            }
        }

        Ok(Self {
            names: names.iter().map(|name| name.as_ref().to_string()).collect(),
            rows: Vec::new(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.rows.iter().map(|row| row.position).collect()
    }

    fn catalog_index(&self, name: &str) -> XmResult<usize> {
        match self.names.iter().position(|existing| existing == name) {
            Some(index) => Ok(index),
            None => bail!(
                ErrorKind::ConfigError,
                "Catalog is not part of the master catalog",
                name
            ),
        }
    }

    /// Returns the presence flags of catalog `name`, one per row.
    pub fn presence(&self, name: &str) -> XmResult<Vec<bool>> {
        let catalog = self.catalog_index(name)?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.entry(catalog).is_some())
            .collect())
    }

    /// Returns the row indices into catalog `name`, [`ABSENT_ROW_INDEX`] where absent.
    pub fn row_indices(&self, name: &str) -> XmResult<Vec<i64>> {
        let catalog = self.catalog_index(name)?;

        Ok(self
            .rows
            .iter()
            .map(|row| {
                row.entry(catalog)
                    .map(|index| index as i64)
                    .unwrap_or(ABSENT_ROW_INDEX)
            })
            .collect())
    }

    /// Folds the projection of catalog `name` into the master catalog.
    ///
    /// Existing rows whose nearest object of the catalog lies within the radius record that
    /// object. Objects of the catalog with no existing row within the radius are appended as
    /// new rows, in catalog order. Presence recorded for other catalogs is never changed.
    pub fn fold(
        &mut self,
        name: &str,
        catalog: &CatalogProjection,
        radius_arcsec: f64,
    ) -> XmResult<FoldStats> {
        let catalog_index = self.catalog_index(name)?;
        let positions = catalog.positions();
        let master_positions = self.positions();

        let mut matched_existing = 0;
        let mut is_new = vec![true; catalog.len()];

        if !self.rows.is_empty() {
            let matches = match_to_catalog(&master_positions, &positions);
            for (row, nearest) in self.rows.iter_mut().zip(matches) {
                if let Some(index) = nearest.within(radius_arcsec) {
                    row.entries[catalog_index] = Some(index);
                    matched_existing += 1;
                }
            }

            let reverse = match_to_catalog(&positions, &master_positions);
            for (flag, nearest) in is_new.iter_mut().zip(reverse) {
                *flag = nearest.within(radius_arcsec).is_none();
            }
        }

        let mut appended = 0;
        for (index, row) in catalog.rows().iter().enumerate() {
            if !is_new[index] {
                continue;
            }

            let mut entries = vec![None; self.names.len()];
            entries[catalog_index] = Some(index);
            self.rows.push(MasterRow {
                position: row.position,
                partition_key: row.partition_key,
                entries,
            });
            appended += 1;
        }

        Ok(FoldStats {
            matched_existing,
            appended,
        })
    }

    /// Renders the master catalog as columns.
    ///
    /// Columns are `ra`, `dec` and `healpix`, one presence flag column per catalog named after
    /// it, then one `{name}_idx` row index column per catalog.
    pub fn to_column_table(&self) -> XmResult<ColumnTable> {
        let mut table = ColumnTable::new()
            .with_column(
                LONGITUDE_COLUMN,
                Column::F64(self.rows.iter().map(|row| row.position.longitude).collect()),
            )?
            .with_column(
                LATITUDE_COLUMN,
                Column::F64(self.rows.iter().map(|row| row.position.latitude).collect()),
            )?
            .with_column(
                PARTITION_COLUMN,
                Column::I64(self.rows.iter().map(|row| row.partition_key).collect()),
            )?;

        for name in &self.names {
            table = table.with_column(name.as_str(), Column::Bool(self.presence(name)?))?;
        }
        for name in &self.names {
            table = table.with_column(format!("{name}_idx"), Column::I64(self.row_indices(name)?))?;
        }

        Ok(table)
    }
}

/// Builds the master catalog of `catalogs`, named by `names` in the same order.
///
/// With [`MasterBuildStrategy::SequentialFold`] catalogs are folded one after the other with
/// [`MasterCatalog::fold`], which makes the result depend on catalog order. With
/// [`MasterBuildStrategy::GlobalClustering`] every pair of objects of different catalogs
/// within the radius is linked, and every connected group of objects becomes one row.
pub fn build_master<S: AsRef<str>>(
    catalogs: &[CatalogProjection],
    names: &[S],
    config: &MatchingConfig,
) -> XmResult<MasterCatalog> {
    register_metrics();

    if catalogs.len() != names.len() {
        bail!(
            ErrorKind::ConfigError,
            "The number of catalogs and names must be the same",
            format!("{} catalogs, {} names", catalogs.len(), names.len())
        );
    }
    validate_radius(config.radius_arcsec)?;

    let mut master = MasterCatalog::new(names)?;

    match config.master_strategy {
        MasterBuildStrategy::SequentialFold => {
            for (catalog, name) in catalogs.iter().zip(names) {
                let name = name.as_ref();
                let stats = master.fold(name, catalog, config.radius_arcsec)?;
                report_fold(name, catalog.len(), stats, master.len());
            }
        }
        MasterBuildStrategy::GlobalClustering => {
            master.rows = cluster_rows(catalogs, config.radius_arcsec);
            for (catalog_index, name) in names.iter().enumerate() {
                let present = master
                    .rows
                    .iter()
                    .filter(|row| row.entry(catalog_index).is_some())
                    .count();
                debug!(catalog = name.as_ref(), rows = present, "catalog clustered");
            }
        }
    }

    info!(
        catalogs = catalogs.len(),
        rows = master.len(),
        strategy = ?config.master_strategy,
        "master catalog built"
    );

    Ok(master)
}

/// Projects every source and builds their master catalog.
pub async fn build_master_from_sources<S, N>(
    sources: &[S],
    names: &[N],
    matching: &MatchingConfig,
    projection: &ProjectionConfig,
) -> XmResult<MasterCatalog>
where
    S: CatalogSource + Sync,
    N: AsRef<str>,
{
    if sources.len() != names.len() {
        bail!(
            ErrorKind::ConfigError,
            "The number of catalogs and names must be the same",
            format!("{} catalogs, {} names", sources.len(), names.len())
        );
    }

    let mut catalogs = Vec::with_capacity(sources.len());
    for source in sources {
        catalogs.push(project_catalog(source, projection).await?);
    }

    build_master(&catalogs, names, matching)
}

fn report_fold(name: &str, catalog_rows: usize, stats: FoldStats, master_rows: usize) {
    info!(
        catalog = name,
        catalog_rows,
        matched_existing = stats.matched_existing,
        appended = stats.appended,
        master_rows,
        "catalog folded into master catalog"
    );

    counter!(XM_MASTER_MATCHED_ROWS_TOTAL, CATALOG_LABEL => name.to_string())
        .increment(stats.matched_existing as u64);
    counter!(XM_MASTER_APPENDED_ROWS_TOTAL, CATALOG_LABEL => name.to_string())
        .increment(stats.appended as u64);
}

/// Groups the objects of all catalogs into connected components of cross-catalog matches.
///
/// Each component becomes a row positioned at its earliest member in catalog order; its entry
/// for a catalog is the lowest row of that catalog in the component. Rows are ordered by their
/// earliest member.
fn cluster_rows(catalogs: &[CatalogProjection], radius_arcsec: f64) -> Vec<MasterRow> {
    let offsets: Vec<usize> = catalogs
        .iter()
        .scan(0, |offset, catalog| {
            let start = *offset;
            *offset += catalog.len();
            Some(start)
        })
        .collect();
    let total: usize = catalogs.iter().map(CatalogProjection::len).sum();

    let mut components = UnionFind::new(total);
    for (earlier, earlier_catalog) in catalogs.iter().enumerate() {
        let index = SkyIndex::new(earlier_catalog.positions());

        for (later, later_catalog) in catalogs.iter().enumerate().skip(earlier + 1) {
            for (row, object) in later_catalog.rows().iter().enumerate() {
                for matched in index.within_radius(&object.position, radius_arcsec) {
                    components.union(offsets[earlier] + matched, offsets[later] + row);
                }
            }
        }
    }

    // Members are visited in global order, so the first member of a component is its root row.
    let mut row_of_root = vec![None; total];
    let mut rows: Vec<MasterRow> = Vec::new();
    for (catalog_index, catalog) in catalogs.iter().enumerate() {
        for (row, object) in catalog.rows().iter().enumerate() {
            let root = components.find(offsets[catalog_index] + row);
            let master_row = match row_of_root[root] {
                Some(master_row) => master_row,
                None => {
                    rows.push(MasterRow {
                        position: object.position,
                        partition_key: object.partition_key,
                        entries: vec![None; catalogs.len()],
                    });
                    row_of_root[root] = Some(rows.len() - 1);
                    rows.len() - 1
                }
            };

            let entry = &mut rows[master_row].entries[catalog_index];
            if entry.is_none() {
                *entry = Some(row);
            }
        }
    }

    rows
}

/// Disjoint sets over `0..n` with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}
