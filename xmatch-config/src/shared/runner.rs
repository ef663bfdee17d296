use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::Config;
use crate::shared::{CatalogConfig, MatchingConfig, ProjectionConfig, ValidationError};

/// Job executed by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobConfig {
    /// Cross-matches two catalogs and writes their merged records as JSON lines.
    CrossMatch {
        left: CatalogConfig,
        right: CatalogConfig,
        /// File receiving the merged records.
        output: PathBuf,
    },
    /// Builds the master catalog of several catalogs and writes it as JSON.
    MasterCatalog {
        /// Catalogs in folding order.
        catalogs: Vec<CatalogConfig>,
        /// File receiving the master catalog.
        output: PathBuf,
    },
}

impl JobConfig {
    /// Returns the catalogs read by the job, in job order.
    pub fn catalogs(&self) -> Vec<&CatalogConfig> {
        match self {
            JobConfig::CrossMatch { left, right, .. } => vec![left, right],
            JobConfig::MasterCatalog { catalogs, .. } => catalogs.iter().collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let JobConfig::MasterCatalog { catalogs, .. } = self
            && catalogs.is_empty()
        {
            return Err(ValidationError::NoCatalogs);
        }

        let mut seen = HashSet::new();
        for catalog in self.catalogs() {
            catalog.validate()?;

            if !seen.insert(catalog.name.as_str()) {
                return Err(ValidationError::DuplicateCatalogName(catalog.name.clone()));
            }
        }

        Ok(())
    }
}

/// Complete configuration of the runner binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub job: JobConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    /// File receiving the metrics of the run in the Prometheus text format.
    #[serde(default)]
    pub metrics_output: Option<PathBuf>,
}

impl RunnerConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.job.validate()?;
        self.matching.validate()?;
        self.projection.validate()
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["projection.columns"];
}
