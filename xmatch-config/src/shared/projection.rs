use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of the catalog projection step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectionConfig {
    /// Data split whose files are read.
    #[serde(default = "default_split")]
    pub split: String,
    /// Number of catalog files read concurrently.
    #[serde(default = "default_num_proc")]
    pub num_proc: usize,
    /// Columns extracted from every catalog file.
    ///
    /// Columns other than the position and identifier columns are carried as extra columns
    /// into the cross-match table.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

impl ProjectionConfig {
    pub const DEFAULT_SPLIT: &'static str = "train";

    pub const DEFAULT_NUM_PROC: usize = 1;

    pub const DEFAULT_COLUMNS: [&'static str; 4] = ["object_id", "ra", "dec", "healpix"];

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_proc == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "projection.num_proc".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.split.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "projection.split".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            split: default_split(),
            num_proc: default_num_proc(),
            columns: default_columns(),
        }
    }
}

fn default_split() -> String {
    ProjectionConfig::DEFAULT_SPLIT.to_string()
}

fn default_num_proc() -> usize {
    ProjectionConfig::DEFAULT_NUM_PROC
}

fn default_columns() -> Vec<String> {
    ProjectionConfig::DEFAULT_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .collect()
}
