use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Location of a catalog stored as JSON files.
///
/// Files are expected under `{root}/{split}/`, partition files carrying `healpix={key}` in
/// their path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogConfig {
    /// Catalog name, used to prefix colliding columns and fields.
    pub name: String,
    /// Root directory of the catalog.
    pub root: PathBuf,
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "catalog.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
