use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How the master catalog groups objects of several catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterBuildStrategy {
    /// Folds catalogs one at a time, matching each against the master built so far.
    ///
    /// The result depends on the order of the catalogs.
    #[default]
    SequentialFold,
    /// Links every cross-catalog pair within the radius and emits one master row per
    /// connected group of objects.
    GlobalClustering,
}

/// How records coming from two record providers are paired with cross-match rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAlignment {
    /// Pairs the i-th records of both providers with the i-th row of the partition, skipping
    /// pairs whose ids disagree with the row.
    #[default]
    Positional,
    /// Buffers a partition and pairs records by id, for providers that do not preserve the
    /// requested order.
    ById,
}

/// Positional matching configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MatchingConfig {
    /// Matching radius in arcseconds; pairs must be strictly closer than this.
    #[serde(default = "default_radius_arcsec")]
    pub radius_arcsec: f64,
    #[serde(default)]
    pub master_strategy: MasterBuildStrategy,
    #[serde(default)]
    pub merge_alignment: MergeAlignment,
}

impl MatchingConfig {
    /// Default matching radius, in arcseconds.
    pub const DEFAULT_RADIUS_ARCSEC: f64 = 1.0;

    /// Returns a configuration with the given radius and default strategies.
    pub fn with_radius(radius_arcsec: f64) -> Self {
        Self {
            radius_arcsec,
            ..Self::default()
        }
    }

    /// Validates that the radius is a positive finite number.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.radius_arcsec.is_finite() || self.radius_arcsec <= 0.0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "matching.radius_arcsec".to_string(),
                constraint: format!(
                    "must be a positive finite number, got {}",
                    self.radius_arcsec
                ),
            });
        }

        Ok(())
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            radius_arcsec: default_radius_arcsec(),
            master_strategy: MasterBuildStrategy::default(),
            merge_alignment: MergeAlignment::default(),
        }
    }
}

fn default_radius_arcsec() -> f64 {
    MatchingConfig::DEFAULT_RADIUS_ARCSEC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: MatchingConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, MatchingConfig::default());
        assert_eq!(config.radius_arcsec, 1.0);
        assert_eq!(config.master_strategy, MasterBuildStrategy::SequentialFold);
        assert_eq!(config.merge_alignment, MergeAlignment::Positional);
    }

    #[test]
    fn test_snake_case_variants() {
        let config: MatchingConfig = serde_json::from_str(
            r#"{"radius_arcsec": 2.5, "master_strategy": "global_clustering", "merge_alignment": "by_id"}"#,
        )
        .unwrap();

        assert_eq!(config.radius_arcsec, 2.5);
        assert_eq!(config.master_strategy, MasterBuildStrategy::GlobalClustering);
        assert_eq!(config.merge_alignment, MergeAlignment::ById);
    }

    #[test]
    fn test_validate_radius() {
        assert!(MatchingConfig::with_radius(0.5).validate().is_ok());

        for radius in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(MatchingConfig::with_radius(radius).validate().is_err());
        }
    }
}
