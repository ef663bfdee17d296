use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// Two catalogs of the same job share a name.
    #[error("Catalog name `{0}` is used more than once")]
    DuplicateCatalogName(String),
    /// A master catalog job lists no catalogs.
    #[error("A master catalog job needs at least one catalog")]
    NoCatalogs,
}
