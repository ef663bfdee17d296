//! Shorthands for building [`crate::error::XmError`] values at the call site.

/// Builds an [`crate::error::XmError`] from a kind and a static description.
///
/// A third argument is rendered with `to_string` and kept as the error detail. A trailing
/// `source: err` attaches the originating error.
///
/// ```ignore
/// xm_error!(ErrorKind::SchemaError, "Catalog table is missing a projection column", "ra");
/// ```
#[macro_export]
macro_rules! xm_error {
    ($kind:expr, $desc:expr $(, source: $source:expr)? $(,)?) => {
        $crate::error::XmError::from(($kind, $desc))
            $(.with_source($source))?
    };
    ($kind:expr, $desc:expr, $detail:expr $(, source: $source:expr)? $(,)?) => {
        $crate::error::XmError::from(($kind, $desc, $detail.to_string()))
            $(.with_source($source))?
    };
}

/// Returns early with the [`crate::error::XmError`] built by [`xm_error!`] from the same
/// arguments.
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::xm_error!($($args)+))
    };
}
