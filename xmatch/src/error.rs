//! Error types and result definitions for cross-matching operations.
//!
//! Every fallible operation in this crate returns [`XmResult`]. An [`XmError`] carries an
//! [`ErrorKind`] used to tell fatal configuration and invariant failures apart from the
//! recoverable failures (unreadable files, provider hiccups) that callers may choose to skip.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for cross-matching operations using [`XmError`] as the error type.
pub type XmResult<T> = Result<T, XmError>;

/// Main error type for cross-matching operations.
///
/// Holds the [`ErrorKind`] of the failure, a static description, an optional dynamic detail
/// and the call site at which it was created.
#[derive(Debug, Clone)]
pub struct XmError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Categories of errors produced while projecting, matching and merging catalogs.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    /// Invalid or inconsistent caller-supplied configuration (no files for a split,
    /// catalog and name lists of different lengths, invalid matching radius).
    ConfigError,

    // Schema Errors
    /// A catalog is missing columns required for the projection.
    SchemaError,

    // Invariant Errors
    /// An internal consistency check of the matching algorithm failed.
    InvariantViolation,

    // Data Errors
    /// Values could not be converted to the expected type.
    ConversionError,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // Provider Errors
    /// A catalog or record provider failed for a reason of its own.
    SourceError,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns `true` when an error of this kind only affects the file being read.
    ///
    /// The catalog projector drops files failing with such an error instead of aborting.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            ErrorKind::IoError | ErrorKind::DeserializationError | ErrorKind::SourceError
        )
    }
}

impl XmError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of the error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the backtrace captured when the error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns the call site at which this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        XmError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

/// Errors compare equal when they share the same kind.
impl PartialEq for XmError {
    fn eq(&self, other: &XmError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for XmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail() {
            write_indented(f, "Detail:", detail)?;
        }

        let backtrace = self.backtrace.to_string();
        if !backtrace.trim().is_empty() {
            write_indented(f, "Backtrace:", &backtrace)?;
        }

        Ok(())
    }
}

/// Writes a labelled block with each line indented under the label.
fn write_indented(f: &mut fmt::Formatter<'_>, label: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {label} <empty>");
    }

    write!(f, "\n  {label}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for XmError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates an [`XmError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for XmError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> XmError {
        XmError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`XmError`] from an error kind, static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for XmError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> XmError {
        XmError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for XmError {
    #[track_caller]
    fn from(err: std::io::Error) -> XmError {
        let detail = err.to_string();
        XmError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps [`serde_json::Error`] to [`ErrorKind::IoError`] or [`ErrorKind::DeserializationError`]
/// depending on its category.
impl From<serde_json::Error> for XmError {
    #[track_caller]
    fn from(err: serde_json::Error) -> XmError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        XmError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
