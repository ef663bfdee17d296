use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use xmatch::error::XmError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the runner binary.
///
/// Wraps [`XmError`] for failures of the matching pipeline and provides variants for the
/// configuration and output side of a run.
#[derive(Debug)]
pub enum RunnerError {
    /// Cross-matching error.
    Xmatch(XmError),
    /// Configuration or telemetry setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error while writing outputs.
    Io(std::io::Error, CapturedBacktrace),
    /// Outputs could not be serialized.
    Serialization(serde_json::Error, CapturedBacktrace),
}

impl RunnerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Xmatch(_) => "cross-match error",
            RunnerError::Config(_, _) => "configuration error",
            RunnerError::Io(_, _) => "i/o error",
            RunnerError::Serialization(_, _) => "serialization error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Xmatch(err) => Some(err.backtrace()),
            RunnerError::Config(_, cb) => Some(&cb.0),
            RunnerError::Io(_, cb) => Some(&cb.0),
            RunnerError::Serialization(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("runner failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Xmatch(err) => write!(f, "{err}"),
            RunnerError::Config(source, _) => write!(f, "configuration error: {source}"),
            RunnerError::Io(source, _) => write!(f, "i/o error: {source}"),
            RunnerError::Serialization(source, _) => write!(f, "serialization error: {source}"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunnerError::Xmatch(err) => err.source(),
            RunnerError::Config(source, _) => Some(source.as_ref()),
            RunnerError::Io(source, _) => Some(source),
            RunnerError::Serialization(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(err: serde_json::Error) -> Self {
        RunnerError::Serialization(err, CapturedBacktrace::capture())
    }
}

impl From<XmError> for RunnerError {
    fn from(err: XmError) -> Self {
        RunnerError::Xmatch(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmatch::error::ErrorKind;

    #[test]
    fn test_report_lists_category_and_error() {
        let err = RunnerError::from(XmError::from((
            ErrorKind::ConfigError,
            "Matching radius must be a positive finite number",
        )));

        let report = err.render_report();

        assert!(report.starts_with("runner failed\n"));
        assert!(report.contains("category: cross-match error\n"));
        assert!(report.contains("Matching radius must be a positive finite number"));
    }

    #[test]
    fn test_report_lists_source_of_cross_match_error() {
        let err = RunnerError::from(
            XmError::from((ErrorKind::SourceError, "Record provider failed"))
                .with_source(std::io::Error::other("connection reset")),
        );

        let report = err.render_report();

        assert!(report.contains("Record provider failed"));
        assert!(report.contains("cause 1: connection reset\n"));
    }

    #[test]
    fn test_report_lists_causes() {
        let err = RunnerError::config(std::io::Error::other("missing file"));

        let report = err.render_report();

        assert!(report.contains("error: configuration error: missing file\n"));
        assert!(report.contains("cause 1: missing file\n"));
    }
}
