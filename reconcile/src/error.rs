//! Error types and result definitions for reconciliation sessions.
//!
//! [`SyncError`] carries a classified [`ErrorKind`], a static description, optional dynamic
//! detail and the originating error. Several errors can be aggregated into one, which is how a
//! session reports every schema mismatch it found before giving up.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures, grouped by the layer that raises them.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Schema Errors
    SchemaMismatch,
    MissingTable,

    // Protocol Errors
    ProtocolViolation,
    UnexpectedCommand,
    UnsupportedProtocolVersion,
    UnsupportedHashAlgorithm,
    FrameTooLarge,
    ConnectionClosed,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // Data Errors
    DataAnomaly,
    UniqueViolation,
    InvalidKey,

    // State & Configuration Errors
    InvalidState,
    ConfigError,
    StoreError,

    // Unknown / Uncategorized
    Unknown,

    // Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    WithFailpoint,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description, or `None` for aggregated errors.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the dynamic detail, or the first available one for aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the details of every contained error, in order.
    pub fn details(&self) -> Vec<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref().into_iter().collect(),
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.details()).collect()
            }
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                let rendered_backtrace = payload.backtrace.to_string();
                if !rendered_backtrace.trim().is_empty() {
                    write!(f, "\n  Backtrace:")?;
                    for line in rendered_backtrace.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    errors.len(),
                    if errors.len() == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();
        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let (kind, description) = match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => {
                (ErrorKind::ConnectionClosed, "Peer closed the connection")
            }
            _ => (ErrorKind::IoError, "I/O operation failed"),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rmp_serde::encode::Error> for SyncError {
    #[track_caller]
    fn from(err: rmp_serde::encode::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("MessagePack serialization failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rmp_serde::decode::Error> for SyncError {
    #[track_caller]
    fn from(err: rmp_serde::decode::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::DeserializationError,
            Cow::Borrowed("MessagePack deserialization failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rmp::encode::ValueWriteError> for SyncError {
    #[track_caller]
    fn from(err: rmp::encode::ValueWriteError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("Row encoding failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rmp::decode::ValueReadError> for SyncError {
    #[track_caller]
    fn from(err: rmp::decode::ValueReadError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::DeserializationError,
            Cow::Borrowed("Malformed command frame"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<rmp::decode::NumValueReadError> for SyncError {
    #[track_caller]
    fn from(err: rmp::decode::NumValueReadError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::DeserializationError,
            Cow::Borrowed("Malformed command verb"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<config::shared::ValidationError> for SyncError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid sync configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
