/// Stable classification for every error this layer can surface.
///
/// The string codes travel across the guest/host boundary unchanged, so
/// callers on either side can branch on capability (`Unsupported`) or
/// retryability (`Connectivity`) without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Backend unreachable. Retryable by the caller, never retried here.
    Connectivity,
    /// A value could not be represented in the wire format. Fatal to the call.
    Encoding,
    /// Contract violation between guest and host (malformed reply, arity
    /// mismatch, buffer misuse). Fatal and logged.
    Protocol,
    /// The active backend has no implementation for this operation.
    Unsupported,
    /// Zero rows where one was expected, or a missing object/bucket.
    NotFound,
    /// A transaction handle used after commit or rollback.
    InvalidHandle,
    /// The backend's own failure (malformed SQL, constraint violation, ...).
    Backend,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "SKIFF_ERROR_CONNECTIVITY",
            Self::Encoding => "SKIFF_ERROR_ENCODING",
            Self::Protocol => "SKIFF_ERROR_PROTOCOL",
            Self::Unsupported => "SKIFF_ERROR_UNSUPPORTED",
            Self::NotFound => "SKIFF_ERROR_NOT_FOUND",
            Self::InvalidHandle => "SKIFF_ERROR_INVALID_HANDLE",
            Self::Backend => "SKIFF_ERROR_BACKEND",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == code)
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Connectivity,
            Self::Encoding,
            Self::Protocol,
            Self::Unsupported,
            Self::NotFound,
            Self::InvalidHandle,
            Self::Backend,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn unsupported(operation: &str, backend: &str) -> Self {
        Self::new(
            ErrorKind::Unsupported,
            format!("{operation} is not supported by the {backend} backend"),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidHandle, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Prepends adapter/operation context while preserving the original kind.
    pub fn context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use std::collections::HashSet;

    #[test]
    fn error_code_strings_are_unique() {
        let mut seen = HashSet::new();
        for kind in ErrorKind::all() {
            let inserted = seen.insert(kind.as_str());
            assert!(inserted, "duplicate error code string: {}", kind.as_str());
        }
    }

    #[test]
    fn codes_round_trip_through_from_code() {
        for kind in ErrorKind::all() {
            assert_eq!(ErrorKind::from_code(kind.as_str()), Some(*kind));
        }
        assert_eq!(ErrorKind::from_code("SKIFF_ERROR_NOPE"), None);
    }

    #[test]
    fn context_preserves_kind() {
        let err = Error::not_found("no rows in result set").context("bridge query_row");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "SKIFF_ERROR_NOT_FOUND: bridge query_row: no rows in result set"
        );
    }

    #[test]
    fn unsupported_is_stable_across_invocations() {
        let first = Error::unsupported("presigned_url", "bridge");
        let second = Error::unsupported("presigned_url", "bridge");
        assert_eq!(first, second);
    }
}
