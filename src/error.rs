//! Error propagation tools

use std::{
    fmt,
    io::{Error as IoError, ErrorKind},
    error::Error as StdError
};

use hyper::StatusCode;

pub(crate) type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

/// Generic harness error.
///
/// The harness defines no failure modes of its own: every [`Error`] wraps a
/// collaborator failure (router resolution, request building, transport)
/// unchanged, together with the HTTP status code that failure corresponds to.
#[derive(Debug)]
pub struct Error {
    /// HTTP status code
    pub status: StatusCode,

    /// Inner error object
    pub(crate) inner: BoxError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Self {
            status: StatusCode::BAD_REQUEST,
            inner: err.into(),
        }
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Error {
        Self {
            status: StatusCode::BAD_REQUEST,
            inner: err.into(),
        }
    }
}

impl From<IoError> for Error {
    #[inline]
    fn from(err: IoError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::ConnectionRefused => StatusCode::BAD_GATEWAY,
            ErrorKind::ConnectionReset => StatusCode::BAD_GATEWAY,
            ErrorKind::AddrInUse => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidData => StatusCode::BAD_REQUEST,
            ErrorKind::TimedOut => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            inner: err.into(),
            status
        }
    }
}

impl From<hyper::http::Error> for Error {
    #[inline]
    fn from(err: hyper::http::Error) -> Self {
        Self {
            inner: err.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    #[inline]
    fn from(err: reqwest::Error) -> Self {
        let status = err.status()
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self {
            inner: err.into(),
            status
        }
    }
}

impl Error {
    /// Creates an internal server error
    #[inline]
    pub fn server_error(err: impl Into<BoxError>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            inner: err.into(),
        }
    }

    /// Creates a client error
    #[inline]
    pub fn client_error(err: impl Into<BoxError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            inner: err.into(),
        }
    }

    /// Creates a "not found" error, the shape the router's resolution
    /// failures take.
    #[inline]
    pub fn not_found(err: impl Into<BoxError>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            inner: err.into(),
        }
    }

    /// Creates [`Error`] from a status code and an underlying error
    #[inline]
    pub fn from_parts(status: StatusCode, err: impl Into<BoxError>) -> Self {
        Self { status, inner: err.into() }
    }

    /// Unwraps the inner error
    pub fn into_inner(self) -> BoxError {
        self.inner
    }

    /// Check if the status is within 500-599.
    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Check if the status is within 400-499.
    #[inline]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, StatusCode};
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn it_creates_not_found_error() {
        let err = Error::not_found("no route named \"front\"");

        assert!(err.is_client_error());
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn it_converts_from_not_found_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "not found");
        let err = Error::from(io_error);

        assert!(err.is_client_error());
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn it_converts_from_connection_refused_io_error() {
        let io_error = IoError::new(ErrorKind::ConnectionRefused, "refused");
        let err = Error::from(io_error);

        assert!(err.is_server_error());
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn it_converts_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err();
        let err = Error::from(json_error);

        assert!(err.is_client_error());
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn it_keeps_inner_error_message() {
        let err = Error::server_error("some error");

        assert_eq!(format!("{err}"), "some error");
        assert_eq!(format!("{}", err.into_inner()), "some error");
    }
}
