#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! Error handling for avrow.
//!
//! Every fallible operation in the workspace returns an [`AvrowResult`]. Failures that reach a
//! host engine through the row codec are always wrapped in [`AvrowError::Serde`], which keeps the
//! original failure reachable through [`std::error::Error::source`].

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for avrow.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum AvrowError {
    /// A required table property or runtime value was missing.
    #[error("{0}\nBacktrace:\n{1}")]
    Configuration(ErrString, Backtrace),
    /// The schema could not be fetched from a distributed filesystem.
    #[error("Unable to read schema from {location}: {source}")]
    Retrieval {
        /// The location the schema was requested from.
        location: ErrString,
        /// The underlying I/O failure.
        source: Box<AvrowError>,
    },
    /// A schema definition was malformed.
    #[error("Malformed Avro schema: {0}")]
    Parse(#[source] apache_avro::Error),
    /// An Avro datum could not be encoded, decoded or resolved.
    #[error(transparent)]
    Avro(#[from] apache_avro::Error),
    /// A value or argument did not have the expected shape.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// The Avro construct has no Arrow counterpart.
    #[error("Unsupported: {0}\nBacktrace:\n{1}")]
    Unsupported(ErrString, Backtrace),
    /// The umbrella failure reported to a host engine, wrapping the underlying cause.
    #[error("{0}: {1}")]
    Serde(ErrString, #[source] Box<AvrowError>),
    /// A wrapper for errors from the Arrow library.
    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),
    /// A wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A wrapper for URL parsing errors.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// A wrapper for errors from the object_store library.
    #[cfg(feature = "object_store")]
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    /// A wrapper for errors from the reqwest library.
    #[cfg(feature = "reqwest")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AvrowError {
    /// Wrap this error in the umbrella [`AvrowError::Serde`] variant with the given message.
    pub fn into_serde<T: Into<ErrString>>(self, msg: T) -> Self {
        Self::Serde(msg.into(), Box::new(self))
    }

    /// Unwrap any [`AvrowError::Serde`] layers and return the underlying failure.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Serde(_, inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl Debug for AvrowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return [`AvrowError`]s as their error type.
pub type AvrowResult<T> = Result<T, AvrowError>;

/// Construct an [`AvrowError`].
///
/// The variant can be selected with a `Variant:` prefix, otherwise
/// [`AvrowError::InvalidArgument`] is produced.
#[macro_export]
macro_rules! avrow_err {
    (Configuration: $($tt:tt)+) => {{
        use std::backtrace::Backtrace;
        $crate::AvrowError::Configuration(format!($($tt)+).into(), Backtrace::capture())
    }};
    (Unsupported: $($tt:tt)+) => {{
        use std::backtrace::Backtrace;
        $crate::AvrowError::Unsupported(format!($($tt)+).into(), Backtrace::capture())
    }};
    ($($tt:tt)+) => {{
        use std::backtrace::Backtrace;
        $crate::AvrowError::InvalidArgument(format!($($tt)+).into(), Backtrace::capture())
    }};
}

/// Return early with an [`AvrowError`], accepting the same arguments as [`avrow_err!`].
#[macro_export]
macro_rules! avrow_bail {
    ($($tt:tt)+) => {
        return Err($crate::avrow_err!($($tt)+))
    };
}
