//! Errors raised by the crate.

use std::sync::Arc;
use thiserror::Error;

/// Type alias for a [`Result`](std::result::Result) whose error defaults to
/// [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while decomposing, resolving or observing a property path.
///
/// Errors are `Clone` because they travel through [`Observable`] streams,
/// where the same fault may be delivered to a subscriber and logged.
///
/// [`Observable`]: crate::observable::Observable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The path is not a plain chain of member and indexer accesses.
    #[error(
        "property path must be of the form `Foo.Bar[0].Baz`: {reason}"
    )]
    InvalidPathShape {
        /// Why the path was rejected.
        reason: String,
    },
    /// The type has no field, property or indexer with this name.
    #[error("type `{type_name}` must have a field or property `{member}`")]
    MissingMember {
        /// The runtime type that was searched.
        type_name: &'static str,
        /// The member that was requested.
        member: Arc<str>,
    },
    /// The member exists, but cannot be read or written as a value.
    #[error(
        "member `{member}` on type `{type_name}` is a {kind} and has no \
         accessor"
    )]
    UnsupportedMember {
        /// The runtime type that declares the member.
        type_name: &'static str,
        /// The requested member.
        member: Arc<str>,
        /// The kind of member that was found.
        kind: &'static str,
    },
    /// The member can be read but not written.
    #[error("member `{member}` on type `{type_name}` is read-only")]
    ReadOnlyMember {
        /// The runtime type that declares the member.
        type_name: &'static str,
        /// The requested member.
        member: Arc<str>,
    },
    /// A value of the wrong kind was passed to or returned from an accessor.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// What the accessor expected.
        expected: &'static str,
        /// What it got.
        found: &'static str,
    },
    /// The root object does not match the type the path was bound to.
    #[error("path is rooted at `{expected}`, but the root object is `{found}`")]
    RootTypeMismatch {
        /// The type the path was bound to.
        expected: &'static str,
        /// The runtime type of the root.
        found: &'static str,
    },
    /// No registered provider claims the member.
    #[error(
        "couldn't find a change source provider for `{type_name}.{member}`; \
         this should never happen, the provider registry is probably \
         misconfigured"
    )]
    ProviderNotFound {
        /// The runtime type of the sender.
        type_name: &'static str,
        /// The member being observed.
        member: Arc<str>,
    },
    /// A user accessor failed while reading or writing a member.
    #[error("accessor `{type_name}.{member}` failed: {message}")]
    Accessor {
        /// The runtime type that declares the member.
        type_name: &'static str,
        /// The member being accessed.
        member: Arc<str>,
        /// The failure reported by the accessor.
        message: String,
    },
}

impl Error {
    /// Creates the error a user accessor returns when it cannot produce or
    /// store a value, e.g. an index that is out of range.
    ///
    /// The type and member names are filled in by the accessor resolver.
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Accessor {
            type_name: "",
            member: Arc::from(""),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPathShape {
            reason: reason.into(),
        }
    }

    /// Attaches the member that raised an anonymous [`Error::fault`].
    pub(crate) fn in_member(
        self,
        type_name: &'static str,
        member: &Arc<str>,
    ) -> Self {
        match self {
            Self::Accessor { message, .. } => Self::Accessor {
                type_name,
                member: Arc::clone(member),
                message,
            },
            other => other,
        }
    }
}

/// Errors raised while loading an [`ObserveConfig`] from the environment.
///
/// [`ObserveConfig`]: crate::config::ObserveConfig
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A cache limit was set to zero.
    #[error("{var} must be greater than zero")]
    ZeroCapacity {
        /// The environment variable.
        var: &'static str,
    },
    /// A variable could not be parsed.
    #[error("{var} is set to `{value}`, expected {expected}")]
    InvalidValue {
        /// The environment variable.
        var: &'static str,
        /// The value that was found.
        value: String,
        /// What was expected instead.
        expected: &'static str,
    },
    /// A variable is not valid unicode.
    #[error("{var} is not valid unicode")]
    NotUnicode {
        /// The environment variable.
        var: &'static str,
    },
}
