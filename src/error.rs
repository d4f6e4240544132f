use std::io;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed backend error carried as a `source`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// Open arguments that cannot form an identity or that the backend rejects.
    #[error("invalid open configuration: {0}")]
    Configuration(String),

    /// The backend failed to open the target. Never cached.
    #[error("failed to open {target}: {source}")]
    ResourceOpen {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("resource handle is closed")]
    ResourceClosed,

    #[error("no node at {path:?}: {reason}")]
    Lookup { path: String, reason: String },

    #[error("{target} was opened read-only")]
    ReadOnly { target: String },

    /// Backend I/O failure on an already open resource.
    #[error("store error on {target}: {source}")]
    Store {
        target: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn open(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::ResourceOpen {
            target: target.into(),
            source: source.into(),
        }
    }

    pub(crate) fn store(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Store {
            target: target.into(),
            source: source.into(),
        }
    }

    pub(crate) fn lookup(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Lookup {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The underlying `io::Error` of an open or store failure, if that is what
    /// the backend reported.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            Error::ResourceOpen { source, .. } | Error::Store { source, .. } => {
                source.downcast_ref::<io::Error>()
            }
            _ => None,
        }
    }
}
