//! Server error types.

use livereload_assets::AssetError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// `listen` was called on a server that is already listening.
    #[error("Server is already listening")]
    AlreadyListening,

    /// A route is not an absolute URL path.
    #[error("Invalid route {0:?}: must start with / and differ from the other route")]
    InvalidRoute(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The listener task panicked or was cancelled.
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Asset(#[from] AssetError),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid watch pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
