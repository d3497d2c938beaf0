//! Error types for the engine.

use thiserror::Error;
use waypost_protocol::PeerId;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the engine.
///
/// Most failures never leave the engine: transport failures are absorbed
/// into backoff state by the sync manager, and "no receiver" on the
/// notification channel is a value, not an error. The variants here are
/// what the remaining fallible seams report.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error while talking to the collector.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A peer did not answer, even though delivery was attempted.
    ///
    /// Raised by the peer RPC channel when the target process is not
    /// attached yet (or not at all); the bounded retrier treats it as
    /// retryable up to its ceiling, then propagates it.
    #[error("{peer} unreachable: {message}")]
    PeerUnreachable {
        /// The peer that was addressed.
        peer: PeerId,
        /// Channel-level detail.
        message: String,
    },

    /// Persistent store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a peer-unreachable error.
    pub fn peer_unreachable(peer: PeerId, message: impl Into<String>) -> Self {
        Self::PeerUnreachable {
            peer,
            message: message.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::PeerUnreachable { .. } => true,
            EngineError::Store(_) => false,
            EngineError::Serialization(_) => false,
        }
    }
}
