use thiserror::Error;

use crate::item::Item;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The value handed to `set`/`put` cannot be serialized. Never retried.
    #[error("value cannot be serialized for caching: {message}")]
    Validation { message: String },

    /// Raised by `Pool::get` when no generator is supplied and the key is a
    /// miss. Carries the locked handle so the caller can populate the key out
    /// of band; always recoverable.
    #[error("cache miss for key `{key}`")]
    Miss { key: String, item: Box<Item> },

    /// I/O failure reported by a storage backend. Propagated as-is; the core
    /// never retries transparently.
    #[error("backend `{backend}` error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// A stored record could not be decoded.
    #[error("corrupt cache record at `{key}`: {message}")]
    Codec { key: String, message: String },

    /// Failure raised by a caller-supplied regeneration function.
    #[error("regeneration failed: {0}")]
    Generation(String),
}

impl CacheError {
    pub fn validation(err: impl std::fmt::Display) -> Self {
        Self::Validation {
            message: err.to_string(),
        }
    }

    pub(crate) fn miss(item: Item) -> Self {
        Self::Miss {
            key: item.key().to_string(),
            item: Box::new(item),
        }
    }

    pub fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend,
            message: err.to_string(),
        }
    }

    pub fn codec(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Codec {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }
}
