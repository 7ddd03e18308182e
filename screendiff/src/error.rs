// THEORY:
// Every failure the pipeline can produce funnels into a single `DiffError`. The
// engine never recovers locally: a request either yields a complete artifact or
// one of these errors, and the caller decides how to present it.
//
// The error kinds are deliberately coarse (not-found, decode, validation,
// internal) because those are the distinctions a transport layer or a CI gate
// acts on. Each kind carries a stable code so callers can match on something
// that will not change when the human-readable message does.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `DiffError`.
pub type Result<T> = std::result::Result<T, DiffError>;

/// Coarse classification of a `DiffError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffErrorKind {
    NotFound,
    Decode,
    Validation,
    Internal,
}

impl DiffErrorKind {
    /// Get the stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            DiffErrorKind::NotFound => "ERR_NOT_FOUND",
            DiffErrorKind::Decode => "ERR_DECODE",
            DiffErrorKind::Validation => "ERR_VALIDATION",
            DiffErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// A structurally valid but degenerate input the engine refuses to process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    /// The working images have no pixels, so no percentage can be derived.
    #[error("working image area is zero ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },

    /// NaN or an infinity was supplied as the threshold percentage.
    #[error("threshold percentage must be a finite number, got {0}")]
    NonFiniteThreshold(f64),

    /// The image is well formed but larger than the decoder is allowed to allocate.
    #[error("image exceeds decoding limits: {}", path.display())]
    ImageTooLarge { path: PathBuf },

    /// Two buffers that must share dimensions do not.
    #[error("dimension mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("image does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid diff input: {0}")]
    Validation(#[from] ValidationIssue),

    #[error("failed generating diff image ({context}): {source}")]
    Internal {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DiffError {
    /// Wrap an unexpected failure, keeping the original cause.
    pub fn internal(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        DiffError::Internal {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> DiffErrorKind {
        match self {
            DiffError::NotFound { .. } => DiffErrorKind::NotFound,
            DiffError::Decode { .. } => DiffErrorKind::Decode,
            DiffError::Validation(_) => DiffErrorKind::Validation,
            DiffError::Internal { .. } => DiffErrorKind::Internal,
        }
    }

    /// The offending path, for the kinds that are tied to one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DiffError::NotFound { path }
            | DiffError::Decode { path, .. }
            | DiffError::Validation(ValidationIssue::ImageTooLarge { path }) => Some(path),
            _ => None,
        }
    }
}
