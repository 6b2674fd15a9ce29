//! Central error types for the interop layer (thiserror-based).
//!
//! Errors fall into three families:
//!
//! - **capability-absent** -- the sharing extension or build-time support is
//!   missing. Negotiation does not return these; it degrades to the copy
//!   backend. [`InteropError::Unsupported`] is only produced when a caller
//!   explicitly requires sharing.
//! - **native-call failure** -- a bad status from VA-API or OpenCL, reported
//!   with the failing call's name.
//! - **precondition violation** -- a caller error detected before any native
//!   call is made.

use std::fmt;

use thiserror::Error;

use crate::color::PixelFormat;
use crate::types::Resolution;

/// Which native API a failure came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeApi {
    VaApi,
    OpenCl,
}

impl fmt::Display for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VaApi => write!(f, "VA-API"),
            Self::OpenCl => write!(f, "OpenCL"),
        }
    }
}

/// Top-level interop error.
#[derive(Error, Debug)]
pub enum InteropError {
    // -- native-call failures --
    #[error("{api}: {call} failed with status {status} ({detail})")]
    Native {
        api: NativeApi,
        call: &'static str,
        status: i32,
        detail: String,
    },

    #[error("{api} initialization failed: {reason}")]
    Init { api: NativeApi, reason: String },

    #[error("{api} library could not be loaded: {reason}")]
    LibraryLoad { api: NativeApi, reason: String },

    #[error("Kernel '{kernel}' failed: {reason}")]
    Kernel { kernel: String, reason: String },

    // -- capability-absent --
    #[error("Surface sharing unsupported: {0}")]
    Unsupported(String),

    // -- precondition violations --
    #[error("Pixel format mismatch: expected {expected:?}, got {got:?}")]
    FormatMismatch {
        expected: PixelFormat,
        got: PixelFormat,
    },

    #[error("Size mismatch: image is {image}, surface size is {surface}")]
    SizeMismatch {
        image: Resolution,
        surface: Resolution,
    },

    #[error("Invalid NV12 size {0}: width and height must be non-zero and even")]
    InvalidSize(Resolution),

    #[error("Image rows are not contiguous (stride {stride}, expected {expected})")]
    NonContiguous { stride: usize, expected: usize },

    #[error("Image data starts at offset {0}; only offset 0 is supported")]
    NonZeroOffset(usize),

    #[error("Invalid frame buffer: {0}")]
    InvalidFrame(String),

    #[error("Surface image has fourcc {0:#010x}, expected NV12")]
    UnexpectedFourcc(u32),

    #[error("Surface image {image} is smaller than requested size {requested}")]
    SurfaceTooSmall {
        image: Resolution,
        requested: Resolution,
    },

    #[error("Derived image planes overlap (luma {luma:?}, chroma {chroma:?})")]
    OverlappingPlanes {
        luma: std::ops::Range<usize>,
        chroma: std::ops::Range<usize>,
    },

    #[error("Display handle does not match the display the sharing context was created for")]
    DisplayMismatch,

    // -- ambient --
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InteropError {
    /// Build a native-call failure.
    pub fn native(
        api: NativeApi,
        call: &'static str,
        status: i32,
        detail: impl Into<String>,
    ) -> Self {
        Self::Native {
            api,
            call,
            status,
            detail: detail.into(),
        }
    }

    /// True for caller errors detected before touching the hardware surface
    /// (or, for `UnexpectedFourcc`/`SurfaceTooSmall`, before converting pixels).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch { .. }
                | Self::SizeMismatch { .. }
                | Self::InvalidSize(_)
                | Self::NonContiguous { .. }
                | Self::NonZeroOffset(_)
                | Self::InvalidFrame(_)
                | Self::UnexpectedFourcc(_)
                | Self::SurfaceTooSmall { .. }
                | Self::OverlappingPlanes { .. }
                | Self::DisplayMismatch
        )
    }

    /// True for bad statuses returned by VA-API or OpenCL.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Self::Native { .. } | Self::Init { .. } | Self::Kernel { .. }
        )
    }

    /// The name of the failing native call, if this is a native-call failure.
    pub fn failing_call(&self) -> Option<&'static str> {
        match self {
            Self::Native { call, .. } => Some(*call),
            _ => None,
        }
    }
}

/// Convenience Result type for interop operations.
pub type InteropResult<T> = Result<T, InteropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_names_call() {
        let err = InteropError::native(NativeApi::VaApi, "vaDeriveImage", 6, "invalid surface");
        let msg = err.to_string();
        assert!(msg.contains("VA-API"));
        assert!(msg.contains("vaDeriveImage"));
        assert!(msg.contains("invalid surface"));
        assert_eq!(err.failing_call(), Some("vaDeriveImage"));
        assert!(err.is_native());
        assert!(!err.is_precondition());
    }

    #[test]
    fn precondition_classification() {
        let err = InteropError::SizeMismatch {
            image: Resolution::new(4, 4),
            surface: Resolution::new(8, 8),
        };
        assert!(err.is_precondition());
        assert!(err.to_string().contains("4x4"));
        assert!(InteropError::NonZeroOffset(16).is_precondition());
        assert!(!InteropError::Unsupported("no extension".into()).is_precondition());
    }

    #[test]
    fn fourcc_is_hex_formatted() {
        let err = InteropError::UnexpectedFourcc(0x3231_564E);
        assert!(err.to_string().contains("0x3231564e"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such node");
        let err = InteropError::from(io_err);
        assert!(err.to_string().contains("no such node"));
    }
}
