//! VA-API specific error types.

use thiserror::Error;

use vacl_common::{InteropError, NativeApi};

use crate::ffi::VAStatus;

/// Errors that can occur when loading libva.
#[derive(Debug, Clone, Error)]
pub enum VaLoadError {
    #[error("VA-API library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),
}

/// VA-API backend error type.
#[derive(Debug, Error)]
pub enum VaError {
    /// A libva call returned a non-success status.
    #[error("{call} failed with status {status:#x}: {message}")]
    Status {
        call: &'static str,
        status: VAStatus,
        message: String,
    },

    /// No PCI display controller of the wanted vendor was found.
    #[error("No display adapter with vendor id {vendor:#06x} under {dir}")]
    AdapterNotFound { vendor: u16, dir: String },

    /// Every DRM node of the adapter failed to produce a display.
    #[error("Can't open a VA display for adapter {adapter}: {reason}")]
    DisplayOpen { adapter: usize, reason: String },

    /// libva-drm is not available, so displays cannot be opened on DRM nodes.
    #[error("libva-drm is not loaded")]
    DrmUnavailable,

    #[error(transparent)]
    Load(#[from] VaLoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VaError> for InteropError {
    fn from(err: VaError) -> Self {
        match err {
            VaError::Status {
                call,
                status,
                message,
            } => InteropError::native(NativeApi::VaApi, call, status, message),
            VaError::AdapterNotFound { .. }
            | VaError::DisplayOpen { .. }
            | VaError::DrmUnavailable => InteropError::Init {
                api: NativeApi::VaApi,
                reason: err.to_string(),
            },
            VaError::Load(e) => InteropError::LibraryLoad {
                api: NativeApi::VaApi,
                reason: e.to_string(),
            },
            VaError::Io(e) => InteropError::Io(e),
        }
    }
}

impl From<VaLoadError> for InteropError {
    fn from(err: VaLoadError) -> Self {
        InteropError::LibraryLoad {
            api: NativeApi::VaApi,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = VaError::Status {
            call: "vaSyncSurface",
            status: 6,
            message: "invalid VASurfaceID".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("vaSyncSurface"));
        assert!(msg.contains("0x6"));
        assert!(msg.contains("invalid VASurfaceID"));
    }

    #[test]
    fn status_maps_to_native() {
        let err: InteropError = VaError::Status {
            call: "vaMapBuffer",
            status: 7,
            message: "invalid VABufferID".to_string(),
        }
        .into();
        assert_eq!(err.failing_call(), Some("vaMapBuffer"));
    }

    #[test]
    fn adapter_not_found_maps_to_init() {
        let err: InteropError = VaError::AdapterNotFound {
            vendor: 0x8086,
            dir: "/sys/bus/pci/devices".to_string(),
        }
        .into();
        assert!(matches!(err, InteropError::Init { api: NativeApi::VaApi, .. }));
        assert!(err.to_string().contains("0x8086"));
    }

    #[test]
    fn load_error_maps_to_library_load() {
        let err: InteropError = VaLoadError::LibraryNotFound("libva.so.2".to_string()).into();
        assert!(matches!(err, InteropError::LibraryLoad { .. }));
    }
}
