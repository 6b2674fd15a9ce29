//! Core types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::fmt;

/// Video/image resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when the size can be represented as an NV12 surface: non-zero,
    /// with both dimensions even so every 2x2 block shares one chroma pair.
    pub fn is_valid_nv12(self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width.is_multiple_of(2)
            && self.height.is_multiple_of(2)
    }

}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// VA-API surface identifier (`VASurfaceID`).
///
/// Surfaces are owned by the media subsystem; the interop layer only
/// references them for the duration of a call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

impl SurfaceId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Opaque VA display connection (`VADisplay`).
///
/// The handle is owned by whoever opened the display; callers must keep it
/// valid (initialized, not terminated) for as long as it is passed into
/// interop calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle(*mut c_void);

// SAFETY: A VADisplay is an opaque token that libva accepts from any thread;
// this type never dereferences it.
unsafe impl Send for DisplayHandle {}
unsafe impl Sync for DisplayHandle {}

impl DisplayHandle {
    /// Wrap a raw `VADisplay` pointer.
    pub fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_validity() {
        assert!(Resolution::new(2, 2).is_valid_nv12());
        assert!(Resolution::new(1920, 1080).is_valid_nv12());
        assert!(!Resolution::new(0, 2).is_valid_nv12());
        assert!(!Resolution::new(3, 2).is_valid_nv12());
        assert!(!Resolution::new(4, 5).is_valid_nv12());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
        assert_eq!(SurfaceId(7).to_string(), "surface#7");
        assert!(DisplayHandle::from_raw(std::ptr::null_mut()).is_null());
    }
}
