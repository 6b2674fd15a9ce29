//! Pixel formats handled by the interop layer.

use serde::{Deserialize, Serialize};

use crate::types::Resolution;

/// Pixel format of a host frame or hardware surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Interleaved B, G, R, A, 8 bits each.
    Bgra8,
    /// NV12: Y plane + interleaved UV at half resolution (HW surface layout).
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel (for planar formats, returns bytes for the Y component per pixel).
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Bgra8 => 4,
            Self::Nv12 => 1, // Y plane only; UV is separate
        }
    }

    pub fn is_planar(self) -> bool {
        matches!(self, Self::Nv12)
    }

    /// Bytes in one row of pixels (the Y row for planar formats), or `None`
    /// when it does not fit in `usize`.
    pub fn row_bytes(self, width: u32) -> Option<usize> {
        (width as usize).checked_mul(self.bytes_per_pixel() as usize)
    }

    /// Tightly packed byte size of an image of this format, or `None` when
    /// it does not fit in `usize`.
    pub fn byte_size(self, resolution: Resolution) -> Option<usize> {
        let luma = self
            .row_bytes(resolution.width)?
            .checked_mul(resolution.height as usize)?;
        match self {
            Self::Bgra8 => Some(luma),
            // Interleaved UV: full-width rows, half the height.
            Self::Nv12 => {
                let chroma =
                    (resolution.width as usize).checked_mul(resolution.height as usize / 2)?;
                luma.checked_add(chroma)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_sizes() {
        assert_eq!(PixelFormat::Bgra8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Nv12.bytes_per_pixel(), 1);
        assert!(PixelFormat::Nv12.is_planar());
        assert!(!PixelFormat::Bgra8.is_planar());
    }

    #[test]
    fn byte_size_matches_layout() {
        let res = Resolution::new(8, 4);
        assert_eq!(PixelFormat::Bgra8.byte_size(res), Some(128));
        assert_eq!(PixelFormat::Nv12.byte_size(res), Some(48));
        assert_eq!(
            PixelFormat::Nv12.byte_size(Resolution::new(1920, 1080)),
            Some(1920 * 1080 * 3 / 2)
        );
        assert_eq!(PixelFormat::Bgra8.row_bytes(640), Some(2560));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn byte_size_overflow_is_none() {
        let huge = Resolution::new(u32::MAX, u32::MAX);
        assert_eq!(PixelFormat::Bgra8.byte_size(huge), None);
    }
}
