//! Caller-side checks run before any native call.

use std::ops::Range;

use vacl_common::{Frame, ImageDesc, InteropError, InteropResult, PixelFormat, Resolution};

use crate::convert::plane_extent;

/// NV12 fourcc as reported by `vaDeriveImage`.
pub const FOURCC_NV12: u32 = u32::from_le_bytes(*b"NV12");

/// The requested surface size must be non-zero with even dimensions.
pub fn surface_size(size: Resolution) -> InteropResult<()> {
    if size.is_valid_nv12() {
        Ok(())
    } else {
        Err(InteropError::InvalidSize(size))
    }
}

/// Format, size and layout checks shared by upload and `download_into`.
pub fn host_frame(frame: &Frame, size: Resolution) -> InteropResult<()> {
    if frame.format() != PixelFormat::Bgra8 {
        return Err(InteropError::FormatMismatch {
            expected: PixelFormat::Bgra8,
            got: frame.format(),
        });
    }
    if frame.resolution() != size {
        return Err(InteropError::SizeMismatch {
            image: frame.resolution(),
            surface: size,
        });
    }
    surface_size(size)?;
    if frame.offset() != 0 {
        return Err(InteropError::NonZeroOffset(frame.offset()));
    }
    if !frame.is_continuous() {
        return Err(InteropError::NonContiguous {
            stride: frame.stride(),
            expected: frame.row_bytes(),
        });
    }
    Ok(())
}

/// Byte ranges of the luma and chroma planes inside a derived image's buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    pub luma_offset: usize,
    pub luma_pitch: usize,
    pub luma_len: usize,
    pub chroma_offset: usize,
    pub chroma_pitch: usize,
    pub chroma_len: usize,
}

impl PlaneLayout {
    pub fn luma_range(&self) -> Range<usize> {
        self.luma_offset..self.luma_offset + self.luma_len
    }

    pub fn chroma_range(&self) -> Range<usize> {
        self.chroma_offset..self.chroma_offset + self.chroma_len
    }
}

/// Check that a derived image is NV12, covers `size`, and that both planes
/// of `size` fit inside its buffer.
pub fn derived_image(desc: &ImageDesc, size: Resolution) -> InteropResult<PlaneLayout> {
    if desc.fourcc != FOURCC_NV12 {
        return Err(InteropError::UnexpectedFourcc(desc.fourcc));
    }
    let image = desc.resolution();
    if image.width < size.width || image.height < size.height {
        return Err(InteropError::SurfaceTooSmall {
            image,
            requested: size,
        });
    }

    let w = size.width as usize;
    let layout = PlaneLayout {
        luma_offset: desc.offsets[0] as usize,
        luma_pitch: desc.pitches[0] as usize,
        luma_len: plane_extent(desc.pitches[0] as usize, w, size.height as usize),
        chroma_offset: desc.offsets[1] as usize,
        chroma_pitch: desc.pitches[1] as usize,
        chroma_len: plane_extent(desc.pitches[1] as usize, w, size.height as usize / 2),
    };

    let fits = |offset: usize, pitch: usize, len: usize| {
        pitch >= w && offset.checked_add(len).is_some_and(|end| end <= desc.data_size as usize)
    };
    if !fits(layout.luma_offset, layout.luma_pitch, layout.luma_len)
        || !fits(layout.chroma_offset, layout.chroma_pitch, layout.chroma_len)
    {
        return Err(InteropError::SurfaceTooSmall {
            image,
            requested: size,
        });
    }

    let luma = layout.luma_range();
    let chroma = layout.chroma_range();
    if luma.start < chroma.end && chroma.start < luma.end {
        return Err(InteropError::OverlappingPlanes { luma, chroma });
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nv12_desc(width: u32, height: u32, pitch: u32) -> ImageDesc {
        ImageDesc {
            image_id: 1,
            buf: 2,
            fourcc: FOURCC_NV12,
            width,
            height,
            data_size: pitch * height * 3 / 2,
            num_planes: 2,
            pitches: [pitch, pitch, 0],
            offsets: [0, pitch * height, 0],
        }
    }

    #[test]
    fn fourcc_value() {
        assert_eq!(FOURCC_NV12, 0x3231_564E);
    }

    #[test]
    fn odd_and_zero_sizes_rejected() {
        assert!(surface_size(Resolution::new(4, 4)).is_ok());
        for size in [Resolution::new(0, 4), Resolution::new(4, 0), Resolution::new(5, 4), Resolution::new(4, 3)] {
            assert!(matches!(surface_size(size), Err(InteropError::InvalidSize(_))));
        }
    }

    #[test]
    fn frame_checks_in_order() {
        let size = Resolution::new(4, 4);
        assert!(host_frame(&Frame::bgra(size).unwrap(), size).is_ok());

        let err = host_frame(&Frame::bgra(Resolution::new(4, 2)).unwrap(), size).unwrap_err();
        assert!(matches!(err, InteropError::SizeMismatch { .. }));

        let nv12 = Frame::new(size, PixelFormat::Nv12).unwrap();
        let err = host_frame(&nv12, size).unwrap_err();
        assert!(matches!(err, InteropError::FormatMismatch { .. }));

        let offset = Frame::with_layout(vec![0u8; 80], size, PixelFormat::Bgra8, 16, 16).unwrap();
        let err = host_frame(&offset, size).unwrap_err();
        assert!(matches!(err, InteropError::NonZeroOffset(16)));

        let padded = Frame::with_layout(vec![0u8; 96], size, PixelFormat::Bgra8, 24, 0).unwrap();
        let err = host_frame(&padded, size).unwrap_err();
        assert!(matches!(err, InteropError::NonContiguous { stride: 24, expected: 16 }));
    }

    #[test]
    fn derived_image_layout() {
        let layout = derived_image(&nv12_desc(64, 32, 128), Resolution::new(64, 32)).unwrap();
        assert_eq!(layout.luma_pitch, 128);
        assert_eq!(layout.chroma_offset, 128 * 32);
        assert_eq!(layout.luma_len, 128 * 31 + 64);
        assert_eq!(layout.chroma_len, 128 * 15 + 64);
    }

    #[test]
    fn surface_larger_than_request_is_fine() {
        assert!(derived_image(&nv12_desc(64, 48, 64), Resolution::new(32, 16)).is_ok());
    }

    #[test]
    fn wrong_fourcc_rejected() {
        let mut desc = nv12_desc(16, 16, 16);
        desc.fourcc = u32::from_le_bytes(*b"YV12");
        assert!(matches!(
            derived_image(&desc, Resolution::new(16, 16)),
            Err(InteropError::UnexpectedFourcc(_))
        ));
    }

    #[test]
    fn small_image_rejected() {
        let err = derived_image(&nv12_desc(16, 16, 16), Resolution::new(32, 16)).unwrap_err();
        assert!(matches!(err, InteropError::SurfaceTooSmall { .. }));
    }

    #[test]
    fn overlapping_planes_rejected() {
        let mut desc = nv12_desc(16, 16, 16);
        desc.offsets[1] = 16 * 8;
        let err = derived_image(&desc, Resolution::new(16, 16)).unwrap_err();
        assert!(matches!(err, InteropError::OverlappingPlanes { .. }));
    }

    #[test]
    fn chroma_before_luma_accepted() {
        let mut desc = nv12_desc(16, 16, 16);
        desc.offsets = [16 * 8, 0, 0];
        let layout = derived_image(&desc, Resolution::new(16, 16)).unwrap();
        assert_eq!(layout.chroma_range(), 0..16 * 8);
    }

    #[test]
    fn truncated_buffer_rejected() {
        let mut desc = nv12_desc(16, 16, 16);
        desc.data_size = 16 * 16;
        let err = derived_image(&desc, Resolution::new(16, 16)).unwrap_err();
        assert!(matches!(err, InteropError::SurfaceTooSmall { .. }));
    }
}
