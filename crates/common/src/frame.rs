//! Host-side image buffer passed to upload and returned by download.

use crate::color::PixelFormat;
use crate::error::{InteropError, InteropResult};
use crate::types::Resolution;

/// A host image: pixel bytes plus the layout describing them.
///
/// `offset` is the number of bytes before the first pixel and `stride` the
/// number of bytes between row starts. Frames produced by this crate are
/// always continuous with a zero offset; frames built with
/// [`Frame::with_layout`] may describe a region of a larger buffer, which the
/// interop operations reject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    resolution: Resolution,
    format: PixelFormat,
    stride: usize,
    offset: usize,
}

fn overflow() -> InteropError {
    InteropError::InvalidFrame("layout overflows usize".to_string())
}

impl Frame {
    /// Allocate a zeroed, continuous frame.
    pub fn new(resolution: Resolution, format: PixelFormat) -> InteropResult<Self> {
        let stride = format.row_bytes(resolution.width).ok_or_else(overflow)?;
        let len = format.byte_size(resolution).ok_or_else(overflow)?;
        Ok(Self {
            data: vec![0u8; len],
            resolution,
            format,
            stride,
            offset: 0,
        })
    }

    /// Allocate a zeroed, continuous BGRA8 frame.
    pub fn bgra(resolution: Resolution) -> InteropResult<Self> {
        Self::new(resolution, PixelFormat::Bgra8)
    }

    /// Wrap tightly packed BGRA8 bytes.
    pub fn from_bgra(data: Vec<u8>, resolution: Resolution) -> InteropResult<Self> {
        let stride = PixelFormat::Bgra8
            .row_bytes(resolution.width)
            .ok_or_else(overflow)?;
        Self::with_layout(data, resolution, PixelFormat::Bgra8, stride, 0)
    }

    /// Wrap bytes with an explicit row stride and start offset.
    pub fn with_layout(
        data: Vec<u8>,
        resolution: Resolution,
        format: PixelFormat,
        stride: usize,
        offset: usize,
    ) -> InteropResult<Self> {
        if format.is_planar() {
            return Err(InteropError::InvalidFrame(format!(
                "host frames must be packed, got {format:?}"
            )));
        }

        let row_bytes = format.row_bytes(resolution.width).ok_or_else(overflow)?;
        if stride < row_bytes {
            return Err(InteropError::InvalidFrame(format!(
                "stride {stride} is shorter than a row ({row_bytes} bytes)"
            )));
        }

        let needed = match resolution.height.checked_sub(1) {
            None => Some(offset),
            Some(last) => stride
                .checked_mul(last as usize)
                .and_then(|n| n.checked_add(row_bytes))
                .and_then(|n| n.checked_add(offset)),
        }
        .ok_or_else(overflow)?;
        if data.len() < needed {
            return Err(InteropError::InvalidFrame(format!(
                "buffer holds {} bytes, layout needs {needed}",
                data.len()
            )));
        }

        Ok(Self {
            data,
            resolution,
            format,
            stride,
            offset,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes of one row of pixels, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.resolution.width as usize * self.format.bytes_per_pixel() as usize
    }

    /// True when rows follow each other without padding.
    pub fn is_continuous(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Whole backing buffer, including any leading offset and row padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Ensure the frame has the given size and format, re-allocating a
    /// continuous buffer when it does not. Frames that already match keep
    /// their layout.
    pub fn ensure(&mut self, resolution: Resolution, format: PixelFormat) -> InteropResult<()> {
        if self.resolution != resolution || self.format != format {
            *self = Self::new(resolution, format)?;
        }
        Ok(())
    }
}
