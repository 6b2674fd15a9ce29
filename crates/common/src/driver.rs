//! Driver abstraction traits.
//!
//! These traits define the interface between the interop layer and the two
//! native APIs. `vacl-va` implements [`SurfaceApi`] on top of libva and
//! `vacl-opencl` implements [`ComputeRuntime`] / [`MediaSharing`] on top of
//! OpenCL with the Intel VA-API media sharing extension. The interop crate
//! programs against these traits only, which also lets tests substitute
//! counting mock drivers.

use std::ptr::NonNull;

use crate::error::InteropResult;
use crate::types::{DisplayHandle, Resolution, SurfaceId};

/// `VAImageID`.
pub type ImageId = u32;

/// `VABufferID`.
pub type BufferId = u32;

/// Host-visible description of an image derived from a surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageDesc {
    pub image_id: ImageId,
    /// Buffer holding the image data; map it to reach the pixels.
    pub buf: BufferId,
    pub fourcc: u32,
    pub width: u32,
    pub height: u32,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
}

impl ImageDesc {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Surface access needed by the mapped-copy path.
///
/// # Safety
///
/// Implementors guarantee that a pointer returned by [`map_buffer`] is valid
/// for reads and writes of the derived image's `data_size` bytes until the
/// matching [`unmap_buffer`] call, and that no other code aliases it while
/// mapped.
///
/// [`map_buffer`]: SurfaceApi::map_buffer
/// [`unmap_buffer`]: SurfaceApi::unmap_buffer
pub unsafe trait SurfaceApi: Send + Sync {
    /// Block until all pending operations on the surface have completed.
    fn sync_surface(&self, display: DisplayHandle, surface: SurfaceId) -> InteropResult<()>;

    /// Create an image aliasing the surface memory.
    fn derive_image(&self, display: DisplayHandle, surface: SurfaceId)
        -> InteropResult<ImageDesc>;

    /// Map an image buffer into host memory.
    fn map_buffer(&self, display: DisplayHandle, buf: BufferId) -> InteropResult<NonNull<u8>>;

    fn unmap_buffer(&self, display: DisplayHandle, buf: BufferId) -> InteropResult<()>;

    fn destroy_image(&self, display: DisplayHandle, image: ImageId) -> InteropResult<()>;
}

/// A surface plane as exposed by the media sharing extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Full-resolution Y plane.
    Luma,
    /// Half-resolution interleaved UV plane.
    Chroma,
}

impl Plane {
    /// Plane index passed to `clCreateFromVA_APIMediaSurfaceINTEL`.
    pub fn index(self) -> u32 {
        match self {
            Self::Luma => 0,
            Self::Chroma => 1,
        }
    }
}

/// Kernel access to an imported plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    ReadOnly,
    WriteOnly,
}

/// Device-side color conversion kernels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConvertKernel {
    /// NV12 planes → packed BGRA buffer (download).
    Nv12ToBgra,
    /// Packed BGRA buffer → NV12 planes (upload).
    BgraToNv12,
}

impl ConvertKernel {
    /// Entry point name in the OpenCL program.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::Nv12ToBgra => "nv12_to_bgra",
            Self::BgraToNv12 => "bgra_to_nv12",
        }
    }

    /// Access mode the kernel needs on the surface planes.
    pub fn plane_access(self) -> Access {
        match self {
            Self::Nv12ToBgra => Access::ReadOnly,
            Self::BgraToNv12 => Access::WriteOnly,
        }
    }
}

/// An OpenCL context able to share VA surfaces, bound to one display and one device.
///
/// Every temporary object is an owned value whose `Drop` releases the native
/// resource. Acquire/release pairing is the caller's job.
pub trait MediaSharing: Send + Sync {
    /// Memory object wrapping one plane of a surface.
    type Plane;
    /// Device buffer holding packed BGRA pixels.
    type Buffer;

    /// Display this context was created for.
    fn display(&self) -> DisplayHandle;

    /// Human-readable device name for logging.
    fn device_name(&self) -> &str;

    fn import_plane(
        &self,
        surface: SurfaceId,
        plane: Plane,
        access: Access,
    ) -> InteropResult<Self::Plane>;

    fn acquire_planes(&self, planes: &[&Self::Plane]) -> InteropResult<()>;

    fn release_planes(&self, planes: &[&Self::Plane]) -> InteropResult<()>;

    fn create_buffer(&self, size: usize, access: Access) -> InteropResult<Self::Buffer>;

    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> InteropResult<()>;

    fn read_buffer(&self, buffer: &Self::Buffer, dst: &mut [u8]) -> InteropResult<()>;

    /// Enqueue a conversion kernel over `size` pixels. `step` is the BGRA
    /// buffer's row stride in bytes.
    fn enqueue_convert(
        &self,
        kernel: ConvertKernel,
        luma: &Self::Plane,
        chroma: &Self::Plane,
        buffer: &Self::Buffer,
        step: usize,
        size: Resolution,
    ) -> InteropResult<()>;

    /// Block until all enqueued work has completed.
    fn finish(&self) -> InteropResult<()>;
}

/// A compute runtime whose platforms may offer VA surface sharing.
pub trait ComputeRuntime {
    type Platform;
    type Sharing: MediaSharing;

    /// Enumerate platforms. Failures here are hard errors.
    fn platforms(&self) -> InteropResult<Vec<Self::Platform>>;

    fn platform_name(&self, platform: &Self::Platform) -> String;

    /// Try to create a sharing context on `platform` for `display`.
    ///
    /// Returns `Ok(None)` when the platform lacks the extension entry points,
    /// has no device for the display, or refuses to create the context.
    fn open_sharing(
        &self,
        platform: &Self::Platform,
        display: DisplayHandle,
    ) -> InteropResult<Option<Self::Sharing>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_indices() {
        assert_eq!(Plane::Luma.index(), 0);
        assert_eq!(Plane::Chroma.index(), 1);
    }

    #[test]
    fn kernel_entry_points_and_access() {
        assert_eq!(ConvertKernel::Nv12ToBgra.entry_point(), "nv12_to_bgra");
        assert_eq!(ConvertKernel::BgraToNv12.entry_point(), "bgra_to_nv12");
        assert_eq!(ConvertKernel::Nv12ToBgra.plane_access(), Access::ReadOnly);
        assert_eq!(ConvertKernel::BgraToNv12.plane_access(), Access::WriteOnly);
    }

    #[test]
    fn image_desc_resolution() {
        let desc = ImageDesc {
            width: 64,
            height: 32,
            ..ImageDesc::default()
        };
        assert_eq!(desc.resolution(), Resolution::new(64, 32));
    }
}
