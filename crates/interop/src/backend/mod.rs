//! Transfer backends selected by negotiation.
//!
//! - [`SharedBackend`] -- OpenCL imports the surface planes and converts on
//!   the device.
//! - [`CopyBackend`] -- the surface is mapped into host memory and converted
//!   on the CPU.

mod copy;
mod shared;

pub use copy::CopyBackend;
pub use shared::SharedBackend;

use std::convert::Infallible;

use vacl_common::{
    Access, ComputeRuntime, ConvertKernel, DisplayHandle, Frame, InteropResult, MediaSharing,
    Plane, Resolution, SurfaceApi, SurfaceId,
};

/// Moves pixels between a host frame and a hardware surface.
///
/// Frames and sizes are validated by the caller before either method runs.
pub trait SurfaceTransfer {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Convert the BGRA `frame` into NV12 `surface`.
    fn upload(
        &self,
        display: DisplayHandle,
        frame: &Frame,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<()>;

    /// Convert NV12 `surface` into the continuous BGRA frame `dst` of `size`.
    fn download(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
        dst: &mut Frame,
    ) -> InteropResult<()>;
}

/// The backend fixed at negotiation.
pub enum Backend<S: SurfaceApi, M: MediaSharing> {
    Shared(SharedBackend<M>),
    Copy(CopyBackend<S>),
}

impl<S: SurfaceApi, M: MediaSharing> Backend<S, M> {
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl<S: SurfaceApi, M: MediaSharing> SurfaceTransfer for Backend<S, M> {
    fn name(&self) -> &'static str {
        match self {
            Self::Shared(backend) => backend.name(),
            Self::Copy(backend) => backend.name(),
        }
    }

    fn upload(
        &self,
        display: DisplayHandle,
        frame: &Frame,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<()> {
        match self {
            Self::Shared(backend) => backend.upload(display, frame, surface, size),
            Self::Copy(backend) => backend.upload(display, frame, surface, size),
        }
    }

    fn download(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
        dst: &mut Frame,
    ) -> InteropResult<()> {
        match self {
            Self::Shared(backend) => backend.download(display, surface, size, dst),
            Self::Copy(backend) => backend.download(display, surface, size, dst),
        }
    }
}

impl<S: SurfaceApi, M: MediaSharing> std::fmt::Debug for Backend<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Stand-in sharing type for builds without OpenCL; it has no values, so a
/// `Backend::Shared` can never be constructed with it.
#[derive(Debug)]
pub enum NoSharing {}

impl MediaSharing for NoSharing {
    type Plane = Infallible;
    type Buffer = Infallible;

    fn display(&self) -> DisplayHandle {
        match *self {}
    }

    fn device_name(&self) -> &str {
        match *self {}
    }

    fn import_plane(&self, _: SurfaceId, _: Plane, _: Access) -> InteropResult<Infallible> {
        match *self {}
    }

    fn acquire_planes(&self, _: &[&Infallible]) -> InteropResult<()> {
        match *self {}
    }

    fn release_planes(&self, _: &[&Infallible]) -> InteropResult<()> {
        match *self {}
    }

    fn create_buffer(&self, _: usize, _: Access) -> InteropResult<Infallible> {
        match *self {}
    }

    fn write_buffer(&self, _: &Infallible, _: &[u8]) -> InteropResult<()> {
        match *self {}
    }

    fn read_buffer(&self, _: &Infallible, _: &mut [u8]) -> InteropResult<()> {
        match *self {}
    }

    fn enqueue_convert(
        &self,
        _: ConvertKernel,
        _: &Infallible,
        _: &Infallible,
        _: &Infallible,
        _: usize,
        _: Resolution,
    ) -> InteropResult<()> {
        match *self {}
    }

    fn finish(&self) -> InteropResult<()> {
        match *self {}
    }
}

impl ComputeRuntime for NoSharing {
    type Platform = Infallible;
    type Sharing = NoSharing;

    fn platforms(&self) -> InteropResult<Vec<Infallible>> {
        match *self {}
    }

    fn platform_name(&self, _: &Infallible) -> String {
        match *self {}
    }

    fn open_sharing(&self, _: &Infallible, _: DisplayHandle) -> InteropResult<Option<NoSharing>> {
        match *self {}
    }
}
