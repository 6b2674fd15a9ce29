//! Zero-copy backend: surface planes are imported into OpenCL and converted
//! by device kernels.

use parking_lot::Mutex;
use tracing::debug;

use vacl_common::{
    Access, ConvertKernel, DisplayHandle, Frame, InteropError, InteropResult, MediaSharing,
    Plane, Resolution, SurfaceId,
};

use super::SurfaceTransfer;
use crate::guard::AcquiredPlanes;

/// Transfers through `cl_intel_va_api_media_sharing`.
///
/// The acquire, convert, release and finish sequence on the shared queue is
/// serialized; plane imports and buffer allocation happen outside the lock.
pub struct SharedBackend<M: MediaSharing> {
    sharing: M,
    queue: Mutex<()>,
}

impl<M: MediaSharing> SharedBackend<M> {
    pub fn new(sharing: M) -> Self {
        Self {
            sharing,
            queue: Mutex::new(()),
        }
    }

    pub fn sharing(&self) -> &M {
        &self.sharing
    }

    pub fn device_name(&self) -> &str {
        self.sharing.device_name()
    }

    fn check_display(&self, display: DisplayHandle) -> InteropResult<()> {
        if display == self.sharing.display() {
            Ok(())
        } else {
            Err(InteropError::DisplayMismatch)
        }
    }

    fn import(&self, surface: SurfaceId, access: Access) -> InteropResult<[M::Plane; 2]> {
        let luma = self.sharing.import_plane(surface, Plane::Luma, access)?;
        let chroma = self.sharing.import_plane(surface, Plane::Chroma, access)?;
        Ok([luma, chroma])
    }

    /// Acquire both planes, run `kernel`, release and wait for completion.
    fn convert(
        &self,
        kernel: ConvertKernel,
        planes: &[M::Plane; 2],
        buffer: &M::Buffer,
        step: usize,
        size: Resolution,
    ) -> InteropResult<()> {
        let acquired = AcquiredPlanes::acquire(&self.sharing, [&planes[0], &planes[1]])?;
        self.sharing
            .enqueue_convert(kernel, &planes[0], &planes[1], buffer, step, size)?;
        acquired.release()?;
        self.sharing.finish()
    }
}

impl<M: MediaSharing> SurfaceTransfer for SharedBackend<M> {
    fn name(&self) -> &'static str {
        "shared"
    }

    fn upload(
        &self,
        display: DisplayHandle,
        frame: &Frame,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<()> {
        self.check_display(display)?;
        let kernel = ConvertKernel::BgraToNv12;
        let planes = self.import(surface, kernel.plane_access())?;
        let bytes = frame.stride() * size.height as usize;
        let buffer = self.sharing.create_buffer(bytes, Access::ReadOnly)?;

        let _queue = self.queue.lock();
        self.sharing.write_buffer(&buffer, &frame.as_bytes()[..bytes])?;
        self.convert(kernel, &planes, &buffer, frame.stride(), size)?;
        debug!(%surface, %size, device = self.device_name(), "Uploaded frame through shared surface");
        Ok(())
    }

    fn download(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
        dst: &mut Frame,
    ) -> InteropResult<()> {
        self.check_display(display)?;
        let kernel = ConvertKernel::Nv12ToBgra;
        let planes = self.import(surface, kernel.plane_access())?;
        let step = dst.stride();
        let bytes = step * size.height as usize;
        let buffer = self.sharing.create_buffer(bytes, Access::WriteOnly)?;

        let _queue = self.queue.lock();
        self.convert(kernel, &planes, &buffer, step, size)?;
        self.sharing
            .read_buffer(&buffer, &mut dst.as_bytes_mut()[..bytes])?;
        debug!(%surface, %size, device = self.device_name(), "Downloaded frame through shared surface");
        Ok(())
    }
}
