//! OpenCL context bound to a VA display, and the [`MediaSharing`] implementation.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use vacl_common::{
    Access, ConvertKernel, DisplayHandle, InteropError, InteropResult, MediaSharing, Plane,
    Resolution, SurfaceId,
};

use crate::error::{check_cl_status, ClError, KernelBuildError};
use crate::ffi::{
    cl_command_queue, cl_context, cl_context_properties, cl_device_id, cl_int, cl_mem,
    cl_mem_flags, ClLibrary, CL_CONTEXT_INTEROP_USER_SYNC, CL_CONTEXT_VA_API_DISPLAY_INTEL,
    CL_FALSE, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY, CL_SUCCESS, CL_TRUE,
};
use crate::kernel::{global_work_size, Kernel, Program, ProgramSource};
use crate::media::MediaSharingFns;
use crate::memory::MemObject;

/// Context, device and queue for one device sharing a VA display.
///
/// Released together on drop.
pub struct DeviceContext {
    lib: Arc<ClLibrary>,
    device: cl_device_id,
    context: cl_context,
    queue: cl_command_queue,
}

impl DeviceContext {
    /// Create a single-device context sharing `display`, and its queue.
    ///
    /// Takes ownership of `device`; it is released on every failure path.
    pub fn create(
        lib: &Arc<ClLibrary>,
        device: cl_device_id,
        display: DisplayHandle,
    ) -> Result<Self, ClError> {
        let properties: [cl_context_properties; 5] = [
            CL_CONTEXT_VA_API_DISPLAY_INTEL,
            display.as_raw() as cl_context_properties,
            CL_CONTEXT_INTEROP_USER_SYNC,
            CL_FALSE as cl_context_properties,
            0,
        ];

        let mut err: cl_int = CL_SUCCESS;
        // SAFETY: zero-terminated property list, one valid device.
        let context = unsafe {
            (lib.api.clCreateContext)(
                properties.as_ptr(),
                1,
                &device,
                None,
                ptr::null_mut(),
                &mut err,
            )
        };
        if let Err(e) = check_cl_status(err, "clCreateContext") {
            // SAFETY: releases the device reference handed to us.
            unsafe { (lib.api.clReleaseDevice)(device) };
            return Err(e);
        }

        // From here on `handles` owns device and context.
        let mut handles = Self {
            lib: lib.clone(),
            device,
            context,
            queue: ptr::null_mut(),
        };

        // SAFETY: valid context/device pair, default queue properties.
        let queue = unsafe { (lib.api.clCreateCommandQueue)(context, device, 0, &mut err) };
        check_cl_status(err, "clCreateCommandQueue")?;
        handles.queue = queue;
        Ok(handles)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        // SAFETY: each handle is owned once and released in reverse creation order.
        unsafe {
            if !self.queue.is_null() {
                let status = (self.lib.api.clReleaseCommandQueue)(self.queue);
                if let Err(e) = check_cl_status(status, "clReleaseCommandQueue") {
                    warn!(error = %e, "Failed to release OpenCL queue");
                }
            }
            let status = (self.lib.api.clReleaseContext)(self.context);
            if let Err(e) = check_cl_status(status, "clReleaseContext") {
                warn!(error = %e, "Failed to release OpenCL context");
            }
            let status = (self.lib.api.clReleaseDevice)(self.device);
            if let Err(e) = check_cl_status(status, "clReleaseDevice") {
                warn!(error = %e, "Failed to release OpenCL device");
            }
        }
        debug!("Released OpenCL sharing context");
    }
}

struct ConvertKernels {
    nv12_to_bgra: Kernel,
    bgra_to_nv12: Kernel,
}

impl ConvertKernels {
    fn get_mut(&mut self, which: ConvertKernel) -> &mut Kernel {
        match which {
            ConvertKernel::Nv12ToBgra => &mut self.nv12_to_bgra,
            ConvertKernel::BgraToNv12 => &mut self.bgra_to_nv12,
        }
    }
}

/// An OpenCL context able to import planes of VA surfaces on one display.
pub struct SharingContext {
    // Field order is drop order: kernels and program before the context.
    kernels: Mutex<ConvertKernels>,
    _program: Program,
    handles: DeviceContext,
    fns: MediaSharingFns,
    display: DisplayHandle,
    device_name: String,
    local_work_size: Option<[usize; 2]>,
}

// SAFETY: the queue and context are thread-safe OpenCL objects; kernel
// argument state is guarded by `kernels`.
unsafe impl Send for SharingContext {}
unsafe impl Sync for SharingContext {}

impl SharingContext {
    /// Build the conversion kernels on `handles` and wrap everything up.
    pub fn new(
        handles: DeviceContext,
        fns: MediaSharingFns,
        display: DisplayHandle,
        source: &ProgramSource,
    ) -> Result<Self, KernelBuildError> {
        let device_name = handles
            .lib
            .device_name(handles.device)
            .unwrap_or_else(|_| "<unknown device>".to_string());
        let program = Program::build(&handles.lib, handles.context, handles.device, source)?;
        let kernels = ConvertKernels {
            nv12_to_bgra: program.kernel(ConvertKernel::Nv12ToBgra)?,
            bgra_to_nv12: program.kernel(ConvertKernel::BgraToNv12)?,
        };

        let display_handle = display;
        info!(device = %device_name, display = %display_handle, "OpenCL VA-API sharing context ready");
        Ok(Self {
            kernels: Mutex::new(kernels),
            _program: program,
            handles,
            fns,
            display,
            device_name,
            local_work_size: source.local_work_size,
        })
    }

    fn lib(&self) -> &ClLibrary {
        &self.handles.lib
    }

    fn raw_planes(planes: &[&MemObject]) -> Vec<cl_mem> {
        planes.iter().map(|plane| plane.raw()).collect()
    }
}

impl std::fmt::Debug for SharingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharingContext")
            .field("device", &self.device_name)
            .field("display", &self.display)
            .field("local_work_size", &self.local_work_size)
            .finish()
    }
}

/// Host and device sides of a buffer transfer must be the same size.
fn transfer_len(host: usize, buffer: usize, call: &str) -> InteropResult<usize> {
    if host != buffer {
        return Err(InteropError::InvalidFrame(format!(
            "{call}: host slice is {host} bytes, buffer is {buffer}"
        )));
    }
    Ok(host)
}

fn mem_flags(access: Access) -> cl_mem_flags {
    match access {
        Access::ReadOnly => CL_MEM_READ_ONLY,
        Access::WriteOnly => CL_MEM_WRITE_ONLY,
    }
}

impl MediaSharing for SharingContext {
    type Plane = MemObject;
    type Buffer = MemObject;

    fn display(&self) -> DisplayHandle {
        self.display
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn import_plane(
        &self,
        surface: SurfaceId,
        plane: Plane,
        access: Access,
    ) -> InteropResult<MemObject> {
        let mut surface_id = surface.raw();
        let mut err: cl_int = CL_SUCCESS;
        // SAFETY: `surface_id` is read during the call only; the context was
        // created for the display owning the surface.
        let mem = unsafe {
            (self.fns.create_from_surface)(
                self.handles.context,
                mem_flags(access),
                &mut surface_id,
                plane.index(),
                &mut err,
            )
        };
        check_cl_status(err, "clCreateFromVA_APIMediaSurfaceINTEL")?;
        let label = match plane {
            Plane::Luma => "luma plane",
            Plane::Chroma => "chroma plane",
        };
        // SAFETY: freshly created object, ownership transferred.
        Ok(unsafe { MemObject::from_raw(self.handles.lib.clone(), mem, 0, label) })
    }

    fn acquire_planes(&self, planes: &[&MemObject]) -> InteropResult<()> {
        let raw = Self::raw_planes(planes);
        // SAFETY: `raw` holds valid memory objects created from VA surfaces.
        let status = unsafe {
            (self.fns.enqueue_acquire)(
                self.handles.queue,
                raw.len() as u32,
                raw.as_ptr(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clEnqueueAcquireVA_APIMediaSurfacesINTEL")?;
        Ok(())
    }

    fn release_planes(&self, planes: &[&MemObject]) -> InteropResult<()> {
        let raw = Self::raw_planes(planes);
        // SAFETY: `raw` holds memory objects previously acquired on this queue.
        let status = unsafe {
            (self.fns.enqueue_release)(
                self.handles.queue,
                raw.len() as u32,
                raw.as_ptr(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clEnqueueReleaseVA_APIMediaSurfacesINTEL")?;
        Ok(())
    }

    fn create_buffer(&self, size: usize, access: Access) -> InteropResult<MemObject> {
        let mut err: cl_int = CL_SUCCESS;
        // SAFETY: no host pointer; the driver allocates `size` bytes.
        let mem = unsafe {
            (self.lib().api.clCreateBuffer)(
                self.handles.context,
                mem_flags(access),
                size,
                ptr::null_mut(),
                &mut err,
            )
        };
        check_cl_status(err, "clCreateBuffer")?;
        // SAFETY: freshly created object, ownership transferred.
        Ok(unsafe { MemObject::from_raw(self.handles.lib.clone(), mem, size, "bgra buffer") })
    }

    fn write_buffer(&self, buffer: &MemObject, data: &[u8]) -> InteropResult<()> {
        let len = transfer_len(data.len(), buffer.size(), "clEnqueueWriteBuffer")?;
        // SAFETY: blocking write of `len` bytes from a live slice into a
        // buffer of exactly that size.
        let status = unsafe {
            (self.lib().api.clEnqueueWriteBuffer)(
                self.handles.queue,
                buffer.raw(),
                CL_TRUE,
                0,
                len,
                data.as_ptr().cast::<c_void>(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clEnqueueWriteBuffer")?;
        Ok(())
    }

    fn read_buffer(&self, buffer: &MemObject, dst: &mut [u8]) -> InteropResult<()> {
        let len = transfer_len(dst.len(), buffer.size(), "clEnqueueReadBuffer")?;
        // SAFETY: blocking read of `len` bytes into a live, exclusively
        // borrowed slice.
        let status = unsafe {
            (self.lib().api.clEnqueueReadBuffer)(
                self.handles.queue,
                buffer.raw(),
                CL_TRUE,
                0,
                len,
                dst.as_mut_ptr().cast::<c_void>(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clEnqueueReadBuffer")?;
        Ok(())
    }

    fn enqueue_convert(
        &self,
        which: ConvertKernel,
        luma: &MemObject,
        chroma: &MemObject,
        buffer: &MemObject,
        step: usize,
        size: Resolution,
    ) -> InteropResult<()> {
        let cols = size.width as usize;
        let rows = size.height as usize;
        let global = global_work_size(cols, rows, self.local_work_size);

        let mut kernels = self.kernels.lock();
        let kernel = kernels.get_mut(which);
        kernel.set_mem_arg(0, luma.raw())?;
        kernel.set_mem_arg(1, chroma.raw())?;
        kernel.set_mem_arg(2, buffer.raw())?;
        kernel.set_int_arg(3, step)?;
        kernel.set_int_arg(4, cols)?;
        kernel.set_int_arg(5, rows)?;

        let local = self.local_work_size.filter(|[x, y]| *x > 0 && *y > 0);
        let local_ptr = local.as_ref().map_or(ptr::null(), |l| l.as_ptr());
        // SAFETY: all six arguments are bound; `global` and `local` outlive
        // the call.
        let status = unsafe {
            (self.lib().api.clEnqueueNDRangeKernel)(
                self.handles.queue,
                kernel.raw(),
                2,
                ptr::null(),
                global.as_ptr(),
                local_ptr,
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clEnqueueNDRangeKernel")?;
        debug!(kernel = kernel.name(), %size, ?global, "Enqueued conversion kernel");
        Ok(())
    }

    fn finish(&self) -> InteropResult<()> {
        // SAFETY: valid queue owned by this context.
        let status = unsafe { (self.lib().api.clFinish)(self.handles.queue) };
        check_cl_status(status, "clFinish")?;
        Ok(())
    }
}
