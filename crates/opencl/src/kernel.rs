//! Program build and kernel handles for the conversion kernels.

use std::ffi::{c_void, CString};
use std::ptr;
use std::sync::Arc;

use tracing::{debug, error, info};

use vacl_common::ConvertKernel;

use crate::error::{check_cl_status, ClError, ClStatus, KernelBuildError};
use crate::ffi::{
    cl_context, cl_device_id, cl_int, cl_kernel, cl_mem, cl_program, cl_uint, ClLibrary,
    CL_PROGRAM_BUILD_LOG, CL_SUCCESS,
};

/// Kernel source plus the options used to build it.
#[derive(Clone, Debug)]
pub struct ProgramSource {
    pub source: &'static str,
    pub build_options: String,
    /// Work-group size; `None` lets the driver choose.
    pub local_work_size: Option<[usize; 2]>,
}

/// A built OpenCL program, released on drop.
pub struct Program {
    lib: Arc<ClLibrary>,
    program: cl_program,
}

// SAFETY: cl_program handles are thread-safe reference-counted objects.
unsafe impl Send for Program {}
unsafe impl Sync for Program {}

impl Program {
    /// Compile `source` for `device`. On failure the build log is returned
    /// inside the error.
    pub fn build(
        lib: &Arc<ClLibrary>,
        context: cl_context,
        device: cl_device_id,
        source: &ProgramSource,
    ) -> Result<Self, KernelBuildError> {
        let text = CString::new(source.source).map_err(|_| KernelBuildError::InvalidSource)?;
        let options =
            CString::new(source.build_options.as_str()).map_err(|_| KernelBuildError::InvalidSource)?;

        let mut err: cl_int = CL_SUCCESS;
        let strings = [text.as_ptr()];
        // SAFETY: one NUL-terminated string; lengths may be null for that.
        let raw = unsafe {
            (lib.api.clCreateProgramWithSource)(context, 1, strings.as_ptr(), ptr::null(), &mut err)
        };
        check_cl_status(err, "clCreateProgramWithSource")?;
        let program = Self {
            lib: lib.clone(),
            program: raw,
        };

        // SAFETY: `device` belongs to `context`; no callback is installed so
        // the build is synchronous.
        let status = unsafe {
            (lib.api.clBuildProgram)(raw, 1, &device, options.as_ptr(), None, ptr::null_mut())
        };
        if status != CL_SUCCESS {
            let log = program.build_log(device).unwrap_or_else(|e| format!("<no build log: {e}>"));
            error!(status = %ClStatus(status), "OpenCL program build failed");
            return Err(KernelBuildError::Build {
                status: ClStatus(status),
                log,
            });
        }

        info!(options = %source.build_options, "Built OpenCL conversion program");
        Ok(program)
    }

    fn build_log(&self, device: cl_device_id) -> Result<String, ClError> {
        let mut size = 0usize;
        // SAFETY: size query with a null value pointer.
        let status = unsafe {
            (self.lib.api.clGetProgramBuildInfo)(
                self.program,
                device,
                CL_PROGRAM_BUILD_LOG,
                0,
                ptr::null_mut(),
                &mut size,
            )
        };
        check_cl_status(status, "clGetProgramBuildInfo")?;

        let mut bytes = vec![0u8; size];
        // SAFETY: `bytes` holds `size` bytes as reported above.
        let status = unsafe {
            (self.lib.api.clGetProgramBuildInfo)(
                self.program,
                device,
                CL_PROGRAM_BUILD_LOG,
                size,
                bytes.as_mut_ptr().cast::<c_void>(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clGetProgramBuildInfo")?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim().to_string())
    }

    /// Create the kernel for one conversion entry point.
    pub fn kernel(&self, which: ConvertKernel) -> Result<Kernel, KernelBuildError> {
        let name = which.entry_point();
        let c_name = CString::new(name).map_err(|_| KernelBuildError::InvalidSource)?;
        let mut err: cl_int = CL_SUCCESS;
        // SAFETY: the program was built successfully; `c_name` is NUL-terminated.
        let raw = unsafe { (self.lib.api.clCreateKernel)(self.program, c_name.as_ptr(), &mut err) };
        if err != CL_SUCCESS {
            return Err(KernelBuildError::KernelNotFound {
                name,
                status: ClStatus(err),
            });
        }
        debug!(kernel = name, "Created OpenCL kernel");
        Ok(Kernel {
            lib: self.lib.clone(),
            kernel: raw,
            name,
        })
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        // SAFETY: we own the only reference created by clCreateProgramWithSource.
        let status = unsafe { (self.lib.api.clReleaseProgram)(self.program) };
        if let Err(e) = check_cl_status(status, "clReleaseProgram") {
            error!(error = %e, "Failed to release OpenCL program");
        }
    }
}

/// A kernel object, released on drop.
///
/// Argument setting is not thread-safe in OpenCL; callers serialize access.
pub struct Kernel {
    lib: Arc<ClLibrary>,
    kernel: cl_kernel,
    name: &'static str,
}

// SAFETY: see the type docs; `&mut self` on the arg setters enforces
// exclusive access for argument updates.
unsafe impl Send for Kernel {}
unsafe impl Sync for Kernel {}

impl Kernel {
    pub fn raw(&self) -> cl_kernel {
        self.kernel
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bind a memory object (image or buffer) argument.
    pub fn set_mem_arg(&mut self, index: cl_uint, mem: cl_mem) -> Result<(), ClError> {
        // SAFETY: the value is a cl_mem handle read by the driver during the call.
        let status = unsafe {
            (self.lib.api.clSetKernelArg)(
                self.kernel,
                index,
                std::mem::size_of::<cl_mem>(),
                (&mem as *const cl_mem).cast::<c_void>(),
            )
        };
        check_cl_status(status, "clSetKernelArg")
    }

    /// Bind an `int` argument.
    pub fn set_int_arg(&mut self, index: cl_uint, value: usize) -> Result<(), ClError> {
        let value = i32::try_from(value).map_err(|_| ClError::InvalidKernelArg {
            kernel: self.name,
            reason: format!("argument {index} value {value} does not fit in int"),
        })?;
        // SAFETY: the value is a plain i32 read by the driver during the call.
        let status = unsafe {
            (self.lib.api.clSetKernelArg)(
                self.kernel,
                index,
                std::mem::size_of::<i32>(),
                (&value as *const i32).cast::<c_void>(),
            )
        };
        check_cl_status(status, "clSetKernelArg")
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        // SAFETY: we own the only reference created by clCreateKernel.
        let status = unsafe { (self.lib.api.clReleaseKernel)(self.kernel) };
        if let Err(e) = check_cl_status(status, "clReleaseKernel") {
            error!(kernel = self.name, error = %e, "Failed to release OpenCL kernel");
        }
    }
}

/// Global work size for a kernel that processes one 2x2 pixel block per
/// work-item, rounded up to whole work-groups when a local size is set.
pub fn global_work_size(cols: usize, rows: usize, local: Option<[usize; 2]>) -> [usize; 2] {
    let blocks = [cols / 2, rows / 2];
    match local {
        Some([lx, ly]) if lx > 0 && ly > 0 => {
            [blocks[0].div_ceil(lx) * lx, blocks[1].div_ceil(ly) * ly]
        }
        _ => blocks,
    }
}
