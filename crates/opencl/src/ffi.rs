//! Raw FFI bindings for the OpenCL ICD loader.
//!
//! Loaded dynamically at runtime via `libloading`. Only the core entry points
//! needed to enumerate platforms, build the conversion program and run it are
//! bound here; the Intel VA-API media sharing extension is resolved per
//! platform in [`crate::media`].
//!
//! Reference: Khronos `cl.h`, `cl_va_api_media_sharing_intel.h`.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use libloading::Library;
use tracing::{debug, info};

use crate::error::ClLoadError;

// ---------------------------------------------------------------------------
// Handle and scalar types
// ---------------------------------------------------------------------------

pub type cl_platform_id = *mut c_void;
pub type cl_device_id = *mut c_void;
pub type cl_context = *mut c_void;
pub type cl_command_queue = *mut c_void;
pub type cl_mem = *mut c_void;
pub type cl_program = *mut c_void;
pub type cl_kernel = *mut c_void;
pub type cl_event = *mut c_void;

pub type cl_int = i32;
pub type cl_uint = u32;
pub type cl_bool = u32;
pub type cl_bitfield = u64;
pub type cl_mem_flags = cl_bitfield;
pub type cl_command_queue_properties = cl_bitfield;
pub type cl_context_properties = isize;
pub type cl_platform_info = cl_uint;
pub type cl_device_info = cl_uint;
pub type cl_program_build_info = cl_uint;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CL_SUCCESS: cl_int = 0;
pub const CL_FALSE: cl_bool = 0;
pub const CL_TRUE: cl_bool = 1;

pub const CL_PLATFORM_VERSION: cl_platform_info = 0x0901;
pub const CL_PLATFORM_NAME: cl_platform_info = 0x0902;
pub const CL_PLATFORM_VENDOR: cl_platform_info = 0x0903;
pub const CL_PLATFORM_EXTENSIONS: cl_platform_info = 0x0904;

pub const CL_DEVICE_NAME: cl_device_info = 0x102B;

pub const CL_PROGRAM_BUILD_LOG: cl_program_build_info = 0x1183;

pub const CL_MEM_READ_WRITE: cl_mem_flags = 1 << 0;
pub const CL_MEM_WRITE_ONLY: cl_mem_flags = 1 << 1;
pub const CL_MEM_READ_ONLY: cl_mem_flags = 1 << 2;

pub const CL_CONTEXT_INTEROP_USER_SYNC: cl_context_properties = 0x1085;

// cl_va_api_media_sharing_intel
pub const CL_VA_API_DISPLAY_INTEL: cl_uint = 0x4094;
pub const CL_PREFERRED_DEVICES_FOR_VA_API_INTEL: cl_uint = 0x4095;
pub const CL_ALL_DEVICES_FOR_VA_API_INTEL: cl_uint = 0x4096;
pub const CL_CONTEXT_VA_API_DISPLAY_INTEL: cl_context_properties = 0x4097;
pub const CL_MEM_VA_API_MEDIA_SURFACE_INTEL: cl_uint = 0x4098;
pub const CL_IMAGE_VA_API_PLANE_INTEL: cl_uint = 0x4099;
pub const CL_COMMAND_ACQUIRE_VA_API_MEDIA_SURFACES_INTEL: cl_uint = 0x409A;
pub const CL_COMMAND_RELEASE_VA_API_MEDIA_SURFACES_INTEL: cl_uint = 0x409B;

/// Name of the media sharing extension in `CL_PLATFORM_EXTENSIONS`.
pub const VA_API_MEDIA_SHARING_EXTENSION: &str = "cl_intel_va_api_media_sharing";

// ---------------------------------------------------------------------------
// Function pointer table
// ---------------------------------------------------------------------------

pub type ContextNotifyFn =
    unsafe extern "C" fn(errinfo: *const c_char, info: *const c_void, cb: usize, user: *mut c_void);

pub type BuildNotifyFn = unsafe extern "C" fn(program: cl_program, user: *mut c_void);

/// Core OpenCL function pointer table. Signatures match `cl.h`.
#[allow(non_snake_case)]
pub struct ClFunctionList {
    pub clGetPlatformIDs: unsafe extern "C" fn(
        num_entries: cl_uint,
        platforms: *mut cl_platform_id,
        num_platforms: *mut cl_uint,
    ) -> cl_int,

    pub clGetPlatformInfo: unsafe extern "C" fn(
        platform: cl_platform_id,
        param_name: cl_platform_info,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int,

    pub clGetDeviceInfo: unsafe extern "C" fn(
        device: cl_device_id,
        param_name: cl_device_info,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int,

    pub clGetExtensionFunctionAddressForPlatform:
        unsafe extern "C" fn(platform: cl_platform_id, func_name: *const c_char) -> *mut c_void,

    pub clReleaseDevice: unsafe extern "C" fn(device: cl_device_id) -> cl_int,

    pub clCreateContext: unsafe extern "C" fn(
        properties: *const cl_context_properties,
        num_devices: cl_uint,
        devices: *const cl_device_id,
        pfn_notify: Option<ContextNotifyFn>,
        user_data: *mut c_void,
        errcode_ret: *mut cl_int,
    ) -> cl_context,

    pub clReleaseContext: unsafe extern "C" fn(context: cl_context) -> cl_int,

    pub clCreateCommandQueue: unsafe extern "C" fn(
        context: cl_context,
        device: cl_device_id,
        properties: cl_command_queue_properties,
        errcode_ret: *mut cl_int,
    ) -> cl_command_queue,

    pub clReleaseCommandQueue: unsafe extern "C" fn(queue: cl_command_queue) -> cl_int,

    pub clCreateProgramWithSource: unsafe extern "C" fn(
        context: cl_context,
        count: cl_uint,
        strings: *const *const c_char,
        lengths: *const usize,
        errcode_ret: *mut cl_int,
    ) -> cl_program,

    pub clBuildProgram: unsafe extern "C" fn(
        program: cl_program,
        num_devices: cl_uint,
        device_list: *const cl_device_id,
        options: *const c_char,
        pfn_notify: Option<BuildNotifyFn>,
        user_data: *mut c_void,
    ) -> cl_int,

    pub clGetProgramBuildInfo: unsafe extern "C" fn(
        program: cl_program,
        device: cl_device_id,
        param_name: cl_program_build_info,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int,

    pub clReleaseProgram: unsafe extern "C" fn(program: cl_program) -> cl_int,

    pub clCreateKernel: unsafe extern "C" fn(
        program: cl_program,
        kernel_name: *const c_char,
        errcode_ret: *mut cl_int,
    ) -> cl_kernel,

    pub clReleaseKernel: unsafe extern "C" fn(kernel: cl_kernel) -> cl_int,

    pub clSetKernelArg: unsafe extern "C" fn(
        kernel: cl_kernel,
        arg_index: cl_uint,
        arg_size: usize,
        arg_value: *const c_void,
    ) -> cl_int,

    pub clCreateBuffer: unsafe extern "C" fn(
        context: cl_context,
        flags: cl_mem_flags,
        size: usize,
        host_ptr: *mut c_void,
        errcode_ret: *mut cl_int,
    ) -> cl_mem,

    pub clReleaseMemObject: unsafe extern "C" fn(memobj: cl_mem) -> cl_int,

    pub clEnqueueWriteBuffer: unsafe extern "C" fn(
        queue: cl_command_queue,
        buffer: cl_mem,
        blocking_write: cl_bool,
        offset: usize,
        size: usize,
        ptr: *const c_void,
        num_events_in_wait_list: cl_uint,
        event_wait_list: *const cl_event,
        event: *mut cl_event,
    ) -> cl_int,

    pub clEnqueueReadBuffer: unsafe extern "C" fn(
        queue: cl_command_queue,
        buffer: cl_mem,
        blocking_read: cl_bool,
        offset: usize,
        size: usize,
        ptr: *mut c_void,
        num_events_in_wait_list: cl_uint,
        event_wait_list: *const cl_event,
        event: *mut cl_event,
    ) -> cl_int,

    pub clEnqueueNDRangeKernel: unsafe extern "C" fn(
        queue: cl_command_queue,
        kernel: cl_kernel,
        work_dim: cl_uint,
        global_work_offset: *const usize,
        global_work_size: *const usize,
        local_work_size: *const usize,
        num_events_in_wait_list: cl_uint,
        event_wait_list: *const cl_event,
        event: *mut cl_event,
    ) -> cl_int,

    pub clFinish: unsafe extern "C" fn(queue: cl_command_queue) -> cl_int,
}

// ---------------------------------------------------------------------------
// Dynamic library wrapper
// ---------------------------------------------------------------------------

/// Dynamically loaded OpenCL ICD loader with the core API table.
pub struct ClLibrary {
    /// Library handle -- must outlive every function pointer in `api`.
    _lib: Library,
    pub api: ClFunctionList,
}

// SAFETY: ClLibrary holds the library handle and plain function pointers.
// OpenCL API calls are thread-safe except clSetKernelArg, which callers
// serialize per kernel.
unsafe impl Send for ClLibrary {}
unsafe impl Sync for ClLibrary {}

impl std::fmt::Debug for ClLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClLibrary").field("loaded", &true).finish()
    }
}

const OPENCL_NAMES: &[&str] = &["libOpenCL.so.1", "libOpenCL.so"];

static SHARED: OnceLock<Result<Arc<ClLibrary>, ClLoadError>> = OnceLock::new();

/// Look up one symbol and copy the function pointer out of it.
///
/// # Safety
/// `T` must be the exact function pointer type of the symbol `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, ClLoadError> {
    lib.get::<T>(name).map(|sym| *sym).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        ClLoadError::SymbolNotFound(format!("{printable}: {e}"))
    })
}

impl ClLibrary {
    /// Process-wide OpenCL loader, loaded from the system paths on first use.
    ///
    /// A failed load is remembered; later calls return the same error.
    pub fn shared() -> Result<Arc<Self>, ClLoadError> {
        SHARED.get_or_init(|| Self::load().map(Arc::new)).clone()
    }

    /// Load the ICD loader from the default system paths.
    pub fn load() -> Result<Self, ClLoadError> {
        Self::load_from(None)
    }

    /// Load from an explicit path, or the system names when `None`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ClLoadError> {
        let lib = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading OpenCL library from custom path");
                // SAFETY: Loading a user-specified shared library that the
                // caller asserts is an OpenCL ICD loader.
                unsafe { Library::new(path) }.map_err(|e| {
                    ClLoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display()))
                })?
            }
            None => Self::open_system()?,
        };
        Self::load_functions(lib)
    }

    fn open_system() -> Result<Library, ClLoadError> {
        let mut last_error = String::new();
        for name in OPENCL_NAMES {
            // SAFETY: Loading the system ICD loader; its initializers only
            // read the ICD vendor registry.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    info!(library = %name, "Loaded OpenCL library");
                    return Ok(lib);
                }
                Err(e) => last_error = format!("{name}: {e}"),
            }
        }
        Err(ClLoadError::LibraryNotFound(format!(
            "{last_error}. Is an OpenCL ICD loader installed?"
        )))
    }

    fn load_functions(lib: Library) -> Result<Self, ClLoadError> {
        // SAFETY: every symbol below is a core OpenCL 1.2 entry point and the
        // field types match the Khronos headers.
        let api = unsafe {
            ClFunctionList {
                clGetPlatformIDs: symbol(&lib, b"clGetPlatformIDs\0")?,
                clGetPlatformInfo: symbol(&lib, b"clGetPlatformInfo\0")?,
                clGetDeviceInfo: symbol(&lib, b"clGetDeviceInfo\0")?,
                clGetExtensionFunctionAddressForPlatform: symbol(
                    &lib,
                    b"clGetExtensionFunctionAddressForPlatform\0",
                )?,
                clReleaseDevice: symbol(&lib, b"clReleaseDevice\0")?,
                clCreateContext: symbol(&lib, b"clCreateContext\0")?,
                clReleaseContext: symbol(&lib, b"clReleaseContext\0")?,
                clCreateCommandQueue: symbol(&lib, b"clCreateCommandQueue\0")?,
                clReleaseCommandQueue: symbol(&lib, b"clReleaseCommandQueue\0")?,
                clCreateProgramWithSource: symbol(&lib, b"clCreateProgramWithSource\0")?,
                clBuildProgram: symbol(&lib, b"clBuildProgram\0")?,
                clGetProgramBuildInfo: symbol(&lib, b"clGetProgramBuildInfo\0")?,
                clReleaseProgram: symbol(&lib, b"clReleaseProgram\0")?,
                clCreateKernel: symbol(&lib, b"clCreateKernel\0")?,
                clReleaseKernel: symbol(&lib, b"clReleaseKernel\0")?,
                clSetKernelArg: symbol(&lib, b"clSetKernelArg\0")?,
                clCreateBuffer: symbol(&lib, b"clCreateBuffer\0")?,
                clReleaseMemObject: symbol(&lib, b"clReleaseMemObject\0")?,
                clEnqueueWriteBuffer: symbol(&lib, b"clEnqueueWriteBuffer\0")?,
                clEnqueueReadBuffer: symbol(&lib, b"clEnqueueReadBuffer\0")?,
                clEnqueueNDRangeKernel: symbol(&lib, b"clEnqueueNDRangeKernel\0")?,
                clFinish: symbol(&lib, b"clFinish\0")?,
            }
        };

        debug!("All OpenCL symbols loaded successfully");
        Ok(Self { _lib: lib, api })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_flags_are_distinct_bits() {
        assert_eq!(CL_MEM_READ_WRITE | CL_MEM_WRITE_ONLY | CL_MEM_READ_ONLY, 0b111);
    }

    #[test]
    fn media_sharing_constants() {
        assert_eq!(CL_VA_API_DISPLAY_INTEL, 0x4094);
        assert_eq!(CL_PREFERRED_DEVICES_FOR_VA_API_INTEL, 0x4095);
        assert_eq!(CL_CONTEXT_VA_API_DISPLAY_INTEL, 0x4097);
        assert_eq!(CL_CONTEXT_INTEROP_USER_SYNC, 0x1085);
    }

    #[test]
    fn missing_library_path_is_reported() {
        let err = ClLibrary::load_from(Some(Path::new("/nonexistent/libOpenCL.so"))).unwrap_err();
        assert!(matches!(err, ClLoadError::LibraryNotFound(_)));
        assert!(err.to_string().contains("/nonexistent/libOpenCL.so"));
    }
}
