//! The Intel VA-API media sharing extension (`cl_intel_va_api_media_sharing`).
//!
//! Extension entry points are not exported by the ICD loader; they are looked
//! up per platform with `clGetExtensionFunctionAddressForPlatform`. A platform
//! shares VA surfaces only if all four resolve.

use std::ffi::{c_void, CStr};
use std::mem::transmute;
use std::ptr;

use tracing::debug;

use vacl_common::DisplayHandle;

use crate::error::{check_cl_status, ClError};
use crate::ffi::{
    cl_command_queue, cl_context, cl_device_id, cl_event, cl_int, cl_mem, cl_mem_flags, cl_platform_id,
    cl_uint, ClLibrary, CL_PREFERRED_DEVICES_FOR_VA_API_INTEL, CL_VA_API_DISPLAY_INTEL,
};

pub type GetDeviceIdsFromVaApiMediaAdapterFn = unsafe extern "C" fn(
    platform: cl_platform_id,
    media_adapter_type: cl_uint,
    media_adapter: *mut c_void,
    media_adapter_set: cl_uint,
    num_entries: cl_uint,
    devices: *mut cl_device_id,
    num_devices: *mut cl_uint,
) -> cl_int;

pub type CreateFromVaApiMediaSurfaceFn = unsafe extern "C" fn(
    context: cl_context,
    flags: cl_mem_flags,
    surface: *mut u32,
    plane: cl_uint,
    errcode_ret: *mut cl_int,
) -> cl_mem;

pub type EnqueueVaApiMediaSurfacesFn = unsafe extern "C" fn(
    queue: cl_command_queue,
    num_objects: cl_uint,
    mem_objects: *const cl_mem,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int;

/// Resolved extension entry points for one platform.
#[derive(Copy, Clone)]
pub struct MediaSharingFns {
    pub get_device_ids: GetDeviceIdsFromVaApiMediaAdapterFn,
    pub create_from_surface: CreateFromVaApiMediaSurfaceFn,
    pub enqueue_acquire: EnqueueVaApiMediaSurfacesFn,
    pub enqueue_release: EnqueueVaApiMediaSurfacesFn,
}

impl std::fmt::Debug for MediaSharingFns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSharingFns").finish_non_exhaustive()
    }
}

const GET_DEVICE_IDS: &CStr = c"clGetDeviceIDsFromVA_APIMediaAdapterINTEL";
const CREATE_FROM_SURFACE: &CStr = c"clCreateFromVA_APIMediaSurfaceINTEL";
const ENQUEUE_ACQUIRE: &CStr = c"clEnqueueAcquireVA_APIMediaSurfacesINTEL";
const ENQUEUE_RELEASE: &CStr = c"clEnqueueReleaseVA_APIMediaSurfacesINTEL";

impl MediaSharingFns {
    /// Resolve all four entry points on `platform`, or `None` if any is missing.
    pub fn resolve(lib: &ClLibrary, platform: cl_platform_id) -> Option<Self> {
        let lookup = |name: &CStr| {
            // SAFETY: `name` is NUL-terminated; the loader returns null for
            // unknown names.
            let addr =
                unsafe { (lib.api.clGetExtensionFunctionAddressForPlatform)(platform, name.as_ptr()) };
            if addr.is_null() {
                debug!(function = ?name, "Extension function not found on platform");
                None
            } else {
                Some(addr)
            }
        };

        let get_device_ids = lookup(GET_DEVICE_IDS)?;
        let create_from_surface = lookup(CREATE_FROM_SURFACE)?;
        let enqueue_acquire = lookup(ENQUEUE_ACQUIRE)?;
        let enqueue_release = lookup(ENQUEUE_RELEASE)?;

        // SAFETY: the addresses were returned for these exact names, whose
        // signatures are defined by cl_va_api_media_sharing_intel.h.
        unsafe {
            Some(Self {
                get_device_ids: transmute::<*mut c_void, GetDeviceIdsFromVaApiMediaAdapterFn>(
                    get_device_ids,
                ),
                create_from_surface: transmute::<*mut c_void, CreateFromVaApiMediaSurfaceFn>(
                    create_from_surface,
                ),
                enqueue_acquire: transmute::<*mut c_void, EnqueueVaApiMediaSurfacesFn>(
                    enqueue_acquire,
                ),
                enqueue_release: transmute::<*mut c_void, EnqueueVaApiMediaSurfacesFn>(
                    enqueue_release,
                ),
            })
        }
    }

    /// First preferred device of `platform` for `display`.
    ///
    /// `Ok(None)` when the platform reports no device for the display.
    pub fn preferred_device(
        &self,
        platform: cl_platform_id,
        display: DisplayHandle,
    ) -> Result<Option<cl_device_id>, ClError> {
        let mut count: cl_uint = 0;
        // SAFETY: count query; `display` is an initialized VADisplay owned by
        // the caller.
        let status = unsafe {
            (self.get_device_ids)(
                platform,
                CL_VA_API_DISPLAY_INTEL,
                display.as_raw(),
                CL_PREFERRED_DEVICES_FOR_VA_API_INTEL,
                0,
                ptr::null_mut(),
                &mut count,
            )
        };
        check_cl_status(status, "clGetDeviceIDsFromVA_APIMediaAdapterINTEL")?;
        if count == 0 {
            return Ok(None);
        }

        // Only one device is used even when several are preferred.
        let mut device: cl_device_id = ptr::null_mut();
        // SAFETY: room for exactly one entry.
        let status = unsafe {
            (self.get_device_ids)(
                platform,
                CL_VA_API_DISPLAY_INTEL,
                display.as_raw(),
                CL_PREFERRED_DEVICES_FOR_VA_API_INTEL,
                1,
                &mut device,
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clGetDeviceIDsFromVA_APIMediaAdapterINTEL")?;
        Ok((!device.is_null()).then_some(device))
    }
}
