//! Platform enumeration and info queries.

use std::ffi::c_void;
use std::ptr;

use tracing::{debug, info};

use crate::error::{check_cl_status, ClError};
use crate::ffi::{
    cl_device_id, cl_platform_id, cl_uint, ClLibrary, CL_DEVICE_NAME, CL_PLATFORM_EXTENSIONS,
    CL_PLATFORM_NAME, CL_PLATFORM_VENDOR, CL_PLATFORM_VERSION, VA_API_MEDIA_SHARING_EXTENSION,
};

/// An OpenCL platform with its descriptive strings cached at enumeration.
#[derive(Clone, Debug)]
pub struct ClPlatform {
    pub id: cl_platform_id,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub extensions: String,
}

impl ClPlatform {
    /// Whether the platform advertises the VA-API media sharing extension.
    ///
    /// Advisory only; negotiation decides on the resolved entry points.
    pub fn advertises_media_sharing(&self) -> bool {
        self.extensions
            .split_whitespace()
            .any(|ext| ext == VA_API_MEDIA_SHARING_EXTENSION)
    }
}

/// Trim the trailing NUL (and anything after it) from an info string.
fn info_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl ClLibrary {
    /// Enumerate all platforms.
    ///
    /// Failing to count platforms, finding none, or failing to list them are
    /// all errors: the ICD loader is present but unusable.
    pub fn platforms(&self) -> Result<Vec<ClPlatform>, ClError> {
        let mut count: cl_uint = 0;
        // SAFETY: querying the count only; `count` is a valid out-pointer.
        let status = unsafe { (self.api.clGetPlatformIDs)(0, ptr::null_mut(), &mut count) };
        check_cl_status(status, "clGetPlatformIDs")
            .map_err(|e| ClError::Enumeration(format!("can't get number of platforms: {e}")))?;
        if count == 0 {
            return Err(ClError::Enumeration("no OpenCL platforms".to_string()));
        }

        let mut ids: Vec<cl_platform_id> = vec![ptr::null_mut(); count as usize];
        // SAFETY: `ids` has room for exactly `count` entries.
        let status =
            unsafe { (self.api.clGetPlatformIDs)(count, ids.as_mut_ptr(), ptr::null_mut()) };
        check_cl_status(status, "clGetPlatformIDs")
            .map_err(|e| ClError::Enumeration(format!("can't get platform ids: {e}")))?;

        let platforms = ids
            .into_iter()
            .map(|id| ClPlatform {
                id,
                name: self.platform_info(id, CL_PLATFORM_NAME).unwrap_or_default(),
                vendor: self.platform_info(id, CL_PLATFORM_VENDOR).unwrap_or_default(),
                version: self.platform_info(id, CL_PLATFORM_VERSION).unwrap_or_default(),
                extensions: self
                    .platform_info(id, CL_PLATFORM_EXTENSIONS)
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        info!(count = platforms.len(), "Enumerated OpenCL platforms");
        for platform in &platforms {
            debug!(
                name = %platform.name,
                vendor = %platform.vendor,
                version = %platform.version,
                media_sharing = platform.advertises_media_sharing(),
                "OpenCL platform"
            );
        }
        Ok(platforms)
    }

    /// Query a string-valued platform parameter.
    pub fn platform_info(&self, platform: cl_platform_id, param: cl_uint) -> Result<String, ClError> {
        let mut size = 0usize;
        // SAFETY: size query with a null value pointer.
        let status = unsafe {
            (self.api.clGetPlatformInfo)(platform, param, 0, ptr::null_mut(), &mut size)
        };
        check_cl_status(status, "clGetPlatformInfo")?;

        let mut bytes = vec![0u8; size];
        // SAFETY: `bytes` holds `size` bytes as reported above.
        let status = unsafe {
            (self.api.clGetPlatformInfo)(
                platform,
                param,
                size,
                bytes.as_mut_ptr().cast::<c_void>(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clGetPlatformInfo")?;
        Ok(info_string(&bytes))
    }

    /// Device name for logging.
    pub fn device_name(&self, device: cl_device_id) -> Result<String, ClError> {
        let mut size = 0usize;
        // SAFETY: size query with a null value pointer.
        let status = unsafe {
            (self.api.clGetDeviceInfo)(device, CL_DEVICE_NAME, 0, ptr::null_mut(), &mut size)
        };
        check_cl_status(status, "clGetDeviceInfo")?;

        let mut bytes = vec![0u8; size];
        // SAFETY: `bytes` holds `size` bytes as reported above.
        let status = unsafe {
            (self.api.clGetDeviceInfo)(
                device,
                CL_DEVICE_NAME,
                size,
                bytes.as_mut_ptr().cast::<c_void>(),
                ptr::null_mut(),
            )
        };
        check_cl_status(status, "clGetDeviceInfo")?;
        Ok(info_string(&bytes))
    }
}
