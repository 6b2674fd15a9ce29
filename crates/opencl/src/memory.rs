//! RAII wrapper around `cl_mem` objects.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::check_cl_status;
use crate::ffi::{cl_mem, ClLibrary};

/// Owned OpenCL memory object: a device buffer or a shared surface plane.
///
/// Released with `clReleaseMemObject` on drop.
pub struct MemObject {
    lib: Arc<ClLibrary>,
    mem: cl_mem,
    /// Byte size for buffers; 0 for surface planes whose size the driver owns.
    size: usize,
    label: &'static str,
}

// SAFETY: cl_mem handles are reference-counted, thread-safe OpenCL objects.
unsafe impl Send for MemObject {}
unsafe impl Sync for MemObject {}

impl MemObject {
    /// Take ownership of a freshly created memory object.
    ///
    /// # Safety
    /// `mem` must be a valid memory object whose single reference is
    /// transferred to the returned value.
    pub unsafe fn from_raw(
        lib: Arc<ClLibrary>,
        mem: cl_mem,
        size: usize,
        label: &'static str,
    ) -> Self {
        debug!(label, size, "Created OpenCL memory object");
        Self {
            lib,
            mem,
            size,
            label,
        }
    }

    pub fn raw(&self) -> cl_mem {
        self.mem
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl std::fmt::Debug for MemObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemObject")
            .field("mem", &self.mem)
            .field("size", &self.size)
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for MemObject {
    fn drop(&mut self) {
        // SAFETY: we own one reference to `mem`, released exactly once here.
        let status = unsafe { (self.lib.api.clReleaseMemObject)(self.mem) };
        if let Err(e) = check_cl_status(status, "clReleaseMemObject") {
            error!(label = self.label, error = %e, "Failed to release OpenCL memory object");
        }
    }
}
