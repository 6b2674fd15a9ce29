//! OpenCL specific error types and status decoding.

use std::fmt;

use thiserror::Error;

use vacl_common::{InteropError, NativeApi};

use crate::ffi::{cl_int, CL_SUCCESS};

/// Errors that can occur when loading the OpenCL ICD loader.
#[derive(Debug, Clone, Error)]
pub enum ClLoadError {
    #[error("OpenCL library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),
}

/// An OpenCL status code, displayed with its symbolic name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClStatus(pub cl_int);

impl ClStatus {
    pub fn name(self) -> &'static str {
        cl_status_name(self.0)
    }
}

impl fmt::Display for ClStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// OpenCL backend error type.
#[derive(Debug, Error)]
pub enum ClError {
    /// An OpenCL call returned a non-success status.
    #[error("{call} failed: {status}")]
    Status { call: &'static str, status: ClStatus },

    /// Platforms could not be counted or listed.
    #[error("OpenCL platform enumeration failed: {0}")]
    Enumeration(String),

    /// An argument does not fit the kernel's parameter type.
    #[error("Invalid argument for kernel '{kernel}': {reason}")]
    InvalidKernelArg { kernel: &'static str, reason: String },

    #[error(transparent)]
    Load(#[from] ClLoadError),
}

/// Errors building the conversion program or creating its kernels.
#[derive(Debug, Error)]
pub enum KernelBuildError {
    /// `clBuildProgram` failed; `log` is the device build log.
    #[error("Program build failed with {status}:\n{log}")]
    Build { status: ClStatus, log: String },

    #[error("Kernel '{name}' could not be created: {status}")]
    KernelNotFound { name: &'static str, status: ClStatus },

    #[error("Kernel source contains an interior NUL byte")]
    InvalidSource,

    #[error(transparent)]
    Cl(#[from] ClError),
}

/// Check an OpenCL status code and convert to a Result.
pub fn check_cl_status(status: cl_int, call: &'static str) -> Result<(), ClError> {
    if status == CL_SUCCESS {
        Ok(())
    } else {
        Err(ClError::Status {
            call,
            status: ClStatus(status),
        })
    }
}

/// Symbolic name of an OpenCL status code.
pub fn cl_status_name(status: cl_int) -> &'static str {
    match status {
        0 => "CL_SUCCESS",
        -1 => "CL_DEVICE_NOT_FOUND",
        -2 => "CL_DEVICE_NOT_AVAILABLE",
        -3 => "CL_COMPILER_NOT_AVAILABLE",
        -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
        -5 => "CL_OUT_OF_RESOURCES",
        -6 => "CL_OUT_OF_HOST_MEMORY",
        -11 => "CL_BUILD_PROGRAM_FAILURE",
        -30 => "CL_INVALID_VALUE",
        -31 => "CL_INVALID_DEVICE_TYPE",
        -32 => "CL_INVALID_PLATFORM",
        -33 => "CL_INVALID_DEVICE",
        -34 => "CL_INVALID_CONTEXT",
        -35 => "CL_INVALID_QUEUE_PROPERTIES",
        -36 => "CL_INVALID_COMMAND_QUEUE",
        -37 => "CL_INVALID_HOST_PTR",
        -38 => "CL_INVALID_MEM_OBJECT",
        -43 => "CL_INVALID_BUILD_OPTIONS",
        -44 => "CL_INVALID_PROGRAM",
        -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
        -46 => "CL_INVALID_KERNEL_NAME",
        -48 => "CL_INVALID_KERNEL",
        -49 => "CL_INVALID_ARG_INDEX",
        -50 => "CL_INVALID_ARG_VALUE",
        -51 => "CL_INVALID_ARG_SIZE",
        -52 => "CL_INVALID_KERNEL_ARGS",
        -53 => "CL_INVALID_WORK_DIMENSION",
        -54 => "CL_INVALID_WORK_GROUP_SIZE",
        -59 => "CL_INVALID_OPERATION",
        -61 => "CL_INVALID_BUFFER_SIZE",
        -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
        -64 => "CL_INVALID_PROPERTY",
        -1001 => "CL_PLATFORM_NOT_FOUND_KHR",
        -1098 => "CL_INVALID_VA_API_MEDIA_ADAPTER_INTEL",
        -1099 => "CL_INVALID_VA_API_MEDIA_SURFACE_INTEL",
        -1100 => "CL_VA_API_MEDIA_SURFACE_ALREADY_ACQUIRED_INTEL",
        -1101 => "CL_VA_API_MEDIA_SURFACE_NOT_ACQUIRED_INTEL",
        _ => "CL_UNKNOWN_ERROR",
    }
}

impl From<ClError> for InteropError {
    fn from(err: ClError) -> Self {
        match err {
            ClError::Status { call, status } => {
                InteropError::native(NativeApi::OpenCl, call, status.0, status.name())
            }
            ClError::Enumeration(reason) => InteropError::Init {
                api: NativeApi::OpenCl,
                reason,
            },
            ClError::InvalidKernelArg { kernel, reason } => InteropError::Kernel {
                kernel: kernel.to_string(),
                reason,
            },
            ClError::Load(e) => e.into(),
        }
    }
}

impl From<ClLoadError> for InteropError {
    fn from(err: ClLoadError) -> Self {
        InteropError::LibraryLoad {
            api: NativeApi::OpenCl,
            reason: err.to_string(),
        }
    }
}

impl From<KernelBuildError> for InteropError {
    fn from(err: KernelBuildError) -> Self {
        match err {
            KernelBuildError::KernelNotFound { name, status } => InteropError::Kernel {
                kernel: name.to_string(),
                reason: format!("clCreateKernel failed: {status}"),
            },
            KernelBuildError::Cl(e) => e.into(),
            other => InteropError::Kernel {
                kernel: "nv12_bgra".to_string(),
                reason: other.to_string(),
            },
        }
    }
}
