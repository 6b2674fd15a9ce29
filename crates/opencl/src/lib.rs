//! `vacl-opencl` -- OpenCL with the Intel VA-API media sharing extension.
//!
//! The ICD loader is opened at runtime with `libloading`; extension entry
//! points are resolved per platform. A [`SharingContext`] owns one context,
//! device and queue bound to a VA display plus the compiled NV12/BGRA
//! conversion kernels, and implements [`vacl_common::MediaSharing`].
//! [`ClRuntime`] implements [`vacl_common::ComputeRuntime`] for negotiation.
//!
//! - [`ffi`] -- core bindings and the [`ClLibrary`] function table
//! - [`platform`] -- platform enumeration and info strings
//! - [`media`] -- the four `cl_intel_va_api_media_sharing` entry points
//! - [`context`] -- sharing context and plane/buffer operations
//! - [`kernel`] -- program build (with build log) and kernel arguments
//! - [`memory`] -- RAII `cl_mem`

pub mod context;
pub mod error;
pub mod ffi;
pub mod kernel;
pub mod media;
pub mod memory;
pub mod platform;
pub mod runtime;

pub use context::{DeviceContext, SharingContext};
pub use error::{check_cl_status, cl_status_name, ClError, ClLoadError, ClStatus, KernelBuildError};
pub use ffi::ClLibrary;
pub use kernel::ProgramSource;
pub use media::MediaSharingFns;
pub use memory::MemObject;
pub use platform::ClPlatform;
pub use runtime::ClRuntime;
