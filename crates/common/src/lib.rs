//! `vacl-common`: Shared types, traits, and errors for VA-API / OpenCL surface interop.
//!
//! This crate is the foundation the driver crates (`vacl-va`, `vacl-opencl`)
//! and the interop crate depend on. It defines:
//!
//! - **Types**: `Resolution`, `SurfaceId`, `DisplayHandle` (newtypes for safety)
//! - **Frames**: `Frame`, the host-side packed image passed to upload/download
//! - **Driver seams**: `SurfaceApi`, `MediaSharing`, `ComputeRuntime`
//! - **Errors**: `InteropError` and its three families (thiserror-based)
//! - **Config**: `InteropConfig`, `SharingMode`

pub mod color;
pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod types;

// Re-export commonly used items at crate root
pub use color::PixelFormat;
pub use config::{InteropConfig, SharingMode};
pub use driver::{
    Access, BufferId, ComputeRuntime, ConvertKernel, ImageDesc, ImageId, MediaSharing, Plane,
    SurfaceApi,
};
pub use error::{InteropError, InteropResult, NativeApi};
pub use frame::Frame;
pub use types::{DisplayHandle, Resolution, SurfaceId};
