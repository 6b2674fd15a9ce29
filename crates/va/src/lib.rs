//! `vacl-va` -- VA-API access for surface interop.
//!
//! libva and libva-drm are loaded at runtime with `libloading`, so binaries
//! built against this crate start on systems without VA-API and report the
//! missing library as an error instead of failing to link.
//!
//! - [`ffi`] -- raw bindings and the [`VaLibrary`] function table
//! - [`surface`] -- [`vacl_common::SurfaceApi`] for the mapped-copy path
//! - [`drm`] -- adapter discovery in sysfs and [`DrmDisplay`]
//!
//! # Usage
//!
//! ```ignore
//! use vacl_common::InteropConfig;
//! use vacl_va::{DrmDisplay, VaLibrary};
//!
//! let config = InteropConfig::default();
//! let display = DrmDisplay::open(VaLibrary::shared()?, &config)?;
//! let handle = display.handle();
//! ```

pub mod drm;
pub mod error;
pub mod ffi;
pub mod surface;

pub use drm::{find_adapter, node_candidates, DrmDisplay};
pub use error::{VaError, VaLoadError};
pub use ffi::{VaLibrary, VA_FOURCC_NV12};
