//! `vacl-interop` -- move NV12 video surfaces between VA-API and host or
//! OpenCL memory.
//!
//! [`InteropContext::negotiate`] picks a backend once per display:
//!
//! - **shared**: surface planes are imported into an OpenCL context through
//!   `cl_intel_va_api_media_sharing` and converted by device kernels, without
//!   a host copy of the surface.
//! - **copy**: the surface is derived, mapped and converted on the CPU. Used
//!   whenever sharing is disabled or unavailable.
//!
//! Upload takes a continuous BGRA [`Frame`](vacl_common::Frame); download
//! returns one. Arguments are validated before any native call.
//!
//! ```ignore
//! use vacl_common::{Frame, InteropConfig, Resolution, SurfaceId};
//! use vacl_interop::InteropContext;
//! use vacl_va::{DrmDisplay, VaLibrary};
//!
//! let display = DrmDisplay::open(VaLibrary::shared()?, &InteropConfig::default())?;
//! let ctx = InteropContext::negotiate(display.handle(), true)?;
//! let size = Resolution::new(1920, 1080);
//! ctx.upload(display.handle(), &Frame::bgra(size)?, SurfaceId(surface), size)?;
//! let frame = ctx.download(display.handle(), SurfaceId(surface), size)?;
//! ```

pub mod backend;
pub mod context;
pub mod convert;
pub mod guard;
pub mod kernels;
pub mod validate;

pub use backend::{Backend, CopyBackend, NoSharing, SharedBackend, SurfaceTransfer};
pub use context::{DefaultSharing, InteropContext};
pub use guard::{AcquiredPlanes, DerivedImage, MappedImage};
