//! Caller-owned interop context: negotiation and the public transfer calls.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vacl_common::{
    ComputeRuntime, DisplayHandle, Frame, InteropConfig, InteropError, InteropResult,
    MediaSharing, NativeApi, PixelFormat, Resolution, SharingMode, SurfaceApi, SurfaceId,
};
use vacl_va::VaLibrary;

use crate::backend::{Backend, CopyBackend, SharedBackend, SurfaceTransfer};
use crate::validate;

#[cfg(not(feature = "opencl"))]
use crate::backend::NoSharing;

/// Sharing context used by [`InteropContext::negotiate`].
#[cfg(feature = "opencl")]
pub type DefaultSharing = vacl_opencl::SharingContext;

/// Sharing context used by [`InteropContext::negotiate`].
#[cfg(not(feature = "opencl"))]
pub type DefaultSharing = crate::backend::NoSharing;

/// Interop state for one VA display.
///
/// The backend is chosen once by negotiation and never changes. All methods
/// take `&self`; a context can be shared between threads.
pub struct InteropContext<S: SurfaceApi = VaLibrary, M: MediaSharing = DefaultSharing> {
    display: DisplayHandle,
    backend: Backend<S, M>,
}

impl InteropContext {
    /// Negotiate with the process-wide libva and OpenCL libraries.
    ///
    /// With `attempt_sharing` false, or when OpenCL or the sharing extension
    /// is unavailable, the context uses mapped copies. Only a broken OpenCL
    /// installation (platform enumeration failing) or a kernel build failure
    /// is an error.
    ///
    /// Each call returns an independent context that owns its own OpenCL
    /// context and queue, released when it is dropped. Negotiate once per
    /// display and share the result; repeating the call with the same
    /// display reaches the same backend choice but opens a second native
    /// context rather than reusing the first.
    pub fn negotiate(display: DisplayHandle, attempt_sharing: bool) -> InteropResult<Self> {
        let config =
            InteropConfig::default().with_sharing(SharingMode::from_attempt(attempt_sharing));
        Self::negotiate_with_config(display, &config)
    }

    /// Negotiate using library paths, sharing mode and kernel settings from `config`.
    pub fn negotiate_with_config(
        display: DisplayHandle,
        config: &InteropConfig,
    ) -> InteropResult<Self> {
        let surfaces = load_va(config)?;

        #[cfg(feature = "opencl")]
        {
            use vacl_opencl::{ClRuntime, ProgramSource};

            let runtime = if config.sharing.attempts_sharing() {
                match load_opencl(config) {
                    Ok(lib) => Some(ClRuntime::new(
                        lib,
                        ProgramSource {
                            source: crate::kernels::NV12_BGRA_SOURCE,
                            build_options: config.kernel_build_options.clone(),
                            local_work_size: config.local_work_size,
                        },
                    )),
                    Err(e) => {
                        debug!(error = %e, "OpenCL runtime not loadable");
                        None
                    }
                }
            } else {
                None
            };
            Self::negotiate_with(display, surfaces, runtime.as_ref(), config.sharing)
        }

        #[cfg(not(feature = "opencl"))]
        {
            Self::negotiate_with::<NoSharing>(display, surfaces, None, config.sharing)
        }
    }
}

fn load_va(config: &InteropConfig) -> InteropResult<Arc<VaLibrary>> {
    if config.libva_path.is_none() && config.libva_drm_path.is_none() {
        return Ok(VaLibrary::shared()?);
    }
    let lib = VaLibrary::load_from(
        config.libva_path.as_deref(),
        config.libva_drm_path.as_deref(),
    )?;
    Ok(Arc::new(lib))
}

#[cfg(feature = "opencl")]
fn load_opencl(
    config: &InteropConfig,
) -> Result<Arc<vacl_opencl::ClLibrary>, vacl_opencl::ClLoadError> {
    use vacl_opencl::ClLibrary;

    match config.opencl_path.as_deref() {
        Some(path) => ClLibrary::load_from(Some(path)).map(Arc::new),
        None => ClLibrary::shared(),
    }
}

impl<S: SurfaceApi, M: MediaSharing> InteropContext<S, M> {
    /// Negotiate against explicit drivers.
    ///
    /// `runtime` is `None` when no compute runtime could be loaded. Platforms
    /// are tried in enumeration order; the first that opens a sharing context
    /// for `display` wins.
    pub fn negotiate_with<R>(
        display: DisplayHandle,
        surfaces: Arc<S>,
        runtime: Option<&R>,
        mode: SharingMode,
    ) -> InteropResult<Self>
    where
        R: ComputeRuntime<Sharing = M>,
    {
        if !mode.attempts_sharing() {
            return Self::degrade(display, surfaces, mode, "sharing disabled by caller");
        }
        let Some(runtime) = runtime else {
            return Self::degrade(display, surfaces, mode, "OpenCL runtime unavailable");
        };

        let platforms = runtime.platforms()?;
        if platforms.is_empty() {
            return Err(InteropError::Init {
                api: NativeApi::OpenCl,
                reason: "no OpenCL platforms".to_string(),
            });
        }

        for platform in &platforms {
            let name = runtime.platform_name(platform);
            match runtime.open_sharing(platform, display)? {
                Some(sharing) => {
                    let display_handle = display;
                    info!(
                        platform = %name,
                        device = sharing.device_name(),
                        display = %display_handle,
                        "Negotiated VA-API/OpenCL surface sharing"
                    );
                    return Ok(Self {
                        display,
                        backend: Backend::Shared(SharedBackend::new(sharing)),
                    });
                }
                None => debug!(platform = %name, "Platform cannot share surfaces with display"),
            }
        }

        Self::degrade(
            display,
            surfaces,
            mode,
            "no OpenCL platform shares surfaces with this display",
        )
    }

    /// A context that always uses mapped copies.
    pub fn with_copy(display: DisplayHandle, surfaces: Arc<S>) -> Self {
        Self {
            display,
            backend: Backend::Copy(CopyBackend::new(surfaces)),
        }
    }

    fn degrade(
        display: DisplayHandle,
        surfaces: Arc<S>,
        mode: SharingMode,
        reason: &str,
    ) -> InteropResult<Self> {
        if mode == SharingMode::Require {
            return Err(InteropError::Unsupported(reason.to_string()));
        }
        let display_handle = display;
        warn!(display = %display_handle, reason, "Surface sharing unavailable, using mapped copies");
        Ok(Self::with_copy(display, surfaces))
    }

    /// Display the context was negotiated for.
    pub fn display(&self) -> DisplayHandle {
        self.display
    }

    pub fn backend(&self) -> &Backend<S, M> {
        &self.backend
    }

    /// True when transfers run through OpenCL surface sharing.
    pub fn is_sharing(&self) -> bool {
        self.backend.is_shared()
    }

    /// Convert the BGRA `frame` into the NV12 `surface` of `size`.
    ///
    /// `frame` must be continuous `Bgra8` with a zero offset and exactly
    /// `size`; otherwise an error is returned before the surface is touched.
    pub fn upload(
        &self,
        display: DisplayHandle,
        frame: &Frame,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<()> {
        validate::host_frame(frame, size)?;
        self.backend.upload(display, frame, surface, size)
    }

    /// Convert the NV12 `surface` into a newly allocated BGRA frame of `size`.
    pub fn download(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<Frame> {
        validate::surface_size(size)?;
        let mut frame = Frame::bgra(size)?;
        self.backend.download(display, surface, size, &mut frame)?;
        Ok(frame)
    }

    /// Convert the NV12 `surface` into `dst`.
    ///
    /// `dst` is re-allocated when its size or format differ from `size` /
    /// `Bgra8`. A matching frame must be continuous with a zero offset.
    pub fn download_into(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
        dst: &mut Frame,
    ) -> InteropResult<()> {
        validate::surface_size(size)?;
        dst.ensure(size, PixelFormat::Bgra8)?;
        validate::host_frame(dst, size)?;
        self.backend.download(display, surface, size, dst)
    }
}

impl<S: SurfaceApi, M: MediaSharing> std::fmt::Debug for InteropContext<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropContext")
            .field("display", &self.display)
            .field("backend", &self.backend)
            .finish()
    }
}
