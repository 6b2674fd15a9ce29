//! Raw FFI bindings for libva and libva-drm.
//!
//! These bindings are loaded dynamically at runtime via `libloading`.
//! They cover the minimum API surface needed to synchronize, derive, map and
//! release NV12 surfaces, plus opening a display on a DRM node.
//!
//! Reference: libva `va.h`, `va_drm.h`.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use libloading::Library;
use tracing::{debug, info};

use crate::error::{VaError, VaLoadError};

// ---------------------------------------------------------------------------
// Handle types
// ---------------------------------------------------------------------------

/// Display connection handle (opaque pointer).
pub type VADisplay = *mut c_void;

/// Surface handle.
pub type VASurfaceID = u32;

/// Image handle.
pub type VAImageID = u32;

/// Buffer handle.
pub type VABufferID = u32;

/// VA API return type.
pub type VAStatus = c_int;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

pub const VA_STATUS_SUCCESS: VAStatus = 0x00;
pub const VA_STATUS_ERROR_OPERATION_FAILED: VAStatus = 0x01;
pub const VA_STATUS_ERROR_ALLOCATION_FAILED: VAStatus = 0x02;
pub const VA_STATUS_ERROR_INVALID_DISPLAY: VAStatus = 0x03;
pub const VA_STATUS_ERROR_INVALID_SURFACE: VAStatus = 0x06;
pub const VA_STATUS_ERROR_INVALID_BUFFER: VAStatus = 0x07;
pub const VA_STATUS_ERROR_INVALID_IMAGE: VAStatus = 0x08;
pub const VA_STATUS_ERROR_SURFACE_BUSY: VAStatus = 0x10;
pub const VA_STATUS_ERROR_INVALID_PARAMETER: VAStatus = 0x12;
pub const VA_STATUS_ERROR_UNIMPLEMENTED: VAStatus = 0x14;
pub const VA_STATUS_ERROR_INVALID_IMAGE_FORMAT: VAStatus = 0x16;

/// `VA_INVALID_ID`.
pub const VA_INVALID_ID: u32 = 0xFFFF_FFFF;

// ---------------------------------------------------------------------------
// FourCC
// ---------------------------------------------------------------------------

/// Build a little-endian FourCC code (`VA_FOURCC`).
pub const fn va_fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24)
}

/// NV12: Y plane followed by interleaved UV.
pub const VA_FOURCC_NV12: u32 = va_fourcc(b"NV12");

/// Padding used by libva to keep structs ABI-stable.
const VA_PADDING_LOW: usize = 4;

// ---------------------------------------------------------------------------
// Image structs
// ---------------------------------------------------------------------------

/// `VAImageFormat`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct VAImageFormat {
    pub fourcc: u32,
    pub byte_order: u32,
    pub bits_per_pixel: u32,
    pub depth: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub alpha_mask: u32,
    pub va_reserved: [u32; VA_PADDING_LOW],
}

/// `VAImage`: host-visible view of a surface or image buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct VAImage {
    pub image_id: VAImageID,
    pub format: VAImageFormat,
    pub buf: VABufferID,
    pub width: u16,
    pub height: u16,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
    pub num_palette_entries: i32,
    pub entry_bytes: i32,
    pub component_order: [i8; 4],
    pub va_reserved: [u32; VA_PADDING_LOW],
}

impl Default for VAImage {
    fn default() -> Self {
        Self {
            image_id: VA_INVALID_ID,
            format: VAImageFormat::default(),
            buf: VA_INVALID_ID,
            width: 0,
            height: 0,
            data_size: 0,
            num_planes: 0,
            pitches: [0; 3],
            offsets: [0; 3],
            num_palette_entries: 0,
            entry_bytes: 0,
            component_order: [0; 4],
            va_reserved: [0; VA_PADDING_LOW],
        }
    }
}

// ---------------------------------------------------------------------------
// Function pointer table
// ---------------------------------------------------------------------------

/// libva function pointer table.
///
/// Signatures match `va.h`. `vaGetDisplayDRM` lives in libva-drm and is
/// only present when that library could be loaded.
#[allow(non_snake_case)]
pub struct VaFunctionList {
    pub vaInitialize:
        unsafe extern "C" fn(dpy: VADisplay, major: *mut c_int, minor: *mut c_int) -> VAStatus,

    pub vaTerminate: unsafe extern "C" fn(dpy: VADisplay) -> VAStatus,

    pub vaErrorStr: unsafe extern "C" fn(status: VAStatus) -> *const c_char,

    pub vaSyncSurface: unsafe extern "C" fn(dpy: VADisplay, surface: VASurfaceID) -> VAStatus,

    pub vaDeriveImage:
        unsafe extern "C" fn(dpy: VADisplay, surface: VASurfaceID, image: *mut VAImage) -> VAStatus,

    pub vaMapBuffer:
        unsafe extern "C" fn(dpy: VADisplay, buf: VABufferID, pbuf: *mut *mut c_void) -> VAStatus,

    pub vaUnmapBuffer: unsafe extern "C" fn(dpy: VADisplay, buf: VABufferID) -> VAStatus,

    pub vaDestroyImage: unsafe extern "C" fn(dpy: VADisplay, image: VAImageID) -> VAStatus,

    pub vaGetDisplayDRM: Option<unsafe extern "C" fn(fd: c_int) -> VADisplay>,
}

impl std::fmt::Debug for VaFunctionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaFunctionList")
            .field("loaded", &true)
            .field("drm", &self.vaGetDisplayDRM.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Dynamic library wrapper
// ---------------------------------------------------------------------------

/// Dynamically loaded libva (and optionally libva-drm) with the API table.
pub struct VaLibrary {
    /// Library handles -- must live as long as we use any symbols.
    _lib: Library,
    _drm: Option<Library>,
    /// libva function pointers.
    pub api: VaFunctionList,
}

// SAFETY: VaLibrary holds library handles and plain function pointers into
// libva, which is thread-safe for distinct displays and serializes calls on
// the same display internally.
unsafe impl Send for VaLibrary {}
unsafe impl Sync for VaLibrary {}

impl std::fmt::Debug for VaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaLibrary")
            .field("api", &self.api)
            .finish()
    }
}

const LIBVA_NAMES: &[&str] = &["libva.so.2", "libva.so"];
const LIBVA_DRM_NAMES: &[&str] = &["libva-drm.so.2", "libva-drm.so"];

static SHARED: OnceLock<Result<Arc<VaLibrary>, VaLoadError>> = OnceLock::new();

impl VaLibrary {
    /// Process-wide libva instance loaded from the system paths on first use.
    ///
    /// A failed load is remembered; later calls return the same error.
    pub fn shared() -> Result<Arc<Self>, VaLoadError> {
        SHARED.get_or_init(|| Self::load().map(Arc::new)).clone()
    }

    /// Load libva and libva-drm from the default system paths.
    pub fn load() -> Result<Self, VaLoadError> {
        Self::load_from(None, None)
    }

    /// Load from explicit paths, falling back to the system names for any
    /// path that is `None`.
    pub fn load_from(libva: Option<&Path>, libva_drm: Option<&Path>) -> Result<Self, VaLoadError> {
        let lib = match libva {
            Some(path) => open_path(path)?,
            None => open_first(LIBVA_NAMES)?,
        };

        // libva-drm is only needed to open displays ourselves.
        let drm = match libva_drm {
            Some(path) => Some(open_path(path)?),
            None => open_first(LIBVA_DRM_NAMES).ok(),
        };

        Self::load_functions(lib, drm)
    }

    fn load_functions(lib: Library, drm: Option<Library>) -> Result<Self, VaLoadError> {
        // SAFETY: All symbol lookups below are for well-known libva API
        // functions. The function signatures match the official C headers.
        // We dereference each Symbol to copy the raw function pointer.
        unsafe {
            let fn_initialize = *lib
                .get::<unsafe extern "C" fn(VADisplay, *mut c_int, *mut c_int) -> VAStatus>(
                    b"vaInitialize\0",
                )
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaInitialize: {e}")))?;

            let fn_terminate = *lib
                .get::<unsafe extern "C" fn(VADisplay) -> VAStatus>(b"vaTerminate\0")
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaTerminate: {e}")))?;

            let fn_error_str = *lib
                .get::<unsafe extern "C" fn(VAStatus) -> *const c_char>(b"vaErrorStr\0")
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaErrorStr: {e}")))?;

            let fn_sync = *lib
                .get::<unsafe extern "C" fn(VADisplay, VASurfaceID) -> VAStatus>(
                    b"vaSyncSurface\0",
                )
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaSyncSurface: {e}")))?;

            let fn_derive = *lib
                .get::<unsafe extern "C" fn(VADisplay, VASurfaceID, *mut VAImage) -> VAStatus>(
                    b"vaDeriveImage\0",
                )
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaDeriveImage: {e}")))?;

            let fn_map = *lib
                .get::<unsafe extern "C" fn(VADisplay, VABufferID, *mut *mut c_void) -> VAStatus>(
                    b"vaMapBuffer\0",
                )
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaMapBuffer: {e}")))?;

            let fn_unmap = *lib
                .get::<unsafe extern "C" fn(VADisplay, VABufferID) -> VAStatus>(b"vaUnmapBuffer\0")
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaUnmapBuffer: {e}")))?;

            let fn_destroy_image = *lib
                .get::<unsafe extern "C" fn(VADisplay, VAImageID) -> VAStatus>(b"vaDestroyImage\0")
                .map_err(|e| VaLoadError::SymbolNotFound(format!("vaDestroyImage: {e}")))?;

            let fn_get_display_drm = match &drm {
                Some(drm_lib) => Some(
                    *drm_lib
                        .get::<unsafe extern "C" fn(c_int) -> VADisplay>(b"vaGetDisplayDRM\0")
                        .map_err(|e| VaLoadError::SymbolNotFound(format!("vaGetDisplayDRM: {e}")))?,
                ),
                None => None,
            };

            debug!(drm = fn_get_display_drm.is_some(), "All libva symbols loaded successfully");

            Ok(Self {
                _lib: lib,
                _drm: drm,
                api: VaFunctionList {
                    vaInitialize: fn_initialize,
                    vaTerminate: fn_terminate,
                    vaErrorStr: fn_error_str,
                    vaSyncSurface: fn_sync,
                    vaDeriveImage: fn_derive,
                    vaMapBuffer: fn_map,
                    vaUnmapBuffer: fn_unmap,
                    vaDestroyImage: fn_destroy_image,
                    vaGetDisplayDRM: fn_get_display_drm,
                },
            })
        }
    }

    /// Whether displays can be opened on DRM nodes with this library.
    pub fn has_drm(&self) -> bool {
        self.api.vaGetDisplayDRM.is_some()
    }

    /// Convert a `VAStatus` into a Result, naming the failing call.
    pub fn check(&self, status: VAStatus, call: &'static str) -> Result<(), VaError> {
        if status == VA_STATUS_SUCCESS {
            return Ok(());
        }
        Err(VaError::Status {
            call,
            status,
            message: self.error_str(status),
        })
    }

    /// libva's description of a status code.
    pub fn error_str(&self, status: VAStatus) -> String {
        // SAFETY: vaErrorStr accepts any status value and returns a pointer
        // to a static NUL-terminated string (or null for unknown values).
        let ptr = unsafe { (self.api.vaErrorStr)(status) };
        if ptr.is_null() {
            return va_status_name(status).to_string();
        }
        // SAFETY: non-null pointers from vaErrorStr reference static C strings.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

fn open_path(path: &Path) -> Result<Library, VaLoadError> {
    info!(path = %path.display(), "Loading VA-API library from custom path");
    // SAFETY: Loading a user-specified shared library. The caller asserts
    // this is a valid libva build.
    unsafe { Library::new(path) }
        .map_err(|e| VaLoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display())))
}

fn open_first(names: &[&str]) -> Result<Library, VaLoadError> {
    let mut last_error = String::new();
    for name in names {
        // SAFETY: We are loading a well-known system library; its
        // initializers only register driver lookup paths.
        match unsafe { Library::new(name) } {
            Ok(lib) => {
                info!(library = %name, "Loaded VA-API library");
                return Ok(lib);
            }
            Err(e) => last_error = format!("{name}: {e}"),
        }
    }
    Err(VaLoadError::LibraryNotFound(format!(
        "{last_error}. Is libva installed?"
    )))
}

/// Symbolic name of a `VAStatus` value.
pub fn va_status_name(status: VAStatus) -> &'static str {
    match status {
        0x00 => "VA_STATUS_SUCCESS",
        0x01 => "VA_STATUS_ERROR_OPERATION_FAILED",
        0x02 => "VA_STATUS_ERROR_ALLOCATION_FAILED",
        0x03 => "VA_STATUS_ERROR_INVALID_DISPLAY",
        0x04 => "VA_STATUS_ERROR_INVALID_CONFIG",
        0x05 => "VA_STATUS_ERROR_INVALID_CONTEXT",
        0x06 => "VA_STATUS_ERROR_INVALID_SURFACE",
        0x07 => "VA_STATUS_ERROR_INVALID_BUFFER",
        0x08 => "VA_STATUS_ERROR_INVALID_IMAGE",
        0x0a => "VA_STATUS_ERROR_ATTR_NOT_SUPPORTED",
        0x10 => "VA_STATUS_ERROR_SURFACE_BUSY",
        0x12 => "VA_STATUS_ERROR_INVALID_PARAMETER",
        0x14 => "VA_STATUS_ERROR_UNIMPLEMENTED",
        0x16 => "VA_STATUS_ERROR_INVALID_IMAGE_FORMAT",
        _ => "VA_STATUS_ERROR_UNKNOWN",
    }
}
