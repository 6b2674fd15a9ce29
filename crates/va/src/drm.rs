//! Display discovery on DRM nodes.
//!
//! The adapter is located by scanning the PCI devices in sysfs for display
//! controllers (class `0x03xxxx`). The index of the first controller of the
//! wanted vendor among all display controllers selects the DRM nodes to try:
//! `renderD{128 + index}` first, then `card{index}`.

use std::fs::{self, File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use vacl_common::{DisplayHandle, InteropConfig};

use crate::error::VaError;
use crate::ffi::VaLibrary;

/// PCI base class of display controllers.
const PCI_DISPLAY_CONTROLLER_CLASS: u32 = 0x03;

/// First render node minor number.
const RENDER_NODE_BASE: usize = 128;

/// Read a hexadecimal id file (`class`, `vendor`) of a PCI device.
///
/// Unreadable or malformed files read as 0, which never matches a display
/// controller or a vendor.
fn read_id(device_dir: &Path, name: &str) -> u32 {
    let Ok(text) = fs::read_to_string(device_dir.join(name)) else {
        return 0;
    };
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).unwrap_or(0)
}

/// Find the index of the first display controller with `vendor` among all
/// display controllers listed in `pci_dir`, visited in sorted name order.
///
/// Returns `Ok(None)` when no such controller exists.
pub fn find_adapter(pci_dir: &Path, vendor: u16) -> Result<Option<usize>, VaError> {
    let mut names: Vec<_> = fs::read_dir(pci_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect();
    names.sort();

    let mut display_controllers = 0usize;
    for name in &names {
        let device_dir = pci_dir.join(name);
        if read_id(&device_dir, "class") >> 16 != PCI_DISPLAY_CONTROLLER_CLASS {
            continue;
        }
        if read_id(&device_dir, "vendor") == u32::from(vendor) {
            debug!(
                device = %name.to_string_lossy(),
                index = display_controllers,
                "Found display adapter"
            );
            return Ok(Some(display_controllers));
        }
        display_controllers += 1;
    }
    Ok(None)
}

/// DRM device node paths for an adapter index, in the order they are tried.
pub fn node_candidates(dri_dir: &Path, adapter: usize) -> [PathBuf; 2] {
    [
        dri_dir.join(format!("renderD{}", adapter + RENDER_NODE_BASE)),
        dri_dir.join(format!("card{adapter}")),
    ]
}

/// An initialized VA display opened on a DRM node.
///
/// Dropping it terminates the display and closes the node.
pub struct DrmDisplay {
    lib: Arc<VaLibrary>,
    display: DisplayHandle,
    node: PathBuf,
    version: (i32, i32),
    // Closed after vaTerminate runs in Drop.
    _file: File,
}

impl DrmDisplay {
    /// Locate the configured vendor's adapter and open a display on its
    /// first usable DRM node.
    pub fn open(lib: Arc<VaLibrary>, config: &InteropConfig) -> Result<Self, VaError> {
        let get_display = lib.api.vaGetDisplayDRM.ok_or(VaError::DrmUnavailable)?;

        let adapter = find_adapter(&config.pci_devices_dir, config.drm_vendor_id)?.ok_or_else(
            || VaError::AdapterNotFound {
                vendor: config.drm_vendor_id,
                dir: config.pci_devices_dir.display().to_string(),
            },
        )?;

        let mut failures = Vec::new();
        for node in node_candidates(&config.dri_dir, adapter) {
            let file = match OpenOptions::new().read(true).write(true).open(&node) {
                Ok(file) => file,
                Err(e) => {
                    debug!(node = %node.display(), error = %e, "Can't open DRM node");
                    failures.push(format!("{}: {e}", node.display()));
                    continue;
                }
            };

            // SAFETY: the fd is open for the duration of the call and stays
            // open (owned by `file`) for the display's lifetime.
            let raw = unsafe { get_display(file.as_raw_fd()) };
            let display = DisplayHandle::from_raw(raw);
            if display.is_null() {
                failures.push(format!("{}: vaGetDisplayDRM returned null", node.display()));
                continue;
            }

            let (mut major, mut minor) = (0, 0);
            // SAFETY: `display` is a fresh display from vaGetDisplayDRM and
            // both out-pointers are valid.
            let status = unsafe { (lib.api.vaInitialize)(raw, &mut major, &mut minor) };
            if let Err(e) = lib.check(status, "vaInitialize") {
                warn!(node = %node.display(), error = %e, "VA display initialization failed");
                // SAFETY: releases the display allocated by vaGetDisplayDRM.
                unsafe { (lib.api.vaTerminate)(raw) };
                failures.push(format!("{}: {e}", node.display()));
                continue;
            }

            info!(
                node = %node.display(),
                version = %format_args!("{major}.{minor}"),
                "VA display initialized"
            );
            return Ok(Self {
                lib,
                display,
                node,
                version: (major, minor),
                _file: file,
            });
        }

        Err(VaError::DisplayOpen {
            adapter,
            reason: failures.join("; "),
        })
    }

    /// The display handle to hand to interop negotiation.
    pub fn handle(&self) -> DisplayHandle {
        self.display
    }

    /// The DRM node the display was opened on.
    pub fn node(&self) -> &Path {
        &self.node
    }

    /// VA-API version reported by `vaInitialize`.
    pub fn version(&self) -> (i32, i32) {
        self.version
    }

    pub fn library(&self) -> &Arc<VaLibrary> {
        &self.lib
    }
}

impl std::fmt::Debug for DrmDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrmDisplay")
            .field("display", &self.display)
            .field("node", &self.node)
            .field("version", &self.version)
            .finish()
    }
}

impl Drop for DrmDisplay {
    fn drop(&mut self) {
        // SAFETY: the display was initialized in `open` and is terminated
        // exactly once; the node fd is still open here.
        let status = unsafe { (self.lib.api.vaTerminate)(self.display.as_raw()) };
        if let Err(e) = self.lib.check(status, "vaTerminate") {
            warn!(node = %self.node.display(), error = %e, "VA display termination failed");
        } else {
            debug!(node = %self.node.display(), "VA display terminated");
        }
    }
}
