//! Configuration for library loading, display discovery and negotiation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InteropResult;

/// PCI vendor id of Intel, the only vendor shipping the VA-API media sharing extension.
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Whether negotiation should try to share surfaces with OpenCL.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// Try sharing, fall back to mapped copies when it is unavailable.
    #[default]
    Auto,
    /// Never share; always use mapped copies.
    Disabled,
    /// Sharing is mandatory; negotiation fails when it is unavailable.
    Require,
}

impl SharingMode {
    /// The `attempt_sharing` flag of the negotiation entry point.
    pub fn from_attempt(attempt_sharing: bool) -> Self {
        if attempt_sharing {
            Self::Auto
        } else {
            Self::Disabled
        }
    }

    pub fn attempts_sharing(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Interop configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteropConfig {
    pub sharing: SharingMode,
    /// PCI vendor of the display adapter opened by `DrmDisplay`.
    pub drm_vendor_id: u16,
    /// sysfs directory listing PCI devices.
    pub pci_devices_dir: PathBuf,
    /// Directory holding DRM device nodes.
    pub dri_dir: PathBuf,
    /// Override for the libva shared object.
    pub libva_path: Option<PathBuf>,
    /// Override for the libva-drm shared object.
    pub libva_drm_path: Option<PathBuf>,
    /// Override for the OpenCL ICD loader.
    pub opencl_path: Option<PathBuf>,
    /// Extra options passed to `clBuildProgram`.
    pub kernel_build_options: String,
    /// Work-group size for the conversion kernels (`None` lets the driver pick).
    pub local_work_size: Option<[usize; 2]>,
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            sharing: SharingMode::Auto,
            drm_vendor_id: INTEL_VENDOR_ID,
            pci_devices_dir: PathBuf::from("/sys/bus/pci/devices"),
            dri_dir: PathBuf::from("/dev/dri"),
            libva_path: None,
            libva_drm_path: None,
            opencl_path: None,
            kernel_build_options: String::new(),
            local_work_size: None,
        }
    }
}

impl InteropConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> InteropResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> InteropResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_sharing(mut self, sharing: SharingMode) -> Self {
        self.sharing = sharing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InteropConfig::default();
        assert_eq!(config.sharing, SharingMode::Auto);
        assert_eq!(config.drm_vendor_id, 0x8086);
        assert_eq!(config.pci_devices_dir, PathBuf::from("/sys/bus/pci/devices"));
        assert!(config.local_work_size.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            InteropConfig::from_json_str(r#"{"sharing": "disabled", "drm_vendor_id": 4098}"#)
                .unwrap();
        assert_eq!(config.sharing, SharingMode::Disabled);
        assert_eq!(config.drm_vendor_id, 0x1002);
        assert_eq!(config.dri_dir, PathBuf::from("/dev/dri"));
    }

    #[test]
    fn json_roundtrip() {
        let config = InteropConfig {
            local_work_size: Some([16, 8]),
            kernel_build_options: "-cl-fast-relaxed-math".to_string(),
            ..InteropConfig::default()
        }
        .with_sharing(SharingMode::Require);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(InteropConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = InteropConfig::from_json_str("{").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn attempt_flag_mapping() {
        assert_eq!(SharingMode::from_attempt(true), SharingMode::Auto);
        assert!(!SharingMode::from_attempt(false).attempts_sharing());
        assert!(SharingMode::Require.attempts_sharing());
    }
}
