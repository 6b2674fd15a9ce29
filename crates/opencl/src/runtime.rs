//! [`ComputeRuntime`] over the loaded OpenCL library.

use std::sync::Arc;

use tracing::debug;

use vacl_common::{ComputeRuntime, DisplayHandle, InteropResult};

use crate::context::{DeviceContext, SharingContext};
use crate::ffi::ClLibrary;
use crate::kernel::ProgramSource;
use crate::media::MediaSharingFns;
use crate::platform::ClPlatform;

/// OpenCL runtime that opens VA sharing contexts and builds the conversion
/// program from `source` in each.
#[derive(Debug, Clone)]
pub struct ClRuntime {
    lib: Arc<ClLibrary>,
    source: ProgramSource,
}

impl ClRuntime {
    pub fn new(lib: Arc<ClLibrary>, source: ProgramSource) -> Self {
        Self { lib, source }
    }

    pub fn library(&self) -> &Arc<ClLibrary> {
        &self.lib
    }
}

impl ComputeRuntime for ClRuntime {
    type Platform = ClPlatform;
    type Sharing = SharingContext;

    fn platforms(&self) -> InteropResult<Vec<ClPlatform>> {
        Ok(self.lib.platforms()?)
    }

    fn platform_name(&self, platform: &ClPlatform) -> String {
        platform.name.clone()
    }

    fn open_sharing(
        &self,
        platform: &ClPlatform,
        display: DisplayHandle,
    ) -> InteropResult<Option<SharingContext>> {
        let Some(fns) = MediaSharingFns::resolve(&self.lib, platform.id) else {
            debug!(platform = %platform.name, "Platform lacks VA-API media sharing entry points");
            return Ok(None);
        };

        let device = match fns.preferred_device(platform.id, display) {
            Ok(Some(device)) => device,
            Ok(None) => {
                debug!(platform = %platform.name, "No OpenCL device for the VA display");
                return Ok(None);
            }
            Err(e) => {
                debug!(platform = %platform.name, error = %e, "Device query for VA display failed");
                return Ok(None);
            }
        };

        let device_context = match DeviceContext::create(&self.lib, device, display) {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(platform = %platform.name, error = %e, "Sharing context creation failed");
                return Ok(None);
            }
        };

        // The context exists; a kernel build failure is no longer a
        // platform capability question.
        let sharing = SharingContext::new(device_context, fns, display, &self.source)?;
        Ok(Some(sharing))
    }
}
