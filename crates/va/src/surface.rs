//! [`SurfaceApi`] implementation on top of the loaded libva function table.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use tracing::debug;

use vacl_common::{
    BufferId, DisplayHandle, ImageDesc, ImageId, InteropError, InteropResult, NativeApi,
    SurfaceApi, SurfaceId,
};

use crate::ffi::{VAImage, VaLibrary};

impl From<&VAImage> for ImageDesc {
    fn from(image: &VAImage) -> Self {
        ImageDesc {
            image_id: image.image_id,
            buf: image.buf,
            fourcc: image.format.fourcc,
            width: image.width as u32,
            height: image.height as u32,
            data_size: image.data_size,
            num_planes: image.num_planes,
            pitches: image.pitches,
            offsets: image.offsets,
        }
    }
}

// SAFETY: vaMapBuffer returns a pointer to the whole image buffer
// (`data_size` bytes) which stays valid until vaUnmapBuffer; the interop
// layer maps each buffer from a single guard at a time.
unsafe impl SurfaceApi for VaLibrary {
    fn sync_surface(&self, display: DisplayHandle, surface: SurfaceId) -> InteropResult<()> {
        // SAFETY: the caller keeps the display initialized for the call;
        // libva validates the surface id.
        let status = unsafe { (self.api.vaSyncSurface)(display.as_raw(), surface.raw()) };
        self.check(status, "vaSyncSurface")?;
        Ok(())
    }

    fn derive_image(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
    ) -> InteropResult<ImageDesc> {
        let mut image = VAImage::default();
        // SAFETY: `image` is a properly sized, writable VAImage that libva
        // fills on success.
        let status =
            unsafe { (self.api.vaDeriveImage)(display.as_raw(), surface.raw(), &mut image) };
        self.check(status, "vaDeriveImage")?;

        debug!(
            %surface,
            image_id = image.image_id,
            width = image.width,
            height = image.height,
            fourcc = format_args!("{:#010x}", image.format.fourcc),
            "Derived VA image"
        );
        Ok(ImageDesc::from(&image))
    }

    fn map_buffer(&self, display: DisplayHandle, buf: BufferId) -> InteropResult<NonNull<u8>> {
        let mut data: *mut c_void = ptr::null_mut();
        // SAFETY: `data` is a valid out-pointer; libva writes the mapping address.
        let status = unsafe { (self.api.vaMapBuffer)(display.as_raw(), buf, &mut data) };
        self.check(status, "vaMapBuffer")?;

        NonNull::new(data.cast::<u8>()).ok_or_else(|| {
            InteropError::native(NativeApi::VaApi, "vaMapBuffer", 0, "returned a null mapping")
        })
    }

    fn unmap_buffer(&self, display: DisplayHandle, buf: BufferId) -> InteropResult<()> {
        // SAFETY: `buf` was mapped through this display by `map_buffer`.
        let status = unsafe { (self.api.vaUnmapBuffer)(display.as_raw(), buf) };
        self.check(status, "vaUnmapBuffer")?;
        Ok(())
    }

    fn destroy_image(&self, display: DisplayHandle, image: ImageId) -> InteropResult<()> {
        // SAFETY: `image` was created through this display by `derive_image`.
        let status = unsafe { (self.api.vaDestroyImage)(display.as_raw(), image) };
        self.check(status, "vaDestroyImage")?;
        Ok(())
    }
}
