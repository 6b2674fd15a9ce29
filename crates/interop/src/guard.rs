//! Scoped guards pairing every derive/map/acquire with its release.
//!
//! Each guard has an explicit consuming release (`destroy`, `unmap`,
//! `release`) that reports failures on the success path. If a guard is
//! dropped without it, because an earlier step failed, `Drop` performs the
//! release best-effort and logs a failure.

use std::ptr::NonNull;

use tracing::{debug, warn};

use vacl_common::{
    BufferId, DisplayHandle, ImageDesc, InteropResult, MediaSharing, SurfaceApi, SurfaceId,
};

/// A VA image derived from a surface; destroyed on release.
pub struct DerivedImage<'a, S: SurfaceApi + ?Sized> {
    api: &'a S,
    display: DisplayHandle,
    desc: ImageDesc,
    destroyed: bool,
}

impl<'a, S: SurfaceApi + ?Sized> DerivedImage<'a, S> {
    pub fn derive(api: &'a S, display: DisplayHandle, surface: SurfaceId) -> InteropResult<Self> {
        let desc = api.derive_image(display, surface)?;
        Ok(Self {
            api,
            display,
            desc,
            destroyed: false,
        })
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Map the image buffer. The mapping borrows the image exclusively, so at
    /// most one mapping is live and it is released before the image is
    /// destroyed.
    ///
    /// ```compile_fail
    /// use vacl_common::{DisplayHandle, SurfaceApi, SurfaceId};
    /// use vacl_interop::DerivedImage;
    ///
    /// fn map_twice<S: SurfaceApi>(api: &S, display: DisplayHandle, surface: SurfaceId) {
    ///     let mut image = DerivedImage::derive(api, display, surface).unwrap();
    ///     let first = image.map().unwrap();
    ///     let second = image.map().unwrap();
    ///     drop((first, second));
    /// }
    /// ```
    pub fn map(&mut self) -> InteropResult<MappedImage<'_, S>> {
        let ptr = self.api.map_buffer(self.display, self.desc.buf)?;
        Ok(MappedImage {
            api: self.api,
            display: self.display,
            buf: self.desc.buf,
            ptr,
            len: self.desc.data_size as usize,
            unmapped: false,
        })
    }

    pub fn destroy(mut self) -> InteropResult<()> {
        self.destroyed = true;
        self.api.destroy_image(self.display, self.desc.image_id)
    }
}

impl<S: SurfaceApi + ?Sized> Drop for DerivedImage<'_, S> {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        if let Err(e) = self.api.destroy_image(self.display, self.desc.image_id) {
            warn!(image = self.desc.image_id, error = %e, "Best-effort vaDestroyImage failed");
        } else {
            debug!(image = self.desc.image_id, "Destroyed derived image on error path");
        }
    }
}

/// Host mapping of a derived image's buffer; unmapped on release.
pub struct MappedImage<'a, S: SurfaceApi + ?Sized> {
    api: &'a S,
    display: DisplayHandle,
    buf: BufferId,
    ptr: NonNull<u8>,
    len: usize,
    unmapped: bool,
}

impl<S: SurfaceApi + ?Sized> MappedImage<'_, S> {
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `SurfaceApi` guarantees `len` bytes at `ptr` stay valid and
        // unaliased until unmap, which needs `self` by value or Drop. The
        // image is mutably borrowed for our lifetime, so no second mapping of
        // the same buffer exists.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` makes the borrow exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn unmap(mut self) -> InteropResult<()> {
        self.unmapped = true;
        self.api.unmap_buffer(self.display, self.buf)
    }
}

impl<S: SurfaceApi + ?Sized> Drop for MappedImage<'_, S> {
    fn drop(&mut self) {
        if self.unmapped {
            return;
        }
        if let Err(e) = self.api.unmap_buffer(self.display, self.buf) {
            warn!(buffer = self.buf, error = %e, "Best-effort vaUnmapBuffer failed");
        }
    }
}

/// Surface planes acquired for OpenCL use; released on release.
pub struct AcquiredPlanes<'a, M: MediaSharing> {
    sharing: &'a M,
    planes: [&'a M::Plane; 2],
    released: bool,
}

impl<'a, M: MediaSharing> AcquiredPlanes<'a, M> {
    pub fn acquire(sharing: &'a M, planes: [&'a M::Plane; 2]) -> InteropResult<Self> {
        sharing.acquire_planes(&planes)?;
        Ok(Self {
            sharing,
            planes,
            released: false,
        })
    }

    pub fn release(mut self) -> InteropResult<()> {
        self.released = true;
        self.sharing.release_planes(&self.planes)
    }
}

impl<M: MediaSharing> Drop for AcquiredPlanes<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.sharing.release_planes(&self.planes) {
            warn!(error = %e, "Best-effort release of shared surface planes failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use vacl_common::{ImageId, Resolution};

    /// One 4x2 NV12 image backed by a host vector.
    struct HostSurface {
        memory: Mutex<Vec<u8>>,
        mapped: Mutex<u32>,
        destroyed: Mutex<u32>,
    }

    impl HostSurface {
        fn new() -> Self {
            Self {
                memory: Mutex::new(vec![0u8; 12]),
                mapped: Mutex::new(0),
                destroyed: Mutex::new(0),
            }
        }
    }

    // SAFETY: the vector is never resized, so its pointer stays valid; the
    // guards allow one mapping at a time.
    unsafe impl SurfaceApi for HostSurface {
        fn sync_surface(&self, _: DisplayHandle, _: SurfaceId) -> InteropResult<()> {
            Ok(())
        }

        fn derive_image(&self, _: DisplayHandle, _: SurfaceId) -> InteropResult<ImageDesc> {
            let size = Resolution::new(4, 2);
            Ok(ImageDesc {
                image_id: 1,
                buf: 2,
                fourcc: u32::from_le_bytes(*b"NV12"),
                width: size.width,
                height: size.height,
                data_size: 12,
                num_planes: 2,
                pitches: [4, 4, 0],
                offsets: [0, 8, 0],
            })
        }

        fn map_buffer(&self, _: DisplayHandle, _: BufferId) -> InteropResult<NonNull<u8>> {
            *self.mapped.lock() += 1;
            let ptr = self.memory.lock().as_mut_ptr();
            Ok(NonNull::new(ptr).expect("vector pointer is non-null"))
        }

        fn unmap_buffer(&self, _: DisplayHandle, _: BufferId) -> InteropResult<()> {
            *self.mapped.lock() -= 1;
            Ok(())
        }

        fn destroy_image(&self, _: DisplayHandle, _: ImageId) -> InteropResult<()> {
            *self.destroyed.lock() += 1;
            Ok(())
        }
    }

    fn display() -> DisplayHandle {
        DisplayHandle::from_raw(std::ptr::NonNull::<u8>::dangling().as_ptr().cast())
    }

    #[test]
    fn mappings_are_sequential() {
        let api = HostSurface::new();
        let mut image = DerivedImage::derive(&api, display(), SurfaceId(1)).unwrap();

        let mut mapped = image.map().unwrap();
        mapped.as_mut_slice()[3] = 0x5A;
        assert_eq!(*api.mapped.lock(), 1);
        mapped.unmap().unwrap();
        assert_eq!(*api.mapped.lock(), 0);

        let mapped = image.map().unwrap();
        assert_eq!(mapped.as_slice()[3], 0x5A);
        drop(mapped);
        assert_eq!(*api.mapped.lock(), 0);

        image.destroy().unwrap();
        assert_eq!(*api.destroyed.lock(), 1);
    }

    #[test]
    fn dropped_guards_release_in_order() {
        let api = HostSurface::new();
        {
            let mut image = DerivedImage::derive(&api, display(), SurfaceId(1)).unwrap();
            let _mapped = image.map().unwrap();
        }
        assert_eq!(*api.mapped.lock(), 0);
        assert_eq!(*api.destroyed.lock(), 1);
    }
}
