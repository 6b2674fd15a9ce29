//! Mapped-copy backend: derive, map and convert on the CPU.

use std::sync::Arc;

use tracing::debug;

use vacl_common::{DisplayHandle, Frame, InteropResult, Resolution, SurfaceApi, SurfaceId};

use super::SurfaceTransfer;
use crate::convert::{bgra_to_nv12, nv12_to_bgra, Nv12Planes, Nv12PlanesMut};
use crate::guard::DerivedImage;
use crate::validate::{self, PlaneLayout};

/// Transfers through `vaDeriveImage` + `vaMapBuffer`.
pub struct CopyBackend<S: SurfaceApi> {
    surfaces: Arc<S>,
}

impl<S: SurfaceApi> CopyBackend<S> {
    pub fn new(surfaces: Arc<S>) -> Self {
        Self { surfaces }
    }

    /// Sync the surface and derive an image that covers `size`.
    fn derive(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<(DerivedImage<'_, S>, PlaneLayout)> {
        self.surfaces.sync_surface(display, surface)?;
        let image = DerivedImage::derive(&*self.surfaces, display, surface)?;
        let layout = validate::derived_image(image.desc(), size)?;
        debug!(%surface, image = image.desc().image_id, ?layout, "Derived surface image");
        Ok((image, layout))
    }
}

/// Split a mapped buffer into the two disjoint planes described by `layout`.
fn split_planes_mut<'a>(data: &'a mut [u8], layout: &PlaneLayout) -> Nv12PlanesMut<'a> {
    let (luma, chroma) = if layout.luma_offset < layout.chroma_offset {
        let (head, tail) = data.split_at_mut(layout.chroma_offset);
        (&mut head[layout.luma_offset..], tail)
    } else {
        let (head, tail) = data.split_at_mut(layout.luma_offset);
        (tail, &mut head[layout.chroma_offset..])
    };
    Nv12PlanesMut {
        luma,
        luma_pitch: layout.luma_pitch,
        chroma,
        chroma_pitch: layout.chroma_pitch,
    }
}

impl<S: SurfaceApi> SurfaceTransfer for CopyBackend<S> {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn upload(
        &self,
        display: DisplayHandle,
        frame: &Frame,
        surface: SurfaceId,
        size: Resolution,
    ) -> InteropResult<()> {
        let (mut image, layout) = self.derive(display, surface, size)?;
        let mut mapped = image.map()?;

        let mut planes = split_planes_mut(mapped.as_mut_slice(), &layout);
        bgra_to_nv12(frame.as_bytes(), frame.stride(), size, &mut planes);

        mapped.unmap()?;
        image.destroy()?;
        debug!(%surface, %size, "Uploaded frame through mapped copy");
        Ok(())
    }

    fn download(
        &self,
        display: DisplayHandle,
        surface: SurfaceId,
        size: Resolution,
        dst: &mut Frame,
    ) -> InteropResult<()> {
        let (mut image, layout) = self.derive(display, surface, size)?;
        let mapped = image.map()?;

        let data = mapped.as_slice();
        let planes = Nv12Planes {
            luma: &data[layout.luma_offset..],
            luma_pitch: layout.luma_pitch,
            chroma: &data[layout.chroma_offset..],
            chroma_pitch: layout.chroma_pitch,
        };
        let stride = dst.stride();
        nv12_to_bgra(&planes, size, dst.as_bytes_mut(), stride);

        mapped.unmap()?;
        image.destroy()?;
        debug!(%surface, %size, "Downloaded frame through mapped copy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_planes_at_chroma_offset() {
        let mut data = vec![0u8; 24];
        let layout = PlaneLayout {
            luma_offset: 0,
            luma_pitch: 4,
            luma_len: 16,
            chroma_offset: 16,
            chroma_pitch: 4,
            chroma_len: 8,
        };
        let planes = split_planes_mut(&mut data, &layout);
        assert_eq!(planes.luma.len(), 16);
        assert_eq!(planes.chroma.len(), 8);
    }

    #[test]
    fn split_planes_with_chroma_first() {
        let mut data = vec![0u8; 24];
        data[0] = 7;
        let layout = PlaneLayout {
            luma_offset: 8,
            luma_pitch: 4,
            luma_len: 16,
            chroma_offset: 0,
            chroma_pitch: 4,
            chroma_len: 8,
        };
        let planes = split_planes_mut(&mut data, &layout);
        assert_eq!(planes.luma.len(), 16);
        assert_eq!(planes.chroma[0], 7);
    }
}
