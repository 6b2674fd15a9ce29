//! Host NV12 <-> BGRA conversion for the mapped-copy path.
//!
//! BT.601 limited range, matching the device kernels. Chroma is sampled once
//! per 2x2 block: BGRA -> NV12 averages the block, NV12 -> BGRA shares the
//! pair across the block. Callers validate sizes and pitches beforehand;
//! the loops index the slices directly.

use vacl_common::Resolution;

// ---------------------------------------------------------------------------
// BT.601 fixed-point conversion constants
// ---------------------------------------------------------------------------

// Fixed-point arithmetic with 10 bits of fractional precision (x1024).
//
//   R = 1.164 * (Y - 16) + 1.596 * (V - 128)
//   G = 1.164 * (Y - 16) - 0.391 * (U - 128) - 0.813 * (V - 128)
//   B = 1.164 * (Y - 16) + 2.018 * (U - 128)
const Y_SCALE: i32 = 1192; // 1.164 * 1024
const V_TO_R: i32 = 1634; // 1.596 * 1024
const U_TO_G: i32 = 400; // 0.391 * 1024
const V_TO_G: i32 = 833; // 0.813 * 1024
const U_TO_B: i32 = 2066; // 2.018 * 1024

//   Y =  0.257 * R + 0.504 * G + 0.098 * B + 16
//   U = -0.148 * R - 0.291 * G + 0.439 * B + 128
//   V =  0.439 * R - 0.368 * G - 0.071 * B + 128
const R_TO_Y: i32 = 263;
const G_TO_Y: i32 = 516;
const B_TO_Y: i32 = 100;
const R_TO_U: i32 = 152;
const G_TO_U: i32 = 298;
const B_TO_U: i32 = 450;
const R_TO_V: i32 = 450;
const G_TO_V: i32 = 377;
const B_TO_V: i32 = 73;

#[inline(always)]
fn clamp_u8(val: i32) -> u8 {
    val.clamp(0, 255) as u8
}

/// Read-only view of the two NV12 planes inside a mapped image.
#[derive(Copy, Clone, Debug)]
pub struct Nv12Planes<'a> {
    pub luma: &'a [u8],
    pub luma_pitch: usize,
    /// Interleaved U, V samples.
    pub chroma: &'a [u8],
    pub chroma_pitch: usize,
}

/// Writable view of the two NV12 planes inside a mapped image.
#[derive(Debug)]
pub struct Nv12PlanesMut<'a> {
    pub luma: &'a mut [u8],
    pub luma_pitch: usize,
    pub chroma: &'a mut [u8],
    pub chroma_pitch: usize,
}

/// Bytes a plane of `rows` rows must span with the given pitch.
pub fn plane_extent(pitch: usize, row_bytes: usize, rows: usize) -> usize {
    if rows == 0 {
        0
    } else {
        pitch * (rows - 1) + row_bytes
    }
}

/// Convert NV12 planes to BGRA (alpha 255).
///
/// `size` must be even in both dimensions; `dst` must hold `size.height`
/// rows of `dst_step` bytes.
pub fn nv12_to_bgra(src: &Nv12Planes<'_>, size: Resolution, dst: &mut [u8], dst_step: usize) {
    let w = size.width as usize;
    let h = size.height as usize;

    for row in 0..h {
        let y_row = &src.luma[row * src.luma_pitch..][..w];
        let uv_row = &src.chroma[(row / 2) * src.chroma_pitch..][..w];
        let out_row = &mut dst[row * dst_step..][..w * 4];

        for (pair, (luma, out)) in y_row
            .chunks_exact(2)
            .zip(out_row.chunks_exact_mut(8))
            .enumerate()
        {
            let u = uv_row[pair * 2] as i32 - 128;
            let v = uv_row[pair * 2 + 1] as i32 - 128;

            let v_r = V_TO_R * v;
            let uv_g = U_TO_G * u + V_TO_G * v;
            let u_b = U_TO_B * u;

            for (y, px) in luma.iter().zip(out.chunks_exact_mut(4)) {
                let y_scaled = Y_SCALE * (*y as i32 - 16).max(0);
                px[0] = clamp_u8((y_scaled + u_b + 512) >> 10);
                px[1] = clamp_u8((y_scaled - uv_g + 512) >> 10);
                px[2] = clamp_u8((y_scaled + v_r + 512) >> 10);
                px[3] = 255;
            }
        }
    }
}

/// Convert BGRA to NV12 planes. Alpha is ignored.
///
/// `size` must be even in both dimensions; `src` must hold `size.height`
/// rows of `src_step` bytes.
pub fn bgra_to_nv12(src: &[u8], src_step: usize, size: Resolution, dst: &mut Nv12PlanesMut<'_>) {
    let w = size.width as usize;
    let h = size.height as usize;

    for block_row in 0..h / 2 {
        let mut sums = vec![[0i32; 3]; w / 2];

        for dy in 0..2 {
            let row = block_row * 2 + dy;
            let in_row = &src[row * src_step..][..w * 4];
            let y_row = &mut dst.luma[row * dst.luma_pitch..][..w];

            for (col, (px, y)) in in_row.chunks_exact(4).zip(y_row.iter_mut()).enumerate() {
                let (b, g, r) = (px[0] as i32, px[1] as i32, px[2] as i32);
                *y = clamp_u8((R_TO_Y * r + G_TO_Y * g + B_TO_Y * b + (16 << 10) + 512) >> 10);

                let sum = &mut sums[col / 2];
                sum[0] += b;
                sum[1] += g;
                sum[2] += r;
            }
        }

        let uv_row = &mut dst.chroma[block_row * dst.chroma_pitch..][..w];
        for (uv, [b, g, r]) in uv_row.chunks_exact_mut(2).zip(sums) {
            // Sums cover four pixels: two more fractional bits.
            uv[0] = clamp_u8((-R_TO_U * r - G_TO_U * g + B_TO_U * b + (128 << 12) + 2048) >> 12);
            uv[1] = clamp_u8((R_TO_V * r - G_TO_V * g - B_TO_V * b + (128 << 12) + 2048) >> 12);
        }
    }
}
