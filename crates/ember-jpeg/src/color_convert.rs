/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Color space conversion and upsampling
//!
//! Planes are upsampled by nearest neighbour while converting, pixel `(x, y)`
//! reads the sample at `(x / sx, y / sy)` of every plane.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use ember_core::colorspace::ColorSpace;
use ember_core::log::{trace, warn};
use ember_core::pixels::gray_u8;

/// A plane ready for conversion
#[derive(Copy, Clone)]
pub(crate) struct Plane<'p> {
    pub data:   &'p [u8],
    pub stride: usize,
    /// Horizontal replication, `Hmax / H`
    pub sx:     usize,
    /// Vertical replication, `Vmax / V`
    pub sy:     usize
}

impl Plane<'_> {
    #[inline(always)]
    fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[(y / self.sy) * self.stride + x / self.sx]
    }
}

/// Colorspaces the converter can write
pub(crate) fn resolve_output(input: ColorSpace, requested: ColorSpace) -> ColorSpace {
    match requested {
        ColorSpace::RGB
        | ColorSpace::RGBA
        | ColorSpace::BGR
        | ColorSpace::BGRA
        | ColorSpace::Luma
        | ColorSpace::LumaA => requested,
        ColorSpace::YCbCr if input == ColorSpace::YCbCr => requested,
        _ => {
            warn!("Cannot convert {input:?} to {requested:?}, using RGBA instead");
            ColorSpace::RGBA
        }
    }
}

#[inline(always)]
fn clamp(a: i32) -> u8 {
    a.clamp(0, 255) as u8
}

/// YCbCr to RGB in 16 bit fixed point
#[inline(always)]
pub(crate) fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = (i32::from(y) << 16) + (1 << 15);
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let r = (y + 91881 * cr) >> 16;
    let g = (y - 22554 * cb - 46802 * cr) >> 16;
    let b = (y + 116130 * cb) >> 16;

    [clamp(r), clamp(g), clamp(b)]
}

/// `a * b / 255`, rounded
#[inline(always)]
fn mul_div_255(a: u8, b: u8) -> u8 {
    let t = u32::from(a) * u32::from(b) + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// The RGB triple of pixel `(x, y)`, or its raw samples for YCbCr output
#[inline(always)]
fn pixel(planes: &[Plane], input: ColorSpace, x: usize, y: usize) -> [u8; 3] {
    match (input, planes) {
        (ColorSpace::RGB, [r, g, b, ..]) => [r.sample(x, y), g.sample(x, y), b.sample(x, y)],
        (ColorSpace::YCbCr, [l, cb, cr, ..]) => {
            ycbcr_to_rgb(l.sample(x, y), cb.sample(x, y), cr.sample(x, y))
        }
        (ColorSpace::YCCK, [l, cb, cr, k]) => {
            let k = k.sample(x, y);
            let [r, g, b] = ycbcr_to_rgb(l.sample(x, y), cb.sample(x, y), cr.sample(x, y));
            [
                mul_div_255(255 - r, k),
                mul_div_255(255 - g, k),
                mul_div_255(255 - b, k)
            ]
        }
        (ColorSpace::CMYK, [c, m, ye, k]) => {
            let k = k.sample(x, y);
            [
                mul_div_255(c.sample(x, y), k),
                mul_div_255(m.sample(x, y), k),
                mul_div_255(ye.sample(x, y), k)
            ]
        }
        (_, [l, ..]) => {
            let v = l.sample(x, y);
            [v, v, v]
        }
        (_, []) => [0; 3]
    }
}

fn convert_rows(
    planes: &[Plane], input: ColorSpace, output: ColorSpace, width: usize, first_row: usize,
    out: &mut [u8]
) {
    let channels = output.num_components();

    for (i, row) in out.chunks_exact_mut(width * channels).enumerate() {
        let y = first_row + i;

        for (x, px) in row.chunks_exact_mut(channels).enumerate() {
            match output {
                ColorSpace::Luma | ColorSpace::LumaA => {
                    px[0] = match input {
                        // Y is the luminance already
                        ColorSpace::YCbCr | ColorSpace::Luma => planes[0].sample(x, y),
                        _ => {
                            let [r, g, b] = pixel(planes, input, x, y);
                            gray_u8(r, g, b)
                        }
                    };
                    if channels == 2 {
                        px[1] = 255;
                    }
                }
                ColorSpace::YCbCr => {
                    for (out, plane) in px.iter_mut().zip(planes) {
                        *out = plane.sample(x, y);
                    }
                }
                _ => {
                    let [r, g, b] = pixel(planes, input, x, y);

                    match output {
                        ColorSpace::BGR | ColorSpace::BGRA => px[..3].copy_from_slice(&[b, g, r]),
                        _ => px[..3].copy_from_slice(&[r, g, b])
                    }
                    if channels == 4 {
                        px[3] = 255;
                    }
                }
            }
        }
    }
}

/// Convert the planes of a `width` x `height` image into interleaved `out`
///
/// `output` must be a colorspace returned by [`resolve_output`].
pub(crate) fn convert_planes(
    planes: &[Plane], input: ColorSpace, output: ColorSpace, width: usize, height: usize,
    out: &mut [u8], use_threads: bool
) {
    let row_bytes = width * output.num_components();
    let out = &mut out[..row_bytes * height];

    #[cfg(feature = "threads")]
    {
        let threads = std::thread::available_parallelism().map_or(1, usize::from);

        if use_threads && threads > 1 && height >= 64 {
            let band = height.div_ceil(threads.min(8));

            trace!("Converting {input:?} to {output:?} in bands of {band} rows");

            std::thread::scope(|s| {
                for (i, chunk) in out.chunks_mut(band * row_bytes).enumerate() {
                    s.spawn(move || convert_rows(planes, input, output, width, i * band, chunk));
                }
            });
            return;
        }
    }
    #[cfg(not(feature = "threads"))]
    let _ = use_threads;

    trace!("Converting {input:?} to {output:?}");
    convert_rows(planes, input, output, width, 0, out);
}
