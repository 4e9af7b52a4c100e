/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Pixel layouts and an owned pixel buffer
//!
//! Every layout knows how to pack a normalized RGBA vector (`[0.0,1.0]` per channel)
//! into its in-memory representation and unpack it again, which lets decoders
//! write into whatever layout the caller picked at runtime without having a code
//! path per layout.
use half::f16;

use crate::colorspace::ColorSpace;
use crate::pool::BYTE_POOL;

/// BT.601 luma weights, used when reducing color to gray
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// A closed set of in-memory pixel layouts
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    /// One byte of luminance
    Gray8,
    /// Luminance then alpha, a byte each
    GrayAlpha8,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    /// Four IEEE 754 half floats, little endian, in RGBA order
    RgbaF16
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[inline]
fn from_u8(value: u8) -> f32 {
    f32::from(value) / 255.0
}

#[inline]
fn luminance(rgba: &[f32; 4]) -> f32 {
    LUMA_R * rgba[0] + LUMA_G * rgba[1] + LUMA_B * rgba[2]
}

impl PixelFormat {
    /// Size of one pixel in bytes
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::GrayAlpha8 => 2,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::RgbaF16 => 8
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayAlpha8 | Self::Rgba8 | Self::Bgra8 | Self::RgbaF16
        )
    }

    /// The colorspace this layout stores its channels in
    pub const fn colorspace(self) -> ColorSpace {
        match self {
            Self::Gray8 => ColorSpace::Luma,
            Self::GrayAlpha8 => ColorSpace::LumaA,
            Self::Rgb8 => ColorSpace::RGB,
            Self::Bgr8 => ColorSpace::BGR,
            Self::Rgba8 | Self::RgbaF16 => ColorSpace::RGBA,
            Self::Bgra8 => ColorSpace::BGRA
        }
    }

    /// The 8-bit layout matching a colorspace, if one exists
    pub const fn from_colorspace(colorspace: ColorSpace) -> Option<PixelFormat> {
        match colorspace {
            ColorSpace::Luma => Some(Self::Gray8),
            ColorSpace::LumaA => Some(Self::GrayAlpha8),
            ColorSpace::RGB => Some(Self::Rgb8),
            ColorSpace::BGR => Some(Self::Bgr8),
            ColorSpace::RGBA => Some(Self::Rgba8),
            ColorSpace::BGRA => Some(Self::Bgra8),
            _ => None
        }
    }

    /// Write a normalized RGBA value into `out`
    ///
    /// `out` must be at least [`bytes_per_pixel`](Self::bytes_per_pixel) long,
    /// extra bytes are left untouched.
    pub fn pack(self, rgba: &[f32; 4], out: &mut [u8]) {
        match self {
            Self::Gray8 => out[0] = to_u8(luminance(rgba)),
            Self::GrayAlpha8 => {
                out[0] = to_u8(luminance(rgba));
                out[1] = to_u8(rgba[3]);
            }
            Self::Rgb8 => {
                out[0] = to_u8(rgba[0]);
                out[1] = to_u8(rgba[1]);
                out[2] = to_u8(rgba[2]);
            }
            Self::Bgr8 => {
                out[0] = to_u8(rgba[2]);
                out[1] = to_u8(rgba[1]);
                out[2] = to_u8(rgba[0]);
            }
            Self::Rgba8 => {
                for (o, v) in out.iter_mut().zip(rgba) {
                    *o = to_u8(*v);
                }
            }
            Self::Bgra8 => {
                out[0] = to_u8(rgba[2]);
                out[1] = to_u8(rgba[1]);
                out[2] = to_u8(rgba[0]);
                out[3] = to_u8(rgba[3]);
            }
            Self::RgbaF16 => {
                for (o, v) in out.chunks_exact_mut(2).zip(rgba) {
                    o.copy_from_slice(&f16::from_f32(*v).to_le_bytes());
                }
            }
        }
    }

    /// Read the pixel at the start of `pixel` as normalized RGBA
    ///
    /// Layouts without alpha report an alpha of `1.0`.
    pub fn unpack(self, pixel: &[u8]) -> [f32; 4] {
        match self {
            Self::Gray8 => {
                let v = from_u8(pixel[0]);
                [v, v, v, 1.0]
            }
            Self::GrayAlpha8 => {
                let v = from_u8(pixel[0]);
                [v, v, v, from_u8(pixel[1])]
            }
            Self::Rgb8 => [from_u8(pixel[0]), from_u8(pixel[1]), from_u8(pixel[2]), 1.0],
            Self::Bgr8 => [from_u8(pixel[2]), from_u8(pixel[1]), from_u8(pixel[0]), 1.0],
            Self::Rgba8 => [
                from_u8(pixel[0]),
                from_u8(pixel[1]),
                from_u8(pixel[2]),
                from_u8(pixel[3])
            ],
            Self::Bgra8 => [
                from_u8(pixel[2]),
                from_u8(pixel[1]),
                from_u8(pixel[0]),
                from_u8(pixel[3])
            ],
            Self::RgbaF16 => {
                let mut out = [0.0; 4];
                for (o, v) in out.iter_mut().zip(pixel.chunks_exact(2)) {
                    *o = f16::from_le_bytes([v[0], v[1]]).to_f32();
                }
                out
            }
        }
    }

    /// Fast path for 8-bit sources, skips the float round trip
    /// for 8-bit layouts
    pub fn pack_rgba8(self, rgba: [u8; 4], out: &mut [u8]) {
        let [r, g, b, a] = rgba;

        match self {
            Self::Gray8 => out[0] = gray_u8(r, g, b),
            Self::GrayAlpha8 => {
                out[0] = gray_u8(r, g, b);
                out[1] = a;
            }
            Self::Rgb8 => out[..3].copy_from_slice(&[r, g, b]),
            Self::Bgr8 => out[..3].copy_from_slice(&[b, g, r]),
            Self::Rgba8 => out[..4].copy_from_slice(&rgba),
            Self::Bgra8 => out[..4].copy_from_slice(&[b, g, r, a]),
            Self::RgbaF16 => {
                self.pack(&[from_u8(r), from_u8(g), from_u8(b), from_u8(a)], out);
            }
        }
    }
}

/// Integer BT.601 luminance, weights scaled by 2^16
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn gray_u8(r: u8, g: u8, b: u8) -> u8 {
    let y = 19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b) + (1 << 15);
    (y >> 16) as u8
}

/// An owned, row major image in one [`PixelFormat`]
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width:  usize,
    height: usize,
    format: PixelFormat,
    data:   Vec<u8>
}

impl PixelBuffer {
    /// A zeroed buffer
    pub fn new(width: usize, height: usize, format: PixelFormat) -> PixelBuffer {
        let size = width * height * format.bytes_per_pixel();

        PixelBuffer {
            width,
            height,
            format,
            data: BYTE_POOL.rent(size).into_vec()
        }
    }

    /// Wrap existing pixels, returns `None` if the length does not match
    /// the dimensions
    pub fn from_raw(
        width: usize, height: usize, format: PixelFormat, data: Vec<u8>
    ) -> Option<PixelBuffer> {
        if data.len() != width * height * format.bytes_per_pixel() {
            return None;
        }
        Some(PixelBuffer {
            width,
            height,
            format,
            data
        })
    }

    /// Pack interleaved RGBA8 pixels into `format`
    ///
    /// Returns `None` if `rgba` does not hold exactly `width * height` pixels.
    pub fn from_rgba8(
        width: usize, height: usize, format: PixelFormat, rgba: &[u8]
    ) -> Option<PixelBuffer> {
        if rgba.len() != width * height * 4 {
            return None;
        }
        let mut out = PixelBuffer::new(width, height, format);
        let bpp = format.bytes_per_pixel();

        for (src, dst) in rgba.chunks_exact(4).zip(out.data.chunks_exact_mut(bpp)) {
            format.pack_rgba8([src[0], src[1], src[2], src[3]], dst);
        }
        Some(out)
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    const fn stride(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    /// Bytes of row `y`
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let stride = self.stride();
        self.data.get(y * stride..(y + 1) * stride)
    }

    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        let stride = self.stride();
        self.data.get_mut(y * stride..(y + 1) * stride)
    }

    /// Iterate over rows, top to bottom
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let stride = self.stride().max(1);
        self.data.chunks_exact_mut(stride)
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y * self.width + x) * self.format.bytes_per_pixel())
    }

    /// Normalized RGBA value at `(x,y)`
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<[f32; 4]> {
        let offset = self.offset(x, y)?;
        Some(self.format.unpack(&self.data[offset..]))
    }

    /// Store a normalized RGBA value at `(x,y)`, returns false if out of bounds
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: &[f32; 4]) -> bool {
        match self.offset(x, y) {
            Some(offset) => {
                self.format.pack(rgba, &mut self.data[offset..]);
                true
            }
            None => false
        }
    }

    /// Re-encode every pixel into another layout
    pub fn convert(&self, format: PixelFormat) -> PixelBuffer {
        if format == self.format {
            return self.clone();
        }
        let mut out = PixelBuffer::new(self.width, self.height, format);

        let in_bpp = self.format.bytes_per_pixel();
        let out_bpp = format.bytes_per_pixel();

        for (src, dst) in self
            .data
            .chunks_exact(in_bpp)
            .zip(out.data.chunks_exact_mut(out_bpp))
        {
            format.pack(&self.format.unpack(src), dst);
        }
        out
    }
}
