/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Main image logic.
#![allow(clippy::doc_markdown)]

use ember_core::bytestream::ZByteReader;
use ember_core::colorspace::ColorSpace;
use ember_core::log::{debug, trace, warn};
use ember_core::options::DecoderOptions;
use ember_core::pixels::{PixelBuffer, PixelFormat};
use ember_core::pool::{PooledBuffer, BYTE_POOL};

use crate::color_convert::{convert_planes, resolve_output, Plane};
use crate::components::Components;
use crate::errors::{DecodeErrors, UnsupportedSchemes};
use crate::headers::{
    allocate_coefficients, parse_app0, parse_app1, parse_app14, parse_dqt, parse_dri,
    parse_huffman, parse_sos, parse_start_of_frame
};
use crate::huffman::HuffmanTable;
use crate::marker::Marker;
use crate::mcu::ScanState;
use crate::misc::SOFMarkers;
use crate::worker::reconstruct;

/// Maximum components
pub(crate) const MAX_COMPONENTS: usize = 4;

/// A JPEG Decoder Instance.
#[allow(clippy::upper_case_acronyms, clippy::struct_excessive_bools)]
pub struct JpegDecoder<'a> {
    /// Struct to hold image information from SOI
    pub(crate) info:              ImageInfo,
    ///  Quantization tables, in zig-zag order
    pub(crate) qt_tables:         [Option<[u16; 64]>; MAX_COMPONENTS],
    /// DC Huffman Tables with a maximum of 4 tables for each  component
    pub(crate) dc_huffman_tables: [Option<HuffmanTable>; MAX_COMPONENTS],
    /// AC Huffman Tables with a maximum of 4 tables for each component
    pub(crate) ac_huffman_tables: [Option<HuffmanTable>; MAX_COMPONENTS],
    /// Image components, holds information like DC prediction and quantization
    /// tables of a component
    pub(crate) components:        Vec<Components>,
    /// maximum horizontal component of all channels in the image
    pub(crate) h_max:             usize,
    // maximum vertical component of all channels in the image
    pub(crate) v_max:             usize,
    /// MCUs in a row
    pub(crate) mcu_x:             usize,
    /// MCU rows
    pub(crate) mcu_y:             usize,
    /// Is the image progressive?
    pub(crate) is_progressive:    bool,
    /// MCUs between restart markers, zero when restarts are not used
    pub(crate) restart_interval:  usize,
    pub(crate) seen_sof:          bool,
    /// Indicate whether headers have been decoded
    pub(crate) headers_decoded:   bool,
    /// The entropy coded data ended before every MCU was seen
    pub(crate) unexpected_eof:    bool,
    partial:                      bool,
    scans_decoded:                usize,
    /// Components that appeared in at least one scan
    coded:                        [bool; MAX_COMPONENTS],
    /// TIFF structure of the Exif segment
    pub(crate) exif:              Option<&'a [u8]>,
    pub(crate) options:           DecoderOptions,
    data:                         &'a [u8],
    pub(crate) stream:            ZByteReader<'a>
}

impl<'a> JpegDecoder<'a> {
    fn default(options: DecoderOptions, data: &'a [u8]) -> Self {
        JpegDecoder {
            info: ImageInfo::default(),
            qt_tables: [None; MAX_COMPONENTS],
            dc_huffman_tables: [None, None, None, None],
            ac_huffman_tables: [None, None, None, None],
            components: vec![],
            h_max: 1,
            v_max: 1,
            mcu_x: 0,
            mcu_y: 0,
            is_progressive: false,
            restart_interval: 0,
            seen_sof: false,
            headers_decoded: false,
            unexpected_eof: false,
            partial: false,
            scans_decoded: 0,
            coded: [false; MAX_COMPONENTS],
            exif: None,
            options,
            data,
            stream: ZByteReader::new(data)
        }
    }

    /// Create a new Decoder instance
    #[must_use]
    pub fn new(data: &'a [u8]) -> JpegDecoder<'a> {
        JpegDecoder::default(DecoderOptions::default(), data)
    }

    /// Create a new decoder with the specified options to be used for decoding
    /// an image
    #[must_use]
    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> JpegDecoder<'a> {
        JpegDecoder::default(options, data)
    }

    /// Forget everything learnt from the stream, options are kept
    fn reset(&mut self) {
        *self = JpegDecoder::default(self.options, self.data);
    }

    /// Read only headers from a jpeg image buffer
    ///
    /// This allows you to extract important information like
    /// image width and height without decoding the full image.
    /// Calling it again after it succeeded does nothing.
    ///
    /// # Examples
    /// ```no_run
    /// use ember_jpeg::JpegDecoder;
    ///
    /// let img_data = std::fs::read("a_valid.jpeg").unwrap();
    /// let mut decoder = JpegDecoder::new(&img_data);
    /// decoder.decode_headers().unwrap();
    ///
    /// let (width, height) = decoder.dimensions().unwrap();
    /// println!("Image is {width}x{height} pixels");
    /// ```
    /// # Errors
    /// See DecodeErrors enum for list of possible errors during decoding
    pub fn decode_headers(&mut self) -> Result<(), DecodeErrors> {
        if self.headers_decoded {
            trace!("Headers decoded!");
            return Ok(());
        }
        self.reset();
        self.parse_markers(true)?;
        self.headers_decoded = true;

        Ok(())
    }

    /// Returns the image information
    ///
    /// This **must** be called after a call to `decode_headers` or
    /// `decode` otherwise it will return None
    #[must_use]
    pub fn info(&self) -> Option<ImageInfo> {
        if !self.headers_decoded {
            return None;
        }
        let mut info = self.info.clone();
        self.fill_resolution(&mut info);

        Some(info)
    }

    /// Width and height of the image, available once headers are decoded
    #[must_use]
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.headers_decoded
            .then_some((self.info.width, self.info.height))
    }

    /// The colorspace of the coded samples
    ///
    /// `None` before the headers are decoded, or when the colorspace of a
    /// 4 component image cannot be told.
    #[must_use]
    pub fn input_colorspace(&self) -> Option<ColorSpace> {
        if !self.headers_decoded {
            return None;
        }
        self.detect_colorspace().ok()
    }

    /// Get the output colorspace the image pixels will be decoded into
    ///
    /// This may differ from the configured one when the input cannot be
    /// converted to it.
    #[must_use]
    pub fn output_colorspace(&self) -> Option<ColorSpace> {
        let input = self.input_colorspace()?;
        Some(resolve_output(
            input,
            self.options.jpeg_get_out_colorspace()
        ))
    }

    /// Bytes needed to hold the decoded image
    #[must_use]
    pub fn output_buffer_size(&self) -> Option<usize> {
        let (width, height) = self.dimensions()?;
        let output = self.output_colorspace()?;

        width
            .checked_mul(height)?
            .checked_mul(output.num_components())
    }

    /// Whether the last decode stopped short of the full image
    ///
    /// Truncated data, a missing restart marker or a broken progressive
    /// scan leave the affected area with whatever was decoded up to that point.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial
    }

    /// Raw Exif data (the TIFF structure following `Exif\0\0`), if the image has any
    #[must_use]
    pub const fn exif(&self) -> Option<&'a [u8]> {
        self.exif
    }

    /// Decode a buffer already in memory
    ///
    /// The buffer should be a valid jpeg file, perhaps created by the command
    /// `std:::fs::read()` or a JPEG file downloaded from the internet.
    ///
    /// # Errors
    /// See DecodeErrors for an explanation
    pub fn decode(&mut self) -> Result<Vec<u8>, DecodeErrors> {
        self.decode_headers()?;

        let size = self.required_size()?;
        let mut pixels = BYTE_POOL.rent(size);

        self.decode_into(&mut pixels)?;

        Ok(pixels.into_vec())
    }

    /// Decode into a caller supplied buffer
    ///
    /// `out` must hold at least [`output_buffer_size`](Self::output_buffer_size) bytes,
    /// pixels are written interleaved, row by row.
    ///
    /// # Errors
    /// [`DecodeErrors::TooSmallOutput`] if `out` is too small, otherwise
    /// see DecodeErrors for an explanation
    pub fn decode_into(&mut self, out: &mut [u8]) -> Result<(), DecodeErrors> {
        self.decode_headers()?;

        let size = self.required_size()?;

        if out.len() < size {
            return Err(DecodeErrors::TooSmallOutput(size, out.len()));
        }

        self.reset();
        self.parse_markers(false)?;
        self.headers_decoded = true;

        self.finish(&mut out[..size])
    }

    /// Decode into a [`PixelBuffer`] of the given format
    ///
    /// # Errors
    /// See DecodeErrors for an explanation
    pub fn decode_pixels(&mut self, format: PixelFormat) -> Result<PixelBuffer, DecodeErrors> {
        let direct = match format {
            PixelFormat::Gray8 => Some(ColorSpace::Luma),
            PixelFormat::GrayAlpha8 => Some(ColorSpace::LumaA),
            PixelFormat::Rgb8 => Some(ColorSpace::RGB),
            PixelFormat::Bgr8 => Some(ColorSpace::BGR),
            PixelFormat::Rgba8 => Some(ColorSpace::RGBA),
            PixelFormat::Bgra8 => Some(ColorSpace::BGRA),
            PixelFormat::RgbaF16 => None
        };

        let saved = self.options;
        self.options = saved.jpeg_set_out_colorspace(direct.unwrap_or(ColorSpace::RGBA));
        let result = self.decode();
        self.options = saved;

        let pixels = result?;
        let (width, height) = (self.info.width, self.info.height);

        let buffer = match direct {
            Some(_) => PixelBuffer::from_raw(width, height, format, pixels),
            None => PixelBuffer::from_rgba8(width, height, format, &pixels)
        };
        buffer.ok_or(DecodeErrors::FormatStatic(
            "Decoded pixels do not match the image dimensions"
        ))
    }

    fn required_size(&self) -> Result<usize, DecodeErrors> {
        let input = self.detect_colorspace()?;
        let output = resolve_output(input, self.options.jpeg_get_out_colorspace());

        self.info
            .width
            .checked_mul(self.info.height)
            .and_then(|x| x.checked_mul(output.num_components()))
            .ok_or(DecodeErrors::LargeDimensions(self.info.width))
    }

    /// Work out what the samples mean from the component count and
    /// JFIF/Adobe markers
    fn detect_colorspace(&self) -> Result<ColorSpace, DecodeErrors> {
        match self.components.len() {
            1 => Ok(ColorSpace::Luma),
            3 => {
                if self.info.is_jfif {
                    return Ok(ColorSpace::YCbCr);
                }
                if self.info.adobe_transform == Some(0) {
                    return Ok(ColorSpace::RGB);
                }
                let ids: Vec<u8> = self.components.iter().map(|c| c.component_id).collect();

                if ids == b"RGB" {
                    Ok(ColorSpace::RGB)
                } else {
                    Ok(ColorSpace::YCbCr)
                }
            }
            4 => match self.info.adobe_transform {
                None => Err(DecodeErrors::FormatStatic(
                    "Unknown color model: 4-component JPEG doesn't have Adobe APP14 metadata"
                )),
                Some(0) => Ok(ColorSpace::CMYK),
                Some(2) => Ok(ColorSpace::YCCK),
                Some(transform) => {
                    warn!("Unknown Adobe color transform {transform}, treating the image as YCCK");
                    Ok(ColorSpace::YCCK)
                }
            },
            _ => Err(DecodeErrors::FormatStatic("Image has no components"))
        }
    }

    /// Find the next marker, skipping fill bytes and anything that is not a marker
    fn next_marker(&mut self) -> Result<Option<Marker>, DecodeErrors> {
        let mut skipped = 0_usize;

        loop {
            if self.stream.eof() {
                return Ok(None);
            }
            if self.stream.get_u8() != 0xFF {
                skipped += 1;
                continue;
            }
            // fill bytes
            while self.stream.peek_at(0) == Some(0xFF) {
                self.stream.skip(1)?;
            }
            let Some(code) = self.stream.peek_at(0) else {
                return Ok(None);
            };
            self.stream.skip(1)?;

            let Some(marker) = Marker::from_u8(code) else {
                // a stuffed zero outside entropy coded data
                skipped += 2;
                continue;
            };

            if skipped > 0 {
                if self.options.get_strict_mode() {
                    return Err(DecodeErrors::Format(format!(
                        "[strict-mode]: {skipped} extraneous bytes before marker {marker:?}"
                    )));
                }
                warn!("Corrupt JPEG data: {skipped} extraneous bytes before marker {marker:?}");
            }
            return Ok(Some(marker));
        }
    }

    /// Walk the segments of the stream
    ///
    /// With `metadata_only` set no entropy coded data is decoded, parsing stops
    /// after the frame header of JFIF images and at the first scan otherwise.
    fn parse_markers(&mut self, metadata_only: bool) -> Result<(), DecodeErrors> {
        // First two bytes should be jpeg soi marker
        let magic_bytes = u16::from_be_bytes([self.stream.get_u8(), self.stream.get_u8()]);

        if magic_bytes != 0xFFD8 {
            return Err(DecodeErrors::IllegalMagicBytes(magic_bytes));
        }

        loop {
            let Some(marker) = self.next_marker()? else {
                if self.scans_decoded > 0 {
                    // only running dry inside a scan makes the image partial
                    warn!("Data ended without an EOI marker");
                }
                break;
            };
            trace!("Marker {marker:?}");

            match marker {
                Marker::EOI => break,
                // restart markers outside a scan carry no data
                Marker::RST(_) => continue,
                _ => ()
            }

            let length = usize::from(self.stream.get_u16_be_err()?);
            let remaining = length
                .checked_sub(2)
                .ok_or(DecodeErrors::FormatStatic("Short segment length"))?;

            if !self.parse_marker_inner(marker, remaining, metadata_only)? {
                break;
            }
        }

        if !self.seen_sof {
            return Err(DecodeErrors::FormatStatic("Missing SOF marker"));
        }
        if !metadata_only && self.scans_decoded == 0 {
            return Err(DecodeErrors::FormatStatic("Missing SOS marker"));
        }
        self.partial |= self.unexpected_eof;

        Ok(())
    }

    /// Handle one segment, returns false once parsing should stop
    fn parse_marker_inner(
        &mut self, marker: Marker, remaining: usize, metadata_only: bool
    ) -> Result<bool, DecodeErrors> {
        match marker {
            Marker::SOF(n) => {
                let sof = SOFMarkers::from_int(n)
                    .ok_or(DecodeErrors::FormatStatic("Unknown marker"))?;

                if let Some(scheme) = UnsupportedSchemes::from_marker(sof) {
                    return Err(DecodeErrors::Unsupported(scheme));
                }
                debug!("Image encoding scheme =`{:?}`", sof);

                parse_start_of_frame(sof, self, remaining)?;

                if metadata_only {
                    if self.info.is_jfif {
                        return Ok(false);
                    }
                } else {
                    allocate_coefficients(self);
                }
            }
            Marker::DHT | Marker::DQT | Marker::DRI if metadata_only => {
                self.stream.skip(remaining)?;
            }
            Marker::DHT => parse_huffman(self, remaining)?,
            Marker::DQT => parse_dqt(self, remaining)?,
            Marker::DRI => parse_dri(self, remaining)?,
            Marker::APP(0) => parse_app0(self, remaining)?,
            Marker::APP(1) => parse_app1(self, remaining)?,
            Marker::APP(14) => parse_app14(self, remaining)?,
            Marker::APP(_) => self.stream.skip(remaining)?,
            Marker::COM => {
                let comment = self.stream.read_exact_bytes(remaining)?;
                trace!("Comment: {}", String::from_utf8_lossy(comment));
            }
            Marker::SOS => {
                if metadata_only {
                    return Ok(false);
                }
                return self.start_scan(remaining);
            }
            _ => return Err(DecodeErrors::FormatStatic("Unknown marker"))
        }
        Ok(true)
    }

    /// Parse a scan header and decode the scan following it, returns false once
    /// no further scans should be read
    fn start_scan(&mut self, remaining: usize) -> Result<bool, DecodeErrors> {
        self.scans_decoded += 1;

        let max_scans = self.options.jpeg_get_max_scans();

        if self.scans_decoded > max_scans {
            return Err(DecodeErrors::Format(format!(
                "Too many scans, the decoder is configured to stop after {max_scans}"
            )));
        }

        let scan = match self.scan(remaining) {
            Ok(scan) => scan,
            Err(err) => {
                if self.is_progressive
                    && self.scans_decoded > 1
                    && !self.options.get_strict_mode()
                {
                    warn!(
                        "Error in progressive scan {}, {err:?}, keeping the scans decoded before it",
                        self.scans_decoded
                    );
                    self.partial = true;
                    return Ok(false);
                }
                return Err(err);
            }
        };

        for index in &scan.components {
            self.coded[*index] = true;
        }

        if self.unexpected_eof {
            return Ok(false);
        }
        if !self.is_progressive {
            // sequential images may code components in separate scans
            return Ok(!self.coded[..self.components.len()].iter().all(|x| *x));
        }
        Ok(true)
    }

    fn scan(&mut self, remaining: usize) -> Result<ScanState, DecodeErrors> {
        let mut scan = parse_sos(self, remaining)?;
        self.decode_scan(&mut scan)?;

        Ok(scan)
    }

    /// Reconstruct and color convert into `out`, which is exactly the output size
    fn finish(&mut self, out: &mut [u8]) -> Result<(), DecodeErrors> {
        let input = self.detect_colorspace()?;
        let output = resolve_output(input, self.options.jpeg_get_out_colorspace());
        let use_threads = self.options.get_use_threads();

        let samples = reconstruct(&self.components, &self.qt_tables, use_threads)?;

        for component in &mut self.components {
            // coefficients go back to their pool
            component.coefficients = PooledBuffer::from_vec(Vec::new());
        }

        let planes: Vec<Plane> = self
            .components
            .iter()
            .zip(&samples)
            .map(|(component, samples)| Plane {
                data:   &samples.data[..],
                stride: samples.stride,
                sx:     self.h_max / component.horizontal_sample,
                sy:     self.v_max / component.vertical_sample
            })
            .collect();

        convert_planes(
            &planes,
            input,
            output,
            self.info.width,
            self.info.height,
            out,
            use_threads
        );

        if self.partial {
            warn!("Image was only partially decoded");
        }
        Ok(())
    }

    /// Physical resolution, JFIF densities first, Exif as the fallback
    fn fill_resolution(&self, info: &mut ImageInfo) {
        if info.is_jfif && info.x_density > 0 && info.y_density > 0 {
            info.horizontal_resolution = f64::from(info.x_density);
            info.vertical_resolution = f64::from(info.y_density);
            return;
        }
        #[cfg(feature = "metadata")]
        {
            if let Some((x, y)) = self.exif.and_then(exif_resolution) {
                info.horizontal_resolution = x;
                info.vertical_resolution = y;
            }
        }
    }
}

/// `XResolution` and `YResolution` of the primary image, when both are positive
#[cfg(feature = "metadata")]
fn exif_resolution(tiff: &[u8]) -> Option<(f64, f64)> {
    use exif::{In, Tag, Value};

    let fields = match exif::parse_exif(tiff) {
        Ok((fields, _)) => fields,
        Err(err) => {
            warn!("Error while parsing exif chunk {:?}", err);
            return None;
        }
    };

    let lookup = |tag: Tag| {
        fields
            .iter()
            .find(|f| f.tag == tag && f.ifd_num == In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Rational(v) => v.first().map(|r| r.to_f64()),
                _ => None
            })
    };
    let x = lookup(Tag::XResolution)?;
    let y = lookup(Tag::YResolution)?;

    (x > 0.0 && y > 0.0).then_some((x, y))
}

/// A struct representing Image Information
#[derive(Default, Clone, Debug, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct ImageInfo {
    /// Width of the image
    pub width:                 usize,
    /// Height of image
    pub height:                usize,
    /// Number of components
    pub components:            usize,
    /// Start of frame markers
    pub sof:                   SOFMarkers,
    /// Whether a JFIF APP0 segment was present
    pub is_jfif:               bool,
    /// JFIF density unit, 0 for an aspect ratio, 1 for dots per inch, 2 for dots per cm
    pub density_unit:          u8,
    /// Horizontal JFIF density
    pub x_density:             u16,
    /// Vertical JFIF density
    pub y_density:             u16,
    pub horizontal_resolution: f64,
    pub vertical_resolution:   f64,
    /// Color transform of the Adobe APP14 segment
    pub adobe_transform:       Option<u8>
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_needs_headers() {
        let decoder = JpegDecoder::new(&[0xFF, 0xD8]);

        assert!(decoder.info().is_none());
        assert!(decoder.dimensions().is_none());
        assert!(decoder.output_buffer_size().is_none());
    }

    #[test]
    fn marker_search_skips_fill_and_stuffing() {
        let data = [0xFF, 0xFF, 0xFF, 0xDB, 0x12, 0xFF, 0x00, 0xFF, 0xD9];
        let mut decoder = JpegDecoder::new(&data);

        assert_eq!(decoder.next_marker().unwrap(), Some(Marker::DQT));
        assert_eq!(decoder.next_marker().unwrap(), Some(Marker::EOI));
        assert_eq!(decoder.next_marker().unwrap(), None);

        let mut strict = JpegDecoder::new_with_options(&data, DecoderOptions::new_strict());
        strict.next_marker().unwrap();
        assert!(strict.next_marker().is_err());
    }

    #[test]
    fn frame_header_allocates_blocks() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xC0, 0, 17, 8, 0, 16, 0, 24, 3];
        data.extend([1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        data.extend([0xFF, 0xD9]);

        let mut headers = JpegDecoder::new(&data);
        headers.parse_markers(true).unwrap();
        assert!(headers.components.iter().all(|c| c.coefficients.is_empty()));

        let mut decoder = JpegDecoder::new(&data);
        let err = decoder.parse_markers(false).unwrap_err();
        assert!(matches!(err, DecodeErrors::FormatStatic("Missing SOS marker")));

        // 2x1 MCUs of 16x16 pixels
        let blocks: Vec<usize> = decoder
            .components
            .iter()
            .map(|c| c.coefficients.len() / 64)
            .collect();
        assert_eq!(blocks, [2 * 4, 2, 2]);
    }

    #[test]
    fn colorspace_detection() {
        let mut decoder = JpegDecoder::new(&[]);

        for id in *b"RGB" {
            decoder.components.push(Components::from([id, 0x11, 0]).unwrap());
        }
        assert_eq!(decoder.detect_colorspace().unwrap(), ColorSpace::RGB);

        decoder.info.is_jfif = true;
        assert_eq!(decoder.detect_colorspace().unwrap(), ColorSpace::YCbCr);

        decoder.components.push(Components::from([b'K', 0x11, 0]).unwrap());
        assert!(decoder.detect_colorspace().is_err());

        decoder.info.adobe_transform = Some(0);
        assert_eq!(decoder.detect_colorspace().unwrap(), ColorSpace::CMYK);
        decoder.info.adobe_transform = Some(7);
        assert_eq!(decoder.detect_colorspace().unwrap(), ColorSpace::YCCK);
    }
}
