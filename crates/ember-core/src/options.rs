/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Global Decoder options

use crate::colorspace::ColorSpace;

/// Decoder options
///
/// Not all options are respected by all decoders
#[derive(Debug, Copy, Clone)]
pub struct DecoderOptions {
    /// Maximum width for which decoders will
    /// not try to decode images larger than
    /// the specified width.
    ///
    /// - Default value: 16384
    max_width:       usize,
    /// Maximum height for which decoders will not
    /// try to decode images larger than the
    /// specified height
    ///
    /// - Default value: 16384
    max_height:      usize,
    /// Output colorspace
    ///
    /// The jpeg decoder allows conversion to a separate colorspace
    /// than the input.
    ///
    /// - Default value: `ColorSpace::RGBA`
    out_colorspace:  ColorSpace,
    /// Maximum number of scans allowed
    /// for progressive jpeg images
    ///
    /// - Default value:100
    max_scans:       usize,
    /// Reject inputs that a lenient decoder would tolerate
    strict_mode:     bool,
    /// Allow the decoder to spawn scoped threads
    use_threads:     bool,
    /// Skip storing metadata segments (Exif)
    ignore_metadata: bool
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_width:       1 << 14,
            max_height:      1 << 14,
            out_colorspace:  ColorSpace::RGBA,
            max_scans:       100,
            strict_mode:     false,
            use_threads:     true,
            ignore_metadata: false
        }
    }
}

impl DecoderOptions {
    /// Create options with the default, lenient configuration
    pub fn new() -> DecoderOptions {
        DecoderOptions::default()
    }

    /// Options that reject non-conforming streams
    pub fn new_strict() -> DecoderOptions {
        DecoderOptions::default().set_strict_mode(true)
    }

    /// Get maximum width configured for which the decoder
    /// should not try to decode images greater than this width
    pub const fn get_max_width(&self) -> usize {
        self.max_width
    }

    /// Get maximum height configured for which the decoder should
    /// not try to decode images greater than this height
    pub const fn get_max_height(&self) -> usize {
        self.max_height
    }

    /// Return true whether the decoder should be in strict mode
    /// And reject most errors
    pub const fn get_strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub const fn get_use_threads(&self) -> bool {
        self.use_threads
    }

    pub const fn get_ignore_metadata(&self) -> bool {
        self.ignore_metadata
    }

    /// Set maximum width for which the decoder should not try
    /// decoding images greater than that width
    pub fn set_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    /// Set maximum height for which the decoder should not try
    /// decoding images greater than that height
    pub fn set_max_height(mut self, height: usize) -> Self {
        self.max_height = height;
        self
    }

    /// Set whether the decoder should be in standards conforming/
    /// strict mode
    ///
    /// This reduces the error tolerance level for the decoders and invalid
    /// streams will be rejected instead of partially decoded
    pub fn set_strict_mode(mut self, yes: bool) -> Self {
        self.strict_mode = yes;
        self
    }

    /// Whether the decoder may use multiple threads for
    /// data parallel stages.
    ///
    /// Output is identical either way.
    pub fn set_use_threads(mut self, yes: bool) -> Self {
        self.use_threads = yes;
        self
    }

    pub fn set_ignore_metadata(mut self, yes: bool) -> Self {
        self.ignore_metadata = yes;
        self
    }
}

/// JPEG specific options
impl DecoderOptions {
    /// Get the colorspace the decoder will convert to
    pub const fn jpeg_get_out_colorspace(&self) -> ColorSpace {
        self.out_colorspace
    }

    /// Set the output colorspace
    ///
    /// The decoder falls back to RGBA if it cannot produce
    /// the requested colorspace from the image
    pub fn jpeg_set_out_colorspace(mut self, colorspace: ColorSpace) -> Self {
        self.out_colorspace = colorspace;
        self
    }

    pub const fn jpeg_get_max_scans(&self) -> usize {
        self.max_scans
    }

    /// Set the maximum number of scans a progressive image may have
    pub fn jpeg_set_max_scans(mut self, max_scans: usize) -> Self {
        self.max_scans = max_scans;
        self
    }
}
