/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//!This crate provides a library for decoding valid
//! ITU-T Rec. T.81 (JPEG-1) images.
//!
//! Baseline, extended sequential and progressive Huffman coded images are
//! supported, with 1, 3 or 4 components. Arithmetic coding, lossless and
//! hierarchical images are reported as unsupported.
//!
//! # Features
//!  - Integer IDCT with a shortcut for blocks whose energy sits in the top 4x4 corner
//!  - Coefficient and sample storage rented from the `ember-core` buffer pools
//!  - Per component reconstruction and banded color conversion on scoped threads
//!  - Output in RGB(A), BGR(A), grayscale or any [`PixelFormat`](ember_core::pixels::PixelFormat)
//!
//! # Examples
//!
//! ## Decode a JPEG file with default arguments.
//! ```no_run
//! use ember_jpeg::JpegDecoder;
//!
//! let data = std::fs::read("a_jpeg_file").unwrap();
//! let mut decoder = JpegDecoder::new(&data);
//! // RGBA pixels
//! let pixels = decoder.decode().unwrap();
//! ```
//!
//! ## Decode a JPEG file to BGR format
//! ```no_run
//! use ember_jpeg::ember_core::colorspace::ColorSpace;
//! use ember_jpeg::ember_core::options::DecoderOptions;
//! use ember_jpeg::JpegDecoder;
//!
//! let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::BGR);
//! let data = std::fs::read("a_jpeg_file").unwrap();
//!
//! let mut decoder = JpegDecoder::new_with_options(&data, options);
//! let pixels = decoder.decode().unwrap();
//! ```
//!
//! ## Decode an image and get its width and height.
//! ```no_run
//! use ember_jpeg::JpegDecoder;
//!
//! let data = std::fs::read("a_jpeg_file").unwrap();
//! let mut decoder = JpegDecoder::new(&data);
//! decoder.decode_headers().unwrap();
//!
//! let image_info = decoder.info().unwrap();
//! println!("{},{}", image_info.width, image_info.height)
//! ```
//!
//! The decoder tries to decode as many images as possible, even those violating the standard.
//! Such images produce warnings through the `log` crate and may be partially decoded
//! (see [`JpegDecoder::is_partial`]). If you only want to accept well formed images
//! enable strict mode with `DecoderOptions::set_strict_mode`.
#![warn(
    clippy::correctness,
    clippy::perf,
    clippy::pedantic,
    clippy::inline_always,
    clippy::missing_errors_doc,
    clippy::panic
)]
#![allow(
    clippy::needless_return,
    clippy::similar_names,
    clippy::inline_always,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
#![forbid(unsafe_code)]

pub use ember_core;

pub use crate::decoder::{ImageInfo, JpegDecoder};
pub use crate::misc::SOFMarkers;

mod bitstream;
mod color_convert;
mod components;
mod decoder;
pub mod errors;
mod headers;
mod huffman;
mod idct;
mod marker;
mod mcu;
mod misc;
mod worker;
