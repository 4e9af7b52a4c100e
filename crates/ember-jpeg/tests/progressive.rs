/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

mod common;

use ember_jpeg::ember_core::colorspace::ColorSpace;
use ember_jpeg::ember_core::options::DecoderOptions;
use ember_jpeg::errors::DecodeErrors;
use ember_jpeg::{JpegDecoder, SOFMarkers};
use jpeg_encoder::ColorType;

use crate::common::{
    assert_close, dqt, encode, encode_with, gray_frame, gray_scan, one_symbol_table,
    reference_decode, segment, test_image
};

fn luma(options: DecoderOptions) -> DecoderOptions {
    options.jpeg_set_out_colorspace(ColorSpace::Luma)
}

/// An 8x8 progressive image with a DC coefficient of 45 sent in two scans,
/// the top bits first and the lowest bit in a refinement scan
///
/// The DC quantizer is 8, so the block decodes to `128 + coefficient`.
fn successive_approximation(with_refinement: bool) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend(dqt(8));
    out.extend(gray_frame(0xC2, 8, 8));
    // 45 >> 1 = 22 is a magnitude category 5 difference
    out.extend(segment(0xC4, &one_symbol_table(0, 5)));

    // DC first scan with Al = 1, code `0` then `10110`, padded with ones
    out.extend(gray_scan(0, 0, 0x01));
    out.push(0x5B);

    if with_refinement {
        // a single `1` bit, the padded byte needs stuffing
        out.extend(gray_scan(0, 0, 0x10));
        out.extend_from_slice(&[0xFF, 0x00]);
    }
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

#[test]
fn progressive_matches_reference() {
    let (width, height) = (97, 61);
    let data = encode_with(
        &test_image(width, height, 3, 20),
        width,
        height,
        ColorType::Rgb,
        |encoder| encoder.set_progressive(true)
    );

    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(&data, options);
    let pixels = decoder.decode().unwrap();

    assert_eq!(
        decoder.info().unwrap().sof,
        SOFMarkers::ProgressiveDctHuffman
    );
    assert!(!decoder.is_partial());
    // one level of IDCT rounding becomes up to three after color conversion
    assert_close(&pixels, &reference_decode(&data), 3);
}

#[test]
fn progressive_and_baseline_agree() {
    // same quantized coefficients, only the entropy coding differs
    let (width, height) = (40, 40);
    let source = test_image(width, height, 1, 21);

    let baseline = encode(&source, width, height, ColorType::Luma);
    let progressive = encode_with(&source, width, height, ColorType::Luma, |encoder| {
        encoder.set_progressive(true);
    });

    let a = JpegDecoder::new_with_options(&baseline, luma(DecoderOptions::default()))
        .decode()
        .unwrap();
    let b = JpegDecoder::new_with_options(&progressive, luma(DecoderOptions::default()))
        .decode()
        .unwrap();

    assert_eq!(a, b);
}

#[test]
fn dc_refinement_adds_the_low_bit() {
    let data = successive_approximation(true);
    let mut decoder = JpegDecoder::new_with_options(&data, luma(DecoderOptions::new_strict()));

    let pixels = decoder.decode().unwrap();

    assert_eq!(pixels, vec![173; 64]);
    assert!(!decoder.is_partial());
}

#[test]
fn first_scan_alone_is_coarser() {
    let data = successive_approximation(false);
    let mut decoder = JpegDecoder::new_with_options(&data, luma(DecoderOptions::default()));

    assert_eq!(decoder.decode().unwrap(), vec![172; 64]);
}

#[test]
fn scan_limit() {
    let data = successive_approximation(true);
    let options = luma(DecoderOptions::default()).jpeg_set_max_scans(1);

    let err = JpegDecoder::new_with_options(&data, options)
        .decode()
        .unwrap_err();

    assert!(matches!(err, DecodeErrors::Format(_)));
}

#[test]
fn broken_later_scan_keeps_earlier_ones() {
    let mut data = successive_approximation(true);

    // point the refinement scan at a component that does not exist
    let second_scan = common::find_markers(&data, 0xDA)[1];
    data[second_scan + 5] = 9;

    let mut decoder = JpegDecoder::new_with_options(&data, luma(DecoderOptions::default()));

    assert_eq!(decoder.decode().unwrap(), vec![172; 64]);
    assert!(decoder.is_partial());

    let strict = JpegDecoder::new_with_options(&data, luma(DecoderOptions::new_strict())).decode();
    assert!(matches!(strict, Err(DecodeErrors::SosError(_))));
}
