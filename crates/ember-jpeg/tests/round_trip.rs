/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decode images produced by `jpeg-encoder` and compare against `jpeg-decoder`

mod common;

use ember_jpeg::ember_core::colorspace::ColorSpace;
use ember_jpeg::ember_core::options::DecoderOptions;
use ember_jpeg::ember_core::pixels::PixelFormat;
use ember_jpeg::JpegDecoder;
use jpeg_encoder::{ColorType, SamplingFactor};

use crate::common::{
    assert_close, dqt, encode, encode_with, flat_gray, gray_frame, gray_scan, one_symbol_table,
    reference_decode, segment, test_image
};

fn decode_as(data: &[u8], colorspace: ColorSpace) -> Vec<u8> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(colorspace);
    JpegDecoder::new_with_options(data, options).decode().unwrap()
}

#[test]
fn rgb_matches_reference() {
    // odd sizes leave partial blocks on both edges
    let (width, height) = (67, 45);
    let data = encode(&test_image(width, height, 3, 1), width, height, ColorType::Rgb);

    let pixels = decode_as(&data, ColorSpace::RGB);

    assert_eq!(pixels.len(), width * height * 3);
    // the IDCTs round one level apart at most, the Cb term of blue scales that to three
    assert_close(&pixels, &reference_decode(&data), 3);
}

#[test]
fn gray_matches_reference() {
    let (width, height) = (50, 33);
    let data = encode(&test_image(width, height, 1, 2), width, height, ColorType::Luma);

    let pixels = decode_as(&data, ColorSpace::Luma);

    assert_close(&pixels, &reference_decode(&data), 2);
}

#[test]
fn default_output_is_rgba() {
    let (width, height) = (20, 12);
    let data = encode(&test_image(width, height, 1, 3), width, height, ColorType::Luma);

    let gray = decode_as(&data, ColorSpace::Luma);
    let mut decoder = JpegDecoder::new(&data);
    let rgba = decoder.decode().unwrap();

    assert_eq!(decoder.output_colorspace(), Some(ColorSpace::RGBA));
    assert_eq!(rgba.len(), width * height * 4);

    for (px, g) in rgba.chunks_exact(4).zip(&gray) {
        assert_eq!(px, &[*g, *g, *g, 255]);
    }
}

#[test]
fn bgr_layouts_swap_channels() {
    let (width, height) = (24, 16);
    let data = encode(&test_image(width, height, 3, 4), width, height, ColorType::Rgb);

    let rgb = decode_as(&data, ColorSpace::RGB);
    let bgr = decode_as(&data, ColorSpace::BGR);
    let bgra = decode_as(&data, ColorSpace::BGRA);

    for ((rgb, bgr), bgra) in rgb
        .chunks_exact(3)
        .zip(bgr.chunks_exact(3))
        .zip(bgra.chunks_exact(4))
    {
        assert_eq!([rgb[2], rgb[1], rgb[0]], bgr);
        assert_eq!(&bgra[..3], bgr);
        assert_eq!(bgra[3], 255);
    }
}

#[test]
fn ycbcr_output_is_raw_samples() {
    let (width, height) = (16, 16);
    let data = encode(&test_image(width, height, 3, 5), width, height, ColorType::Rgb);

    let mut decoder = JpegDecoder::new_with_options(
        &data,
        DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::YCbCr)
    );
    let samples = decoder.decode().unwrap();

    assert_eq!(decoder.output_colorspace(), Some(ColorSpace::YCbCr));
    assert_eq!(samples.len(), width * height * 3);
    // neutral gray chroma would be 128, a colorful image is not neutral
    assert!(samples.chunks_exact(3).any(|px| px[1] != 128 || px[2] != 128));
}

#[test]
fn subsampled_images_stay_close_to_the_source() {
    let (width, height) = (64, 48);
    let source = test_image(width, height, 3, 6);

    for factor in [SamplingFactor::F_2_1, SamplingFactor::F_2_2] {
        let data = encode_with(&source, width, height, ColorType::Rgb, |encoder| {
            encoder.set_sampling_factor(factor);
        });
        let pixels = decode_as(&data, ColorSpace::RGB);

        let total: u64 = pixels
            .iter()
            .zip(&source)
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        let mean = total as f64 / pixels.len() as f64;

        assert!(mean < 10.0, "Mean error {mean} is too large");
    }
}

#[test]
fn threads_do_not_change_output() {
    let (width, height) = (150, 100);
    let data = encode(&test_image(width, height, 3, 7), width, height, ColorType::Rgb);

    let decode = |use_threads| {
        let options = DecoderOptions::default().set_use_threads(use_threads);
        JpegDecoder::new_with_options(&data, options).decode().unwrap()
    };

    let serial = decode(false);
    let threaded = decode(true);

    assert_eq!(serial, threaded);
}

#[test]
fn flat_blocks_decode_to_mid_gray() {
    // four blocks, two zero bits each
    let data = flat_gray(16, 16, None, &[0x00]);

    let mut decoder = JpegDecoder::new(&data);
    let pixels = decoder.decode().unwrap();

    assert_eq!(pixels.len(), 16 * 16 * 4);
    assert!(pixels.chunks_exact(4).all(|px| px == [128, 128, 128, 255]));
    assert!(!decoder.is_partial());
}

/// One 8x8 block with DC difference category 3 and no AC terms
fn solid_block(entropy: u8) -> Vec<u8> {
    let mut tables = one_symbol_table(0, 3);
    tables.extend(one_symbol_table(1, 0x00));

    let mut out = vec![0xFF, 0xD8];
    out.extend(dqt(8));
    out.extend(gray_frame(0xC0, 8, 8));
    out.extend(segment(0xC4, &tables));
    out.extend(gray_scan(0, 63, 0));
    out.extend_from_slice(&[entropy, 0xFF, 0xD9]);
    out
}

#[test]
fn solid_blocks_keep_their_dc_level() {
    // `0` `111` `0`, +7 times a quantizer of 8 is 56, a level of 7 after the IDCT
    let data = solid_block(0x77);
    let pixels = decode_as(&data, ColorSpace::Luma);
    assert!(pixels.iter().all(|x| *x == 135), "{pixels:?}");

    // `0` `000` `0` is -7
    let data = solid_block(0x07);
    let pixels = decode_as(&data, ColorSpace::Luma);
    assert!(pixels.iter().all(|x| *x == 121), "{pixels:?}");
}

#[test]
fn decode_into_fills_a_caller_buffer() {
    let (width, height) = (19, 7);
    let data = encode(&test_image(width, height, 3, 8), width, height, ColorType::Rgb);

    let mut decoder = JpegDecoder::new(&data);
    decoder.decode_headers().unwrap();

    let size = decoder.output_buffer_size().unwrap();
    assert_eq!(size, width * height * 4);

    // larger buffers are fine, the tail is not touched
    let mut out = vec![7; size + 10];
    decoder.decode_into(&mut out).unwrap();

    assert_eq!(&out[..size], &decoder.decode().unwrap()[..]);
    assert!(out[size..].iter().all(|x| *x == 7));
}

#[test]
fn decoding_twice_gives_the_same_pixels() {
    let (width, height) = (33, 9);
    let data = encode(&test_image(width, height, 3, 9), width, height, ColorType::Rgb);

    let mut decoder = JpegDecoder::new(&data);

    assert_eq!(decoder.decode().unwrap(), decoder.decode().unwrap());
}

#[test]
fn pixel_formats() {
    let (width, height) = (21, 13);
    let data = encode(&test_image(width, height, 3, 10), width, height, ColorType::Rgb);

    let rgb = decode_as(&data, ColorSpace::RGB);
    let rgba = decode_as(&data, ColorSpace::RGBA);

    let mut decoder = JpegDecoder::new(&data);

    let buffer = decoder.decode_pixels(PixelFormat::Rgb8).unwrap();
    assert_eq!(buffer.dimensions(), (width, height));
    assert_eq!(buffer.as_bytes(), &rgb[..]);

    let gray_alpha = decoder.decode_pixels(PixelFormat::GrayAlpha8).unwrap();
    assert_eq!(gray_alpha.as_bytes().len(), width * height * 2);
    assert!(gray_alpha.as_bytes().chunks_exact(2).all(|px| px[1] == 255));

    let half = decoder.decode_pixels(PixelFormat::RgbaF16).unwrap();
    assert_eq!(half.as_bytes().len(), width * height * 8);

    for (i, px) in rgba.chunks_exact(4).enumerate() {
        let value = half.get_pixel(i % width, i / width).unwrap();

        for (channel, expected) in value.iter().zip(px) {
            assert!((channel - f32::from(*expected) / 255.0).abs() < 1e-3);
        }
    }

    // the configured colorspace is left alone
    assert_eq!(decoder.output_colorspace(), Some(ColorSpace::RGBA));
}
