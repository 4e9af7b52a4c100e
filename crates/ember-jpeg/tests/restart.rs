/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

mod common;

use ember_jpeg::ember_core::options::DecoderOptions;
use ember_jpeg::JpegDecoder;
use jpeg_encoder::ColorType;

use crate::common::{encode, encode_with, find_marker, flat_gray, test_image};

#[test]
fn restart_intervals_do_not_change_pixels() {
    let (width, height) = (70, 50);
    let source = test_image(width, height, 3, 30);

    let plain = encode(&source, width, height, ColorType::Rgb);
    let expected = JpegDecoder::new(&plain).decode().unwrap();

    for interval in [1, 3, 7] {
        let data = encode_with(&source, width, height, ColorType::Rgb, |encoder| {
            encoder.set_restart_interval(interval);
        });
        assert!(find_marker(&data, 0xD0).is_some());

        let mut decoder = JpegDecoder::new_with_options(&data, DecoderOptions::new_strict());

        assert_eq!(decoder.decode().unwrap(), expected);
        assert!(!decoder.is_partial());
    }
}

#[test]
fn hand_made_restart_markers() {
    // one block per interval, each padded to a byte
    let data = flat_gray(16, 8, Some(1), &[0x3F, 0xFF, 0xD0, 0x3F]);
    let mut decoder = JpegDecoder::new_with_options(&data, DecoderOptions::new_strict());

    let pixels = decoder.decode().unwrap();

    assert!(pixels.chunks_exact(4).all(|px| px == [128, 128, 128, 255]));
    assert!(!decoder.is_partial());
}

#[test]
fn out_of_order_restart_marker_is_tolerated() {
    let data = flat_gray(16, 8, Some(1), &[0x3F, 0xFF, 0xD5, 0x3F]);
    let mut decoder = JpegDecoder::new(&data);

    decoder.decode().unwrap();
    assert!(!decoder.is_partial());
}

#[test]
fn missing_restart_marker_gives_a_partial_image() {
    let data = flat_gray(24, 8, Some(1), &[0x3F, 0x3F, 0x3F]);
    let mut decoder = JpegDecoder::new(&data);

    let pixels = decoder.decode().unwrap();

    assert_eq!(pixels.len(), 24 * 8 * 4);
    assert!(decoder.is_partial());
}
