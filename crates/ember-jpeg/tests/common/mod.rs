/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Helpers shared by the integration tests
#![allow(dead_code)]

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use nanorand::{Rng, WyRand};

/// A gradient with a bit of noise, `channels` interleaved bytes per pixel
pub fn test_image(width: usize, height: usize, channels: usize, seed: u64) -> Vec<u8> {
    let mut rng = WyRand::new_seed(seed);
    let mut pixels = Vec::with_capacity(width * height * channels);

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let base = (x * 200 / width + y * 50 / height + c * 37) % 224;
                pixels.push((base as u8).wrapping_add(rng.generate::<u8>() % 16));
            }
        }
    }
    pixels
}

/// Encode with every channel at full resolution
pub fn encode(pixels: &[u8], width: usize, height: usize, color: ColorType) -> Vec<u8> {
    encode_with(pixels, width, height, color, |_| ())
}

pub fn encode_with(
    pixels: &[u8], width: usize, height: usize, color: ColorType,
    setup: impl FnOnce(&mut Encoder<&mut Vec<u8>>)
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, 90);

    encoder.set_sampling_factor(SamplingFactor::F_1_1);
    setup(&mut encoder);
    encoder
        .encode(pixels, width as u16, height as u16, color)
        .unwrap();

    out
}

/// Pixels according to the `jpeg-decoder` crate
pub fn reference_decode(data: &[u8]) -> Vec<u8> {
    jpeg_decoder::Decoder::new(data).decode().unwrap()
}

/// Rounding differences between decoders stay small
pub fn assert_close(ours: &[u8], reference: &[u8], tolerance: u8) {
    assert_eq!(ours.len(), reference.len(), "Output sizes differ");

    let mut total = 0_u64;

    for (i, (a, b)) in ours.iter().zip(reference).enumerate() {
        let diff = a.abs_diff(*b);
        assert!(diff <= tolerance, "Byte {i} differs by {diff} ({a} vs {b})");
        total += u64::from(diff);
    }
    let mean = total as f64 / ours.len() as f64;
    assert!(mean < 1.0, "Mean difference {mean} is too large");
}

/// A marker segment, length included
pub fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + 2) as u16;

    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Quantization table 0, `dc` for the DC entry and ones everywhere else
pub fn dqt(dc: u8) -> Vec<u8> {
    let mut payload = vec![0x00, dc];
    payload.extend_from_slice(&[1; 63]);
    segment(0xDB, &payload)
}

/// Single component frame header
pub fn gray_frame(sof: u8, width: u16, height: u16) -> Vec<u8> {
    let mut payload = vec![8];
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&[1, 1, 0x11, 0]);
    segment(sof, &payload)
}

/// A table with one code of length one, `class` 0 for DC and 1 for AC
pub fn one_symbol_table(class: u8, symbol: u8) -> Vec<u8> {
    let mut payload = vec![class << 4, 1];
    payload.extend_from_slice(&[0; 15]);
    payload.push(symbol);
    payload
}

/// Scan header for component 1 using tables 0
pub fn gray_scan(ss: u8, se: u8, ah_al: u8) -> Vec<u8> {
    segment(0xDA, &[1, 1, 0x00, ss, se, ah_al])
}

/// A baseline grayscale image where every block has a zero DC difference
/// and an immediate end of block, decoding to a flat 128
///
/// Every block codes as two zero bits, `data` is the entropy coded segment.
pub fn flat_gray(width: u16, height: u16, restart_interval: Option<u16>, data: &[u8]) -> Vec<u8> {
    let mut tables = one_symbol_table(0, 0x00);
    tables.extend(one_symbol_table(1, 0x00));

    let mut out = vec![0xFF, 0xD8];
    out.extend(dqt(1));
    out.extend(gray_frame(0xC0, width, height));
    out.extend(segment(0xC4, &tables));

    if let Some(interval) = restart_interval {
        out.extend(segment(0xDD, &interval.to_be_bytes()));
    }
    out.extend(gray_scan(0, 63, 0));
    out.extend_from_slice(data);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// Position of the first occurrence of marker `code`
pub fn find_marker(data: &[u8], code: u8) -> Option<usize> {
    data.windows(2).position(|w| w == [0xFF, code])
}

/// Positions of every occurrence of marker `code`
pub fn find_markers(data: &[u8], code: u8) -> Vec<usize> {
    data.windows(2)
        .enumerate()
        .filter(|(_, w)| *w == [0xFF, code])
        .map(|(i, _)| i)
        .collect()
}
