/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Routines for IDCT
//!
//! Blocks whose energy sits in the top left 4x4 corner (common at high compression
//! and for chroma) take a cheaper path, everything else goes through the full
//! 8x8 transform.
#![allow(clippy::excessive_precision, clippy::unreadable_literal)]

pub mod scalar;

/// Check that only coefficients in the top left 4x4 corner are set
#[inline]
fn is_4x4(coefficients: &[i32; 64]) -> bool {
    coefficients
        .chunks_exact(8)
        .enumerate()
        .all(|(row, values)| {
            let start = if row < 4 { 4 } else { 0 };
            values[start..].iter().all(|x| *x == 0)
        })
}

/// Inverse transform one dequantized block (natural order) into `output`
///
/// `output` must span 8 rows of `stride` bytes, the block is written
/// to the first 8 bytes of each row.
pub fn idct_block(coefficients: &mut [i32; 64], output: &mut [u8], stride: usize) {
    if is_4x4(coefficients) && coefficients[1..].iter().any(|x| *x != 0) {
        scalar::idct4x4(coefficients, output, stride);
    } else {
        scalar::idct_int(coefficients, output, stride);
    }
}

#[cfg(test)]
mod tests {
    use super::scalar::{idct4x4, idct_int};
    use super::*;

    #[test]
    fn zeros_give_mid_gray() {
        let mut coeff = [0; 64];
        let mut output = [0; 64];

        idct_int(&mut coeff, &mut output, 8);
        assert!(output.iter().all(|x| *x == 128));
    }

    #[test]
    fn dc_only_block() {
        // a DC of 80 lifts every sample by 10 levels
        let mut coeff = [0; 64];
        coeff[0] = 80;
        let mut output = [0; 64];

        idct_block(&mut coeff, &mut output, 8);
        assert!(output.iter().all(|x| *x == 138));

        coeff = [0; 64];
        coeff[0] = -4000;
        idct_block(&mut coeff, &mut output, 8);
        assert!(output.iter().all(|x| *x == 0));
    }

    #[test]
    fn strided_output() {
        let mut coeff = [0; 64];
        coeff[0] = -160;
        let mut output = [7_u8; 16 * 8];

        idct_block(&mut coeff, &mut output, 16);

        for row in output.chunks_exact(16) {
            assert!(row[..8].iter().all(|x| *x == 108));
            // the neighbouring block is untouched
            assert!(row[8..].iter().all(|x| *x == 7));
        }
    }

    #[test]
    fn idct_4x4_matches_full_transform() {
        #[rustfmt::skip]
        const A: [i32; 32] = [
            -254, -7, 0, 0, 0, 0, 0, 0,
            7, 0, -30, 32,  0, 0, 0, 0,
            7, 0, -30, 32,  0, 0, 0, 0,
            7, 0, -30, 32,  0, 0, 0, 0,
        ];
        let mut a = [0i32; 64];
        a[..32].copy_from_slice(&A);
        let mut b = a;
        assert!(is_4x4(&a));

        let mut full = [0_u8; 64];
        let mut partial = [0_u8; 64];

        idct_int(&mut a, &mut full, 8);
        idct4x4(&mut b, &mut partial, 8);

        assert_eq!(full, partial);
    }

    #[test]
    fn detects_high_frequencies() {
        let mut coeff = [0; 64];
        coeff[4] = 3;
        assert!(!is_4x4(&coeff));

        coeff = [0; 64];
        coeff[8 * 5] = 3;
        assert!(!is_4x4(&coeff));
    }
}
