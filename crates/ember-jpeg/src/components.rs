/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! This module exports a single struct to store information about
//! JPEG image components
//!
//! The data is extracted from a SOF header.

use ember_core::log::trace;
use ember_core::pool::PooledBuffer;

use crate::errors::DecodeErrors;

/// Component Data from start of frame
#[derive(Debug)]
pub(crate) struct Components {
    /// The type of component that has the metadata below, can be Y,Cb or Cr
    pub component_id:              u8,
    /// Sub-sampling ratio of this component in the x-plane
    pub horizontal_sample:         usize,
    /// Sub-sampling ratio of this component in the y-plane
    pub vertical_sample:           usize,
    /// Quantization table number
    pub quantization_table_number: u8,
    /// Specifies the table in use for DC huffman table
    pub dc_huff_table:             usize,
    /// Specifies the table in use for AC huffman table
    pub ac_huff_table:             usize,
    /// DC prediction for the component
    pub dc_pred:                   i32,
    /// Blocks in one row of this component, padded to whole MCUs
    pub blocks_per_line:           usize,
    /// Rows of blocks, padded to whole MCUs
    pub block_rows:                usize,
    /// Decoded coefficients, 64 per block in zig-zag order
    pub coefficients:              PooledBuffer<'static, i16>
}

impl Components {
    /// Create a new instance from three bytes from the start of frame
    #[inline]
    pub fn from(a: [u8; 3]) -> Result<Components, DecodeErrors> {
        let horizontal_sample = usize::from(a[1] >> 4);
        let vertical_sample = usize::from(a[1] & 0x0f);

        let quantization_table_number = a[2];

        if quantization_table_number > 3 {
            return Err(DecodeErrors::SofError("Bad Tq value".to_string()));
        }
        for factor in [horizontal_sample, vertical_sample] {
            if !(1..=4).contains(&factor) {
                return Err(DecodeErrors::SofError(
                    "Unsupported Luma/chroma subsampling ratio".to_string()
                ));
            }
            if factor == 3 {
                return Err(DecodeErrors::SofError(
                    "Unsupported subsampling ratio".to_string()
                ));
            }
        }

        trace!(
            "Component ID:{}\tHS:{} VS:{} QT:{}",
            a[0],
            horizontal_sample,
            vertical_sample,
            quantization_table_number
        );

        Ok(Components {
            component_id: a[0],
            horizontal_sample,
            vertical_sample,
            quantization_table_number,
            // set by each start of scan
            dc_huff_table: 0,
            ac_huff_table: 0,
            dc_pred: 0,
            blocks_per_line: 0,
            block_rows: 0,
            coefficients: PooledBuffer::from_vec(Vec::new())
        })
    }

    /// Number of blocks this component contributes to one MCU
    pub const fn blocks_per_mcu(&self) -> usize {
        self.horizontal_sample * self.vertical_sample
    }
}
