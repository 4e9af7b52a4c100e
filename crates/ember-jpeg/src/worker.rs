/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turn decoded coefficients into sample planes
//!
//! Each component is dequantized and inverse transformed into its own
//! byte plane, one thread per component when threading is enabled.

use ember_core::log::trace;
use ember_core::pool::{PooledBuffer, BYTE_POOL};

use crate::components::Components;
use crate::errors::DecodeErrors;
use crate::idct::idct_block;
use crate::misc::UN_ZIGZAG;

/// Reconstructed samples of one component
///
/// `stride` is the padded width, rows beyond the image height are padding too.
pub(crate) struct SamplePlane {
    pub data:   PooledBuffer<'static, u8>,
    pub stride: usize
}

/// Dequantize and IDCT every component
///
/// Quantization tables are looked up here, after all scans, so a table
/// redefined between scans applies with its last value.
pub(crate) fn reconstruct(
    components: &[Components], qt_tables: &[Option<[u16; 64]>; 4], use_threads: bool
) -> Result<Vec<SamplePlane>, DecodeErrors> {
    let mut jobs = Vec::with_capacity(components.len());

    for component in components {
        let table = qt_tables[usize::from(component.quantization_table_number)].ok_or_else(|| {
            DecodeErrors::DqtError(format!(
                "No quantization table {} defined for component {}",
                component.quantization_table_number, component.component_id
            ))
        })?;
        let mut widened = [0_i32; 64];

        for (w, q) in widened.iter_mut().zip(table.iter()) {
            *w = i32::from(*q);
        }
        let stride = component.blocks_per_line * 8;
        let plane = SamplePlane {
            data: BYTE_POOL.rent(stride * component.block_rows * 8),
            stride
        };
        jobs.push((component, widened, plane));
    }

    #[cfg(feature = "threads")]
    {
        if use_threads && jobs.len() > 1 {
            trace!("Reconstructing {} components in multithreaded mode", jobs.len());

            std::thread::scope(|s| {
                for (component, table, plane) in &mut jobs {
                    s.spawn(move || reconstruct_component(component, table, plane));
                }
            });
            return Ok(jobs.into_iter().map(|(_, _, plane)| plane).collect());
        }
    }
    #[cfg(not(feature = "threads"))]
    let _ = use_threads;

    trace!("Reconstructing {} components in single threaded mode", jobs.len());

    for (component, table, plane) in &mut jobs {
        reconstruct_component(component, table, plane);
    }
    Ok(jobs.into_iter().map(|(_, _, plane)| plane).collect())
}

fn reconstruct_component(component: &Components, table: &[i32; 64], plane: &mut SamplePlane) {
    let stride = plane.stride;

    if stride == 0 {
        return;
    }
    let block_row_len = component.blocks_per_line * 64;

    for (coefficients, rows) in component
        .coefficients
        .chunks_exact(block_row_len)
        .zip(plane.data.chunks_exact_mut(stride * 8))
    {
        for (x, block) in coefficients.chunks_exact(64).enumerate() {
            let mut natural = [0_i32; 64];

            for (k, (coefficient, q)) in block.iter().zip(table.iter()).enumerate() {
                natural[UN_ZIGZAG[k]] = i32::from(*coefficient) * q;
            }
            idct_block(&mut natural, &mut rows[x * 8..], stride);
        }
    }
}

#[cfg(test)]
mod tests {
    use ember_core::pool::COEFF_POOL;

    use super::*;

    fn component(blocks_per_line: usize, block_rows: usize) -> Components {
        let mut component = Components::from([1, 0x11, 0]).unwrap();
        component.blocks_per_line = blocks_per_line;
        component.block_rows = block_rows;
        component.coefficients = COEFF_POOL.rent(64 * blocks_per_line * block_rows);
        component
    }

    #[test]
    fn dc_levels_land_in_their_blocks() {
        let mut c = component(2, 1);
        // second block, DC of 10 scaled by 8
        c.coefficients[64] = 10;

        let mut qt = [1_u16; 64];
        qt[0] = 8;

        for threads in [false, true] {
            let planes = reconstruct(core::slice::from_ref(&c), &[Some(qt), None, None, None], threads).unwrap();
            let plane = &planes[0];

            assert_eq!(plane.stride, 16);
            for row in plane.data.chunks_exact(16) {
                assert!(row[..8].iter().all(|x| *x == 128));
                assert!(row[8..].iter().all(|x| *x == 138));
            }
        }
    }

    #[test]
    fn missing_table_is_an_error() {
        let c = component(1, 1);
        let err = reconstruct(core::slice::from_ref(&c), &[None; 4], false).err().unwrap();

        assert!(matches!(err, DecodeErrors::DqtError(_)));
    }
}
