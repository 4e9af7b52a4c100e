/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decode Decoder markers/segments
//!
//! This file deals with decoding header information in a jpeg file.
//! Every parser receives the number of bytes left in its segment
//! (the length field minus its own two bytes) and must consume exactly that.

use ember_core::log::{debug, trace, warn};
use ember_core::pool::COEFF_POOL;

use crate::components::Components;
use crate::decoder::{JpegDecoder, MAX_COMPONENTS};
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::mcu::ScanState;
use crate::misc::SOFMarkers;

///**B.2.4.2 Huffman table-specification syntax**
pub(crate) fn parse_huffman(
    decoder: &mut JpegDecoder, mut remaining: usize
) -> Result<(), DecodeErrors> {
    // A single DHT segment may define several tables
    while remaining > 0 {
        if remaining < 17 {
            return Err(DecodeErrors::HuffmanDecode(
                "DHT has wrong length".to_string()
            ));
        }
        let ht_info = decoder.stream.get_u8_err()?;
        // 0 for DC tables, 1 for AC tables
        let class = ht_info >> 4;
        let index = usize::from(ht_info & 0xF);

        if class > 1 {
            return Err(DecodeErrors::HuffmanDecode("Bad Tc value".to_string()));
        }
        // baseline decoders only get two tables of each class
        let max_index = if decoder.seen_sof && decoder.info.sof == SOFMarkers::BaselineDct {
            1
        } else {
            MAX_COMPONENTS - 1
        };
        if index > max_index {
            return Err(DecodeErrors::HuffmanDecode("Bad Th value".to_string()));
        }

        let mut codes = [0_u8; 17];
        codes[1..].copy_from_slice(decoder.stream.read_exact_bytes(16)?);

        remaining -= 17;

        let total: usize = codes.iter().map(|x| usize::from(*x)).sum();

        if total > 256 || total > remaining {
            return Err(DecodeErrors::HuffmanDecode(
                "DHT has wrong length".to_string()
            ));
        }
        let symbols = decoder.stream.read_exact_bytes(total)?;
        remaining -= total;

        let table = HuffmanTable::new(&codes, symbols)?;

        trace!(
            "Assigning {} huffman table {index} with {total} symbols",
            if class == 0 { "DC" } else { "AC" }
        );

        if class == 0 {
            decoder.dc_huffman_tables[index] = Some(table);
        } else {
            decoder.ac_huffman_tables[index] = Some(table);
        }
    }
    Ok(())
}

///**B.2.4.1 Quantization table-specification syntax**
///
/// Tables are kept in zig-zag order, the order coefficients are decoded in.
pub(crate) fn parse_dqt(decoder: &mut JpegDecoder, mut remaining: usize) -> Result<(), DecodeErrors> {
    // A single DQT header may have multiple QT's
    while remaining > 0 {
        let qt_info = decoder.stream.get_u8_err()?;
        remaining -= 1;

        // 0 = 8 bit otherwise 16 bit dqt
        let precision = qt_info >> 4;
        // last 4 bits give us position
        let table_position = usize::from(qt_info & 0x0F);

        if table_position >= MAX_COMPONENTS {
            return Err(DecodeErrors::DqtError("Bad Tq value".to_string()));
        }

        let mut table = [0_u16; 64];

        match precision {
            0 => {
                if remaining < 64 {
                    return Err(DecodeErrors::DqtError("DQT has wrong length".to_string()));
                }
                let values = decoder.stream.read_exact_bytes(64)?;

                for (entry, value) in table.iter_mut().zip(values) {
                    *entry = u16::from(*value);
                }
                remaining -= 64;
            }
            1 => {
                if remaining < 128 {
                    return Err(DecodeErrors::DqtError("DQT has wrong length".to_string()));
                }
                for entry in &mut table {
                    *entry = decoder.stream.get_u16_be_err()?;
                }
                remaining -= 128;
            }
            _ => {
                return Err(DecodeErrors::DqtError("Bad Pq value".to_string()));
            }
        }

        if table.contains(&0) {
            warn!("Quantization table {table_position} contains zero entries");
        }

        trace!("Assigning qt table {table_position} with precision {precision}");
        decoder.qt_tables[table_position] = Some(table);
    }

    Ok(())
}

/// Section:`B.2.2 Frame header syntax`
pub(crate) fn parse_start_of_frame(
    sof: SOFMarkers, decoder: &mut JpegDecoder, remaining: usize
) -> Result<(), DecodeErrors> {
    if decoder.seen_sof {
        return Err(DecodeErrors::SofError("Multiple SOF markers".to_string()));
    }
    // 1, 3 or 4 components
    if !matches!(remaining, 9 | 15 | 18) {
        return Err(DecodeErrors::SofError(
            "Incorrect number of components".to_string()
        ));
    }

    let precision = decoder.stream.get_u8_err()?;

    if precision != 8 {
        return Err(DecodeErrors::SofError(
            "Only 8-Bit precision supported.".to_string()
        ));
    }

    let height = usize::from(decoder.stream.get_u16_be_err()?);
    let width = usize::from(decoder.stream.get_u16_be_err()?);

    trace!("Image width  :{}", width);
    trace!("Image height :{}", height);

    if width == 0 || height == 0 {
        return Err(DecodeErrors::ZeroError);
    }
    if width > decoder.options.get_max_width() {
        return Err(DecodeErrors::LargeDimensions(width));
    }
    if height > decoder.options.get_max_height() {
        return Err(DecodeErrors::LargeDimensions(height));
    }

    let num_components = usize::from(decoder.stream.get_u8_err()?);

    if remaining != 6 + 3 * num_components {
        return Err(DecodeErrors::SofError("SOF has wrong length".to_string()));
    }

    let mut components: Vec<Components> = Vec::with_capacity(num_components);

    for _ in 0..num_components {
        let bytes = decoder.stream.get_fixed_bytes_or_err::<3>()?;

        if components.iter().any(|c| c.component_id == bytes[0]) {
            return Err(DecodeErrors::SofError(
                "Repeated component identifier".to_string()
            ));
        }
        components.push(Components::from(bytes)?);
    }

    check_sampling_factors(&mut components)?;

    let h_max = components.iter().map(|c| c.horizontal_sample).max().unwrap_or(1);
    let v_max = components.iter().map(|c| c.vertical_sample).max().unwrap_or(1);

    decoder.mcu_x = width.div_ceil(8 * h_max);
    decoder.mcu_y = height.div_ceil(8 * v_max);

    for component in &mut components {
        component.blocks_per_line = decoder.mcu_x * component.horizontal_sample;
        component.block_rows = decoder.mcu_y * component.vertical_sample;
    }

    debug!(
        "{:?}, {} components, MCU grid {}x{}",
        sof, num_components, decoder.mcu_x, decoder.mcu_y
    );

    decoder.h_max = h_max;
    decoder.v_max = v_max;
    decoder.components = components;
    decoder.is_progressive = sof.is_progressive();
    decoder.seen_sof = true;

    decoder.info.width = width;
    decoder.info.height = height;
    decoder.info.components = num_components;
    decoder.info.sof = sof;

    Ok(())
}

/// Reject sampling layouts the upsampler cannot express
fn check_sampling_factors(components: &mut [Components]) -> Result<(), DecodeErrors> {
    let unsupported = || DecodeErrors::SofError("Unsupported subsampling ratio".to_string());

    match components {
        [luma] => {
            // a lone component is never subsampled, whatever the header says
            luma.horizontal_sample = 1;
            luma.vertical_sample = 1;
        }
        [y, cb, cr] => {
            if y.vertical_sample == 4 {
                return Err(unsupported());
            }
            if y.horizontal_sample % cb.horizontal_sample != 0
                || y.vertical_sample % cb.vertical_sample != 0
            {
                return Err(unsupported());
            }
            if cb.horizontal_sample != cr.horizontal_sample
                || cb.vertical_sample != cr.vertical_sample
            {
                return Err(unsupported());
            }
        }
        [_, _, _, _] => {
            let mut factors = [0_usize; 4];

            for (factor, c) in factors.iter_mut().zip(components.iter()) {
                *factor = (c.horizontal_sample << 4) | c.vertical_sample;
            }
            if factors != [0x11; 4] && factors != [0x22, 0x11, 0x11, 0x22] {
                return Err(unsupported());
            }
        }
        _ => {
            return Err(DecodeErrors::SofError(
                "Incorrect number of components".to_string()
            ))
        }
    }
    Ok(())
}

/// Parse a start of scan header
///
/// Selects the Huffman tables of each component taking part and returns
/// the state the entropy decoder carries through the scan.
pub(crate) fn parse_sos(decoder: &mut JpegDecoder, remaining: usize) -> Result<ScanState, DecodeErrors> {
    if !decoder.seen_sof {
        return Err(DecodeErrors::SosError(
            "Start of scan before start of frame".to_string()
        ));
    }
    // Number of image components in scan
    let ns = usize::from(decoder.stream.get_u8_err()?);

    if !(1..=MAX_COMPONENTS).contains(&ns) {
        return Err(DecodeErrors::SosError(format!(
            "Invalid number of components in start of scan {ns}, expected in range 1..5"
        )));
    }
    if remaining != 4 + 2 * ns {
        return Err(DecodeErrors::SosError("SOS has wrong length".to_string()));
    }

    let mut selected = Vec::with_capacity(ns);

    for _ in 0..ns {
        let id = decoder.stream.get_u8_err()?;
        // top 4 bits select the DC table, lower 4 the AC table
        let tables = decoder.stream.get_u8_err()?;

        let position = decoder
            .components
            .iter()
            .position(|c| c.component_id == id)
            .ok_or_else(|| DecodeErrors::SosError("Unknown component selector".to_string()))?;

        if selected.contains(&position) {
            return Err(DecodeErrors::SosError(
                "Repeated component selector".to_string()
            ));
        }

        let dc_table = usize::from(tables >> 4);
        let ac_table = usize::from(tables & 0xF);

        if dc_table >= MAX_COMPONENTS {
            return Err(DecodeErrors::SosError("Bad Td value".to_string()));
        }
        if ac_table >= MAX_COMPONENTS {
            return Err(DecodeErrors::SosError("Bad Ta value".to_string()));
        }

        let component = &mut decoder.components[position];
        component.dc_huff_table = dc_table;
        component.ac_huff_table = ac_table;

        trace!("Assigned huffman tables {dc_table}/{ac_table} to component id={id}");

        selected.push(position);
    }

    if ns > 1 {
        let blocks: usize = selected
            .iter()
            .map(|c| decoder.components[*c].blocks_per_mcu())
            .sum();

        if blocks > 10 {
            return Err(DecodeErrors::SosError(format!(
                "Interleaved scan has {blocks} blocks per MCU, at most 10 are allowed"
            )));
        }
    }

    let mut spec_start = decoder.stream.get_u8_err()?;
    let mut spec_end = decoder.stream.get_u8_err()?;
    let approximation = decoder.stream.get_u8_err()?;

    let mut succ_high = approximation >> 4;
    let mut succ_low = approximation & 0xF;

    trace!("Ss={spec_start}, Se={spec_end} Ah={succ_high} Al={succ_low}");

    if decoder.is_progressive {
        if spec_start == 0 && spec_end != 0 {
            return Err(DecodeErrors::SosError(
                "Bad spectral selection, a DC scan must end at 0".to_string()
            ));
        }
        if spec_start != 0 && (ns != 1 || spec_end < spec_start || spec_end > 63) {
            return Err(DecodeErrors::SosError(
                "Bad spectral selection for an AC scan".to_string()
            ));
        }
        if succ_high > 13 || succ_low > 13 {
            return Err(DecodeErrors::SosError(
                "Bad successive approximation values".to_string()
            ));
        }
    } else if spec_start != 0 || spec_end != 63 || succ_high != 0 || succ_low != 0 {
        if decoder.options.get_strict_mode() {
            return Err(DecodeErrors::SosError(
                "Bad spectral selection for a sequential scan".to_string()
            ));
        }
        warn!("Sequential scan with Ss={spec_start} Se={spec_end} Ah={succ_high} Al={succ_low}, using the full spectrum");
        spec_start = 0;
        spec_end = 63;
        succ_high = 0;
        succ_low = 0;
    }

    Ok(ScanState::new(
        selected, spec_start, spec_end, succ_high, succ_low
    ))
}

/// Define restart interval segment
pub(crate) fn parse_dri(decoder: &mut JpegDecoder, remaining: usize) -> Result<(), DecodeErrors> {
    if remaining != 2 {
        return Err(DecodeErrors::FormatStatic("DRI has wrong length"));
    }
    decoder.restart_interval = usize::from(decoder.stream.get_u16_be_err()?);

    trace!("Restart interval set to {}", decoder.restart_interval);
    Ok(())
}

/// Parse the APP0 segment, JFIF identification and pixel density
pub(crate) fn parse_app0(decoder: &mut JpegDecoder, remaining: usize) -> Result<(), DecodeErrors> {
    let payload = decoder.stream.read_exact_bytes(remaining)?;

    if payload.starts_with(b"JFIF\0") {
        decoder.info.is_jfif = true;

        if let [.., unit, xh, xl, yh, yl] = payload.get(..12).unwrap_or_default() {
            decoder.info.density_unit = *unit;
            decoder.info.x_density = u16::from_be_bytes([*xh, *xl]);
            decoder.info.y_density = u16::from_be_bytes([*yh, *yl]);
        }
        trace!(
            "JFIF density {}x{}, unit {}",
            decoder.info.x_density,
            decoder.info.y_density,
            decoder.info.density_unit
        );
    } else if payload.starts_with(b"JFXX\0") {
        trace!("Skipping JFIF extension segment");
    }
    Ok(())
}

/// Parse the APP1 segment
///
/// Only Exif is recognised, the TIFF structure after the `Exif\0\0`
/// header is kept as is.
pub(crate) fn parse_app1(decoder: &mut JpegDecoder, remaining: usize) -> Result<(), DecodeErrors> {
    let payload = decoder.stream.read_exact_bytes(remaining)?;

    if decoder.options.get_ignore_metadata() {
        return Ok(());
    }
    if let Some(tiff) = payload.strip_prefix(b"Exif\0\0") {
        debug!("Found Exif segment of {} bytes", tiff.len());
        decoder.exif = Some(tiff);
    }
    Ok(())
}

/// Parse Adobe App14 segment
pub(crate) fn parse_app14(decoder: &mut JpegDecoder, remaining: usize) -> Result<(), DecodeErrors> {
    let payload = decoder.stream.read_exact_bytes(remaining)?;

    // Adobe, version (2), flags0 (2), flags1 (2), transform
    if payload.len() >= 12 && payload.starts_with(b"Adobe") {
        decoder.info.adobe_transform = Some(payload[11]);
        trace!("Adobe APP14 segment with color transform {}", payload[11]);
    }
    Ok(())
}

/// Allocate coefficient storage once the frame is known
///
/// Each component gets 64 coefficients for every block it has in the padded MCU grid.
pub(crate) fn allocate_coefficients(decoder: &mut JpegDecoder) {
    for component in &mut decoder.components {
        if component.coefficients.is_empty() {
            component.coefficients =
                COEFF_POOL.rent(64 * component.blocks_per_line * component.block_rows);
        }
    }
}
