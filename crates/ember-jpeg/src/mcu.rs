/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Entropy decoding of a single scan
//!
//! Coefficients are written straight into each component's block array,
//! progressive scans keep refining the same storage until every scan
//! has been seen. Reconstruction happens once, after the last scan.

use ember_core::log::{trace, warn};

use crate::bitstream::BitStream;
use crate::components::Components;
use crate::decoder::JpegDecoder;
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::marker::Marker;

/// The flavour of entropy coded data a scan carries
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ScanKind {
    /// Baseline or extended sequential, whole blocks at once
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine
}

/// State carried through one scan
#[derive(Debug)]
pub(crate) struct ScanState {
    /// Indices into the frame components, in scan order
    pub components:    Vec<usize>,
    pub spec_start:    u8,
    pub spec_end:      u8,
    pub succ_high:     u8,
    pub succ_low:      u8,
    /// Blocks left in the current end-of-band run
    pub eob_run:       u32,
    /// MCUs left until the next restart marker
    pub restarts_left: usize,
    /// Restart marker number expected next
    pub expected_rst:  u8
}

impl ScanState {
    pub fn new(
        components: Vec<usize>, spec_start: u8, spec_end: u8, succ_high: u8, succ_low: u8
    ) -> ScanState {
        ScanState {
            components,
            spec_start,
            spec_end,
            succ_high,
            succ_low,
            eob_run: 0,
            restarts_left: 0,
            expected_rst: 0
        }
    }

    pub fn kind(&self, progressive: bool) -> ScanKind {
        match (progressive, self.spec_start == 0, self.succ_high == 0) {
            (false, _, _) => ScanKind::Sequential,
            (true, true, true) => ScanKind::DcFirst,
            (true, true, false) => ScanKind::DcRefine,
            (true, false, true) => ScanKind::AcFirst,
            (true, false, false) => ScanKind::AcRefine
        }
    }
}

impl JpegDecoder<'_> {
    /// Decode the entropy coded segment that follows a start of scan header
    ///
    /// On return the byte stream sits on the marker ending the scan.
    /// Running out of data is not an error unless strict mode is on,
    /// `unexpected_eof` records it instead.
    pub(crate) fn decode_scan(&mut self, scan: &mut ScanState) -> Result<(), DecodeErrors> {
        let kind = scan.kind(self.is_progressive);

        self.check_tables(scan, kind)?;

        for component in &mut self.components {
            component.dc_pred = 0;
        }
        scan.eob_run = 0;
        scan.expected_rst = 0;
        scan.restarts_left = self.restart_interval;

        trace!("Decoding {kind:?} scan over components {:?}", scan.components);

        let start = self.stream.get_position();
        let mut stream = BitStream::new(self.stream.remaining_bytes());

        let result = self.decode_scan_data(&mut stream, scan, kind);

        if result.is_ok() && !self.unexpected_eof {
            let skipped = stream.skip_entropy_tail();

            if skipped > 0 {
                trace!("{skipped} bytes of entropy data left after the last MCU");
            }
        }
        self.stream.set_position(start + stream.position());

        result
    }

    fn decode_scan_data(
        &mut self, stream: &mut BitStream, scan: &mut ScanState, kind: ScanKind
    ) -> Result<(), DecodeErrors> {
        let interleaved = scan.components.len() > 1;

        let (mcus_x, mcus_y) = if interleaved {
            (self.mcu_x, self.mcu_y)
        } else {
            // a lone component is coded block by block over its own extent
            let component = &self.components[scan.components[0]];

            let width = (self.info.width * component.horizontal_sample).div_ceil(self.h_max);
            let height = (self.info.height * component.vertical_sample).div_ceil(self.v_max);

            (width.div_ceil(8), height.div_ceil(8))
        };

        for mcu in 0..mcus_x * mcus_y {
            let restart_due = self.restart_interval > 0 && mcu > 0 && scan.restarts_left == 0;

            if restart_due && !self.handle_restart(stream, scan) {
                return Ok(());
            }

            let result = decode_mcu(
                stream,
                &mut self.components,
                &self.dc_huffman_tables,
                &self.ac_huffman_tables,
                scan,
                kind,
                (mcu % mcus_x, mcu / mcus_x)
            );

            // zero fill decodes to the smallest code of each length, so a code
            // that fails before any fill bit was consumed is corrupt data
            if stream.is_exhausted() {
                return self.premature_end();
            }
            result?;

            scan.restarts_left = scan.restarts_left.saturating_sub(1);
        }
        Ok(())
    }

    /// Consume the restart marker that is due, returns false if the scan has to stop
    fn handle_restart(&mut self, stream: &mut BitStream, scan: &mut ScanState) -> bool {
        match stream.next_marker() {
            Some(Marker::RST(n)) => {
                if n != scan.expected_rst {
                    warn!("Expected RST{} but found RST{n}", scan.expected_rst);
                }
                scan.expected_rst = (n + 1) & 7;

                for component in &mut self.components {
                    component.dc_pred = 0;
                }
                scan.eob_run = 0;
                scan.restarts_left = self.restart_interval;
                true
            }
            Some(marker) => {
                warn!("Expected a restart marker, found {marker:?}, image will be partially decoded");
                self.unexpected_eof = true;
                false
            }
            None => {
                warn!("Data ended while looking for a restart marker");
                self.unexpected_eof = true;
                false
            }
        }
    }

    fn premature_end(&mut self) -> Result<(), DecodeErrors> {
        if self.options.get_strict_mode() {
            return Err(DecodeErrors::ExhaustedData);
        }
        warn!("Premature end of entropy coded data, image will be partially decoded");
        self.unexpected_eof = true;
        Ok(())
    }

    /// Every table a scan reads must have been defined before it
    fn check_tables(&self, scan: &ScanState, kind: ScanKind) -> Result<(), DecodeErrors> {
        let needs_dc = matches!(kind, ScanKind::Sequential | ScanKind::DcFirst);
        let needs_ac = matches!(
            kind,
            ScanKind::Sequential | ScanKind::AcFirst | ScanKind::AcRefine
        );

        for &index in &scan.components {
            let component = &self.components[index];

            if needs_dc && self.dc_huffman_tables[component.dc_huff_table].is_none() {
                return Err(DecodeErrors::Format(format!(
                    "No Huffman DC table with id {} for component {}",
                    component.dc_huff_table, component.component_id
                )));
            }
            if needs_ac && self.ac_huffman_tables[component.ac_huff_table].is_none() {
                return Err(DecodeErrors::Format(format!(
                    "No Huffman AC table with id {} for component {}",
                    component.ac_huff_table, component.component_id
                )));
            }
        }
        Ok(())
    }
}

fn table(tables: &[Option<HuffmanTable>; 4], index: usize) -> Result<&HuffmanTable, DecodeErrors> {
    tables[index]
        .as_ref()
        .ok_or(DecodeErrors::FormatStatic("Missing Huffman table"))
}

/// Decode one MCU, or a single block for non-interleaved scans
fn decode_mcu(
    stream: &mut BitStream, components: &mut [Components], dc_tables: &[Option<HuffmanTable>; 4],
    ac_tables: &[Option<HuffmanTable>; 4], scan: &mut ScanState, kind: ScanKind,
    (mx, my): (usize, usize)
) -> Result<(), DecodeErrors> {
    let interleaved = scan.components.len() > 1;

    for &index in &scan.components {
        let component = &mut components[index];

        let (h_blocks, v_blocks) = if interleaved {
            (component.horizontal_sample, component.vertical_sample)
        } else {
            (1, 1)
        };

        for v in 0..v_blocks {
            for h in 0..h_blocks {
                let block_index = if interleaved {
                    (my * component.vertical_sample + v) * component.blocks_per_line
                        + mx * component.horizontal_sample
                        + h
                } else {
                    my * component.blocks_per_line + mx
                };
                let block = &mut component.coefficients[block_index * 64..block_index * 64 + 64];

                match kind {
                    ScanKind::Sequential => stream.decode_block(
                        table(dc_tables, component.dc_huff_table)?,
                        table(ac_tables, component.ac_huff_table)?,
                        block,
                        &mut component.dc_pred
                    )?,
                    ScanKind::DcFirst => stream.decode_prog_dc_first(
                        table(dc_tables, component.dc_huff_table)?,
                        block,
                        &mut component.dc_pred,
                        scan.succ_low
                    )?,
                    ScanKind::DcRefine => stream.decode_prog_dc_refine(block, scan.succ_low),
                    ScanKind::AcFirst => stream.decode_mcu_ac_first(
                        table(ac_tables, component.ac_huff_table)?,
                        block,
                        scan.spec_start,
                        scan.spec_end,
                        scan.succ_low,
                        &mut scan.eob_run
                    )?,
                    ScanKind::AcRefine => stream.decode_mcu_ac_refine(
                        table(ac_tables, component.ac_huff_table)?,
                        block,
                        scan.spec_start,
                        scan.spec_end,
                        scan.succ_low,
                        &mut scan.eob_run
                    )?
                }
            }
        }
    }
    Ok(())
}
