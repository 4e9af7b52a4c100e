/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

#![allow(
    clippy::if_not_else,
    clippy::similar_names,
    clippy::inline_always,
    clippy::doc_markdown,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]

//! Bit level reader for entropy coded segments
//!
//! Bytes are pulled into a 64 bit buffer, most significant bit first.
//! Refills undo `0xFF 0x00` byte stuffing and stop at the first marker,
//! after that only zero bits are fed so decoding a truncated segment never
//! reads out of bounds. Callers check [`BitStream::is_exhausted`] to learn
//! whether those zero bits were actually used.
//!
//! Huffman decoding uses a `FAST_BITS` lookahead table with a per length
//! fallback for longer codes, the progressive routines follow ITU T.81 Annex G.
use ember_core::log::warn;

use crate::errors::DecodeErrors;
use crate::huffman::{HuffmanTable, FAST_BITS};
use crate::marker::Marker;

/// A bit reader over one entropy coded segment
pub(crate) struct BitStream<'a> {
    /// Entropy coded data, starting right after an SOS header
    data:            &'a [u8],
    /// Next byte of `data` to be pulled in
    position:        usize,
    /// Bits not yet consumed, most significant bit first
    buffer:          u64,
    /// Number of valid bits in `buffer`
    bits_left:       u32,
    /// Set once a refill ran into a marker, after which only zeros are fed
    marker_found:    bool,
    /// Zero bytes fed in place of real data
    pub overread_by: usize
}

impl<'a> BitStream<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> BitStream<'a> {
        BitStream {
            data,
            position: 0,
            buffer: 0,
            bits_left: 0,
            marker_found: false,
            overread_by: 0
        }
    }

    /// Position of the first byte not pulled into the bit buffer
    ///
    /// If a marker stopped the refill, this points at its `0xFF`.
    pub(crate) const fn position(&self) -> usize {
        self.position
    }

    /// True once more bits were consumed than the stream had
    ///
    /// Zero bytes appended after the end (or a marker) live at the bottom
    /// of the buffer, so they have been eaten once fewer bits than that remain.
    pub(crate) const fn is_exhausted(&self) -> bool {
        self.overread_by * 8 > self.bits_left as usize
    }

    /// Fill the bit buffer with as many bytes as fit
    ///
    /// `0xFF 0x00` is an escaped `0xFF`, `0xFF` followed by anything else
    /// is a marker which ends the entropy coded segment.
    #[inline(always)]
    fn refill(&mut self) {
        while self.bits_left <= 56 {
            let byte = if self.marker_found {
                self.overread_by += 1;
                0
            } else {
                match self.data.get(self.position) {
                    Some(0xFF) => match self.data.get(self.position + 1) {
                        Some(0x00) => {
                            self.position += 2;
                            0xFF
                        }
                        Some(_) => {
                            // leave position at the marker for the caller
                            self.marker_found = true;
                            self.overread_by += 1;
                            0
                        }
                        None => {
                            self.position += 1;
                            self.overread_by += 1;
                            0
                        }
                    },
                    Some(byte) => {
                        self.position += 1;
                        *byte
                    }
                    None => {
                        self.overread_by += 1;
                        0
                    }
                }
            };
            self.buffer |= u64::from(byte) << (56 - self.bits_left);
            self.bits_left += 8;
        }
    }

    #[inline(always)]
    fn ensure(&mut self, bits: u32) {
        if self.bits_left < bits {
            self.refill();
        }
    }

    #[inline(always)]
    const fn peek_bits(&self, bits: u32) -> u32 {
        (self.buffer >> (64 - bits)) as u32
    }

    #[inline(always)]
    fn drop_bits(&mut self, bits: u32) {
        self.buffer <<= bits;
        self.bits_left -= bits;
    }

    /// Read `bits` bits (at most 16) as an unsigned number
    #[inline(always)]
    pub(crate) fn get_bits(&mut self, bits: u32) -> u32 {
        if bits == 0 {
            return 0;
        }
        self.ensure(bits);
        let value = self.peek_bits(bits);
        self.drop_bits(bits);
        value
    }

    #[inline(always)]
    pub(crate) fn get_bit(&mut self) -> bool {
        self.get_bits(1) == 1
    }

    /// Receive `s` bits and sign extend them, (ITU T.81 F.2.2.1)
    #[inline(always)]
    pub(crate) fn receive_extend(&mut self, s: u8) -> i32 {
        if s == 0 {
            return 0;
        }
        let s = u32::from(s.min(16));
        let value = self.get_bits(s) as i32;

        if value < (1 << (s - 1)) {
            value - (1 << s) + 1
        } else {
            value
        }
    }

    /// Decode a single symbol
    #[inline(always)]
    pub(crate) fn decode_symbol(&mut self, table: &HuffmanTable) -> Result<u8, DecodeErrors> {
        self.ensure(16);

        let entry = table.lookup[self.peek_bits(FAST_BITS as u32) as usize];

        if entry != 0 {
            self.drop_bits(u32::from(entry >> 8));
            return Ok((entry & 0xFF) as u8);
        }
        // slow path, codes longer than FAST_BITS
        for length in FAST_BITS + 1..=16 {
            let code = self.peek_bits(length as u32) as i32;

            if code <= table.maxcode[length] {
                self.drop_bits(length as u32);
                let index = (table.valoffset[length] + code) as usize;
                return Ok(table.values[index & 255]);
            }
        }
        Err(DecodeErrors::HuffmanDecode("invalid Huffman code".to_string()))
    }

    /// Decode a sequential (baseline or extended) block
    ///
    /// Coefficients are stored in zig-zag order.
    pub(crate) fn decode_block(
        &mut self, dc_table: &HuffmanTable, ac_table: &HuffmanTable, block: &mut [i16],
        dc_pred: &mut i32
    ) -> Result<(), DecodeErrors> {
        let s = self.decode_symbol(dc_table)?;
        *dc_pred = dc_pred.wrapping_add(self.receive_extend(s));
        block[0] = *dc_pred as i16;

        let mut k = 1;

        while k < 64 {
            let rs = self.decode_symbol(ac_table)?;
            let r = usize::from(rs >> 4);
            let s = rs & 15;

            if s == 0 {
                if r != 15 {
                    // end of block
                    break;
                }
                // ZRL, sixteen zeroes
                k += 16;
                continue;
            }
            k += r;

            if k > 63 {
                return Err(DecodeErrors::HuffmanDecode(
                    "Bad AC index, coefficient run goes past the block".to_string()
                ));
            }
            block[k] = self.receive_extend(s) as i16;
            k += 1;
        }
        Ok(())
    }

    /// First DC scan of a progressive image, (ITU T.81 G.1.2.1)
    pub(crate) fn decode_prog_dc_first(
        &mut self, dc_table: &HuffmanTable, block: &mut [i16], dc_pred: &mut i32, al: u8
    ) -> Result<(), DecodeErrors> {
        let s = self.decode_symbol(dc_table)?;
        *dc_pred = dc_pred.wrapping_add(self.receive_extend(s));
        block[0] = dc_pred.wrapping_shl(u32::from(al)) as i16;
        Ok(())
    }

    /// DC successive approximation refinement, one bit per block
    pub(crate) fn decode_prog_dc_refine(&mut self, block: &mut [i16], al: u8) {
        if self.get_bit() {
            block[0] |= 1 << al;
        }
    }

    /// First AC scan of a band, (ITU T.81 G.1.2.2)
    ///
    /// `eob_run` counts blocks that still have to be skipped because an
    /// earlier block announced a run of empty bands, it carries over
    /// from one call (block) to the next.
    pub(crate) fn decode_mcu_ac_first(
        &mut self, ac_table: &HuffmanTable, block: &mut [i16], spec_start: u8, spec_end: u8,
        al: u8, eob_run: &mut u32
    ) -> Result<(), DecodeErrors> {
        if *eob_run > 0 {
            *eob_run -= 1;
            return Ok(());
        }
        let mut k = usize::from(spec_start);
        let end = usize::from(spec_end);

        while k <= end {
            let rs = self.decode_symbol(ac_table)?;
            let r = rs >> 4;
            let s = rs & 15;

            if s == 0 {
                if r < 15 {
                    // EOBr, this block and the next (2^r - 1 + bits) are empty
                    *eob_run = (1 << r) - 1 + self.get_bits(u32::from(r));
                    break;
                }
                k += 16;
                continue;
            }
            k += usize::from(r);

            if k > 63 {
                return Err(DecodeErrors::HuffmanDecode(
                    "Bad AC index, coefficient run goes past the block".to_string()
                ));
            }
            block[k] = self.receive_extend(s).wrapping_shl(u32::from(al)) as i16;
            k += 1;
        }
        Ok(())
    }

    /// AC successive approximation refinement, (ITU T.81 G.1.2.3)
    ///
    /// Coefficients that are already non-zero receive a correction bit,
    /// zero coefficients may become `±1 << al`.
    pub(crate) fn decode_mcu_ac_refine(
        &mut self, ac_table: &HuffmanTable, block: &mut [i16], spec_start: u8, spec_end: u8,
        al: u8, eob_run: &mut u32
    ) -> Result<(), DecodeErrors> {
        let p1: i16 = 1 << al;
        let m1: i16 = -1 << al;

        let mut k = usize::from(spec_start);
        let end = usize::from(spec_end);

        if *eob_run == 0 {
            while k <= end {
                let rs = self.decode_symbol(ac_table)?;
                let mut r = rs >> 4;
                let s = rs & 15;

                let mut value = 0;

                if s != 0 {
                    if s != 1 {
                        warn!("Corrupt AC refinement symbol {rs:#X}, expected a magnitude of 1");
                    }
                    value = if self.get_bit() { p1 } else { m1 };
                } else if r != 15 {
                    *eob_run = (1 << r) + self.get_bits(u32::from(r));
                    break;
                }

                // Walk past `r` zero coefficients, refining the non-zero ones on the way
                while k <= end {
                    let coefficient = &mut block[k];

                    if *coefficient != 0 {
                        self.refine_coefficient(coefficient, p1, m1);
                    } else {
                        if r == 0 {
                            break;
                        }
                        r -= 1;
                    }
                    k += 1;
                }
                if value != 0 && k <= end {
                    block[k] = value;
                }
                k += 1;
            }
        }
        if *eob_run > 0 {
            // Refine the rest of the band, no new coefficients appear
            while k <= end {
                let coefficient = &mut block[k];

                if *coefficient != 0 {
                    self.refine_coefficient(coefficient, p1, m1);
                }
                k += 1;
            }
            *eob_run -= 1;
        }
        Ok(())
    }

    #[inline(always)]
    fn refine_coefficient(&mut self, coefficient: &mut i16, p1: i16, m1: i16) {
        if self.get_bit() && (*coefficient & p1) == 0 {
            if *coefficient >= 0 {
                *coefficient = coefficient.wrapping_add(p1);
            } else {
                *coefficient = coefficient.wrapping_add(m1);
            }
        }
    }

    /// Discard buffered bits and consume the restart marker that should follow
    ///
    /// Returns the marker found, or `None` if the data ended first. Bytes
    /// before the marker are skipped. If the marker found is not a restart
    /// marker, position is left at its `0xFF` so the caller can process it.
    pub(crate) fn next_marker(&mut self) -> Option<Marker> {
        self.buffer = 0;
        self.bits_left = 0;
        self.marker_found = false;
        self.overread_by = 0;

        let mut skipped = 0;

        loop {
            let start = self.position;

            match self.data.get(self.position) {
                None => return None,
                Some(0xFF) => {
                    self.position += 1;
                    // fill bytes
                    while self.data.get(self.position) == Some(&0xFF) {
                        self.position += 1;
                    }
                    let byte = *self.data.get(self.position)?;
                    self.position += 1;

                    if let Some(marker) = Marker::from_u8(byte) {
                        if skipped > 0 {
                            warn!("Skipped {skipped} bytes before marker {marker:?}");
                        }
                        if !matches!(marker, Marker::RST(_)) {
                            self.position = start;
                        }
                        return Some(marker);
                    }
                    skipped += 2;
                }
                Some(_) => {
                    skipped += 1;
                    self.position += 1;
                }
            }
        }
    }

    /// Move past whatever remains of the entropy coded segment
    ///
    /// Stuffed bytes and restart markers are consumed, position stops at
    /// the `0xFF` of the next real marker (or the end of data).
    /// Returns the number of bytes skipped.
    pub(crate) fn skip_entropy_tail(&mut self) -> usize {
        let start = self.position;

        while let Some(byte) = self.data.get(self.position) {
            if *byte == 0xFF {
                match self.data.get(self.position + 1) {
                    Some(0x00 | 0xD0..=0xD7) => {
                        self.position += 2;
                        continue;
                    }
                    _ => break
                }
            }
            self.position += 1;
        }
        self.buffer = 0;
        self.bits_left = 0;

        self.position - start
    }
}
