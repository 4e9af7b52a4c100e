/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! This file contains a single struct `HuffmanTable` that
//! stores Huffman tables needed during `BitStream` decoding.
#![allow(clippy::similar_names, clippy::module_name_repetitions)]

use crate::errors::DecodeErrors;

/// Determines how many bits of lookahead we have for our bitstream decoder.
pub const FAST_BITS: usize = 9;

/// A canonical Huffman table
///
/// Codes of up to [`FAST_BITS`] bits are resolved with a single table lookup,
/// longer ones walk `maxcode` one length at a time (ITU T.81 F.2.2.3).
#[derive(Clone)]
pub struct HuffmanTable {
    /// Indexed by the next `FAST_BITS` of the stream.
    ///
    /// An entry is `(code_length << 8) | symbol`, zero means the code
    /// is longer than `FAST_BITS`.
    pub(crate) lookup:    [u16; 1 << FAST_BITS],
    /// Largest code of each length, -1 when there are no codes of that length
    pub(crate) maxcode:   [i32; 17],
    /// Offset that maps a code of a given length to its index in `values`
    pub(crate) valoffset: [i32; 17],
    /// Symbols in order of increasing code length
    pub(crate) values:    [u8; 256]
}

impl HuffmanTable {
    /// Build a table from the per-length counts of a DHT segment
    ///
    /// `codes[0]` is unused, `codes[l]` is the number of codes of length `l`.
    /// `symbols` holds the symbols in order of increasing code length.
    pub fn new(codes: &[u8; 17], symbols: &[u8]) -> Result<HuffmanTable, DecodeErrors> {
        let total: usize = codes.iter().map(|x| usize::from(*x)).sum();

        if total > 256 || total > symbols.len() {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "Huffman table declares {total} symbols but {} are available",
                symbols.len().min(256)
            )));
        }
        let mut values = [0_u8; 256];
        values[..total].copy_from_slice(&symbols[..total]);

        let mut lookup = [0_u16; 1 << FAST_BITS];
        let mut maxcode = [-1_i32; 17];
        let mut valoffset = [0_i32; 17];

        let mut code = 0_u32;
        let mut k = 0_usize;

        for length in 1..=16 {
            let count = usize::from(codes[length]);

            // index of the first symbol of this length minus its code
            valoffset[length] = k as i32 - code as i32;

            for _ in 0..count {
                if length <= FAST_BITS {
                    let shift = FAST_BITS - length;
                    let base = (code as usize) << shift;
                    let entry = ((length as u16) << 8) | u16::from(values[k]);

                    for slot in lookup.iter_mut().skip(base).take(1 << shift) {
                        *slot = entry;
                    }
                }
                code += 1;
                k += 1;
            }
            if count > 0 {
                // Codes of this length must fit in `length` bits
                if code > (1 << length) {
                    return Err(DecodeErrors::HuffmanDecode(
                        "Bad Huffman Table, code lengths overflow".to_string()
                    ));
                }
                maxcode[length] = code as i32 - 1;
            }
            code <<= 1;
        }

        Ok(HuffmanTable {
            lookup,
            maxcode,
            valoffset,
            values
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Table K.3, luminance DC differences
    fn luma_dc() -> HuffmanTable {
        let mut codes = [0; 17];
        codes[1..].copy_from_slice(&[0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0]);

        HuffmanTable::new(&codes, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).unwrap()
    }

    fn lookup(table: &HuffmanTable, code: u32, length: usize) -> Option<(u8, usize)> {
        if length <= FAST_BITS {
            let entry = table.lookup[(code << (FAST_BITS - length)) as usize];
            if entry == 0 {
                return None;
            }
            return Some(((entry & 0xFF) as u8, usize::from(entry >> 8)));
        }
        let c = code as i32;
        (c <= table.maxcode[length])
            .then(|| (table.values[(table.valoffset[length] + c) as usize], length))
    }

    #[test]
    fn annex_k_luma_dc_codes() {
        let table = luma_dc();

        // Canonical assignment from Table K.3
        let expected: [(u32, usize); 12] = [
            (0b00, 2),
            (0b010, 3),
            (0b011, 3),
            (0b100, 3),
            (0b101, 3),
            (0b110, 3),
            (0b1110, 4),
            (0b11110, 5),
            (0b111110, 6),
            (0b1111110, 7),
            (0b11111110, 8),
            (0b111111110, 9)
        ];
        for (symbol, (code, length)) in expected.iter().enumerate() {
            assert_eq!(
                lookup(&table, *code, *length),
                Some((symbol as u8, *length)),
                "symbol {symbol}"
            );
        }
        // nine ones is not a code
        assert_eq!(table.lookup[0b1_1111_1111], 0);
    }

    #[test]
    fn single_symbol_table() {
        let mut codes = [0; 17];
        codes[3] = 1;

        let table = HuffmanTable::new(&codes, &[0x2A]).unwrap();

        assert_eq!(lookup(&table, 0b000, 3), Some((0x2A, 3)));
        assert_eq!(lookup(&table, 0b001, 3), None);
        assert_eq!(table.maxcode[3], 0);
        assert_eq!(table.maxcode[2], -1);
    }

    #[test]
    fn long_codes_use_maxcode() {
        // one code of each length 1..=16
        let mut codes = [1; 17];
        codes[0] = 0;
        let symbols: Vec<u8> = (0..16).collect();

        let table = HuffmanTable::new(&codes, &symbols).unwrap();

        // 16 bit code: fifteen ones followed by a zero
        assert_eq!(lookup(&table, 0b1111_1111_1111_1110, 16), Some((15, 16)));
        assert_eq!(lookup(&table, 0b11_1111_1110, 10), Some((9, 10)));
    }

    #[test]
    fn overflowing_lengths_are_rejected() {
        let mut codes = [0; 17];
        codes[1] = 3;

        assert!(HuffmanTable::new(&codes, &[1, 2, 3]).is_err());
    }

    #[test]
    fn too_few_symbols_are_rejected() {
        let mut codes = [0; 17];
        codes[2] = 3;

        assert!(HuffmanTable::new(&codes, &[1, 2]).is_err());
    }
}
