/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Contains most common errors that may be encountered in decoding a JPEG image

use core::fmt::{Debug, Display, Formatter};

use ember_core::bytestream::ZByteIoError;

use crate::misc::SOFMarkers;

/// Common decode errors
#[allow(clippy::module_name_repetitions)]
pub enum DecodeErrors {
    /// Any other thing we do not know
    Format(String),
    /// Any other thing we do not know but we
    /// don't need to allocate space on the heap
    FormatStatic(&'static str),
    /// Illegal Magic Bytes
    IllegalMagicBytes(u16),
    /// Problems with the Huffman Tables in a Decoder file
    HuffmanDecode(String),
    /// Image has zero width or height
    ZeroError,
    /// Discrete Quantization Tables error
    DqtError(String),
    /// Start of scan errors
    SosError(String),
    /// Start of frame errors
    SofError(String),
    /// UnsupportedImages
    Unsupported(UnsupportedSchemes),
    /// Exhausted data
    ExhaustedData,
    /// Large image dimensions(Corrupted data)?
    LargeDimensions(usize),
    /// Too small output for size
    TooSmallOutput(usize, usize),
    /// Errors from the byte reader
    IoErrors(ZByteIoError)
}

impl std::error::Error for DecodeErrors {}

impl From<&'static str> for DecodeErrors {
    fn from(data: &'static str) -> Self {
        return Self::FormatStatic(data);
    }
}

impl From<ZByteIoError> for DecodeErrors {
    fn from(data: ZByteIoError) -> Self {
        return Self::IoErrors(data);
    }
}

impl Debug for DecodeErrors {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match &self {
            Self::Format(ref a) => write!(f, "{a:?}"),
            Self::FormatStatic(a) => write!(f, "{:?}", &a),

            Self::HuffmanDecode(ref reason) => {
                write!(f, "Error decoding huffman values: {reason}")
            }
            Self::ZeroError => write!(f, "Image width or height is set to zero, cannot continue"),
            Self::DqtError(ref reason) => write!(f, "Error parsing DQT segment. Reason:{reason}"),
            Self::SosError(ref reason) => write!(f, "Error parsing SOS Segment. Reason:{reason}"),
            Self::SofError(ref reason) => write!(f, "Error parsing SOF segment. Reason:{reason}"),
            Self::IllegalMagicBytes(bytes) => {
                write!(f, "Missing SOI marker, expected 0xffd8 but found {bytes:#X}")
            }
            Self::Unsupported(ref image_type) => {
                write!(f, "{image_type:?}")
            }
            Self::ExhaustedData => write!(f, "Exhausted data in the image"),
            Self::LargeDimensions(ref dimensions) => write!(
                f,
                "Too large dimensions {dimensions}, the decoder is configured to reject it"
            ),
            Self::TooSmallOutput(expected, found) => write!(
                f,
                "Too small output, expected buffer with at least {expected} bytes but got one with {found} bytes"
            ),
            Self::IoErrors(error) => write!(f, "I/O errors {error:?}")
        }
    }
}

impl Display for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Contains Unsupported/Yet-to-be supported Decoder image encoding types.
#[derive(Eq, PartialEq, Copy, Clone)]
pub enum UnsupportedSchemes {
    /// Lossless (sequential), huffman coding,
    LosslessHuffman,
    /// Extended sequential DEC, arithmetic coding
    ExtendedSequentialDctArithmetic,
    /// Progressive DCT, arithmetic coding,
    ProgressiveDctArithmetic,
    /// Lossless ( sequential), arithmetic coding
    LosslessArithmetic,
    /// Hierarchical (differential) frames
    Hierarchical
}

impl Debug for UnsupportedSchemes {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self {
            Self::LosslessHuffman => {
                write!(f, "The library cannot yet decode images encoded with Lossless Huffman encoding scheme")
            }
            Self::ExtendedSequentialDctArithmetic => {
                write!(f, "The library cannot yet decode Images Encoded with Extended Sequential DCT Arithmetic scheme")
            }
            Self::ProgressiveDctArithmetic => {
                write!(f, "The library cannot yet decode images encoded with Progressive DCT Arithmetic scheme")
            }
            Self::LosslessArithmetic => {
                write!(f, "The library cannot yet decode images encoded with Lossless Arithmetic encoding scheme")
            }
            Self::Hierarchical => {
                write!(f, "The library cannot decode hierarchical (differential) jpeg images")
            }
        }
    }
}

impl UnsupportedSchemes {
    /// Map an unsupported start of frame marker to the scheme it announces
    #[must_use]
    pub fn from_marker(marker: SOFMarkers) -> Option<UnsupportedSchemes> {
        match marker {
            SOFMarkers::LosslessHuffman => Some(Self::LosslessHuffman),
            SOFMarkers::ExtendedSequentialDctArithmetic => {
                Some(Self::ExtendedSequentialDctArithmetic)
            }
            SOFMarkers::ProgressiveDctArithmetic => Some(Self::ProgressiveDctArithmetic),
            SOFMarkers::LosslessArithmetic => Some(Self::LosslessArithmetic),
            SOFMarkers::Hierarchical => Some(Self::Hierarchical),
            _ => None
        }
    }
}
