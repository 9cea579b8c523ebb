// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types for the `camname` crate.

use core::fmt::{self, Display, Formatter};

use thiserror::Error;

/// An error that can occur while renaming a camera firmware image.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImageError {
    /// The firmware image is malformed and could not be parsed.
    #[error("{0}")]
    Parse(#[from] ImageParseError),
    /// The image contains no device-name node, so there is nothing to patch.
    #[error("no device-name node present in the image")]
    NameFieldNotFound,
    /// The requested name is empty after normalization.
    #[error("name must contain at least one character")]
    EmptyName,
    /// The requested name contains a character outside the device charset.
    #[error("invalid character {ch:?} in name (allowed: A-Z, 0-9)")]
    InvalidNameCharacter {
        /// The offending character, after uppercasing.
        ch: char,
    },
    /// The requested name exceeds the maximum length and no override was set.
    #[error("name is {len} characters long, maximum is {max}")]
    NameTooLong {
        /// Length of the requested name in characters.
        len: usize,
        /// The maximum length in effect.
        max: usize,
    },
    /// The build parameters are structurally incoherent.
    #[error("unsupported build parameters: {0}")]
    UnsupportedParameters(&'static str),
    /// The parameter search exhausted its grid without a validating candidate
    /// and had no reference image to fall back on.
    #[error("none of the {tried} candidate parameter sets produced a valid image")]
    NoValidCandidate {
        /// Number of candidates that were rebuilt and validated.
        tried: usize,
    },
    /// The requested output path refers to the input image.
    #[error("output path would overwrite the input image")]
    OutputClobbersInput,
    /// An I/O error occurred while loading or persisting an image.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An error that can occur when parsing a firmware image.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ImageParseError {
    offset: usize,
    /// The type of the error that has occurred.
    pub kind: ImageErrorKind,
}

impl ImageParseError {
    pub(crate) fn new(kind: ImageErrorKind, offset: usize) -> Self {
        Self { offset, kind }
    }

    /// Returns the byte offset in the image at which the error was detected.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// The kind of an error that can occur when parsing a firmware image.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ImageErrorKind {
    /// The image is too short to contain a node header.
    InvalidLength,
    /// A node header carries an invalid magic number.
    BadMagic(u32),
    /// A node header carries an unknown node type.
    BadNodeType(u32),
    /// A node header failed its checksum.
    HeaderChecksum,
    /// A node payload failed its checksum.
    PayloadChecksum,
    /// A node's declared payload length reads past the end of the image.
    PayloadOverrun {
        /// The declared payload length.
        declared: usize,
    },
    /// The end marker carries a non-empty payload.
    EndMarkerPayload,
    /// Non-fill bytes follow the end marker.
    TrailingGarbage,
    /// The device-name payload is not a NUL-padded printable ASCII field.
    BadNameEncoding,
}

impl Display for ImageParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl Display for ImageErrorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ImageErrorKind::InvalidLength => write!(f, "image too short for a node header"),
            ImageErrorKind::BadMagic(magic) => write!(f, "bad node magic: 0x{magic:08x}"),
            ImageErrorKind::BadNodeType(node_type) => {
                write!(f, "unknown node type: 0x{node_type:08x}")
            }
            ImageErrorKind::HeaderChecksum => write!(f, "node header checksum mismatch"),
            ImageErrorKind::PayloadChecksum => write!(f, "node payload checksum mismatch"),
            ImageErrorKind::PayloadOverrun { declared } => {
                write!(f, "declared payload length {declared} reads past the image end")
            }
            ImageErrorKind::EndMarkerPayload => write!(f, "end marker has a non-empty payload"),
            ImageErrorKind::TrailingGarbage => write!(f, "non-fill bytes after the end marker"),
            ImageErrorKind::BadNameEncoding => {
                write!(f, "device-name payload is not a NUL-padded ASCII field")
            }
        }
    }
}

impl core::error::Error for ImageParseError {}
