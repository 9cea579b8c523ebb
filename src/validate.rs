// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The final gate deciding whether an image is safe to flash.
//!
//! [`validate`] re-parses a candidate image end to end and checks every
//! structural invariant. Nothing downstream of it re-derives that
//! judgment: the patch path, the rebuild path and the parameter search all
//! submit their output here.

use thiserror::Error;

use crate::error::ImageParseError;
use crate::image::{Image, NodeType};
use crate::name::{TargetName, decode_name};
use crate::params::{BuildParams, TrailerPolicy};

/// The verdict on a single candidate image.
///
/// Produced once per candidate and consumed immediately; it carries either
/// a pass or the first violated invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    violation: Option<Violation>,
}

impl ValidationReport {
    fn pass() -> Self {
        Self { violation: None }
    }

    fn fail(violation: Violation) -> Self {
        Self {
            violation: Some(violation),
        }
    }

    /// Returns `true` if every invariant held.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }

    /// Returns the first violated invariant, if any.
    #[must_use]
    pub fn violation(&self) -> Option<&Violation> {
        self.violation.as_ref()
    }
}

/// An invariant violated by a candidate image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Violation {
    /// The image does not re-parse.
    #[error("{0}")]
    Malformed(ImageParseError),
    /// A node payload does not match its stored checksum.
    #[error("payload checksum mismatch at offset {offset}")]
    PayloadChecksum {
        /// Byte offset of the failing payload.
        offset: usize,
    },
    /// The image size differs from the expected size.
    #[error("image is {len} bytes, expected {expected}")]
    SizeMismatch {
        /// Actual image size.
        len: usize,
        /// Expected image size.
        expected: usize,
    },
    /// The image size is not a whole number of erase blocks.
    #[error("image size {len} is not a multiple of the {erase_block_size}-byte erase block")]
    Misaligned {
        /// Actual image size.
        len: usize,
        /// The candidate erase block size.
        erase_block_size: u32,
    },
    /// The image contains no device-name node.
    #[error("device-name node missing from the image")]
    NameMissing,
    /// The name field does not decode to the requested name.
    #[error("name field decodes to {found:?}, expected {expected:?}")]
    NameMismatch {
        /// The name the field actually decodes to.
        found: String,
        /// The requested name.
        expected: String,
    },
    /// End-marker presence does not match the trailer policy.
    #[error("end-marker presence does not match the trailer policy")]
    TrailerMismatch,
}

/// Fully re-parses `data` and checks it against every invariant.
///
/// Checks, in order: the image size equals `expected_len`; the node stream
/// re-parses end to end; every payload checksum holds; the device-name
/// field decodes to exactly `target`. When `geometry` is supplied (the
/// rebuild path knows its candidate parameters; the in-place path does
/// not), the image size must additionally be a whole number of erase
/// blocks and the trailer must match the policy.
///
/// Never mutates `data`.
#[must_use]
pub fn validate(
    data: &[u8],
    target: &TargetName,
    expected_len: usize,
    geometry: Option<&BuildParams>,
) -> ValidationReport {
    if data.len() != expected_len {
        return ValidationReport::fail(Violation::SizeMismatch {
            len: data.len(),
            expected: expected_len,
        });
    }

    let image = match Image::new(data) {
        Ok(image) => image,
        Err(e) => return ValidationReport::fail(Violation::Malformed(e)),
    };

    let mut found_name = None;
    let mut nodes = image.nodes();
    for node in nodes.by_ref() {
        let node = match node {
            Ok(node) => node,
            Err(e) => return ValidationReport::fail(Violation::Malformed(e)),
        };
        if !node.verify_payload_crc() {
            return ValidationReport::fail(Violation::PayloadChecksum {
                offset: node.payload_offset(),
            });
        }
        if node.node_type() == NodeType::DeviceName && found_name.is_none() {
            match decode_name(node.payload(), node.payload_offset()) {
                Ok(name) => found_name = Some(name),
                Err(e) => return ValidationReport::fail(Violation::Malformed(e)),
            }
        }
    }

    let Some(found) = found_name else {
        return ValidationReport::fail(Violation::NameMissing);
    };
    if found != target.as_str() {
        return ValidationReport::fail(Violation::NameMismatch {
            found,
            expected: target.as_str().to_owned(),
        });
    }

    if let Some(params) = geometry {
        if !data.len().is_multiple_of(params.erase_block()) {
            return ValidationReport::fail(Violation::Misaligned {
                len: data.len(),
                erase_block_size: params.erase_block_size,
            });
        }
        let expect_marker = params.trailer == TrailerPolicy::EndMarker;
        if nodes.saw_end_marker() != expect_marker {
            return ValidationReport::fail(Violation::TrailerMismatch);
        }
    }

    ValidationReport::pass()
}
