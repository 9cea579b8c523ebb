// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-place patching of the device-name field.
//!
//! An in-place patch keeps every byte of the image except the name node's
//! payload and the two checksums covering it, so block boundaries and
//! padding are untouched by construction. It is only sound when the encoded
//! target name fits the field's allocated width; a wider name changes the
//! node's extent and requires a full rebuild. That decision is an expected
//! branch, not an error, so it is expressed as [`PatchOutcome`].

use thiserror::Error;

use crate::image::{CRC32, HEADER_CRC_OFFSET, PAYLOAD_CRC_OFFSET};
use crate::name::{NameField, TargetName};

/// The outcome of an in-place patch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The name was rewritten in place; this is the full patched image.
    Patched(Vec<u8>),
    /// The patch was not attempted; the image must be rebuilt.
    NeedsRebuild(RebuildReason),
}

/// Why an in-place patch was not possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RebuildReason {
    /// The encoded name does not fit the field's allocated width.
    #[error("encoded name needs {needed} bytes but the field is {width} bytes wide")]
    FieldTooNarrow {
        /// Bytes needed by the encoded name, including its terminator.
        needed: usize,
        /// Allocated width of the existing field.
        width: usize,
    },
}

/// Attempts to rewrite the located name field in place.
///
/// `data` is never mutated; on success the returned image is a copy that
/// differs from `data` only within the name node (its payload, payload
/// checksum and header checksum). The write is all-or-nothing: either a
/// fully patched image is returned or no bytes are produced at all.
#[must_use]
pub fn patch_in_place(data: &[u8], field: &NameField, target: &TargetName) -> PatchOutcome {
    if target.encoded_len() > field.width() {
        return PatchOutcome::NeedsRebuild(RebuildReason::FieldTooNarrow {
            needed: target.encoded_len(),
            width: field.width(),
        });
    }

    let mut patched = data.to_vec();

    let payload = field.payload_offset()..field.payload_offset() + field.width();
    patched[payload.clone()].copy_from_slice(&target.encode_field(field.width()));
    let payload_crc = CRC32.checksum(&patched[payload]);

    let header = field.node_offset();
    patched[header + PAYLOAD_CRC_OFFSET..header + PAYLOAD_CRC_OFFSET + 4]
        .copy_from_slice(&payload_crc.to_be_bytes());
    let header_crc = CRC32.checksum(&patched[header..header + HEADER_CRC_OFFSET]);
    patched[header + HEADER_CRC_OFFSET..header + HEADER_CRC_OFFSET + 4]
        .copy_from_slice(&header_crc.to_be_bytes());

    PatchOutcome::Patched(patched)
}
