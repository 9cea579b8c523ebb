// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Device-name input validation and the name-field locator.
//!
//! The camera advertises its USB product string from a fixed-width field
//! inside the firmware filesystem. Names are restricted to uppercase ASCII
//! letters and digits; lowercase input is uppercased before validation, any
//! other character is rejected outright. On disk the field is NUL-terminated
//! and padded with `0x00` to its allocated width.

use core::fmt::{self, Display, Formatter};
use core::str;

use crate::error::{ImageError, ImageErrorKind, ImageParseError};
use crate::image::{Image, NodeType};

/// The default maximum device-name length, in characters.
pub const MAX_NAME_LEN: usize = 9;

/// A validated target device name.
///
/// # Examples
///
/// ```
/// use camname::name::TargetName;
///
/// let name = TargetName::new("newcam02").unwrap();
/// assert_eq!(name.as_str(), "NEWCAM02");
/// assert!(TargetName::new("TOOLONGNAME123").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    name: String,
}

impl TargetName {
    /// Validates `raw` against the device charset and the default maximum
    /// length of [`MAX_NAME_LEN`] characters.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::EmptyName`], [`ImageError::InvalidNameCharacter`]
    /// or [`ImageError::NameTooLong`] if `raw` is not an acceptable name.
    pub fn new(raw: &str) -> Result<Self, ImageError> {
        Self::with_limit(raw, MAX_NAME_LEN)
    }

    /// Validates `raw` with an explicit maximum length, overriding the
    /// default. Names longer than the original field force the rebuild path.
    ///
    /// # Errors
    ///
    /// Same as [`TargetName::new`].
    pub fn with_limit(raw: &str, max_len: usize) -> Result<Self, ImageError> {
        let name = raw.to_ascii_uppercase();
        if name.is_empty() {
            return Err(ImageError::EmptyName);
        }
        if let Some(ch) = name.chars().find(|c| !c.is_ascii_uppercase() && !c.is_ascii_digit()) {
            return Err(ImageError::InvalidNameCharacter { ch });
        }
        if name.len() > max_len {
            return Err(ImageError::NameTooLong {
                len: name.len(),
                max: max_len,
            });
        }
        Ok(Self { name })
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the on-disk encoded length of the name: its bytes plus the
    /// terminating NUL.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.name.len() + 1
    }

    /// Encodes the name as a fixed-width field: name bytes, then `0x00`
    /// padding to `width`. The caller must ensure the name fits.
    pub(crate) fn encode_field(&self, width: usize) -> Vec<u8> {
        debug_assert!(width >= self.encoded_len());
        let mut field = self.name.clone().into_bytes();
        field.resize(width, 0);
        field
    }
}

impl Display for TargetName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The located device-name field of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameField {
    node_offset: usize,
    payload_offset: usize,
    width: usize,
    current: String,
}

impl NameField {
    /// Returns the byte offset of the name node's header.
    #[must_use]
    pub fn node_offset(&self) -> usize {
        self.node_offset
    }

    /// Returns the byte offset of the name field within the image.
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// Returns the allocated width of the name field in bytes.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the name currently stored in the field.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }
}

/// Finds the device-name field of an image.
///
/// Returns the first node of type [`NodeType::DeviceName`], with its byte
/// range and the decoded current name. The node's payload checksum is
/// verified before the field is trusted.
///
/// # Errors
///
/// Returns [`ImageError::NameFieldNotFound`] if the image contains no
/// device-name node, or [`ImageError::Parse`] if the node stream is
/// malformed.
pub fn locate(image: &Image<'_>) -> Result<NameField, ImageError> {
    for node in image.nodes() {
        let node = node?;
        if node.node_type() != NodeType::DeviceName {
            continue;
        }
        if !node.verify_payload_crc() {
            return Err(ImageParseError::new(
                ImageErrorKind::PayloadChecksum,
                node.payload_offset(),
            )
            .into());
        }
        let current = decode_name(node.payload(), node.payload_offset())?;
        return Ok(NameField {
            node_offset: node.offset(),
            payload_offset: node.payload_offset(),
            width: node.payload().len(),
            current,
        });
    }
    Err(ImageError::NameFieldNotFound)
}

/// Decodes a fixed-width name field: printable ASCII up to the first NUL,
/// with `0x00` padding to the end of the field.
pub(crate) fn decode_name(payload: &[u8], payload_offset: usize) -> Result<String, ImageParseError> {
    let end = payload
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(payload.len());
    let (name, padding) = payload.split_at(end);
    if padding.iter().any(|&b| b != 0) {
        return Err(ImageParseError::new(
            ImageErrorKind::BadNameEncoding,
            payload_offset + end,
        ));
    }
    if !name.iter().all(|b| b.is_ascii_graphic()) {
        return Err(ImageParseError::new(
            ImageErrorKind::BadNameEncoding,
            payload_offset,
        ));
    }
    let name = str::from_utf8(name)
        .map_err(|_| ImageParseError::new(ImageErrorKind::BadNameEncoding, payload_offset))?;
    Ok(name.to_owned())
}
