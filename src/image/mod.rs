// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A read-only API for parsing and scanning an AppFS firmware image.
//!
//! This module provides the [`Image`] struct, which is the entry point for
//! scanning the node stream of a camera firmware filesystem image. The API
//! performs no memory allocation and provides a zero-copy view of the image
//! data. The image is never mutated; patching and rebuilding operate on
//! owned copies (see [`crate::patch`] and [`crate::model`]).
//!
//! An AppFS image is a headerless sequence of nodes. Each node is a 20-byte
//! big-endian header followed by its payload; node starts are aligned with
//! the flash-erased fill byte `0xFF`. The format records no flash geometry,
//! which is why rebuilding an image requires externally supplied
//! [`BuildParams`](crate::params::BuildParams).

use core::mem::offset_of;

use crc::{CRC_32_ISO_HDLC, Crc};
use zerocopy::byteorder::big_endian;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{ImageErrorKind, ImageParseError};

mod node;
pub use node::{ImageNode, NodeIter, NodeType};

/// Magic number carried by every node header (`"APFS"`).
pub(crate) const NODE_MAGIC: u32 = 0x4150_4653;
/// Fill byte used between nodes and after the node stream (flash-erased
/// state).
pub(crate) const FILL_BYTE: u8 = 0xFF;
/// Raw node type of the end marker.
pub(crate) const TYPE_END: u32 = 0xFFFF_FFFF;

pub(crate) const NODE_HEADER_SIZE: usize = size_of::<NodeHeader>();
/// The header checksum covers everything before the `header_crc` field.
pub(crate) const HEADER_CRC_OFFSET: usize = offset_of!(NodeHeader, header_crc);
pub(crate) const PAYLOAD_CRC_OFFSET: usize = offset_of!(NodeHeader, payload_crc);

/// The checksum used for node headers and payloads.
pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
pub(crate) struct NodeHeader {
    /// Magic number of the node.
    pub(crate) magic: big_endian::U32,
    /// Raw type tag of the node.
    pub(crate) node_type: big_endian::U32,
    /// Length of the payload in bytes.
    pub(crate) payload_len: big_endian::U32,
    /// CRC-32 of the payload bytes.
    pub(crate) payload_crc: big_endian::U32,
    /// CRC-32 of the preceding header bytes.
    pub(crate) header_crc: big_endian::U32,
}

impl NodeHeader {
    pub(crate) fn magic(&self) -> u32 {
        self.magic.get()
    }

    pub(crate) fn node_type(&self) -> u32 {
        self.node_type.get()
    }

    pub(crate) fn payload_len(&self) -> u32 {
        self.payload_len.get()
    }

    pub(crate) fn payload_crc(&self) -> u32 {
        self.payload_crc.get()
    }

    pub(crate) fn header_crc(&self) -> u32 {
        self.header_crc.get()
    }
}

/// A read-only view of a camera firmware filesystem image.
#[derive(Debug, Clone, Copy)]
pub struct Image<'a> {
    pub(crate) data: &'a [u8],
}

impl<'a> Image<'a> {
    /// Creates a new `Image` from the given byte slice.
    ///
    /// Only the first node header is checked here; the rest of the stream is
    /// verified lazily while iterating with [`Image::nodes`].
    ///
    /// # Errors
    ///
    /// Returns an [`ImageErrorKind::InvalidLength`] if `data` is too short to
    /// contain a node header.
    ///
    /// Returns an [`ImageErrorKind::BadMagic`] if the image does not begin
    /// with a node.
    ///
    /// Returns an [`ImageErrorKind::HeaderChecksum`] if the first node header
    /// fails its checksum.
    pub fn new(data: &'a [u8]) -> Result<Self, ImageParseError> {
        if data.len() < NODE_HEADER_SIZE {
            return Err(ImageParseError::new(ImageErrorKind::InvalidLength, 0));
        }

        let image = Image { data };
        image.header_at(0)?;

        Ok(image)
    }

    /// Returns the underlying data slice of the image.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a lazy iterator over the nodes of the image, in on-disk order.
    ///
    /// The iterator is restartable: each call returns a fresh iterator
    /// starting at the first node. The end marker, when present, terminates
    /// iteration and is not yielded. The first malformed node ends the
    /// iteration with an `Err` item.
    #[must_use]
    pub fn nodes(&self) -> NodeIter<'a> {
        NodeIter::new(*self)
    }

    /// Returns `true` if the node stream is terminated by an end marker.
    ///
    /// # Errors
    ///
    /// Returns the first parse error encountered while walking the stream.
    pub fn has_end_marker(&self) -> Result<bool, ImageParseError> {
        let mut nodes = self.nodes();
        for node in nodes.by_ref() {
            node?;
        }
        Ok(nodes.saw_end_marker())
    }

    /// Reads and checks the node header at `offset`.
    pub(crate) fn header_at(&self, offset: usize) -> Result<&'a NodeHeader, ImageParseError> {
        let bytes = self
            .data
            .get(offset..)
            .ok_or_else(|| ImageParseError::new(ImageErrorKind::InvalidLength, offset))?;
        let Ok((header, _rest)) = NodeHeader::ref_from_prefix(bytes) else {
            return Err(ImageParseError::new(ImageErrorKind::InvalidLength, offset));
        };

        if header.magic() != NODE_MAGIC {
            return Err(ImageParseError::new(
                ImageErrorKind::BadMagic(header.magic()),
                offset,
            ));
        }
        let computed = CRC32.checksum(&bytes[..HEADER_CRC_OFFSET]);
        if computed != header.header_crc() {
            return Err(ImageParseError::new(
                ImageErrorKind::HeaderChecksum,
                offset + HEADER_CRC_OFFSET,
            ));
        }

        Ok(header)
    }
}
