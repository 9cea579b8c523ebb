// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A read-only API for inspecting a single node of a firmware image.

use super::{CRC32, FILL_BYTE, Image, NODE_HEADER_SIZE, NodeHeader, TYPE_END};
use crate::error::{ImageErrorKind, ImageParseError};

/// The type of a node in an AppFS firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Ordinary file data.
    FileData,
    /// The device-name field.
    DeviceName,
    /// An opaque configuration blob.
    Config,
}

impl NodeType {
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(NodeType::FileData),
            2 => Some(NodeType::DeviceName),
            3 => Some(NodeType::Config),
            _ => None,
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            NodeType::FileData => 1,
            NodeType::DeviceName => 2,
            NodeType::Config => 3,
        }
    }
}

/// A node in a firmware image.
#[derive(Debug, Clone, Copy)]
pub struct ImageNode<'a> {
    offset: usize,
    node_type: NodeType,
    header: &'a NodeHeader,
    payload: &'a [u8],
}

impl<'a> ImageNode<'a> {
    /// Returns the byte offset of this node's header within the image.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the byte offset of this node's payload within the image.
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.offset + NODE_HEADER_SIZE
    }

    /// Returns the type of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Returns the payload bytes of this node.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Returns the payload checksum stored in this node's header.
    #[must_use]
    pub fn payload_crc(&self) -> u32 {
        self.header.payload_crc()
    }

    /// Returns `true` if the payload matches its stored checksum.
    #[must_use]
    pub fn verify_payload_crc(&self) -> bool {
        CRC32.checksum(self.payload) == self.header.payload_crc()
    }
}

/// A lazy iterator over the nodes of a firmware image.
///
/// Yields nodes in on-disk order. The first malformed node ends the
/// iteration with an `Err` item; subsequent calls return `None`.
#[derive(Debug)]
pub struct NodeIter<'a> {
    image: Image<'a>,
    offset: usize,
    saw_end: bool,
    done: bool,
}

impl<'a> NodeIter<'a> {
    pub(crate) fn new(image: Image<'a>) -> Self {
        Self {
            image,
            offset: 0,
            saw_end: false,
            done: false,
        }
    }

    /// Returns `true` if an end marker terminated the stream. Meaningful
    /// only once the iterator has been exhausted.
    pub(crate) fn saw_end_marker(&self) -> bool {
        self.saw_end
    }

    fn try_next(&mut self) -> Result<Option<ImageNode<'a>>, ImageParseError> {
        let data = self.image.data();

        // skip flash-erased fill between nodes
        while self.offset < data.len() && data[self.offset] == FILL_BYTE {
            self.offset += 1;
        }
        if self.offset >= data.len() {
            return Ok(None);
        }

        let offset = self.offset;
        let header = self.image.header_at(offset)?;

        if header.node_type() == TYPE_END {
            if header.payload_len() != 0 {
                return Err(ImageParseError::new(ImageErrorKind::EndMarkerPayload, offset));
            }
            self.saw_end = true;
            let tail = offset + NODE_HEADER_SIZE;
            if let Some(garbage) = data[tail..].iter().position(|&b| b != FILL_BYTE) {
                return Err(ImageParseError::new(
                    ImageErrorKind::TrailingGarbage,
                    tail + garbage,
                ));
            }
            self.offset = data.len();
            return Ok(None);
        }

        let node_type = NodeType::from_raw(header.node_type()).ok_or_else(|| {
            ImageParseError::new(ImageErrorKind::BadNodeType(header.node_type()), offset)
        })?;

        let declared = header.payload_len() as usize;
        let payload_start = offset + NODE_HEADER_SIZE;
        let payload_end = payload_start
            .checked_add(declared)
            .ok_or_else(|| ImageParseError::new(ImageErrorKind::PayloadOverrun { declared }, offset))?;
        let payload = data.get(payload_start..payload_end).ok_or_else(|| {
            ImageParseError::new(ImageErrorKind::PayloadOverrun { declared }, offset)
        })?;

        self.offset = payload_start + declared;
        Ok(Some(ImageNode {
            offset,
            node_type,
            header,
            payload,
        }))
    }
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = Result<ImageNode<'a>, ImageParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.try_next() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
