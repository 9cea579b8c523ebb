// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use zerocopy::IntoBytes;

use crate::error::ImageError;
use crate::image::{CRC32, FILL_BYTE, HEADER_CRC_OFFSET, NODE_MAGIC, NodeHeader, TYPE_END};
use crate::model::NodeStream;
use crate::params::{BuildParams, TrailerPolicy};

pub(crate) fn serialize(stream: &NodeStream, params: &BuildParams) -> Result<Vec<u8>, ImageError> {
    params.validate()?;

    let mut out = Vec::new();
    for node in stream.nodes() {
        pad_to(&mut out, params.node_alignment());
        write_node(&mut out, node.node_type().raw(), node.payload());
    }

    if params.trailer == TrailerPolicy::EndMarker {
        pad_to(&mut out, params.node_alignment());
        write_node(&mut out, TYPE_END, &[]);
    }

    pad_to(&mut out, params.erase_block());
    Ok(out)
}

fn write_node(out: &mut Vec<u8>, node_type: u32, payload: &[u8]) {
    let mut header = NodeHeader {
        magic: NODE_MAGIC.into(),
        node_type: node_type.into(),
        payload_len: u32::try_from(payload.len())
            .expect("payload length exceeds u32")
            .into(),
        payload_crc: CRC32.checksum(payload).into(),
        header_crc: 0u32.into(),
    };
    header.header_crc = CRC32.checksum(&header.as_bytes()[..HEADER_CRC_OFFSET]).into();

    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
}

fn pad_to(out: &mut Vec<u8>, align: usize) {
    let new_len = out.len().next_multiple_of(align);
    out.resize(new_len, FILL_BYTE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Image, NODE_HEADER_SIZE, NodeType};
    use crate::model::OwnedNode;
    use crate::params::PaddingPolicy;

    fn stream() -> NodeStream {
        let mut stream = NodeStream::new();
        stream.push(OwnedNode::new(NodeType::FileData, b"abc".to_vec()));
        stream.push(OwnedNode::new(NodeType::DeviceName, b"CAM1\0\0\0\0\0".to_vec()));
        stream
    }

    #[test]
    fn image_size_is_erase_block_aligned() {
        for &erase_block_size in &[0x1000u32, 0x4000, 0x10000] {
            let params = BuildParams {
                erase_block_size,
                page_size: 0x100,
                padding: PaddingPolicy::WordAlign,
                trailer: TrailerPolicy::EndMarker,
            };
            let bytes = serialize(&stream(), &params).unwrap();
            assert_eq!(bytes.len(), erase_block_size as usize);
        }
    }

    #[test]
    fn word_alignment_places_nodes_on_word_boundaries() {
        let params = BuildParams {
            erase_block_size: 0x1000,
            page_size: 0x100,
            padding: PaddingPolicy::WordAlign,
            trailer: TrailerPolicy::Bare,
        };
        let bytes = serialize(&stream(), &params).unwrap();
        // first node payload is 3 bytes, so the second node starts at the
        // next word boundary after header + 3
        let second = (NODE_HEADER_SIZE + 3).next_multiple_of(4);
        assert_eq!(bytes[NODE_HEADER_SIZE + 3], FILL_BYTE);
        let image = Image::new(&bytes).unwrap();
        let nodes: Vec<_> = image.nodes().collect::<Result<_, _>>().unwrap();
        assert_eq!(nodes[1].offset(), second);
    }

    #[test]
    fn page_alignment_places_nodes_on_page_boundaries() {
        let params = BuildParams {
            erase_block_size: 0x1000,
            page_size: 0x100,
            padding: PaddingPolicy::PageAlign,
            trailer: TrailerPolicy::Bare,
        };
        let bytes = serialize(&stream(), &params).unwrap();
        let image = Image::new(&bytes).unwrap();
        let nodes: Vec<_> = image.nodes().collect::<Result<_, _>>().unwrap();
        assert_eq!(nodes[1].offset(), 0x100);
    }

    #[test]
    fn trailer_policy_controls_end_marker() {
        let mut params = BuildParams {
            erase_block_size: 0x1000,
            page_size: 0x100,
            padding: PaddingPolicy::WordAlign,
            trailer: TrailerPolicy::EndMarker,
        };
        let with_marker = serialize(&stream(), &params).unwrap();
        assert!(Image::new(&with_marker).unwrap().has_end_marker().unwrap());

        params.trailer = TrailerPolicy::Bare;
        let bare = serialize(&stream(), &params).unwrap();
        assert!(!Image::new(&bare).unwrap().has_end_marker().unwrap());
    }

    #[test]
    fn serialization_is_deterministic() {
        let params = BuildParams {
            erase_block_size: 0x1000,
            page_size: 0x200,
            padding: PaddingPolicy::PageAlign,
            trailer: TrailerPolicy::EndMarker,
        };
        assert_eq!(
            serialize(&stream(), &params).unwrap(),
            serialize(&stream(), &params).unwrap()
        );
    }

    #[test]
    fn incoherent_parameters_are_rejected() {
        let params = BuildParams {
            erase_block_size: 0x1000,
            // larger than the erase block
            page_size: 0x2000,
            padding: PaddingPolicy::WordAlign,
            trailer: TrailerPolicy::EndMarker,
        };
        let err = serialize(&stream(), &params).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedParameters(_)));
    }
}
