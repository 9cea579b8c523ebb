// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An owned, mutable representation of a firmware image's node stream.
//!
//! This module provides the [`NodeStream`] and [`OwnedNode`] structs, which
//! hold the decoded contents of an image independently of its on-disk
//! layout. A stream can be created from scratch or decoded from an
//! existing [`Image`], modified, and then serialized back to image bytes
//! with a set of [`BuildParams`](crate::params::BuildParams).

use crate::error::ImageError;
use crate::image::{Image, ImageNode, NodeType};
use crate::name::TargetName;
use crate::params::BuildParams;

mod writer;

/// A mutable, in-memory node of a firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNode {
    node_type: NodeType,
    payload: Vec<u8>,
}

impl OwnedNode {
    /// Creates a new `OwnedNode` with the given type and payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use camname::image::NodeType;
    /// use camname::model::OwnedNode;
    ///
    /// let node = OwnedNode::new(NodeType::Config, b"exposure=auto".to_vec());
    /// assert_eq!(node.payload(), b"exposure=auto");
    /// ```
    #[must_use]
    pub fn new(node_type: NodeType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            node_type,
            payload: payload.into(),
        }
    }

    /// Returns the type of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Returns the payload of this node.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replaces the payload of this node.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }
}

impl From<ImageNode<'_>> for OwnedNode {
    fn from(node: ImageNode<'_>) -> Self {
        Self {
            node_type: node.node_type(),
            payload: node.payload().to_vec(),
        }
    }
}

/// The decoded node stream of a firmware image.
///
/// Nodes keep their on-disk order. The end marker is a layout concern, not
/// content: it is never part of the stream and is re-added at serialization
/// time according to the trailer policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStream {
    nodes: Vec<OwnedNode>,
}

impl NodeStream {
    /// Creates an empty `NodeStream`.
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Decodes the full node stream of an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image's node stream is malformed.
    pub fn from_image(image: &Image<'_>) -> Result<Self, ImageError> {
        let nodes: Result<Vec<OwnedNode>, _> = image
            .nodes()
            .map(|node| node.map(OwnedNode::from))
            .collect();
        Ok(Self { nodes: nodes? })
    }

    /// Appends a node to the stream.
    pub fn push(&mut self, node: OwnedNode) {
        self.nodes.push(node);
    }

    /// Returns the nodes of the stream in order.
    #[must_use]
    pub fn nodes(&self) -> &[OwnedNode] {
        &self.nodes
    }

    /// Returns a mutable reference to the first device-name node.
    pub fn device_name_mut(&mut self) -> Option<&mut OwnedNode> {
        self.nodes
            .iter_mut()
            .find(|node| node.node_type() == NodeType::DeviceName)
    }

    /// Replaces the device-name field with `name`, encoded at `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::NameFieldNotFound`] if the stream contains no
    /// device-name node.
    pub fn set_device_name(&mut self, name: &TargetName, width: usize) -> Result<(), ImageError> {
        let node = self
            .device_name_mut()
            .ok_or(ImageError::NameFieldNotFound)?;
        node.set_payload(name.encode_field(width));
        Ok(())
    }

    /// Serializes the stream to image bytes using the given build
    /// parameters.
    ///
    /// This is a pure function of the stream and the parameters: the same
    /// inputs always produce the same bytes. The result is not judged for
    /// correctness here; that is the job of [`crate::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnsupportedParameters`] if `params` is
    /// structurally incoherent.
    pub fn to_image_bytes(&self, params: &BuildParams) -> Result<Vec<u8>, ImageError> {
        writer::serialize(self, params)
    }
}
