// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Image build parameters and the candidate grid.
//!
//! An AppFS image records no flash geometry, so rebuilding one requires the
//! erase block size, page size, padding policy and trailer policy that the
//! vendor's build used. When these are unknown, the
//! [search](crate::search) enumerates a [`ParamGrid`]: a declarative
//! cross-product of candidate value sets, iterated in a fixed order so that
//! repeated runs select the same candidate.

use crate::error::ImageError;

/// The layout parameters a firmware image was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildParams {
    /// The erase block size in bytes. The image is padded to a whole number
    /// of erase blocks.
    pub erase_block_size: u32,
    /// The flash page size in bytes. Must divide the erase block size.
    pub page_size: u32,
    /// How node starts are aligned.
    pub padding: PaddingPolicy,
    /// Whether the node stream is terminated by an end marker.
    pub trailer: TrailerPolicy,
}

/// The alignment applied to each node start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// Nodes start on 4-byte word boundaries.
    WordAlign,
    /// Nodes start on page boundaries.
    PageAlign,
}

/// Whether the node stream is terminated by an end-marker node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailerPolicy {
    /// An end marker follows the last node.
    EndMarker,
    /// The stream ends with the last node; the rest of the image is fill.
    Bare,
}

impl BuildParams {
    /// Checks the structural coherence of the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnsupportedParameters`] naming the violated
    /// constraint: both sizes must be powers of two, the page size must be
    /// at least one word, and the page size must not exceed the erase block
    /// size.
    pub fn validate(&self) -> Result<(), ImageError> {
        if !self.erase_block_size.is_power_of_two() {
            return Err(ImageError::UnsupportedParameters(
                "erase block size must be a power of two",
            ));
        }
        if !self.page_size.is_power_of_two() {
            return Err(ImageError::UnsupportedParameters(
                "page size must be a power of two",
            ));
        }
        if self.page_size < 4 {
            return Err(ImageError::UnsupportedParameters(
                "page size must be at least one word",
            ));
        }
        if self.page_size > self.erase_block_size {
            return Err(ImageError::UnsupportedParameters(
                "page size must not exceed the erase block size",
            ));
        }
        Ok(())
    }

    pub(crate) fn erase_block(&self) -> usize {
        usize::try_from(self.erase_block_size).expect("erase block size fits in usize")
    }

    pub(crate) fn node_alignment(&self) -> usize {
        match self.padding {
            PaddingPolicy::WordAlign => 4,
            PaddingPolicy::PageAlign => {
                usize::try_from(self.page_size).expect("page size fits in usize")
            }
        }
    }
}

/// A finite, declarative space of [`BuildParams`] candidates.
///
/// The grid is the cross-product of its four value sets; incoherent tuples
/// (see [`BuildParams::validate`]) are skipped. Candidates are yielded in a
/// fixed nesting order (erase block, then page, then padding, then
/// trailer), so iteration is deterministic. Extending the search means
/// extending the value sets, not the control flow.
///
/// # Examples
///
/// ```
/// use camname::params::{PaddingPolicy, ParamGrid, TrailerPolicy};
///
/// let grid = ParamGrid::new(
///     vec![0x4000, 0x10000],
///     vec![0x200],
///     vec![PaddingPolicy::WordAlign],
///     vec![TrailerPolicy::EndMarker],
/// );
/// assert_eq!(grid.candidates().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGrid {
    erase_block_sizes: Vec<u32>,
    page_sizes: Vec<u32>,
    padding: Vec<PaddingPolicy>,
    trailers: Vec<TrailerPolicy>,
}

impl ParamGrid {
    /// Creates a grid from explicit value sets.
    #[must_use]
    pub fn new(
        erase_block_sizes: Vec<u32>,
        page_sizes: Vec<u32>,
        padding: Vec<PaddingPolicy>,
        trailers: Vec<TrailerPolicy>,
    ) -> Self {
        Self {
            erase_block_sizes,
            page_sizes,
            padding,
            trailers,
        }
    }

    /// Returns the built-in grid covering the common NOR and NAND
    /// geometries found in camera modules.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            erase_block_sizes: vec![0x4000, 0x8000, 0x1_0000, 0x2_0000, 0x4_0000],
            page_sizes: vec![0x100, 0x200, 0x800],
            padding: vec![PaddingPolicy::WordAlign, PaddingPolicy::PageAlign],
            trailers: vec![TrailerPolicy::EndMarker, TrailerPolicy::Bare],
        }
    }

    /// Returns the coherent candidates of the grid, in deterministic order.
    pub fn candidates(&self) -> impl Iterator<Item = BuildParams> + '_ {
        self.erase_block_sizes.iter().flat_map(move |&erase_block_size| {
            self.page_sizes.iter().flat_map(move |&page_size| {
                self.padding.iter().flat_map(move |&padding| {
                    self.trailers.iter().map(move |&trailer| BuildParams {
                        erase_block_size,
                        page_size,
                        padding,
                        trailer,
                    })
                })
            })
        })
        .filter(|params| params.validate().is_ok())
    }
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self::builtin()
    }
}
