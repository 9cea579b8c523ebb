// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Grid search over image build parameters.
//!
//! When the geometry an image was built with is unknown, [`run`] walks a
//! [`ParamGrid`] in order, rebuilding and validating one candidate at a
//! time, and stops at the first candidate that fully validates. Each
//! candidate is rebuilt at most once and evaluation is pure, so repeated
//! runs over the same grid select the same candidate. This path is opt-in:
//! the pipeline only enters it when an in-place patch is not possible or a
//! rebuild was explicitly requested.

use tracing::{debug, info, warn};

use crate::error::ImageError;
use crate::model::NodeStream;
use crate::name::TargetName;
use crate::params::{BuildParams, ParamGrid};
use crate::validate;

/// The result of a parameter search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The selected build parameters.
    pub params: BuildParams,
    /// The image rebuilt with the selected parameters.
    pub image: Vec<u8>,
    /// Whether the selected candidate fully validated.
    pub outcome: SearchOutcome,
    /// How many candidates were rebuilt and validated before stopping.
    pub tried: usize,
}

/// How the selected candidate was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// The candidate passed every validation check.
    Validated,
    /// No candidate validated; this one scored highest against the
    /// reference image. A human must judge whether it is acceptable.
    BestEffort {
        /// Fraction of bytes matching the reference, in `0.0..=1.0`.
        similarity: f64,
    },
}

/// Searches the grid for build parameters that reproduce a valid image.
///
/// Rebuilds `stream` once per candidate and submits the result to the
/// [validator](crate::validate::validate) with `expected_len` as the
/// required image size. Stops at the first candidate that validates. If
/// none does and `reference` is supplied, the highest-scoring candidate is
/// returned as a best-effort result, with ties broken by grid order.
///
/// # Errors
///
/// Returns [`ImageError::NoValidCandidate`] if the grid is exhausted
/// without a validating candidate and there is no reference image to score
/// against.
pub fn run(
    stream: &NodeStream,
    grid: &ParamGrid,
    target: &TargetName,
    expected_len: usize,
    reference: Option<&[u8]>,
) -> Result<SearchResult, ImageError> {
    let mut best: Option<(f64, BuildParams, Vec<u8>)> = None;
    let mut tried = 0;

    for params in grid.candidates() {
        tried += 1;
        let image = match stream.to_image_bytes(&params) {
            Ok(image) => image,
            Err(e) => {
                debug!(?params, error = %e, "candidate rejected by the rebuilder");
                continue;
            }
        };
        let report = validate::validate(&image, target, expected_len, Some(&params));
        if report.is_valid() {
            info!(?params, tried, "candidate validated");
            return Ok(SearchResult {
                params,
                image,
                outcome: SearchOutcome::Validated,
                tried,
            });
        }
        if let Some(violation) = report.violation() {
            debug!(?params, %violation, "candidate rejected");
        }
        if let Some(reference) = reference {
            let score = similarity(&image, reference);
            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, params, image));
            }
        }
    }

    match best {
        Some((similarity, params, image)) => {
            warn!(
                ?params,
                similarity, tried, "no candidate fully validated; returning best effort"
            );
            Ok(SearchResult {
                params,
                image,
                outcome: SearchOutcome::BestEffort { similarity },
                tried,
            })
        }
        None => Err(ImageError::NoValidCandidate { tried }),
    }
}

/// Fraction of byte positions at which `a` and `b` agree, over the longer
/// of the two lengths.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let matching = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matching as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::NodeType;
    use crate::model::OwnedNode;
    use crate::params::{PaddingPolicy, TrailerPolicy};

    fn stream() -> NodeStream {
        let mut stream = NodeStream::new();
        stream.push(OwnedNode::new(NodeType::FileData, b"bootstrap".to_vec()));
        stream.push(OwnedNode::new(NodeType::DeviceName, b"NEWCAM02\0".to_vec()));
        stream
    }

    fn grid() -> ParamGrid {
        ParamGrid::new(
            vec![0x1000, 0x2000, 0x4000, 0x8000, 0x1_0000],
            vec![0x100],
            vec![PaddingPolicy::WordAlign],
            vec![TrailerPolicy::EndMarker],
        )
    }

    #[test]
    fn search_stops_at_the_first_validating_candidate() {
        let target = TargetName::new("NEWCAM02").unwrap();
        // an image one 0x8000-byte erase block long: candidate index 3
        let result = run(&stream(), &grid(), &target, 0x8000, None).unwrap();

        assert_eq!(result.outcome, SearchOutcome::Validated);
        assert_eq!(result.params.erase_block_size, 0x8000);
        assert_eq!(result.tried, 4);
        assert_eq!(result.image.len(), 0x8000);
    }

    #[test]
    fn search_is_deterministic() {
        let target = TargetName::new("NEWCAM02").unwrap();
        let first = run(&stream(), &grid(), &target, 0x8000, None).unwrap();
        let second = run(&stream(), &grid(), &target, 0x8000, None).unwrap();
        assert_eq!(first.params, second.params);
        assert_eq!(first.image, second.image);
        assert_eq!(first.tried, second.tried);
    }

    #[test]
    fn exhausted_grid_without_reference_is_an_error() {
        let target = TargetName::new("NEWCAM02").unwrap();
        // no candidate produces a 0x3000-byte image
        let err = run(&stream(), &grid(), &target, 0x3000, None).unwrap_err();
        assert!(matches!(err, ImageError::NoValidCandidate { tried: 5 }));
    }

    #[test]
    fn exhausted_grid_with_reference_returns_best_effort() {
        let target = TargetName::new("NEWCAM02").unwrap();
        let reference = stream()
            .to_image_bytes(&BuildParams {
                erase_block_size: 0x1000,
                page_size: 0x100,
                padding: PaddingPolicy::WordAlign,
                trailer: TrailerPolicy::EndMarker,
            })
            .unwrap();

        let result = run(&stream(), &grid(), &target, 0x3000, Some(&reference)).unwrap();
        assert_eq!(result.tried, 5);
        let SearchOutcome::BestEffort { similarity } = result.outcome else {
            panic!("no candidate can validate against an impossible size");
        };
        assert!(similarity > 0.0);
    }

    #[test]
    fn similarity_counts_matching_positions() {
        assert!((similarity(b"abcd", b"abcd") - 1.0).abs() < f64::EPSILON);
        assert!((similarity(b"abcd", b"abxx") - 0.5).abs() < f64::EPSILON);
        assert!((similarity(b"", b"") - 1.0).abs() < f64::EPSILON);
        assert!((similarity(b"ab", b"abcd") - 0.5).abs() < f64::EPSILON);
    }
}
