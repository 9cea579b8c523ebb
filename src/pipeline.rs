// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The end-to-end rename pipeline.
//!
//! A single invocation owns its image: load, scan, locate, patch (or
//! rebuild via the parameter search), validate, persist. The source image
//! is never written to; every path produces a fresh output buffer and all
//! fatal errors leave the input untouched. Flashing the output to a device
//! is the job of the vendor's flashing utility, which consumes the file
//! this pipeline produces.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::ImageError;
use crate::image::Image;
use crate::model::NodeStream;
use crate::name::{self, TargetName};
use crate::params::{BuildParams, ParamGrid};
use crate::patch::{self, PatchOutcome};
use crate::search::{self, SearchOutcome};
use crate::validate;

/// Options controlling a rename invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOptions {
    /// Skip the in-place patch and go straight to the rebuild path.
    pub force_rebuild: bool,
    /// The candidate grid used when rebuilding.
    pub grid: ParamGrid,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            grid: ParamGrid::builtin(),
        }
    }
}

/// How the output image was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// The name was rewritten in place.
    InPlace,
    /// The image was rebuilt from its decoded node stream.
    Rebuilt {
        /// The build parameters the rebuild used.
        params: BuildParams,
        /// Byte similarity against the source image, present only when no
        /// candidate fully validated.
        similarity: Option<f64>,
    },
}

/// The structured result of a successful rename.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameReport {
    /// The name the image carried before patching.
    pub previous_name: String,
    /// How the output image was produced.
    pub strategy: Strategy,
    /// `false` only for a best-effort rebuild that did not fully validate;
    /// such an image needs human judgment before flashing.
    pub fully_validated: bool,
}

/// Rewrites the device name inside a firmware image.
///
/// Attempts an in-place patch first; escalates to a rebuild over
/// `options.grid` when the new name does not fit the existing field or
/// when `options.force_rebuild` is set. The returned buffer has passed the
/// [validator](crate::validate::validate) unless the report says
/// otherwise.
///
/// # Errors
///
/// Returns [`ImageError::Parse`] if the image is malformed,
/// [`ImageError::NameFieldNotFound`] if it carries no name field, and
/// [`ImageError::NoValidCandidate`] if the rebuild path exhausts the grid.
///
/// # Examples
///
/// ```
/// use camname::image::NodeType;
/// use camname::model::{NodeStream, OwnedNode};
/// use camname::name::TargetName;
/// use camname::params::{BuildParams, PaddingPolicy, TrailerPolicy};
/// use camname::pipeline::{RenameOptions, Strategy, rename};
///
/// let mut stream = NodeStream::new();
/// stream.push(OwnedNode::new(NodeType::DeviceName, b"OLDCAM01\0".to_vec()));
/// let params = BuildParams {
///     erase_block_size: 0x1000,
///     page_size: 0x100,
///     padding: PaddingPolicy::WordAlign,
///     trailer: TrailerPolicy::EndMarker,
/// };
/// let data = stream.to_image_bytes(&params).unwrap();
///
/// let target = TargetName::new("NEWCAM02").unwrap();
/// let (patched, report) = rename(&data, &target, &RenameOptions::default()).unwrap();
/// assert_eq!(report.previous_name, "OLDCAM01");
/// assert_eq!(report.strategy, Strategy::InPlace);
/// assert_eq!(patched.len(), data.len());
/// ```
pub fn rename(
    data: &[u8],
    target: &TargetName,
    options: &RenameOptions,
) -> Result<(Vec<u8>, RenameReport), ImageError> {
    let image = Image::new(data)?;
    let field = name::locate(&image)?;
    info!(current = %field.current(), target = %target, "located device-name field");

    if !options.force_rebuild {
        match patch::patch_in_place(data, &field, target) {
            PatchOutcome::Patched(patched) => {
                let report = validate::validate(&patched, target, data.len(), None);
                if report.is_valid() {
                    info!("in-place patch validated");
                    return Ok((
                        patched,
                        RenameReport {
                            previous_name: field.current().to_owned(),
                            strategy: Strategy::InPlace,
                            fully_validated: true,
                        },
                    ));
                }
                if let Some(violation) = report.violation() {
                    warn!(%violation, "in-place patch failed validation, rebuilding");
                }
            }
            PatchOutcome::NeedsRebuild(reason) => {
                debug!(%reason, "in-place patch not possible, rebuilding");
            }
        }
    }

    let mut stream = NodeStream::from_image(&image)?;
    let width = field.width().max(target.encoded_len());
    stream.set_device_name(target, width)?;

    let result = search::run(&stream, &options.grid, target, data.len(), Some(data))?;
    let (fully_validated, similarity) = match result.outcome {
        SearchOutcome::Validated => (true, None),
        SearchOutcome::BestEffort { similarity } => (false, Some(similarity)),
    };
    Ok((
        result.image,
        RenameReport {
            previous_name: field.current().to_owned(),
            strategy: Strategy::Rebuilt {
                params: result.params,
                similarity,
            },
            fully_validated,
        },
    ))
}

/// Rewrites the device name of the image at `input`, writing the result to
/// `output`.
///
/// The input file is read once and never written to; refusing to let the
/// two paths alias is what keeps a failed run recoverable.
///
/// # Errors
///
/// Returns [`ImageError::OutputClobbersInput`] if `output` refers to the
/// input file, [`ImageError::Io`] for filesystem errors, and everything
/// [`rename`] can return.
pub fn rename_file(
    input: &Path,
    output: &Path,
    target: &TargetName,
    options: &RenameOptions,
) -> Result<RenameReport, ImageError> {
    let input_abs = input.canonicalize()?;
    if let Ok(output_abs) = output.canonicalize() {
        if input_abs == output_abs {
            return Err(ImageError::OutputClobbersInput);
        }
    }

    let data = fs::read(input)?;
    info!(input = %input.display(), len = data.len(), "loaded firmware image");

    let (patched, report) = rename(&data, target, options)?;

    fs::write(output, &patched)?;
    info!(
        output = %output.display(),
        len = patched.len(),
        fully_validated = report.fully_validated,
        "wrote renamed image"
    );
    Ok(report)
}
