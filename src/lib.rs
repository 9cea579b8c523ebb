// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for patching the device-name field in AppFS camera firmware
//! images.
//!
//! This library rewrites the embedded device name inside a camera's
//! firmware filesystem image so the device enumerates under a new
//! identity. It provides:
//!
//! - A read-only, zero-copy API for scanning an image's node stream.
//! - An in-place patch engine that rewrites the name field and its
//!   checksums without moving a single other byte.
//! - A rebuilder that re-serializes the decoded node stream with a set of
//!   build parameters, and a deterministic grid search over candidate
//!   parameters when the original geometry is unknown.
//! - A validator that re-parses a candidate image end to end and is the
//!   sole judge of whether it is safe to hand to the flashing utility.
//!
//! Flashing itself, USB transport and device enumeration are out of scope:
//! the library only produces an image file in the format the external
//! flashing tool expects.

#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod model;
pub mod name;
pub mod params;
pub mod patch;
pub mod pipeline;
pub mod search;
pub mod validate;

pub use error::{ImageError, ImageErrorKind, ImageParseError};
pub use image::{Image, ImageNode, NodeType};
pub use name::{MAX_NAME_LEN, NameField, TargetName};
pub use params::{BuildParams, PaddingPolicy, ParamGrid, TrailerPolicy};
pub use patch::{PatchOutcome, RebuildReason};
pub use pipeline::{RenameOptions, RenameReport, Strategy, rename, rename_file};
pub use search::{SearchOutcome, SearchResult};
pub use validate::{ValidationReport, Violation, validate};
