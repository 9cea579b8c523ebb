// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use camname::error::{ImageError, ImageErrorKind};
use camname::image::{Image, NodeType};
use camname::model::{NodeStream, OwnedNode};
use camname::name::{self, TargetName};
use camname::params::{BuildParams, PaddingPolicy, ParamGrid, TrailerPolicy};
use camname::pipeline::{RenameOptions, Strategy, rename, rename_file};

const FACTORY_PARAMS: BuildParams = BuildParams {
    erase_block_size: 0x8000,
    page_size: 0x100,
    padding: PaddingPolicy::WordAlign,
    trailer: TrailerPolicy::EndMarker,
};

/// A firmware image with a 9-byte name field currently reading "OLDCAM01".
fn factory_image() -> Vec<u8> {
    let mut stream = NodeStream::new();
    stream.push(OwnedNode::new(NodeType::FileData, b"bootstrap code".to_vec()));
    stream.push(OwnedNode::new(NodeType::DeviceName, b"OLDCAM01\0".to_vec()));
    stream.push(OwnedNode::new(
        NodeType::Config,
        b"exposure=auto\nfps=30\n".to_vec(),
    ));
    stream.to_image_bytes(&FACTORY_PARAMS).unwrap()
}

fn factory_grid() -> ParamGrid {
    ParamGrid::new(
        vec![0x1000, 0x2000, 0x4000, 0x8000, 0x1_0000],
        vec![0x100],
        vec![PaddingPolicy::WordAlign],
        vec![TrailerPolicy::EndMarker],
    )
}

#[test]
fn short_name_is_patched_in_place() {
    let data = factory_image();
    let target = TargetName::new("NEWCAM02").unwrap();

    let (patched, report) = rename(&data, &target, &RenameOptions::default()).unwrap();

    assert_eq!(report.previous_name, "OLDCAM01");
    assert_eq!(report.strategy, Strategy::InPlace);
    assert!(report.fully_validated);
    assert_eq!(patched.len(), data.len());

    let image = Image::new(&patched).unwrap();
    let field = name::locate(&image).unwrap();
    assert_eq!(field.current(), "NEWCAM02");
    assert_eq!(field.width(), 9);

    // nodes other than the name node are byte-identical
    assert_eq!(patched[..field.node_offset()], data[..field.node_offset()]);
    let node_end = field.payload_offset() + field.width();
    assert_eq!(patched[node_end..], data[node_end..]);
}

#[test]
fn overlong_name_is_rejected_before_any_image_work() {
    let err = TargetName::new("TOOLONGNAME123").unwrap_err();
    assert!(matches!(err, ImageError::NameTooLong { len: 14, max: 9 }));
}

#[test]
fn wide_name_triggers_rebuild_through_the_grid() {
    let data = factory_image();
    // 13 characters: does not fit the 9-byte field, forces the rebuild path
    let target = TargetName::with_limit("LONGCAMNAME01", 13).unwrap();
    let options = RenameOptions {
        force_rebuild: false,
        grid: factory_grid(),
    };

    let (rebuilt, report) = rename(&data, &target, &options).unwrap();

    assert!(report.fully_validated);
    assert!(matches!(
        report.strategy,
        Strategy::Rebuilt { params, similarity: None } if params == FACTORY_PARAMS
    ));
    assert_eq!(rebuilt.len(), data.len());

    let image = Image::new(&rebuilt).unwrap();
    let field = name::locate(&image).unwrap();
    assert_eq!(field.current(), "LONGCAMNAME01");
    assert_eq!(field.width(), 14);
}

#[test]
fn forced_rebuild_skips_the_in_place_path() {
    let data = factory_image();
    let target = TargetName::new("NEWCAM02").unwrap();
    let options = RenameOptions {
        force_rebuild: true,
        grid: factory_grid(),
    };

    let (rebuilt, report) = rename(&data, &target, &options).unwrap();

    assert!(matches!(report.strategy, Strategy::Rebuilt { .. }));
    assert!(report.fully_validated);
    let field = name::locate(&Image::new(&rebuilt).unwrap()).unwrap();
    assert_eq!(field.current(), "NEWCAM02");
}

#[test]
fn repeated_runs_select_the_same_candidate() {
    let data = factory_image();
    let target = TargetName::with_limit("LONGCAMNAME01", 13).unwrap();
    let options = RenameOptions {
        force_rebuild: false,
        grid: factory_grid(),
    };

    let (first, first_report) = rename(&data, &target, &options).unwrap();
    let (second, second_report) = rename(&data, &target, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(first_report, second_report);
}

#[test]
fn truncated_node_header_is_fatal() {
    let data = factory_image();
    let image = Image::new(&data).unwrap();
    let second_node = image.nodes().nth(1).unwrap().unwrap().offset();
    // cut the image in the middle of the second node's header
    let truncated = &data[..second_node + 8];

    let target = TargetName::new("NEWCAM02").unwrap();
    let err = rename(truncated, &target, &RenameOptions::default()).unwrap_err();
    assert!(matches!(err, ImageError::Parse(e)
        if matches!(e.kind, ImageErrorKind::InvalidLength)));
}

#[test]
fn image_without_name_field_is_fatal() {
    let mut stream = NodeStream::new();
    stream.push(OwnedNode::new(NodeType::FileData, b"bootstrap".to_vec()));
    let data = stream.to_image_bytes(&FACTORY_PARAMS).unwrap();

    let target = TargetName::new("NEWCAM02").unwrap();
    let err = rename(&data, &target, &RenameOptions::default()).unwrap_err();
    assert!(matches!(err, ImageError::NameFieldNotFound));
}

#[test]
fn exhausted_grid_reports_best_effort() {
    let data = factory_image();
    let target = TargetName::with_limit("LONGCAMNAME01", 13).unwrap();
    // none of these erase blocks can reproduce the factory image size
    let options = RenameOptions {
        force_rebuild: false,
        grid: ParamGrid::new(
            vec![0x1000, 0x2000],
            vec![0x100],
            vec![PaddingPolicy::WordAlign],
            vec![TrailerPolicy::EndMarker],
        ),
    };

    let (best_effort, report) = rename(&data, &target, &options).unwrap();

    assert!(!report.fully_validated);
    let Strategy::Rebuilt {
        similarity: Some(similarity),
        ..
    } = report.strategy
    else {
        panic!("an undersized grid cannot fully validate");
    };
    assert!(similarity > 0.0 && similarity < 1.0);
    assert_ne!(best_effort.len(), data.len());
}

#[test]
fn rename_file_writes_output_and_refuses_to_clobber_input() {
    let dir = std::env::temp_dir().join(format!("camname-pipeline-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("firmware.bin");
    let output = dir.join("firmware-renamed.bin");

    let data = factory_image();
    std::fs::write(&input, &data).unwrap();

    let target = TargetName::new("NEWCAM02").unwrap();
    let err = rename_file(&input, &input, &target, &RenameOptions::default()).unwrap_err();
    assert!(matches!(err, ImageError::OutputClobbersInput));

    let report = rename_file(&input, &output, &target, &RenameOptions::default()).unwrap();
    assert_eq!(report.previous_name, "OLDCAM01");
    assert!(report.fully_validated);

    // the source image is untouched
    assert_eq!(std::fs::read(&input).unwrap(), data);
    let patched = std::fs::read(&output).unwrap();
    let field = name::locate(&Image::new(&patched).unwrap()).unwrap();
    assert_eq!(field.current(), "NEWCAM02");

    std::fs::remove_dir_all(&dir).ok();
}
