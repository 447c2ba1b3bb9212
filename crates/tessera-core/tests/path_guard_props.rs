//! Property tests for archive path validation.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::path::{Component, Path};

use proptest::prelude::*;
use tessera_core::{Error, clean_path, validate_extract_path};

const DEST: &str = "/tmp/Safe.Dest";

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_owned()),
        Just(".".to_owned()),
        Just(String::new()),
        "[a-zA-Z0-9_ -]{1,8}",
        "[^/\\p{Cc}]{1,4}",
    ]
}

fn relative_candidate() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 0..8).prop_map(|parts| parts.join("/"))
}

/// Depth reached while walking `candidate`; negative means it climbed above the start.
fn lowest_depth(candidate: &str) -> i64 {
    let mut depth = 0_i64;
    let mut lowest = 0_i64;
    for part in candidate.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                depth -= 1;
                lowest = lowest.min(depth);
            }
            _ => depth += 1,
        }
    }
    lowest
}

proptest! {
    #[test]
    fn never_panics_on_any_string(candidate in "\\PC*") {
        let _result = validate_extract_path(Path::new(DEST), &candidate);
    }

    #[test]
    fn never_panics_on_raw_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let candidate = String::from_utf8_lossy(&bytes);
        let _result = validate_extract_path(Path::new(DEST), &candidate);
    }

    #[test]
    fn absolute_candidates_are_rejected(tail in relative_candidate()) {
        let candidate = format!("/{tail}");
        let rejected = matches!(
            validate_extract_path(Path::new(DEST), &candidate),
            Err(Error::PathTraversalRejected { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn accepted_paths_stay_inside(candidate in relative_candidate()) {
        match validate_extract_path(Path::new(DEST), &candidate) {
            Ok(path) => {
                prop_assert!(path.starts_with(DEST));
                prop_assert_eq!(clean_path(&path), path.clone());
                let remainder = path.strip_prefix(DEST).unwrap();
                prop_assert!(
                    !remainder.components().any(|component| component == Component::ParentDir)
                );
            }
            Err(err) => {
                let is_traversal_rejected = matches!(err, Error::PathTraversalRejected { .. });
                prop_assert!(is_traversal_rejected);
            }
        }
    }

    #[test]
    fn escaping_candidates_are_rejected(candidate in relative_candidate()) {
        let outcome = validate_extract_path(Path::new(DEST), &candidate);
        if lowest_depth(&candidate) < 0 {
            prop_assert!(outcome.is_err());
        } else if !candidate.contains('\0') {
            prop_assert!(outcome.is_ok());
        }
    }
}

#[test]
fn test_long_input_is_handled() {
    let deep = "a/".repeat(10_000);
    let path = validate_extract_path(Path::new(DEST), &deep).unwrap();
    assert!(path.starts_with(DEST));

    let climbing = "../".repeat(10_000);
    assert!(validate_extract_path(Path::new(DEST), &climbing).is_err());
}

#[test]
fn test_whitespace_only_is_a_plain_name() {
    let path = validate_extract_path(Path::new(DEST), "   ").unwrap();
    assert_eq!(path, Path::new("/tmp/Safe.Dest/   "));
}
