// THEORY:
// This file is the main entry point for the `screendiff` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (the HTTP server and the
// command-line tester).
//
// The primary goal is to export `compute_diff` and its associated data
// structures (`DiffRequest`, `DiffArtifact`, `DiffStatistics`, `RenderMode`) as
// the clean, high-level interface of the engine. The individual stages live in
// `core_modules` and stay public for callers that want to drive them one by one.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{DiffError, DiffErrorKind, ValidationIssue};
pub use pipeline::{
    ARTIFACT_TIMESTAMP_FORMAT, DEFAULT_THRESHOLD_PERCENT, DiffArtifact, DiffRequest,
    DiffStatistics, RenderMode, artifact_file_name, compute_diff, compute_diff_images,
};
