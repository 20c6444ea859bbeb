// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

#![deny(
    rust_2018_compatibility,
    rust_2018_idioms,
    nonstandard_style,
    unused,
    future_incompatible,
    non_camel_case_types,
    unused_parens,
    non_upper_case_globals,
    unused_qualifications,
    unused_results,
    unused_imports,
    unused_variables,
    bare_trait_objects,
    ellipsis_inclusive_range_patterns,
    elided_lifetimes_in_paths
)]
#![warn(clippy::explicit_into_iter_loop)]

//! Sweep planner for an EDM-style rotary grinder.
//!
//! The crate turns a voxelized stock/target pair into an ordered list of
//! tool poses: a tracking grid accounts for every voxel's target class and
//! work status, SDF shapes describe what each tool motion can and must
//! remove, and the planner commits sweeps against the grid until no more
//! work can be reached.

pub mod geo;
pub mod kinematics;
pub mod path;
pub mod planner;
pub mod tracking;
pub mod voxel;

pub mod prelude {
    pub use crate::KerfError;
    pub use crate::geo::Shape;
    pub use crate::kinematics::{AxisValues, IkSolution, solve_ik};
    pub use crate::path::{MoveKind, PartialPath, PathPoint, ToolParams};
    pub use crate::planner::{ConfigType, Options, PlanConfig, Planner, StepStatus, SweepKind};
    pub use crate::tracking::{CellState, TrackingGrid};
    pub use crate::voxel::{Boundary, GridLayout, VoxelGrid};
}

#[derive(thiserror::Error, Debug)]
pub enum KerfError {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Grid geometry mismatch: {0}")]
    GridMismatch(String),

    #[error("Target is not reachable from this stock: {0}")]
    UnreachableTarget(String),

    #[error("Min-cut envelope escapes the max-cut envelope: {0}")]
    MinMaxReversal(String),

    #[error("Max-cut envelope overlaps protected material: {0}")]
    Overcut(String),

    #[error("Sweep requires more than the natural tool length: {0}")]
    ImpossibleMinToolLength(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),
}
