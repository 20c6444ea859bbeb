// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! The planner driver: iterates candidate normals and sweep strategies,
//! validates each generated sweep against the tracking grid and
//! accumulates the committed path. Structured as a resumable state
//! machine; every committed sweep yields control back to the host.

mod impls;
mod sweep_drill;
mod sweep_part_off;
mod sweep_planar;

use crate::{
    KerfError,
    path::{PartialPath, PathPoint, ToolParams},
    tracking::TrackingGrid,
    voxel::VoxelGrid,
};
use std::collections::HashMap;
use vector_traits::glam::Vec3A;

pub use crate::path::SweepKind;

/// String-keyed host configuration, parsed through [`Options`].
pub type ConfigType = HashMap<String, String>;

pub trait Options {
    /// Will return an option parsed as a `T` or an Err
    fn get_mandatory_parsed_option<T: std::str::FromStr>(
        &self,
        key: &str,
        default: Option<T>,
    ) -> Result<T, KerfError>;

    /// Will return an option parsed as a `T` or None.
    /// If the option is missing None is returned, if it is there but can't
    /// be parsed an error will be returned.
    fn get_parsed_option<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, KerfError>;

    /// Returns the &str value of an option, or an Err if it does not exist
    fn get_mandatory_option(&self, key: &str) -> Result<&str, KerfError>;

    /// Returns true if the option exists
    fn does_option_exist(&self, key: &str) -> Result<bool, KerfError>;
}

/// The candidate sweep normals, in the order they are tried.
pub const SWEEP_NORMALS: [Vec3A; 5] = [
    Vec3A::X,
    Vec3A::Y,
    Vec3A::NEG_X,
    Vec3A::NEG_Y,
    Vec3A::Z,
];

/// Typed planner configuration. Lengths are in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanConfig {
    /// Voxel resolution.
    pub res: f32,
    pub stock_diameter: f32,
    pub stock_length: f32,
    /// Extra stock length above the target top, included in the stock
    /// shape on top of `stock_length`.
    pub stock_top_buffer: f32,
    /// Kerf width of the part-off sweep.
    pub stock_cut_width: f32,
    /// Extra stock length below the target simulated for planning.
    pub sim_work_buffer: f32,
    /// Electrode wear ratio bound used to budget tool consumption.
    pub ewr_max: f32,
    pub tool_natural_diameter: f32,
    pub tool_natural_length: f32,
    /// Planar sweep layer thickness.
    pub feed_depth: f32,
    /// Below this z all remaining work is fixed at install.
    pub protected_z: Option<f32>,
    /// Work origin in machine coordinates.
    pub work_offset: Vec3A,
    /// Abort a sweep on any overcut instead of counting and continuing.
    pub strict: bool,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            res: 0.5,
            stock_diameter: 10.0,
            stock_length: 12.0,
            stock_top_buffer: 0.0,
            stock_cut_width: 2.0,
            sim_work_buffer: 0.0,
            ewr_max: 1.0,
            tool_natural_diameter: 3.0,
            tool_natural_length: 30.0,
            feed_depth: 1.0,
            protected_z: None,
            work_offset: Vec3A::ZERO,
            strict: true,
        }
    }
}

impl PlanConfig {
    pub fn from_options(config: &ConfigType) -> Result<Self, KerfError> {
        let defaults = Self::default();
        let rv = Self {
            res: config.get_mandatory_parsed_option("res", None)?,
            stock_diameter: config.get_mandatory_parsed_option("stock_diameter", None)?,
            stock_length: config.get_mandatory_parsed_option("stock_length", None)?,
            stock_top_buffer: config
                .get_mandatory_parsed_option("stock_top_buffer", Some(defaults.stock_top_buffer))?,
            stock_cut_width: config
                .get_mandatory_parsed_option("stock_cut_width", Some(defaults.stock_cut_width))?,
            sim_work_buffer: config
                .get_mandatory_parsed_option("sim_work_buffer", Some(defaults.sim_work_buffer))?,
            ewr_max: config.get_mandatory_parsed_option("ewr_max", Some(defaults.ewr_max))?,
            tool_natural_diameter: config.get_mandatory_parsed_option(
                "tool_natural_diameter",
                Some(defaults.tool_natural_diameter),
            )?,
            tool_natural_length: config.get_mandatory_parsed_option(
                "tool_natural_length",
                Some(defaults.tool_natural_length),
            )?,
            feed_depth: config
                .get_mandatory_parsed_option("feed_depth", Some(defaults.feed_depth))?,
            protected_z: config.get_parsed_option("protected_z")?,
            work_offset: Vec3A::new(
                config.get_mandatory_parsed_option("work_offset_x", Some(0.0f32))?,
                config.get_mandatory_parsed_option("work_offset_y", Some(0.0f32))?,
                config.get_mandatory_parsed_option("work_offset_z", Some(0.0f32))?,
            ),
            strict: config.get_mandatory_parsed_option("strict", Some(defaults.strict))?,
        };
        rv.validate()?;
        Ok(rv)
    }

    fn validate(&self) -> Result<(), KerfError> {
        for (value, what) in [
            (self.res, "res"),
            (self.stock_diameter, "stock_diameter"),
            (self.stock_length, "stock_length"),
            (self.stock_cut_width, "stock_cut_width"),
            (self.tool_natural_diameter, "tool_natural_diameter"),
            (self.tool_natural_length, "tool_natural_length"),
            (self.feed_depth, "feed_depth"),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(KerfError::InvalidParameter(format!(
                    "{what} must be positive, got {value}"
                )));
            }
        }
        if !(self.ewr_max.is_finite() && self.ewr_max >= 0.0) {
            return Err(KerfError::InvalidParameter(format!(
                "ewr_max must be nonnegative, got {}",
                self.ewr_max
            )));
        }
        Ok(())
    }

    pub fn tool_params(&self) -> ToolParams {
        ToolParams {
            natural_length: self.tool_natural_length,
            natural_diameter: self.tool_natural_diameter,
            ewr_max: self.ewr_max,
        }
    }

    /// The stock cylinder in work coordinates: the part-off kerf and the
    /// simulated work buffer sit below z=0, the rest extends upward.
    pub fn stock_shape(&self) -> Result<crate::geo::Shape, KerfError> {
        let base_z = -(self.stock_cut_width + self.sim_work_buffer);
        crate::geo::Shape::cylinder(
            Vec3A::new(0.0, 0.0, base_z),
            Vec3A::Z,
            self.stock_diameter * 0.5,
            self.stock_length + self.stock_top_buffer,
        )
    }
}

/// Everything a sweep generator needs to know about the planner state.
pub(crate) struct SweepContext<'a> {
    pub(crate) tracking: &'a TrackingGrid,
    pub(crate) cfg: &'a PlanConfig,
    pub(crate) sweep_index: u32,
    pub(crate) tool_index: u32,
    pub(crate) tool_length: f32,
}

/// A generated but not yet committed sweep.
pub(crate) struct SweepCut {
    pub(crate) path: PartialPath,
    pub(crate) allow_overcut: bool,
}

/// Bookkeeping of one committed sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRecord {
    pub sweep_index: u32,
    pub kind: SweepKind,
    pub normal: Vec3A,
    pub volume: f32,
    pub tool_changes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// One sweep was committed; the host may inspect the observables.
    Yielded,
    /// No further sweep can be found.
    Done,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Planar { normal_idx: usize, offset: f32 },
    Drill { normal_idx: usize },
    PartOff,
    Done,
}

/// Errors that abort the current sweep candidate only; the driver then
/// moves on to the next one.
fn aborts_sweep(e: &KerfError) -> bool {
    matches!(
        e,
        KerfError::InvalidShape(_)
            | KerfError::GridMismatch(_)
            | KerfError::Overcut(_)
            | KerfError::ImpossibleMinToolLength(_)
    )
}

pub struct Planner {
    cfg: PlanConfig,
    tracking: TrackingGrid,
    tool_index: u32,
    tool_length: f32,
    num_sweeps: u32,
    plan: Vec<PathPoint>,
    sweeps: Vec<SweepRecord>,
    removed_vol: f32,
    remaining_vol: f32,
    deviation: f32,
    phase: Phase,
}

impl Planner {
    /// Install the tracking grid from a work and a target classification
    /// grid and prime the sweep schedule.
    pub fn install(
        work: &VoxelGrid<u8>,
        target: &VoxelGrid<u8>,
        cfg: PlanConfig,
    ) -> Result<Self, KerfError> {
        cfg.validate()?;
        let mut tracking = TrackingGrid::set_from_work_and_target(work, target)?;
        if let Some(z) = cfg.protected_z {
            tracking.set_protected_work_below_z(z)?;
        }
        let remaining_vol = tracking.remaining_work_vol();
        let deviation = tracking
            .extract_work_with_deviation(true)
            .max_value()
            .unwrap_or(0.0)
            .max(0.0);
        let offset = tracking.query_work_offset(SWEEP_NORMALS[0]);
        Ok(Self {
            cfg,
            tracking,
            tool_index: 0,
            tool_length: cfg.tool_natural_length,
            num_sweeps: 0,
            plan: Vec::new(),
            sweeps: Vec::new(),
            removed_vol: 0.0,
            remaining_vol,
            deviation,
            phase: Phase::Planar {
                normal_idx: 0,
                offset,
            },
        })
    }

    fn context(&self) -> SweepContext<'_> {
        SweepContext {
            tracking: &self.tracking,
            cfg: &self.cfg,
            sweep_index: self.num_sweeps,
            tool_index: self.tool_index,
            tool_length: self.tool_length,
        }
    }

    /// Validate and commit one generated sweep. A sweep that removes
    /// nothing is rejected without advancing the sweep counter.
    fn try_commit(&mut self, cut: SweepCut) -> Result<bool, KerfError> {
        let SweepCut {
            path,
            allow_overcut,
        } = cut;
        let volume = self.tracking.commit_removal(
            path.min_shapes(),
            path.max_shapes(),
            allow_overcut,
            self.cfg.strict,
        )?;
        if volume <= 0.0 {
            return Ok(false);
        }
        self.num_sweeps += 1;
        self.removed_vol += volume;
        self.tool_index = path.tool_index();
        self.tool_length = path.tool_length();
        self.sweeps.push(SweepRecord {
            sweep_index: path.sweep_index(),
            kind: path.group(),
            normal: path.normal(),
            volume,
            tool_changes: path.tool_changes(),
        });
        log::debug!(
            "committed sweep {} ({:?}), removed {volume} mm^3",
            path.sweep_index(),
            path.group()
        );
        self.plan.extend(path.into_points());
        self.deviation = self
            .tracking
            .extract_work_with_deviation(true)
            .max_value()
            .unwrap_or(0.0)
            .max(0.0);
        self.remaining_vol = self.tracking.remaining_work_vol();
        Ok(true)
    }

    /// Advance the planner by at most one committed sweep.
    pub fn step(&mut self) -> Result<StepStatus, KerfError> {
        loop {
            match self.phase {
                Phase::Planar { normal_idx, offset } => {
                    if normal_idx >= SWEEP_NORMALS.len() {
                        self.phase = Phase::Drill { normal_idx: 0 };
                        continue;
                    }
                    let normal = SWEEP_NORMALS[normal_idx];
                    let generated = sweep_planar::generate(
                        &self.context(),
                        normal,
                        offset,
                        self.cfg.tool_natural_diameter,
                    );
                    match generated {
                        Ok(None) => {
                            let next_idx = normal_idx + 1;
                            let next_offset = if next_idx < SWEEP_NORMALS.len() {
                                self.tracking.query_work_offset(SWEEP_NORMALS[next_idx])
                            } else {
                                f32::NEG_INFINITY
                            };
                            self.phase = Phase::Planar {
                                normal_idx: next_idx,
                                offset: next_offset,
                            };
                        }
                        Ok(Some(cut)) => {
                            self.phase = Phase::Planar {
                                normal_idx,
                                offset: offset - self.cfg.feed_depth,
                            };
                            match self.try_commit(cut) {
                                Ok(true) => return Ok(StepStatus::Yielded),
                                Ok(false) => {}
                                Err(e) if aborts_sweep(&e) => {
                                    log::warn!("planar sweep aborted: {e}");
                                }
                                Err(e) => return Err(e),
                            }
                        }
                        Err(e) if aborts_sweep(&e) => {
                            log::warn!("planar sweep aborted: {e}");
                            self.phase = Phase::Planar {
                                normal_idx,
                                offset: offset - self.cfg.feed_depth,
                            };
                        }
                        Err(e) => return Err(e),
                    }
                }
                Phase::Drill { normal_idx } => {
                    if normal_idx >= SWEEP_NORMALS.len() {
                        self.phase = Phase::PartOff;
                        continue;
                    }
                    self.phase = Phase::Drill {
                        normal_idx: normal_idx + 1,
                    };
                    let normal = SWEEP_NORMALS[normal_idx];
                    let generated = sweep_drill::generate(
                        &self.context(),
                        normal,
                        self.cfg.tool_natural_diameter / 4.0,
                    );
                    match generated {
                        Ok(None) => {}
                        Ok(Some(cut)) => match self.try_commit(cut) {
                            Ok(true) => return Ok(StepStatus::Yielded),
                            Ok(false) => {}
                            Err(e) if aborts_sweep(&e) => {
                                log::warn!("drill sweep aborted: {e}");
                            }
                            Err(e) => return Err(e),
                        },
                        Err(e) if aborts_sweep(&e) => {
                            log::warn!("drill sweep aborted: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Phase::PartOff => {
                    self.phase = Phase::Done;
                    let generated = sweep_part_off::generate(&self.context());
                    match generated {
                        Ok(None) => {}
                        Ok(Some(cut)) => match self.try_commit(cut) {
                            Ok(true) => return Ok(StepStatus::Yielded),
                            Ok(false) => {}
                            Err(e) if aborts_sweep(&e) => {
                                log::warn!("part-off sweep aborted: {e}");
                            }
                            Err(e) => return Err(e),
                        },
                        Err(e) if aborts_sweep(&e) => {
                            log::warn!("part-off sweep aborted: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Phase::Done => return Ok(StepStatus::Done),
            }
        }
    }

    /// Keep stepping until no more sweeps can be found.
    pub fn run_to_completion(&mut self) -> Result<(), KerfError> {
        while self.step()? == StepStatus::Yielded {}
        Ok(())
    }

    #[inline]
    pub fn num_sweeps(&self) -> u32 {
        self.num_sweeps
    }

    #[inline]
    pub fn removed_vol(&self) -> f32 {
        self.removed_vol
    }

    #[inline]
    pub fn remaining_vol(&self) -> f32 {
        self.remaining_vol
    }

    #[inline]
    pub fn deviation(&self) -> f32 {
        self.deviation
    }

    #[inline]
    pub fn plan(&self) -> &[PathPoint] {
        &self.plan
    }

    #[inline]
    pub fn sweeps(&self) -> &[SweepRecord] {
        &self.sweeps
    }

    #[inline]
    pub fn tool_index(&self) -> u32 {
        self.tool_index
    }

    #[inline]
    pub fn tool_length(&self) -> f32 {
        self.tool_length
    }

    #[inline]
    pub fn tracking(&self) -> &TrackingGrid {
        &self.tracking
    }
}
