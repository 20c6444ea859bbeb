// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Path points and the per-sweep path builder.
//!
//! A `PartialPath` collects the tool motions of one sweep together with
//! the min-cut/max-cut envelopes those motions imply, and keeps the tool
//! wear bookkeeping honest: when the remaining tool is too short it either
//! grinds off the consumed tip or swaps in a fresh tool.

#[cfg(test)]
mod tests;

use crate::{
    KerfError,
    geo::Shape,
    kinematics::{AxisValues, solve_ik},
};
use smallvec::SmallVec;
use vector_traits::glam::Vec3A;

/// Direction tolerance for the horizontal/vertical move invariants.
const MOVE_EPSILON: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Rapid positioning move toward the work.
    MoveIn,
    /// Rapid retract away from the work.
    MoveOut,
    /// Feed move that erodes workpiece material.
    RemoveWork,
    /// Tool refresh: grinding off the worn tip, or a full tool change.
    RemoveTool,
}

/// Which generator produced a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Planar,
    Drill,
    PartOff,
}

/// One fully resolved tool pose. Constructed at sweep time, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub tip_pos_work: Vec3A,
    pub tip_pos_machine: Vec3A,
    pub tip_normal_work: Vec3A,
    pub axis: AxisValues,
    pub kind: MoveKind,
    pub sweep_index: u32,
    /// Tool rotation applied during the move, radians.
    pub tool_rot_delta: Option<f32>,
    /// Tool length ground off during the move; `None` on a `RemoveTool`
    /// point means a full tool change.
    pub grind_delta: Option<f32>,
}

/// Fixed tool parameters of the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolParams {
    pub natural_length: f32,
    pub natural_diameter: f32,
    /// Electrode wear ratio: tool volume consumed per work volume removed.
    pub ewr_max: f32,
}

pub struct PartialPath {
    sweep_index: u32,
    group: SweepKind,
    normal: Vec3A,
    min_tool_length: f32,
    /// Extrusion height for swept-tool envelopes, large enough to cover
    /// the shaft column over the whole grid.
    column_h: f32,
    tool_index: u32,
    tool_length: f32,
    natural_length: f32,
    work_offset: Vec3A,
    prev_tip_pos: Option<Vec3A>,
    points: Vec<PathPoint>,
    min_shapes: SmallVec<[Shape; 8]>,
    max_shapes: SmallVec<[Shape; 8]>,
    tool_changes: u32,
}

impl PartialPath {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sweep_index: u32,
        group: SweepKind,
        normal: Vec3A,
        min_tool_length: f32,
        column_h: f32,
        tool_index: u32,
        tool_length: f32,
        tool: &ToolParams,
        work_offset: Vec3A,
    ) -> Result<Self, KerfError> {
        if tool.natural_length < min_tool_length {
            return Err(KerfError::ImpossibleMinToolLength(format!(
                "sweep needs {} of tool, natural length is only {}",
                min_tool_length, tool.natural_length
            )));
        }
        let mut path = Self {
            sweep_index,
            group,
            normal,
            min_tool_length,
            column_h,
            tool_index,
            tool_length,
            natural_length: tool.natural_length,
            work_offset,
            prev_tip_pos: None,
            points: Vec::new(),
            min_shapes: SmallVec::new(),
            max_shapes: SmallVec::new(),
            tool_changes: 0,
        };
        if path.tool_length < path.min_tool_length {
            // worn leftover from the previous sweep, swap before starting
            path.tool_index += 1;
            path.tool_length = path.natural_length;
            path.tool_changes += 1;
        }
        Ok(path)
    }

    fn push_point(
        &mut self,
        kind: MoveKind,
        tip: Vec3A,
        tool_rot_delta: Option<f32>,
        grind_delta: Option<f32>,
    ) {
        let solution = solve_ik(tip, self.normal, self.tool_length, false, self.work_offset);
        self.points.push(PathPoint {
            tip_pos_work: solution.tip_pos_work,
            tip_pos_machine: solution.tip_pos_machine,
            tip_normal_work: self.normal,
            axis: solution.axis,
            kind,
            sweep_index: self.sweep_index,
            tool_rot_delta,
            grind_delta,
        });
    }

    /// Append a positioning move; contributes no cut geometry.
    pub fn non_remove(&mut self, kind: MoveKind, tip: Vec3A) -> Result<(), KerfError> {
        if !matches!(kind, MoveKind::MoveIn | MoveKind::MoveOut) {
            return Err(KerfError::InvalidParameter(format!(
                "non_remove only accepts positioning moves, got {kind:?}"
            )));
        }
        self.push_point(kind, tip, None, None);
        self.prev_tip_pos = Some(tip);
        Ok(())
    }

    /// Append a cutting move perpendicular to the sweep normal. The swept
    /// volume is an extruded long hole from the previous tip to this one.
    pub fn remove_horizontal(
        &mut self,
        tip: Vec3A,
        tool_rot_delta: Option<f32>,
        max_diameter: f32,
        min_diameter: f32,
    ) -> Result<(), KerfError> {
        let prev = self.prev_tip_pos.ok_or_else(|| {
            KerfError::InvalidParameter(
                "a horizontal remove needs a preceding positioning move".to_string(),
            )
        })?;
        let delta = tip - prev;
        if delta.dot(self.normal).abs() > MOVE_EPSILON * (1.0 + delta.length()) {
            return Err(KerfError::InvalidParameter(format!(
                "horizontal remove must stay in the cut plane, drift={}",
                delta.dot(self.normal)
            )));
        }
        // squash float drift so the envelope constructor sees an exactly
        // perpendicular segment
        let planar_tip = prev + (delta - self.normal * delta.dot(self.normal));
        if min_diameter > 0.0 {
            self.min_shapes.push(Shape::elh(
                prev,
                planar_tip,
                self.normal,
                min_diameter * 0.5,
                self.column_h,
            )?);
        }
        if max_diameter > 0.0 {
            self.max_shapes.push(Shape::elh(
                prev,
                planar_tip,
                self.normal,
                max_diameter * 0.5,
                self.column_h,
            )?);
        }
        self.push_point(MoveKind::RemoveWork, tip, tool_rot_delta, None);
        self.prev_tip_pos = Some(tip);
        Ok(())
    }

    /// Append a plunge cut parallel to the sweep normal. The swept volume
    /// is a cylinder from the deepest tip position up along the normal.
    pub fn remove_vertical(
        &mut self,
        tip: Vec3A,
        tool_rot_delta: Option<f32>,
        max_diameter: f32,
        min_diameter: f32,
    ) -> Result<(), KerfError> {
        let prev = self.prev_tip_pos.ok_or_else(|| {
            KerfError::InvalidParameter(
                "a vertical remove needs a preceding positioning move".to_string(),
            )
        })?;
        let delta = tip - prev;
        if delta.cross(self.normal).length() > MOVE_EPSILON * (1.0 + delta.length()) {
            return Err(KerfError::InvalidParameter(format!(
                "vertical remove must follow the sweep normal, lateral drift={}",
                delta.cross(self.normal).length()
            )));
        }
        let base = if delta.dot(self.normal) < 0.0 { tip } else { prev };
        if min_diameter > 0.0 {
            self.min_shapes.push(Shape::cylinder(
                base,
                self.normal,
                min_diameter * 0.5,
                self.column_h,
            )?);
        }
        if max_diameter > 0.0 {
            self.max_shapes.push(Shape::cylinder(
                base,
                self.normal,
                max_diameter * 0.5,
                self.column_h,
            )?);
        }
        self.push_point(MoveKind::RemoveWork, tip, tool_rot_delta, None);
        self.prev_tip_pos = Some(tip);
        Ok(())
    }

    /// Attribute a min-cut shape that cannot be assigned to a single
    /// remove call, like the slab a repeated scan is guaranteed to clear.
    pub fn add_min_remove_shape(&mut self, shape: Shape) {
        self.min_shapes.push(shape);
    }

    /// Attribute an extra max-cut shape; every min shape must stay inside
    /// the union of these.
    pub fn add_max_remove_shape(&mut self, shape: Shape) {
        self.max_shapes.push(shape);
    }

    /// Grind `length` off the worn tool tip, or swap in a fresh tool when
    /// not enough usable length would remain. The emitted `RemoveTool`
    /// point carries the ground length, or `None` for a full change.
    pub fn discard_tool_tip(&mut self, length: f32) {
        let tip = self.prev_tip_pos.unwrap_or(Vec3A::ZERO);
        if self.tool_length - length < self.min_tool_length {
            self.tool_index += 1;
            self.tool_length = self.natural_length;
            self.tool_changes += 1;
            self.push_point(MoveKind::RemoveTool, tip, None, None);
        } else {
            self.tool_length -= length;
            self.push_point(MoveKind::RemoveTool, tip, None, Some(length));
        }
    }

    #[inline]
    pub fn sweep_index(&self) -> u32 {
        self.sweep_index
    }

    #[inline]
    pub fn group(&self) -> SweepKind {
        self.group
    }

    #[inline]
    pub fn normal(&self) -> Vec3A {
        self.normal
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
    pub fn tool_changes(&self) -> u32 {
        self.tool_changes
    }

    #[inline]
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    #[inline]
    pub fn min_shapes(&self) -> &[Shape] {
        &self.min_shapes
    }

    #[inline]
    pub fn max_shapes(&self) -> &[Shape] {
        &self.max_shapes
    }

    /// True if the sweep contains at least one cutting move.
    pub fn has_removal(&self) -> bool {
        self.points
            .iter()
            .any(|p| p.kind == MoveKind::RemoveWork)
    }

    pub fn into_points(self) -> Vec<PathPoint> {
        self.points
    }
}
