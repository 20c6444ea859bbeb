// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Drill sweep: plunge through-holes along the sweep normal wherever a
//! slightly oversized probe cylinder finds work without grazing protected
//! material. Reaches pockets the planar sweep cannot enter.

use crate::{
    KerfError,
    geo::{self, Shape},
    path::{MoveKind, PartialPath, SweepKind},
    planner::{SweepContext, SweepCut},
};
use vector_traits::glam::Vec3A;

/// Lattice stride of the hole candidates in the plane perpendicular to
/// the sweep normal.
pub(crate) const DRILL_SCAN_RES: f32 = 0.5;

/// The probe/max envelope is this much wider than the tool: discharge
/// erosion slightly overcuts a plunged hole.
const HOLE_FACTOR: f32 = 1.1;

pub(crate) fn generate(
    ctx: &SweepContext<'_>,
    normal: Vec3A,
    tool_diameter: f32,
) -> Result<Option<SweepCut>, KerfError> {
    let tracking = ctx.tracking;
    let cfg = ctx.cfg;
    let layout = *tracking.layout();
    let res = layout.res;

    let work_hi = tracking.query_work_offset(normal);
    let work_lo_neg = tracking.query_work_offset(-normal);
    if !work_hi.is_finite() || !work_lo_neg.is_finite() {
        return Ok(None);
    }
    let work_lo = -work_lo_neg;

    let (u, v) = geo::orthonormal_basis(normal);
    let center = layout.center();
    let radius = layout.bounding_radius();
    let grid_lo = center.dot(normal) - radius;
    let hole_r = HOLE_FACTOR * tool_diameter * 0.5;
    let column_h = 2.0 * radius;

    let mut path = PartialPath::new(
        ctx.sweep_index,
        SweepKind::Drill,
        normal,
        (work_hi - work_lo) + 4.0 * res,
        column_h,
        ctx.tool_index,
        ctx.tool_length,
        &cfg.tool_params(),
        cfg.work_offset,
    )?;

    let m = (radius / DRILL_SCAN_RES).ceil() as i32;
    let mut holes = 0u32;
    for ia in -m..=m {
        for ib in -m..=m {
            let lattice_point =
                center + u * (ia as f32 * DRILL_SCAN_RES) + v * (ib as f32 * DRILL_SCAN_RES);
            let lateral = lattice_point - normal * lattice_point.dot(normal);
            // the probe spans the whole grid: a hole is only admissible
            // when it can pass clean through
            let probe = Shape::cylinder(lateral + normal * grid_lo, normal, hole_r, column_h)?;
            if !tracking.query_has_work(&probe) || tracking.query_blocked(&probe) {
                continue;
            }
            let above = lateral + normal * (work_hi + 2.0 * res);
            let bottom = lateral + normal * (work_lo - 2.0 * res);
            path.non_remove(MoveKind::MoveIn, above)?;
            path.remove_vertical(bottom, None, 2.0 * hole_r, tool_diameter)?;
            path.non_remove(MoveKind::MoveOut, above)?;
            holes += 1;
        }
    }

    if holes == 0 {
        return Ok(None);
    }
    log::debug!("drill sweep along {normal:?}: {holes} holes");
    Ok(Some(SweepCut {
        path,
        allow_overcut: false,
    }))
}
