// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Part-off sweep: one thin horizontal kerf just below the work origin
//! that separates the finished piece from the remaining stock. The final
//! cut is allowed to touch the target, so it commits with overcut
//! permission.

use crate::{
    KerfError,
    geo::Shape,
    path::{MoveKind, PartialPath, SweepKind},
    planner::{SweepContext, SweepCut},
};
use vector_traits::glam::Vec3A;

pub(crate) fn generate(ctx: &SweepContext<'_>) -> Result<Option<SweepCut>, KerfError> {
    let tracking = ctx.tracking;
    let cfg = ctx.cfg;
    let layout = *tracking.layout();
    let res = layout.res;

    let ct_min = tracking.query_work_offset(Vec3A::NEG_Y);
    let ct_max = tracking.query_work_offset(Vec3A::Y);
    let nr_min = tracking.query_work_offset(Vec3A::NEG_X);
    let nr_max = tracking.query_work_offset(Vec3A::X);
    if ![ct_min, ct_max, nr_min, nr_max]
        .iter()
        .all(|v| v.is_finite())
    {
        return Ok(None);
    }

    let width = cfg.stock_cut_width;
    let z_kerf = -width * 0.5;
    let normal = Vec3A::X;
    // the horizontal tool must span the whole measured stock width
    let span = nr_min + nr_max;

    let mut path = PartialPath::new(
        ctx.sweep_index,
        SweepKind::PartOff,
        normal,
        span + 4.0 * res,
        span + 4.0 * res,
        ctx.tool_index,
        ctx.tool_length,
        &cfg.tool_params(),
        cfg.work_offset,
    )?;

    let start = Vec3A::new(0.0, -ct_min, z_kerf);
    let end = Vec3A::new(0.0, ct_max, z_kerf);
    path.non_remove(MoveKind::MoveIn, start)?;
    path.remove_horizontal(end, None, 0.0, 0.0)?;
    path.non_remove(MoveKind::MoveOut, end)?;

    // One kerf envelope serves as both min and max cut: padded by a half
    // diagonal so the cells whose centers fall inside the unpadded kerf
    // are committed, and stretched past the measured work on every side.
    let hd = layout.half_cell_diag();
    let x_lo = -nr_min - 2.0 * res;
    let kerf = Shape::elh(
        Vec3A::new(x_lo, -ct_min - width, z_kerf),
        Vec3A::new(x_lo, ct_max + width, z_kerf),
        normal,
        width * 0.5 + hd,
        span + 4.0 * res,
    )?;
    path.add_min_remove_shape(kerf);
    path.add_max_remove_shape(kerf);

    Ok(Some(SweepCut {
        path,
        allow_overcut: true,
    }))
}
