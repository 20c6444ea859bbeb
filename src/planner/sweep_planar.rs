// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Planar sweep: remove one layer of work below a cutting plane.
//!
//! The layer disk is tessellated into rows of short segments, each segment
//! is classified by the tracking grid, and a greedy cover picks straight
//! scans over the workable segments. Every scan is repeated often enough
//! to stay inside the electrode wear budget, grinding off the worn tool
//! tip whenever the budget is consumed.

use crate::{
    KerfError,
    geo::{self, Shape},
    path::{MoveKind, PartialPath, SweepKind},
    planner::{SweepContext, SweepCut},
};
use vector_traits::glam::Vec3A;

/// Tessellation step along the feed direction.
pub(crate) const SEGMENT_LENGTH: f32 = 1.0;

/// Greedy-cover penalty per mm of scan length, in covered-segment units.
const SCAN_LENGTH_PENALTY: f32 = 0.05;

/// Fraction of the tool cross section that may wear away before the tip
/// is ground back to its pristine shape.
const TOOL_KEEP_FRACTION: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegState {
    /// The tool column above this segment would graze protected material.
    Blocked,
    /// The feed-depth slab at this segment still holds removable material.
    Work,
    Empty,
}

struct ScanCandidate {
    lo: usize,
    hi: usize,
    /// Travel direction: from `hi` down to `lo` when set.
    reversed: bool,
    /// `Work` segment indices this scan passes over.
    covered: Vec<usize>,
}

#[inline]
fn segment_center(row_origin: Vec3A, feed_dir: Vec3A, seg_half: i32, k: usize) -> Vec3A {
    row_origin + feed_dir * ((k as i32 - seg_half) as f32 * SEGMENT_LENGTH)
}

/// Candidate scans of one row: start anywhere the tool can plunge (only
/// empty segments within the tool radius) and extend while no blocked
/// segment comes within the tool radius of the advancing end.
fn scan_candidates(states: &[SegState], tr_cells: usize) -> Vec<ScanCandidate> {
    let n = states.len();
    let window = |k: usize| (k.saturating_sub(tr_cells), (k + tr_cells).min(n - 1));
    let mut rv = Vec::new();
    for start in 0..n {
        let (w_lo, w_hi) = window(start);
        if (w_lo..=w_hi).any(|i| states[i] != SegState::Empty) {
            continue;
        }
        for dir in [1i32, -1] {
            let mut end = start;
            loop {
                let next = end as i32 + dir;
                if next < 0 || next >= n as i32 {
                    break;
                }
                let (b_lo, b_hi) = window(next as usize);
                if (b_lo..=b_hi).any(|i| states[i] == SegState::Blocked) {
                    break;
                }
                end = next as usize;
            }
            if end == start {
                continue;
            }
            let (lo, hi) = if dir > 0 { (start, end) } else { (end, start) };
            let covered: Vec<usize> =
                (lo..=hi).filter(|&i| states[i] == SegState::Work).collect();
            if covered.is_empty() {
                continue;
            }
            rv.push(ScanCandidate {
                lo,
                hi,
                reversed: dir < 0,
                covered,
            });
        }
    }
    rv
}

/// Repeatedly pick the scan covering the most still-unsatisfied work,
/// with a small penalty on scan length.
fn greedy_cover<'a>(
    states: &[SegState],
    candidates: &'a [ScanCandidate],
) -> Vec<&'a ScanCandidate> {
    let mut uncovered: Vec<bool> = states.iter().map(|&s| s == SegState::Work).collect();
    let mut chosen = Vec::new();
    loop {
        let mut best: Option<(&ScanCandidate, f32)> = None;
        for candidate in candidates {
            let fresh = candidate
                .covered
                .iter()
                .filter(|&&i| uncovered[i])
                .count();
            if fresh == 0 {
                continue;
            }
            let len_mm = (candidate.hi - candidate.lo) as f32 * SEGMENT_LENGTH;
            let gain = fresh as f32 - SCAN_LENGTH_PENALTY * len_mm;
            if gain <= 0.0 {
                continue;
            }
            if best.is_none_or(|(_, g)| gain > g) {
                best = Some((candidate, gain));
            }
        }
        match best {
            Some((candidate, _)) => {
                for &i in &candidate.covered {
                    uncovered[i] = false;
                }
                chosen.push(candidate);
            }
            None => break,
        }
    }
    chosen
}

pub(crate) fn generate(
    ctx: &SweepContext<'_>,
    normal: Vec3A,
    offset: f32,
    tool_diameter: f32,
) -> Result<Option<SweepCut>, KerfError> {
    if !offset.is_finite() {
        return Ok(None);
    }
    let tracking = ctx.tracking;
    let cfg = ctx.cfg;
    let layout = *tracking.layout();
    let res = layout.res;
    if tool_diameter <= res || tool_diameter < SEGMENT_LENGTH {
        // the row stride and segment cover assume a tool wider than both
        return Ok(None);
    }
    if tracking.query_work_offset(normal) < offset {
        return Ok(None);
    }

    let (feed_dir, row_dir) = geo::orthonormal_basis(normal);
    let sphere_center = layout.center();
    let radius = layout.bounding_radius();
    let feed_depth = cfg.feed_depth;
    let tool_radius = tool_diameter * 0.5;
    // one voxel of row overlap prevents undercut ridges between rows
    let feed_width = tool_diameter - res;
    let plane_h = offset - feed_depth;
    let disk_center = sphere_center + normal * (plane_h - sphere_center.dot(normal));
    let column_h = 2.0 * radius;
    let discard_len = feed_depth + 2.0 * res;
    let tool_area = std::f32::consts::PI * tool_radius * tool_radius;

    let mut path = PartialPath::new(
        ctx.sweep_index,
        SweepKind::Planar,
        normal,
        feed_depth + 2.0 * res,
        column_h,
        ctx.tool_index,
        ctx.tool_length,
        &cfg.tool_params(),
        cfg.work_offset,
    )?;

    let row_half = (radius / feed_width).ceil() as i32;
    let seg_half = (radius / SEGMENT_LENGTH).ceil() as i32;
    let n_seg = (2 * seg_half + 1) as usize;
    let tr_cells = (tool_radius / SEGMENT_LENGTH).ceil() as usize;

    let mut consumed_area = 0.0f32;
    let mut emitted = false;

    for row in -row_half..=row_half {
        let row_origin = disk_center + row_dir * (row as f32 * feed_width);

        let mut states = vec![SegState::Empty; n_seg];
        let mut any_work = false;
        for (k, state) in states.iter_mut().enumerate() {
            let center = segment_center(row_origin, feed_dir, seg_half, k);
            // the guard widens and lowers the tool column a little so the
            // blocked test strictly dominates the commit-time overcut
            // band, including the lens between two segment centers
            let guard = 0.25 * res;
            let column = Shape::cylinder(
                center - normal * guard,
                normal,
                tool_radius + guard,
                column_h + guard,
            )?;
            if tracking.query_blocked(&column) {
                *state = SegState::Blocked;
            } else {
                let slab = Shape::cylinder(center, normal, tool_radius, feed_depth)?;
                if tracking.query_has_work(&slab) {
                    *state = SegState::Work;
                    any_work = true;
                }
            }
        }
        if !any_work {
            continue;
        }

        let candidates = scan_candidates(&states, tr_cells);
        for scan in greedy_cover(&states, &candidates) {
            let (k0, k1) = if scan.reversed {
                (scan.hi, scan.lo)
            } else {
                (scan.lo, scan.hi)
            };
            let p0 = segment_center(row_origin, feed_dir, seg_half, k0);
            let p1 = segment_center(row_origin, feed_dir, seg_half, k1);
            let above = normal * (feed_depth + 2.0 * res);
            let travel = (scan.hi - scan.lo) as f32 * SEGMENT_LENGTH;
            let work_area = (travel + SEGMENT_LENGTH) * feed_depth;
            let num_scans = (work_area * cfg.ewr_max / tool_area + 0.6).ceil().max(1.0) as usize;
            let per_repeat = work_area * cfg.ewr_max / num_scans as f32;

            for repeat in 0..num_scans {
                path.non_remove(MoveKind::MoveIn, p0 + above)?;
                path.non_remove(MoveKind::MoveIn, p0)?;
                let max_d = if repeat == 0 { tool_diameter } else { 0.0 };
                path.remove_horizontal(p1, None, max_d, 0.0)?;
                path.non_remove(MoveKind::MoveOut, p1 + above)?;
                consumed_area += per_repeat;
                if consumed_area >= TOOL_KEEP_FRACTION * tool_area {
                    path.discard_tool_tip(discard_len);
                    consumed_area = 0.0;
                }
            }

            // the repeated scans are guaranteed to have cleared this slab,
            // reaching one layer up into the already cleared region
            let mid = (p0 + p1) * 0.5 + normal * (discard_len * 0.5);
            path.add_min_remove_shape(Shape::oriented_box(
                mid,
                feed_dir * ((travel + SEGMENT_LENGTH) * 0.5),
                row_dir * tool_radius,
                normal * (discard_len * 0.5),
            )?);
            emitted = true;
        }
    }

    if !emitted {
        return Ok(None);
    }
    if consumed_area > 0.0 {
        // restore a pristine tip so the next sweep starts clean
        path.discard_tool_tip(discard_len);
    }
    Ok(Some(SweepCut {
        path,
        allow_overcut: false,
    }))
}
