// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! The tracking grid: per-cell target classification crossed with work
//! status, the shape queries the sweep generators plan against, and the
//! commit that turns a sweep's envelopes into accounted removal.

#[cfg(test)]
mod tests;

use crate::{
    KerfError,
    geo::Shape,
    voxel::{Boundary, CLASS_EMPTY, CLASS_FULL, CLASS_PARTIAL, GridLayout, VoxelGrid},
};
use rayon::prelude::*;
use vector_traits::glam::Vec3A;

/// Extra repetitions of the jump-flood pass schedule. One axis step per
/// pass can serve only one axis of a diagonal offset; three rounds cover
/// every per-axis binary decomposition.
const JUMP_FLOOD_ROUNDS: u32 = 3;

const AXIS_NEIGHBORS: [(i64, i64, i64); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    Empty,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    Done,
    Remaining,
}

/// The five representable combinations. Full cells are always done: a
/// "full and remaining" cell would mean material that both must stay and
/// must go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    FullDone,
    EmptyDone,
    EmptyRemaining,
    PartialDone,
    PartialRemaining,
}

fn classify(v: u8, what: &str, idx: usize) -> Result<TargetClass, KerfError> {
    match v {
        CLASS_EMPTY => Ok(TargetClass::Empty),
        CLASS_PARTIAL => Ok(TargetClass::Partial),
        CLASS_FULL => Ok(TargetClass::Full),
        other => Err(KerfError::InvalidParameter(format!(
            "{what} grid holds non-classification value {other} at cell {idx}"
        ))),
    }
}

fn bit_grid(len: usize) -> vob::Vob<u32> {
    let mut v: vob::Vob<u32> = vob::Vob::new_with_storage_type(0);
    v.resize(len, false);
    v
}

pub struct TrackingGrid {
    layout: GridLayout,
    classes: Vec<TargetClass>,
    status: Vec<WorkStatus>,
    protected: vob::Vob<u32>,
    protected_applied: bool,
}

impl TrackingGrid {
    /// Install from a work grid (what material is there) and a target grid
    /// (what material must remain). Work must dominate target cellwise,
    /// otherwise the target cannot be manufactured from this stock.
    pub fn set_from_work_and_target(
        work: &VoxelGrid<u8>,
        target: &VoxelGrid<u8>,
    ) -> Result<Self, KerfError> {
        work.layout().ensure_compatible(target.layout())?;
        let layout = *work.layout();
        let len = layout.len();
        let mut classes = Vec::with_capacity(len);
        let mut status = Vec::with_capacity(len);
        for idx in 0..len {
            let t = classify(target.data()[idx], "target", idx)?;
            let w = classify(work.data()[idx], "work", idx)?;
            let (class, stat) = match (t, w) {
                (TargetClass::Empty, TargetClass::Empty) => {
                    (TargetClass::Empty, WorkStatus::Done)
                }
                (TargetClass::Empty, _) => (TargetClass::Empty, WorkStatus::Remaining),
                (TargetClass::Partial, TargetClass::Full) => {
                    (TargetClass::Partial, WorkStatus::Remaining)
                }
                // boundary voxel already at its final state
                (TargetClass::Partial, TargetClass::Partial) => {
                    (TargetClass::Partial, WorkStatus::Done)
                }
                (TargetClass::Full, TargetClass::Full) => {
                    (TargetClass::Full, WorkStatus::Done)
                }
                (t, w) => {
                    let (ix, iy, iz) = layout.delinearize(idx);
                    return Err(KerfError::UnreachableTarget(format!(
                        "cell ({ix},{iy},{iz}) wants target {t:?} but the stock only provides {w:?}"
                    )));
                }
            };
            classes.push(class);
            status.push(stat);
        }
        Ok(Self {
            layout,
            classes,
            status,
            protected: bit_grid(len),
            protected_applied: false,
        })
    }

    /// Promote all remaining empty cells below `z` to full/done: stock that
    /// is kept for a later session and must not be cut in this one. May be
    /// called at most once, right after install.
    pub fn set_protected_work_below_z(&mut self, z: f32) -> Result<(), KerfError> {
        if self.protected_applied {
            return Err(KerfError::InvalidParameter(
                "the protected floor may only be set once".to_string(),
            ));
        }
        self.protected_applied = true;
        for idx in 0..self.layout.len() {
            let (ix, iy, iz) = self.layout.delinearize(idx);
            if self.layout.cell_center(ix, iy, iz).z < z
                && self.classes[idx] == TargetClass::Empty
                && self.status[idx] == WorkStatus::Remaining
            {
                self.classes[idx] = TargetClass::Full;
                self.status[idx] = WorkStatus::Done;
                let _ = self.protected.set(idx, true);
            }
        }
        Ok(())
    }

    #[inline]
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[inline]
    pub fn state_at(&self, ix: u32, iy: u32, iz: u32) -> CellState {
        self.state(self.layout.index(ix, iy, iz))
    }

    #[inline]
    fn state(&self, idx: usize) -> CellState {
        match (self.classes[idx], self.status[idx]) {
            (TargetClass::Full, _) => CellState::FullDone,
            (TargetClass::Empty, WorkStatus::Done) => CellState::EmptyDone,
            (TargetClass::Empty, WorkStatus::Remaining) => CellState::EmptyRemaining,
            (TargetClass::Partial, WorkStatus::Done) => CellState::PartialDone,
            (TargetClass::Partial, WorkStatus::Remaining) => CellState::PartialRemaining,
        }
    }

    pub fn count_state(&self, state: CellState) -> usize {
        (0..self.layout.len())
            .filter(|&idx| self.state(idx) == state)
            .count()
    }

    #[inline]
    pub fn is_protected(&self, ix: u32, iy: u32, iz: u32) -> bool {
        self.protected
            .get(self.layout.index(ix, iy, iz))
            .unwrap_or(false)
    }

    /// Volume of all cells still waiting to be removed.
    pub fn remaining_work_vol(&self) -> f32 {
        let res = self.layout.res;
        self.status
            .iter()
            .filter(|&&s| s == WorkStatus::Remaining)
            .count() as f32
            * res
            * res
            * res
    }

    /// The maximal signed extent of remaining work along `normal`, padded
    /// by one conservative voxel half diagonal. Negative infinity when no
    /// work remains: anything above this plane is guaranteed clear.
    pub fn query_work_offset(&self, normal: Vec3A) -> f32 {
        let mut best = f32::NEG_INFINITY;
        for idx in 0..self.layout.len() {
            if self.status[idx] == WorkStatus::Remaining {
                let (ix, iy, iz) = self.layout.delinearize(idx);
                let d = self.layout.cell_center(ix, iy, iz).dot(normal);
                if d > best {
                    best = d;
                }
            }
        }
        if best.is_finite() {
            best + self.layout.half_cell_diag()
        } else {
            best
        }
    }

    /// True iff the shape contains, or even grazes, material that must not
    /// be cut. Remaining empty cells do not block: the tool erodes its way
    /// through material that has to go anyway.
    pub fn query_blocked(&self, shape: &Shape) -> bool {
        self.layout
            .any_in_band(shape, Boundary::Outside.offset(self.layout.res), |idx| {
                matches!(
                    self.state(idx),
                    CellState::FullDone | CellState::PartialDone | CellState::PartialRemaining
                )
            })
    }

    /// True iff the shape covers at least one cell that still has material
    /// to remove.
    pub fn query_has_work(&self, shape: &Shape) -> bool {
        self.layout
            .any_in_band(shape, Boundary::Nearest.offset(self.layout.res), |idx| {
                matches!(
                    self.state(idx),
                    CellState::EmptyRemaining | CellState::PartialRemaining
                )
            })
    }

    /// Commit a sweep's removal. `min_shapes` is the volume certainly
    /// removed (filled conservatively inward), `max_shapes` the volume
    /// possibly touched (filled conservatively outward). Every min cell
    /// must lie inside the max envelope. Cells in the penumbra (max but
    /// not min) are left as they are: they may or may not have been
    /// removed physically, so they conservatively count as still present.
    ///
    /// Returns the removed volume. In strict mode any max-envelope overlap
    /// with non-empty target cells fails with `Overcut` before anything is
    /// committed, unless `allow_overcut` is set.
    pub fn commit_removal(
        &mut self,
        min_shapes: &[Shape],
        max_shapes: &[Shape],
        allow_overcut: bool,
        strict: bool,
    ) -> Result<f32, KerfError> {
        let len = self.layout.len();
        let mut min_mask = bit_grid(len);
        let mut max_mask = bit_grid(len);
        let inner = Boundary::Inside.offset(self.layout.res);
        let outer = Boundary::Outside.offset(self.layout.res);
        for shape in min_shapes {
            self.layout.for_each_in_band(shape, inner, |_, _, _, idx| {
                let _ = min_mask.set(idx, true);
            });
        }
        for shape in max_shapes {
            self.layout.for_each_in_band(shape, outer, |_, _, _, idx| {
                let _ = max_mask.set(idx, true);
            });
        }

        let mut damages = 0usize;
        for idx in 0..len {
            let in_min = min_mask.get(idx).unwrap_or(false);
            let in_max = max_mask.get(idx).unwrap_or(false);
            if in_min && !in_max {
                let (ix, iy, iz) = self.layout.delinearize(idx);
                return Err(KerfError::MinMaxReversal(format!(
                    "cell ({ix},{iy},{iz}) is claimed as certainly removed but not as possibly touched"
                )));
            }
            if in_max && self.classes[idx] != TargetClass::Empty && !allow_overcut {
                damages += 1;
            }
        }
        if damages > 0 {
            if strict {
                return Err(KerfError::Overcut(format!(
                    "max-cut envelope touches {damages} non-empty target cells"
                )));
            }
            log::warn!("overcut: max-cut envelope touches {damages} non-empty target cells");
        }

        let mut removed = 0usize;
        for idx in 0..len {
            if min_mask.get(idx).unwrap_or(false) && self.status[idx] == WorkStatus::Remaining {
                self.status[idx] = WorkStatus::Done;
                removed += 1;
            }
        }
        let res = self.layout.res;
        Ok(removed as f32 * res * res * res)
    }

    /// Per-voxel deviation field. Seeds a jump flood from every target
    /// cell, then reports, per cell: `-1` for removed material (and, when
    /// `exclude_protected` is set, for cells only kept for a later
    /// session), `0` for material at or inside the part, and otherwise a
    /// conservative upper bound on the distance from the cell center to
    /// the nearest target cell.
    pub fn extract_work_with_deviation(&self, exclude_protected: bool) -> VoxelGrid<f32> {
        let layout = self.layout;
        let len = layout.len();
        let excluded = |idx: usize| -> bool {
            exclude_protected && self.protected.get(idx).unwrap_or(false)
        };

        let mut seeds: Vec<Option<Vec3A>> = (0..len)
            .map(|idx| {
                if self.classes[idx] != TargetClass::Empty && !excluded(idx) {
                    let (ix, iy, iz) = layout.delinearize(idx);
                    Some(layout.cell_center(ix, iy, iz))
                } else {
                    None
                }
            })
            .collect();

        let max_dim = layout.nx.max(layout.ny).max(layout.nz);
        let mut passes = 0u32;
        while (1u32 << passes) < max_dim {
            passes += 1;
        }

        for _ in 0..JUMP_FLOOD_ROUNDS {
            for pass in 0..passes {
                let step = 1i64 << (passes - 1 - pass);
                let prev = &seeds;
                let next: Vec<Option<Vec3A>> = (0..len)
                    .into_par_iter()
                    .map(|idx| {
                        let (ix, iy, iz) = layout.delinearize(idx);
                        let center = layout.cell_center(ix, iy, iz);
                        let mut best = prev[idx];
                        let mut best_d =
                            best.map_or(f32::INFINITY, |s| s.distance(center));
                        for (dx, dy, dz) in AXIS_NEIGHBORS {
                            let jx = ix as i64 + dx * step;
                            let jy = iy as i64 + dy * step;
                            let jz = iz as i64 + dz * step;
                            if jx < 0
                                || jy < 0
                                || jz < 0
                                || jx >= layout.nx as i64
                                || jy >= layout.ny as i64
                                || jz >= layout.nz as i64
                            {
                                continue;
                            }
                            let jdx = layout.index(jx as u32, jy as u32, jz as u32);
                            if let Some(seed) = prev[jdx] {
                                let d = seed.distance(center);
                                if d < best_d {
                                    best_d = d;
                                    best = Some(seed);
                                }
                            }
                        }
                        best
                    })
                    .collect();
                seeds = next;
            }
        }

        let mut out = VoxelGrid::<f32>::new(layout);
        let hd = layout.half_cell_diag();
        for idx in 0..len {
            let value = if excluded(idx) {
                -1.0
            } else {
                match self.state(idx) {
                    CellState::EmptyDone => -1.0,
                    CellState::FullDone | CellState::PartialDone | CellState::PartialRemaining => {
                        0.0
                    }
                    CellState::EmptyRemaining => {
                        let (ix, iy, iz) = layout.delinearize(idx);
                        let center = layout.cell_center(ix, iy, iz);
                        match seeds[idx] {
                            Some(seed) => seed.distance(center) + hd,
                            None => f32::INFINITY,
                        }
                    }
                }
            };
            out.data_mut()[idx] = value;
        }
        out
    }
}
