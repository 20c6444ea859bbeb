// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Regular voxel grids plus the conservative shape/band traversal every
//! query and commit is built on.


use crate::{KerfError, geo::Shape};
use ilattice::{glam as iglam, prelude::Extent};
use itertools::iproduct;
use vector_traits::glam::Vec3A;

type Extent3i = Extent<iglam::IVec3>;

/// Half of sqrt(3): the half diagonal of a unit cube.
pub const HALF_DIAG: f32 = 0.866_025_4;

/// Side length, in cells, of the pruning blocks used by the band traversal.
const BLOCK_SIDE: u32 = 4;

/// Rasterizer cell classification values, shared with the external mesh
/// rasterizer contract.
pub const CLASS_EMPTY: u8 = 0;
pub const CLASS_PARTIAL: u8 = 128;
pub const CLASS_FULL: u8 = 255;

/// How `fill_shape` treats cells near the shape surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Conservative under-cover: only cells entirely inside the shape.
    Inside,
    /// Conservative over-cover: every cell the shape touches.
    Outside,
    /// Centroid rule: cells whose center is inside.
    Nearest,
}

impl Boundary {
    #[inline]
    pub fn offset(self, res: f32) -> f32 {
        match self {
            Boundary::Inside => -HALF_DIAG * res,
            Boundary::Outside => HALF_DIAG * res,
            Boundary::Nearest => 0.0,
        }
    }
}

/// The geometry of a grid: resolution, dimensions and world offset. Cell
/// `(ix,iy,iz)` covers `[ofs + i*res, ofs + (i+1)*res)` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub res: f32,
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
    pub ofs: Vec3A,
}

impl GridLayout {
    pub fn new(res: f32, nx: u32, ny: u32, nz: u32, ofs: Vec3A) -> Result<Self, KerfError> {
        if !(res.is_finite() && res > 0.0) {
            return Err(KerfError::InvalidParameter(format!(
                "grid resolution must be positive, got {res}"
            )));
        }
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(KerfError::InvalidParameter(format!(
                "grid dimensions must be nonzero, got {nx}x{ny}x{nz}"
            )));
        }
        Ok(Self {
            res,
            nx,
            ny,
            nz,
            ofs,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, ix: u32, iy: u32, iz: u32) -> usize {
        ix as usize + iy as usize * self.nx as usize + iz as usize * self.nx as usize * self.ny as usize
    }

    #[inline]
    pub fn delinearize(&self, idx: usize) -> (u32, u32, u32) {
        let nx = self.nx as usize;
        let ny = self.ny as usize;
        (
            (idx % nx) as u32,
            ((idx / nx) % ny) as u32,
            (idx / (nx * ny)) as u32,
        )
    }

    #[inline]
    pub fn cell_center(&self, ix: u32, iy: u32, iz: u32) -> Vec3A {
        self.ofs
            + Vec3A::new(
                (ix as f32 + 0.5) * self.res,
                (iy as f32 + 0.5) * self.res,
                (iz as f32 + 0.5) * self.res,
            )
    }

    #[inline]
    pub fn half_cell_diag(&self) -> f32 {
        HALF_DIAG * self.res
    }

    /// World-space center of the whole grid.
    pub fn center(&self) -> Vec3A {
        self.ofs
            + Vec3A::new(
                self.nx as f32 * self.res * 0.5,
                self.ny as f32 * self.res * 0.5,
                self.nz as f32 * self.res * 0.5,
            )
    }

    /// Radius of the bounding sphere of the whole grid.
    pub fn bounding_radius(&self) -> f32 {
        Vec3A::new(
            self.nx as f32 * self.res,
            self.ny as f32 * self.res,
            self.nz as f32 * self.res,
        )
        .length()
            * 0.5
    }

    pub fn ensure_compatible(&self, other: &GridLayout) -> Result<(), KerfError> {
        if self != other {
            return Err(KerfError::GridMismatch(format!(
                "{self:?} vs {other:?}"
            )));
        }
        Ok(())
    }

    /// Two-tier traversal of every cell whose center lies within `offset`
    /// of the shape surface (sdf <= offset). Blocks of `BLOCK_SIDE` cells
    /// are pruned with a half-diagonal bound before cells are tested, so
    /// no qualifying cell is ever skipped. Returns false if the visitor
    /// aborted, true otherwise. Visit order is unspecified.
    fn scan_band(
        &self,
        shape: &Shape,
        offset: f32,
        visit: &mut impl FnMut(u32, u32, u32, usize) -> bool,
    ) -> bool {
        let bx = self.nx.div_ceil(BLOCK_SIDE);
        let by = self.ny.div_ceil(BLOCK_SIDE);
        let bz = self.nz.div_ceil(BLOCK_SIDE);
        let block_world = BLOCK_SIDE as f32 * self.res;
        let block_half_diag = HALF_DIAG * block_world;

        let blocks = Extent3i::from_min_and_shape(
            iglam::IVec3::ZERO,
            iglam::IVec3::new(bx as i32, by as i32, bz as i32),
        );
        for block in blocks.iter3() {
            let x0 = block.x as u32 * BLOCK_SIDE;
            let y0 = block.y as u32 * BLOCK_SIDE;
            let z0 = block.z as u32 * BLOCK_SIDE;
            let block_center = self.ofs
                + Vec3A::new(
                    x0 as f32 * self.res + block_world * 0.5,
                    y0 as f32 * self.res + block_world * 0.5,
                    z0 as f32 * self.res + block_world * 0.5,
                );
            if shape.sdf(block_center) > offset + block_half_diag {
                continue;
            }
            let x1 = (x0 + BLOCK_SIDE).min(self.nx);
            let y1 = (y0 + BLOCK_SIDE).min(self.ny);
            let z1 = (z0 + BLOCK_SIDE).min(self.nz);
            for (iz, iy, ix) in iproduct!(z0..z1, y0..y1, x0..x1) {
                if shape.sdf(self.cell_center(ix, iy, iz)) <= offset
                    && !visit(ix, iy, iz, self.index(ix, iy, iz))
                {
                    return false;
                }
            }
        }
        true
    }

    pub fn for_each_in_band(
        &self,
        shape: &Shape,
        offset: f32,
        mut f: impl FnMut(u32, u32, u32, usize),
    ) {
        let _ = self.scan_band(shape, offset, &mut |ix, iy, iz, idx| {
            f(ix, iy, iz, idx);
            true
        });
    }

    /// True iff `pred` holds for at least one cell in the band.
    pub fn any_in_band(
        &self,
        shape: &Shape,
        offset: f32,
        mut pred: impl FnMut(usize) -> bool,
    ) -> bool {
        !self.scan_band(shape, offset, &mut |_, _, _, idx| !pred(idx))
    }

    /// True iff `pred` holds for every cell in the band.
    pub fn all_in_band(
        &self,
        shape: &Shape,
        offset: f32,
        mut pred: impl FnMut(usize) -> bool,
    ) -> bool {
        self.scan_band(shape, offset, &mut |_, _, _, idx| pred(idx))
    }
}

/// A dense voxel grid of scalar cells.
#[derive(Debug, Clone)]
pub struct VoxelGrid<T> {
    layout: GridLayout,
    data: Vec<T>,
}

impl<T: Copy + Default> VoxelGrid<T> {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            data: vec![T::default(); layout.len()],
        }
    }
}

impl<T: Copy> VoxelGrid<T> {
    #[inline]
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[inline]
    pub fn get(&self, ix: u32, iy: u32, iz: u32) -> T {
        self.data[self.layout.index(ix, iy, iz)]
    }

    #[inline]
    pub fn set(&mut self, ix: u32, iy: u32, iz: u32, v: T) {
        let idx = self.layout.index(ix, iy, iz);
        self.data[idx] = v;
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn fill(&mut self, v: T) {
        self.data.fill(v);
    }

    /// Apply `f` to every cell in place.
    pub fn map(&mut self, mut f: impl FnMut(T) -> T) {
        for v in self.data.iter_mut() {
            *v = f(*v);
        }
    }

    pub fn count_if(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| pred(v)).count()
    }

    pub fn max_value(&self) -> Option<T>
    where
        T: PartialOrd,
    {
        self.data
            .iter()
            .copied()
            .fold(None, |best: Option<T>, v| match best {
                Some(b) if b >= v => Some(b),
                _ => Some(v),
            })
    }

    /// Total volume of cells holding a value greater than the default.
    pub fn volume(&self) -> f32
    where
        T: PartialOrd + Default,
    {
        let res = self.layout.res;
        self.count_if(|v| v > T::default()) as f32 * res * res * res
    }

    /// Write `v` into every cell of the shape's offset band selected by
    /// `boundary`.
    pub fn fill_shape(&mut self, shape: &Shape, v: T, boundary: Boundary) {
        let layout = self.layout;
        let offset = boundary.offset(layout.res);
        layout.for_each_in_band(shape, offset, |_, _, _, idx| {
            self.data[idx] = v;
        });
    }
}

impl VoxelGrid<u8> {
    /// Per-cell max, the union of two classification grids.
    pub fn or(&mut self, other: &VoxelGrid<u8>) -> Result<(), KerfError> {
        self.layout.ensure_compatible(&other.layout)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = (*a).max(*b);
        }
        Ok(())
    }

    /// Per-cell min, the intersection of two classification grids.
    pub fn and(&mut self, other: &VoxelGrid<u8>) -> Result<(), KerfError> {
        self.layout.ensure_compatible(&other.layout)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = (*a).min(*b);
        }
        Ok(())
    }

    /// Classification difference: full cells of `other` become empty here,
    /// partial cells of `other` degrade full cells to partial.
    pub fn subtract(&mut self, other: &VoxelGrid<u8>) -> Result<(), KerfError> {
        self.layout.ensure_compatible(&other.layout)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            let inverted = match *b {
                CLASS_FULL => CLASS_EMPTY,
                CLASS_EMPTY => CLASS_FULL,
                _ => CLASS_PARTIAL,
            };
            *a = (*a).min(inverted);
        }
        Ok(())
    }
}

/// Corner-rule rasterization of a shape into a classification grid: 255
/// where all 8 cell corners are inside, 128 where some are, untouched (0)
/// where none are. Merges into existing content with a per-cell max, so
/// repeated calls accumulate a union.
///
/// This is the same contract the external mesh rasterizer fulfills.
pub fn rasterize_shape(grid: &mut VoxelGrid<u8>, shape: &Shape) {
    let layout = *grid.layout();
    let res = layout.res;
    // any cell with a corner inside has its center within one half
    // diagonal of the surface
    layout.for_each_in_band(shape, layout.half_cell_diag(), |ix, iy, iz, idx| {
        let base = layout.ofs
            + Vec3A::new(ix as f32 * res, iy as f32 * res, iz as f32 * res);
        let mut inside = 0u32;
        for (dz, dy, dx) in iproduct!(0..2u32, 0..2u32, 0..2u32) {
            let corner =
                base + Vec3A::new(dx as f32 * res, dy as f32 * res, dz as f32 * res);
            if shape.sdf(corner) <= 0.0 {
                inside += 1;
            }
        }
        let class = match inside {
            8 => CLASS_FULL,
            0 => CLASS_EMPTY,
            _ => CLASS_PARTIAL,
        };
        grid.data[idx] = grid.data[idx].max(class);
    });
}
