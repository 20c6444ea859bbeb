// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

use crate::{
    KerfError,
    geo::Shape,
    tracking::{CellState, TrackingGrid},
    voxel::{
        Boundary, CLASS_EMPTY, CLASS_FULL, CLASS_PARTIAL, GridLayout, HALF_DIAG, VoxelGrid,
    },
};
use vector_traits::glam::Vec3A;

fn layout(res: f32, nx: u32, ny: u32, nz: u32, ofs: Vec3A) -> GridLayout {
    GridLayout::new(res, nx, ny, nz, ofs).expect("valid layout")
}

fn single_cell(target: u8, work: u8) -> Result<TrackingGrid, KerfError> {
    let l = layout(1.0, 1, 1, 1, Vec3A::ZERO);
    let mut t = VoxelGrid::<u8>::new(l);
    let mut w = VoxelGrid::<u8>::new(l);
    t.set(0, 0, 0, target);
    w.set(0, 0, 0, work);
    TrackingGrid::set_from_work_and_target(&w, &t)
}

/// Install succeeds exactly when work dominates target cellwise.
#[test]
fn install_table() -> Result<(), KerfError> {
    let accepted = [
        (CLASS_EMPTY, CLASS_EMPTY, CellState::EmptyDone),
        (CLASS_EMPTY, CLASS_PARTIAL, CellState::EmptyRemaining),
        (CLASS_EMPTY, CLASS_FULL, CellState::EmptyRemaining),
        (CLASS_PARTIAL, CLASS_FULL, CellState::PartialRemaining),
        (CLASS_PARTIAL, CLASS_PARTIAL, CellState::PartialDone),
        (CLASS_FULL, CLASS_FULL, CellState::FullDone),
    ];
    for (target, work, expected) in accepted {
        let grid = single_cell(target, work)?;
        assert_eq!(grid.state_at(0, 0, 0), expected);
    }
    for (target, work) in [
        (CLASS_PARTIAL, CLASS_EMPTY),
        (CLASS_FULL, CLASS_EMPTY),
        (CLASS_FULL, CLASS_PARTIAL),
    ] {
        assert!(matches!(
            single_cell(target, work),
            Err(KerfError::UnreachableTarget(_))
        ));
    }
    // non-classification values are rejected outright
    assert!(matches!(
        single_cell(7, CLASS_FULL),
        Err(KerfError::InvalidParameter(_))
    ));
    Ok(())
}

fn all_remaining(l: GridLayout) -> Result<TrackingGrid, KerfError> {
    let target = VoxelGrid::<u8>::new(l);
    let mut work = VoxelGrid::<u8>::new(l);
    work.fill(CLASS_FULL);
    TrackingGrid::set_from_work_and_target(&work, &target)
}

#[test]
fn protected_floor_promotes_below_z() -> Result<(), KerfError> {
    let l = layout(1.0, 2, 2, 4, Vec3A::ZERO);
    let mut grid = all_remaining(l)?;
    grid.set_protected_work_below_z(2.0)?;
    assert_eq!(grid.count_state(CellState::FullDone), 8);
    assert_eq!(grid.count_state(CellState::EmptyRemaining), 8);
    assert_eq!(grid.state_at(0, 0, 1), CellState::FullDone);
    assert!(grid.is_protected(0, 0, 1));
    assert_eq!(grid.state_at(0, 0, 2), CellState::EmptyRemaining);
    assert!(!grid.is_protected(0, 0, 2));
    // only one shot at this
    assert!(matches!(
        grid.set_protected_work_below_z(1.0),
        Err(KerfError::InvalidParameter(_))
    ));
    Ok(())
}

#[test]
fn work_offset_tracks_the_topmost_remaining_cell() -> Result<(), KerfError> {
    let l = layout(1.0, 2, 2, 4, Vec3A::ZERO);
    let grid = all_remaining(l)?;
    // topmost cell center z = 3.5, plus the half diagonal
    let expected = 3.5 + HALF_DIAG;
    assert!((grid.query_work_offset(Vec3A::Z) - expected).abs() < 1.0e-5);
    assert!((grid.query_work_offset(Vec3A::X) - (1.5 + HALF_DIAG)).abs() < 1.0e-5);

    // no remaining work anywhere
    let empty = TrackingGrid::set_from_work_and_target(
        &VoxelGrid::<u8>::new(l),
        &VoxelGrid::<u8>::new(l),
    )?;
    assert_eq!(empty.query_work_offset(Vec3A::Z), f32::NEG_INFINITY);
    Ok(())
}

fn block_and_work_grid() -> Result<(TrackingGrid, GridLayout), KerfError> {
    // an 8x8x8 grid: one 2x2x2 clump of target material in a corner, the
    // rest of the work half is remaining material
    let l = layout(0.5, 8, 8, 8, Vec3A::ZERO);
    let mut target = VoxelGrid::<u8>::new(l);
    let mut work = VoxelGrid::<u8>::new(l);
    for iz in 0..2 {
        for iy in 0..2 {
            for ix in 0..2 {
                target.set(ix, iy, iz, CLASS_FULL);
            }
        }
    }
    for iz in 0..8 {
        for iy in 0..8 {
            for ix in 0..8 {
                if iy < 4 {
                    work.set(ix, iy, iz, CLASS_FULL);
                }
            }
        }
    }
    Ok((TrackingGrid::set_from_work_and_target(&work, &target)?, l))
}

#[test]
fn blocked_and_has_work_queries() -> Result<(), KerfError> {
    let (grid, _) = block_and_work_grid()?;
    // a probe over the target clump is blocked
    let over_target = Shape::cylinder(Vec3A::new(0.5, 0.5, 0.0), Vec3A::Z, 0.4, 1.0)?;
    assert!(grid.query_blocked(&over_target));
    assert!(!grid.query_has_work(&over_target));
    // a probe over plain remaining work is not blocked but has work
    let over_work = Shape::cylinder(Vec3A::new(3.0, 1.5, 1.0), Vec3A::Z, 0.4, 2.0)?;
    assert!(!grid.query_blocked(&over_work));
    assert!(grid.query_has_work(&over_work));
    // a probe in already empty space has neither
    let in_air = Shape::cylinder(Vec3A::new(3.0, 3.5, 1.0), Vec3A::Z, 0.3, 2.0)?;
    assert!(!grid.query_blocked(&in_air));
    assert!(!grid.query_has_work(&in_air));
    Ok(())
}

/// Committing flips exactly the remaining cells inside the min envelope.
#[test]
fn commit_subset_rule_and_volume() -> Result<(), KerfError> {
    let l = layout(0.5, 8, 8, 8, Vec3A::ZERO);
    let mut grid = all_remaining(l)?;
    let min_shape = Shape::cylinder(Vec3A::new(2.0, 2.0, 0.5), Vec3A::Z, 1.4, 2.5)?;
    let max_shape = Shape::cylinder(Vec3A::new(2.0, 2.0, 0.3), Vec3A::Z, 1.7, 3.0)?;

    let mut expected = vec![false; l.len()];
    l.for_each_in_band(&min_shape, Boundary::Inside.offset(l.res), |_, _, _, idx| {
        expected[idx] = true;
    });
    let expected_count = expected.iter().filter(|&&b| b).count();
    assert!(expected_count > 0);

    let before = grid.remaining_work_vol();
    let removed = grid.commit_removal(&[min_shape], &[max_shape], false, true)?;
    assert!((removed - expected_count as f32 * 0.125).abs() < 1.0e-4);
    for idx in 0..l.len() {
        let (ix, iy, iz) = l.delinearize(idx);
        let expected_state = if expected[idx] {
            CellState::EmptyDone
        } else {
            CellState::EmptyRemaining
        };
        assert_eq!(grid.state_at(ix, iy, iz), expected_state);
    }
    // volume accounting: removed equals the drop in remaining volume
    assert!((before - grid.remaining_work_vol() - removed).abs() < 1.0e-4);

    // a second, overlapping commit only counts the newly cleared cells
    let second_min = Shape::cylinder(Vec3A::new(2.5, 2.0, 0.5), Vec3A::Z, 1.4, 2.5)?;
    let second_max = Shape::cylinder(Vec3A::new(2.5, 2.0, 0.3), Vec3A::Z, 1.7, 3.0)?;
    let removed_2 = grid.commit_removal(&[second_min], &[second_max], false, true)?;
    assert!((before - grid.remaining_work_vol() - removed - removed_2).abs() < 1.0e-4);
    Ok(())
}

#[test]
fn commit_rejects_min_outside_max() -> Result<(), KerfError> {
    let l = layout(0.5, 8, 8, 8, Vec3A::ZERO);
    let mut grid = all_remaining(l)?;
    let min_shape = Shape::cylinder(Vec3A::new(2.0, 2.0, 0.5), Vec3A::Z, 1.4, 2.5)?;
    assert!(matches!(
        grid.commit_removal(&[min_shape], &[], false, true),
        Err(KerfError::MinMaxReversal(_))
    ));
    Ok(())
}

#[test]
fn commit_overcut_strictness() -> Result<(), KerfError> {
    let (mut grid, _) = block_and_work_grid()?;
    // min far away from the target clump, max sweeping over it
    let min_shape = Shape::cylinder(Vec3A::new(3.0, 1.0, 0.5), Vec3A::Z, 0.8, 2.0)?;
    let max_shape = Shape::cylinder(Vec3A::new(2.0, 1.0, 0.0), Vec3A::Z, 2.5, 4.0)?;

    let remaining_before = grid.remaining_work_vol();
    assert!(matches!(
        grid.commit_removal(&[min_shape], &[max_shape], false, true),
        Err(KerfError::Overcut(_))
    ));
    // strict failure commits nothing
    assert!((grid.remaining_work_vol() - remaining_before).abs() < 1.0e-6);

    // allow_overcut ignores the damage entirely
    let removed = grid.commit_removal(&[min_shape], &[max_shape], true, true)?;
    assert!(removed > 0.0);
    Ok(())
}

#[test]
fn commit_overcut_nonstrict_counts_and_continues() -> Result<(), KerfError> {
    let (mut grid, _) = block_and_work_grid()?;
    let min_shape = Shape::cylinder(Vec3A::new(3.0, 1.0, 0.5), Vec3A::Z, 0.8, 2.0)?;
    let max_shape = Shape::cylinder(Vec3A::new(2.0, 1.0, 0.0), Vec3A::Z, 2.5, 4.0)?;
    let removed = grid.commit_removal(&[min_shape], &[max_shape], false, false)?;
    assert!(removed > 0.0);
    Ok(())
}

#[test]
fn deviation_field_bounds() -> Result<(), KerfError> {
    // single target cell in the middle of a cube of remaining work, with
    // one already-empty corner cell
    let l = layout(1.0, 9, 9, 9, Vec3A::ZERO);
    let mut target = VoxelGrid::<u8>::new(l);
    let mut work = VoxelGrid::<u8>::new(l);
    work.fill(CLASS_FULL);
    target.set(4, 4, 4, CLASS_FULL);
    work.set(0, 0, 0, CLASS_EMPTY);

    let grid = TrackingGrid::set_from_work_and_target(&work, &target)?;
    let deviation = grid.extract_work_with_deviation(false);

    // removed material is flagged -1
    assert_eq!(deviation.get(0, 0, 0), -1.0);
    // target cells report zero
    assert_eq!(deviation.get(4, 4, 4), 0.0);
    // axis-aligned distance
    assert!((deviation.get(8, 4, 4) - (4.0 + HALF_DIAG)).abs() < 1.0e-3);
    // diagonal distances come out exact as well
    let diag = (27.0f32).sqrt();
    assert!((deviation.get(7, 7, 7) - (diag + HALF_DIAG)).abs() < 1.0e-3);
    // every remaining cell is bounded by true distance + half diagonal
    let seed = l.cell_center(4, 4, 4);
    for idx in 0..l.len() {
        let (ix, iy, iz) = l.delinearize(idx);
        let v = deviation.get(ix, iy, iz);
        if v >= 0.0 && grid.state_at(ix, iy, iz) == CellState::EmptyRemaining {
            let true_dist = l.cell_center(ix, iy, iz).distance(seed);
            assert!(v >= 0.0);
            assert!(v <= true_dist + HALF_DIAG + 1.0e-3);
        }
    }
    Ok(())
}

#[test]
fn deviation_excludes_protected_cells() -> Result<(), KerfError> {
    // target material on top, protected floor below: a remaining cell
    // right above the floor must measure its distance to the real target,
    // not to the promoted floor cells
    let l = layout(1.0, 3, 3, 8, Vec3A::ZERO);
    let mut target = VoxelGrid::<u8>::new(l);
    let mut work = VoxelGrid::<u8>::new(l);
    work.fill(CLASS_FULL);
    for iy in 0..3 {
        for ix in 0..3 {
            target.set(ix, iy, 7, CLASS_FULL);
        }
    }
    let mut grid = TrackingGrid::set_from_work_and_target(&work, &target)?;
    grid.set_protected_work_below_z(2.0)?;

    let deviation = grid.extract_work_with_deviation(true);
    // protected cells read as no-material
    assert_eq!(deviation.get(1, 1, 0), -1.0);
    // the cell just above the floor is 5 cells away from the real target
    assert!((deviation.get(1, 1, 2) - (5.0 + HALF_DIAG)).abs() < 1.0e-3);

    // without exclusion the protected floor acts as target material
    let unexcluded = grid.extract_work_with_deviation(false);
    assert_eq!(unexcluded.get(1, 1, 0), 0.0);
    assert!((unexcluded.get(1, 1, 2) - (1.0 + HALF_DIAG)).abs() < 1.0e-3);
    Ok(())
}
