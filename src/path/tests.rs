// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

use crate::{
    KerfError,
    geo::Shape,
    path::{MoveKind, PartialPath, SweepKind, ToolParams},
};
use vector_traits::glam::Vec3A;

fn tool() -> ToolParams {
    ToolParams {
        natural_length: 30.0,
        natural_diameter: 3.0,
        ewr_max: 1.0,
    }
}

fn new_path(min_tool_length: f32, tool_length: f32) -> Result<PartialPath, KerfError> {
    PartialPath::new(
        0,
        SweepKind::Planar,
        Vec3A::Z,
        min_tool_length,
        20.0,
        0,
        tool_length,
        &tool(),
        Vec3A::ZERO,
    )
}

#[test]
fn worn_tool_is_swapped_at_construction() -> Result<(), KerfError> {
    let path = new_path(10.0, 5.0)?;
    assert_eq!(path.tool_index(), 1);
    assert_eq!(path.tool_length(), 30.0);
    assert_eq!(path.tool_changes(), 1);

    let untouched = new_path(10.0, 12.0)?;
    assert_eq!(untouched.tool_index(), 0);
    assert_eq!(untouched.tool_length(), 12.0);
    assert_eq!(untouched.tool_changes(), 0);
    Ok(())
}

#[test]
fn impossible_min_tool_length_is_rejected() {
    assert!(matches!(
        new_path(40.0, 30.0),
        Err(KerfError::ImpossibleMinToolLength(_))
    ));
}

#[test]
fn move_invariants_are_enforced() -> Result<(), KerfError> {
    let mut path = new_path(5.0, 20.0)?;
    // removes need a position first
    assert!(matches!(
        path.remove_horizontal(Vec3A::new(1.0, 0.0, 0.0), None, 1.0, 0.5),
        Err(KerfError::InvalidParameter(_))
    ));

    path.non_remove(MoveKind::MoveIn, Vec3A::new(0.0, 0.0, 2.0))?;
    // drifting along the normal is not a horizontal move
    assert!(matches!(
        path.remove_horizontal(Vec3A::new(1.0, 0.0, 2.5), None, 1.0, 0.5),
        Err(KerfError::InvalidParameter(_))
    ));
    path.remove_horizontal(Vec3A::new(1.0, 0.0, 2.0), None, 1.0, 0.5)?;

    // lateral drift is not a vertical move
    assert!(matches!(
        path.remove_vertical(Vec3A::new(2.0, 0.0, 1.0), None, 1.0, 0.5),
        Err(KerfError::InvalidParameter(_))
    ));
    path.remove_vertical(Vec3A::new(1.0, 0.0, 0.5), None, 1.0, 0.5)?;

    // only positioning kinds pass through non_remove
    assert!(matches!(
        path.non_remove(MoveKind::RemoveWork, Vec3A::ZERO),
        Err(KerfError::InvalidParameter(_))
    ));
    Ok(())
}

#[test]
fn remove_calls_record_cut_envelopes() -> Result<(), KerfError> {
    let mut path = new_path(5.0, 20.0)?;
    path.non_remove(MoveKind::MoveIn, Vec3A::new(0.0, 0.0, 2.0))?;
    path.remove_horizontal(Vec3A::new(3.0, 0.0, 2.0), None, 2.0, 1.0)?;
    path.remove_vertical(Vec3A::new(3.0, 0.0, 0.5), None, 2.0, 1.0)?;
    // zero diameters contribute no envelope
    path.non_remove(MoveKind::MoveIn, Vec3A::new(4.0, 0.0, 0.5))?;
    path.remove_horizontal(Vec3A::new(5.0, 0.0, 0.5), None, 0.0, 0.0)?;

    assert_eq!(path.min_shapes().len(), 2);
    assert_eq!(path.max_shapes().len(), 2);
    match path.min_shapes()[0] {
        Shape::Elh { r, h, .. } => {
            assert!((r - 0.5).abs() < 1.0e-6);
            assert!((h - 20.0).abs() < 1.0e-6);
        }
        ref other => panic!("expected an extruded long hole, got {other:?}"),
    }
    match path.min_shapes()[1] {
        // the cylinder is anchored at the deeper end of the plunge
        Shape::Cylinder { p, r, .. } => {
            assert!((p - Vec3A::new(3.0, 0.0, 0.5)).length() < 1.0e-6);
            assert!((r - 0.5).abs() < 1.0e-6);
        }
        ref other => panic!("expected a cylinder, got {other:?}"),
    }
    assert!(path.has_removal());
    Ok(())
}

/// Starting one feed depth above the minimum and discarding twice must
/// produce exactly one tool change between the two discards.
#[test]
fn tool_change_between_two_discards() -> Result<(), KerfError> {
    let feed = 2.0;
    let mut path = new_path(10.0, 10.0 + feed)?;
    path.non_remove(MoveKind::MoveIn, Vec3A::new(0.0, 0.0, 5.0))?;

    path.discard_tool_tip(feed);
    // the first discard leaves exactly the minimum usable length
    assert_eq!(path.tool_index(), 0);
    assert_eq!(path.tool_length(), 10.0);
    assert_eq!(path.tool_changes(), 0);

    // the second consumption no longer fits: swap instead of shortening
    path.discard_tool_tip(feed);
    assert_eq!(path.tool_index(), 1);
    assert_eq!(path.tool_length(), 30.0);
    assert_eq!(path.tool_changes(), 1);

    let refresh_points: Vec<_> = path
        .points()
        .iter()
        .filter(|p| p.kind == MoveKind::RemoveTool)
        .collect();
    assert_eq!(refresh_points.len(), 2);
    // the shortening carries the ground length, the change carries none
    assert_eq!(refresh_points[0].grind_delta, Some(feed));
    assert_eq!(refresh_points[1].grind_delta, None);
    Ok(())
}

#[test]
fn path_points_carry_resolved_axes() -> Result<(), KerfError> {
    let mut path = new_path(5.0, 20.0)?;
    path.non_remove(MoveKind::MoveIn, Vec3A::new(1.0, 2.0, 3.0))?;
    let point = &path.points()[0];
    assert_eq!(point.kind, MoveKind::MoveIn);
    assert_eq!(point.sweep_index, 0);
    assert!((point.tip_pos_work - Vec3A::new(1.0, 2.0, 3.0)).length() < 1.0e-6);
    // vertical sweep normal: the base hangs one tool length above the tip
    assert!((point.axis.z - 23.0).abs() < 1.0e-3);
    assert!(point.axis.b.abs() < 1.0e-6);
    Ok(())
}
