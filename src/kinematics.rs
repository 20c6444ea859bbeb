// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Inverse kinematics for the x/y/z + b/c machine: map a tip pose in work
//! coordinates to commanded axis values.
//!
//! The c axis rotates the work table around world z so that the requested
//! tip normal falls into the machine xz plane; the b axis then tilts the
//! spindle by the normal's polar angle. The tool hangs from its base along
//! `(-sin b, 0, -cos b)`.


use vector_traits::glam::Vec3A;

/// One thousandth of a degree: below this spindle tilt the table rotation
/// is left in its neutral position.
pub const B_EPSILON: f32 = 0.001 * core::f32::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisValues {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Spindle tilt, radians.
    pub b: f32,
    /// Table rotation, radians.
    pub c: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    pub axis: AxisValues,
    pub tip_pos_machine: Vec3A,
    pub tip_pos_work: Vec3A,
}

#[inline]
fn rotate_z(v: Vec3A, angle: f32) -> Vec3A {
    let (sin, cos) = angle.sin_cos();
    Vec3A::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

/// Solve the machine pose for a tip position and tip normal.
///
/// `tip` is interpreted in machine coordinates when `pos_is_machine` is
/// set, in work coordinates otherwise. `tip_normal_world` must be a unit
/// vector with nonnegative z; a negative z is logged and solved anyway so
/// the host can spot the unreachable pose in the emitted values.
pub fn solve_ik(
    tip: Vec3A,
    tip_normal_world: Vec3A,
    tool_length: f32,
    pos_is_machine: bool,
    work_offset: Vec3A,
) -> IkSolution {
    let n = tip_normal_world;
    if n.z < 0.0 {
        log::warn!(
            "tip normal ({}, {}, {}) points into the table, pose is unreachable",
            n.x,
            n.y,
            n.z
        );
    }
    let planar = Vec3A::new(n.x, n.y, 0.0).length().min(1.0);
    let b = planar.asin();
    let c = if b < B_EPSILON { 0.0 } else { -n.y.atan2(n.x) };

    let (tip_pos_work, tip_pos_machine) = if pos_is_machine {
        (rotate_z(tip - work_offset, -c), tip)
    } else {
        (tip, rotate_z(tip, c) + work_offset)
    };

    // tool base -> tip offset in machine coordinates
    let tip_offset = Vec3A::new(-b.sin(), 0.0, -b.cos()) * tool_length;
    let base = tip_pos_machine - tip_offset;

    IkSolution {
        axis: AxisValues {
            x: base.x,
            y: base.y,
            z: base.z,
            b,
            c,
        },
        tip_pos_machine,
        tip_pos_work,
    }
}
