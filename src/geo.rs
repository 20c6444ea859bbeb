// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! Signed-distance shapes used both as cut envelopes and as query volumes.


use crate::KerfError;
use vector_traits::glam::Vec3A;

/// Tolerance for "this vector must be unit length" checks.
const UNIT_EPSILON: f32 = 1.0e-4;

/// Tolerance for perpendicularity checks, relative to the vector magnitudes.
const ORTHO_EPSILON: f32 = 1.0e-4;

/// The three cut/query primitives. Directions are unit vectors, sizes are
/// nonnegative; use the constructors, they validate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Cylinder spanning `[p, p + h*n]` with radius `r`.
    Cylinder { p: Vec3A, n: Vec3A, r: f32, h: f32 },
    /// Extruded long hole: the 2d long-hole of radius `r` around the
    /// segment `p->q` (perpendicular to `n`), extruded along `n` by `h`.
    /// This is the volume a flat-bottomed tool sweeps in a straight
    /// horizontal cut.
    Elh {
        p: Vec3A,
        q: Vec3A,
        n: Vec3A,
        r: f32,
        h: f32,
    },
    /// Box centered at `center` with mutually perpendicular half-extent
    /// vectors.
    OrientedBox {
        center: Vec3A,
        half0: Vec3A,
        half1: Vec3A,
        half2: Vec3A,
    },
}

fn require_unit(n: Vec3A, what: &str) -> Result<(), KerfError> {
    if (n.length() - 1.0).abs() > UNIT_EPSILON {
        return Err(KerfError::InvalidShape(format!(
            "{} must be a unit vector, |v|={}",
            what,
            n.length()
        )));
    }
    Ok(())
}

fn require_nonnegative(v: f32, what: &str) -> Result<(), KerfError> {
    if !v.is_finite() || v < 0.0 {
        return Err(KerfError::InvalidShape(format!(
            "{what} must be finite and nonnegative, got {v}"
        )));
    }
    Ok(())
}

impl Shape {
    pub fn cylinder(p: Vec3A, n: Vec3A, r: f32, h: f32) -> Result<Self, KerfError> {
        require_unit(n, "cylinder axis")?;
        require_nonnegative(r, "cylinder radius")?;
        require_nonnegative(h, "cylinder height")?;
        Ok(Shape::Cylinder { p, n, r, h })
    }

    pub fn elh(p: Vec3A, q: Vec3A, n: Vec3A, r: f32, h: f32) -> Result<Self, KerfError> {
        require_unit(n, "elh extrusion direction")?;
        require_nonnegative(r, "elh radius")?;
        require_nonnegative(h, "elh height")?;
        let seg = q - p;
        if seg.dot(n).abs() > ORTHO_EPSILON * (1.0 + seg.length()) {
            return Err(KerfError::InvalidShape(format!(
                "elh segment must be perpendicular to the extrusion direction, (q-p).n={}",
                seg.dot(n)
            )));
        }
        Ok(Shape::Elh { p, q, n, r, h })
    }

    pub fn oriented_box(
        center: Vec3A,
        half0: Vec3A,
        half1: Vec3A,
        half2: Vec3A,
    ) -> Result<Self, KerfError> {
        for (a, b, label) in [
            (half0, half1, "half0/half1"),
            (half0, half2, "half0/half2"),
            (half1, half2, "half1/half2"),
        ] {
            let scale = 1.0 + a.length() * b.length();
            if a.dot(b).abs() > ORTHO_EPSILON * scale {
                return Err(KerfError::InvalidShape(format!(
                    "box half vectors {} must be perpendicular, dot={}",
                    label,
                    a.dot(b)
                )));
            }
        }
        Ok(Shape::OrientedBox {
            center,
            half0,
            half1,
            half2,
        })
    }

    /// Signed distance: positive outside, zero on the surface, negative
    /// inside.
    pub fn sdf(&self, point: Vec3A) -> f32 {
        match *self {
            Shape::Cylinder { p, n, r, h } => {
                let rel = point - p;
                let a = rel.dot(n);
                let radial = (rel - n * a).length();
                compose(axial_distance(a, h), radial - r)
            }
            Shape::Elh { p, q, n, r, h } => {
                let rel = point - p;
                let a = rel.dot(n);
                let planar = rel - n * a;
                // distance to the segment [0, q-p] in the extrusion plane,
                // same form as a capsule sdf
                let ba = q - p;
                let bb = ba.dot(ba);
                let planar_dist = if bb > f32::EPSILON {
                    let t = (planar.dot(ba) / bb).clamp(0.0, 1.0);
                    (planar - ba * t).length()
                } else {
                    planar.length()
                };
                compose(axial_distance(a, h), planar_dist - r)
            }
            Shape::OrientedBox {
                center,
                half0,
                half1,
                half2,
            } => {
                let rel = point - center;
                let d0 = axis_distance(rel, half0);
                let d1 = axis_distance(rel, half1);
                let d2 = axis_distance(rel, half2);
                let outside =
                    Vec3A::new(d0.max(0.0), d1.max(0.0), d2.max(0.0)).length();
                d0.max(d1).max(d2).min(0.0) + outside
            }
        }
    }
}

/// Signed distance of axial coordinate `a` to the interval `[0, h]`.
#[inline]
fn axial_distance(a: f32, h: f32) -> f32 {
    (a - h * 0.5).abs() - h * 0.5
}

/// Signed distance along one box axis: |projection| minus the half length.
#[inline]
fn axis_distance(rel: Vec3A, half: Vec3A) -> f32 {
    let len = half.length();
    if len <= f32::EPSILON {
        return rel.length();
    }
    rel.dot(half / len).abs() - len
}

/// Combine an axial and a radial signed distance into the exact exterior
/// distance / interior max rule.
#[inline]
fn compose(d1: f32, d2: f32) -> f32 {
    d1.max(d2).min(0.0) + d1.max(0.0).hypot(d2.max(0.0))
}

/// Build `(u, v)` so that `(u, v, normal)` is a right-handed orthonormal
/// basis.
pub fn orthonormal_basis(normal: Vec3A) -> (Vec3A, Vec3A) {
    let reference = if normal.x.abs() < 0.9 {
        Vec3A::X
    } else {
        Vec3A::Y
    };
    let u = reference.cross(normal).normalize();
    let v = normal.cross(u);
    (u, v)
}
