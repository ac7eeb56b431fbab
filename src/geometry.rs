//! Geometric primitives for the radical tessellation.
//!
//! All epsilon-dependent predicates take the engine [`Tolerance`] explicitly;
//! the clipping code must use the same tolerance everywhere to stay
//! geometrically consistent.

use std::f64::consts::TAU;

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

use crate::tolerance::Tolerance;
use crate::types::Sphere;

#[inline]
pub(crate) fn point_equals(tol: Tolerance, a: &Point3<f64>, b: &Point3<f64>) -> bool {
    tol.eq(a.x, b.x) && tol.eq(a.y, b.y) && tol.eq(a.z, b.z)
}

/// Two spheres intersect when their surfaces overlap.
#[inline]
pub(crate) fn sphere_intersects_sphere(tol: Tolerance, a: &Sphere, b: &Sphere) -> bool {
    let sum_r = a.r + b.r;
    tol.lt((b.center - a.center).norm_squared(), sum_r * sum_r)
}

#[inline]
pub(crate) fn sphere_equals_sphere(tol: Tolerance, a: &Sphere, b: &Sphere) -> bool {
    tol.eq(a.r, b.r) && point_equals(tol, &a.center, &b.center)
}

/// Sphere `a` fully engulfs sphere `b`.
#[inline]
pub(crate) fn sphere_contains_sphere(tol: Tolerance, a: &Sphere, b: &Sphere) -> bool {
    let diff_r = a.r - b.r;
    tol.ge(a.r, b.r) && tol.le((b.center - a.center).norm_squared(), diff_r * diff_r)
}

/// Signed distance from `x` to the plane through `plane_point`.
/// `plane_normal` must be unit length.
#[inline]
pub(crate) fn signed_plane_distance(
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    x: &Point3<f64>,
) -> f64 {
    plane_normal.dot(&(x - plane_point))
}

/// Halfspace of `x` relative to a plane with unit normal:
/// 1 on the positive side, -1 on the negative side, 0 on the plane.
#[inline]
pub(crate) fn halfspace_of_point(
    tol: Tolerance,
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    x: &Point3<f64>,
) -> i32 {
    let sd = signed_plane_distance(plane_point, plane_normal, x);
    if tol.gt(sd, 0.0) {
        1
    } else if tol.lt(sd, 0.0) {
        -1
    } else {
        0
    }
}

/// Intersection of a plane (unit normal) with the segment `a`-`b`.
/// Falls back to `a` when the segment is parallel to the plane.
pub(crate) fn plane_segment_intersection(
    tol: Tolerance,
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
) -> Point3<f64> {
    let da = signed_plane_distance(plane_point, plane_normal, a);
    let db = signed_plane_distance(plane_point, plane_normal, b);
    if (da - db).abs() < tol.epsilon {
        *a
    } else {
        let t = da / (da - db);
        a + (b - a) * t
    }
}

#[inline]
pub(crate) fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() / 2.0
}

/// Unsigned angle at `o` between rays towards `a` and `b`.
pub(crate) fn min_angle(o: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let v1 = (a - o).normalize();
    let v2 = (b - o).normalize();
    v1.dot(&v2).clamp(-1.0, 1.0).acos()
}

/// Angle from ray `o`->`a` to ray `o`->`b`, measured in [0, 2π) with the
/// direction disambiguated by reference point `c`.
pub(crate) fn directed_angle(
    o: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> f64 {
    let angle = min_angle(o, a, b);
    let v1 = (a - o).normalize();
    let v2 = (b - o).normalize();
    let n = v1.cross(&v2);
    if (c - o).dot(&n) >= 0.0 {
        angle
    } else {
        TAU - angle
    }
}

/// Any unit vector perpendicular to `a`.
pub(crate) fn any_normal_of_vector(tol: Tolerance, a: &Vector3<f64>) -> Vector3<f64> {
    let mut b = *a;
    if !tol.eq(b.x, 0.0) && (!tol.eq(b.y, 0.0) || !tol.eq(b.z, 0.0)) {
        b.x = -b.x;
        a.cross(&b).normalize()
    } else if !tol.eq(b.y, 0.0) && (!tol.eq(b.x, 0.0) || !tol.eq(b.z, 0.0)) {
        b.y = -b.y;
        a.cross(&b).normalize()
    } else if !tol.eq(b.x, 0.0) {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    }
}

/// Rotate `p` around `axis` by `angle` radians.
pub(crate) fn rotate_point_around_axis(
    axis: &Vector3<f64>,
    angle: f64,
    p: &Vector3<f64>,
) -> Vector3<f64> {
    if axis.norm_squared() <= 0.0 {
        return *p;
    }
    let unit_axis = Unit::new_normalize(*axis);
    UnitQuaternion::from_axis_angle(&unit_axis, angle) * p
}

/// Signed distance from the center of `a` to the radical plane with `b`,
/// measured along the line of centers.
pub(crate) fn distance_to_radical_center(tol: Tolerance, a: &Sphere, b: &Sphere) -> f64 {
    let cm = (b.center - a.center).norm();
    if cm < tol.epsilon {
        return 0.0;
    }
    let cos_g = b.r.mul_add(-b.r, a.r.mul_add(a.r, cm * cm)) / (2.0 * a.r * cm);
    a.r * cos_g
}

/// Center of the radical circle of two intersecting spheres.
pub(crate) fn radical_circle_center(tol: Tolerance, a: &Sphere, b: &Sphere) -> Point3<f64> {
    let cv = b.center - a.center;
    let cm = cv.norm();
    if cm < tol.epsilon {
        return a.center;
    }
    let cos_g = b.r.mul_add(-b.r, a.r.mul_add(a.r, cm * cm)) / (2.0 * a.r * cm);
    a.center + cv * (a.r * cos_g / cm)
}

/// Radical circle of two intersecting spheres, as center + radius.
pub(crate) fn radical_circle(tol: Tolerance, a: &Sphere, b: &Sphere) -> Sphere {
    let cv = b.center - a.center;
    let cm = cv.norm();
    if cm < tol.epsilon {
        return Sphere::new(a.center, 0.0);
    }
    let cos_g = b.r.mul_add(-b.r, a.r.mul_add(a.r, cm * cm)) / (2.0 * a.r * cm);
    let sin_g = (1.0 - cos_g * cos_g).max(0.0).sqrt();
    Sphere::new(a.center + cv * (a.r * cos_g / cm), a.r * sin_g)
}

/// Orthogonal projection of `o` onto segment `a`-`b`, if it falls inside.
pub(crate) fn project_point_inside_segment(
    o: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
) -> Option<Point3<f64>> {
    let v = (b - a).normalize();
    let l = v.dot(&(o - a));
    if l > 0.0 && l * l <= (b - a).norm_squared() {
        Some(a + v * l)
    } else {
        None
    }
}

/// Intersection of the segment from `p_out` towards `p_in` with a circle,
/// taking the crossing closest to `p_out`.
pub(crate) fn intersect_segment_with_circle(
    circle: &Sphere,
    p_in: &Point3<f64>,
    p_out: &Point3<f64>,
) -> Option<Point3<f64>> {
    let dist = (p_in - p_out).norm();
    if dist <= 0.0 {
        return None;
    }
    let v = (p_in - p_out) / dist;
    let u = circle.center - p_out;
    let s = p_out + v * v.dot(&u);
    let ll = circle
        .r
        .mul_add(circle.r, -(circle.center - s).norm_squared());
    if ll >= 0.0 {
        Some(s - v * ll.sqrt())
    } else {
        None
    }
}

/// Dihedral angle at edge `o`-`a` between halfplanes through `b1` and `b2`.
pub(crate) fn min_dihedral_angle(
    o: &Point3<f64>,
    a: &Point3<f64>,
    b1: &Point3<f64>,
    b2: &Point3<f64>,
) -> f64 {
    let oa = (a - o).normalize();
    let d1 = b1 - (o + oa * oa.dot(&(b1 - o)));
    let d2 = b2 - (o + oa * oa.dot(&(b2 - o)));
    d1.normalize().dot(&d2.normalize()).clamp(-1.0, 1.0).acos()
}
