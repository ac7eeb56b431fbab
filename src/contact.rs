//! Contact descriptor construction for one colliding sphere pair.
//!
//! The contact between spheres `a` and `b` is their radical-plane disk
//! clipped by the radical planes of every other sphere colliding with `a`.
//! The contour starts as a hexagon slightly outside the radical circle,
//! loses a half-plane per clipping neighbor, and is finally restricted to
//! the circle itself, which turns boundary segments into circular arcs.
//! Degenerate outcomes are all expressed as "no contact".

use std::f64::consts::{FRAC_PI_3, PI, TAU};

use nalgebra::{Point3, Vector3};

use crate::contour::ContourRing;
use crate::geometry::{
    any_normal_of_vector, directed_angle, halfspace_of_point, intersect_segment_with_circle,
    min_dihedral_angle, plane_segment_intersection, project_point_inside_segment, radical_circle,
    radical_circle_center, rotate_point_around_axis, signed_plane_distance,
    sphere_contains_sphere, sphere_intersects_sphere, triangle_area,
};
use crate::tolerance::Tolerance;
use crate::types::{ContactSummary, Sphere, ValuedId};

/// Hexagon circumradius factor; slightly above 2/sqrt(3) so the seed
/// polygon strictly contains the radical circle.
const HEXAGON_SCALE: f64 = 1.19;

/// Per-worker scratch reused across contact constructions to avoid
/// per-pair heap churn.
pub(crate) struct ContactScratch {
    ring: ContourRing,
}

impl ContactScratch {
    pub(crate) fn new() -> Self {
        Self {
            ring: ContourRing::with_capacity(12),
        }
    }
}

/// Construct the contact summary for the ordered pair `(a_id, b_id)`, or
/// `None` when the pair has no contact (disjoint, contained, occluded, or
/// numerically degenerate).
pub(crate) fn build_contact(
    spheres: &[Sphere],
    exclusion: &[bool],
    a_id: usize,
    b_id: usize,
    a_neighbors: &[ValuedId],
    tol: Tolerance,
    scratch: &mut ContactScratch,
) -> Option<ContactSummary> {
    if a_id >= spheres.len() || b_id >= spheres.len() {
        return None;
    }

    let a = &spheres[a_id];
    let b = &spheres[b_id];

    if !sphere_intersects_sphere(tol, a, b)
        || sphere_contains_sphere(tol, a, b)
        || sphere_contains_sphere(tol, b, a)
    {
        return None;
    }

    let circle = radical_circle(tol, a, b);
    if circle.r <= 0.0 {
        return None;
    }

    let axis = (b.center - a.center).normalize();
    let ring = &mut scratch.ring;
    ring.clear();

    let mut discarded = false;
    let mut initialized = false;

    for neighbor in a_neighbors {
        let c_id = neighbor.index;
        if c_id == b_id || exclusion.get(c_id).copied().unwrap_or(false) {
            continue;
        }

        let c = &spheres[c_id];
        // The cutting plane only matters if c reaches both the disk and b.
        if !sphere_intersects_sphere(tol, &circle, c) || !sphere_intersects_sphere(tol, b, c) {
            continue;
        }
        if sphere_contains_sphere(tol, c, a) || sphere_contains_sphere(tol, c, b) {
            discarded = true;
            break;
        }

        let cut_center = radical_circle_center(tol, a, c);
        let cut_normal = (c.center - a.center).normalize();

        let cos_val = (circle.center - a.center)
            .normalize()
            .dot(&(cut_center - a.center).normalize());

        if cos_val.abs() >= 1.0 {
            // Parallel planes: either the cut swallows the whole disk or
            // it misses entirely.
            if halfspace_of_point(tol, &cut_center, &cut_normal, &circle.center) > 0 {
                discarded = true;
                break;
            }
            continue;
        }

        // Distance from the disk center to the cut line within the disk
        // plane; rejects most candidates in O(1).
        let l = signed_plane_distance(&cut_center, &cut_normal, &circle.center).abs();
        let xl = l / (1.0 - cos_val * cos_val).sqrt();

        if xl >= circle.r {
            if halfspace_of_point(tol, &cut_center, &cut_normal, &circle.center) >= 0 {
                discarded = true;
                break;
            }
            continue;
        }

        if !initialized {
            seed_hexagon(ring, a_id, &circle, &axis, tol);
            initialized = true;
        } else if !contour_reachable_by_cut(ring, &a.center, &cut_center) {
            // Neighbors are sorted by radical-plane distance, so no later
            // plane can reach the contour either.
            break;
        }

        mark_and_cut_contour(ring, &cut_center, &cut_normal, c_id, tol);
        if ring.is_empty() {
            discarded = true;
            break;
        }
    }

    if discarded {
        return None;
    }

    let mut sum_of_arc_angles = 0.0;
    let mut area = 0.0;
    let mut barycenter = circle.center;

    if initialized {
        if !ring.is_empty() {
            restrict_contour_to_circle(ring, &circle, &axis, a_id, tol, &mut sum_of_arc_angles);
            if !ring.is_empty() {
                area = contour_area(ring, &circle, &mut barycenter);
            }
        }
    } else {
        // No plane reached the disk: the contact is the whole circle.
        sum_of_arc_angles = TAU;
        area = circle.r * circle.r * PI;
    }

    if area <= 0.0 {
        return None;
    }

    let solid_angle_a = contour_solid_angle(ring, a, b, &circle);
    let solid_angle_b = contour_solid_angle(ring, b, a, &circle);
    let sign_a = if solid_angle_a < 0.0 { -1.0 } else { 1.0 };
    let sign_b = if solid_angle_b < 0.0 { -1.0 } else { 1.0 };

    Some(ContactSummary {
        id_a: a_id,
        id_b: b_id,
        area,
        arc_length: sum_of_arc_angles * circle.r,
        solid_angle_a,
        solid_angle_b,
        pyramid_volume_a: (circle.center - a.center).norm() * area / 3.0 * sign_a,
        pyramid_volume_b: (circle.center - b.center).norm() * area / 3.0 * sign_b,
        distance: (b.center - a.center).norm(),
        central: contour_is_central(ring, &circle.center, &barycenter, tol),
    })
}

/// Seed the contour as a regular hexagon strictly containing the circle,
/// with every edge initially owned by sphere `a` itself.
fn seed_hexagon(ring: &mut ContourRing, a_id: usize, base: &Sphere, axis: &Vector3<f64>, tol: Tolerance) {
    ring.clear();
    let first = any_normal_of_vector(tol, axis) * (base.r * HEXAGON_SCALE);
    ring.push_back(base.center + first, a_id, a_id);
    let mut rotation_angle = FRAC_PI_3;
    while rotation_angle < TAU {
        ring.push_back(
            base.center + rotate_point_around_axis(axis, rotation_angle, &first),
            a_id,
            a_id,
        );
        rotation_angle += FRAC_PI_3;
    }
}

/// Any contour point at least as far from `a` as the closest possible cut
/// point means the plane can still clip something.
fn contour_reachable_by_cut(
    ring: &ContourRing,
    a_center: &Point3<f64>,
    closest_cut_point: &Point3<f64>,
) -> bool {
    let threshold = (closest_cut_point - a_center).norm_squared();
    ring.indices()
        .any(|i| (ring.node(i).p - a_center).norm_squared() >= threshold)
}

/// Tag points on the cut side, then splice the cut into the contour.
/// Clears the ring when every point falls on the cut side.
fn mark_and_cut_contour(
    ring: &mut ContourRing,
    plane_center: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    c_id: usize,
    tol: Tolerance,
) -> bool {
    let outsiders = mark_contour(ring, plane_center, plane_normal, c_id, tol);
    if outsiders == 0 {
        return false;
    }
    if outsiders >= ring.len() {
        ring.clear();
        return true;
    }
    cut_contour(ring, plane_center, plane_normal, c_id, tol);
    true
}

fn mark_contour(
    ring: &mut ContourRing,
    plane_center: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    c_id: usize,
    tol: Tolerance,
) -> usize {
    let mut count = 0;
    let mut cur = ring.head();
    for _ in 0..ring.len() {
        let nxt = ring.next(cur);
        if halfspace_of_point(tol, plane_center, plane_normal, &ring.node(cur).p) >= 0 {
            let node = ring.node_mut(cur);
            node.left_id = c_id;
            node.right_id = c_id;
            count += 1;
        }
        cur = nxt;
    }
    count
}

/// Replace the contiguous run of marked points with the two points where
/// the cutting plane enters and leaves the contour.
fn cut_contour(
    ring: &mut ContourRing,
    plane_center: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    c_id: usize,
    tol: Tolerance,
) {
    if ring.len() < 3 {
        return;
    }

    let marked =
        |ring: &ContourRing, i: u32| ring.node(i).left_id == c_id && ring.node(i).right_id == c_id;

    let Some(seed) = ring.indices().find(|&i| marked(ring, i)) else {
        return;
    };

    let mut start = seed;
    while marked(ring, ring.prev(start)) {
        start = ring.prev(start);
    }
    let mut end = seed;
    while marked(ring, ring.next(end)) {
        end = ring.next(end);
    }

    let before = ring.prev(start);
    let after = ring.next(end);

    let ip_start = plane_segment_intersection(
        tol,
        plane_center,
        plane_normal,
        &ring.node(start).p,
        &ring.node(before).p,
    );
    let ip_end = plane_segment_intersection(
        tol,
        plane_center,
        plane_normal,
        &ring.node(end).p,
        &ring.node(after).p,
    );

    let left_of_start = ring.node(before).right_id;
    let right_of_end = ring.node(after).left_id;

    if start == end {
        // A single marked point splits into entry and exit points.
        let node = ring.node_mut(start);
        node.p = ip_start;
        node.left_id = left_of_start;
        node.right_id = c_id;
        node.angle = 0.0;
        end = ring.insert_after(start, ip_end, c_id, right_of_end);
    } else {
        let mut cur = ring.next(start);
        while cur != end {
            cur = ring.remove(cur);
        }
        let node = ring.node_mut(start);
        node.p = ip_start;
        node.left_id = left_of_start;
        node.right_id = c_id;
        node.angle = 0.0;
        let node = ring.node_mut(end);
        node.p = ip_end;
        node.left_id = c_id;
        node.right_id = right_of_end;
        node.angle = 0.0;
    }

    // Merge coincident entry/exit points.
    if !tol.gt(
        (ring.node(end).p - ring.node(start).p).norm_squared(),
        0.0,
    ) {
        ring.node_mut(start).right_id = ring.node(end).right_id;
        ring.remove(end);
    }
}

/// Clamp the polygonal contour to the radical circle: points outside the
/// circle are cut away and replaced by crossings on the circle, whose
/// connecting edges become arcs. Accumulates the total arc angle and clears
/// the ring when the arcs close into (nearly) a full circle or nothing of
/// the contour survives.
fn restrict_contour_to_circle(
    ring: &mut ContourRing,
    circle: &Sphere,
    axis: &Vector3<f64>,
    a_id: usize,
    tol: Tolerance,
    sum_of_arc_angles: &mut f64,
) {
    *sum_of_arc_angles = 0.0;
    let r2 = circle.r * circle.r;

    let mut outsiders = 0;
    let mut cur = ring.head();
    for _ in 0..ring.len() {
        let nxt = ring.next(cur);
        let outside = (ring.node(cur).p - circle.center).norm_squared() > r2;
        ring.node_mut(cur).outside = outside;
        if outside {
            outsiders += 1;
        }
        cur = nxt;
    }

    if outsiders == 0 {
        return;
    }

    // Insert circle crossings edge by edge. Each iteration advances to the
    // original successor, skipping freshly inserted points.
    let mut insertions = 0;
    let original_len = ring.len();
    let mut cur = ring.head();
    for _ in 0..original_len {
        let nxt = ring.next(cur);
        let out1 = ring.node(cur).outside;
        let out2 = ring.node(nxt).outside;

        if out1 && out2 {
            // The chord may still dip into the circle.
            if let Some(mp) =
                project_point_inside_segment(&circle.center, &ring.node(cur).p, &ring.node(nxt).p)
            {
                if (mp - circle.center).norm_squared() <= r2 {
                    let ip1 = intersect_segment_with_circle(circle, &mp, &ring.node(cur).p);
                    let ip2 = intersect_segment_with_circle(circle, &mp, &ring.node(nxt).p);
                    if let (Some(ip1), Some(ip2)) = (ip1, ip2) {
                        let right_id = ring.node(cur).right_id;
                        let left_id = ring.node(nxt).left_id;
                        let first = ring.insert_after(cur, ip1, a_id, right_id);
                        ring.insert_after(first, ip2, left_id, a_id);
                        insertions += 2;
                    }
                }
            }
        } else if out1 {
            // Entering the circle.
            if let Some(ip) =
                intersect_segment_with_circle(circle, &ring.node(nxt).p, &ring.node(cur).p)
            {
                let right_id = ring.node(cur).right_id;
                ring.insert_after(cur, ip, a_id, right_id);
                insertions += 1;
            } else {
                let right_id = ring.node(cur).right_id;
                let node = ring.node_mut(nxt);
                node.left_id = a_id;
                node.right_id = right_id;
            }
        } else if out2 {
            // Leaving the circle.
            if let Some(ip) =
                intersect_segment_with_circle(circle, &ring.node(cur).p, &ring.node(nxt).p)
            {
                let left_id = ring.node(nxt).left_id;
                ring.insert_after(cur, ip, left_id, a_id);
                insertions += 1;
            } else {
                let left_id = ring.node(nxt).left_id;
                let node = ring.node_mut(cur);
                node.left_id = left_id;
                node.right_id = a_id;
            }
        }

        cur = nxt;
    }

    if insertions == 0 {
        ring.clear();
        return;
    }

    let mut cur = ring.head();
    let mut steps = ring.len();
    while steps > 0 {
        let nxt = ring.next(cur);
        if ring.node(cur).outside {
            ring.remove(cur);
        }
        cur = nxt;
        steps -= 1;
    }

    if ring.len() < 2 {
        ring.clear();
        return;
    }

    // Edges between two circle points are arcs; account for their angles.
    let mut cur = ring.head();
    for _ in 0..ring.len() {
        let nxt = ring.next(cur);
        if ring.node(cur).right_id == a_id && ring.node(nxt).left_id == a_id {
            let angle = directed_angle(
                &circle.center,
                &ring.node(cur).p,
                &ring.node(nxt).p,
                &(circle.center + axis),
            );
            ring.node_mut(cur).angle = angle;
            *sum_of_arc_angles += angle;
        }
        cur = nxt;
    }

    if tol.ge(*sum_of_arc_angles, TAU)
        || (ring.len() > 2 && (*sum_of_arc_angles - TAU).abs() <= tol.full_circle_slack)
    {
        *sum_of_arc_angles = TAU;
        ring.clear();
    }
}

/// Fan triangulation around the barycenter plus circular-segment
/// corrections for arc edges.
fn contour_area(ring: &ContourRing, circle: &Sphere, barycenter: &mut Point3<f64>) -> f64 {
    let mut sum = Vector3::zeros();
    for i in ring.indices() {
        sum += ring.node(i).p.coords;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        *barycenter = Point3::from(sum / ring.len() as f64);
    }

    let mut area = 0.0;
    let mut cur = ring.head();
    for _ in 0..ring.len() {
        let nxt = ring.next(cur);
        area += triangle_area(barycenter, &ring.node(cur).p, &ring.node(nxt).p);
        let angle = ring.node(cur).angle;
        if angle > 0.0 {
            area += circle.r * circle.r * (angle - angle.sin()) * 0.5;
        }
        cur = nxt;
    }

    area
}

/// Solid angle the contact subtends at the center of `a`, computed from the
/// exterior turning angle of the contour. The sign flips when the disk lies
/// on the far side, encoding occlusion versus exposure.
fn contour_solid_angle(ring: &ContourRing, a: &Sphere, b: &Sphere, circle: &Sphere) -> f64 {
    let mut turn_angle = 0.0;

    if ring.is_empty() {
        turn_angle = TAU * (circle.center - a.center).norm() / a.r;
    } else {
        let mut cur = ring.head();
        for _ in 0..ring.len() {
            let prev = ring.prev(cur);
            let next = ring.next(cur);
            let pr0 = ring.node(prev);
            let pr1 = ring.node(cur);
            let pr2 = ring.node(next);

            if pr0.angle > 0.0 {
                // Arc arrives at this point; its tangent replaces the
                // incoming edge direction.
                let mut d = (b.center - a.center).cross(&(pr1.p - circle.center));
                let flip = (pr0.angle < PI && d.dot(&(pr0.p - pr1.p)) < 0.0)
                    || (pr0.angle > PI && d.dot(&(pr0.p - pr1.p)) > 0.0);
                if flip {
                    d = -d;
                }
                turn_angle += PI - min_dihedral_angle(&a.center, &pr1.p, &(pr1.p + d), &pr2.p);
            } else if pr1.angle > 0.0 {
                // Arc leaves this point.
                let mut d = (b.center - a.center).cross(&(pr1.p - circle.center));
                let flip = (pr1.angle < PI && d.dot(&(pr2.p - pr1.p)) < 0.0)
                    || (pr1.angle > PI && d.dot(&(pr2.p - pr1.p)) > 0.0);
                if flip {
                    d = -d;
                }
                turn_angle += PI - min_dihedral_angle(&a.center, &pr1.p, &pr0.p, &(pr1.p + d));
                turn_angle += pr1.angle * ((circle.center - a.center).norm() / a.r);
            } else {
                turn_angle += PI - min_dihedral_angle(&a.center, &pr1.p, &pr0.p, &pr2.p);
            }

            cur = next;
        }
    }

    let mut solid_angle = TAU - turn_angle;

    let ic_to_a = circle.center - a.center;
    let ic_to_b = circle.center - b.center;
    if ic_to_a.dot(&ic_to_b) > 0.0 && ic_to_a.norm_squared() < ic_to_b.norm_squared() {
        solid_angle = -solid_angle;
    }

    solid_angle
}

/// A contour is central when it encloses the radical circle center: no arc
/// exceeds π and the center lies on the barycenter side of every edge.
fn contour_is_central(
    ring: &ContourRing,
    center: &Point3<f64>,
    barycenter: &Point3<f64>,
    tol: Tolerance,
) -> bool {
    if ring.is_empty() {
        return true;
    }

    if ring.indices().any(|i| tol.gt(ring.node(i).angle, PI)) {
        return true;
    }

    let mut cur = ring.head();
    for _ in 0..ring.len() {
        let nxt = ring.next(cur);
        let pi = ring.node(cur).p;
        let pj = ring.node(nxt).p;
        let u = (pj - pi).normalize();
        let foot = pi + u * u.dot(&(barycenter - pi));
        if (barycenter - foot).dot(&(center - pi)) < 0.0 {
            return false;
        }
        cur = nxt;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance_to_radical_center;
    use approx::assert_relative_eq;

    const TOL: Tolerance = Tolerance {
        epsilon: 1e-10,
        full_circle_slack: 1e-3,
    };

    /// Brute-force collision list for tests, sorted like the search grid's.
    fn neighbors_of(spheres: &[Sphere], id: usize) -> Vec<ValuedId> {
        let mut out = Vec::new();
        for (j, s) in spheres.iter().enumerate() {
            if j != id && sphere_intersects_sphere(TOL, &spheres[id], s) {
                out.push(ValuedId::new(
                    distance_to_radical_center(TOL, &spheres[id], s),
                    j,
                ));
            }
        }
        out.sort_unstable();
        out
    }

    fn build(spheres: &[Sphere], a: usize, b: usize) -> Option<ContactSummary> {
        let exclusion = vec![false; spheres.len()];
        let neighbors = neighbors_of(spheres, a);
        let mut scratch = ContactScratch::new();
        build_contact(spheres, &exclusion, a, b, &neighbors, TOL, &mut scratch)
    }

    #[test]
    fn isolated_pair_contact_is_full_disk() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(1.0, 0.0, 0.0, 1.0),
        ];
        let cds = build(&spheres, 0, 1).unwrap();
        // Radical circle radius sqrt(1 - 0.25).
        assert_relative_eq!(cds.area, PI * 0.75, epsilon = 1e-9);
        assert_relative_eq!(cds.arc_length, TAU * 0.75f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(cds.distance, 1.0, epsilon = 1e-12);
        assert!(cds.central);
        // Symmetric pair: equal pyramid volumes of the same sign.
        assert_relative_eq!(cds.pyramid_volume_a, cds.pyramid_volume_b, epsilon = 1e-9);
        assert_relative_eq!(cds.solid_angle_a, cds.solid_angle_b, epsilon = 1e-9);
    }

    #[test]
    fn disjoint_pair_has_no_contact() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(5.0, 0.0, 0.0, 1.0),
        ];
        assert!(build(&spheres, 0, 1).is_none());
    }

    #[test]
    fn contained_pair_has_no_contact() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 2.0),
            Sphere::from_coords(0.0, 0.0, 0.5, 0.5),
        ];
        assert!(build(&spheres, 0, 1).is_none());
        assert!(build(&spheres, 1, 0).is_none());
    }

    #[test]
    fn third_sphere_reduces_contact_area() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.5),
            Sphere::from_coords(2.0, 0.0, 0.0, 1.5),
            Sphere::from_coords(1.0, 1.2, 0.0, 1.5),
        ];
        let uncut = build(&spheres[..2], 0, 1).unwrap();
        let cut = build(&spheres, 0, 1).unwrap();
        assert!(cut.area > 0.0);
        assert!(cut.area < uncut.area);
        // Part of the circle boundary was cut away.
        assert!(cut.arc_length < uncut.arc_length);
    }

    #[test]
    fn construction_is_symmetric() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.5),
            Sphere::from_coords(2.0, 0.1, -0.2, 1.2),
            Sphere::from_coords(1.0, 1.2, 0.3, 1.4),
        ];
        let ab = build(&spheres, 0, 1).unwrap();
        let ba = build(&spheres, 1, 0).unwrap();
        assert_relative_eq!(ab.area, ba.area, epsilon = 1e-9);
        assert_relative_eq!(ab.arc_length, ba.arc_length, epsilon = 1e-9);
        assert_relative_eq!(ab.distance, ba.distance, epsilon = 1e-12);
        assert_relative_eq!(ab.solid_angle_a, ba.solid_angle_b, epsilon = 1e-9);
        assert_relative_eq!(ab.solid_angle_b, ba.solid_angle_a, epsilon = 1e-9);
        assert_relative_eq!(ab.pyramid_volume_a, ba.pyramid_volume_b, epsilon = 1e-9);
        assert_relative_eq!(ab.pyramid_volume_b, ba.pyramid_volume_a, epsilon = 1e-9);
    }

    #[test]
    fn excluded_neighbor_does_not_clip() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.5),
            Sphere::from_coords(2.0, 0.0, 0.0, 1.5),
            Sphere::from_coords(1.0, 1.2, 0.0, 1.5),
        ];
        let neighbors = neighbors_of(&spheres, 0);
        let mut scratch = ContactScratch::new();

        let clipped = build_contact(
            &spheres,
            &[false, false, false],
            0,
            1,
            &neighbors,
            TOL,
            &mut scratch,
        )
        .unwrap();
        let unclipped = build_contact(
            &spheres,
            &[false, false, true],
            0,
            1,
            &neighbors,
            TOL,
            &mut scratch,
        )
        .unwrap();
        assert!(unclipped.area > clipped.area);
    }

    #[test]
    fn engulfing_neighbor_discards_contact() {
        // Sphere 2 contains sphere 1, so the 0-1 contact cannot exist.
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(1.2, 0.0, 0.0, 0.4),
            Sphere::from_coords(1.3, 0.0, 0.0, 1.2),
        ];
        assert!(build(&spheres, 0, 1).is_none());
    }

    #[test]
    fn scratch_reuse_is_clean() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(1.0, 0.0, 0.0, 1.0),
        ];
        let exclusion = vec![false, false];
        let neighbors = neighbors_of(&spheres, 0);
        let mut scratch = ContactScratch::new();
        let first =
            build_contact(&spheres, &exclusion, 0, 1, &neighbors, TOL, &mut scratch).unwrap();
        let second =
            build_contact(&spheres, &exclusion, 0, 1, &neighbors, TOL, &mut scratch).unwrap();
        assert_relative_eq!(first.area, second.area, epsilon = 1e-12);
    }

    #[test]
    fn surrounded_sphere_contact_survives_many_cuts() {
        // Ring of spheres around the 0-1 axis clips the contact disk down
        // to a hexagon.
        let mut spheres = vec![
            Sphere::from_coords(0.0, 0.0, -0.5, 1.0),
            Sphere::from_coords(0.0, 0.0, 0.5, 1.0),
        ];
        for k in 0..6 {
            let angle = TAU * f64::from(k) / 6.0;
            spheres.push(Sphere::from_coords(
                1.25 * angle.cos(),
                1.25 * angle.sin(),
                0.0,
                0.7,
            ));
        }
        let cds = build(&spheres, 0, 1).unwrap();
        let unclipped = build(&spheres[..2], 0, 1).unwrap();
        assert!(cds.area > 0.0);
        assert!(cds.area < unclipped.area);
    }
}
