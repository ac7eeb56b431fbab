//! Input, output, and internal value types of the tessellation engine.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::tolerance::Tolerance;

/// Input ball: center plus van-der-Waals radius, before probe inflation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
}

impl Ball {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self { x, y, z, r }
    }
}

/// Internal probe-inflated sphere.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sphere {
    pub center: Point3<f64>,
    pub r: f64,
}

impl Sphere {
    pub(crate) const fn new(center: Point3<f64>, r: f64) -> Self {
        Self { center, r }
    }

    pub(crate) const fn from_coords(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self {
            center: Point3::new(x, y, z),
            r,
        }
    }

    pub(crate) fn from_ball(ball: &Ball, probe: f64) -> Self {
        Self {
            center: Point3::new(ball.x, ball.y, ball.z),
            r: ball.r + probe,
        }
    }
}

/// Collision entry: neighbor index plus the signed distance from the owning
/// sphere's center to the shared radical plane. Neighbor lists are sorted by
/// this value so that nearer cutting planes clip the contour first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValuedId {
    pub value: f64,
    pub index: usize,
}

impl ValuedId {
    pub(crate) const fn new(value: f64, index: usize) -> Self {
        Self { value, index }
    }
}

impl PartialEq for ValuedId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ValuedId {}

impl PartialOrd for ValuedId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValuedId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Periodic boundary box defined by three shift vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodicBox {
    pub shift_a: Vector3<f64>,
    pub shift_b: Vector3<f64>,
    pub shift_c: Vector3<f64>,
}

/// The 26 non-zero unit shift combinations used for 27-fold replication.
/// Populated-sphere block `g + 1` holds the image shifted by entry `g`.
pub(crate) const NEIGHBOR_SHIFTS: [(i32, i32, i32); 26] = [
    (-1, -1, -1),
    (-1, -1, 0),
    (-1, -1, 1),
    (-1, 0, -1),
    (-1, 0, 0),
    (-1, 0, 1),
    (-1, 1, -1),
    (-1, 1, 0),
    (-1, 1, 1),
    (0, -1, -1),
    (0, -1, 0),
    (0, -1, 1),
    (0, 0, -1),
    (0, 0, 1),
    (0, 1, -1),
    (0, 1, 0),
    (0, 1, 1),
    (1, -1, -1),
    (1, -1, 0),
    (1, -1, 1),
    (1, 0, -1),
    (1, 0, 0),
    (1, 0, 1),
    (1, 1, -1),
    (1, 1, 0),
    (1, 1, 1),
];

impl PeriodicBox {
    /// Create an axis-aligned box from two corner points.
    #[must_use]
    pub const fn from_corners(min: (f64, f64, f64), max: (f64, f64, f64)) -> Self {
        Self {
            shift_a: Vector3::new(max.0 - min.0, 0.0, 0.0),
            shift_b: Vector3::new(0.0, max.1 - min.1, 0.0),
            shift_c: Vector3::new(0.0, 0.0, max.2 - min.2),
        }
    }

    /// Create from three shift vectors (non-orthogonal boxes allowed).
    #[must_use]
    pub const fn from_vectors(a: (f64, f64, f64), b: (f64, f64, f64), c: (f64, f64, f64)) -> Self {
        Self {
            shift_a: Vector3::new(a.0, a.1, a.2),
            shift_b: Vector3::new(b.0, b.1, b.2),
            shift_c: Vector3::new(c.0, c.1, c.2),
        }
    }

    /// Shift a sphere by integer-weighted combinations of the box vectors.
    pub(crate) fn shift_sphere(&self, s: &Sphere, wa: f64, wb: f64, wc: f64) -> Sphere {
        Sphere {
            center: Point3::new(
                self.shift_c.x.mul_add(
                    wc,
                    self.shift_b
                        .x
                        .mul_add(wb, self.shift_a.x.mul_add(wa, s.center.x)),
                ),
                self.shift_c.y.mul_add(
                    wc,
                    self.shift_b
                        .y
                        .mul_add(wb, self.shift_a.y.mul_add(wa, s.center.y)),
                ),
                self.shift_c.z.mul_add(
                    wc,
                    self.shift_b
                        .z
                        .mul_add(wb, self.shift_a.z.mul_add(wa, s.center.z)),
                ),
            ),
            r: s.r,
        }
    }

    /// Replicate canonical spheres into all 27 periodic images.
    /// Block 0 is the canonical set; `original_id = id % n` everywhere.
    pub(crate) fn populate(&self, spheres: &[Sphere]) -> Vec<Sphere> {
        let n = spheres.len();
        let mut populated = Vec::with_capacity(n * 27);
        populated.extend_from_slice(spheres);
        for &(sx, sy, sz) in &NEIGHBOR_SHIFTS {
            for s in spheres {
                populated.push(self.shift_sphere(s, f64::from(sx), f64::from(sy), f64::from(sz)));
            }
        }
        populated
    }
}

/// Engine configuration: probe inflation, optional periodic box, optional
/// same-group contact suppression, and comparison tolerances.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Rolling probe radius added to every input radius.
    pub probe: f64,
    /// Optional periodic box; enables 27-fold replication and canonical
    /// de-duplication of boundary contacts.
    pub periodic_box: Option<PeriodicBox>,
    /// Optional per-sphere group labels; pairs within one group produce no
    /// contact. A length mismatch is ignored with a warning.
    pub grouping: Option<Vec<i32>>,
    /// Comparison tolerances.
    pub tolerance: Tolerance,
}

impl Settings {
    #[must_use]
    pub fn with_probe(probe: f64) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }
}

/// Geometric summary of one sphere-sphere contact.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContactSummary {
    pub id_a: usize,
    pub id_b: usize,
    /// Area of the clipped radical-plane disk.
    pub area: f64,
    /// Total length of the circular-arc portion of the contour boundary.
    pub arc_length: f64,
    /// Solid angle the contact subtends at sphere `a`; the sign encodes
    /// whether the cap occludes or exposes the sphere surface.
    pub solid_angle_a: f64,
    pub solid_angle_b: f64,
    /// Signed pyramid volume between sphere `a` center and the contact disk.
    pub pyramid_volume_a: f64,
    pub pyramid_volume_b: f64,
    /// Distance between the two sphere centers.
    pub distance: f64,
    /// True when the contour encloses the radical circle center.
    pub central: bool,
}

impl ContactSummary {
    /// Normalize so that `id_a < id_b`, swapping per-side quantities.
    pub(crate) fn ensure_ids_ordered(&mut self) {
        if self.id_a > self.id_b {
            std::mem::swap(&mut self.id_a, &mut self.id_b);
            std::mem::swap(&mut self.solid_angle_a, &mut self.solid_angle_b);
            std::mem::swap(&mut self.pyramid_volume_a, &mut self.pyramid_volume_b);
        }
    }
}

/// Staged per-sphere accumulator of contact contributions.
/// Stage 0 = untouched, 1 = accumulating, 2 = finalized.
#[derive(Debug, Clone, Default)]
pub(crate) struct CellAccumulator {
    pub id: usize,
    pub area: f64,
    pub arc_length: f64,
    pub explained_solid_angle_positive: f64,
    pub explained_solid_angle_negative: f64,
    pub explained_pyramid_volume_positive: f64,
    pub explained_pyramid_volume_negative: f64,
    pub sas_area: f64,
    pub sas_inside_volume: f64,
    pub count: usize,
    pub stage: u8,
}

impl CellAccumulator {
    pub(crate) fn for_id(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub(crate) fn add(&mut self, cds: &ContactSummary) {
        if cds.area > 0.0 && (cds.id_a == self.id || cds.id_b == self.id) {
            self.count += 1;
            self.area += cds.area;
            self.arc_length += cds.arc_length;

            let (solid_angle, pyramid_volume) = if cds.id_a == self.id {
                (cds.solid_angle_a, cds.pyramid_volume_a)
            } else {
                (cds.solid_angle_b, cds.pyramid_volume_b)
            };

            self.explained_solid_angle_positive += solid_angle.max(0.0);
            self.explained_solid_angle_negative -= solid_angle.min(0.0);
            self.explained_pyramid_volume_positive += pyramid_volume.max(0.0);
            self.explained_pyramid_volume_negative -= pyramid_volume.min(0.0);
            self.stage = 1;
        }
    }

    /// Derive SAS area and enclosed volume from accumulated contributions.
    pub(crate) fn finalize(&mut self, r: f64, tol: Tolerance) {
        if self.stage != 1 {
            return;
        }

        self.sas_area = 0.0;
        self.sas_inside_volume = 0.0;

        let pos = self.explained_solid_angle_positive;
        let neg = self.explained_solid_angle_negative;
        if self.arc_length > 0.0 && !tol.eq(pos, neg) {
            if pos > neg {
                self.sas_area = 4.0f64.mul_add(PI, -(pos - neg).max(0.0)) * r * r;
            } else {
                self.sas_area = (neg - pos).max(0.0) * r * r;
            }
            self.sas_inside_volume = (self.sas_area * r / 3.0)
                + self.explained_pyramid_volume_positive
                - self.explained_pyramid_volume_negative;

            // A volume beyond the full sphere means the solid angle signs
            // cancelled incorrectly for a buried sphere; fall back to the
            // pyramid-volume balance alone.
            let full_sphere_volume = 4.0 / 3.0 * PI * r * r * r;
            if self.sas_inside_volume > full_sphere_volume {
                self.sas_area = 0.0;
                self.sas_inside_volume = self.explained_pyramid_volume_positive
                    - self.explained_pyramid_volume_negative;
            }
        } else {
            self.sas_inside_volume =
                self.explained_pyramid_volume_positive - self.explained_pyramid_volume_negative;
        }
        self.stage = 2;
    }

    /// Finalize a sphere with no neighbors at all: fully exposed.
    pub(crate) fn finalize_detached(&mut self, id: usize, r: f64) {
        if self.stage == 0 {
            self.id = id;
            self.sas_area = 4.0 * PI * r * r;
            self.sas_inside_volume = self.sas_area * r / 3.0;
            self.stage = 2;
        }
    }

    pub(crate) fn to_summary(&self) -> Option<CellSummary> {
        if self.stage == 2 {
            Some(CellSummary {
                id: self.id,
                sas_area: self.sas_area,
                volume: self.sas_inside_volume,
                contact_area: self.area,
                contact_count: self.count,
            })
        } else {
            None
        }
    }
}

/// Per-sphere cell summary: SAS area and enclosed volume.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CellSummary {
    pub id: usize,
    /// Solvent-accessible surface area of the sphere.
    pub sas_area: f64,
    /// Volume enclosed by the cell.
    pub volume: f64,
    /// Total contact area shared with neighbors.
    pub contact_area: f64,
    /// Number of contacts touching this sphere.
    pub contact_count: usize,
}

/// Running totals over a set of contacts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TotalContactsSummary {
    pub count: usize,
    pub area: f64,
    pub arc_length: f64,
    /// Smallest center-center distance seen; negative when no contacts.
    pub min_distance: f64,
}

impl Default for TotalContactsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            area: 0.0,
            arc_length: 0.0,
            min_distance: -1.0,
        }
    }
}

impl TotalContactsSummary {
    pub(crate) fn add(&mut self, cds: &ContactSummary) {
        if cds.area > 0.0 {
            self.count += 1;
            self.area += cds.area;
            self.arc_length += cds.arc_length;
            self.min_distance = if self.min_distance < 0.0 {
                cds.distance
            } else {
                self.min_distance.min(cds.distance)
            };
        }
    }
}

/// Running totals over a set of cells.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TotalCellsSummary {
    pub count: usize,
    pub sas_area: f64,
    pub volume: f64,
}

impl TotalCellsSummary {
    pub(crate) fn add(&mut self, cell: &CellSummary) {
        self.count += 1;
        self.sas_area += cell.sas_area;
        self.volume += cell.volume;
    }
}

/// Full tessellation result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Tessellation {
    /// Number of canonical input spheres.
    pub total_spheres: usize,
    /// Number of undirected sphere-sphere collisions.
    pub total_collisions: usize,
    /// Number of collision pairs selected for contact construction.
    pub total_relevant_pairs: usize,
    pub contacts: Vec<ContactSummary>,
    pub cells: Vec<CellSummary>,
    pub total_contacts: TotalContactsSummary,
    pub total_cells: TotalCellsSummary,
}

impl Tessellation {
    /// Contacts, or [`TessellationError::NoContactsConstructed`] when the
    /// input produced none.
    ///
    /// [`TessellationError::NoContactsConstructed`]: crate::TessellationError::NoContactsConstructed
    pub fn require_contacts(&self) -> Result<&[ContactSummary], crate::TessellationError> {
        if self.contacts.is_empty() {
            Err(crate::TessellationError::NoContactsConstructed)
        } else {
            Ok(&self.contacts)
        }
    }

    /// Cells, or [`TessellationError::NoCellsConstructed`] when the input
    /// produced none.
    ///
    /// [`TessellationError::NoCellsConstructed`]: crate::TessellationError::NoCellsConstructed
    pub fn require_cells(&self) -> Result<&[CellSummary], crate::TessellationError> {
        if self.cells.is_empty() {
            Err(crate::TessellationError::NoCellsConstructed)
        } else {
            Ok(&self.cells)
        }
    }
}

/// Contacts between two groups, merged.
#[derive(Debug, Clone, Serialize)]
pub struct ContactGroup {
    /// Ordered pair of group labels.
    pub groups: (i32, i32),
    /// Index into `Tessellation::contacts` of the first merged contact.
    pub representative_contact: usize,
    pub summary: TotalContactsSummary,
}

/// Cells sharing one group label, merged.
#[derive(Debug, Clone, Serialize)]
pub struct CellGroup {
    pub group: i32,
    /// Index into `Tessellation::cells` of the first merged cell.
    pub representative_cell: usize,
    pub summary: TotalCellsSummary,
}

/// Result of re-aggregating a tessellation by caller-supplied group labels.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedTessellation {
    pub contact_groups: Vec<ContactGroup>,
    pub cell_groups: Vec<CellGroup>,
}
