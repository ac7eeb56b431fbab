//! Uniform-grid spatial index over spheres.
//!
//! Cell size is at least the largest sphere diameter plus a margin, so any
//! two overlapping spheres land in the same or adjacent cells and a 27-cell
//! scan finds every true collision.

use crate::geometry::{
    distance_to_radical_center, sphere_contains_sphere, sphere_equals_sphere,
    sphere_intersects_sphere,
};
use crate::tolerance::Tolerance;
use crate::types::{Sphere, ValuedId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CellCoord {
    x: i32,
    y: i32,
    z: i32,
}

impl CellCoord {
    #[allow(clippy::cast_possible_truncation)]
    fn of_sphere(s: &Sphere, cell_size: f64) -> Self {
        Self {
            x: (s.center.x / cell_size).floor() as i32,
            y: (s.center.y / cell_size).floor() as i32,
            z: (s.center.z / cell_size).floor() as i32,
        }
    }

    fn offset_by(self, origin: Self) -> Self {
        Self {
            x: self.x - origin.x,
            y: self.y - origin.y,
            z: self.z - origin.z,
        }
    }

    /// Linear index inside the grid, or `None` when outside.
    #[allow(clippy::cast_sign_loss)]
    const fn index(&self, dims: &Self) -> Option<usize> {
        if self.x >= 0
            && self.y >= 0
            && self.z >= 0
            && self.x < dims.x
            && self.y < dims.y
            && self.z < dims.z
        {
            Some((self.z * dims.x * dims.y + self.y * dims.x + self.x) as usize)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GridShape {
    origin: CellCoord,
    dims: CellCoord,
    cell_size: f64,
}

impl GridShape {
    fn fit(spheres: &[Sphere]) -> Self {
        let mut shape = Self {
            origin: CellCoord::default(),
            dims: CellCoord { x: 1, y: 1, z: 1 },
            cell_size: 1.0,
        };

        if spheres.is_empty() {
            return shape;
        }

        // Cell size >= max diameter + margin keeps collisions within one
        // cell of each other.
        for s in spheres {
            shape.cell_size = shape.cell_size.max(s.r.mul_add(2.0, 0.25));
        }

        let padding = 1;
        for (i, s) in spheres.iter().enumerate() {
            let cc = CellCoord::of_sphere(s, shape.cell_size);
            if i == 0 {
                shape.origin = cc;
                shape.dims = cc;
            } else {
                shape.origin.x = shape.origin.x.min(cc.x - padding);
                shape.origin.y = shape.origin.y.min(cc.y - padding);
                shape.origin.z = shape.origin.z.min(cc.z - padding);
                shape.dims.x = shape.dims.x.max(cc.x + padding);
                shape.dims.y = shape.dims.y.max(cc.y + padding);
                shape.dims.z = shape.dims.z.max(cc.z + padding);
            }
        }

        shape.dims.x = shape.dims.x - shape.origin.x + 1;
        shape.dims.y = shape.dims.y - shape.origin.y + 1;
        shape.dims.z = shape.dims.z - shape.origin.z + 1;

        shape
    }
}

/// Result of one collision query.
pub(crate) struct CollisionScan {
    /// Colliding neighbor ids with radical-plane distances, sorted.
    pub neighbors: Vec<ValuedId>,
    /// The queried sphere is fully engulfed by another sphere.
    pub engulfed: bool,
}

/// Grid-based spatial index answering "which spheres collide with sphere i".
#[derive(Debug, Clone)]
pub(crate) struct SearchGrid {
    spheres: Vec<Sphere>,
    shape: GridShape,
    /// Dense map from grid cell to bucket index, -1 for empty cells.
    cell_to_bucket: Vec<i32>,
    buckets: Vec<Vec<usize>>,
    tol: Tolerance,
}

impl SearchGrid {
    pub(crate) fn new(spheres: Vec<Sphere>, tol: Tolerance) -> Self {
        let shape = GridShape::fit(&spheres);
        let mut grid = Self {
            spheres,
            shape,
            cell_to_bucket: Vec::new(),
            buckets: Vec::new(),
            tol,
        };
        grid.rebuild_buckets();
        grid
    }

    pub(crate) fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// Move the changed spheres to their new buckets; rebuilds the whole
    /// grid only when the grid shape itself changes.
    pub(crate) fn update(&mut self, spheres: &[Sphere], changed_ids: &[usize]) {
        for &id in changed_ids {
            if id < self.spheres.len() && id < spheres.len() {
                // Unbucket before the stored position changes.
                self.remove_from_bucket(id);
                self.spheres[id] = spheres[id];
            }
        }

        let new_shape = GridShape::fit(&self.spheres);
        if (new_shape.cell_size - self.shape.cell_size).abs() > 0.01
            || new_shape.dims != self.shape.dims
            || new_shape.origin != self.shape.origin
        {
            self.shape = new_shape;
            self.rebuild_buckets();
        } else {
            for &id in changed_ids {
                if id < self.spheres.len() {
                    self.add_to_bucket(id);
                }
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn remove_from_bucket(&mut self, sphere_id: usize) {
        let cc = CellCoord::of_sphere(&self.spheres[sphere_id], self.shape.cell_size)
            .offset_by(self.shape.origin);
        if let Some(index) = cc.index(&self.shape.dims) {
            let bucket_id = self.cell_to_bucket[index];
            if bucket_id >= 0 {
                let bucket = &mut self.buckets[bucket_id as usize];
                if let Some(pos) = bucket.iter().position(|&id| id == sphere_id) {
                    bucket.swap_remove(pos);
                }
            }
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn add_to_bucket(&mut self, sphere_id: usize) {
        let cc = CellCoord::of_sphere(&self.spheres[sphere_id], self.shape.cell_size)
            .offset_by(self.shape.origin);
        if let Some(index) = cc.index(&self.shape.dims) {
            let bucket_id = self.cell_to_bucket[index];
            if bucket_id < 0 {
                self.cell_to_bucket[index] = self.buckets.len() as i32;
                self.buckets.push(vec![sphere_id]);
            } else {
                self.buckets[bucket_id as usize].push(sphere_id);
            }
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn rebuild_buckets(&mut self) {
        let total_cells = (self.shape.dims.x * self.shape.dims.y * self.shape.dims.z) as usize;
        self.cell_to_bucket = vec![-1; total_cells];
        self.buckets.clear();

        for (i, sphere) in self.spheres.iter().enumerate() {
            let cc = CellCoord::of_sphere(sphere, self.shape.cell_size).offset_by(self.shape.origin);
            if let Some(index) = cc.index(&self.shape.dims) {
                let bucket_id = self.cell_to_bucket[index];
                if bucket_id < 0 {
                    self.cell_to_bucket[index] = self.buckets.len() as i32;
                    self.buckets.push(vec![i]);
                } else {
                    self.buckets[bucket_id as usize].push(i);
                }
            }
        }
    }

    /// Scan the 27-cell neighborhood of `central_id` for true collisions.
    ///
    /// With `discard_engulfed`, a sphere contained in another is reported as
    /// engulfed with an empty neighbor list (for coincident duplicates the
    /// higher id loses), and spheres contained by the central sphere are
    /// left out of its list.
    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn find_collisions(&self, central_id: usize, discard_engulfed: bool) -> CollisionScan {
        let mut scan = CollisionScan {
            neighbors: Vec::new(),
            engulfed: false,
        };

        if central_id >= self.spheres.len() {
            return scan;
        }

        let central = &self.spheres[central_id];
        let cc = CellCoord::of_sphere(central, self.shape.cell_size).offset_by(self.shape.origin);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = CellCoord {
                        x: cc.x + dx,
                        y: cc.y + dy,
                        z: cc.z + dz,
                    };
                    let Some(index) = neighbor_cell.index(&self.shape.dims) else {
                        continue;
                    };
                    let bucket_id = self.cell_to_bucket[index];
                    if bucket_id < 0 {
                        continue;
                    }
                    for &id in &self.buckets[bucket_id as usize] {
                        if id == central_id {
                            continue;
                        }

                        let candidate = &self.spheres[id];
                        if !sphere_intersects_sphere(self.tol, central, candidate) {
                            continue;
                        }

                        if discard_engulfed
                            && sphere_contains_sphere(self.tol, candidate, central)
                            && (!sphere_equals_sphere(self.tol, candidate, central)
                                || central_id > id)
                        {
                            scan.neighbors.clear();
                            scan.engulfed = true;
                            return scan;
                        }

                        if discard_engulfed && sphere_contains_sphere(self.tol, central, candidate)
                        {
                            continue;
                        }

                        let dist = distance_to_radical_center(self.tol, central, candidate);
                        scan.neighbors.push(ValuedId::new(dist, id));
                    }
                }
            }
        }

        scan.neighbors.sort_unstable();
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: Tolerance = Tolerance {
        epsilon: 1e-10,
        full_circle_slack: 1e-3,
    };

    #[test]
    fn finds_only_true_collisions() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(1.5, 0.0, 0.0, 1.0),
            Sphere::from_coords(5.0, 0.0, 0.0, 1.0),
        ];
        let grid = SearchGrid::new(spheres, TOL);
        let scan = grid.find_collisions(0, true);
        assert_eq!(scan.neighbors.len(), 1);
        assert_eq!(scan.neighbors[0].index, 1);
        assert!(!scan.engulfed);
    }

    #[test]
    fn engulfed_sphere_is_flagged() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(0.0, 0.0, 0.0, 2.0),
        ];
        let grid = SearchGrid::new(spheres, TOL);
        let scan = grid.find_collisions(0, true);
        assert!(scan.engulfed);
        assert!(scan.neighbors.is_empty());

        // The engulfing sphere keeps the engulfed one out of its own list.
        let scan = grid.find_collisions(1, true);
        assert!(!scan.engulfed);
        assert!(scan.neighbors.is_empty());
    }

    #[test]
    fn coincident_duplicates_exclude_higher_id() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
        ];
        let grid = SearchGrid::new(spheres, TOL);
        assert!(!grid.find_collisions(0, true).engulfed);
        assert!(grid.find_collisions(1, true).engulfed);
    }

    #[test]
    fn update_moves_sphere_between_cells() {
        let mut spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(10.0, 0.0, 0.0, 1.0),
        ];
        let mut grid = SearchGrid::new(spheres.clone(), TOL);
        assert!(grid.find_collisions(0, true).neighbors.is_empty());

        spheres[1] = Sphere::from_coords(1.5, 0.0, 0.0, 1.0);
        grid.update(&spheres, &[1]);
        let scan = grid.find_collisions(0, true);
        assert_eq!(scan.neighbors.len(), 1);
        assert_eq!(scan.neighbors[0].index, 1);
    }
}
