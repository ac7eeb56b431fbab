//! Sphere ownership, collision graph, and relevant-pair selection.
//!
//! The container is the single source of truth for sphere geometry: it owns
//! the canonical spheres, their 27-fold periodic images when a box is set,
//! the spatial index, and the per-sphere collision lists with exclusion
//! flags for engulfed spheres. It also selects exactly one direction per
//! undirected colliding pair for contact construction.

use log::debug;
use rayon::prelude::*;

use crate::geometry::sphere_equals_sphere;
use crate::grid::SearchGrid;
use crate::tolerance::Tolerance;
use crate::types::{PeriodicBox, Sphere, ValuedId, NEIGHBOR_SHIFTS};

/// What an incremental update ended up doing.
pub(crate) struct UpdateOutcome {
    /// Spheres whose geometry actually changed.
    pub changed_ids: Vec<usize>,
    /// Changed spheres plus every sphere whose collision list was refreshed.
    pub affected_ids: Vec<usize>,
    /// The change set was too large and a full reinit ran instead.
    pub full_reinit: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SphereContainer {
    spheres: Vec<Sphere>,
    periodic_box: Option<PeriodicBox>,
    /// Canonical spheres followed by 26 shifted blocks when periodic.
    populated: Vec<Sphere>,
    /// Exclusion flag per populated sphere (engulfed spheres drop out).
    exclusion: Vec<bool>,
    /// Collision list per canonical sphere, sorted by radical-plane distance.
    collisions: Vec<Vec<ValuedId>>,
    total_collisions: usize,
    grid: Option<SearchGrid>,
    tol: Tolerance,
}

impl SphereContainer {
    pub(crate) const fn new(tol: Tolerance) -> Self {
        Self {
            spheres: Vec::new(),
            periodic_box: None,
            populated: Vec::new(),
            exclusion: Vec::new(),
            collisions: Vec::new(),
            total_collisions: 0,
            grid: None,
            tol,
        }
    }

    /// Full (re)initialization: populate, index, detect all collisions.
    pub(crate) fn init(&mut self, spheres: Vec<Sphere>, periodic_box: Option<PeriodicBox>) {
        self.spheres = spheres;
        self.periodic_box = periodic_box;

        self.populate();
        self.exclusion = vec![false; self.populated.len()];
        self.grid = Some(SearchGrid::new(self.populated.clone(), self.tol));

        self.detect_all_collisions();
        debug!(
            "container init: {} spheres, {} collisions",
            self.spheres.len(),
            self.total_collisions
        );
    }

    /// Incremental update. Returns `None` when nothing changed.
    ///
    /// Without an explicit changed-id list every sphere is diffed against the
    /// stored copy. When the change set (or its neighbor closure) exceeds
    /// half the sphere count the whole container is reinitialized instead.
    pub(crate) fn update(
        &mut self,
        new_spheres: &[Sphere],
        changed_ids: Option<&[usize]>,
    ) -> Option<UpdateOutcome> {
        if new_spheres.len() != self.spheres.len() {
            self.init(new_spheres.to_vec(), self.periodic_box);
            return Some(UpdateOutcome {
                changed_ids: Vec::new(),
                affected_ids: Vec::new(),
                full_reinit: true,
            });
        }

        let threshold = self.reinit_threshold();

        let changed: Vec<usize> = match changed_ids {
            Some(ids) => ids
                .iter()
                .filter(|&&id| {
                    id < self.spheres.len()
                        && !sphere_equals_sphere(self.tol, &new_spheres[id], &self.spheres[id])
                })
                .copied()
                .collect(),
            None => (0..new_spheres.len())
                .filter(|&i| !sphere_equals_sphere(self.tol, &new_spheres[i], &self.spheres[i]))
                .take(threshold + 1)
                .collect(),
        };

        if changed.is_empty() {
            return None;
        }

        if changed.len() > threshold {
            debug!("update: {} changed spheres exceed threshold, full reinit", changed.len());
            self.init(new_spheres.to_vec(), self.periodic_box);
            return Some(UpdateOutcome {
                changed_ids: Vec::new(),
                affected_ids: Vec::new(),
                full_reinit: true,
            });
        }

        // Affected = changed spheres plus their pre-update neighbors, whose
        // stored collision lists may now be stale.
        let mut affected: Vec<usize> = changed.clone();
        affected.sort_unstable();

        for &sphere_id in &changed {
            for neighbor in &self.collisions[sphere_id] {
                let canonical_id = neighbor.index % self.spheres.len();
                if let Err(pos) = affected.binary_search(&canonical_id) {
                    if affected.len() < threshold {
                        affected.insert(pos, canonical_id);
                    } else {
                        self.init(new_spheres.to_vec(), self.periodic_box);
                        return Some(UpdateOutcome {
                            changed_ids: Vec::new(),
                            affected_ids: Vec::new(),
                            full_reinit: true,
                        });
                    }
                }
            }
        }

        let mut changed_populated: Vec<usize> = Vec::new();
        for &sphere_id in &changed {
            self.spheres[sphere_id] = new_spheres[sphere_id];
            self.refresh_periodic_images(sphere_id, &mut changed_populated);
        }

        if let Some(ref mut grid) = self.grid {
            grid.update(&self.populated, &changed_populated);
        }

        self.refresh_collisions(&affected);

        // One extra sweep: post-update neighbors of changed spheres that the
        // pre-update lists missed (spheres moved into a new neighborhood).
        let mut newly_affected: Vec<usize> = Vec::new();
        for &sphere_id in &changed {
            for neighbor in &self.collisions[sphere_id] {
                let canonical_id = neighbor.index % self.spheres.len();
                if affected.binary_search(&canonical_id).is_err() {
                    if let Err(pos) = newly_affected.binary_search(&canonical_id) {
                        newly_affected.insert(pos, canonical_id);
                    }
                }
            }
        }

        if !newly_affected.is_empty() {
            self.refresh_collisions(&newly_affected);
            affected.extend(newly_affected);
            affected.sort_unstable();
            affected.dedup();
        }

        self.recount_collisions();
        debug!(
            "update: {} changed, {} affected",
            changed.len(),
            affected.len()
        );

        Some(UpdateOutcome {
            changed_ids: changed,
            affected_ids: affected,
            full_reinit: false,
        })
    }

    /// Flip a sphere's exclusion flag in place.
    /// Returns the affected sphere ids, or `None` when already in the
    /// requested state.
    pub(crate) fn set_exclusion(&mut self, id: usize, excluded: bool) -> Option<Vec<usize>> {
        if id >= self.spheres.len() || self.exclusion[id] == excluded {
            return None;
        }

        self.exclusion[id] = excluded;
        self.mirror_exclusion_to_images(id);

        let mut affected = vec![id];
        for neighbor in &self.collisions[id] {
            let canonical_id = neighbor.index % self.spheres.len();
            if let Err(pos) = affected.binary_search(&canonical_id) {
                affected.insert(pos, canonical_id);
            }
        }

        Some(affected)
    }

    /// Select exactly one direction per undirected colliding pair.
    ///
    /// The owning side is the one with the shorter collision list, with the
    /// smaller id breaking ties; a pair with a periodic replica is always
    /// owned by the canonical side. Excluded spheres never appear. With an
    /// involvement mask both canonical endpoints must be involved; with
    /// grouping, pairs whose canonical spheres share a label are dropped.
    pub(crate) fn relevant_pairs(
        &self,
        involvement: Option<&[bool]>,
        grouping: Option<&[i32]>,
    ) -> Vec<(usize, usize)> {
        let n = self.spheres.len();
        let mut pairs = Vec::with_capacity(self.total_collisions);

        for (id_a, neighbors) in self.collisions.iter().enumerate() {
            if self.exclusion[id_a] {
                continue;
            }
            if involvement.is_some_and(|inv| !inv.get(id_a).copied().unwrap_or(false)) {
                continue;
            }
            for neighbor in neighbors {
                let id_b = neighbor.index;
                let canonical_b = id_b % n;
                if self.exclusion[canonical_b] {
                    continue;
                }
                if involvement.is_some_and(|inv| !inv.get(canonical_b).copied().unwrap_or(false)) {
                    continue;
                }
                let owned = id_b >= n || {
                    let len_a = self.collisions[id_a].len();
                    let len_b = self.collisions[id_b].len();
                    len_a < len_b || (len_a == len_b && id_a < id_b)
                };
                if !owned {
                    continue;
                }
                if grouping.is_some_and(|g| g[id_a] == g[canonical_b]) {
                    continue;
                }
                pairs.push((id_a, id_b));
            }
        }

        pairs
    }

    #[inline]
    pub(crate) fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    #[inline]
    pub(crate) fn populated(&self) -> &[Sphere] {
        &self.populated
    }

    #[inline]
    pub(crate) fn collisions_of(&self, id: usize) -> &[ValuedId] {
        &self.collisions[id]
    }

    #[inline]
    pub(crate) fn exclusion(&self) -> &[bool] {
        &self.exclusion
    }

    #[inline]
    pub(crate) fn is_excluded(&self, id: usize) -> bool {
        id < self.exclusion.len() && self.exclusion[id]
    }

    #[inline]
    pub(crate) const fn periodic_box(&self) -> Option<&PeriodicBox> {
        self.periodic_box.as_ref()
    }

    #[inline]
    pub(crate) const fn total_collisions(&self) -> usize {
        self.total_collisions
    }

    #[inline]
    pub(crate) const fn tolerance(&self) -> Tolerance {
        self.tol
    }

    pub(crate) fn reinit_threshold(&self) -> usize {
        // At least 10, otherwise small systems would always fully reinit.
        (self.spheres.len() / 2).max(10)
    }

    /// Restore a subset of sphere state from a backup; falls back to a full
    /// copy when the subset is too large or the backups are incompatible.
    pub(crate) fn restore_from(&mut self, backup: &Self, affected_ids: &[usize]) {
        if affected_ids.is_empty()
            || self.spheres.len() != backup.spheres.len()
            || affected_ids.len() > self.reinit_threshold()
            || affected_ids.iter().any(|&id| id >= self.spheres.len())
        {
            *self = backup.clone();
            return;
        }

        let n = self.spheres.len();
        for &id in affected_ids {
            self.spheres[id] = backup.spheres[id];
            self.collisions[id].clone_from(&backup.collisions[id]);
            self.exclusion[id] = backup.exclusion[id];
            self.populated[id] = backup.populated[id];

            if self.periodic_box.is_some() {
                for m in 1..27 {
                    let shifted_id = m * n + id;
                    if shifted_id < self.populated.len() {
                        self.populated[shifted_id] = backup.populated[shifted_id];
                        self.exclusion[shifted_id] = backup.exclusion[shifted_id];
                    }
                }
            }
        }

        self.total_collisions = backup.total_collisions;
        self.grid = backup.grid.clone();
    }

    fn populate(&mut self) {
        if let Some(ref pbox) = self.periodic_box {
            self.populated = pbox.populate(&self.spheres);
        } else {
            self.populated = self.spheres.clone();
        }
    }

    /// Refresh the populated entries of one canonical sphere, recording the
    /// populated ids that moved.
    fn refresh_periodic_images(&mut self, id: usize, changed_populated: &mut Vec<usize>) {
        let n = self.spheres.len();
        self.populated[id] = self.spheres[id];
        changed_populated.push(id);

        if let Some(ref pbox) = self.periodic_box {
            for (g, &(sx, sy, sz)) in NEIGHBOR_SHIFTS.iter().enumerate() {
                let shifted_id = (g + 1) * n + id;
                self.populated[shifted_id] = pbox.shift_sphere(
                    &self.spheres[id],
                    f64::from(sx),
                    f64::from(sy),
                    f64::from(sz),
                );
                changed_populated.push(shifted_id);
            }
        }
    }

    fn mirror_exclusion_to_images(&mut self, id: usize) {
        if self.periodic_box.is_none() {
            return;
        }
        let n = self.spheres.len();
        if self.exclusion.len() != n * 27 {
            return;
        }
        let status = self.exclusion[id];
        for m in 1..27 {
            self.exclusion[m * n + id] = status;
        }
    }

    fn detect_all_collisions(&mut self) {
        let n = self.spheres.len();
        self.collisions = vec![Vec::new(); n];

        if let Some(ref grid) = self.grid {
            let scans: Vec<_> = (0..n)
                .into_par_iter()
                .map(|id| grid.find_collisions(id, true))
                .collect();

            for (id, scan) in scans.into_iter().enumerate() {
                self.collisions[id] = scan.neighbors;
                self.exclusion[id] = scan.engulfed;
            }

            if self.periodic_box.is_some() {
                for id in 0..n {
                    self.mirror_exclusion_to_images(id);
                }
            }
        }

        self.recount_collisions();
    }

    fn refresh_collisions(&mut self, sphere_ids: &[usize]) {
        if let Some(ref grid) = self.grid {
            let scans: Vec<_> = sphere_ids
                .par_iter()
                .map(|&id| (id, grid.find_collisions(id, true)))
                .collect();

            for (id, scan) in scans {
                self.collisions[id] = scan.neighbors;
                self.exclusion[id] = scan.engulfed;
            }

            if self.periodic_box.is_some() {
                for &id in sphere_ids {
                    self.mirror_exclusion_to_images(id);
                }
            }
        }
    }

    fn recount_collisions(&mut self) {
        self.total_collisions = self.collisions.iter().map(Vec::len).sum::<usize>() / 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: Tolerance = Tolerance {
        epsilon: 1e-10,
        full_circle_slack: 1e-3,
    };

    fn chain(n: usize, spacing: f64) -> Vec<Sphere> {
        (0..n)
            .map(|i| Sphere::from_coords(spacing * i as f64, 0.0, 0.0, 1.0))
            .collect()
    }

    #[test]
    fn init_detects_collisions() {
        let mut container = SphereContainer::new(TOL);
        container.init(chain(3, 1.5), None);
        assert_eq!(container.total_collisions(), 2);
        assert_eq!(container.collisions_of(1).len(), 2);
    }

    #[test]
    fn relevant_pairs_cover_each_collision_once() {
        let mut container = SphereContainer::new(TOL);
        container.init(chain(5, 1.5), None);
        let pairs = container.relevant_pairs(None, None);
        assert_eq!(pairs.len(), container.total_collisions());

        let mut seen: Vec<(usize, usize)> = pairs
            .iter()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), pairs.len());
    }

    #[test]
    fn relevant_pairs_prefer_shorter_collision_list() {
        // Middle sphere of a chain has the longer list, so end spheres own
        // their pairs with it.
        let mut container = SphereContainer::new(TOL);
        container.init(chain(3, 1.5), None);
        let pairs = container.relevant_pairs(None, None);
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(2, 1)));
    }

    #[test]
    fn grouping_suppresses_same_group_pairs() {
        let mut container = SphereContainer::new(TOL);
        container.init(chain(3, 1.5), None);
        let grouping = vec![0, 0, 1];
        let pairs = container.relevant_pairs(None, Some(&grouping));
        assert_eq!(pairs, vec![(2, 1)]);
    }

    #[test]
    fn update_detects_changes_without_explicit_ids() {
        let mut container = SphereContainer::new(TOL);
        let mut spheres = chain(20, 3.0);
        container.init(spheres.clone(), None);
        assert_eq!(container.total_collisions(), 0);

        spheres[1] = Sphere::from_coords(1.5, 0.0, 0.0, 1.0);
        let outcome = container.update(&spheres, None).unwrap();
        assert!(!outcome.full_reinit);
        assert_eq!(outcome.changed_ids, vec![1]);
        assert!(container.total_collisions() > 0);
    }

    #[test]
    fn update_with_no_change_is_noop() {
        let mut container = SphereContainer::new(TOL);
        let spheres = chain(4, 1.5);
        container.init(spheres.clone(), None);
        assert!(container.update(&spheres, None).is_none());
        assert!(container.update(&spheres, Some(&[0, 1])).is_none());
    }

    #[test]
    fn update_of_most_spheres_falls_back_to_reinit() {
        let mut container = SphereContainer::new(TOL);
        let spheres = chain(12, 3.0);
        container.init(spheres.clone(), None);

        let moved: Vec<Sphere> = spheres
            .iter()
            .map(|s| Sphere::new(s.center + nalgebra::Vector3::new(0.5, 0.0, 0.0), s.r))
            .collect();
        let outcome = container.update(&moved, None).unwrap();
        assert!(outcome.full_reinit);
    }

    #[test]
    fn periodic_images_follow_updates() {
        let pbox = PeriodicBox::from_corners((0.0, 0.0, 0.0), (50.0, 50.0, 50.0));
        let mut container = SphereContainer::new(TOL);
        let mut spheres = chain(12, 3.0);
        container.init(spheres.clone(), Some(pbox));
        assert_eq!(container.populated().len(), 12 * 27);

        spheres[0] = Sphere::from_coords(0.5, 0.0, 0.0, 1.0);
        let outcome = container.update(&spheres, Some(&[0])).unwrap();
        assert!(!outcome.full_reinit);
        let n = 12;
        let (sx, sy, sz) = NEIGHBOR_SHIFTS[0];
        let img = container.populated()[n];
        assert!(
            (img.center.x - 50.0f64.mul_add(f64::from(sx), 0.5)).abs() < 1e-12
                && (img.center.y - 50.0 * f64::from(sy)).abs() < 1e-12
                && (img.center.z - 50.0 * f64::from(sz)).abs() < 1e-12
        );
    }
}
