//! Incrementally updateable radical tessellation.
//!
//! Keeps per-sphere contact lists and cell accumulators between calls so
//! that moving a few spheres only rebuilds the contacts of the affected
//! neighborhood. An optional one-level backup supports undoing the last
//! update.

use log::debug;

use crate::container::SphereContainer;
use crate::error::TessellationError;
use crate::tessellation::{accumulate_cells, construct_contacts};
use crate::tolerance::Tolerance;
use crate::types::{
    Ball, CellAccumulator, CellSummary, ContactSummary, PeriodicBox, Sphere, Tessellation,
    TotalCellsSummary, TotalContactsSummary,
};

#[derive(Clone)]
struct State {
    container: SphereContainer,
    /// Every valid contact, stored under both endpoint spheres.
    contacts_by_sphere: Vec<Vec<ContactSummary>>,
    cell_accumulators: Vec<CellAccumulator>,
    cells: Vec<CellSummary>,
    changed_ids: Vec<usize>,
    affected_ids: Vec<usize>,
    full_reinit: bool,
}

impl State {
    fn new(tol: Tolerance) -> Self {
        Self {
            container: SphereContainer::new(tol),
            contacts_by_sphere: Vec::new(),
            cell_accumulators: Vec::new(),
            cells: Vec::new(),
            changed_ids: Vec::new(),
            affected_ids: Vec::new(),
            full_reinit: true,
        }
    }

    fn is_initialized(&self) -> bool {
        !self.contacts_by_sphere.is_empty() && !self.cells.is_empty()
    }
}

/// Radical tessellation with incremental updates and optional undo.
///
/// # Example
///
/// ```
/// use powervor::{Ball, UpdateableTessellation};
///
/// let mut balls = vec![
///     Ball::new(0.0, 0.0, 0.0, 1.0),
///     Ball::new(2.0, 0.0, 0.0, 1.0),
///     Ball::new(4.0, 0.0, 0.0, 1.0),
/// ];
///
/// let mut tess = UpdateableTessellation::with_backup();
/// tess.init(&balls, 1.0, None).unwrap();
///
/// balls[0].x += 0.1;
/// assert!(tess.update_with_changed(&balls, &[0]));
///
/// let summary = tess.summary();
/// assert_eq!(summary.contacts.len(), 2);
/// ```
pub struct UpdateableTessellation {
    state: State,
    backup: Option<State>,
    backup_enabled: bool,
    probe: f64,
    tolerance: Tolerance,
}

impl UpdateableTessellation {
    /// Without backup support: `restore` is always a no-op.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(false, Tolerance::default())
    }

    /// With a one-level backup for `restore`.
    #[must_use]
    pub fn with_backup() -> Self {
        Self::with_options(true, Tolerance::default())
    }

    #[must_use]
    pub fn with_options(backup_enabled: bool, tolerance: Tolerance) -> Self {
        Self {
            state: State::new(tolerance),
            backup: None,
            backup_enabled,
            probe: 0.0,
            tolerance,
        }
    }

    /// Full (re)build from scratch.
    ///
    /// # Errors
    ///
    /// [`TessellationError::EmptyInput`] for an empty ball list,
    /// [`TessellationError::NoCellsConstructed`] when nothing could be
    /// summarized.
    pub fn init(
        &mut self,
        balls: &[Ball],
        probe: f64,
        periodic_box: Option<&PeriodicBox>,
    ) -> Result<(), TessellationError> {
        if balls.is_empty() {
            return Err(TessellationError::EmptyInput);
        }

        self.probe = probe;
        self.prepare_for_update();

        let spheres: Vec<Sphere> = balls
            .iter()
            .map(|b| Sphere::from_ball(b, probe))
            .collect();
        self.state.container.init(spheres, periodic_box.copied());

        self.state.full_reinit = true;
        self.state.changed_ids.clear();
        self.state.affected_ids.clear();

        self.compute_full_tessellation();

        if self.state.cells.is_empty() {
            Err(TessellationError::NoCellsConstructed)
        } else {
            Ok(())
        }
    }

    /// Update by diffing every ball against the stored state.
    /// Returns false when nothing changed.
    pub fn update(&mut self, balls: &[Ball]) -> bool {
        self.update_internal(balls, None)
    }

    /// Update with an explicit changed-ball list; cheaper than [`Self::update`]
    /// when the caller knows what moved. An empty list is a no-op.
    pub fn update_with_changed(&mut self, balls: &[Ball], changed_ids: &[usize]) -> bool {
        if changed_ids.is_empty() {
            return false;
        }
        self.update_internal(balls, Some(changed_ids))
    }

    /// Mask a sphere out of (or back into) the tessellation without
    /// removing it. Returns false when the state did not change.
    pub fn set_exclusion(&mut self, id: usize, excluded: bool) -> bool {
        if !self.state.is_initialized()
            || id >= self.state.contacts_by_sphere.len()
            || self.state.container.is_excluded(id) == excluded
        {
            return false;
        }

        self.prepare_for_update();

        let affected = if excluded {
            // Affected set comes from current contacts, before they vanish.
            let mut affected = vec![id];
            for contact in &self.state.contacts_by_sphere[id] {
                let neighbor_id = if contact.id_a == id {
                    contact.id_b
                } else {
                    contact.id_a
                };
                if let Err(pos) = affected.binary_search(&neighbor_id) {
                    affected.insert(pos, neighbor_id);
                }
            }
            self.state.container.set_exclusion(id, true);
            affected
        } else {
            match self.state.container.set_exclusion(id, false) {
                Some(affected) => affected,
                None => return false,
            }
        };

        self.state.changed_ids = vec![id];
        self.state.affected_ids = affected;
        self.state.full_reinit = false;

        self.update_using_affected();

        true
    }

    /// Undo the last update, restoring the previous snapshot. Only valid
    /// once per update and only when built with backup support; any other
    /// call is a no-op returning false.
    pub fn restore(&mut self) -> bool {
        if !self.backup_enabled {
            return false;
        }

        let Some(backup) = self.backup.take() else {
            return false;
        };

        let affected = self.state.affected_ids.clone();
        self.state
            .container
            .restore_from(&backup.container, &affected);

        let n = self.state.contacts_by_sphere.len();
        let needs_rebuild = if self.state.full_reinit
            || backup.contacts_by_sphere.len() != n
            || backup.cell_accumulators.len() != n
        {
            self.state.contacts_by_sphere = backup.contacts_by_sphere;
            self.state.cell_accumulators = backup.cell_accumulators;
            self.state.cells = backup.cells;
            false
        } else {
            for &id in &affected {
                if id < n {
                    self.state.contacts_by_sphere[id]
                        .clone_from(&backup.contacts_by_sphere[id]);
                    self.state.cell_accumulators[id].clone_from(&backup.cell_accumulators[id]);
                }
            }
            true
        };

        self.state.changed_ids = backup.changed_ids;
        self.state.affected_ids = backup.affected_ids;
        self.state.full_reinit = backup.full_reinit;

        if needs_rebuild {
            self.rebuild_cells();
        }

        true
    }

    /// Contacts touching one sphere.
    #[must_use]
    pub fn contacts_for_sphere(&self, sphere_id: usize) -> &[ContactSummary] {
        self.state
            .contacts_by_sphere
            .get(sphere_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Current cell summaries.
    #[must_use]
    pub fn cells(&self) -> &[CellSummary] {
        &self.state.cells
    }

    /// Flatten the per-sphere contact store into a full [`Tessellation`].
    /// Each contact is listed once, under its lower id.
    #[must_use]
    pub fn summary(&self) -> Tessellation {
        let mut contacts = Vec::new();
        for (i, sphere_contacts) in self.state.contacts_by_sphere.iter().enumerate() {
            for cds in sphere_contacts {
                if cds.id_a == i {
                    contacts.push(*cds);
                }
            }
        }

        let mut total_contacts = TotalContactsSummary::default();
        for cds in &contacts {
            total_contacts.add(cds);
        }
        let mut total_cells = TotalCellsSummary::default();
        for cell in &self.state.cells {
            total_cells.add(cell);
        }

        Tessellation {
            total_spheres: self.state.container.spheres().len(),
            total_collisions: self.state.container.total_collisions(),
            total_relevant_pairs: self.state.container.relevant_pairs(None, None).len(),
            contacts,
            cells: self.state.cells.clone(),
            total_contacts,
            total_cells,
        }
    }

    /// Ids that actually changed in the last update.
    #[must_use]
    pub fn changed_ids(&self) -> &[usize] {
        &self.state.changed_ids
    }

    /// Ids whose contacts were rebuilt in the last update.
    #[must_use]
    pub fn affected_ids(&self) -> &[usize] {
        &self.state.affected_ids
    }

    #[must_use]
    pub const fn last_update_was_full_reinit(&self) -> bool {
        self.state.full_reinit
    }

    #[must_use]
    pub const fn backup_enabled(&self) -> bool {
        self.backup_enabled
    }

    fn prepare_for_update(&mut self) {
        if self.backup_enabled && self.state.is_initialized() {
            self.backup = Some(self.state.clone());
        }
        self.state.changed_ids.clear();
        self.state.affected_ids.clear();
        self.state.full_reinit = false;
    }

    fn update_internal(&mut self, balls: &[Ball], changed_ids: Option<&[usize]>) -> bool {
        if balls.is_empty() {
            return false;
        }

        self.prepare_for_update();

        let new_spheres: Vec<Sphere> = balls
            .iter()
            .map(|b| Sphere::from_ball(b, self.probe))
            .collect();

        match self.state.container.update(&new_spheres, changed_ids) {
            None => false,
            Some(outcome) if outcome.full_reinit => {
                self.state.full_reinit = true;
                self.compute_full_tessellation();
                true
            }
            Some(outcome) => {
                self.state.changed_ids = outcome.changed_ids;
                self.state.affected_ids = outcome.affected_ids;
                self.state.full_reinit = false;
                self.update_using_affected();
                true
            }
        }
    }

    fn compute_full_tessellation(&mut self) {
        let n = self.state.container.spheres().len();

        let pairs = self.state.container.relevant_pairs(None, None);
        let constructed = construct_contacts(&self.state.container, &pairs);

        self.state.contacts_by_sphere = vec![Vec::new(); n];
        for cds in &constructed.contacts {
            if cds.area > 0.0 {
                self.state.contacts_by_sphere[cds.id_a].push(*cds);
                if cds.id_b != cds.id_a {
                    self.state.contacts_by_sphere[cds.id_b].push(*cds);
                }
            }
        }

        self.state.cell_accumulators = accumulate_cells(&self.state.container, &constructed);
        self.rebuild_cells();
    }

    fn update_using_affected(&mut self) {
        let n = self.state.container.spheres().len();

        let mut involvement = vec![false; n];
        for &id in &self.state.affected_ids {
            if id < n {
                involvement[id] = true;
            }
        }

        let pairs = self.state.container.relevant_pairs(Some(&involvement), None);
        let constructed = construct_contacts(&self.state.container, &pairs);
        debug!(
            "incremental update: {} affected spheres, {} pairs rebuilt",
            self.state.affected_ids.len(),
            pairs.len()
        );

        // Stale contacts are exactly those with both endpoints involved;
        // contacts to uninvolved spheres were not recomputed and stay.
        for &sphere_id in &self.state.affected_ids {
            if sphere_id < n {
                self.state.contacts_by_sphere[sphere_id]
                    .retain(|cds| !(involvement[cds.id_a % n] && involvement[cds.id_b % n]));
            }
        }

        for cds in &constructed.contacts {
            if cds.area > 0.0 {
                self.state.contacts_by_sphere[cds.id_a].push(*cds);
                if cds.id_b != cds.id_a {
                    self.state.contacts_by_sphere[cds.id_b].push(*cds);
                }
            }
        }

        self.recompute_cells_for_affected();
    }

    fn recompute_cells_for_affected(&mut self) {
        let tol = self.state.container.tolerance();
        let n = self.state.container.spheres().len();

        for i in 0..self.state.affected_ids.len() {
            let sphere_id = self.state.affected_ids[i];
            if sphere_id >= n {
                continue;
            }

            let mut acc = CellAccumulator::for_id(sphere_id);
            for cds in &self.state.contacts_by_sphere[sphere_id] {
                acc.add(cds);
            }

            let r = self.state.container.spheres()[sphere_id].r;
            if acc.stage == 1 {
                acc.finalize(r, tol);
            } else if acc.stage == 0
                && !self.state.container.is_excluded(sphere_id)
                && self.state.container.collisions_of(sphere_id).is_empty()
            {
                acc.finalize_detached(sphere_id, r);
            }

            self.state.cell_accumulators[sphere_id] = acc;
        }

        self.rebuild_cells();
    }

    fn rebuild_cells(&mut self) {
        self.state.cells = self
            .state
            .cell_accumulators
            .iter()
            .filter_map(CellAccumulator::to_summary)
            .collect();
    }
}

impl Default for UpdateableTessellation {
    fn default() -> Self {
        Self::new()
    }
}
