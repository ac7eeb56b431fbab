//! Tessellation orchestration.
//!
//! Drives contact construction over all relevant colliding pairs in
//! parallel, de-duplicates periodic boundary contacts down to one canonical
//! representative, folds contact contributions into per-sphere cell
//! summaries, and offers re-aggregation by caller-supplied group labels.

use std::collections::BTreeMap;

use log::{debug, warn};
use rayon::prelude::*;

use crate::contact::{build_contact, ContactScratch};
use crate::container::SphereContainer;
use crate::error::TessellationError;
use crate::types::{
    Ball, CellAccumulator, CellGroup, ContactGroup, ContactSummary, GroupedTessellation, Settings,
    Sphere, Tessellation, TotalCellsSummary, TotalContactsSummary,
};

/// Compute the radical tessellation of `balls` with radii inflated by
/// `probe`, with default settings otherwise.
///
/// # Errors
///
/// Returns [`TessellationError::EmptyInput`] for an empty ball list.
pub fn compute_tessellation(balls: &[Ball], probe: f64) -> Result<Tessellation, TessellationError> {
    compute_tessellation_with(balls, &Settings::with_probe(probe))
}

/// Compute the radical tessellation with full [`Settings`].
///
/// Geometrically surprising but valid inputs (disjoint clusters, engulfed
/// spheres) produce an `Ok` result with empty contact lists and fully
/// exposed cells; use [`Tessellation::require_contacts`] when contacts are
/// mandatory for the caller.
///
/// # Errors
///
/// Returns [`TessellationError::EmptyInput`] for an empty ball list.
pub fn compute_tessellation_with(
    balls: &[Ball],
    settings: &Settings,
) -> Result<Tessellation, TessellationError> {
    if balls.is_empty() {
        return Err(TessellationError::EmptyInput);
    }

    let spheres: Vec<Sphere> = balls
        .iter()
        .map(|b| Sphere::from_ball(b, settings.probe))
        .collect();

    let mut container = SphereContainer::new(settings.tolerance);
    container.init(spheres, settings.periodic_box);

    let grouping = validated_grouping(settings.grouping.as_deref(), balls.len());

    Ok(assemble_tessellation(&container, grouping))
}

/// Re-aggregate contacts and cells by per-sphere group labels. Contacts
/// inside one group are left out; cross-group contacts merge into one
/// summary per unordered label pair.
///
/// # Errors
///
/// Returns [`TessellationError::InconsistentLabeling`] when the label
/// vector length does not match the sphere count.
pub fn group_results(
    tessellation: &Tessellation,
    grouping: &[i32],
) -> Result<GroupedTessellation, TessellationError> {
    if grouping.len() != tessellation.total_spheres {
        return Err(TessellationError::InconsistentLabeling {
            expected: tessellation.total_spheres,
            found: grouping.len(),
        });
    }

    let mut grouped = GroupedTessellation::default();

    let mut contact_groups: BTreeMap<(i32, i32), usize> = BTreeMap::new();
    for (i, cds) in tessellation.contacts.iter().enumerate() {
        if cds.id_a >= grouping.len() || cds.id_b >= grouping.len() {
            continue;
        }
        let mut key = (grouping[cds.id_a], grouping[cds.id_b]);
        if key.0 == key.1 {
            continue;
        }
        if key.0 > key.1 {
            std::mem::swap(&mut key.0, &mut key.1);
        }
        let index = *contact_groups.entry(key).or_insert_with(|| {
            grouped.contact_groups.push(ContactGroup {
                groups: key,
                representative_contact: i,
                summary: TotalContactsSummary::default(),
            });
            grouped.contact_groups.len() - 1
        });
        grouped.contact_groups[index].summary.add(cds);
    }

    let mut cell_groups: BTreeMap<i32, usize> = BTreeMap::new();
    for (i, cell) in tessellation.cells.iter().enumerate() {
        if cell.id >= grouping.len() {
            continue;
        }
        let key = grouping[cell.id];
        let index = *cell_groups.entry(key).or_insert_with(|| {
            grouped.cell_groups.push(CellGroup {
                group: key,
                representative_cell: i,
                summary: TotalCellsSummary::default(),
            });
            grouped.cell_groups.len() - 1
        });
        grouped.cell_groups[index].summary.add(cell);
    }

    Ok(grouped)
}

/// A length-mismatched grouping is ignored rather than fatal.
pub(crate) fn validated_grouping(grouping: Option<&[i32]>, n: usize) -> Option<&[i32]> {
    match grouping {
        Some(g) if g.len() != n => {
            warn!(
                "grouping vector has length {}, expected {}; ignoring grouping",
                g.len(),
                n
            );
            None
        }
        other => other,
    }
}

/// Contacts produced for one batch of relevant pairs.
pub(crate) struct ConstructedContacts {
    /// One contact per physical pair, ids canonical and ordered.
    pub contacts: Vec<ContactSummary>,
    /// Pre-deduplication contacts with raw replica ids; only filled for
    /// periodic runs, where cell accounting needs every boundary variant.
    pub contacts_with_redundancy: Vec<ContactSummary>,
}

/// Run contact construction over `pairs` in parallel. Workers reuse one
/// contour scratch each; results land at their pair's index, so output
/// order does not depend on scheduling.
pub(crate) fn construct_contacts(
    container: &SphereContainer,
    pairs: &[(usize, usize)],
) -> ConstructedContacts {
    let spheres = container.populated();
    let exclusion = container.exclusion();
    let tol = container.tolerance();

    let raw: Vec<Option<ContactSummary>> = pairs
        .par_iter()
        .map_init(ContactScratch::new, |scratch, &(a_id, b_id)| {
            build_contact(
                spheres,
                exclusion,
                a_id,
                b_id,
                container.collisions_of(a_id),
                tol,
                scratch,
            )
        })
        .collect();

    let mut summaries: Vec<ContactSummary> = Vec::with_capacity(pairs.len());
    for summary in raw.into_iter().flatten() {
        if summary.area > 0.0 {
            let mut summary = summary;
            summary.ensure_ids_ordered();
            summaries.push(summary);
        }
    }

    if container.periodic_box().is_some() {
        let deduped = deduplicate_periodic_contacts(&summaries, container.spheres().len());
        debug!(
            "constructed {} contacts ({} before periodic dedup)",
            deduped.len(),
            summaries.len()
        );
        ConstructedContacts {
            contacts: deduped,
            contacts_with_redundancy: summaries,
        }
    } else {
        debug!("constructed {} contacts", summaries.len());
        ConstructedContacts {
            contacts: summaries,
            contacts_with_redundancy: Vec::new(),
        }
    }
}

/// Keep exactly one representative per physical boundary contact, remapping
/// its ids into the canonical range.
fn deduplicate_periodic_contacts(summaries: &[ContactSummary], n: usize) -> Vec<ContactSummary> {
    let mut boundary_by_sphere: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, summary) in summaries.iter().enumerate() {
        if summary.id_a >= n || summary.id_b >= n {
            boundary_by_sphere[summary.id_a % n].push(i);
            boundary_by_sphere[summary.id_b % n].push(i);
        }
    }

    let mut canonical_ids: Vec<usize> = (0..summaries.len()).collect();

    for (i, summary) in summaries.iter().enumerate() {
        if summary.id_a >= n || summary.id_b >= n {
            let sphere_a = summary.id_a % n;
            let sphere_b = summary.id_b % n;
            let candidates = if boundary_by_sphere[sphere_a].len()
                <= boundary_by_sphere[sphere_b].len()
            {
                &boundary_by_sphere[sphere_a]
            } else {
                &boundary_by_sphere[sphere_b]
            };
            for &candidate_id in candidates {
                let candidate = &summaries[candidate_id];
                let candidate_a = candidate.id_a % n;
                let candidate_b = candidate.id_b % n;
                if (candidate_a == sphere_a && candidate_b == sphere_b)
                    || (candidate_a == sphere_b && candidate_b == sphere_a)
                {
                    canonical_ids[i] = candidate_id;
                    break;
                }
            }
        }
    }

    summaries
        .iter()
        .enumerate()
        .filter(|(i, _)| canonical_ids[*i] == *i)
        .map(|(_, s)| {
            let mut cs = *s;
            cs.id_a %= n;
            cs.id_b %= n;
            cs.ensure_ids_ordered();
            cs
        })
        .collect()
}

/// Fold contact contributions into per-sphere cell accumulators and
/// finalize SAS area/volume. Spheres with no collisions at all finalize as
/// fully exposed; excluded spheres get no cell.
pub(crate) fn accumulate_cells(
    container: &SphereContainer,
    constructed: &ConstructedContacts,
) -> Vec<CellAccumulator> {
    let n = container.spheres().len();
    let tol = container.tolerance();
    let mut accumulators: Vec<CellAccumulator> = (0..n).map(CellAccumulator::for_id).collect();

    // For periodic runs every boundary variant contributes to its canonical
    // endpoint; the replica endpoint is skipped.
    let source = if constructed.contacts_with_redundancy.is_empty() {
        &constructed.contacts
    } else {
        &constructed.contacts_with_redundancy
    };

    for cds in source {
        if cds.area > 0.0 {
            if cds.id_a < n {
                accumulators[cds.id_a].add(cds);
            }
            if cds.id_b < n && cds.id_b != cds.id_a {
                accumulators[cds.id_b].add(cds);
            }
        }
    }

    for (i, acc) in accumulators.iter_mut().enumerate() {
        let r = container.spheres()[i].r;
        if acc.stage == 1 {
            acc.finalize(r, tol);
        } else if acc.stage == 0
            && !container.is_excluded(i)
            && container.collisions_of(i).is_empty()
        {
            acc.finalize_detached(i, r);
        }
    }

    accumulators
}

fn assemble_tessellation(container: &SphereContainer, grouping: Option<&[i32]>) -> Tessellation {
    let pairs = container.relevant_pairs(None, grouping);
    let constructed = construct_contacts(container, &pairs);

    let mut total_contacts = TotalContactsSummary::default();
    for cds in &constructed.contacts {
        total_contacts.add(cds);
    }

    // Cells are only meaningful when no contacts were suppressed by
    // grouping; a partial contact set would corrupt the SAS balance.
    let mut cells = Vec::new();
    let mut total_cells = TotalCellsSummary::default();
    if grouping.is_none() {
        for acc in accumulate_cells(container, &constructed) {
            if let Some(cell) = acc.to_summary() {
                total_cells.add(&cell);
                cells.push(cell);
            }
        }
    }

    Tessellation {
        total_spheres: container.spheres().len(),
        total_collisions: container.total_collisions(),
        total_relevant_pairs: pairs.len(),
        contacts: constructed.contacts,
        cells,
        total_contacts,
        total_cells,
    }
}
