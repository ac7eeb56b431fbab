//! Error taxonomy of the tessellation engine.
//!
//! Only structurally invalid input fails; geometrically surprising but valid
//! input (disjoint clusters, engulfed spheres) produces empty-but-valid
//! results, and per-pair numeric degeneracies are recovered locally as
//! "no contact".

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TessellationError {
    /// No input spheres were provided; raised before any indexing work.
    #[error("no input spheres provided")]
    EmptyInput,

    /// The geometry was valid but produced zero contacts.
    #[error("no contacts were constructed")]
    NoContactsConstructed,

    /// The geometry was valid but produced zero cells.
    #[error("no cells were constructed")]
    NoCellsConstructed,

    /// A per-sphere label vector does not match the sphere count.
    #[error("labeling vector has length {found}, expected {expected}")]
    InconsistentLabeling { expected: usize, found: usize },
}
