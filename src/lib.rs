//! Radical (power/Laguerre) Voronoi tessellation of weighted spheres.
//!
//! Computes, for a set of spheres (e.g. atoms inflated by a solvent probe),
//! the pairwise contact descriptors of the radical tessellation — shared
//! area, boundary arc length, solid angles, signed pyramid volumes — and
//! per-sphere solvent-accessible surface (SAS) areas and enclosed volumes.
//! Supports periodic boxes with canonical de-duplication, grouping of
//! results by caller-supplied labels, and incremental updates with undo.
//!
//! # Example
//!
//! ```
//! use powervor::{compute_tessellation, Ball};
//!
//! let balls = vec![
//!     Ball::new(0.0, 0.0, 0.0, 1.5),
//!     Ball::new(3.0, 0.0, 0.0, 1.5),
//!     Ball::new(1.5, 2.5, 0.0, 1.5),
//! ];
//!
//! let result = compute_tessellation(&balls, 1.4).unwrap();
//!
//! for contact in &result.contacts {
//!     println!("contact {}-{}: area={:.3}", contact.id_a, contact.id_b, contact.area);
//! }
//! for cell in &result.cells {
//!     println!("cell {}: sas_area={:.3} volume={:.3}", cell.id, cell.sas_area, cell.volume);
//! }
//! ```

mod contact;
mod container;
mod contour;
mod error;
mod geometry;
mod grid;
mod tessellation;
mod tolerance;
mod types;
mod updateable;

pub use error::TessellationError;
pub use tessellation::{compute_tessellation, compute_tessellation_with, group_results};
pub use tolerance::{Tolerance, DEFAULT_EPSILON, DEFAULT_FULL_CIRCLE_SLACK};
pub use types::{
    Ball, CellGroup, CellSummary, ContactGroup, ContactSummary, GroupedTessellation, PeriodicBox,
    Settings, Tessellation, TotalCellsSummary, TotalContactsSummary,
};
pub use updateable::UpdateableTessellation;
