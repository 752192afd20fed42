//! Archive catalog
//!
//! - `name`: the filename codec (timestamp <-> file name)
//! - `entry`: `ArchiveEntry` and `Provenance`, plus catalog ordering
//! - `registry`: scanning storage or history into a catalog, and selection

pub mod entry;
pub mod name;
pub mod registry;

pub use entry::{catalog_order, sort_catalog, ArchiveEntry, Provenance};
pub use registry::{select, select_latest, ArchiveRegistry, ScanOutcome};
