//! Configuration module for ward
//!
//! This module provides configuration management including:
//! - Root-relative path layout
//! - Settings file and `WARD_*` environment overrides
//! - Exclusion patterns applied at pack time

pub mod exclusions;
pub mod paths;
pub mod settings;

pub use exclusions::ExclusionSet;
pub use paths::WardPaths;
pub use settings::Settings;
