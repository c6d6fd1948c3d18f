//! Provides input/output adapters around the structure model.
//!
//! - [`snapshot`] reads and writes structures and prepared systems as TOML documents.
//! - [`solvent`] loads pre-equilibrated solvent box coordinates from CSV.
//! - [`rules`] parses rename-rule and bond files into structured edits.

pub mod rules;
pub mod snapshot;
pub mod solvent;
