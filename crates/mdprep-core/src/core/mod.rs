//! # Core Module
//!
//! Data models, force-field tables and stateless algorithms that the preparation engine
//! builds on.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Segments, residues and atoms, plus the finalized topology output
//! - **Topology Knowledge** ([`topology`]) - Residue templates, patches, atom references and the template library
//! - **Force Field Parameters** ([`forcefield`]) - Bonded and nonbonded constants with wildcard lookups
//! - **Neighbor Search** ([`spatial`]) - Uniform cell grids for fixed-radius queries
//! - **File I/O** ([`io`]) - Structure snapshots, solvent box templates and rule files
//! - **Diagnostics** ([`diagnostics`]) - Warnings collected while a run continues
//! - **Utilities** ([`utils`]) - Internal-coordinate geometry and compensated summation

pub mod diagnostics;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod spatial;
pub mod topology;
pub mod utils;
