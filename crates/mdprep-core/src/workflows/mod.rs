//! # Workflows Module
//!
//! Top-level entry points that chain the engine stages into complete runs.
//!
//! - **Preparation Workflow** ([`prepare`]) - Disulfide detection, topology assembly,
//!   solvation, ionization and the solvent topology extension, reported phase by phase.

pub mod prepare;
