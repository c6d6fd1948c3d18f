//! # mdprep Core Library
//!
//! Builds simulation-ready molecular systems from partially specified structures: assigns
//! force-field types, charges and masses from residue templates, rebuilds missing atoms
//! from internal coordinates, enumerates bonded terms, detects disulfide bridges, and
//! surrounds the result with solvent and counter-ions.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `TopologyOutput`),
//!   topology templates, parameter tables, the spatial grid and file adapters.
//!
//! - **[`engine`]: The Logic Core.** The individual preparation stages: topology assembly,
//!   disulfide patching, solvation, ionization and the solvent topology extension, together
//!   with their configuration, error and progress types.
//!
//! - **[`workflows`]: The Public API.** Chains the engine stages into a complete preparation
//!   run with phase reporting.

pub mod core;
pub mod engine;
pub mod workflows;
