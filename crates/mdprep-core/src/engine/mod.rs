//! # Engine Module
//!
//! The individual stages of a preparation run, each operating on the data models of
//! [`crate::core`] and reporting recoverable problems through a
//! [`Diagnostics`](crate::core::diagnostics::Diagnostics) sink.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builders for assembly, solvation and ionization settings
//! - **Topology Assembly** ([`assembly`]) - Template matching, coordinate rebuilding and bonded-term enumeration
//! - **Disulfide Bridges** ([`disulfide`]) - Cysteine pair detection and partner patching
//! - **Solvation** ([`solvation`]) - Tiling a solvent box template around the solute
//! - **Ionization** ([`ionization`]) - Potential-ranked replacement of solvent by ions
//! - **Solvent Topology** ([`solvent`]) - Appending solvent and ion segments to the assembled system
//! - **Summary** ([`summary`]) - Mass, charge and box figures of the final system
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Fatal error taxonomy shared by all stages

pub mod assembly;
pub mod config;
pub mod disulfide;
pub mod error;
pub mod ionization;
pub mod progress;
pub mod solvation;
pub mod solvent;
pub mod summary;
