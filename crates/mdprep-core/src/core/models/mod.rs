//! # Core Models Module
//!
//! This module contains the data structures used to represent molecular structures
//! before, during and after preparation.
//!
//! ## Overview
//!
//! A [`structure::Structure`] owns its segments, residues and atoms through slot maps
//! and typed IDs. Atom positions are optional: atoms that are missing from an input
//! structure are created from residue templates without a position and filled in later
//! by the internal-coordinate solver.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom name, force-field assignment and optional position
//! - [`residue`] - Residue numbering, naming and ordered atom membership
//! - [`segment`] - Ordered residues of one chain
//! - [`structure`] - The complete structure with lookup maps
//! - [`topology`] - The finalized atom records and bonded-term lists
//! - [`ids`] - Unique identifier types for atoms, residues, and segments
//!
//! ## Usage
//!
//! ```ignore
//! use mdprep::core::models::{atom::Atom, structure::Structure};
//!
//! let mut structure = Structure::new();
//! let segment_id = structure.add_segment("PROA");
//! let residue_id = structure.add_residue(segment_id, 1, "ALA").unwrap();
//! structure.add_atom_to_residue(residue_id, Atom::new("CA", Some(Point3::origin())));
//! ```

pub mod atom;
pub mod ids;
pub mod residue;
pub mod segment;
pub mod structure;
pub mod topology;
