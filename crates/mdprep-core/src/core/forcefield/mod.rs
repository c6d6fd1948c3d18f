//! # Forcefield Module
//!
//! Parameter tables for bonded and nonbonded terms, keyed by atom-type tuples.
//!
//! Bond, angle and Urey-Bradley entries are stored under both orderings of their key.
//! Dihedral and improper lookups fall back to wildcard (`X`) keys in the order used by
//! CHARMM-style parameter files.

pub mod params;
pub mod parameterize;
