//! # Spatial Module
//!
//! Uniform cell grids for short-range neighbor searches over atom positions.

pub mod grid;
