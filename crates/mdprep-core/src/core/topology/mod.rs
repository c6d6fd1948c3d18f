//! # Topology Module
//!
//! Residue templates, patches and the topology database they are loaded from.
//!
//! Templates are immutable value records. Chain-terminal and disulfide variants are
//! derived with [`patch::apply_patch`], which always returns a new template and leaves
//! the library untouched.
//!
//! - [`template`] - Residue, patch and internal-coordinate records
//! - [`reference`] - Parsing of `-`/`+`/`*` atom-name markers
//! - [`patch`] - Patch application
//! - [`library`] - The TOML-backed topology database

pub mod library;
pub mod patch;
pub mod reference;
pub mod template;
