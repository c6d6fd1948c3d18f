use thiserror::Error;

use super::config::{ConfigError, ResidueSpecifier};
use crate::core::diagnostics::ResidueLabel;
use crate::core::spatial::grid::GridError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("No residue template named '{}' for {residue}", residue.name)]
    UnknownResidueTemplate { residue: ResidueLabel },

    #[error("Patch '{name}' requested for {residue} is not defined")]
    UnknownPatch { name: String, residue: ResidueLabel },

    #[error("Cannot predict coordinates for atoms {atoms:?} of {residue}")]
    UnresolvedCoordinates {
        residue: ResidueLabel,
        atoms: Vec<String>,
    },

    #[error("Residue not found in structure: {spec}")]
    ResidueNotFound { spec: ResidueSpecifier },

    #[error("Residue {residue} is not a cysteine")]
    NotCysteine { residue: ResidueLabel },

    #[error("Cysteine {residue} has no SG atom")]
    MissingSulfur { residue: ResidueLabel },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Only {available} candidate sites remain, cannot place {requested} more ions")]
    InsufficientCandidates { requested: usize, available: usize },

    #[error("Spatial grid error: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Segment name '{name}' is already used by the solute")]
    SegmentNameConflict { name: String },

    #[error("The solute has no atoms with coordinates")]
    EmptySolute,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
