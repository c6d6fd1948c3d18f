use crate::core::models::atom::Atom;
use crate::core::models::structure::Structure;
use crate::core::models::topology::TopologyOutput;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StructureIoError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error for '{path}': {source}")]
    Serialize {
        path: String,
        source: toml::ser::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResidueEntry {
    pub number: isize,
    pub name: String,
    #[serde(default, rename = "atom")]
    pub atoms: Vec<AtomEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "residue")]
    pub residues: Vec<ResidueEntry>,
}

/// The on-disk form of a structure: segments of residues of named atoms.
///
/// Atoms without a `position` are loaded as unresolved and get placed during assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureFile {
    #[serde(default, rename = "segment")]
    pub segments: Vec<SegmentEntry>,
}

impl StructureFile {
    pub fn load(path: &Path) -> Result<Self, StructureIoError> {
        let content = std::fs::read_to_string(path).map_err(|e| StructureIoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| StructureIoError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Builds a [`Structure`], naming unnamed segments `S1`, `S2`, ... by position.
    pub fn into_structure(self) -> Structure {
        let mut structure = Structure::new();
        for (index, segment) in self.segments.into_iter().enumerate() {
            let name = segment
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| default_segment_name(index));
            let segment_id = structure.add_segment(&name);
            for residue in segment.residues {
                let Some(residue_id) =
                    structure.add_residue(segment_id, residue.number, &residue.name)
                else {
                    continue;
                };
                for atom in residue.atoms {
                    let position = atom.position.map(|[x, y, z]| Point3::new(x, y, z));
                    structure.add_atom_to_residue(residue_id, Atom::new(&atom.name, position));
                }
            }
        }
        debug!(
            segments = structure.segment_count(),
            atoms = structure.atom_count(),
            "Structure built from snapshot."
        );
        structure
    }

    pub fn from_structure(structure: &Structure) -> Self {
        let segments = structure
            .segments_iter()
            .map(|(_, segment)| SegmentEntry {
                name: Some(segment.name.clone()),
                residues: segment
                    .residues()
                    .iter()
                    .filter_map(|&id| structure.residue(id))
                    .map(|residue| ResidueEntry {
                        number: residue.number,
                        name: residue.name.clone(),
                        atoms: residue
                            .atoms()
                            .iter()
                            .filter_map(|&id| structure.atom(id))
                            .map(|atom| AtomEntry {
                                name: atom.name.clone(),
                                position: atom.position.map(|p| [p.x, p.y, p.z]),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { segments }
    }
}

pub fn default_segment_name(index: usize) -> String {
    format!("S{}", index + 1)
}

/// Reads a structure snapshot from disk.
pub fn read_structure(path: &Path) -> Result<Structure, StructureIoError> {
    Ok(StructureFile::load(path)?.into_structure())
}

/// A prepared system: the final coordinates together with the finalized topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedSnapshot {
    pub structure: StructureFile,
    pub topology: TopologyOutput,
}

impl PreparedSnapshot {
    pub fn new(structure: &Structure, topology: &TopologyOutput) -> Self {
        Self {
            structure: StructureFile::from_structure(structure),
            topology: topology.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StructureIoError> {
        let content = toml::to_string(self).map_err(|e| StructureIoError::Serialize {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        std::fs::write(path, content).map_err(|e| StructureIoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, StructureIoError> {
        let content = std::fs::read_to_string(path).map_err(|e| StructureIoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| StructureIoError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}
