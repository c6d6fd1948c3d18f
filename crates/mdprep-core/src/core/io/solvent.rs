use nalgebra::Point3;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolventTemplateError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Molecule '{molecule}' in '{path}' has atoms {found:?}, expected {expected:?}")]
    AtomMismatch {
        path: String,
        molecule: String,
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[error("Solvent template '{path}' contains no molecules")]
    Empty { path: String },
}

#[derive(Debug, Deserialize)]
struct SolventRow {
    molecule: String,
    atom: String,
    x: f64,
    y: f64,
    z: f64,
}

/// Coordinates of one pre-equilibrated solvent box, grouped per molecule.
///
/// Every molecule lists its atoms in the order of the solvent model.
#[derive(Debug, Clone, PartialEq)]
pub struct SolventBoxTemplate {
    molecules: Vec<Vec<Point3<f64>>>,
}

impl SolventBoxTemplate {
    pub fn new(molecules: Vec<Vec<Point3<f64>>>) -> Self {
        Self { molecules }
    }

    /// Loads a `molecule,atom,x,y,z` CSV file.
    ///
    /// Consecutive rows sharing a `molecule` value form one molecule; their atom names
    /// must match `atom_names` exactly and in order.
    pub fn load(path: &Path, atom_names: &[&str]) -> Result<Self, SolventTemplateError> {
        let path_str = || path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| SolventTemplateError::Csv {
                path: path_str(),
                source: e,
            })?;

        let mut groups: Vec<(String, Vec<String>, Vec<Point3<f64>>)> = Vec::new();
        for result in reader.deserialize::<SolventRow>() {
            let row = result.map_err(|e| SolventTemplateError::Csv {
                path: path_str(),
                source: e,
            })?;
            let position = Point3::new(row.x, row.y, row.z);
            match groups.last_mut() {
                Some((molecule, names, positions)) if *molecule == row.molecule => {
                    names.push(row.atom);
                    positions.push(position);
                }
                _ => groups.push((row.molecule, vec![row.atom], vec![position])),
            }
        }

        if groups.is_empty() {
            return Err(SolventTemplateError::Empty { path: path_str() });
        }

        let mut molecules = Vec::with_capacity(groups.len());
        for (molecule, names, positions) in groups {
            if names.iter().map(String::as_str).ne(atom_names.iter().copied()) {
                return Err(SolventTemplateError::AtomMismatch {
                    path: path_str(),
                    molecule,
                    found: names,
                    expected: atom_names.iter().map(|n| n.to_string()).collect(),
                });
            }
            molecules.push(positions);
        }
        Ok(Self { molecules })
    }

    pub fn molecules(&self) -> &[Vec<Point3<f64>>] {
        &self.molecules
    }

    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }
}
