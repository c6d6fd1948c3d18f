use super::template::{PatchTemplate, ResidueTemplate};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LibraryDefaults {
    first_patch: Option<String>,
    last_patch: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibraryFile {
    #[serde(default)]
    defaults: LibraryDefaults,
    #[serde(default)]
    masses: HashMap<String, f64>,
    #[serde(default)]
    residues: HashMap<String, ResidueTemplate>,
    #[serde(default)]
    patches: HashMap<String, PatchTemplate>,
}

/// The force-field topology database: atom-type masses, residue templates and patches.
#[derive(Debug, Clone, Default)]
pub struct TopologyLibrary {
    masses: HashMap<String, f64>,
    residues: HashMap<String, ResidueTemplate>,
    patches: HashMap<String, PatchTemplate>,
    default_first_patch: Option<String>,
    default_last_patch: Option<String>,
}

impl TopologyLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, TopologyLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| TopologyLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| TopologyLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: LibraryFile = toml::from_str(content)?;
        let mut library = Self {
            masses: file.masses,
            default_first_patch: file.defaults.first_patch,
            default_last_patch: file.defaults.last_patch,
            ..Self::default()
        };
        for (name, mut template) in file.residues {
            template.name = name.clone();
            library.residues.insert(name, template);
        }
        for (name, mut patch) in file.patches {
            patch.name = name.clone();
            library.patches.insert(name, patch);
        }
        Ok(library)
    }

    pub fn residue(&self, name: &str) -> Option<&ResidueTemplate> {
        self.residues.get(name)
    }

    pub fn patch(&self, name: &str) -> Option<&PatchTemplate> {
        self.patches.get(name)
    }

    pub fn mass(&self, atom_type: &str) -> Option<f64> {
        self.masses.get(atom_type).copied()
    }

    pub fn default_first_patch(&self) -> Option<&str> {
        self.default_first_patch.as_deref()
    }

    pub fn default_last_patch(&self) -> Option<&str> {
        self.default_last_patch.as_deref()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn insert_residue(&mut self, template: ResidueTemplate) {
        self.residues.insert(template.name.clone(), template);
    }

    pub fn insert_patch(&mut self, patch: PatchTemplate) {
        self.patches.insert(patch.name.clone(), patch);
    }

    pub fn insert_mass(&mut self, atom_type: &str, mass: f64) {
        self.masses.insert(atom_type.to_string(), mass);
    }

    pub fn set_default_patches(&mut self, first: Option<&str>, last: Option<&str>) {
        self.default_first_patch = first.map(str::to_string);
        self.default_last_patch = last.map(str::to_string);
    }
}

#[derive(Debug, Error)]
pub enum TopologyLoadError {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const LIBRARY: &str = r#"
        [defaults]
        first_patch = "NTER"
        last_patch = "CTER"

        [masses]
        NH1 = 14.007
        CT2 = 12.011

        [residues.GLY]
        atoms = [
            { name = "N", type = "NH1", charge = -0.47 },
            { name = "CA", type = "CT2", charge = -0.02 },
        ]
        bonds = [["N", "CA"], ["N", "-C"]]
        ic = [
            { atoms = ["-C", "CA", "*N", "HN"], bond_ij = 1.34, angle_ijk = 124.0, torsion = 180.0, angle_jkl = 114.0, bond_kl = 0.99 },
        ]

        [residues.TIP3]
        atoms = [{ name = "OH2", type = "OT", charge = -0.834 }]
        first_patch = "NONE"
        last_patch = "NONE"

        [patches.NTER]
        delete = ["HN"]
        atoms = [{ name = "HT1", type = "HC", charge = 0.33 }]
    "#;

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("top.toml");
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", LIBRARY).unwrap();

        let library = TopologyLibrary::load(&path).unwrap();
        assert_eq!(library.residue_count(), 2);
        assert_eq!(library.default_first_patch(), Some("NTER"));
        assert_eq!(library.mass("CT2"), Some(12.011));
        assert!(library.mass("XX").is_none());

        let gly = library.residue("GLY").unwrap();
        assert_eq!(gly.name, "GLY");
        assert_eq!(gly.atoms.len(), 2);
        assert_eq!(gly.internal_coordinates.len(), 1);
        assert!(gly.internal_coordinates[0].is_improper());

        let patch = library.patch("NTER").unwrap();
        assert_eq!(patch.name, "NTER");
        assert_eq!(patch.delete, vec!["HN".to_string()]);

        let water = library.residue("TIP3").unwrap();
        assert_eq!(water.effective_first_patch(library.default_first_patch()), None);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let result = TopologyLibrary::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(TopologyLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[residues.ALA]\natoms = []\nfoo = 1\n").unwrap();
        let result = TopologyLibrary::load(&path);
        assert!(matches!(result, Err(TopologyLoadError::Toml { .. })));
    }
}
