use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Atom type that matches any type in the outer positions of dihedral and improper keys.
pub const WILDCARD: &str = "X";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondParam {
    pub force_constant: f64,
    pub length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleParam {
    pub force_constant: f64,
    /// Equilibrium angle in radians.
    pub angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UreyBradleyParam {
    pub force_constant: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DihedralParam {
    pub force_constant: f64,
    pub periodicity: i32,
    /// Phase in radians.
    pub phase: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImproperParam {
    pub force_constant: f64,
    /// Equilibrium angle in radians.
    pub angle: f64,
}

/// A CMAP correction grid, `values[phi][psi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CmapGrid {
    pub values: Vec<Vec<f64>>,
}

impl CmapGrid {
    pub fn resolution(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJonesParam {
    pub epsilon: f64,
    pub rmin_half: f64,
}

/// Bonded and nonbonded force-field constants keyed by atom types.
#[derive(Debug, Clone, Default)]
pub struct ParameterTables {
    bonds: HashMap<[String; 2], BondParam>,
    angles: HashMap<[String; 3], AngleParam>,
    urey_bradley: HashMap<[String; 3], UreyBradleyParam>,
    dihedrals: HashMap<[String; 4], Vec<DihedralParam>>,
    impropers: HashMap<[String; 4], ImproperParam>,
    cmaps: HashMap<[String; 8], CmapGrid>,
    nonbonded: HashMap<String, LennardJonesParam>,
    nonbonded_14: HashMap<String, LennardJonesParam>,
}

fn key<const N: usize>(types: [&str; N]) -> [String; N] {
    types.map(str::to_string)
}

fn reversed<const N: usize>(mut types: [&str; N]) -> [&str; N] {
    types.reverse();
    types
}

impl ParameterTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: ParameterFile = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_file(file).map_err(|message| ParamLoadError::Invalid {
            path: path.to_string_lossy().to_string(),
            message,
        })
    }

    fn from_file(file: ParameterFile) -> Result<Self, String> {
        let mut tables = Self::new();
        for entry in file.bonds {
            let [a, b] = &entry.types;
            tables.insert_bond(a, b, entry.force_constant, entry.length);
        }
        for entry in file.angles {
            let [a, b, c] = &entry.types;
            tables.insert_angle(a, b, c, entry.force_constant, entry.angle.to_radians());
            if let Some([k, s]) = entry.urey_bradley {
                tables.insert_urey_bradley(a, b, c, k, s);
            }
        }
        for entry in file.dihedrals {
            let types = entry.types.each_ref().map(String::as_str);
            tables.push_dihedral(
                types,
                DihedralParam {
                    force_constant: entry.force_constant,
                    periodicity: entry.periodicity,
                    phase: entry.phase.to_radians(),
                },
            );
        }
        for entry in file.impropers {
            let types = entry.types.each_ref().map(String::as_str);
            tables.insert_improper(types, entry.force_constant, entry.angle.to_radians());
        }
        for entry in file.cmaps {
            let n = entry.values.len();
            if entry.values.iter().any(|row| row.len() != n) {
                return Err(format!(
                    "CMAP grid for {} is not square",
                    entry.types.join("-")
                ));
            }
            tables.cmaps.insert(entry.types, CmapGrid {
                values: entry.values,
            });
        }
        for entry in file.nonbonded {
            let lj = LennardJonesParam {
                epsilon: entry.epsilon,
                rmin_half: entry.rmin_half,
            };
            if let (Some(epsilon), Some(rmin_half)) = (entry.epsilon_14, entry.rmin_half_14) {
                tables.nonbonded_14.insert(
                    entry.atom_type.clone(),
                    LennardJonesParam { epsilon, rmin_half },
                );
            }
            tables.nonbonded.insert(entry.atom_type, lj);
        }
        Ok(tables)
    }

    pub fn insert_bond(&mut self, a: &str, b: &str, force_constant: f64, length: f64) {
        let param = BondParam {
            force_constant,
            length,
        };
        self.bonds.insert(key([a, b]), param);
        self.bonds.insert(key([b, a]), param);
    }

    /// Stores an angle under both orderings; `angle` is in radians.
    pub fn insert_angle(&mut self, a: &str, b: &str, c: &str, force_constant: f64, angle: f64) {
        let param = AngleParam {
            force_constant,
            angle,
        };
        self.angles.insert(key([a, b, c]), param);
        self.angles.insert(key([c, b, a]), param);
    }

    pub fn insert_urey_bradley(&mut self, a: &str, b: &str, c: &str, k: f64, s: f64) {
        let param = UreyBradleyParam {
            force_constant: k,
            distance: s,
        };
        self.urey_bradley.insert(key([a, b, c]), param);
        self.urey_bradley.insert(key([c, b, a]), param);
    }

    /// Adds one more term to a dihedral; repeated keys build multi-term dihedrals.
    pub fn push_dihedral(&mut self, types: [&str; 4], term: DihedralParam) {
        self.dihedrals.entry(key(types)).or_default().push(term);
    }

    pub fn insert_improper(&mut self, types: [&str; 4], force_constant: f64, angle: f64) {
        self.impropers.insert(
            key(types),
            ImproperParam {
                force_constant,
                angle,
            },
        );
    }

    pub fn insert_cmap(&mut self, types: [&str; 8], grid: CmapGrid) {
        self.cmaps.insert(key(types), grid);
    }

    pub fn insert_nonbonded(&mut self, atom_type: &str, param: LennardJonesParam) {
        self.nonbonded.insert(atom_type.to_string(), param);
    }

    pub fn bond(&self, a: &str, b: &str) -> Option<&BondParam> {
        self.bonds.get(&key([a, b]))
    }

    pub fn angle(&self, a: &str, b: &str, c: &str) -> Option<&AngleParam> {
        self.angles.get(&key([a, b, c]))
    }

    pub fn urey_bradley(&self, a: &str, b: &str, c: &str) -> Option<&UreyBradleyParam> {
        self.urey_bradley.get(&key([a, b, c]))
    }

    /// Finds the dihedral terms for a type quadruple.
    ///
    /// Tries the exact key, the reversed key, then the wildcard forms `X b c X` and
    /// `X c b X`, and returns the key that matched along with its terms.
    pub fn dihedral(&self, types: [&str; 4]) -> Option<([String; 4], &[DihedralParam])> {
        let [_, b, c, _] = types;
        [
            types,
            reversed(types),
            [WILDCARD, b, c, WILDCARD],
            [WILDCARD, c, b, WILDCARD],
        ]
        .into_iter()
        .find_map(|candidate| {
            let k = key(candidate);
            self.dihedrals
                .get(&k)
                .map(|terms| (k, terms.as_slice()))
        })
    }

    /// Finds an improper by exact key, reversed key, `a X X d`, then `d X X a`.
    pub fn improper(&self, types: [&str; 4]) -> Option<&ImproperParam> {
        let [a, _, _, d] = types;
        [
            types,
            reversed(types),
            [a, WILDCARD, WILDCARD, d],
            [d, WILDCARD, WILDCARD, a],
        ]
        .into_iter()
        .find_map(|candidate| self.impropers.get(&key(candidate)))
    }

    pub fn cmap(&self, types: [&str; 8]) -> Option<&CmapGrid> {
        self.cmap_entry(types).map(|(_, grid)| grid)
    }

    /// Finds a CMAP grid by exact or reversed key and returns the key that matched.
    pub fn cmap_entry(&self, types: [&str; 8]) -> Option<([String; 8], &CmapGrid)> {
        [types, reversed(types)].into_iter().find_map(|candidate| {
            let k = key(candidate);
            self.cmaps.get(&k).map(|grid| (k, grid))
        })
    }

    pub fn nonbonded(&self, atom_type: &str) -> Option<&LennardJonesParam> {
        self.nonbonded.get(atom_type)
    }

    /// 1-4 Lennard-Jones parameters, falling back to the regular ones.
    pub fn nonbonded_14(&self, atom_type: &str) -> Option<&LennardJonesParam> {
        self.nonbonded_14
            .get(atom_type)
            .or_else(|| self.nonbonded.get(atom_type))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ParameterFile {
    #[serde(default)]
    bonds: Vec<BondEntry>,
    #[serde(default)]
    angles: Vec<AngleEntry>,
    #[serde(default)]
    dihedrals: Vec<DihedralEntry>,
    #[serde(default)]
    impropers: Vec<ImproperEntry>,
    #[serde(default)]
    cmaps: Vec<CmapEntry>,
    #[serde(default)]
    nonbonded: Vec<NonbondedEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BondEntry {
    types: [String; 2],
    force_constant: f64,
    length: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AngleEntry {
    types: [String; 3],
    force_constant: f64,
    angle: f64,
    urey_bradley: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DihedralEntry {
    types: [String; 4],
    force_constant: f64,
    periodicity: i32,
    phase: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImproperEntry {
    types: [String; 4],
    force_constant: f64,
    angle: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CmapEntry {
    types: [String; 8],
    values: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NonbondedEntry {
    #[serde(rename = "type")]
    atom_type: String,
    epsilon: f64,
    rmin_half: f64,
    epsilon_14: Option<f64>,
    rmin_half_14: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
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
    #[error("Invalid parameter data in '{path}': {message}")]
    Invalid { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn dihedral_term(k: f64, n: i32) -> DihedralParam {
        DihedralParam {
            force_constant: k,
            periodicity: n,
            phase: 0.0,
        }
    }

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("par.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            r#"
            [[bonds]]
            types = ["CT1", "HA"]
            force_constant = 309.0
            length = 1.111

            [[angles]]
            types = ["HA", "CT1", "CT2"]
            force_constant = 33.43
            angle = 110.1
            urey_bradley = [22.53, 2.179]

            [[dihedrals]]
            types = ["X", "CT1", "CT2", "X"]
            force_constant = 0.2
            periodicity = 3
            phase = 0.0

            [[dihedrals]]
            types = ["X", "CT1", "CT2", "X"]
            force_constant = 0.1
            periodicity = 1
            phase = 180.0

            [[impropers]]
            types = ["O", "X", "X", "C"]
            force_constant = 120.0
            angle = 0.0

            [[cmaps]]
            types = ["C", "NH1", "CT1", "C", "NH1", "CT1", "C", "NH1"]
            values = [[0.1, 0.2], [0.3, 0.4]]

            [[nonbonded]]
            type = "CT1"
            epsilon = -0.02
            rmin_half = 2.275
            epsilon_14 = -0.01
            rmin_half_14 = 1.9
            "#
        )
        .unwrap();

        let tables = ParameterTables::load(&file_path).unwrap();

        let bond = tables.bond("HA", "CT1").unwrap();
        assert_eq!(bond.length, 1.111);

        let angle = tables.angle("CT2", "CT1", "HA").unwrap();
        assert!((angle.angle - 110.1f64.to_radians()).abs() < 1e-12);
        assert_eq!(tables.urey_bradley("CT2", "CT1", "HA").unwrap().distance, 2.179);

        let (matched, terms) = tables.dihedral(["HA", "CT2", "CT1", "HA"]).unwrap();
        assert_eq!(matched, key(["X", "CT1", "CT2", "X"]));
        assert_eq!(terms.len(), 2);
        assert!((terms[1].phase - std::f64::consts::PI).abs() < 1e-12);

        assert!(tables.improper(["C", "CT1", "NH1", "O"]).is_some());
        assert_eq!(
            tables
                .cmap(["C", "NH1", "CT1", "C", "NH1", "CT1", "C", "NH1"])
                .unwrap()
                .resolution(),
            2
        );
        assert_eq!(tables.nonbonded_14("CT1").unwrap().rmin_half, 1.9);
        assert_eq!(tables.nonbonded("CT1").unwrap().rmin_half, 2.275);
    }

    #[test]
    fn load_rejects_non_square_cmap() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("par.toml");
        std::fs::write(
            &file_path,
            r#"
            [[cmaps]]
            types = ["A", "B", "C", "D", "E", "F", "G", "H"]
            values = [[0.1, 0.2], [0.3]]
            "#,
        )
        .unwrap();
        assert!(matches!(
            ParameterTables::load(&file_path),
            Err(ParamLoadError::Invalid { .. })
        ));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let result = ParameterTables::load(Path::new("/no/such/par.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn dihedral_lookup_prefers_exact_over_wildcard() {
        let mut tables = ParameterTables::new();
        tables.push_dihedral(["X", "CT1", "CT1", "X"], dihedral_term(0.2, 3));
        tables.push_dihedral(["HA", "CT1", "CT1", "OH1"], dihedral_term(0.5, 1));

        let (matched, terms) = tables.dihedral(["OH1", "CT1", "CT1", "HA"]).unwrap();
        assert_eq!(matched, key(["HA", "CT1", "CT1", "OH1"]));
        assert_eq!(terms[0].periodicity, 1);

        let (matched, _) = tables.dihedral(["HA", "CT1", "CT1", "HA"]).unwrap();
        assert_eq!(matched, key(["X", "CT1", "CT1", "X"]));
        assert!(tables.dihedral(["HA", "CT2", "CT1", "HA"]).is_none());
    }

    #[test]
    fn improper_lookup_tries_reversed_wildcard() {
        let mut tables = ParameterTables::new();
        tables.insert_improper(["NH1", "X", "X", "H"], 20.0, 0.0);
        assert!(tables.improper(["H", "C", "CT1", "NH1"]).is_some());
        assert!(tables.improper(["NH1", "C", "CT1", "H"]).is_some());
        assert!(tables.improper(["NH1", "C", "CT1", "O"]).is_none());
    }

    #[test]
    fn cmap_entry_returns_stored_key_for_reversed_types() {
        let mut tables = ParameterTables::new();
        let stored = ["C", "NH1", "CT1", "C", "NH1", "CT1", "C", "NH1"];
        tables.insert_cmap(stored, CmapGrid { values: vec![vec![0.0]] });

        let (matched, _) = tables
            .cmap_entry(["NH1", "C", "CT1", "NH1", "C", "CT1", "NH1", "C"])
            .unwrap();
        assert_eq!(matched, key(stored));
        assert!(tables.cmap(["C", "NH1", "CT2", "C", "NH1", "CT1", "C", "NH1"]).is_none());
    }

    #[test]
    fn nonbonded_14_falls_back_to_regular_parameters() {
        let mut tables = ParameterTables::new();
        tables.insert_nonbonded(
            "HT",
            LennardJonesParam {
                epsilon: -0.046,
                rmin_half: 0.2245,
            },
        );
        assert_eq!(tables.nonbonded_14("HT").unwrap().epsilon, -0.046);
    }
}
