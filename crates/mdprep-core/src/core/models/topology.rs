use serde::{Deserialize, Serialize};

pub type BondTerm = [usize; 2];
pub type AngleTerm = [usize; 3];
pub type DihedralTerm = [usize; 4];
pub type ImproperTerm = [usize; 4];
/// Two consecutive torsions, four atoms each, as declared by a CMAP template entry.
pub type CmapTerm = [usize; 8];
/// A dihedral whose third serial is negated on every repeat of a multi-term entry.
pub type SignedDihedralTerm = [isize; 4];

/// A CMAP term collapsed to its five distinct atoms, tagged with the 1-based index of its
/// parameter key among the distinct keys of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCmapTerm {
    pub atoms: [usize; 5],
    pub parameter_index: usize,
}

/// Per-atom record of the finalized topology, index-aligned with `serial - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub serial: usize,
    pub segment: String,
    pub residue_number: isize,
    pub residue_name: String,
    pub name: String,
    pub force_field_type: String,
    pub charge: f64,
    pub mass: f64,
}

/// The finalized atom list and bonded-term lists of an assembled system.
///
/// All term entries hold 1-based atom serials. `signed_dihedrals` and `indexed_cmaps` are
/// filled by [`TopologyOutput::parameterize`] and stay empty until then.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyOutput {
    pub atoms: Vec<AtomRecord>,
    pub bonds: Vec<BondTerm>,
    pub angles: Vec<AngleTerm>,
    pub dihedrals: Vec<DihedralTerm>,
    pub impropers: Vec<ImproperTerm>,
    pub cmaps: Vec<CmapTerm>,
    #[serde(default)]
    pub signed_dihedrals: Vec<SignedDihedralTerm>,
    #[serde(default)]
    pub indexed_cmaps: Vec<IndexedCmapTerm>,
}

impl TopologyOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Stable-sorts every term list by its first atom serial.
    pub fn sort_terms(&mut self) {
        self.bonds.sort_by_key(|term| term[0]);
        self.angles.sort_by_key(|term| term[0]);
        self.dihedrals.sort_by_key(|term| term[0]);
        self.impropers.sort_by_key(|term| term[0]);
        self.cmaps.sort_by_key(|term| term[0]);
    }

    /// Appends another output whose serials already continue after this one.
    pub fn extend(&mut self, other: TopologyOutput) {
        self.atoms.extend(other.atoms);
        self.bonds.extend(other.bonds);
        self.angles.extend(other.angles);
        self.dihedrals.extend(other.dihedrals);
        self.impropers.extend(other.impropers);
        self.cmaps.extend(other.cmaps);
        self.signed_dihedrals.extend(other.signed_dihedrals);
        self.indexed_cmaps.extend(other.indexed_cmaps);
    }

    /// Checks that atom records are numbered `1..=n` and every term refers to one of them.
    pub fn is_consistent(&self) -> bool {
        let n = self.atoms.len();
        let numbered = self
            .atoms
            .iter()
            .enumerate()
            .all(|(index, atom)| atom.serial == index + 1);
        let valid = |serial: &usize| (1..=n).contains(serial);

        numbered
            && self.bonds.iter().flatten().all(valid)
            && self.angles.iter().flatten().all(valid)
            && self.dihedrals.iter().flatten().all(valid)
            && self.impropers.iter().flatten().all(valid)
            && self.cmaps.iter().flatten().all(valid)
            && self
                .signed_dihedrals
                .iter()
                .flatten()
                .all(|serial| valid(&(serial.unsigned_abs())))
            && self
                .indexed_cmaps
                .iter()
                .flat_map(|term| term.atoms.iter())
                .all(valid)
    }

    /// The five distinct atoms spanned by the two torsions of a CMAP entry.
    pub fn cmap_atoms(term: &CmapTerm) -> [usize; 5] {
        [term[0], term[1], term[2], term[3], term[7]]
    }

    /// Returns the atom record for a 1-based serial.
    pub fn atom(&self, serial: usize) -> Option<&AtomRecord> {
        serial.checked_sub(1).and_then(|index| self.atoms.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: usize, name: &str) -> AtomRecord {
        AtomRecord {
            serial,
            segment: "A".to_string(),
            residue_number: 1,
            residue_name: "ALA".to_string(),
            name: name.to_string(),
            force_field_type: "CT1".to_string(),
            charge: 0.0,
            mass: 12.011,
        }
    }

    #[test]
    fn sort_terms_is_stable_on_first_atom() {
        let mut output = TopologyOutput::new();
        output.bonds = vec![[3, 4], [1, 5], [3, 1], [1, 2]];
        output.sort_terms();
        assert_eq!(output.bonds, vec![[1, 5], [1, 2], [3, 4], [3, 1]]);
    }

    #[test]
    fn is_consistent_detects_out_of_range_serials() {
        let mut output = TopologyOutput::new();
        output.atoms = vec![record(1, "N"), record(2, "CA")];
        output.bonds = vec![[1, 2]];
        assert!(output.is_consistent());

        output.angles = vec![[1, 2, 3]];
        assert!(!output.is_consistent());
    }

    #[test]
    fn is_consistent_requires_contiguous_numbering() {
        let mut output = TopologyOutput::new();
        output.atoms = vec![record(1, "N"), record(3, "CA")];
        assert!(!output.is_consistent());
    }

    #[test]
    fn cmap_atoms_drop_shared_atoms() {
        assert_eq!(
            TopologyOutput::cmap_atoms(&[1, 2, 3, 4, 2, 3, 4, 5]),
            [1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn is_consistent_checks_signed_dihedrals_by_magnitude() {
        let mut output = TopologyOutput::new();
        output.atoms = (1..=4).map(|serial| record(serial, "C")).collect();
        output.signed_dihedrals = vec![[1, 2, -3, 4]];
        assert!(output.is_consistent());

        output.signed_dihedrals.push([1, 2, -5, 4]);
        assert!(!output.is_consistent());
    }

    #[test]
    fn atom_lookup_is_one_based() {
        let mut output = TopologyOutput::new();
        output.atoms = vec![record(1, "N")];
        assert_eq!(output.atom(1).unwrap().name, "N");
        assert!(output.atom(0).is_none());
        assert!(output.atom(2).is_none());
    }
}
