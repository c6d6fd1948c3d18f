use super::ids::{AtomId, SegmentId};
use std::collections::HashMap;

/// Residue names recognised as three-site water when fixing crystallographic waters.
pub const WATER_RESIDUE_NAMES: [&str; 3] = ["WAT", "TIP3", "HOH"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub number: isize,                      // Residue sequence number, segment-local
    pub name: String,                       // Name of the residue (e.g., "ALA", "CYS")
    pub segment_id: SegmentId,              // ID of the parent segment
    pub(crate) atoms: Vec<AtomId>,          // Atoms in template order once assembled
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(number: isize, name: &str, segment_id: SegmentId) -> Self {
        Self {
            number,
            name: name.to_string(),
            segment_id,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map.insert(atom_name.to_string(), atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn is_water(&self) -> bool {
        WATER_RESIDUE_NAMES.contains(&self.name.as_str())
    }
}
