use super::ids::ResidueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,                    // Segment identifier, unique within a structure
    pub(crate) residues: Vec<ResidueId>, // Ordered list of residue IDs belonging to this segment
}

impl Segment {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[ResidueId] {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn first_residue(&self) -> Option<ResidueId> {
        self.residues.first().copied()
    }

    pub fn last_residue(&self) -> Option<ResidueId> {
        self.residues.last().copied()
    }
}
