use super::atom::Atom;
use super::ids::{AtomId, ResidueId, SegmentId};
use super::residue::Residue;
use super::segment::Segment;
use crate::core::diagnostics::ResidueLabel;
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;

/// Addresses a residue by the 1-based position of its segment and its residue number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidueSpecifier {
    pub segment_index: usize,
    pub residue_number: isize,
}

impl ResidueSpecifier {
    pub fn new(segment_index: usize, residue_number: isize) -> Self {
        Self {
            segment_index,
            residue_number,
        }
    }
}

impl fmt::Display for ResidueSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment_index, self.residue_number)
    }
}

/// Represents a complete molecular structure organised as segments, residues and atoms.
///
/// Atoms, residues and segments live in slot maps and refer to each other through
/// typed IDs. Segments keep the order in which they were added, residues keep their
/// order within a segment and atoms keep their order within a residue, so walking
/// the hierarchy always yields a deterministic atom ordering.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for residues.
    residues: SlotMap<ResidueId, Residue>,
    /// Primary storage for segments.
    segments: SlotMap<SegmentId, Segment>,
    /// Segment IDs in insertion order.
    segment_order: Vec<SegmentId>,
    /// Lookup map for finding residues by segment ID and residue number.
    residue_number_map: HashMap<(SegmentId, isize), ResidueId>,
    /// Lookup map for finding segments by name.
    segment_name_map: HashMap<String, SegmentId>,
}

impl Structure {
    /// Creates a new, empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves an immutable reference to an atom by its ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The atom ID to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(&Atom)` if the atom exists, otherwise `None`.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Retrieves a mutable reference to an atom by its ID.
    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns an iterator over all atoms in storage order.
    ///
    /// Use [`Structure::ordered_atom_ids`] when the hierarchical order matters.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    /// Retrieves an immutable reference to a residue by its ID.
    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    /// Retrieves a mutable reference to a residue by its ID.
    pub fn residue_mut(&mut self, id: ResidueId) -> Option<&mut Residue> {
        self.residues.get_mut(id)
    }

    /// Returns an iterator over all residues in storage order.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.residues.iter()
    }

    /// Retrieves an immutable reference to a segment by its ID.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Returns an iterator over all segments in the order they were added.
    ///
    /// # Return
    ///
    /// An iterator yielding `(SegmentId, &Segment)` pairs.
    pub fn segments_iter(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.segment_order
            .iter()
            .filter_map(|&id| self.segments.get(id).map(|segment| (id, segment)))
    }

    /// Finds a segment ID by its name.
    ///
    /// # Arguments
    ///
    /// * `name` - The segment name.
    ///
    /// # Return
    ///
    /// Returns `Some(SegmentId)` if the segment exists, otherwise `None`.
    pub fn find_segment_by_name(&self, name: &str) -> Option<SegmentId> {
        self.segment_name_map.get(name).copied()
    }

    /// Finds a residue ID by its segment ID and residue number.
    ///
    /// # Arguments
    ///
    /// * `segment_id` - The ID of the segment containing the residue.
    /// * `residue_number` - The sequence number of the residue.
    ///
    /// # Return
    ///
    /// Returns `Some(ResidueId)` if the residue exists, otherwise `None`.
    pub fn find_residue_by_number(
        &self,
        segment_id: SegmentId,
        residue_number: isize,
    ) -> Option<ResidueId> {
        self.residue_number_map
            .get(&(segment_id, residue_number))
            .copied()
    }

    /// Resolves a [`ResidueSpecifier`] against the segment order of this structure.
    pub fn resolve_specifier(&self, spec: &ResidueSpecifier) -> Option<ResidueId> {
        let segment_id = *self.segment_order.get(spec.segment_index.checked_sub(1)?)?;
        self.find_residue_by_number(segment_id, spec.residue_number)
    }

    /// Builds the segment/number/name label used in diagnostics and errors.
    pub fn residue_label(&self, residue_id: ResidueId) -> Option<ResidueLabel> {
        let residue = self.residues.get(residue_id)?;
        let segment = self.segments.get(residue.segment_id)?;
        Some(ResidueLabel::new(&segment.name, residue.number, &residue.name))
    }

    /// Finds an atom by name within a residue.
    pub fn atom_in_residue(&self, residue_id: ResidueId, name: &str) -> Option<&Atom> {
        let atom_id = self.residues.get(residue_id)?.atom_id_by_name(name)?;
        self.atoms.get(atom_id)
    }

    /// Adds a new segment to the structure or returns the existing one.
    ///
    /// This method is idempotent; if a segment with the given name already exists,
    /// it returns the existing segment ID without creating a duplicate.
    ///
    /// # Arguments
    ///
    /// * `name` - The segment name.
    ///
    /// # Return
    ///
    /// The ID of the segment (new or existing).
    pub fn add_segment(&mut self, name: &str) -> SegmentId {
        if let Some(&id) = self.segment_name_map.get(name) {
            return id;
        }
        let id = self.segments.insert(Segment::new(name));
        self.segment_order.push(id);
        self.segment_name_map.insert(name.to_string(), id);
        id
    }

    /// Adds a new residue to a segment or returns the existing one.
    ///
    /// This method is idempotent; if a residue with the given segment ID and
    /// residue number already exists, it returns the existing residue ID.
    ///
    /// # Arguments
    ///
    /// * `segment_id` - The ID of the segment to add the residue to.
    /// * `residue_number` - The sequence number of the residue.
    /// * `name` - The name of the residue.
    ///
    /// # Return
    ///
    /// Returns `Some(ResidueId)` if successful, otherwise `None` (e.g., if the segment doesn't exist).
    pub fn add_residue(
        &mut self,
        segment_id: SegmentId,
        residue_number: isize,
        name: &str,
    ) -> Option<ResidueId> {
        let segment = self.segments.get_mut(segment_id)?;
        let key = (segment_id, residue_number);

        let residue_id = *self.residue_number_map.entry(key).or_insert_with(|| {
            let residue = Residue::new(residue_number, name, segment_id);
            self.residues.insert(residue)
        });

        if !segment.residues.contains(&residue_id) {
            segment.residues.push(residue_id);
        }

        Some(residue_id)
    }

    /// Adds an atom to a specific residue.
    ///
    /// # Arguments
    ///
    /// * `residue_id` - The ID of the residue to add the atom to.
    /// * `atom` - The atom to add. Its `residue_id` is overwritten.
    ///
    /// # Return
    ///
    /// Returns `Some(AtomId)` if successful, otherwise `None` (e.g., if the residue doesn't exist).
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, mut atom: Atom) -> Option<AtomId> {
        let residue = self.residues.get_mut(residue_id)?;
        atom.residue_id = residue_id;
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        residue.add_atom(&name, atom_id);
        Some(atom_id)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_order.len()
    }

    /// Returns all atom IDs in hierarchical order (segment, residue, template order).
    pub fn ordered_atom_ids(&self) -> Vec<AtomId> {
        self.segments_iter()
            .flat_map(|(_, segment)| segment.residues.iter())
            .filter_map(|&residue_id| self.residues.get(residue_id))
            .flat_map(|residue| residue.atoms.iter().copied())
            .collect()
    }

    /// Assigns contiguous serial numbers starting at 1 in hierarchical order.
    ///
    /// # Return
    ///
    /// The number of atoms that were numbered.
    pub fn renumber_atoms(&mut self) -> usize {
        let ordered = self.ordered_atom_ids();
        for (index, &atom_id) in ordered.iter().enumerate() {
            if let Some(atom) = self.atoms.get_mut(atom_id) {
                atom.serial = index + 1;
            }
        }
        ordered.len()
    }

    /// Collects the positions of all resolved atoms in hierarchical order.
    pub fn resolved_positions(&self) -> Vec<Point3<f64>> {
        self.ordered_atom_ids()
            .into_iter()
            .filter_map(|id| self.atoms.get(id).and_then(|atom| atom.position))
            .collect()
    }

    /// Returns the IDs of atoms whose position is still unknown.
    pub fn unresolved_atoms(&self) -> Vec<AtomId> {
        self.ordered_atom_ids()
            .into_iter()
            .filter(|&id| self.atoms.get(id).is_some_and(|atom| !atom.is_resolved()))
            .collect()
    }
}
