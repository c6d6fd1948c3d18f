use super::error::EngineError;
use super::ionization::PlacedIon;
use super::solvation::{SolvationResult, SolventModel};
use crate::core::models::atom::Atom;
use crate::core::models::ids::SegmentId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::{AtomRecord, TopologyOutput};
use std::collections::HashSet;
use tracing::info;

/// Segment names for the kept solvent copies: the base name alone, or numbered from 1.
fn solvent_segment_names(base: &str, copies: usize) -> Vec<String> {
    if copies == 1 {
        vec![base.to_string()]
    } else {
        (1..=copies).map(|i| format!("{base}{i}")).collect()
    }
}

struct SegmentWriter<'s> {
    structure: &'s mut Structure,
    topology: TopologyOutput,
    next_serial: usize,
}

impl SegmentWriter<'_> {
    fn add_residue(
        &mut self,
        segment_id: SegmentId,
        number: isize,
        residue_name: &str,
        atoms: impl IntoIterator<Item = Atom>,
    ) -> Result<usize, EngineError> {
        let residue_id = self
            .structure
            .add_residue(segment_id, number, residue_name)
            .ok_or_else(|| EngineError::Internal("segment vanished".to_string()))?;
        let segment = self
            .structure
            .segment(segment_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();

        let first = self.next_serial;
        for mut atom in atoms {
            atom.serial = self.next_serial;
            self.topology.atoms.push(AtomRecord {
                serial: atom.serial,
                segment: segment.clone(),
                residue_number: number,
                residue_name: residue_name.to_string(),
                name: atom.name.clone(),
                force_field_type: atom.force_field_type.clone(),
                charge: atom.partial_charge,
                mass: atom.mass,
            });
            self.structure.add_atom_to_residue(residue_id, atom);
            self.next_serial += 1;
        }
        Ok(first)
    }
}

/// Appends kept solvent and placed ions to an assembled structure.
///
/// Every template copy that still holds molecules becomes one solvent segment with one
/// residue per molecule, numbered from 1. Ions follow in their own segment, one residue
/// each. Serials continue after the last solute atom.
///
/// # Return
///
/// The topology of the added atoms: their records plus the bonds and angles of the solvent
/// model. Ions carry no bonded terms.
///
/// # Errors
///
/// Returns [`EngineError::SegmentNameConflict`] if a new segment name is already taken.
pub fn extend_with_solvent(
    structure: &mut Structure,
    solvent: &SolvationResult,
    model: SolventModel,
    solvent_segment: &str,
    ions: &[PlacedIon],
    ion_segment: &str,
) -> Result<TopologyOutput, EngineError> {
    let mut names = solvent_segment_names(solvent_segment, solvent.copies.len());
    if !ions.is_empty() {
        names.push(ion_segment.to_string());
    }
    let mut seen = HashSet::new();
    for name in &names {
        if structure.find_segment_by_name(name).is_some() || !seen.insert(name.as_str()) {
            return Err(EngineError::SegmentNameConflict { name: name.clone() });
        }
    }

    let next_serial = structure.atom_count() + 1;
    let mut writer = SegmentWriter {
        structure,
        topology: TopologyOutput::new(),
        next_serial,
    };

    for (copy, name) in solvent.copies.iter().zip(&names) {
        let segment_id = writer.structure.add_segment(name);
        for (index, molecule) in copy.iter().enumerate() {
            let atoms = model.atoms().iter().zip(molecule).map(|(site, &position)| {
                Atom::with_parameters(site.name, site.atom_type, site.charge, site.mass, Some(position))
            });
            let first = writer.add_residue(segment_id, index as isize + 1, model.residue_name(), atoms)?;
            writer
                .topology
                .bonds
                .extend(model.bonds().iter().map(|b| b.map(|k| first + k)));
            writer
                .topology
                .angles
                .extend(model.angles().iter().map(|a| a.map(|k| first + k)));
        }
    }

    if !ions.is_empty() {
        let segment_id = writer.structure.add_segment(ion_segment);
        for (index, ion) in ions.iter().enumerate() {
            let species = ion.species;
            let atom = Atom::with_parameters(
                species.atom_name,
                species.atom_type,
                f64::from(species.charge),
                species.mass,
                Some(ion.position),
            );
            writer.add_residue(segment_id, index as isize + 1, species.residue_name, [atom])?;
        }
    }

    info!(
        solvent_molecules = solvent.molecule_count(),
        ions = ions.len(),
        atoms = writer.topology.atom_count(),
        "Solvent and ions appended."
    );
    Ok(writer.topology)
}
