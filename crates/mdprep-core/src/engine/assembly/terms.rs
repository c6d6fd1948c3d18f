use super::ResiduePlan;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::{AngleTerm, BondTerm, DihedralTerm, TopologyOutput};
use crate::core::topology::reference::{AtomRef, ResidueOffset};
use crate::engine::disulfide::SULFUR_ATOM;
use crate::engine::error::EngineError;
use itertools::Itertools;

/// The spurious hydrogen-hydrogen bond some water templates declare.
const WATER_HH_BOND: [&str; 2] = ["H1", "H2"];

fn is_water_hh_bond(bond: &[String; 2]) -> bool {
    let [a, b] = bond;
    (a == WATER_HH_BOND[0] && b == WATER_HH_BOND[1])
        || (a == WATER_HH_BOND[1] && b == WATER_HH_BOND[0])
}

/// Maps the atom references of a template term to serials.
///
/// Returns `None` when the term reaches past either end of the segment, and also when a
/// reference names an atom that does not exist, which is reported.
fn resolve_term<const N: usize>(
    structure: &Structure,
    segment: &[ResiduePlan],
    index: usize,
    term: &[String; N],
    diagnostics: &mut Diagnostics,
) -> Option<[usize; N]> {
    let mut serials = [0usize; N];
    for (slot, reference) in serials.iter_mut().zip(term) {
        let parsed = AtomRef::parse(reference);
        let residue_id = match parsed.offset {
            ResidueOffset::Previous => segment.get(index.checked_sub(1)?)?.id,
            ResidueOffset::Current => segment[index].id,
            ResidueOffset::Next => segment.get(index + 1)?.id,
        };
        match structure.atom_in_residue(residue_id, parsed.name) {
            Some(atom) => *slot = atom.serial,
            None => {
                if let Some(residue) = structure.residue_label(segment[index].id) {
                    diagnostics.report(Diagnostic::UnresolvedReference {
                        residue,
                        reference: reference.clone(),
                    });
                }
                return None;
            }
        }
    }
    Some(serials)
}

fn declared_terms<'p, const N: usize>(
    structure: &Structure,
    segments: &'p [Vec<ResiduePlan<'p>>],
    select: impl Fn(&'p ResiduePlan<'p>) -> &'p [[String; N]],
    keep: impl Fn(&[String; N]) -> bool,
    diagnostics: &mut Diagnostics,
) -> Vec<[usize; N]> {
    let mut resolved = Vec::new();
    for segment in segments {
        for index in 0..segment.len() {
            for term in select(&segment[index]).iter().filter(|term| keep(term)) {
                if let Some(serials) = resolve_term(structure, segment, index, term, diagnostics) {
                    resolved.push(serials);
                }
            }
        }
    }
    resolved
}

/// Serial-indexed neighbor lists, filled in bond order.
fn adjacency(bonds: &[BondTerm], atom_count: usize) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); atom_count + 1];
    for &[a, b] in bonds {
        neighbors[a].push(b);
        neighbors[b].push(a);
    }
    neighbors
}

/// One angle per pair of neighbors of every atom, outer atoms in ascending order.
pub(crate) fn derive_angles(bonds: &[BondTerm], atom_count: usize) -> Vec<AngleTerm> {
    let neighbors = adjacency(bonds, atom_count);
    let mut angles = Vec::new();
    for (center, around) in neighbors.iter().enumerate() {
        for (&a, &c) in around.iter().tuple_combinations() {
            angles.push([a.min(c), center, a.max(c)]);
        }
    }
    angles
}

/// One dihedral per bond `b-c` and pair of distinct outer neighbors `a` of `b` and `d` of
/// `c`, written from the lower-numbered outer atom.
pub(crate) fn derive_dihedrals(bonds: &[BondTerm], atom_count: usize) -> Vec<DihedralTerm> {
    let neighbors = adjacency(bonds, atom_count);
    let mut dihedrals = Vec::new();
    for &[b, c] in bonds {
        for (&a, &d) in neighbors[b].iter().cartesian_product(&neighbors[c]) {
            if a == c || b == d || a == d {
                continue;
            }
            dihedrals.push(if a < d { [a, b, c, d] } else { [d, c, b, a] });
        }
    }
    dihedrals
}

/// Builds the finalized term lists of an assembled structure.
///
/// Disulfide sulfur pairs are bonded first, followed by the bonds every residue template
/// declares. Angles and dihedrals are derived from the bond graph; impropers and CMAP
/// terms come from the templates. Every list is sorted by its first serial.
///
/// # Errors
///
/// Returns [`EngineError::MissingSulfur`] if a bridged cysteine has no sulfur atom.
pub(crate) fn build_terms(
    structure: &Structure,
    segments: &[Vec<ResiduePlan>],
    bridges: &[(ResidueId, ResidueId)],
    include_cmap: bool,
    diagnostics: &mut Diagnostics,
) -> Result<TopologyOutput, EngineError> {
    let mut topology = TopologyOutput::new();
    let atom_count = structure.atom_count();

    for &(first, second) in bridges {
        let sulfur = |id: ResidueId| {
            structure
                .atom_in_residue(id, SULFUR_ATOM)
                .map(|atom| atom.serial)
                .ok_or_else(|| match structure.residue_label(id) {
                    Some(residue) => EngineError::MissingSulfur { residue },
                    None => EngineError::Internal("residue without segment".to_string()),
                })
        };
        topology.bonds.push([sulfur(first)?, sulfur(second)?]);
    }

    let bonds = declared_terms(
        structure,
        segments,
        |plan| plan.template.bonds.as_slice(),
        |bond| !is_water_hh_bond(bond),
        diagnostics,
    );
    topology.bonds.extend(bonds);
    topology.bonds.sort_by_key(|bond| bond[0]);

    topology.angles = derive_angles(&topology.bonds, atom_count);
    topology.dihedrals = derive_dihedrals(&topology.bonds, atom_count);
    topology.impropers = declared_terms(
        structure,
        segments,
        |plan| plan.template.impropers.as_slice(),
        |_| true,
        diagnostics,
    );
    if include_cmap {
        topology.cmaps = declared_terms(
            structure,
            segments,
            |plan| plan.template.cmaps.as_slice(),
            |_| true,
            diagnostics,
        );
    }

    topology.sort_terms();
    Ok(topology)
}
