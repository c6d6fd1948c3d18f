use super::ResiduePlan;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::forcefield::params::ParameterTables;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::topology::reference::{AtomRef, ResidueOffset};
use crate::core::topology::template::InternalCoordinate;
use crate::core::utils::geometry::{place_from_internal, place_water_hydrogens};
use crate::engine::error::EngineError;
use nalgebra::Point3;
use tracing::{debug, trace};

const DEFAULT_ANGLE_DEGREES: f64 = 109.0;
const DEFAULT_BOND_LENGTH: f64 = 1.0;

/// Places both hydrogens of a crystallographic water whose oxygen alone is known.
///
/// Applies only to three-atom residues with a water name made of `OH2`, `H1` and `H2`.
pub(crate) fn fix_water(structure: &mut Structure, residue_id: ResidueId) -> bool {
    let Some(residue) = structure.residue(residue_id) else {
        return false;
    };
    if residue.atoms().len() != 3 || !residue.is_water() {
        return false;
    }
    let (Some(o), Some(h1), Some(h2)) = (
        residue.atom_id_by_name("OH2"),
        residue.atom_id_by_name("H1"),
        residue.atom_id_by_name("H2"),
    ) else {
        return false;
    };

    let position = |id| structure.atom(id).and_then(|atom| atom.position);
    let (Some(oxygen), None, None) = (position(o), position(h1), position(h2)) else {
        return false;
    };

    let (p1, p2) = place_water_hydrogens(&oxygen);
    for (id, p) in [(h1, p1), (h2, p2)] {
        if let Some(atom) = structure.atom_mut(id) {
            atom.position = Some(p);
        }
    }
    true
}

/// A resolved reference atom: its position and force-field type.
struct Anchor<'s> {
    position: Point3<f64>,
    atom_type: &'s str,
}

fn anchor<'s>(
    structure: &'s Structure,
    segment: &[ResiduePlan],
    index: usize,
    reference: &str,
) -> Option<Anchor<'s>> {
    let parsed = AtomRef::parse(reference);
    let residue_id = match parsed.offset {
        ResidueOffset::Previous => segment.get(index.checked_sub(1)?)?.id,
        ResidueOffset::Current => segment.get(index)?.id,
        ResidueOffset::Next => segment.get(index + 1)?.id,
    };
    let atom = structure.atom_in_residue(residue_id, parsed.name)?;
    Some(Anchor {
        position: atom.position?,
        atom_type: &atom.force_field_type,
    })
}

/// Geometry to place one atom from one internal-coordinate record.
struct Placement<'r> {
    references: [&'r str; 3],
    torsion: f64,
    angle: f64,
    bond: f64,
}

/// Orients an IC record so that `target` is the atom being placed.
///
/// A record places its fourth atom from `I J K` directly. Read backwards it places its
/// first atom from `L K J`, or from `L J K` with a negated torsion for impropers.
fn orient<'r>(ic: &'r InternalCoordinate, target: &str) -> Option<Placement<'r>> {
    let [i, j, k, l] = &ic.atoms;
    if target == l.as_str() {
        Some(Placement {
            references: [i, j, k].map(String::as_str),
            torsion: ic.torsion,
            angle: ic.angle_jkl,
            bond: ic.bond_kl,
        })
    } else if target == i.as_str() {
        let references = if ic.is_improper() { [l, j, k] } else { [l, k, j] };
        Some(Placement {
            references: references.map(String::as_str),
            torsion: if ic.is_improper() { -ic.torsion } else { ic.torsion },
            angle: ic.angle_ijk,
            bond: ic.bond_ij,
        })
    } else {
        None
    }
}

fn place_atom(
    structure: &Structure,
    segment: &[ResiduePlan],
    index: usize,
    target_type: &str,
    placement: &Placement,
    params: &ParameterTables,
    diagnostics: &mut Diagnostics,
) -> Option<Point3<f64>> {
    let [a, b, c] = placement
        .references
        .map(|reference| anchor(structure, segment, index, reference));
    let (a, b, c) = (a?, b?, c?);

    let angle = if placement.angle == 0.0 {
        match params.angle(b.atom_type, c.atom_type, target_type) {
            Some(param) => param.angle,
            None => {
                diagnostics.report(Diagnostic::MissingAngleParameter {
                    types: [b.atom_type, c.atom_type, target_type].map(str::to_string),
                });
                DEFAULT_ANGLE_DEGREES.to_radians()
            }
        }
    } else {
        placement.angle
    };
    let bond = if placement.bond == 0.0 {
        match params.bond(c.atom_type, target_type) {
            Some(param) => param.length,
            None => {
                diagnostics.report(Diagnostic::MissingBondParameter {
                    types: [c.atom_type, target_type].map(str::to_string),
                });
                DEFAULT_BOND_LENGTH
            }
        }
    } else {
        placement.bond
    };

    Some(place_from_internal(
        &a.position,
        &b.position,
        &c.position,
        placement.torsion,
        angle,
        bond,
    ))
}

/// Fills in every unknown position of one residue from its internal coordinates.
///
/// Passes over the residue's atoms repeat until all are placed. Each unknown atom takes the
/// first record that names it and whose three reference atoms are known; references into
/// the previous residue see its final positions, references into the next residue see
/// only its input positions. A zero angle or bond length in the record is replaced by the
/// equilibrium value from `params`, or by 109 degrees and 1 Angstrom if none exists.
///
/// # Return
///
/// The number of atoms placed.
///
/// # Errors
///
/// Returns [`EngineError::UnresolvedCoordinates`] if a full pass places nothing while
/// atoms remain unknown.
pub(crate) fn resolve_residue(
    structure: &mut Structure,
    segment: &[ResiduePlan],
    index: usize,
    params: &ParameterTables,
    diagnostics: &mut Diagnostics,
) -> Result<usize, EngineError> {
    let plan = &segment[index];
    let atom_ids = structure
        .residue(plan.id)
        .map(|residue| residue.atoms().to_vec())
        .unwrap_or_default();

    let mut placed = 0;
    let mut previously_missing = None;
    loop {
        let mut missing = Vec::new();
        for &atom_id in &atom_ids {
            let Some(atom) = structure.atom(atom_id) else {
                continue;
            };
            if atom.is_resolved() {
                continue;
            }

            let position = plan
                .template
                .internal_coordinates
                .iter()
                .filter_map(|ic| orient(ic, &atom.name))
                .find_map(|placement| {
                    place_atom(
                        structure,
                        segment,
                        index,
                        &atom.force_field_type,
                        &placement,
                        params,
                        diagnostics,
                    )
                });

            match position {
                Some(p) => {
                    trace!(atom = %atom.name, x = p.x, y = p.y, z = p.z, "Atom placed.");
                    if let Some(atom) = structure.atom_mut(atom_id) {
                        atom.position = Some(p);
                    }
                    placed += 1;
                }
                None => missing.push(atom.name.clone()),
            }
        }

        if missing.is_empty() {
            if placed > 0 {
                if let Some(residue) = structure.residue_label(plan.id) {
                    debug!(residue = %residue, placed, "Residue coordinates completed.");
                }
            }
            return Ok(placed);
        }
        if previously_missing == Some(missing.len()) {
            let residue = structure
                .residue_label(plan.id)
                .ok_or_else(|| EngineError::Internal("residue without segment".to_string()))?;
            return Err(EngineError::UnresolvedCoordinates {
                residue,
                atoms: missing,
            });
        }
        previously_missing = Some(missing.len());
    }
}
