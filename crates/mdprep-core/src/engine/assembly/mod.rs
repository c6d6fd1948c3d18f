//! # Topology Assembly
//!
//! Rebuilds an input structure residue by residue from the topology library.
//!
//! Every residue is rewritten in the atom order of its effective template (chain-terminal
//! and disulfide variants included), unknown positions are filled in from internal
//! coordinates, and the bonded-term lists are resolved to atom serials.

mod coordinates;
mod templates;
mod terms;

use super::disulfide::{self, DisulfideBridge};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::forcefield::params::ParameterTables;
use crate::core::models::atom::Atom;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::{AtomRecord, TopologyOutput};
use crate::core::topology::library::TopologyLibrary;
use crate::core::topology::template::ResidueTemplate;
use crate::engine::config::AssemblyConfig;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// A residue of the assembled structure with the template it was built from.
pub(crate) struct ResiduePlan<'a> {
    pub id: ResidueId,
    pub template: Cow<'a, ResidueTemplate>,
}

/// An assembled structure and its finalized topology.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub structure: Structure,
    pub topology: TopologyOutput,
}

/// Lists the atom records of a structure in serial order.
pub fn atom_records(structure: &Structure) -> Vec<AtomRecord> {
    structure
        .ordered_atom_ids()
        .into_iter()
        .filter_map(|id| {
            let atom = structure.atom(id)?;
            let residue = structure.residue(atom.residue_id)?;
            let segment = structure.segment(residue.segment_id)?;
            Some(AtomRecord {
                serial: atom.serial,
                segment: segment.name.clone(),
                residue_number: residue.number,
                residue_name: residue.name.clone(),
                name: atom.name.clone(),
                force_field_type: atom.force_field_type.clone(),
                charge: atom.partial_charge,
                mass: atom.mass,
            })
        })
        .collect()
}

/// Assembles the complete topology of a structure.
///
/// # Arguments
///
/// * `input` - The parsed structure; atoms may lack positions.
/// * `library` - Residue templates, patches and masses.
/// * `params` - Equilibrium values for internal coordinates stored as zero.
/// * `config` - Patch overrides and CMAP switch.
/// * `bridges` - Disulfide bridges between residues of `input`.
/// * `reporter` - Receives one increment per residue.
/// * `diagnostics` - Receives discarded atoms, missing masses, parameters and references.
///
/// # Return
///
/// A new structure whose atoms follow template order with serials `1..=n`, and the
/// topology output built from it.
///
/// # Errors
///
/// Fails on unknown templates or patches, on a bridged cysteine without sulfur, and when
/// the coordinates of some residue cannot be completed.
#[instrument(skip_all, name = "assembly")]
pub fn assemble(
    input: &Structure,
    library: &TopologyLibrary,
    params: &ParameterTables,
    config: &AssemblyConfig,
    bridges: &[DisulfideBridge],
    reporter: &ProgressReporter,
    diagnostics: &mut Diagnostics,
) -> Result<AssembledSystem, EngineError> {
    let overrides = disulfide::partner_templates(input, library, bridges)?;

    // === Phase 1: Rebuild residues in template order ===
    let mut structure = Structure::new();
    let mut segments: Vec<Vec<ResiduePlan>> = Vec::with_capacity(input.segment_count());
    let mut id_map: HashMap<ResidueId, ResidueId> = HashMap::with_capacity(input.residue_count());
    let mut missing_masses: HashSet<String> = HashSet::new();

    for (_, segment) in input.segments_iter() {
        let templates =
            templates::segment_templates(input, segment, library, &overrides, config)?;
        let segment_id = structure.add_segment(&segment.name);
        let mut plans = Vec::with_capacity(templates.len());

        for (&input_id, template) in segment.residues().iter().zip(templates) {
            let residue = input
                .residue(input_id)
                .ok_or_else(|| EngineError::Internal("dangling residue id".to_string()))?;
            let output_id = structure
                .add_residue(segment_id, residue.number, &residue.name)
                .ok_or_else(|| EngineError::Internal("segment vanished".to_string()))?;

            for template_atom in &template.atoms {
                let position = input
                    .atom_in_residue(input_id, &template_atom.name)
                    .and_then(|atom| atom.position);
                let mass = library.mass(&template_atom.atom_type).unwrap_or_else(|| {
                    if missing_masses.insert(template_atom.atom_type.clone()) {
                        diagnostics.report(Diagnostic::MissingMass {
                            atom_type: template_atom.atom_type.clone(),
                        });
                    }
                    0.0
                });
                let atom = Atom::with_parameters(
                    &template_atom.name,
                    &template_atom.atom_type,
                    template_atom.charge,
                    mass,
                    position,
                );
                structure.add_atom_to_residue(output_id, atom);
            }

            for &atom_id in residue.atoms() {
                let Some(atom) = input.atom(atom_id) else {
                    continue;
                };
                if !template.contains_atom(&atom.name) {
                    if let Some(label) = input.residue_label(input_id) {
                        diagnostics.report(Diagnostic::DiscardedAtom {
                            residue: label,
                            atom: atom.name.clone(),
                        });
                    }
                }
            }

            id_map.insert(input_id, output_id);
            plans.push(ResiduePlan {
                id: output_id,
                template,
            });
        }
        segments.push(plans);
    }
    let atom_count = structure.renumber_atoms();

    // === Phase 2: Complete coordinates ===
    reporter.report(Progress::TaskStart {
        total_steps: structure.residue_count() as u64,
    });
    let mut placed = 0;
    for plans in &segments {
        for index in 0..plans.len() {
            coordinates::fix_water(&mut structure, plans[index].id);
            placed += coordinates::resolve_residue(
                &mut structure,
                plans,
                index,
                params,
                diagnostics,
            )?;
            reporter.report(Progress::TaskIncrement);
        }
    }
    reporter.report(Progress::TaskFinish);

    // === Phase 3: Resolve bonded terms ===
    let bridge_ids: Vec<(ResidueId, ResidueId)> = bridges
        .iter()
        .filter_map(|b| Some((*id_map.get(&b.first)?, *id_map.get(&b.second)?)))
        .collect();
    let mut topology = terms::build_terms(
        &structure,
        &segments,
        &bridge_ids,
        config.include_cmap,
        diagnostics,
    )?;
    topology.atoms = atom_records(&structure);

    info!(
        atoms = atom_count,
        placed,
        bonds = topology.bonds.len(),
        angles = topology.angles.len(),
        dihedrals = topology.dihedrals.len(),
        impropers = topology.impropers.len(),
        cmaps = topology.cmaps.len(),
        "Topology assembled."
    );
    Ok(AssembledSystem {
        structure,
        topology,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::template::{InternalCoordinate, TemplateAtom};
    use nalgebra::Point3;
    use std::f64::consts::PI;

    fn s(name: &str) -> String {
        name.to_string()
    }

    fn library() -> TopologyLibrary {
        let mut library = TopologyLibrary::new();
        library.insert_residue(ResidueTemplate {
            name: s("AAA"),
            atoms: vec![
                TemplateAtom::new("N", "NH1", -0.4),
                TemplateAtom::new("CA", "CT1", 0.1),
                TemplateAtom::new("C", "C", 0.3),
            ],
            bonds: vec![[s("N"), s("CA")], [s("CA"), s("C")], [s("C"), s("+N")]],
            ..Default::default()
        });
        library.insert_residue(ResidueTemplate {
            name: s("BBB"),
            atoms: vec![
                TemplateAtom::new("N", "NH1", -0.4),
                TemplateAtom::new("CA", "CT1", 0.1),
                TemplateAtom::new("C", "C", 0.8),
                TemplateAtom::new("O", "O", -0.5),
            ],
            bonds: vec![[s("N"), s("CA")], [s("CA"), s("C")], [s("C"), s("O")]],
            internal_coordinates: vec![InternalCoordinate {
                atoms: [s("N"), s("CA"), s("C"), s("O")],
                bond_ij: 0.0,
                angle_ijk: 0.0,
                torsion: PI,
                angle_jkl: 2.1,
                bond_kl: 1.23,
            }],
            ..Default::default()
        });
        for (atom_type, mass) in [("NH1", 14.007), ("CT1", 12.011), ("C", 12.011), ("O", 15.999)] {
            library.insert_mass(atom_type, mass);
        }
        library
    }

    fn dipeptide() -> Structure {
        let mut structure = Structure::new();
        let segment = structure.add_segment("PROA");
        let first = structure.add_residue(segment, 1, "AAA").unwrap();
        for (name, x) in [("C", 2.4), ("XX", 9.0), ("CA", 1.5), ("N", 0.0)] {
            structure.add_atom_to_residue(first, Atom::new(name, Some(Point3::new(x, 0.5 * x.sin(), 0.0))));
        }
        let second = structure.add_residue(segment, 2, "BBB").unwrap();
        for (name, x) in [("N", 3.6), ("CA", 4.9), ("C", 6.1)] {
            structure.add_atom_to_residue(second, Atom::new(name, Some(Point3::new(x, 0.5 * x.sin(), 0.3))));
        }
        structure
    }

    #[test]
    fn dipeptide_is_rebuilt_in_template_order_with_sequential_serials() {
        let mut diagnostics = Diagnostics::new();
        let system = assemble(
            &dipeptide(),
            &library(),
            &ParameterTables::new(),
            &AssemblyConfig::default(),
            &[],
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        let topology = &system.topology;
        assert_eq!(topology.atom_count(), 7);
        assert!(topology.is_consistent());
        let names: Vec<&str> = topology.atoms.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["N", "CA", "C", "N", "CA", "C", "O"]);
        assert_eq!(topology.atoms[6].mass, 15.999);
        assert!(system.structure.unresolved_atoms().is_empty());

        assert_eq!(
            topology.bonds,
            vec![[1, 2], [2, 3], [3, 4], [4, 5], [5, 6], [6, 7]]
        );
        assert_eq!(topology.angles.len(), 5);
        assert_eq!(topology.dihedrals.len(), 4);

        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::DiscardedAtom {
                residue: crate::core::diagnostics::ResidueLabel::new("PROA", 1, "AAA"),
                atom: s("XX"),
            }]
        );
    }

    #[test]
    fn missing_mass_is_reported_once_per_type() {
        let library = library();
        let mut bare = TopologyLibrary::new();
        for name in ["AAA", "BBB"] {
            bare.insert_residue(library.residue(name).unwrap().clone());
        }
        let mut diagnostics = Diagnostics::new();

        let system = assemble(
            &dipeptide(),
            &bare,
            &ParameterTables::new(),
            &AssemblyConfig::default(),
            &[],
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        assert!(system.topology.atoms.iter().all(|a| a.mass == 0.0));
        assert_eq!(
            diagnostics.count_where(|d| matches!(d, Diagnostic::MissingMass { .. })),
            4
        );
    }

    #[test]
    fn unresolvable_residue_aborts_assembly() {
        let mut structure = dipeptide();
        let (segment_id, _) = structure.segments_iter().next().unwrap();
        let third = structure.add_residue(segment_id, 3, "BBB").unwrap();
        structure.add_atom_to_residue(third, Atom::new("N", Some(Point3::new(7.0, 0.0, 0.0))));

        let result = assemble(
            &structure,
            &library(),
            &ParameterTables::new(),
            &AssemblyConfig::default(),
            &[],
            &ProgressReporter::new(),
            &mut Diagnostics::new(),
        );

        assert!(matches!(
            result,
            Err(EngineError::UnresolvedCoordinates { ref atoms, .. }) if atoms.len() == 3
        ));
    }
}
