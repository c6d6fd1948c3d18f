use super::config::DisulfideMode;
use super::error::EngineError;
use crate::core::diagnostics::{Diagnostic, Diagnostics, ResidueLabel};
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::spatial::grid::CellGrid;
use crate::core::topology::library::TopologyLibrary;
use crate::core::topology::template::{PatchTemplate, ResidueTemplate};
use crate::core::utils::geometry::bounding_box;
use nalgebra::Point3;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

pub const CYSTEINE_RESIDUE: &str = "CYS";
pub const SULFUR_ATOM: &str = "SG";
pub const DISULFIDE_PATCH: &str = "DISU";

/// A confirmed bridge; `first` precedes `second` in the structure's residue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisulfideBridge {
    pub first: ResidueId,
    pub second: ResidueId,
}

fn hierarchical_order(structure: &Structure) -> HashMap<ResidueId, usize> {
    structure
        .segments_iter()
        .flat_map(|(_, segment)| segment.residues().iter().copied())
        .enumerate()
        .map(|(index, id)| (id, index))
        .collect()
}

fn label(structure: &Structure, id: ResidueId) -> Result<ResidueLabel, EngineError> {
    structure
        .residue_label(id)
        .ok_or_else(|| EngineError::Internal("residue without segment".to_string()))
}

/// Finds the disulfide bridges to build.
///
/// # Arguments
///
/// * `structure` - The input structure.
/// * `mode` - Automatic detection by sulfur distance, or an explicit list of pairs.
/// * `diagnostics` - Receives ambiguous and duplicate pairings.
///
/// # Return
///
/// The bridges ordered by their first residue.
///
/// # Errors
///
/// In manual mode, returns [`EngineError::ResidueNotFound`] for a pair naming an unknown
/// residue and [`EngineError::NotCysteine`] for a pair naming anything but a cysteine.
pub fn detect(
    structure: &Structure,
    mode: &DisulfideMode,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DisulfideBridge>, EngineError> {
    let order = hierarchical_order(structure);
    let mut bridges = match mode {
        DisulfideMode::Off => Vec::new(),
        DisulfideMode::Auto { cutoff } => detect_by_distance(structure, *cutoff, diagnostics)?,
        DisulfideMode::Manual(pairs) => {
            let mut used: HashSet<ResidueId> = HashSet::new();
            let mut bridges = Vec::with_capacity(pairs.len());
            for (a, b) in pairs {
                let mut ids = [ResidueId::default(); 2];
                for (slot, spec) in ids.iter_mut().zip([a, b]) {
                    let id = structure
                        .resolve_specifier(spec)
                        .ok_or(EngineError::ResidueNotFound { spec: *spec })?;
                    let residue_label = label(structure, id)?;
                    if residue_label.name != CYSTEINE_RESIDUE {
                        return Err(EngineError::NotCysteine {
                            residue: residue_label,
                        });
                    }
                    *slot = id;
                }

                let [first, second] = ids;
                let repeated = [first, second]
                    .into_iter()
                    .find(|id| used.contains(id))
                    .or((first == second).then_some(first));
                if let Some(id) = repeated {
                    diagnostics.report(Diagnostic::DuplicateDisulfide {
                        residue: label(structure, id)?,
                    });
                    continue;
                }
                used.insert(first);
                used.insert(second);
                bridges.push(DisulfideBridge { first, second });
            }
            bridges
        }
    };

    for bridge in &mut bridges {
        if order.get(&bridge.second) < order.get(&bridge.first) {
            std::mem::swap(&mut bridge.first, &mut bridge.second);
        }
    }
    bridges.sort_by_key(|bridge| order.get(&bridge.first).copied());
    info!(count = bridges.len(), "Disulfide bridges selected.");
    Ok(bridges)
}

fn detect_by_distance(
    structure: &Structure,
    cutoff: f64,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DisulfideBridge>, EngineError> {
    let sulfurs: Vec<(ResidueId, Point3<f64>)> = structure
        .segments_iter()
        .flat_map(|(_, segment)| segment.residues().iter().copied())
        .filter(|&id| {
            structure
                .residue(id)
                .is_some_and(|r| r.name == CYSTEINE_RESIDUE)
        })
        .filter_map(|id| {
            let position = structure.atom_in_residue(id, SULFUR_ATOM)?.position?;
            Some((id, position))
        })
        .collect();
    if sulfurs.len() < 2 {
        return Ok(Vec::new());
    }

    let Some((min, max)) = bounding_box(sulfurs.iter().map(|(_, p)| p)) else {
        return Ok(Vec::new());
    };
    let grid = CellGrid::from_points(min, max, cutoff, sulfurs.iter().map(|(_, p)| p))?;

    let mut partners: Vec<Vec<usize>> = vec![Vec::new(); sulfurs.len()];
    let mut pairs = Vec::new();
    grid.for_each_pair_within(cutoff, |i, j, _| {
        partners[i].push(j);
        partners[j].push(i);
        pairs.push((i, j));
    })?;
    pairs.sort_unstable();

    for (index, found) in partners.iter_mut().enumerate() {
        if found.len() > 1 {
            found.sort_unstable();
            diagnostics.report(Diagnostic::AmbiguousDisulfide {
                sulfur: label(structure, sulfurs[index].0)?,
                partners: found
                    .iter()
                    .map(|&p| label(structure, sulfurs[p].0))
                    .collect::<Result<_, _>>()?,
            });
        }
    }

    let bridges: Vec<DisulfideBridge> = pairs
        .into_iter()
        .filter(|&(i, j)| partners[i].len() == 1 && partners[j].len() == 1)
        .map(|(i, j)| DisulfideBridge {
            first: sulfurs[i].0,
            second: sulfurs[j].0,
        })
        .collect();
    debug!(
        cysteines = sulfurs.len(),
        bridges = bridges.len(),
        "Sulfur pairs scanned."
    );
    Ok(bridges)
}

/// Applies one partner's half of the bridge patch without prepending any terms.
fn apply_partner_patch(template: &ResidueTemplate, patch: &PatchTemplate) -> ResidueTemplate {
    let mut patched = template.clone();
    for atom in &patch.atoms {
        patched.upsert_atom(atom.clone());
    }
    for name in &patch.delete {
        patched.remove_atom(name);
    }
    let deleted: HashSet<String> = patch.delete.iter().cloned().collect();
    patched.retain_terms_without(&deleted);
    patched
}

/// Builds the bridged residue templates, keyed by the residue they replace.
///
/// Each residue keeps its chemical name; the returned template takes the place of the
/// library template for that residue only.
///
/// # Errors
///
/// Returns [`EngineError::UnknownResidueTemplate`] or [`EngineError::UnknownPatch`] when
/// the library lacks the cysteine template or the bridge patch.
pub fn partner_templates(
    structure: &Structure,
    library: &TopologyLibrary,
    bridges: &[DisulfideBridge],
) -> Result<HashMap<ResidueId, ResidueTemplate>, EngineError> {
    let mut templates = HashMap::with_capacity(bridges.len() * 2);
    for bridge in bridges {
        for (id, partner) in [(bridge.first, '1'), (bridge.second, '2')] {
            let residue = label(structure, id)?;
            let template = library.residue(&residue.name).ok_or_else(|| {
                EngineError::UnknownResidueTemplate {
                    residue: residue.clone(),
                }
            })?;
            let patch = library
                .patch(DISULFIDE_PATCH)
                .ok_or_else(|| EngineError::UnknownPatch {
                    name: DISULFIDE_PATCH.to_string(),
                    residue,
                })?
                .for_partner(partner);
            templates.insert(id, apply_partner_patch(template, &patch));
        }
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::structure::ResidueSpecifier;
    use crate::core::topology::template::TemplateAtom;

    fn structure_with_sulfurs(residues: &[(&str, Option<Point3<f64>>)]) -> Structure {
        let mut structure = Structure::new();
        let segment = structure.add_segment("PROA");
        for (index, (name, sulfur)) in residues.iter().enumerate() {
            let id = structure
                .add_residue(segment, index as isize + 1, name)
                .unwrap();
            if let Some(p) = sulfur {
                structure.add_atom_to_residue(id, Atom::new(SULFUR_ATOM, Some(*p)));
            }
        }
        structure
    }

    fn residue_id(structure: &Structure, number: isize) -> ResidueId {
        structure
            .resolve_specifier(&ResidueSpecifier::new(1, number))
            .unwrap()
    }

    #[test]
    fn auto_pairs_sulfurs_within_cutoff() {
        let structure = structure_with_sulfurs(&[
            ("CYS", Some(Point3::new(0.0, 0.0, 0.0))),
            ("ALA", None),
            ("CYS", Some(Point3::new(2.0, 0.0, 0.0))),
        ]);
        let mut diagnostics = Diagnostics::new();

        let bridges = detect(&structure, &DisulfideMode::auto(), &mut diagnostics).unwrap();

        assert_eq!(
            bridges,
            vec![DisulfideBridge {
                first: residue_id(&structure, 1),
                second: residue_id(&structure, 3),
            }]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn auto_ignores_sulfurs_beyond_cutoff() {
        let structure = structure_with_sulfurs(&[
            ("CYS", Some(Point3::new(0.0, 0.0, 0.0))),
            ("CYS", Some(Point3::new(2.2, 0.0, 0.0))),
        ]);
        let bridges =
            detect(&structure, &DisulfideMode::auto(), &mut Diagnostics::new()).unwrap();
        assert!(bridges.is_empty());
    }

    #[test]
    fn auto_reports_ambiguous_cluster_and_bonds_nothing() {
        let structure = structure_with_sulfurs(&[
            ("CYS", Some(Point3::new(0.0, 0.0, 0.0))),
            ("CYS", Some(Point3::new(2.0, 0.0, 0.0))),
            ("CYS", Some(Point3::new(4.0, 0.0, 0.0))),
        ]);
        let mut diagnostics = Diagnostics::new();

        let bridges = detect(&structure, &DisulfideMode::auto(), &mut diagnostics).unwrap();

        assert!(bridges.is_empty());
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics.entries()[0] {
            Diagnostic::AmbiguousDisulfide { sulfur, partners } => {
                assert_eq!(sulfur.number, 2);
                let numbers: Vec<isize> = partners.iter().map(|p| p.number).collect();
                assert_eq!(numbers, vec![1, 3]);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn auto_with_single_cysteine_finds_nothing() {
        let structure = structure_with_sulfurs(&[("CYS", Some(Point3::origin()))]);
        let bridges =
            detect(&structure, &DisulfideMode::auto(), &mut Diagnostics::new()).unwrap();
        assert!(bridges.is_empty());
    }

    #[test]
    fn manual_pairs_are_ordered_and_validated() {
        let structure = structure_with_sulfurs(&[
            ("CYS", None),
            ("ALA", None),
            ("CYS", None),
            ("CYS", None),
        ]);
        let spec = |n| ResidueSpecifier::new(1, n);

        let mode = DisulfideMode::Manual(vec![(spec(3), spec(1)), (spec(1), spec(4))]);
        let mut diagnostics = Diagnostics::new();
        let bridges = detect(&structure, &mode, &mut diagnostics).unwrap();
        assert_eq!(
            bridges,
            vec![DisulfideBridge {
                first: residue_id(&structure, 1),
                second: residue_id(&structure, 3),
            }]
        );
        assert_eq!(
            diagnostics.count_where(|d| matches!(d, Diagnostic::DuplicateDisulfide { .. })),
            1
        );

        let not_cys = DisulfideMode::Manual(vec![(spec(1), spec(2))]);
        assert!(matches!(
            detect(&structure, &not_cys, &mut Diagnostics::new()),
            Err(EngineError::NotCysteine { .. })
        ));

        let missing = DisulfideMode::Manual(vec![(spec(1), spec(9))]);
        assert!(matches!(
            detect(&structure, &missing, &mut Diagnostics::new()),
            Err(EngineError::ResidueNotFound { .. })
        ));
    }

    fn library() -> TopologyLibrary {
        let mut library = TopologyLibrary::new();
        library.insert_residue(ResidueTemplate {
            name: "CYS".to_string(),
            atoms: vec![
                TemplateAtom::new("CB", "CT2", -0.11),
                TemplateAtom::new("SG", "S", -0.23),
                TemplateAtom::new("HG1", "HS", 0.16),
            ],
            bonds: vec![
                ["CB".to_string(), "SG".to_string()],
                ["SG".to_string(), "HG1".to_string()],
            ],
            ..Default::default()
        });
        library.insert_patch(PatchTemplate {
            name: DISULFIDE_PATCH.to_string(),
            delete: vec!["1HG1".to_string(), "2HG1".to_string()],
            atoms: vec![
                TemplateAtom::new("1CB", "CT2", -0.10),
                TemplateAtom::new("1SG", "SM", -0.08),
                TemplateAtom::new("2CB", "CT2", -0.10),
                TemplateAtom::new("2SG", "SM", -0.08),
            ],
            bonds: vec![["1SG".to_string(), "2SG".to_string()]],
            ..Default::default()
        });
        library
    }

    #[test]
    fn partner_templates_drop_thiol_hydrogen_and_keep_terms() {
        let structure = structure_with_sulfurs(&[("CYS", None), ("CYS", None)]);
        let bridge = DisulfideBridge {
            first: residue_id(&structure, 1),
            second: residue_id(&structure, 2),
        };

        let templates = partner_templates(&structure, &library(), &[bridge]).unwrap();

        assert_eq!(templates.len(), 2);
        for id in [bridge.first, bridge.second] {
            let template = &templates[&id];
            let names: Vec<&str> = template.atom_names().collect();
            assert_eq!(names, vec!["CB", "SG"]);
            assert_eq!(template.atom("SG").unwrap().atom_type, "SM");
            assert_eq!(template.bonds, vec![["CB".to_string(), "SG".to_string()]]);
        }
    }

    #[test]
    fn partner_templates_require_bridge_patch() {
        let structure = structure_with_sulfurs(&[("CYS", None), ("CYS", None)]);
        let mut library = TopologyLibrary::new();
        library.insert_residue(ResidueTemplate {
            name: "CYS".to_string(),
            ..Default::default()
        });
        let bridge = DisulfideBridge {
            first: residue_id(&structure, 1),
            second: residue_id(&structure, 2),
        };
        assert!(matches!(
            partner_templates(&structure, &library, &[bridge]),
            Err(EngineError::UnknownPatch { .. })
        ));
    }
}
