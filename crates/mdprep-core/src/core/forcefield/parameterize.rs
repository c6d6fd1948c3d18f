use super::params::ParameterTables;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::models::topology::{IndexedCmapTerm, SignedDihedralTerm, TopologyOutput};
use std::collections::{HashMap, HashSet};

/// Counts of bonded terms that have no entry in the parameter tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterCoverage {
    pub bonds: usize,
    pub angles: usize,
    pub dihedrals: usize,
    pub impropers: usize,
    pub cmaps: usize,
}

impl ParameterCoverage {
    pub fn total(&self) -> usize {
        self.bonds + self.angles + self.dihedrals + self.impropers + self.cmaps
    }

    pub fn is_complete(&self) -> bool {
        self.total() == 0
    }
}

/// Reports each missing type key once, however many terms share it.
struct MissingReporter<'d> {
    seen: HashSet<Vec<String>>,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> MissingReporter<'d> {
    fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            seen: HashSet::new(),
            diagnostics,
        }
    }

    fn report<const N: usize>(&mut self, types: [&str; N], make: impl FnOnce([String; N]) -> Diagnostic) {
        let owned = types.map(str::to_string);
        if self.seen.insert(owned.to_vec()) {
            self.diagnostics.report(make(owned));
        }
    }
}

impl TopologyOutput {
    /// Force-field types for a term's serials, or `None` if a serial has no atom record.
    fn term_types<const N: usize>(&self, term: &[usize; N]) -> Option<[&str; N]> {
        let mut types = [""; N];
        for (slot, &serial) in types.iter_mut().zip(term) {
            *slot = self.atom(serial)?.force_field_type.as_str();
        }
        Some(types)
    }

    /// Expands dihedrals into the multi-term form used by CHARMM-style topology writers.
    ///
    /// A dihedral whose parameter entry holds `n` terms is emitted `n` times; every copy
    /// after the first carries its third atom negated. Dihedrals without parameters are
    /// emitted once.
    pub fn expanded_dihedrals(&self, params: &ParameterTables) -> Vec<SignedDihedralTerm> {
        let mut expanded = Vec::with_capacity(self.dihedrals.len());
        for term in &self.dihedrals {
            let signed = term.map(|serial| serial as isize);
            let multiplicity = self
                .term_types(term)
                .and_then(|types| params.dihedral(types))
                .map_or(1, |(_, terms)| terms.len().max(1));

            expanded.push(signed);
            for _ in 1..multiplicity {
                let [a, b, c, d] = signed;
                expanded.push([a, b, -c, d]);
            }
        }
        expanded
    }

    /// Collapses CMAP terms to five atoms and numbers their parameter keys.
    ///
    /// Keys are numbered from 1 in order of first appearance. A term uses the key its
    /// parameters were found under; an unparameterized term uses its own types, and a
    /// reversed type sequence shares the number of the forward one.
    pub fn indexed_cmaps(&self, params: &ParameterTables) -> Vec<IndexedCmapTerm> {
        let mut numbering: HashMap<[String; 8], usize> = HashMap::new();
        let mut indexed = Vec::with_capacity(self.cmaps.len());
        for term in &self.cmaps {
            let Some(types) = self.term_types(term) else {
                continue;
            };
            let key = params
                .cmap_entry(types)
                .map_or_else(|| types.map(str::to_string), |(key, _)| key);
            let mut reversed = key.clone();
            reversed.reverse();

            let known = numbering
                .get(&key)
                .or_else(|| numbering.get(&reversed))
                .copied();
            let parameter_index = match known {
                Some(index) => index,
                None => {
                    let next = numbering.len() + 1;
                    numbering.insert(key, next);
                    next
                }
            };
            indexed.push(IndexedCmapTerm {
                atoms: Self::cmap_atoms(term),
                parameter_index,
            });
        }
        indexed
    }

    /// Checks the parameters of every bonded term and fills the signed dihedral and
    /// indexed CMAP lists from them.
    pub fn parameterize(
        &mut self,
        params: &ParameterTables,
        diagnostics: &mut Diagnostics,
    ) -> ParameterCoverage {
        let coverage = self.check_parameters(params, diagnostics);
        self.signed_dihedrals = self.expanded_dihedrals(params);
        self.indexed_cmaps = self.indexed_cmaps(params);
        coverage
    }

    /// Checks every bonded term against the parameter tables.
    ///
    /// Each missing type key is reported once. Urey-Bradley terms are optional and never
    /// counted as missing.
    ///
    /// # Return
    ///
    /// The number of unparameterized terms per kind.
    pub fn check_parameters(
        &self,
        params: &ParameterTables,
        diagnostics: &mut Diagnostics,
    ) -> ParameterCoverage {
        let mut missing = MissingReporter::new(diagnostics);
        let mut coverage = ParameterCoverage::default();

        for types in self.bonds.iter().filter_map(|t| self.term_types(t)) {
            let [a, b] = types;
            if params.bond(a, b).is_none() {
                coverage.bonds += 1;
                missing.report(types, |types| Diagnostic::MissingBondParameter { types });
            }
        }
        for types in self.angles.iter().filter_map(|t| self.term_types(t)) {
            let [a, b, c] = types;
            if params.angle(a, b, c).is_none() {
                coverage.angles += 1;
                missing.report(types, |types| Diagnostic::MissingAngleParameter { types });
            }
        }
        for types in self.dihedrals.iter().filter_map(|t| self.term_types(t)) {
            if params.dihedral(types).is_none() {
                coverage.dihedrals += 1;
                missing.report(types, |types| Diagnostic::MissingDihedralParameter { types });
            }
        }
        for types in self.impropers.iter().filter_map(|t| self.term_types(t)) {
            if params.improper(types).is_none() {
                coverage.impropers += 1;
                missing.report(types, |types| Diagnostic::MissingImproperParameter { types });
            }
        }
        for types in self.cmaps.iter().filter_map(|t| self.term_types(t)) {
            if params.cmap(types).is_none() {
                coverage.cmaps += 1;
                missing.report(types, |types| Diagnostic::MissingCmapParameter {
                    types: types.to_vec(),
                });
            }
        }
        coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{CmapGrid, DihedralParam};
    use crate::core::models::topology::AtomRecord;

    fn record(serial: usize, atom_type: &str) -> AtomRecord {
        AtomRecord {
            serial,
            segment: "A".to_string(),
            residue_number: 1,
            residue_name: "ALA".to_string(),
            name: format!("A{serial}"),
            force_field_type: atom_type.to_string(),
            charge: 0.0,
            mass: 12.011,
        }
    }

    fn chain_topology() -> TopologyOutput {
        let mut topology = TopologyOutput::new();
        topology.atoms = ["HA", "CT1", "CT2", "OH1", "HA"]
            .iter()
            .enumerate()
            .map(|(i, t)| record(i + 1, t))
            .collect();
        topology.bonds = vec![[1, 2], [2, 3], [3, 4], [4, 5]];
        topology.angles = vec![[1, 2, 3], [2, 3, 4], [3, 4, 5]];
        topology.dihedrals = vec![[1, 2, 3, 4], [2, 3, 4, 5]];
        topology
    }

    fn dihedral(periodicity: i32) -> DihedralParam {
        DihedralParam {
            force_constant: 0.2,
            periodicity,
            phase: 0.0,
        }
    }

    #[test]
    fn multi_term_dihedral_is_repeated_with_negated_third_atom() {
        let topology = chain_topology();
        let mut params = ParameterTables::new();
        for n in 1..=3 {
            params.push_dihedral(["HA", "CT1", "CT2", "OH1"], dihedral(n));
        }
        params.push_dihedral(["X", "CT2", "OH1", "X"], dihedral(3));

        let expanded = topology.expanded_dihedrals(&params);

        assert_eq!(
            expanded,
            vec![[1, 2, 3, 4], [1, 2, -3, 4], [1, 2, -3, 4], [2, 3, 4, 5]]
        );
    }

    #[test]
    fn unparameterized_dihedral_is_emitted_once() {
        let topology = chain_topology();
        let expanded = topology.expanded_dihedrals(&ParameterTables::new());
        assert_eq!(expanded, vec![[1, 2, 3, 4], [2, 3, 4, 5]]);
    }

    fn backbone_topology() -> TopologyOutput {
        let mut topology = TopologyOutput::new();
        let types = ["C", "NH1", "CT1", "C", "NH1", "CT2", "C", "NH1", "CT1", "C", "NH1"];
        topology.atoms = types
            .iter()
            .enumerate()
            .map(|(i, t)| record(i + 1, t))
            .collect();
        topology
    }

    #[test]
    fn indexed_cmaps_number_distinct_keys_in_order_of_appearance() {
        let mut topology = backbone_topology();
        topology.cmaps = vec![
            [1, 2, 3, 4, 2, 3, 4, 5],
            [4, 5, 6, 7, 5, 6, 7, 8],
            [7, 8, 9, 10, 8, 9, 10, 11],
        ];
        let mut params = ParameterTables::new();
        let grid = CmapGrid {
            values: vec![vec![0.0; 2]; 2],
        };
        params.insert_cmap(["C", "NH1", "CT1", "C", "NH1", "CT1", "C", "NH1"], grid.clone());
        params.insert_cmap(["C", "NH1", "CT2", "C", "NH1", "CT2", "C", "NH1"], grid);

        let indexed = topology.indexed_cmaps(&params);

        assert_eq!(
            indexed,
            vec![
                IndexedCmapTerm {
                    atoms: [1, 2, 3, 4, 5],
                    parameter_index: 1,
                },
                IndexedCmapTerm {
                    atoms: [4, 5, 6, 7, 8],
                    parameter_index: 2,
                },
                IndexedCmapTerm {
                    atoms: [7, 8, 9, 10, 11],
                    parameter_index: 1,
                },
            ]
        );
    }

    #[test]
    fn indexed_cmaps_share_index_between_reversed_unparameterized_keys() {
        let mut topology = backbone_topology();
        topology.cmaps = vec![
            [1, 2, 3, 4, 2, 3, 4, 5],
            [5, 4, 3, 2, 4, 3, 2, 1],
            [4, 5, 6, 7, 5, 6, 7, 8],
        ];

        let indexed = topology.indexed_cmaps(&ParameterTables::new());

        let indices: Vec<usize> = indexed.iter().map(|t| t.parameter_index).collect();
        assert_eq!(indices, vec![1, 1, 2]);
        assert_eq!(indexed[1].atoms, [5, 4, 3, 2, 1]);
    }

    #[test]
    fn parameterize_fills_derived_lists_and_reports_once() {
        let mut topology = chain_topology();
        let mut params = ParameterTables::new();
        params.push_dihedral(["HA", "CT1", "CT2", "OH1"], dihedral(1));
        params.push_dihedral(["HA", "CT1", "CT2", "OH1"], dihedral(2));
        let mut diagnostics = Diagnostics::new();

        let coverage = topology.parameterize(&params, &mut diagnostics);

        assert_eq!(coverage.dihedrals, 1);
        assert_eq!(
            topology.signed_dihedrals,
            vec![[1, 2, 3, 4], [1, 2, -3, 4], [2, 3, 4, 5]]
        );
        assert_eq!(
            diagnostics.count_where(|d| matches!(d, Diagnostic::MissingDihedralParameter { .. })),
            1
        );
    }

    #[test]
    fn check_parameters_counts_terms_and_reports_each_key_once() {
        let mut topology = chain_topology();
        topology.bonds.push([5, 4]);
        let mut params = ParameterTables::new();
        params.insert_bond("HA", "CT1", 300.0, 1.1);
        params.insert_bond("CT1", "CT2", 220.0, 1.53);
        params.insert_angle("HA", "CT1", "CT2", 33.0, 110.1);
        params.push_dihedral(["X", "CT1", "CT2", "X"], dihedral(3));
        let mut diagnostics = Diagnostics::new();

        let coverage = topology.check_parameters(&params, &mut diagnostics);

        assert_eq!(
            coverage,
            ParameterCoverage {
                bonds: 3,
                angles: 2,
                dihedrals: 1,
                impropers: 0,
                cmaps: 0,
            }
        );
        assert!(!coverage.is_complete());
        let bond_reports = diagnostics.count_where(|d| matches!(d, Diagnostic::MissingBondParameter { .. }));
        assert_eq!(bond_reports, 3);
        assert_eq!(diagnostics.len(), 3 + 2 + 1);
    }

    #[test]
    fn fully_parameterized_topology_is_complete() {
        let mut topology = TopologyOutput::new();
        topology.atoms = vec![record(1, "OT"), record(2, "HT")];
        topology.bonds = vec![[1, 2]];
        let mut params = ParameterTables::new();
        params.insert_bond("OT", "HT", 450.0, 0.9572);
        let mut diagnostics = Diagnostics::new();

        assert!(topology.check_parameters(&params, &mut diagnostics).is_complete());
        assert!(diagnostics.is_empty());
    }
}
