use super::config::{IonizationConfig, PlacementMethod};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::solvation::SolvationResult;
use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::spatial::grid::CellGrid;
use crate::core::utils::summation::compensated_sum;
use nalgebra::Point3;
use phf::{Map, phf_map};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Avogadro's number scaled so that mol/L times cubic Angstroms gives a molecule count.
const MOLAR_TO_PER_CUBIC_ANGSTROM: f64 = 6.022e-4;
const CHARGE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonSpecies {
    pub residue_name: &'static str,
    pub atom_name: &'static str,
    pub atom_type: &'static str,
    pub charge: i32,
    pub mass: f64,
}

#[rustfmt::skip]
pub static ION_CATALOGUE: Map<&'static str, IonSpecies> = phf_map! {
    "SOD" => IonSpecies { residue_name: "SOD", atom_name: "SOD", atom_type: "SOD", charge: 1, mass: 22.98977 },
    "MG"  => IonSpecies { residue_name: "MG",  atom_name: "MG",  atom_type: "MG",  charge: 2, mass: 24.305 },
    "POT" => IonSpecies { residue_name: "POT", atom_name: "POT", atom_type: "POT", charge: 1, mass: 39.102 },
    "CAL" => IonSpecies { residue_name: "CAL", atom_name: "CAL", atom_type: "CAL", charge: 2, mass: 40.08 },
    "ZN2" => IonSpecies { residue_name: "ZN2", atom_name: "ZN",  atom_type: "ZN",  charge: 2, mass: 65.37 },
    "CLA" => IonSpecies { residue_name: "CLA", atom_name: "CLA", atom_type: "CLA", charge: -1, mass: 35.45 },
};

static ION_ALIASES: Map<&'static str, &'static str> = phf_map! {
    "Na+" => "SOD",
    "Mg2+" => "MG",
    "K+" => "POT",
    "Ca2+" => "CAL",
    "Zn2+" => "ZN2",
    "Cl-" => "CLA",
};

/// Looks up an ion by residue name (`SOD`) or common symbol (`Na+`).
pub fn lookup_ion(name: &str) -> Option<&'static IonSpecies> {
    let key = ION_ALIASES.get(name).copied().unwrap_or(name);
    ION_CATALOGUE.get(key)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedIon {
    pub species: &'static IonSpecies,
    pub position: Point3<f64>,
}

/// Decides how many cations and anions to add.
///
/// Explicit counts are used as given. When both are zero the counts neutralize
/// `net_charge`; a residue that the counter-ion charge cannot cancel exactly is made up
/// with the other species. A positive salt concentration then adds salt pairs for the
/// box `volume` in cubic Angstroms.
pub fn ion_counts(net_charge: i64, config: &IonizationConfig, volume: f64) -> (usize, usize) {
    if !config.is_automatic() {
        return (config.cation_count, config.anion_count);
    }

    let zc = i64::from(config.cation.charge);
    let za = i64::from(config.anion.charge).abs();
    let div_ceil = |a: i64, b: i64| (a + b - 1) / b;

    let (mut cations, mut anions) = if net_charge < 0 {
        let cations = div_ceil(-net_charge, zc);
        (cations, div_ceil(cations * zc + net_charge, za))
    } else if net_charge > 0 {
        let anions = div_ceil(net_charge, za);
        (div_ceil(anions * za - net_charge, zc), anions)
    } else {
        (0, 0)
    };

    if config.salt_concentration > 0.0 {
        let salt = (config.salt_concentration * volume * MOLAR_TO_PER_CUBIC_ANGSTROM).round() as i64;
        cations += salt;
        anions += div_ceil(salt * zc, za);
    }

    (cations.max(0) as usize, anions.max(0) as usize)
}

struct Candidate {
    copy: usize,
    molecule: usize,
    position: Point3<f64>,
}

fn potential_at(site: &Point3<f64>, solute: &[Point3<f64>], charges: &[f64]) -> f64 {
    compensated_sum(
        solute
            .iter()
            .zip(charges)
            .map(|(p, q)| q / (p - site).norm_squared()),
    )
}

struct CandidatePool {
    candidates: Vec<Candidate>,
    potentials: Vec<f64>,
    active: Vec<bool>,
    grid: CellGrid,
    neighborhoods: HashMap<usize, Vec<usize>>,
    exclusion: f64,
}

impl CandidatePool {
    fn available(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Active candidate with the lowest (or highest) potential; ties go to the first.
    fn pick(&self, lowest: bool) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, &potential) in self.potentials.iter().enumerate() {
            if !self.active[index] {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) if lowest => potential < self.potentials[b],
                Some(b) => potential > self.potentials[b],
            };
            if better {
                best = Some(index);
            }
        }
        best
    }

    /// Deactivates the chosen site and its neighbors, then adds the new ion's field.
    fn occupy(&mut self, chosen: usize, charge: f64) {
        self.active[chosen] = false;
        let site = self.candidates[chosen].position;
        let cell = self.grid.cell_of(&site);
        let grid = &self.grid;
        let nearby = self
            .neighborhoods
            .entry(cell)
            .or_insert_with(|| grid.neighborhood(cell));
        let limit = self.exclusion * self.exclusion;
        for &other in nearby.iter() {
            if self.active[other]
                && (self.candidates[other].position - site).norm_squared() <= limit
            {
                self.active[other] = false;
            }
        }

        let candidates = &self.candidates;
        let update = |(index, (potential, active)): (usize, (&mut f64, &bool))| {
            if *active {
                *potential += charge / (candidates[index].position - site).norm_squared();
            }
        };

        #[cfg(not(feature = "parallel"))]
        self.potentials
            .iter_mut()
            .zip(self.active.iter())
            .enumerate()
            .for_each(update);

        #[cfg(feature = "parallel")]
        self.potentials
            .par_iter_mut()
            .zip(self.active.par_iter())
            .enumerate()
            .for_each(update);
    }
}

/// Replaces solvent molecules with counter-ions placed at potential extrema.
///
/// Cations go to the candidate site with the lowest potential and anions to the highest,
/// where the potential of a site is the sum of `charge / r^2` over solute atoms. Solvent
/// molecules with any atom within the ion-solute distance of the solute never host an
/// ion; after each placement every site within the ion-ion distance is withdrawn and the
/// remaining potentials are updated with the new ion's contribution.
///
/// # Return
///
/// The placed ions, cations first. Solvent molecules hosting an ion are removed from
/// `solvent`.
///
/// # Errors
///
/// Returns [`EngineError::NotImplemented`] for random placement and
/// [`EngineError::InsufficientCandidates`] when the pool runs dry.
pub fn ionize(
    solute: &[Point3<f64>],
    charges: &[f64],
    solvent: &mut SolvationResult,
    config: &IonizationConfig,
    reporter: &ProgressReporter,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<PlacedIon>, EngineError> {
    if config.method == PlacementMethod::Random {
        return Err(EngineError::NotImplemented("random ion placement"));
    }
    if solute.len() != charges.len() {
        return Err(EngineError::Internal(format!(
            "{} solute positions but {} charges",
            solute.len(),
            charges.len()
        )));
    }

    let total = compensated_sum(charges.iter().copied());
    let net_charge = total.round();
    info!(net_charge = total, "Solute charge computed.");
    if (total - net_charge).abs() > CHARGE_TOLERANCE {
        diagnostics.report(Diagnostic::NonIntegerCharge { charge: total });
    }

    let (n_cations, n_anions) = ion_counts(net_charge as i64, config, solvent.box_info.volume());
    if n_cations == 0 && n_anions == 0 {
        info!("No ions to add.");
        return Ok(Vec::new());
    }

    let box_info = solvent.box_info;
    let solute_grid = CellGrid::from_points(
        box_info.min,
        box_info.max,
        config.ion_solute_distance,
        solute,
    )?;

    let molecules: Vec<(usize, usize, &Vec<Point3<f64>>)> = solvent
        .copies
        .iter()
        .enumerate()
        .flat_map(|(c, copy)| copy.iter().enumerate().map(move |(m, mol)| (c, m, mol)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = molecules.iter();
    #[cfg(feature = "parallel")]
    let iterator = molecules.par_iter();

    let candidates: Vec<Candidate> = iterator
        .filter(|(_, _, mol)| {
            !mol.iter()
                .any(|p| solute_grid.any_within_radius(p, config.ion_solute_distance))
        })
        .filter_map(|&(copy, molecule, mol)| {
            mol.first().map(|&position| Candidate {
                copy,
                molecule,
                position,
            })
        })
        .collect();
    debug!(
        candidates = candidates.len(),
        excluded = molecules.len() - candidates.len(),
        "Candidate sites selected."
    );

    #[cfg(not(feature = "parallel"))]
    let iterator = candidates.iter();
    #[cfg(feature = "parallel")]
    let iterator = candidates.par_iter();
    let potentials: Vec<f64> = iterator
        .map(|c| potential_at(&c.position, solute, charges))
        .collect();

    let grid = CellGrid::from_points(
        box_info.min,
        box_info.max,
        config.ion_ion_distance,
        candidates.iter().map(|c| &c.position),
    )?;
    let mut pool = CandidatePool {
        active: vec![true; candidates.len()],
        candidates,
        potentials,
        grid,
        neighborhoods: HashMap::new(),
        exclusion: config.ion_ion_distance,
    };

    reporter.report(Progress::TaskStart {
        total_steps: (n_cations + n_anions) as u64,
    });
    let mut ions = Vec::with_capacity(n_cations + n_anions);
    let plan = [(config.cation, n_cations, true), (config.anion, n_anions, false)];
    for (species, count, lowest) in plan {
        for placed in 0..count {
            let chosen = pool
                .pick(lowest)
                .ok_or(EngineError::InsufficientCandidates {
                    requested: count - placed,
                    available: pool.available(),
                })?;
            let position = pool.candidates[chosen].position;
            debug!(
                ion = species.residue_name,
                x = position.x,
                y = position.y,
                z = position.z,
                "Ion placed."
            );
            pool.occupy(chosen, f64::from(species.charge));
            ions.push((species, chosen));
            reporter.report(Progress::TaskIncrement);
        }
    }
    reporter.report(Progress::TaskFinish);

    let replaced: HashSet<(usize, usize)> = ions
        .iter()
        .map(|&(_, index)| (pool.candidates[index].copy, pool.candidates[index].molecule))
        .collect();
    let placed: Vec<PlacedIon> = ions
        .iter()
        .map(|&(species, index)| PlacedIon {
            species,
            position: pool.candidates[index].position,
        })
        .collect();

    let copies = std::mem::take(&mut solvent.copies);
    solvent.copies = copies
        .into_iter()
        .enumerate()
        .map(|(c, copy)| {
            copy.into_iter()
                .enumerate()
                .filter(|(m, _)| !replaced.contains(&(c, *m)))
                .map(|(_, mol)| mol)
                .collect::<Vec<_>>()
        })
        .filter(|copy| !copy.is_empty())
        .collect();

    info!(
        cations = n_cations,
        anions = n_anions,
        final_charge = total + (n_cations as f64) * f64::from(config.cation.charge)
            + (n_anions as f64) * f64::from(config.anion.charge),
        "Ions added."
    );
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::IonizationConfigBuilder;
    use crate::engine::solvation::BoxInfo;

    fn water(x: f64, y: f64, z: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x, y, z),
            Point3::new(x + 0.9572, y, z),
            Point3::new(x - 0.24, y + 0.927, z),
        ]
    }

    fn solvent_line(xs: &[f64]) -> SolvationResult {
        SolvationResult {
            copies: vec![xs.iter().map(|&x| water(x, 0.0, 0.0)).collect()],
            box_info: BoxInfo::new(Point3::new(-40.0, -10.0, -10.0), Point3::new(40.0, 10.0, 10.0)),
        }
    }

    #[test]
    fn lookup_ion_accepts_names_and_aliases() {
        assert_eq!(lookup_ion("Na+"), lookup_ion("SOD"));
        let zinc = lookup_ion("Zn2+").unwrap();
        assert_eq!(zinc.atom_name, "ZN");
        assert_eq!(zinc.charge, 2);
        assert!(lookup_ion("XX").is_none());
    }

    #[test]
    fn ion_counts_neutralize_negative_charge_with_divalent_cation() {
        let config = IonizationConfigBuilder::new().cation("MG").build().unwrap();
        assert_eq!(ion_counts(-3, &config, 1000.0), (2, 1));
        assert_eq!(ion_counts(-4, &config, 1000.0), (2, 0));
    }

    #[test]
    fn ion_counts_neutralize_positive_charge_with_anions() {
        let config = IonizationConfigBuilder::new().build().unwrap();
        assert_eq!(ion_counts(3, &config, 1000.0), (0, 3));
        assert_eq!(ion_counts(0, &config, 1000.0), (0, 0));
    }

    #[test]
    fn ion_counts_add_salt_pairs_for_box_volume() {
        let config = IonizationConfigBuilder::new()
            .salt_concentration(0.15)
            .build()
            .unwrap();
        // 0.15 M in 50^3 A^3 is 11.29 pairs.
        assert_eq!(ion_counts(-2, &config, 125_000.0), (13, 11));
    }

    #[test]
    fn ion_counts_use_explicit_counts_as_given() {
        let config = IonizationConfigBuilder::new()
            .cation_count(4)
            .anion_count(1)
            .salt_concentration(1.0)
            .build()
            .unwrap();
        assert_eq!(ion_counts(-10, &config, 1e6), (4, 1));
    }

    #[test]
    fn ionize_places_cation_at_lowest_potential_and_removes_its_water() {
        let solute = vec![Point3::new(0.0, 0.0, 0.0)];
        let charges = vec![-1.0];
        let mut solvent = solvent_line(&[-30.0, -8.0, 8.0, 20.0, 30.0]);
        let config = IonizationConfigBuilder::new()
            .ion_solute_distance(5.0)
            .ion_ion_distance(5.0)
            .build()
            .unwrap();

        let mut diagnostics = Diagnostics::new();
        let ions = ionize(
            &solute,
            &charges,
            &mut solvent,
            &config,
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(ions.len(), 1);
        assert_eq!(ions[0].species.residue_name, "SOD");
        // Potential -1/r^2 is lowest at the smallest distance; -8 comes before 8.
        assert_eq!(ions[0].position, Point3::new(-8.0, 0.0, 0.0));
        assert_eq!(solvent.molecule_count(), 4);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn ionize_neutralizes_triply_charged_solute_with_monovalent_cations() {
        let solute = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let charges = vec![-1.2, -0.9, -0.9];
        let mut solvent = solvent_line(&[-30.0, -20.0, -10.0, 10.0, 20.0, 30.0]);
        let config = IonizationConfigBuilder::new()
            .ion_solute_distance(5.0)
            .ion_ion_distance(5.0)
            .build()
            .unwrap();
        assert_eq!(ion_counts(-3, &config, solvent.box_info.volume()), (3, 0));

        let mut diagnostics = Diagnostics::new();
        let ions = ionize(
            &solute,
            &charges,
            &mut solvent,
            &config,
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(ions.len(), 3);
        assert!(ions.iter().all(|ion| ion.species.residue_name == "SOD"));
        assert_eq!(solvent.molecule_count(), 3);
        assert!(diagnostics.is_empty());

        let final_charge = compensated_sum(
            charges
                .iter()
                .copied()
                .chain(ions.iter().map(|ion| f64::from(ion.species.charge))),
        );
        assert!(final_charge.abs() < 1e-6);
    }

    #[test]
    fn ionize_skips_sites_near_solute_and_near_placed_ions() {
        let solute = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let charges = vec![-1.0, -1.0];
        let mut solvent = solvent_line(&[3.0, 10.0, 13.0, 25.0]);
        let config = IonizationConfigBuilder::new().build().unwrap();

        let mut diagnostics = Diagnostics::new();
        let ions = ionize(
            &solute,
            &charges,
            &mut solvent,
            &config,
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        let xs: Vec<f64> = ions.iter().map(|ion| ion.position.x).collect();
        assert_eq!(xs, vec![10.0, 25.0]);
        assert_eq!(solvent.molecule_count(), 2);
    }

    #[test]
    fn ionize_reports_exhausted_candidate_pool() {
        let solute = vec![Point3::new(0.0, 0.0, 0.0)];
        let mut solvent = solvent_line(&[10.0]);
        let config = IonizationConfigBuilder::new()
            .cation_count(2)
            .build()
            .unwrap();

        let result = ionize(
            &solute,
            &[0.0],
            &mut solvent,
            &config,
            &ProgressReporter::new(),
            &mut Diagnostics::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::InsufficientCandidates {
                requested: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn ionize_flags_non_integer_charge_and_continues() {
        let solute = vec![Point3::new(0.0, 0.0, 0.0)];
        let mut solvent = solvent_line(&[10.0]);
        let config = IonizationConfigBuilder::new().build().unwrap();
        let mut diagnostics = Diagnostics::new();

        let ions = ionize(
            &solute,
            &[0.2],
            &mut solvent,
            &config,
            &ProgressReporter::new(),
            &mut diagnostics,
        )
        .unwrap();

        assert!(ions.is_empty());
        assert_eq!(
            diagnostics.count_where(|d| matches!(d, Diagnostic::NonIntegerCharge { .. })),
            1
        );
    }

    #[test]
    fn ionize_rejects_random_method() {
        let config = IonizationConfigBuilder::new()
            .method(PlacementMethod::Random)
            .build()
            .unwrap();
        let result = ionize(
            &[Point3::origin()],
            &[-1.0],
            &mut solvent_line(&[10.0]),
            &config,
            &ProgressReporter::new(),
            &mut Diagnostics::new(),
        );
        assert!(matches!(result, Err(EngineError::NotImplemented(_))));
    }
}
