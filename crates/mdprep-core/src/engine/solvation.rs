use super::config::SolvationConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::solvent::SolventBoxTemplate;
use crate::core::spatial::grid::CellGrid;
use crate::core::utils::geometry::bounding_box;
use nalgebra::{Point3, Vector3};
use std::str::FromStr;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolventAtom {
    pub name: &'static str,
    pub atom_type: &'static str,
    pub charge: f64,
    pub mass: f64,
}

const TIP3P_ATOMS: [SolventAtom; 3] = [
    SolventAtom {
        name: "OH2",
        atom_type: "OT",
        charge: -0.834,
        mass: 15.9994,
    },
    SolventAtom {
        name: "H1",
        atom_type: "HT",
        charge: 0.417,
        mass: 1.008,
    },
    SolventAtom {
        name: "H2",
        atom_type: "HT",
        charge: 0.417,
        mass: 1.008,
    },
];

/// Built-in explicit solvent models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolventModel {
    #[default]
    Tip3p,
}

impl SolventModel {
    pub fn residue_name(&self) -> &'static str {
        match self {
            Self::Tip3p => "WAT",
        }
    }

    /// Atoms of one molecule; the first atom is the ion-coordinating site.
    pub fn atoms(&self) -> &'static [SolventAtom] {
        match self {
            Self::Tip3p => &TIP3P_ATOMS,
        }
    }

    pub fn atom_names(&self) -> Vec<&'static str> {
        self.atoms().iter().map(|atom| atom.name).collect()
    }

    /// Bonds as zero-based atom indices within one molecule.
    pub fn bonds(&self) -> &'static [[usize; 2]] {
        match self {
            Self::Tip3p => &[[0, 1], [0, 2]],
        }
    }

    pub fn angles(&self) -> &'static [[usize; 3]] {
        match self {
            Self::Tip3p => &[[1, 0, 2]],
        }
    }

    /// Edge length of the cubic template box in Angstroms.
    pub fn box_length(&self) -> f64 {
        match self {
            Self::Tip3p => 65.4195,
        }
    }
}

impl FromStr for SolventModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TIP3P" => Ok(Self::Tip3p),
            _ => Err(format!("unknown solvent model '{s}'")),
        }
    }
}

/// The periodic box around a solvated system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxInfo {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
    pub lengths: Vector3<f64>,
}

impl BoxInfo {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            min,
            max,
            lengths: max - min,
        }
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }
}

/// One solvent molecule: atom positions in model order.
pub type SolventMolecule = Vec<Point3<f64>>;

/// Kept solvent grouped by the template copy it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvationResult {
    /// Non-empty template copies, each holding its surviving molecules.
    pub copies: Vec<Vec<SolventMolecule>>,
    pub box_info: BoxInfo,
}

impl SolvationResult {
    pub fn molecule_count(&self) -> usize {
        self.copies.iter().map(Vec::len).sum()
    }

    pub fn molecules(&self) -> impl Iterator<Item = &SolventMolecule> {
        self.copies.iter().flatten()
    }
}

struct TileFlags {
    inside: bool,
    near_solute: bool,
}

fn tile_flags(
    origin: &Point3<f64>,
    side: f64,
    box_info: &BoxInfo,
    shell_min: &Point3<f64>,
    shell_max: &Point3<f64>,
) -> TileFlags {
    let mut inside = true;
    let mut separated = false;
    for axis in 0..3 {
        let start = origin[axis];
        let end = start + side;
        inside &= start > box_info.min[axis] && end < box_info.max[axis];
        separated |= start > shell_max[axis] || end < shell_min[axis];
    }
    TileFlags {
        inside,
        near_solute: !separated,
    }
}

/// Surrounds the solute with copies of a pre-equilibrated solvent box.
///
/// The box is the solute bounding box grown by `padding` on every side. Template copies
/// are tiled from the box minimum; molecules with any atom outside the box are dropped,
/// and molecules with any atom within `cutoff` of a solute atom are dropped as a whole.
///
/// # Errors
///
/// Returns [`EngineError::EmptySolute`] if no solute position is given, or a grid error if
/// the box cannot be indexed.
pub fn solvate(
    solute: &[Point3<f64>],
    template: &SolventBoxTemplate,
    config: &SolvationConfig,
    reporter: &ProgressReporter,
) -> Result<SolvationResult, EngineError> {
    let (solute_min, solute_max) = bounding_box(solute.iter()).ok_or(EngineError::EmptySolute)?;
    let pad = Vector3::repeat(config.padding);
    let cut = Vector3::repeat(config.cutoff);
    let box_info = BoxInfo::new(solute_min - pad, solute_max + pad);
    let shell_min = solute_min - cut;
    let shell_max = solute_max + cut;

    let side = config.model.box_length();
    let counts = box_info.lengths.map(|len| (len / side).ceil().max(1.0) as usize);
    info!(
        copies = counts.x * counts.y * counts.z,
        box_x = box_info.lengths.x,
        box_y = box_info.lengths.y,
        box_z = box_info.lengths.z,
        "Tiling solvent template."
    );

    let grid = CellGrid::from_points(box_info.min, box_info.max, config.cutoff, solute)?;

    reporter.report(Progress::TaskStart {
        total_steps: (counts.x * counts.y * counts.z) as u64,
    });
    let mut copies = Vec::new();
    for i in 0..counts.x {
        for j in 0..counts.y {
            for k in 0..counts.z {
                let origin = box_info.min + Vector3::new(i as f64, j as f64, k as f64) * side;
                let flags = tile_flags(&origin, side, &box_info, &shell_min, &shell_max);
                let offset = origin.coords;

                let mut molecules: Vec<SolventMolecule> = template
                    .molecules()
                    .iter()
                    .map(|molecule| molecule.iter().map(|p| p + offset).collect())
                    .collect();
                if !flags.inside {
                    molecules.retain(|molecule| molecule.iter().all(|p| box_info.contains(p)));
                }
                if flags.near_solute {
                    molecules = remove_overlapping(molecules, &grid, &box_info)?;
                }
                if !molecules.is_empty() {
                    copies.push(molecules);
                }
                reporter.report(Progress::TaskIncrement);
            }
        }
    }
    reporter.report(Progress::TaskFinish);

    let result = SolvationResult { copies, box_info };
    debug!(
        copies = result.copies.len(),
        molecules = result.molecule_count(),
        "Solvent placement finished."
    );
    Ok(result)
}

/// Drops every molecule with an atom within the solute grid's cell size of a solute atom.
///
/// The solvent atoms of the copy get their own grid over the same domain and cell size,
/// so a cell index addresses the same region in both. Only the cells holding solute atoms
/// are scanned, each against the solvent atoms in its neighborhood.
fn remove_overlapping(
    molecules: Vec<SolventMolecule>,
    solute_grid: &CellGrid,
    box_info: &BoxInfo,
) -> Result<Vec<SolventMolecule>, EngineError> {
    let cutoff = solute_grid.cell_size();
    let mut solvent_grid = CellGrid::new(box_info.min, box_info.max, cutoff)?;
    let mut owners = Vec::new();
    for (index, molecule) in molecules.iter().enumerate() {
        for atom in molecule {
            solvent_grid.insert(*atom);
            owners.push(index);
        }
    }

    let cells: Vec<usize> = solute_grid.occupied_cells().collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = cells.iter();

    #[cfg(feature = "parallel")]
    let iterator = cells.par_iter();

    let hits: Vec<Vec<usize>> = iterator
        .map(|&cell| overlapping_in_cell(cell, solute_grid, &solvent_grid, cutoff))
        .collect();

    let mut rejected = vec![false; molecules.len()];
    for atom in hits.into_iter().flatten() {
        rejected[owners[atom]] = true;
    }
    Ok(molecules
        .into_iter()
        .zip(rejected)
        .filter(|(_, rejected)| !rejected)
        .map(|(molecule, _)| molecule)
        .collect())
}

/// Solvent atom indices within `cutoff` of a solute atom of `cell`.
fn overlapping_in_cell(
    cell: usize,
    solute_grid: &CellGrid,
    solvent_grid: &CellGrid,
    cutoff: f64,
) -> Vec<usize> {
    let nearby = solvent_grid.neighborhood(cell);
    let cutoff_sq = cutoff * cutoff;
    let solute_atoms: Vec<&Point3<f64>> = solute_grid
        .cell_items(cell)
        .iter()
        .filter_map(|&i| solute_grid.point(i))
        .collect();
    nearby
        .into_iter()
        .filter(|&i| {
            solvent_grid.point(i).is_some_and(|atom| {
                solute_atoms
                    .iter()
                    .any(|s| (atom - *s).norm_squared() <= cutoff_sq)
            })
        })
        .collect()
}
