use super::solvation::BoxInfo;
use crate::core::models::topology::TopologyOutput;
use crate::core::utils::summation::compensated_sum;
use nalgebra::{Point3, Vector3};
use serde::Serialize;

/// Converts daltons per cubic Angstrom into grams per cubic centimetre.
const DENSITY_FACTOR: f64 = 10.0 / 6.0220449;

/// Geometry and density of the periodic box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxSummary {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
    pub lengths: Vector3<f64>,
    pub center: Point3<f64>,
    /// Cubic Angstroms.
    pub volume: f64,
    /// Grams per cubic centimetre.
    pub density: f64,
}

/// Figures reported after a preparation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemSummary {
    pub atom_count: usize,
    /// Daltons.
    pub total_mass: f64,
    pub net_charge: f64,
    #[serde(rename = "box")]
    pub box_summary: Option<BoxSummary>,
}

impl SystemSummary {
    /// Derives the summary from the final atom records and the box, if the system was solvated.
    pub fn compute(topology: &TopologyOutput, box_info: Option<&BoxInfo>) -> Self {
        let total_mass = compensated_sum(topology.atoms.iter().map(|a| a.mass));
        let net_charge = compensated_sum(topology.atoms.iter().map(|a| a.charge));

        let box_summary = box_info.map(|b| {
            let volume = b.volume();
            BoxSummary {
                min: b.min,
                max: b.max,
                lengths: b.lengths,
                center: b.center(),
                volume,
                density: if volume > 0.0 {
                    total_mass / volume * DENSITY_FACTOR
                } else {
                    0.0
                },
            }
        });

        Self {
            atom_count: topology.atom_count(),
            total_mass,
            net_charge,
            box_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::AtomRecord;

    fn water_topology(molecules: usize) -> TopologyOutput {
        let mut topology = TopologyOutput::new();
        for m in 0..molecules {
            for (name, charge, mass) in [("OH2", -0.834, 15.9994), ("H1", 0.417, 1.008), ("H2", 0.417, 1.008)] {
                topology.atoms.push(AtomRecord {
                    serial: topology.atoms.len() + 1,
                    segment: "WAT".to_string(),
                    residue_number: m as isize + 1,
                    residue_name: "WAT".to_string(),
                    name: name.to_string(),
                    force_field_type: "OT".to_string(),
                    charge,
                    mass,
                });
            }
        }
        topology
    }

    #[test]
    fn unsolvated_system_has_no_box() {
        let summary = SystemSummary::compute(&water_topology(2), None);
        assert_eq!(summary.atom_count, 6);
        assert!((summary.total_mass - 2.0 * 18.0154).abs() < 1e-9);
        assert!(summary.net_charge.abs() < 1e-12);
        assert!(summary.box_summary.is_none());
    }

    #[test]
    fn liquid_water_density_is_close_to_one() {
        // 1000 waters in a 31.04 A cube is roughly ambient water.
        let side = 31.04;
        let box_info = BoxInfo::new(Point3::origin(), Point3::new(side, side, side));
        let summary = SystemSummary::compute(&water_topology(1000), Some(&box_info));

        let b = summary.box_summary.unwrap();
        assert!((b.volume - side.powi(3)).abs() < 1e-6);
        assert_eq!(b.center, Point3::new(side / 2.0, side / 2.0, side / 2.0));
        assert!((b.density - 0.997).abs() < 0.01, "density {}", b.density);
    }
}
