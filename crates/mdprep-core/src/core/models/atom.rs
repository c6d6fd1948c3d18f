use super::ids::ResidueId;
use nalgebra::Point3;

/// Represents an atom of a structure together with its force-field assignment.
///
/// Atoms read from an input structure usually only carry a name and a position.
/// The type, charge and mass are filled in from residue templates during assembly,
/// and atoms created from templates start out without a position until the
/// internal-coordinate solver places them.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The 1-based sequence number, unique across the structure after assembly.
    pub serial: usize,
    /// The name of the atom within its residue (e.g., "CA", "OH2").
    pub name: String,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// The force field atom type (e.g., "CT1", "HT").
    pub force_field_type: String,
    /// The partial atomic charge in elementary charge units.
    pub partial_charge: f64,
    /// The atomic mass in daltons.
    pub mass: f64,
    /// The 3D coordinates in Angstroms, `None` while the atom is unresolved.
    pub position: Option<Point3<f64>>,
}

impl Atom {
    /// Creates a new `Atom` with an empty force-field assignment.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `position` - The 3D coordinates of the atom, if known.
    pub fn new(name: &str, position: Option<Point3<f64>>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            residue_id: ResidueId::default(),
            force_field_type: String::new(),
            partial_charge: 0.0,
            mass: 0.0,
            position,
        }
    }

    /// Creates a new atom that already carries its type, charge and mass.
    pub fn with_parameters(
        name: &str,
        force_field_type: &str,
        partial_charge: f64,
        mass: f64,
        position: Option<Point3<f64>>,
    ) -> Self {
        Self {
            force_field_type: force_field_type.to_string(),
            partial_charge,
            mass,
            ..Self::new(name, position)
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.position.is_some()
    }
}
