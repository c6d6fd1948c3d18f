use nalgebra::{Point3, Vector3};

/// O-H bond length used for analytically placed water hydrogens, in Angstroms.
pub const WATER_OH_BOND_LENGTH: f64 = 0.9572;
/// H-O-H angle used for analytically placed water hydrogens, in degrees.
pub const WATER_HOH_ANGLE_DEGREES: f64 = 104.52;

/// Places an atom `l` bonded to `k` from three reference positions.
///
/// The reference atoms are given in bonding order `i-j-k`. A local frame is built with
/// its x axis along `j -> k`, its z axis normal to the plane of `i`, `j`, `k`, and its
/// y axis completing the right-handed frame. The new atom then sits at
/// `(-L cos(angle), L sin(angle) cos(torsion), L sin(angle) sin(torsion))` in that frame.
///
/// # Arguments
///
/// * `ri`, `rj`, `rk` - Known positions, `k` is the atom `l` bonds to.
/// * `torsion` - The `i-j-k-l` dihedral in radians.
/// * `angle` - The `j-k-l` bond angle in radians.
/// * `bond_length` - The `k-l` distance in Angstroms.
///
/// # Return
///
/// The world position of atom `l`. Collinear references produce non-finite coordinates.
pub fn place_from_internal(
    ri: &Point3<f64>,
    rj: &Point3<f64>,
    rk: &Point3<f64>,
    torsion: f64,
    angle: f64,
    bond_length: f64,
) -> Point3<f64> {
    let ex = (rk - rj).normalize();
    let rji = (ri - rj).normalize();
    let ez = ex.cross(&rji).normalize();
    let ey = ez.cross(&ex);

    let x = -bond_length * angle.cos();
    let y = bond_length * angle.sin() * torsion.cos();
    let z = bond_length * angle.sin() * torsion.sin();

    rk + ex * x + ey * y + ez * z
}

pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Returns the `a-b-c` angle in radians.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - b;
    let v = c - b;
    u.cross(&v).norm().atan2(u.dot(&v))
}

/// Returns the `a-b-c-d` dihedral in radians, in `(-pi, pi]`.
pub fn dihedral_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    (b2.norm() * b1.dot(&n2)).atan2(n1.dot(&n2))
}

/// Places both hydrogens of a three-site water from its oxygen.
///
/// The molecule is laid out in the xy plane: the first hydrogen along +x and the
/// second rotated by the H-O-H angle.
pub fn place_water_hydrogens(oxygen: &Point3<f64>) -> (Point3<f64>, Point3<f64>) {
    let angle = WATER_HOH_ANGLE_DEGREES.to_radians();
    let h1 = oxygen + Vector3::new(WATER_OH_BOND_LENGTH, 0.0, 0.0);
    let h2 = oxygen
        + Vector3::new(
            WATER_OH_BOND_LENGTH * angle.cos(),
            WATER_OH_BOND_LENGTH * angle.sin(),
            0.0,
        );
    (h1, h2)
}

/// Computes the axis-aligned bounding box of a set of points.
///
/// # Return
///
/// `Some((min, max))`, or `None` for an empty input.
pub fn bounding_box<'a>(
    points: impl IntoIterator<Item = &'a Point3<f64>>,
) -> Option<(Point3<f64>, Point3<f64>)> {
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    Some(iter.fold((first, first), |(min, max), p| {
        (min.inf(p), max.sup(p))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn references() -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        (
            Point3::new(0.3, 1.2, -0.4),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.1, 0.2),
        )
    }

    #[test]
    fn placement_round_trips_internal_coordinates() {
        let (ri, rj, rk) = references();
        for &(length, angle_deg, torsion_deg) in &[
            (1.53, 111.0, 60.0),
            (1.09, 109.5, -179.0),
            (1.33, 122.0, 0.0),
            (1.01, 95.0, -65.0),
            (2.04, 104.0, 172.3),
        ] {
            let angle = f64::to_radians(angle_deg);
            let torsion = f64::to_radians(torsion_deg);
            let rl = place_from_internal(&ri, &rj, &rk, torsion, angle, length);

            assert!((distance(&rk, &rl) - length).abs() < TOLERANCE);
            assert!((bond_angle(&rj, &rk, &rl) - angle).abs() < TOLERANCE);
            assert!((dihedral_angle(&ri, &rj, &rk, &rl) - torsion).abs() < TOLERANCE);
        }
    }

    #[test]
    fn trans_torsion_places_atom_opposite_to_first_reference() {
        let ri = Point3::new(0.0, 1.0, 0.0);
        let rj = Point3::new(0.0, 0.0, 0.0);
        let rk = Point3::new(1.0, 0.0, 0.0);
        let rl = place_from_internal(&ri, &rj, &rk, PI, PI / 2.0, 1.0);
        assert!((rl - Point3::new(1.0, -1.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn dihedral_angle_sign_follows_right_hand_rule() {
        let a = Point3::new(0.0, 1.0, 0.0);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);
        let d_plus = Point3::new(1.0, 0.0, 1.0);
        let d_minus = Point3::new(1.0, 0.0, -1.0);
        assert!((dihedral_angle(&a, &b, &c, &d_plus) - PI / 2.0).abs() < TOLERANCE);
        assert!((dihedral_angle(&a, &b, &c, &d_minus) + PI / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn water_hydrogens_have_reference_geometry() {
        let oxygen = Point3::new(3.0, -2.0, 7.5);
        let (h1, h2) = place_water_hydrogens(&oxygen);
        assert!((distance(&oxygen, &h1) - WATER_OH_BOND_LENGTH).abs() < TOLERANCE);
        assert!((distance(&oxygen, &h2) - WATER_OH_BOND_LENGTH).abs() < TOLERANCE);
        assert!(
            (bond_angle(&h1, &oxygen, &h2) - WATER_HOH_ANGLE_DEGREES.to_radians()).abs()
                < TOLERANCE
        );
    }

    #[test]
    fn bounding_box_covers_all_points() {
        let points = [
            Point3::new(1.0, -2.0, 3.0),
            Point3::new(-1.0, 5.0, 0.0),
            Point3::new(0.5, 0.0, 9.0),
        ];
        let (min, max) = bounding_box(&points).unwrap();
        assert_eq!(min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 5.0, 9.0));
        assert!(bounding_box(&[] as &[Point3<f64>]).is_none());
    }
}
