use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
    #[error("Invalid grid domain: min {min:?}, max {max:?}")]
    InvalidDomain { min: [f64; 3], max: [f64; 3] },
    #[error("Pair cutoff {cutoff} exceeds the grid cell size {cell_size}")]
    CutoffExceedsCell { cutoff: f64, cell_size: f64 },
    #[error("Grid of {dims:?} cells at cell size {cell_size} exceeds the cell limit")]
    TooManyCells { dims: [usize; 3], cell_size: f64 },
}

/// Upper bound on the number of cells a single grid may allocate.
pub const MAX_CELLS: usize = 1 << 24;

/// Forward half of the 26 neighbor offsets; with the home cell it visits each cell pair once.
const HALF_STENCIL: [[isize; 3]; 13] = [
    [1, 0, 0],
    [-1, 1, 0],
    [0, 1, 0],
    [1, 1, 0],
    [-1, -1, 1],
    [0, -1, 1],
    [1, -1, 1],
    [-1, 0, 1],
    [0, 0, 1],
    [1, 0, 1],
    [-1, 1, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// A uniform grid of cubic cells holding point indices.
///
/// Each axis has `floor(extent / cell_size) + 1` cells, so a degenerate domain still gets
/// one cell. Points outside the domain are clamped into the nearest edge cell; distance
/// checks always use the true coordinates, so clamping never produces false matches.
#[derive(Debug, Clone)]
pub struct CellGrid {
    origin: Point3<f64>,
    cell_size: f64,
    dims: [usize; 3],
    cells: Vec<Vec<usize>>,
    points: Vec<Point3<f64>>,
}

impl CellGrid {
    pub fn new(min: Point3<f64>, max: Point3<f64>, cell_size: f64) -> Result<Self, GridError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        let finite = min.iter().chain(max.iter()).all(|v| v.is_finite());
        if !finite || (0..3).any(|axis| max[axis] < min[axis]) {
            return Err(GridError::InvalidDomain {
                min: [min.x, min.y, min.z],
                max: [max.x, max.y, max.z],
            });
        }

        let dims = [0, 1, 2].map(|axis| {
            (((max[axis] - min[axis]) / cell_size).floor() as usize).saturating_add(1)
        });
        let cell_count = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .filter(|&n| n <= MAX_CELLS)
            .ok_or(GridError::TooManyCells { dims, cell_size })?;
        Ok(Self {
            origin: min,
            cell_size,
            dims,
            cells: vec![Vec::new(); cell_count],
            points: Vec::new(),
        })
    }

    /// Builds a grid over `[min, max]` and inserts every point in order.
    pub fn from_points<'p>(
        min: Point3<f64>,
        max: Point3<f64>,
        cell_size: f64,
        points: impl IntoIterator<Item = &'p Point3<f64>>,
    ) -> Result<Self, GridError> {
        let mut grid = Self::new(min, max, cell_size)?;
        for point in points {
            grid.insert(*point);
        }
        Ok(grid)
    }

    /// Inserts a point and returns its index within the grid.
    pub fn insert(&mut self, point: Point3<f64>) -> usize {
        let index = self.points.len();
        let cell = self.cell_of(&point);
        self.cells[cell].push(index);
        self.points.push(point);
        index
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<&Point3<f64>> {
        self.points.get(index)
    }

    /// Flat index of the cell containing `point`, after clamping into the domain.
    pub fn cell_of(&self, point: &Point3<f64>) -> usize {
        let coords = self.cell_coords(point);
        self.flat_index(coords)
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .map(|(cell, _)| cell)
    }

    pub fn cell_items(&self, cell: usize) -> &[usize] {
        self.cells.get(cell).map_or(&[], Vec::as_slice)
    }

    /// Indices of all points in the 27 cells around `cell`, including the cell itself.
    pub fn neighborhood(&self, cell: usize) -> Vec<usize> {
        let center = self.unflatten(cell);
        self.cells_around(center, 1)
            .flat_map(|c| self.cells[c].iter().copied())
            .collect()
    }

    /// Indices of points whose distance to `center` is at most `radius`.
    pub fn query_within_radius(&self, center: &Point3<f64>, radius: f64) -> Vec<usize> {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil().max(0.0) as usize;
        self.cells_around(self.cell_coords(center), reach)
            .flat_map(|c| self.cells[c].iter().copied())
            .filter(|&i| (self.points[i] - center).norm_squared() <= radius_sq)
            .collect()
    }

    pub fn any_within_radius(&self, center: &Point3<f64>, radius: f64) -> bool {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil().max(0.0) as usize;
        self.cells_around(self.cell_coords(center), reach)
            .flat_map(|c| self.cells[c].iter())
            .any(|&i| (self.points[i] - center).norm_squared() <= radius_sq)
    }

    /// Visits every unordered pair of inserted points no farther apart than `cutoff`.
    ///
    /// The callback receives the two indices (lower first) and their squared distance.
    /// `cutoff` must not exceed the cell size.
    pub fn for_each_pair_within<F>(&self, cutoff: f64, mut f: F) -> Result<(), GridError>
    where
        F: FnMut(usize, usize, f64),
    {
        if cutoff > self.cell_size {
            return Err(GridError::CutoffExceedsCell {
                cutoff,
                cell_size: self.cell_size,
            });
        }
        let cutoff_sq = cutoff * cutoff;
        let mut visit = |i: usize, j: usize| {
            let d2 = (self.points[i] - self.points[j]).norm_squared();
            if d2 <= cutoff_sq {
                f(i.min(j), i.max(j), d2);
            }
        };

        for home in self.occupied_cells() {
            let items = &self.cells[home];
            for (n, &i) in items.iter().enumerate() {
                for &j in &items[n + 1..] {
                    visit(i, j);
                }
            }

            let [x, y, z] = self.unflatten(home);
            for [dx, dy, dz] in HALF_STENCIL {
                let Some(other) = self.offset_cell([x, y, z], [dx, dy, dz]) else {
                    continue;
                };
                for &i in items {
                    for &j in &self.cells[other] {
                        visit(i, j);
                    }
                }
            }
        }
        Ok(())
    }

    fn cell_coords(&self, point: &Point3<f64>) -> [usize; 3] {
        [0, 1, 2].map(|axis| {
            let raw = ((point[axis] - self.origin[axis]) / self.cell_size).floor();
            if raw.is_nan() || raw < 0.0 {
                0
            } else {
                (raw as usize).min(self.dims[axis] - 1)
            }
        })
    }

    fn flat_index(&self, [x, y, z]: [usize; 3]) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    fn unflatten(&self, cell: usize) -> [usize; 3] {
        let x = cell % self.dims[0];
        let y = (cell / self.dims[0]) % self.dims[1];
        let z = cell / (self.dims[0] * self.dims[1]);
        [x, y, z]
    }

    fn offset_cell(&self, coords: [usize; 3], offset: [isize; 3]) -> Option<usize> {
        let mut shifted = [0usize; 3];
        for axis in 0..3 {
            let v = coords[axis].checked_add_signed(offset[axis])?;
            if v >= self.dims[axis] {
                return None;
            }
            shifted[axis] = v;
        }
        Some(self.flat_index(shifted))
    }

    fn cells_around(&self, center: [usize; 3], reach: usize) -> impl Iterator<Item = usize> + '_ {
        let range = |axis: usize| {
            center[axis].saturating_sub(reach)..=(center[axis] + reach).min(self.dims[axis] - 1)
        };
        let (xs, ys, zs) = (range(0), range(1), range(2));
        zs.flat_map(move |z| {
            let xs = xs.clone();
            ys.clone()
                .flat_map(move |y| xs.clone().map(move |x| self.flat_index([x, y, z])))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn brute_force_pairs(points: &[Point3<f64>], cutoff: f64) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                if (points[i] - points[j]).norm_squared() <= cutoff * cutoff {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn lattice_points() -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                for k in 0..4 {
                    let jitter = ((i * 7 + j * 3 + k) % 5) as f64 * 0.13;
                    points.push(p(i as f64 * 1.1 + jitter, j as f64 * 0.9, k as f64 * 1.3 - jitter));
                }
            }
        }
        points
    }

    #[test]
    fn new_rejects_invalid_cell_size() {
        let result = CellGrid::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0), 0.0);
        assert_eq!(result.unwrap_err(), GridError::InvalidCellSize(0.0));
        assert!(CellGrid::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0), f64::NAN).is_err());
    }

    #[test]
    fn new_rejects_inverted_or_non_finite_domain() {
        assert!(matches!(
            CellGrid::new(p(1.0, 0.0, 0.0), p(0.0, 1.0, 1.0), 1.0),
            Err(GridError::InvalidDomain { .. })
        ));
        assert!(matches!(
            CellGrid::new(p(0.0, 0.0, 0.0), p(f64::INFINITY, 1.0, 1.0), 1.0),
            Err(GridError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn new_rejects_cell_size_too_small_for_domain() {
        let result = CellGrid::new(p(0.0, 0.0, 0.0), p(100.0, 100.0, 100.0), 1e-4);
        assert!(matches!(result, Err(GridError::TooManyCells { .. })));

        let result = CellGrid::new(p(0.0, 0.0, 0.0), p(1e300, 1.0, 1.0), 1e-300);
        assert!(matches!(result, Err(GridError::TooManyCells { .. })));
    }

    #[test]
    fn degenerate_domain_has_a_single_cell() {
        let grid = CellGrid::new(p(2.0, 2.0, 2.0), p(2.0, 2.0, 2.0), 1.5).unwrap();
        assert_eq!(grid.dims(), [1, 1, 1]);
    }

    #[test]
    fn out_of_domain_points_are_clamped_into_edge_cells() {
        let mut grid = CellGrid::new(p(0.0, 0.0, 0.0), p(3.0, 3.0, 3.0), 1.0).unwrap();
        let far = grid.insert(p(100.0, -50.0, 1.5));
        assert_eq!(grid.dims(), [4, 4, 4]);
        let cell = grid.cell_of(&p(100.0, -50.0, 1.5));
        assert_eq!(grid.cell_items(cell), &[far]);
        assert_eq!(cell, grid.cell_of(&p(3.5, -0.1, 1.2)));
    }

    #[test]
    fn pair_enumeration_matches_brute_force() {
        let points = lattice_points();
        let grid = CellGrid::from_points(p(0.0, 0.0, -1.0), p(7.0, 4.0, 4.0), 1.5, &points).unwrap();

        let mut found = Vec::new();
        grid.for_each_pair_within(1.5, |i, j, _| found.push((i, j)))
            .unwrap();
        found.sort_unstable();

        assert_eq!(found, brute_force_pairs(&points, 1.5));
    }

    #[test]
    fn pair_enumeration_rejects_cutoff_larger_than_cell() {
        let grid = CellGrid::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0), 1.0).unwrap();
        assert!(matches!(
            grid.for_each_pair_within(2.0, |_, _, _| {}),
            Err(GridError::CutoffExceedsCell { .. })
        ));
    }

    #[test]
    fn radius_query_matches_brute_force_including_large_radius() {
        let points = lattice_points();
        let grid = CellGrid::from_points(p(0.0, 0.0, -1.0), p(7.0, 4.0, 4.0), 1.0, &points).unwrap();
        let center = p(3.0, 2.0, 1.0);

        for radius in [0.5, 1.0, 2.7] {
            let mut found = grid.query_within_radius(&center, radius);
            found.sort_unstable();
            let expected: Vec<usize> = (0..points.len())
                .filter(|&i| (points[i] - center).norm() <= radius)
                .collect();
            assert_eq!(found, expected);
            assert_eq!(grid.any_within_radius(&center, radius), !expected.is_empty());
        }
    }

    #[test]
    fn neighborhood_covers_adjacent_cells_only() {
        let points = [p(0.5, 0.5, 0.5), p(1.5, 0.5, 0.5), p(3.5, 0.5, 0.5)];
        let grid = CellGrid::from_points(p(0.0, 0.0, 0.0), p(4.0, 1.0, 1.0), 1.0, &points).unwrap();
        let mut near = grid.neighborhood(grid.cell_of(&points[0]));
        near.sort_unstable();
        assert_eq!(near, vec![0, 1]);
    }
}
