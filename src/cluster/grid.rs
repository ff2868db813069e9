use glam::DVec2;
use std::collections::HashMap;

/// Spatial hash grid over projected points.
/// Stores positions only; callers keep the payload in a parallel Vec and
/// use the returned indices.
pub struct PointGrid {
    /// Grid cells indexed by (cell_x, cell_y)
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<DVec2>,
    cell_size: f64,
}

impl PointGrid {
    /// Build a grid whose cells are `cell_size` wide in projected units.
    /// Sizing cells to the search radius keeps `within` to a 3x3 scan.
    pub fn build(points: Vec<DVec2>, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        let mut grid = Self {
            cells: HashMap::new(),
            points: Vec::new(),
            cell_size,
        };
        for (idx, p) in points.iter().enumerate() {
            let cell = grid.to_cell(*p);
            grid.cells.entry(cell).or_default().push(idx);
        }
        grid.points = points;
        grid
    }

    #[inline(always)]
    fn to_cell(&self, p: DVec2) -> (i64, i64) {
        let x = (p.x / self.cell_size).floor() as i64;
        let y = (p.y / self.cell_size).floor() as i64;
        (x, y)
    }

    /// Indices of points within `radius` of `center` (inclusive)
    pub fn within(&self, center: DVec2, radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let mut results = Vec::new();
        self.visit_cells(center - DVec2::splat(radius), center + DVec2::splat(radius), |idx, p| {
            if p.distance_squared(center) <= r2 {
                results.push(idx);
            }
        });
        results.sort_unstable();
        results
    }

    /// Indices of points inside the closed box [min, max], ascending
    pub fn range(&self, min: DVec2, max: DVec2) -> Vec<usize> {
        let mut results = Vec::new();
        self.visit_cells(min, max, |idx, p| {
            if p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y {
                results.push(idx);
            }
        });
        results.sort_unstable();
        results
    }

    /// Feed every point in cells overlapping [min, max] to `f`.
    /// Huge boxes over a fine grid walk the occupied cells instead of
    /// enumerating empty ones.
    fn visit_cells(&self, min: DVec2, max: DVec2, mut f: impl FnMut(usize, DVec2)) {
        let min_cell = self.to_cell(min);
        let max_cell = self.to_cell(max);
        let span_x = (max_cell.0 - min_cell.0 + 1).max(0) as u128;
        let span_y = (max_cell.1 - min_cell.1 + 1).max(0) as u128;

        if span_x * span_y > self.cells.len() as u128 {
            for (&(x, y), indices) in &self.cells {
                if x < min_cell.0 || x > max_cell.0 || y < min_cell.1 || y > max_cell.1 {
                    continue;
                }
                for &idx in indices {
                    f(idx, self.points[idx]);
                }
            }
            return;
        }

        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                if let Some(indices) = self.cells.get(&(x, y)) {
                    for &idx in indices {
                        f(idx, self.points[idx]);
                    }
                }
            }
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> PointGrid {
        PointGrid::build(
            vec![
                DVec2::new(0.10, 0.10),
                DVec2::new(0.11, 0.10),
                DVec2::new(0.50, 0.50),
                DVec2::new(0.90, 0.95),
            ],
            0.05,
        )
    }

    #[test]
    fn test_within_is_exact() {
        let g = grid();
        assert_eq!(g.within(DVec2::new(0.10, 0.10), 0.02), vec![0, 1]);
        assert_eq!(g.within(DVec2::new(0.10, 0.10), 0.005), vec![0]);
    }

    #[test]
    fn test_range_inclusive_edges() {
        let g = grid();
        assert_eq!(g.range(DVec2::new(0.10, 0.10), DVec2::new(0.50, 0.50)), vec![0, 1, 2]);
        assert_eq!(g.range(DVec2::ZERO, DVec2::ONE), vec![0, 1, 2, 3]);
        assert!(g.range(DVec2::new(0.6, 0.0), DVec2::new(0.8, 0.4)).is_empty());
    }

    #[test]
    fn test_fine_grid_whole_world_query() {
        // Cell size this small would mean ~1e12 cells for the whole world
        let g = PointGrid::build(vec![DVec2::new(0.3, 0.3), DVec2::new(0.7, 0.2)], 1e-6);
        assert_eq!(g.range(DVec2::ZERO, DVec2::ONE), vec![0, 1]);
        assert_eq!(g.len(), 2);
    }
}
