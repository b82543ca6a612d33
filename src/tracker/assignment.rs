//! Gated distance costs and optimal track-to-detection assignment.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tracker::point::{self, Point3};

/// Detection input for the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// World-space position (x, y, z)
    pub position: Point3,
}

impl Detection {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
        }
    }

    pub fn from_point(position: Point3) -> Self {
        Self { position }
    }

    /// Fails with `InvalidDimension` unless `values` holds exactly three coordinates.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        point::point_from_slice(values).map(Self::from_point)
    }
}

/// Distance and velocity gates applied to candidate pairs.
///
/// Both comparisons are strict: a pair is admitted only if the distance is
/// below `max_dist` and the implied speed is below `max_vel`. `None` disables
/// a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gates {
    #[serde(default)]
    pub max_dist: Option<f64>,
    #[serde(default)]
    pub max_vel: Option<f64>,
}

impl Gates {
    pub fn new(max_dist: Option<f64>, max_vel: Option<f64>) -> Self {
        Self { max_dist, max_vel }
    }

    /// No gating at all.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn admits(&self, reference: &Point3, candidate: &Point3, dt: f64) -> bool {
        if let Some(max_vel) = self.max_vel {
            if point::implied_speed(reference, candidate, dt) >= max_vel {
                return false;
            }
        }
        if let Some(max_dist) = self.max_dist {
            if point::distance(reference, candidate) >= max_dist {
                return false;
            }
        }
        true
    }
}

/// Compute the gated distance cost matrix between track references and detections.
///
/// Pairs rejected by `gates` get an infinite cost and can never be matched.
pub fn distance_cost(
    references: &[Point3],
    detections: &[Point3],
    gates: &Gates,
    dt: f64,
) -> Array2<f64> {
    let mut cost = point::distance_batch(references, detections);
    for (i, r) in references.iter().enumerate() {
        for (j, d) in detections.iter().enumerate() {
            if !gates.admits(r, d, dt) {
                cost[[i, j]] = f64::INFINITY;
            }
        }
    }
    cost
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    /// Detection matched to `track`, if any.
    pub fn detection_for(&self, track: usize) -> Option<usize> {
        self.matches
            .iter()
            .find(|&&(t, _)| t == track)
            .map(|&(_, d)| d)
    }

    /// Total cost of the matched pairs under `cost`.
    pub fn total_cost(&self, cost: &Array2<f64>) -> f64 {
        self.matches.iter().map(|&(i, j)| cost[[i, j]]).sum()
    }
}

/// Solves the rectangular assignment problem with the Kuhn-Munkres algorithm.
///
/// Returns, for every row, the column it is matched to. Rows are never matched
/// to a column with a non-finite cost. Among all assignments the solver first
/// maximizes the number of finite pairs and then minimizes their summed cost.
/// Ties resolve to the lowest column index, so the result is reproducible.
pub fn hungarian(cost: &Array2<f64>) -> Vec<Option<usize>> {
    let (num_rows, num_cols) = cost.dim();
    if num_rows == 0 || num_cols == 0 {
        return vec![None; num_rows];
    }

    // Infinite entries and padding share one finite sentinel that outweighs
    // any difference between feasible totals.
    let max_abs = cost
        .iter()
        .filter(|c| c.is_finite())
        .fold(0.0_f64, |acc, c| acc.max(c.abs()));
    let k = num_rows.min(num_cols) as f64;
    let sentinel = (2.0 * k + 1.0) * max_abs + 1.0;

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), sentinel);
    for i in 0..num_rows {
        for j in 0..num_cols {
            let c = cost[[i, j]];
            if c.is_finite() {
                padded[[i, j]] = c;
            }
        }
    }

    let row_to_col = solve_square(&padded);

    row_to_col
        .into_iter()
        .take(num_rows)
        .enumerate()
        .map(|(i, j)| (j < num_cols && cost[[i, j]].is_finite()).then_some(j))
        .collect()
}

/// Shortest augmenting path Kuhn-Munkres on a square, fully finite matrix.
///
/// Uses 1-based row/column potentials with column 0 as the virtual source.
fn solve_square(a: &Array2<f64>) -> Vec<usize> {
    let n = a.nrows();
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    // col_owner[j] = 1-based row assigned to column j, 0 if free
    let mut col_owner = vec![0_usize; n + 1];
    let mut way = vec![0_usize; n + 1];

    for i in 1..=n {
        col_owner[0] = i;
        let mut j0 = 0;
        let mut min_to = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = col_owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = a[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < min_to[j] {
                    min_to[j] = reduced;
                    way[j] = j0;
                }
                if min_to[j] < delta {
                    delta = min_to[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[col_owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_to[j] -= delta;
                }
            }

            j0 = j1;
            if col_owner[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the source.
        loop {
            let j1 = way[j0];
            col_owner[j0] = col_owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![0_usize; n];
    for j in 1..=n {
        if col_owner[j] != 0 {
            row_to_col[col_owner[j] - 1] = j - 1;
        }
    }
    row_to_col
}

pub fn linear_assignment(cost_matrix: &Array2<f64>) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    for (row_idx, col) in hungarian(cost_matrix).into_iter().enumerate() {
        match col {
            Some(col_idx) => {
                matches.push((row_idx, col_idx));
                unmatched_detections_mask[col_idx] = false;
            }
            None => unmatched_tracks.push(row_idx),
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Gate and solve in one call.
pub fn associate(
    references: &[Point3],
    detections: &[Point3],
    gates: &Gates,
    dt: f64,
) -> AssignmentResult {
    let cost = distance_cost(references, detections, gates, dt);
    linear_assignment(&cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn on_x(xs: &[f64]) -> Vec<Point3> {
        xs.iter().map(|&x| Point3::new(x, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_detection_from_slice() {
        let det = Detection::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(det.position, Point3::new(1.0, 2.0, 3.0));
        assert!(Detection::from_slice(&[1.0]).is_err());
    }

    #[test]
    fn test_unique_optimum_is_found() {
        let cost = array![[4.0, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0]];
        let result = linear_assignment(&cost);
        assert_eq!(result.matches, vec![(0, 1), (1, 0), (2, 2)]);
        assert!(result.unmatched_tracks.is_empty());
        assert!(result.unmatched_detections.is_empty());
        assert_eq!(result.total_cost(&cost), 5.0);
    }

    #[test]
    fn test_beats_greedy_nearest_neighbour() {
        // Greedy takes the 0.1 pair (track 1, det 0) first and ends at 2.6.
        let refs = on_x(&[0.0, 1.0]);
        let dets = on_x(&[0.9, 2.5]);
        let result = associate(&refs, &dets, &Gates::open(), 1.0);
        assert_eq!(result.matches, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_distance_gate_leaves_track_unmatched() {
        let refs = on_x(&[0.0, 10.0]);
        let dets = on_x(&[0.4, 3.0]);
        let gates = Gates::new(Some(1.0), None);
        let result = associate(&refs, &dets, &gates, 1.0);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_velocity_gate_excludes_only_cheap_pair() {
        // 0.5 in 0.1s is 5 units/s, above the 4 units/s gate.
        let refs = on_x(&[0.0]);
        let dets = on_x(&[0.5, 3.0]);
        let gates = Gates::new(None, Some(4.0));
        let result = associate(&refs, &dets, &gates, 0.1);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0, 1]);
    }

    #[test]
    fn test_gate_is_strict() {
        let a = Point3::zeros();
        let dist_only = Gates::new(Some(1.0), None);
        assert!(!dist_only.admits(&a, &Point3::new(1.0, 0.0, 0.0), 1.0));
        assert!(dist_only.admits(&a, &Point3::new(0.99, 0.0, 0.0), 1.0));

        let vel_only = Gates::new(None, Some(2.0));
        assert!(!vel_only.admits(&a, &Point3::new(1.0, 0.0, 0.0), 0.5));
        assert!(vel_only.admits(&a, &Point3::new(1.0, 0.0, 0.0), 0.6));
    }

    #[test]
    fn test_maximizes_feasible_pairs_first() {
        // Matching (0,0) alone is cheaper, but (0,1)+(1,0) uses both tracks.
        let inf = f64::INFINITY;
        let cost = array![[1.0, 2.0], [3.0, inf]];
        let result = linear_assignment(&cost);
        assert_eq!(result.matches, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_rectangular_more_tracks() {
        let refs = on_x(&[0.0, 5.0, 10.0]);
        let dets = on_x(&[9.8, 0.1]);
        let result = associate(&refs, &dets, &Gates::open(), 1.0);
        assert_eq!(result.matches, vec![(0, 1), (2, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_rectangular_more_detections() {
        let refs = on_x(&[5.0]);
        let dets = on_x(&[0.0, 4.5, 10.0]);
        let result = associate(&refs, &dets, &Gates::open(), 1.0);
        assert_eq!(result.matches, vec![(0, 1)]);
        assert_eq!(result.unmatched_detections, vec![0, 2]);
    }

    #[test]
    fn test_empty_inputs() {
        let result = associate(&[], &on_x(&[1.0, 2.0]), &Gates::open(), 1.0);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1]);

        let result = associate(&on_x(&[1.0]), &[], &Gates::open(), 1.0);
        assert_eq!(result.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_all_infeasible() {
        let inf = f64::INFINITY;
        let cost = array![[inf, inf], [inf, inf]];
        let result = linear_assignment(&cost);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
        assert_eq!(result.unmatched_detections, vec![0, 1]);
    }

    #[test]
    fn test_ties_resolve_to_lowest_indices() {
        let single = linear_assignment(&array![[1.0, 1.0]]);
        assert_eq!(single.matches, vec![(0, 0)]);
        assert_eq!(single.unmatched_detections, vec![1]);

        let square = array![[1.0, 1.0], [1.0, 1.0]];
        let first = linear_assignment(&square);
        assert_eq!(first.matches, vec![(0, 0), (1, 1)]);
        assert_eq!(first, linear_assignment(&square));

        let wide = linear_assignment(&array![[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
        assert_eq!(wide.matches, vec![(0, 0), (1, 1)]);
        assert_eq!(wide.unmatched_detections, vec![2]);
    }

    #[test]
    fn test_detection_for() {
        let refs = on_x(&[0.0, 10.0]);
        let dets = on_x(&[10.1]);
        let result = associate(&refs, &dets, &Gates::open(), 1.0);
        assert_eq!(result.detection_for(1), Some(0));
        assert_eq!(result.detection_for(0), None);
    }
}
