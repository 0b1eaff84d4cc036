//! Nearest-neighbour pairing of two point sets.
//!
//! Pairs are chosen greedily by global distance: all candidate pairs within
//! the capture radius are sorted by distance (ties by index) and accepted
//! while both points are still free.  The result is deterministic and
//! independent of the order the points were realized in.

use nalgebra::Point3;
use rigspec_types::HolePair;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matching {
    /// Accepted pairs, sorted by left index.
    pub pairs: Vec<HolePair>,
    pub unmatched_left: Vec<usize>,
    pub unmatched_right: Vec<usize>,
}

impl Matching {
    /// Largest pair distance, or `None` when nothing matched.
    pub fn max_distance(&self) -> Option<f64> {
        self.pairs.iter().map(|p| p.distance).reduce(f64::max)
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched_left.is_empty() && self.unmatched_right.is_empty()
    }
}

/// Pair `left` with `right`, accepting only pairs closer than or at
/// `capture`.
pub fn match_nearest(left: &[Point3<f64>], right: &[Point3<f64>], capture: f64) -> Matching {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (i, a) in left.iter().enumerate() {
        for (j, b) in right.iter().enumerate() {
            let d = (b - a).norm();
            if d <= capture {
                candidates.push((d, i, j));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut left_used = vec![false; left.len()];
    let mut right_used = vec![false; right.len()];
    let mut pairs = Vec::new();
    for (distance, i, j) in candidates {
        if left_used[i] || right_used[j] {
            continue;
        }
        left_used[i] = true;
        right_used[j] = true;
        pairs.push(HolePair {
            left: i,
            right: j,
            distance,
        });
    }
    pairs.sort_by_key(|p| p.left);

    let free = |used: &[bool]| -> Vec<usize> {
        used.iter().enumerate().filter(|(_, u)| !**u).map(|(i, _)| i).collect()
    };
    Matching {
        pairs,
        unmatched_left: free(&left_used),
        unmatched_right: free(&right_used),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point3<f64> {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn identical_sets_match_at_zero_distance() {
        let pts = [p(0.0, 0.0), p(40.0, 0.0), p(40.0, 40.0)];
        let m = match_nearest(&pts, &pts, 5.0);
        assert!(m.is_complete());
        assert_eq!(m.pairs.len(), 3);
        assert_eq!(m.max_distance(), Some(0.0));
    }

    #[test]
    fn shifted_set_matches_each_point_to_its_twin() {
        let left = [p(0.0, 0.0), p(40.0, 0.0)];
        let right = [p(40.5, 0.0), p(0.5, 0.0)];
        let m = match_nearest(&left, &right, 20.0);
        assert_eq!(m.pairs[0].right, 1);
        assert_eq!(m.pairs[1].right, 0);
        assert!((m.pairs[0].distance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn points_beyond_capture_stay_unmatched() {
        let left = [p(0.0, 0.0), p(40.0, 0.0)];
        let right = [p(0.1, 0.0)];
        let m = match_nearest(&left, &right, 1.0);
        assert_eq!(m.pairs.len(), 1);
        assert_eq!(m.unmatched_left, vec![1]);
        assert!(m.unmatched_right.is_empty());
    }

    #[test]
    fn closest_pair_wins_a_contested_point() {
        let left = [p(0.0, 0.0), p(1.0, 0.0)];
        let right = [p(0.9, 0.0)];
        let m = match_nearest(&left, &right, 5.0);
        assert_eq!(m.pairs[0].left, 1);
        assert_eq!(m.unmatched_left, vec![0]);
    }

    #[test]
    fn empty_inputs() {
        let m = match_nearest(&[], &[p(0.0, 0.0)], 1.0);
        assert!(m.pairs.is_empty());
        assert_eq!(m.unmatched_right, vec![0]);
        assert_eq!(m.max_distance(), None);
    }
}
