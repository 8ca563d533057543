//! Greedy 1D bucketing, shared by block-seed assignment and x/y-center clustering.
//!
//! Sorts the input, then starts a new bucket whenever a value strays more
//! than `tol` from the running mean of the current bucket. This is the one
//! clustering primitive every column/row reconstruction step in the grid
//! builder reduces to.

/// One bucket produced by [`cluster_1d`].
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster1d {
    pub mean: f32,
    pub count: usize,
}

/// Greedily bucket `values` by proximity, merging a value into the current
/// bucket when it is within `tol` of that bucket's running mean.
///
/// Returns buckets ordered by position (ascending), matching the sort order
/// of the input. Ties and floating-point order are stable because the sort
/// is by value only, never by hash-map iteration.
pub fn cluster_1d(values: &[f32], tol: f32) -> Vec<Cluster1d> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut clusters: Vec<Cluster1d> = Vec::new();
    let mut running_sum = sorted[0] as f64;
    let mut running_count = 1usize;

    for &v in &sorted[1..] {
        let running_mean = (running_sum / running_count as f64) as f32;
        if (v - running_mean).abs() <= tol {
            running_sum += v as f64;
            running_count += 1;
        } else {
            clusters.push(Cluster1d {
                mean: (running_sum / running_count as f64) as f32,
                count: running_count,
            });
            running_sum = v as f64;
            running_count = 1;
        }
    }
    clusters.push(Cluster1d {
        mean: (running_sum / running_count as f64) as f32,
        count: running_count,
    });

    clusters
}

/// Assign each value to the nearest of `seeds`, returning the seed index per value.
///
/// Used for block-seed assignment in bubble clustering (§4.3): ties resolve
/// to the lower seed index, keeping assignment deterministic.
pub fn assign_to_nearest(values: &[f32], seeds: &[f32]) -> Vec<usize> {
    values
        .iter()
        .map(|&v| {
            let mut best_idx = 0usize;
            let mut best_dist = f32::INFINITY;
            for (i, &s) in seeds.iter().enumerate() {
                let d = (v - s).abs();
                if d < best_dist {
                    best_dist = d;
                    best_idx = i;
                }
            }
            best_idx
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clusters_tight_groups_separately() {
        let values = [1.0, 1.2, 0.9, 50.0, 50.3, 49.8, 100.0];
        let clusters = cluster_1d(&values, 2.0);
        assert_eq!(clusters.len(), 3);
        assert!((clusters[0].mean - 1.0333).abs() < 1e-2);
        assert_eq!(clusters[0].count, 3);
        assert_eq!(clusters[2].count, 1);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_1d(&[], 1.0).is_empty());
    }

    #[test]
    fn assign_to_nearest_breaks_ties_low() {
        let seeds = [0.0, 10.0];
        let assigned = assign_to_nearest(&[5.0], &seeds);
        assert_eq!(assigned, vec![0]);
    }
}
