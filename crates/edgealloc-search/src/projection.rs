//! Projection of one task's row onto `{x ≥ 0, Σx ≤ 1}`.
//!
//! Negative entries are clipped first. A clipped row whose sum is already
//! within the unit budget is left as is; otherwise the row is projected
//! onto the probability simplex with the sorted cumulative-sum method.

use edgealloc_core::AllocationMatrix;

/// Slack on the unit-sum check so that a projected row projects to itself.
pub const SUM_TOLERANCE: f64 = 1e-12;

/// Project a row, returning a new vector.
pub fn project(row: &[f64]) -> Vec<f64> {
    let mut out = row.to_vec();
    project_in_place(&mut out);
    out
}

/// Project a row in place.
pub fn project_in_place(row: &mut [f64]) {
    let mut sum = 0.0;
    for x in row.iter_mut() {
        // NaN fails the comparison and is clipped as well.
        if !(*x > 0.0) {
            *x = 0.0;
        }
        sum += *x;
    }
    if sum <= 1.0 + SUM_TOLERANCE {
        return;
    }

    let mut sorted = row.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (i, &u) in sorted.iter().enumerate() {
        cumsum += u;
        let k = (i + 1) as f64;
        if u * k > cumsum - 1.0 {
            theta = (cumsum - 1.0) / k;
        }
    }

    for x in row.iter_mut() {
        *x = (*x - theta).max(0.0);
    }
}

/// Project every row of `matrix`.
pub fn project_matrix(matrix: &mut AllocationMatrix) {
    for t in 0..matrix.tasks() {
        project_in_place(matrix.row_mut(t));
    }
}
