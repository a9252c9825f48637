//! Weighted L2-regularized least squares with an unpenalized intercept.
//!
//! Design matrices arrive as coordinate lists (the chemistry features are a
//! handful of signed ±1 entries per row) and are densified for the normal
//! equations. Columns and y are centered on their weighted means, then
//!
//!   (Xcᵀ W Xc + λI) β = Xcᵀ W yc,   intercept = ȳ − x̄·β
//!
//! is solved by Cholesky factorisation. The system is small (players + pairs)
//! so a dense solve is fine.

use crate::error::{check_lambda, LadderError, LadderResult};
use ndarray::{Array1, Array2, Axis};

/// Sparse design matrix in coordinate form. Repeated (row, col) entries add.
#[derive(Debug, Clone)]
pub struct SparseDesign {
    rows: usize,
    cols: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseDesign {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, entries: Vec::new() }
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.rows && col < self.cols, "entry out of bounds");
        self.entries.push((row, col, value));
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows, self.cols));
        for &(r, c, v) in &self.entries {
            dense[[r, c]] += v;
        }
        dense
    }
}

#[derive(Debug, Clone)]
pub struct RidgeFit {
    pub intercept: f64,
    pub coef: Array1<f64>,
    /// Per-coefficient t-statistics from the ridge sandwich covariance.
    /// `None` overall when there are no residual degrees of freedom; `None`
    /// per entry when that coefficient's standard error is zero.
    pub t_stats: Option<Vec<Option<f64>>>,
}

impl RidgeFit {
    pub fn predict(&self, x: &SparseDesign) -> Array1<f64> {
        let mut out = Array1::from_elem(x.rows(), self.intercept);
        for &(r, c, v) in &x.entries {
            out[r] += v * self.coef[c];
        }
        out
    }
}

pub fn fit_weighted_ridge(
    x: &SparseDesign,
    y: &Array1<f64>,
    w: &Array1<f64>,
    lambda: f64,
) -> LadderResult<RidgeFit> {
    let (n, p) = (x.rows(), x.cols());
    if y.len() != n || w.len() != n {
        return Err(insufficient(format!(
            "shape mismatch: {n} design rows, {} labels, {} weights",
            y.len(),
            w.len()
        )));
    }
    check_lambda("ridge lambda", lambda)?;
    if w.iter().any(|&wi| !wi.is_finite() || wi < 0.0) {
        return Err(insufficient("sample weights must be finite and >= 0".to_string()));
    }
    let w_sum = w.sum();
    if n == 0 || w_sum <= 0.0 {
        return Err(insufficient("no weighted samples".to_string()));
    }

    let dense = x.to_dense();
    let x_mean = dense.t().dot(w) / w_sum;
    let y_mean = y.dot(w) / w_sum;
    let xc = &dense - &x_mean.view().insert_axis(Axis(0));
    let yc = y - y_mean;

    // W·Xc, row-scaled.
    let wxc = &xc * &w.view().insert_axis(Axis(1));
    let gram = xc.t().dot(&wxc);
    let rhs = wxc.t().dot(&yc);

    let mut a = gram.clone();
    for j in 0..p {
        a[[j, j]] += lambda;
    }
    let chol = cholesky(&a)
        .ok_or_else(|| insufficient(format!("normal equations singular ({p} features, {n} samples)")))?;
    let coef = cholesky_solve(&chol, &rhs);
    let intercept = y_mean - x_mean.dot(&coef);

    let fit = RidgeFit { intercept, coef, t_stats: None };
    let t_stats = sandwich_t_stats(&fit, &chol, &gram, x, y, w);
    Ok(RidgeFit { t_stats, ..fit })
}

fn insufficient(reason: String) -> LadderError {
    LadderError::InsufficientData { reason }
}

/// t = β / se(β) with Cov(β) = σ² A⁻¹ G A⁻¹, σ² = Σ wᵢrᵢ² / (n − p − 1).
fn sandwich_t_stats(
    fit: &RidgeFit,
    chol: &Array2<f64>,
    gram: &Array2<f64>,
    x: &SparseDesign,
    y: &Array1<f64>,
    w: &Array1<f64>,
) -> Option<Vec<Option<f64>>> {
    let (n, p) = (x.rows(), x.cols());
    if n <= p + 1 {
        return None;
    }
    let residuals = y - &fit.predict(x);
    let sigma2 = (&residuals * &residuals).dot(w) / (n - p - 1) as f64;

    let mut a_inv = Array2::<f64>::zeros((p, p));
    for j in 0..p {
        let mut e = Array1::<f64>::zeros(p);
        e[j] = 1.0;
        a_inv.column_mut(j).assign(&cholesky_solve(chol, &e));
    }
    let cov = a_inv.dot(gram).dot(&a_inv) * sigma2;

    Some(
        (0..p)
            .map(|j| {
                let var = cov[[j, j]];
                (var > 0.0).then(|| fit.coef[j] / var.sqrt())
            })
            .collect(),
    )
}

/// Lower-triangular L with A = L Lᵀ, or `None` if A is not positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let p = a.nrows();
    let mut l = Array2::<f64>::zeros((p, p));
    let scale = (0..p).map(|i| a[[i, i]].abs()).fold(0.0, f64::max).max(1.0);
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 1e-12 * scale {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve L Lᵀ x = b by forward then back substitution.
fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let p = l.nrows();
    let mut z = Array1::<f64>::zeros(p);
    for i in 0..p {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let mut sum = z[i];
        for k in (i + 1)..p {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}
