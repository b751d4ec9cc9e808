//! Sparse symmetric system assembly and conjugate-gradient solve.
//!
//! The quadratic wirelength objective produces one sparse symmetric
//! positive-definite system per axis. Assembly goes through a triplet
//! builder (duplicate entries are summed), and the solve is a
//! diagonal-preconditioned conjugate gradient whose kernels (SpMV, dot,
//! axpy) are data-parallel over row ranges.

use rayon::prelude::*;

/// Triplet accumulator for a symmetric sparse matrix.
pub struct TripletBuilder {
    n: usize,
    entries: Vec<(u32, u32, f64)>,
}

impl TripletBuilder {
    /// Creates a builder for an `n x n` system.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: Vec::new(),
        }
    }

    /// Adds `value` at `(row, col)`; duplicates are summed on build.
    pub fn add(&mut self, row: u32, col: u32, value: f64) {
        debug_assert!((row as usize) < self.n && (col as usize) < self.n);
        self.entries.push((row, col, value));
    }

    /// Merges another builder's entries (used for thread-local partial
    /// assembly).
    pub fn merge(&mut self, other: TripletBuilder) {
        self.entries.extend(other.entries);
    }

    /// Finalizes into compressed sparse row form.
    pub fn build(mut self) -> SparseMatrix {
        self.entries
            .sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; self.n + 1];
        let mut col_idx = Vec::new();
        let mut values = Vec::new();

        let mut iter = self.entries.into_iter().peekable();
        while let Some((row, col, mut value)) = iter.next() {
            while let Some(&(r2, c2, v2)) = iter.peek() {
                if r2 == row && c2 == col {
                    value += v2;
                    iter.next();
                } else {
                    break;
                }
            }
            row_ptr[row as usize + 1] += 1;
            col_idx.push(col as usize);
            values.push(value);
        }
        for i in 0..self.n {
            row_ptr[i + 1] += row_ptr[i];
        }

        let mut diag = vec![0.0; self.n];
        for row in 0..self.n {
            for k in row_ptr[row]..row_ptr[row + 1] {
                if col_idx[k] == row {
                    diag[row] = values[k];
                }
            }
        }

        SparseMatrix {
            n: self.n,
            row_ptr,
            col_idx,
            values,
            diag,
        }
    }
}

/// A symmetric sparse matrix in compressed sparse row form.
pub struct SparseMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    diag: Vec<f64>,
}

impl SparseMatrix {
    /// Matrix dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Returns the diagonal entry of `row`.
    pub fn diag(&self, row: usize) -> f64 {
        self.diag[row]
    }

    /// `out = self * x`, parallel over rows.
    pub fn spmv(&self, x: &[f64], out: &mut [f64]) {
        out.par_iter_mut().enumerate().for_each(|(row, o)| {
            let mut acc = 0.0;
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                acc += self.values[k] * x[self.col_idx[k]];
            }
            *o = acc;
        });
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.par_iter().zip(b.par_iter()).map(|(x, y)| x * y).sum()
}

/// Result of a conjugate-gradient solve.
pub struct CgOutcome {
    /// The solution vector (best iterate on non-convergence).
    pub x: Vec<f64>,
    /// Whether the residual threshold was reached.
    pub converged: bool,
    /// Iterations performed.
    pub iterations: usize,
}

/// Diagonal-preconditioned conjugate-gradient solver.
pub struct CgSolver {
    /// Relative residual threshold.
    pub tolerance: f64,
    /// Iteration cap as a multiple of the system dimension.
    pub max_iter_factor: usize,
}

impl Default for CgSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iter_factor: 2,
        }
    }
}

impl CgSolver {
    /// Solves `A x = b` starting from `x0`.
    ///
    /// Non-convergence is not fatal: the caller receives the best iterate
    /// with `converged = false` and applies its own step capping.
    pub fn solve(&self, a: &SparseMatrix, b: &[f64], x0: &[f64]) -> CgOutcome {
        let n = a.n();
        if n == 0 {
            return CgOutcome {
                x: Vec::new(),
                converged: true,
                iterations: 0,
            };
        }

        let mut x = x0.to_vec();
        let mut ax = vec![0.0; n];
        a.spmv(&x, &mut ax);
        let mut r: Vec<f64> = b.par_iter().zip(ax.par_iter()).map(|(b, ax)| b - ax).collect();

        let precond = |r: &[f64]| -> Vec<f64> {
            r.par_iter()
                .enumerate()
                .map(|(i, ri)| {
                    let d = a.diag(i);
                    if d.abs() > f64::MIN_POSITIVE {
                        ri / d
                    } else {
                        *ri
                    }
                })
                .collect()
        };

        let b_norm = dot(b, b).sqrt().max(f64::MIN_POSITIVE);
        let mut z = precond(&r);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        let max_iters = (self.max_iter_factor * n).max(8);
        let mut iterations = 0;
        let mut converged = dot(&r, &r).sqrt() / b_norm < self.tolerance;

        while !converged && iterations < max_iters {
            iterations += 1;
            let mut ap = vec![0.0; n];
            a.spmv(&p, &mut ap);
            let p_ap = dot(&p, &ap);
            if p_ap.abs() < 1e-300 {
                break;
            }
            let alpha = rz / p_ap;
            x.par_iter_mut().zip(p.par_iter()).for_each(|(x, p)| *x += alpha * p);
            r.par_iter_mut().zip(ap.par_iter()).for_each(|(r, ap)| *r -= alpha * ap);

            if dot(&r, &r).sqrt() / b_norm < self.tolerance {
                converged = true;
                break;
            }

            z = precond(&r);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            p = z
                .par_iter()
                .zip(p.par_iter())
                .map(|(z, p)| z + beta * p)
                .collect();
        }

        CgOutcome {
            x,
            converged,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplacian_2() -> SparseMatrix {
        // [ 2 -1; -1 2 ]
        let mut t = TripletBuilder::new(2);
        t.add(0, 0, 2.0);
        t.add(0, 1, -1.0);
        t.add(1, 0, -1.0);
        t.add(1, 1, 2.0);
        t.build()
    }

    #[test]
    fn triplets_sum_duplicates() {
        let mut t = TripletBuilder::new(2);
        t.add(0, 0, 1.0);
        t.add(0, 0, 1.5);
        t.add(1, 1, 1.0);
        let m = t.build();
        assert_eq!(m.diag(0), 2.5);
        assert_eq!(m.diag(1), 1.0);
    }

    #[test]
    fn spmv_matches_dense() {
        let m = laplacian_2();
        let mut out = vec![0.0; 2];
        m.spmv(&[1.0, 2.0], &mut out);
        assert_eq!(out, vec![0.0, 3.0]);
    }

    #[test]
    fn solves_small_spd_system() {
        let m = laplacian_2();
        let b = vec![1.0, 0.0];
        let out = CgSolver::default().solve(&m, &b, &[0.0, 0.0]);
        assert!(out.converged);
        // exact solution [2/3, 1/3]
        assert!((out.x[0] - 2.0 / 3.0).abs() < 1e-6);
        assert!((out.x[1] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn warm_start_converges_immediately() {
        let m = laplacian_2();
        let b = vec![1.0, 0.0];
        let out = CgSolver::default().solve(&m, &b, &[2.0 / 3.0, 1.0 / 3.0]);
        assert!(out.converged);
        assert_eq!(out.iterations, 0);
    }

    #[test]
    fn empty_system() {
        let m = TripletBuilder::new(0).build();
        let out = CgSolver::default().solve(&m, &[], &[]);
        assert!(out.converged);
        assert!(out.x.is_empty());
    }

    #[test]
    fn larger_chain_system() {
        // 1-D chain Laplacian with anchors at both ends
        let n = 50;
        let mut t = TripletBuilder::new(n);
        for i in 0..n {
            let mut d = 0.0;
            if i > 0 {
                t.add(i as u32, (i - 1) as u32, -1.0);
                d += 1.0;
            }
            if i + 1 < n {
                t.add(i as u32, (i + 1) as u32, -1.0);
                d += 1.0;
            }
            t.add(i as u32, i as u32, d);
        }
        // anchor node 0 at 0.0 and node n-1 at 10.0 with weight 100
        let mut t2 = TripletBuilder::new(n);
        t2.merge(t);
        t2.add(0, 0, 100.0);
        t2.add((n - 1) as u32, (n - 1) as u32, 100.0);
        let m = t2.build();
        let mut b = vec![0.0; n];
        b[n - 1] = 100.0 * 10.0;

        let out = CgSolver::default().solve(&m, &b, &vec![0.0; n]);
        assert!(out.converged);
        // interior nodes form a near-linear ramp
        assert!(out.x[0] < 0.5);
        assert!((out.x[n - 1] - 10.0).abs() < 0.5);
        for i in 1..n {
            assert!(out.x[i] >= out.x[i - 1] - 1e-9);
        }
    }
}
