//! Dense row-major feature matrix.
//!
//! Missing numeric values are carried as `f64::NAN`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    n_rows: usize,
    n_cols: usize,
    data:   Vec<f64>,
}

impl Matrix {
    pub fn with_cols(n_cols: usize) -> Self {
        Self { n_rows: 0, n_cols, data: Vec::new() }
    }

    /// Build from rows; every row must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut m = Self::with_cols(n_cols);
        for row in rows {
            m.push_row(row);
        }
        m
    }

    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.n_cols, "row width {} != {}", row.len(), self.n_cols);
        self.data.extend_from_slice(row);
        self.n_rows += 1;
    }

    pub fn n_rows(&self) -> usize { self.n_rows }
    pub fn n_cols(&self) -> usize { self.n_cols }
    pub fn is_empty(&self) -> bool { self.n_rows == 0 }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Keep only `cols`, in the given order.
    pub fn select_columns(&self, cols: &[usize]) -> Matrix {
        let mut out = Matrix::with_cols(cols.len());
        out.data.reserve(self.n_rows * cols.len());
        let mut buf = Vec::with_capacity(cols.len());
        for row in self.rows() {
            buf.clear();
            buf.extend(cols.iter().map(|&c| row[c]));
            out.push_row(&buf);
        }
        out
    }

    /// Keep only `rows`, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Matrix {
        let mut out = Matrix::with_cols(self.n_cols);
        out.data.reserve(rows.len() * self.n_cols);
        for &r in rows {
            out.push_row(self.row(r));
        }
        out
    }
}
