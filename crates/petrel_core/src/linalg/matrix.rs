use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use super::{AssemblyState, AssemblyTracker, InsertMode, Vector};
use crate::error::{Error, Result};

/// Sparse matrix assembled from (row-set × column-set) value blocks.
///
/// Assembled values are kept in compressed sparse row form; the sparsity
/// pattern only ever grows.
#[derive(Debug, Clone)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    csr: CsrMatrix<f64>,
    pending: Vec<(usize, usize, f64)>,
    tracker: AssemblyTracker,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::config(format!(
                "matrix dimensions must be positive, got {rows}x{cols}"
            )));
        }
        Ok(Self {
            rows,
            cols,
            csr: CsrMatrix::zeros(rows, cols),
            pending: Vec::new(),
            tracker: AssemblyTracker::new(),
        })
    }

    /// Builds an assembled matrix from a row-major dense block.
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        let mut m = Self::new(rows, cols)?;
        let row_idx: Vec<usize> = (0..rows).collect();
        let col_idx: Vec<usize> = (0..cols).collect();
        m.set_values(&row_idx, &col_idx, values, InsertMode::Insert)?;
        m.assemble()?;
        Ok(m)
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn state(&self) -> AssemblyState {
        self.tracker.state()
    }

    /// Buffers a block write. `values` is row-major with
    /// `rows.len() * cols.len()` entries.
    pub fn set_values(
        &mut self,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
        mode: InsertMode,
    ) -> Result<()> {
        Error::check_len("Matrix::set_values", rows.len() * cols.len(), values.len())?;
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.rows) {
            return Err(Error::usage(format!(
                "matrix row index {bad} out of range [0, {})",
                self.rows
            )));
        }
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.cols) {
            return Err(Error::usage(format!(
                "matrix column index {bad} out of range [0, {})",
                self.cols
            )));
        }
        self.tracker.record_write(mode, "matrix")?;
        for (i, &r) in rows.iter().enumerate() {
            for (j, &c) in cols.iter().enumerate() {
                self.pending.push((r, c, values[i * cols.len() + j]));
            }
        }
        Ok(())
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: f64, mode: InsertMode) -> Result<()> {
        self.set_values(&[row], &[col], &[value], mode)
    }

    pub fn begin_assembly(&mut self) -> Result<()> {
        self.tracker.begin("matrix")
    }

    pub fn end_assembly(&mut self) -> Result<()> {
        let mode = self.tracker.mode.unwrap_or(InsertMode::Insert);
        self.tracker.end("matrix")?;

        let mut updates: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (r, c, value) in self.pending.drain(..) {
            let entry = updates.entry((r, c)).or_insert(0.0);
            match mode {
                InsertMode::Insert => *entry = value,
                InsertMode::Add => *entry += value,
            }
        }
        if updates.is_empty() {
            return Ok(());
        }

        // Merge into the stored pattern; positions not yet stored start at zero.
        let mut coo = CooMatrix::new(self.rows, self.cols);
        for (r, c, &stored) in self.csr.triplet_iter() {
            let value = match (updates.remove(&(r, c)), mode) {
                (Some(update), InsertMode::Insert) => update,
                (Some(update), InsertMode::Add) => stored + update,
                (None, _) => stored,
            };
            coo.push(r, c, value);
        }
        for ((r, c), value) in updates {
            coo.push(r, c, value);
        }
        self.csr = CsrMatrix::from(&coo);
        Ok(())
    }

    pub fn assemble(&mut self) -> Result<()> {
        self.begin_assembly()?;
        self.end_assembly()
    }

    /// Returns the stored value, or 0.0 outside the sparsity pattern.
    pub fn get_value(&self, row: usize, col: usize) -> Result<f64> {
        self.tracker.ensure_readable("matrix")?;
        if row >= self.rows || col >= self.cols {
            return Err(Error::usage(format!(
                "matrix entry ({row}, {col}) out of range for {}x{}",
                self.rows, self.cols
            )));
        }
        Ok(self
            .csr
            .get_entry(row, col)
            .map_or(0.0, |entry| entry.into_value()))
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> Result<usize> {
        self.tracker.ensure_readable("matrix")?;
        Ok(self.csr.nnz())
    }

    /// Zeroes every stored value while keeping the sparsity pattern.
    pub fn zero_entries(&mut self) -> Result<()> {
        self.tracker.overwrite("matrix")?;
        self.csr.values_mut().fill(0.0);
        Ok(())
    }

    /// y = A·x
    pub fn mult(&self, x: &Vector, y: &mut Vector) -> Result<()> {
        self.tracker.ensure_readable("matrix")?;
        Error::check_len("Matrix::mult", self.cols, x.len())?;
        Error::check_len("Matrix::mult", self.rows, y.len())?;
        let x = x.read()?;
        y.set(0.0)?;
        let mut out = y.write()?;
        for (i, row) in self.csr.row_iter().enumerate() {
            out[i] = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&c, v)| v * x[c])
                .sum();
        }
        Ok(())
    }

    pub(crate) fn to_dense(&self) -> Result<DMatrix<f64>> {
        self.tracker.ensure_readable("matrix")?;
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for (r, c, &value) in self.csr.triplet_iter() {
            dense[(r, c)] = value;
        }
        Ok(dense)
    }

    pub fn is_finite(&self) -> Result<bool> {
        self.tracker.ensure_readable("matrix")?;
        Ok(self.csr.values().iter().all(|v| v.is_finite()))
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix ({}x{}, {:?})", self.rows, self.cols, self.state())?;
        if self.tracker.ensure_readable("matrix").is_err() {
            return Ok(());
        }
        for (r, row) in self.csr.row_iter().enumerate() {
            write!(f, "row {r}:")?;
            for (c, value) in row.col_indices().iter().zip(row.values()) {
                write!(f, " ({c}, {value})")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
