use std::fmt;
use std::ops::{Deref, DerefMut};

use super::{AssemblyState, AssemblyTracker, InsertMode, NormType};
use crate::error::{Error, Result};

/// Dense, fixed-length vector of reals with buffered assembly.
#[derive(Debug, Clone)]
pub struct Vector {
    values: Vec<f64>,
    pending: Vec<(usize, f64)>,
    tracker: AssemblyTracker,
}

/// Shared view of an assembled vector (getArrayRead).
pub struct ArrayRead<'a> {
    values: &'a [f64],
}

/// Exclusive view of an assembled vector (getArray).
pub struct ArrayWrite<'a> {
    values: &'a mut [f64],
}

impl Vector {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::config("vector length must be greater than zero"));
        }
        Ok(Self {
            values: vec![0.0; len],
            pending: Vec::new(),
            tracker: AssemblyTracker::new(),
        })
    }

    /// Builds an assembled vector holding `values`.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let mut v = Self::new(values.len())?;
        let indices: Vec<usize> = (0..values.len()).collect();
        v.set_values(&indices, values, InsertMode::Insert)?;
        v.assemble()?;
        Ok(v)
    }

    /// New unassembled vector with the same length.
    pub fn duplicate(&self) -> Self {
        Self {
            values: vec![0.0; self.values.len()],
            pending: Vec::new(),
            tracker: AssemblyTracker::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn state(&self) -> AssemblyState {
        self.tracker.state()
    }

    pub fn set_values(&mut self, indices: &[usize], values: &[f64], mode: InsertMode) -> Result<()> {
        Error::check_len("Vector::set_values", indices.len(), values.len())?;
        let len = self.values.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::usage(format!(
                "vector index {bad} out of range [0, {len})"
            )));
        }
        self.tracker.record_write(mode, "vector")?;
        self.pending
            .extend(indices.iter().copied().zip(values.iter().copied()));
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: f64, mode: InsertMode) -> Result<()> {
        self.set_values(&[index], &[value], mode)
    }

    pub fn begin_assembly(&mut self) -> Result<()> {
        self.tracker.begin("vector")
    }

    pub fn end_assembly(&mut self) -> Result<()> {
        let mode = self.pending_mode();
        self.tracker.end("vector")?;
        for (index, value) in self.pending.drain(..) {
            match mode {
                InsertMode::Insert => self.values[index] = value,
                InsertMode::Add => self.values[index] += value,
            }
        }
        Ok(())
    }

    pub fn assemble(&mut self) -> Result<()> {
        self.begin_assembly()?;
        self.end_assembly()
    }

    fn pending_mode(&self) -> InsertMode {
        self.tracker.mode.unwrap_or(InsertMode::Insert)
    }

    pub fn read(&self) -> Result<ArrayRead<'_>> {
        self.tracker.ensure_readable("vector")?;
        Ok(ArrayRead {
            values: &self.values,
        })
    }

    pub fn write(&mut self) -> Result<ArrayWrite<'_>> {
        self.tracker.ensure_readable("vector")?;
        Ok(ArrayWrite {
            values: &mut self.values,
        })
    }

    pub fn to_vec(&self) -> Result<Vec<f64>> {
        Ok(self.read()?.to_vec())
    }

    /// Fills every entry with `alpha`.
    pub fn set(&mut self, alpha: f64) -> Result<()> {
        self.tracker.overwrite("vector")?;
        self.values.fill(alpha);
        Ok(())
    }

    pub fn copy_from(&mut self, x: &Vector) -> Result<()> {
        Error::check_len("Vector::copy_from", self.len(), x.len())?;
        let src = x.read()?;
        self.tracker.overwrite("vector")?;
        self.values.copy_from_slice(&src);
        Ok(())
    }

    pub fn scale(&mut self, alpha: f64) -> Result<()> {
        let mut y = self.write()?;
        y.iter_mut().for_each(|v| *v *= alpha);
        Ok(())
    }

    /// y ← y + alpha·x
    pub fn axpy(&mut self, alpha: f64, x: &Vector) -> Result<()> {
        Error::check_len("Vector::axpy", self.len(), x.len())?;
        let x = x.read()?;
        let mut y = self.write()?;
        for (yi, xi) in y.iter_mut().zip(x.iter()) {
            *yi += alpha * xi;
        }
        Ok(())
    }

    /// w ← alpha·x + y
    pub fn waxpy(&mut self, alpha: f64, x: &Vector, y: &Vector) -> Result<()> {
        Error::check_len("Vector::waxpy", self.len(), x.len())?;
        Error::check_len("Vector::waxpy", self.len(), y.len())?;
        let x = x.read()?;
        let y = y.read()?;
        self.tracker.overwrite("vector")?;
        for ((wi, xi), yi) in self.values.iter_mut().zip(x.iter()).zip(y.iter()) {
            *wi = alpha * xi + yi;
        }
        Ok(())
    }

    pub fn dot(&self, x: &Vector) -> Result<f64> {
        Error::check_len("Vector::dot", self.len(), x.len())?;
        let a = self.read()?;
        let b = x.read()?;
        Ok(a.iter().zip(b.iter()).map(|(p, q)| p * q).sum())
    }

    pub fn norm(&self, kind: NormType) -> Result<f64> {
        let v = self.read()?;
        Ok(slice_norm(&v, kind))
    }

    /// True when every entry is finite. Requires an assembled vector.
    pub fn is_finite(&self) -> Result<bool> {
        Ok(self.read()?.iter().all(|v| v.is_finite()))
    }
}

pub(crate) fn slice_norm(values: &[f64], kind: NormType) -> f64 {
    match kind {
        NormType::One => values.iter().map(|v| v.abs()).sum(),
        NormType::Two => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        // NaN must propagate rather than be skipped by `max`.
        NormType::Infinity => values.iter().fold(0.0_f64, |acc, v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.max(v.abs())
            }
        }),
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vector (length {}, {:?})", self.len(), self.state())?;
        if self.tracker.ensure_readable("vector").is_ok() {
            for value in &self.values {
                writeln!(f, "{value}")?;
            }
        }
        Ok(())
    }
}

impl<'a> ArrayRead<'a> {
    /// Releases the view (restoreArrayRead).
    pub fn restore(self) {}
}

impl<'a> ArrayWrite<'a> {
    /// Releases the view (restoreArray).
    pub fn restore(self) {}
}

impl Deref for ArrayRead<'_> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        self.values
    }
}

impl Deref for ArrayWrite<'_> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        self.values
    }
}

impl DerefMut for ArrayWrite<'_> {
    fn deref_mut(&mut self) -> &mut [f64] {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn zero_length_is_a_configuration_error() {
        assert!(matches!(Vector::new(0), Err(Error::Configuration(_))));
    }

    #[test]
    fn insert_last_write_wins() {
        let mut v = Vector::new(3).unwrap();
        v.set_values(&[0, 1, 0], &[1.0, 2.0, 5.0], InsertMode::Insert)
            .unwrap();
        v.set_value(1, 7.0, InsertMode::Insert).unwrap();
        v.assemble().unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![5.0, 7.0, 0.0]);
    }

    #[test]
    fn add_writes_accumulate_onto_current_values() {
        let mut v = Vector::from_slice(&[1.0, 1.0]).unwrap();
        v.set_values(&[0, 0, 1], &[2.0, 3.0, -1.0], InsertMode::Add)
            .unwrap();
        v.assemble().unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![6.0, 0.0]);
    }

    #[test]
    fn reading_before_assembly_is_a_usage_error() {
        let mut v = Vector::new(2).unwrap();
        assert_err_contains(v.read().map(|_| ()), "not assembled");
        v.set_value(0, 1.0, InsertMode::Insert).unwrap();
        assert!(matches!(v.read().map(|_| ()), Err(Error::Usage(_))));
        v.begin_assembly().unwrap();
        assert!(matches!(v.read().map(|_| ()), Err(Error::Usage(_))));
        v.end_assembly().unwrap();
        assert_eq!(&*v.read().unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn new_write_cycle_reopens_assembled_vector() {
        let mut v = Vector::from_slice(&[1.0, 2.0]).unwrap();
        v.set_value(1, 4.0, InsertMode::Insert).unwrap();
        assert_eq!(v.state(), AssemblyState::Assembling);
        assert!(v.norm(NormType::Two).is_err());
        v.assemble().unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 4.0]);
    }

    #[test]
    fn assembly_calls_out_of_order_fail() {
        let mut v = Vector::new(2).unwrap();
        assert_err_contains(v.end_assembly(), "without begin_assembly");
        v.begin_assembly().unwrap();
        assert_err_contains(v.begin_assembly(), "called twice");
        assert_err_contains(
            v.set_value(0, 1.0, InsertMode::Insert),
            "between begin_assembly and end_assembly",
        );
    }

    #[test]
    fn mixing_insert_and_add_in_one_cycle_fails() {
        let mut v = Vector::new(2).unwrap();
        v.set_value(0, 1.0, InsertMode::Insert).unwrap();
        assert_err_contains(v.set_value(0, 1.0, InsertMode::Add), "cannot mix");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut v = Vector::new(2).unwrap();
        assert_err_contains(v.set_value(2, 1.0, InsertMode::Insert), "out of range");
        assert!(matches!(
            v.set_values(&[0, 1], &[1.0], InsertMode::Insert),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn write_view_mutates_in_place() {
        let mut v = Vector::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        {
            let mut view = v.write().unwrap();
            view[2] = -9.0;
            view.restore();
        }
        assert_eq!(v.norm(NormType::Infinity).unwrap(), 9.0);
        assert_eq!(v.norm(NormType::One).unwrap(), 12.0);
    }

    #[test]
    fn axpy_and_waxpy() {
        let x = Vector::from_slice(&[1.0, 2.0]).unwrap();
        let mut y = Vector::from_slice(&[10.0, 20.0]).unwrap();
        y.axpy(-2.0, &x).unwrap();
        assert_eq!(y.to_vec().unwrap(), vec![8.0, 16.0]);

        let mut w = x.duplicate();
        w.waxpy(3.0, &x, &y).unwrap();
        assert_eq!(w.to_vec().unwrap(), vec![11.0, 22.0]);
        assert_eq!(x.dot(&y).unwrap(), 40.0);
    }

    #[test]
    fn axpy_rejects_size_mismatch() {
        let x = Vector::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        let mut y = Vector::from_slice(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            y.axpy(1.0, &x),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn two_norm_and_nan_propagation() {
        let v = Vector::from_slice(&[3.0, -4.0]).unwrap();
        assert_eq!(v.norm(NormType::Two).unwrap(), 5.0);
        let bad = Vector::from_slice(&[1.0, f64::NAN]).unwrap();
        assert!(bad.norm(NormType::Infinity).unwrap().is_nan());
        assert!(!bad.is_finite().unwrap());
    }

    #[test]
    fn set_is_rejected_with_pending_writes() {
        let mut v = Vector::new(2).unwrap();
        v.set(1.5).unwrap();
        assert_eq!(v.state(), AssemblyState::Assembled);
        v.set_value(0, 2.0, InsertMode::Insert).unwrap();
        assert_err_contains(v.set(0.0), "buffered writes are pending");
    }
}
