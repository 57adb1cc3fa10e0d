//! Assembled vectors and matrices.
//!
//! Both containers follow the same write protocol: values are buffered with
//! `set_values`, flushed with `begin_assembly`/`end_assembly`, and only then
//! become readable through borrow-checked array views.
//!
//! ```text
//! Unassembled --set_values--> Assembling --begin/end_assembly--> Assembled
//!      |                                                           |
//!      +-------------------begin/end_assembly---------------------+
//! Assembled --set_values--> Assembling   (new write cycle)
//! ```

mod matrix;
mod solve;
mod vector;

use serde::{Deserialize, Serialize};

pub use matrix::Matrix;
pub use solve::{DenseLu, LinearSolver};
pub use vector::{ArrayRead, ArrayWrite, Vector};

/// How buffered writes combine with values already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    /// Later writes to the same entry replace earlier ones.
    Insert,
    /// Writes accumulate onto the current value.
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyState {
    Unassembled,
    Assembling,
    Assembled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormType {
    One,
    Two,
    Infinity,
}

/// Tracks where an object is in its write cycle.
///
/// `flushing` is set between `begin_assembly` and `end_assembly`; no writes
/// or reads are accepted in that window.
#[derive(Debug, Clone)]
pub(crate) struct AssemblyTracker {
    state: AssemblyState,
    flushing: bool,
    mode: Option<InsertMode>,
}

impl AssemblyTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: AssemblyState::Unassembled,
            flushing: false,
            mode: None,
        }
    }

    pub(crate) fn state(&self) -> AssemblyState {
        self.state
    }

    pub(crate) fn has_pending_writes(&self) -> bool {
        self.state == AssemblyState::Assembling
    }

    /// Registers a buffered write and opens a write cycle if needed.
    pub(crate) fn record_write(&mut self, mode: InsertMode, what: &str) -> crate::Result<()> {
        if self.flushing {
            return Err(crate::Error::usage(format!(
                "cannot set values on {what} between begin_assembly and end_assembly"
            )));
        }
        match self.mode {
            Some(current) if current != mode => {
                return Err(crate::Error::usage(format!(
                    "cannot mix {current:?} and {mode:?} writes on {what} within one assembly cycle"
                )));
            }
            _ => {}
        }
        self.mode = Some(mode);
        self.state = AssemblyState::Assembling;
        Ok(())
    }

    pub(crate) fn begin(&mut self, what: &str) -> crate::Result<()> {
        if self.flushing {
            return Err(crate::Error::usage(format!(
                "begin_assembly called twice on {what}"
            )));
        }
        self.flushing = true;
        Ok(())
    }

    pub(crate) fn end(&mut self, what: &str) -> crate::Result<()> {
        if !self.flushing {
            return Err(crate::Error::usage(format!(
                "end_assembly called on {what} without begin_assembly"
            )));
        }
        self.flushing = false;
        self.mode = None;
        self.state = AssemblyState::Assembled;
        Ok(())
    }

    pub(crate) fn ensure_readable(&self, what: &str) -> crate::Result<()> {
        if self.flushing || self.state != AssemblyState::Assembled {
            return Err(crate::Error::usage(format!(
                "{what} is not assembled (state {:?})",
                self.state
            )));
        }
        Ok(())
    }

    /// Direct overwrites (fill, copy) are allowed whenever no buffered writes
    /// or flush are in flight; they leave the object assembled.
    pub(crate) fn overwrite(&mut self, what: &str) -> crate::Result<()> {
        if self.flushing || self.has_pending_writes() {
            return Err(crate::Error::usage(format!(
                "cannot overwrite {what} while buffered writes are pending"
            )));
        }
        self.state = AssemblyState::Assembled;
        Ok(())
    }
}
