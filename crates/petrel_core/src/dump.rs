//! Plain-text vector dump: one `<index>\t<value>` line per entry, values
//! printed with six fractional digits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::linalg::Vector;

pub fn format_vector<W: Write>(writer: &mut W, v: &Vector) -> std::io::Result<()> {
    let values = v
        .read()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    for (i, value) in values.iter().enumerate() {
        writeln!(writer, "{i}\t{value:.6}")?;
    }
    Ok(())
}

/// Writes `v` to `path`, replacing any existing file.
pub fn write_vector(path: impl AsRef<Path>, v: &Vector) -> Result<()> {
    let path = path.as_ref();
    // Reject unassembled input before touching the filesystem.
    v.read()?.restore();
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    format_vector(&mut writer, v).map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    log::debug!("wrote {} entries to {}", v.len(), path.display());
    Ok(())
}
