//! CSV archiving functionality
//!
//! Each cycle the executable may push one flat record (a struct with scalar
//! fields only) into an `Archiver`, which appends it as a row in a CSV file
//! inside the session's archive directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver<W: std::io::Write = File> {
    writer: Writer<W>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot write the archive record: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver<File> {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root. Any existing file is truncated.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        let file = File::create(session.arch_root.join(path)).map_err(ArchiveError::CreateError)?;

        Ok(Self::from_writer(file))
    }
}

impl<W: std::io::Write> Archiver<W> {
    /// Create an archiver writing into any writer, headers are written with the
    /// first record.
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(true).from_writer(writer),
        }
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer
            .serialize(record)
            .map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }

    /// Consume the archiver returning the underlying writer.
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        time_s: f64,
        state: &'static str,
        fault: Option<String>,
    }

    #[test]
    fn test_archive_rows() {
        let mut arch = Archiver::from_writer(Vec::new());
        arch.serialise(Row {
            time_s: 0.0,
            state: "Idle",
            fault: None,
        })
        .unwrap();
        arch.serialise(Row {
            time_s: 0.1,
            state: "Tracking",
            fault: Some("singular".into()),
        })
        .unwrap();

        let out = String::from_utf8(arch.into_inner().unwrap()).unwrap();
        assert_eq!(out, "time_s,state,fault\n0.0,Idle,\n0.1,Tracking,singular\n");
    }
}
