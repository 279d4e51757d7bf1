use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing structure file formats.
///
/// A file holds zero or more [`Structure`] frames. Readers leave charge and
/// multiplicity at their defaults (`0` and `1`); callers that know the
/// electronic state set it afterwards.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every frame from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error>;

    /// Writes `structures` as consecutive frames.
    ///
    /// # Errors
    ///
    /// Returns an error if a structure cannot be represented in the format or
    /// writing fails.
    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every frame from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes `structures` to a file path, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(structures: &[Structure], path: P) -> Result<(), Self::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structures, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
