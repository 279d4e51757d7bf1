use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Cannot write a structure without atoms")]
    EmptyStructure,
    #[error("Cannot write an empty structure list")]
    NoStructures,
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("No XYZ files found in directory {}", .0.display())]
    NoFiles(PathBuf),
    #[error("No valid structures could be read from any XYZ file in {}", .0.display())]
    NoValidStructures(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum XyzParseErrorKind {
    #[error("First line must contain the number of atoms as an integer (value: '{value}')")]
    InvalidAtomCount { value: String },
    #[error("Expected {expected} atom lines, but found {found}")]
    MissingAtomLines { expected: usize, found: usize },
    #[error("Atom line must contain at least 4 fields: symbol x y z")]
    TooFewFields,
    #[error("Invalid coordinate '{value}'")]
    InvalidCoordinate { value: String },
}

/// Parses `symbol x y z [...]`, ignoring trailing columns.
fn parse_atom_line(line: &str) -> Result<(String, Point3<f64>), XyzParseErrorKind> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(XyzParseErrorKind::TooFewFields);
    }
    let coord = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| XyzParseErrorKind::InvalidCoordinate { value: s.into() })
    };
    let position = Point3::new(coord(fields[1])?, coord(fields[2])?, coord(fields[3])?);
    Ok((fields[0].to_string(), position))
}

fn write_frame(
    writer: &mut impl Write,
    structure: &Structure,
    comment: &str,
    energy_unit: &str,
) -> Result<(), XyzError> {
    if structure.symbols.len() != structure.coordinates.len() {
        return Err(XyzError::Inconsistency(format!(
            "{} symbols but {} coordinates",
            structure.symbols.len(),
            structure.coordinates.len()
        )));
    }
    writeln!(writer, "{}", structure.n_atoms())?;
    match structure.energy {
        Some(energy) => writeln!(writer, "{} | Energy: {:.6}{}", comment, energy, energy_unit)?,
        None => writeln!(writer, "{}", comment)?,
    }
    for (symbol, p) in structure.symbols.iter().zip(&structure.coordinates) {
        writeln!(writer, "{} {:.6} {:.6} {:.6}", symbol, p.x, p.y, p.z)?;
    }
    Ok(())
}

/// A strict single-frame XYZ file.
///
/// The first line holds the atom count, the second a free-form comment, and
/// each following line `symbol x y z`. Lines after the declared atoms are
/// ignored. Any malformed line fails the read.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let count_field = lines.first().map(|l| l.trim()).unwrap_or("");
        let n_atoms: usize = count_field.parse().map_err(|_| XyzError::Parse {
            line: 1,
            kind: XyzParseErrorKind::InvalidAtomCount {
                value: count_field.into(),
            },
        })?;
        let frame_end = n_atoms.checked_add(2).filter(|&end| end <= lines.len());
        let Some(frame_end) = frame_end else {
            return Err(XyzError::Parse {
                line: lines.len(),
                kind: XyzParseErrorKind::MissingAtomLines {
                    expected: n_atoms,
                    found: lines.len().saturating_sub(2),
                },
            });
        };

        let mut symbols = Vec::with_capacity(n_atoms);
        let mut coordinates = Vec::with_capacity(n_atoms);
        for (offset, line) in lines[2..frame_end].iter().enumerate() {
            let (symbol, position) = parse_atom_line(line).map_err(|kind| XyzError::Parse {
                line: offset + 3,
                kind,
            })?;
            symbols.push(symbol);
            coordinates.push(position);
        }

        let structure = Structure::new(symbols, coordinates, 0, 1).with_comment(lines[1].clone());
        Ok(vec![structure])
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        for structure in structures {
            if structure.is_empty() {
                return Err(XyzError::EmptyStructure);
            }
            write_frame(writer, structure, &structure.comment, "")?;
        }
        Ok(())
    }
}

/// Concatenated XYZ frames, read leniently.
///
/// Blank lines and lines that are not an atom count are skipped, a frame with
/// a malformed atom line is dropped, and a truncated final frame ends the read.
/// Written frames carry `Structure {n}` when they have no comment of their own.
pub struct MultiXyzFile;

impl MultiXyzFile {
    /// Writes frames, taking comment `i` from `comments` when given.
    pub fn write_with_comments(
        structures: &[Structure],
        comments: Option<&[String]>,
        writer: &mut impl Write,
    ) -> Result<(), XyzError> {
        if structures.is_empty() {
            return Err(XyzError::NoStructures);
        }
        for (i, structure) in structures.iter().enumerate() {
            let fallback;
            let comment = match comments.and_then(|c| c.get(i)) {
                Some(comment) => comment.as_str(),
                None if !structure.comment.is_empty() => structure.comment.as_str(),
                None => {
                    fallback = format!("Structure {}", i + 1);
                    fallback.as_str()
                }
            };
            write_frame(writer, structure, comment, " eV").map_err(|e| match e {
                XyzError::Inconsistency(msg) => {
                    XyzError::Inconsistency(format!("Structure {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl StructureFile for MultiXyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        let mut structures = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let header = lines[i].trim();
            let Ok(n_atoms) = header.parse::<usize>() else {
                i += 1;
                continue;
            };
            let frame_end = (i + 2)
                .checked_add(n_atoms)
                .filter(|&end| end <= lines.len());
            let Some(frame_end) = frame_end else {
                debug!(line = i + 1, "Truncated trailing frame; stopping.");
                break;
            };

            let atoms: Result<Vec<_>, _> = lines[i + 2..frame_end]
                .iter()
                .map(|line| parse_atom_line(line))
                .collect();
            match atoms {
                Ok(atoms) => {
                    let (symbols, coordinates) = atoms.into_iter().unzip();
                    structures.push(
                        Structure::new(symbols, coordinates, 0, 1)
                            .with_comment(lines[i + 1].clone()),
                    );
                }
                Err(kind) => debug!(line = i + 1, %kind, "Skipping malformed frame."),
            }
            i = frame_end;
        }
        Ok(structures)
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        Self::write_with_comments(structures, None, writer)
    }
}

fn with_electronic_state(mut structure: Structure, charge: i32, multiplicity: u32) -> Structure {
    structure.charge = charge;
    structure.multiplicity = multiplicity;
    structure
}

/// Reads a single-frame XYZ file and assigns `charge` and `multiplicity`.
pub fn read_xyz(
    path: impl AsRef<Path>,
    charge: i32,
    multiplicity: u32,
) -> Result<Structure, XyzError> {
    XyzFile::read_from_path(path)?
        .into_iter()
        .next()
        .map(|s| with_electronic_state(s, charge, multiplicity))
        .ok_or_else(|| XyzError::Inconsistency("XYZ reader returned no frame".into()))
}

/// Reads every valid frame of a multi-frame XYZ file and assigns `charge` and
/// `multiplicity` to each.
pub fn read_multi_xyz(
    path: impl AsRef<Path>,
    charge: i32,
    multiplicity: u32,
) -> Result<Vec<Structure>, XyzError> {
    Ok(MultiXyzFile::read_from_path(path)?
        .into_iter()
        .map(|s| with_electronic_state(s, charge, multiplicity))
        .collect())
}

/// Reads every `*.xyz` file in `dir` (not recursing), in path order.
///
/// Files that fail to parse are logged and skipped. Fails if the directory has
/// no XYZ files or none of them could be read.
pub fn read_xyz_directory(
    dir: impl AsRef<Path>,
    charge: i32,
    multiplicity: u32,
) -> Result<Vec<Structure>, XyzError> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "xyz"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(XyzError::NoFiles(dir.to_path_buf()));
    }

    let structures: Vec<Structure> = files
        .iter()
        .filter_map(|path| match read_xyz(path, charge, multiplicity) {
            Ok(structure) => Some(structure),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read XYZ file; skipping.");
                None
            }
        })
        .collect();

    if structures.is_empty() {
        return Err(XyzError::NoValidStructures(dir.to_path_buf()));
    }
    Ok(structures)
}

/// Writes one structure as a single-frame XYZ file. A set energy is appended
/// to the comment line as ` | Energy: <value>`.
pub fn write_xyz(structure: &Structure, path: impl AsRef<Path>) -> Result<(), XyzError> {
    XyzFile::write_to_path(std::slice::from_ref(structure), path)
}

/// Writes structures as one multi-frame XYZ file. Set energies are appended
/// as ` | Energy: <value> eV`; `comments`, when given, override the
/// structures' own comments index by index.
pub fn write_multi_xyz(
    structures: &[Structure],
    path: impl AsRef<Path>,
    comments: Option<&[String]>,
) -> Result<(), XyzError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = io::BufWriter::new(std::fs::File::create(path)?);
    MultiXyzFile::write_with_comments(structures, comments, &mut writer)?;
    writer.flush()?;
    Ok(())
}
