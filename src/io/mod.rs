//! Mechanism I/O.
//!
//! This module provides trait-based readers and writers for loading and
//! saving a [`Mechanism`]: the grid topology, anchors and target paths.

pub mod model_text;

use crate::mech_error::MechError;
use crate::mechanism::Mechanism;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

pub use model_text::ModelText;

/// Readers that build a mechanism from a byte stream.
pub trait MechanismReader {
    fn read<R: Read>(&self, reader: R) -> Result<Mechanism, MechError>;
}

/// Writers that serialize a mechanism to a byte stream.
pub trait MechanismWriter {
    fn write<W: Write>(&self, writer: W, mech: &Mechanism) -> Result<(), MechError>;
}

/// Read a model file in the text format.
pub fn read_model(path: impl AsRef<Path>) -> Result<Mechanism, MechError> {
    ModelText.read(File::open(path)?)
}

/// Write a model file in the text format.
pub fn write_model(path: impl AsRef<Path>, mech: &Mechanism) -> Result<(), MechError> {
    let mut out = BufWriter::new(File::create(path)?);
    ModelText.write(&mut out, mech)?;
    out.flush()?;
    Ok(())
}
