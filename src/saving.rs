use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::StoreError;

/// Write every namespace entry to a gzip-compressed bincode snapshot.
///
/// The snapshot is written next to `filename` first and renamed over it, so
/// a failed write leaves the previous snapshot intact.
pub fn save_namespace(
    entries: &BTreeMap<String, String>,
    filename: impl AsRef<Path>,
) -> Result<(), StoreError> {
    let path = filename.as_ref();
    let partial = path.with_extension("partial");

    let file = File::create(&partial)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, entries)?;

    let encoder = writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))?;
    let mut file = encoder.finish()?;
    file.flush()?;

    fs::rename(&partial, path)?;
    Ok(())
}

pub fn load_namespace(filename: impl AsRef<Path>) -> Result<BTreeMap<String, String>, StoreError> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let entries: BTreeMap<String, String> = deserialize_from(&mut reader)?;

    Ok(entries)
}
