//! Flat zip packs of definitions.

use crate::PackageResult;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// One file of a pack, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A zip archive read fully into memory.
///
/// Directory entries are dropped; file entries keep their archive order.
#[derive(Debug, Clone, Default)]
pub struct PackArchive {
    entries: Vec<PackEntry>,
}

impl PackArchive {
    pub fn open(path: &Path) -> PackageResult<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> PackageResult<Self> {
        Self::from_reader(std::io::Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> PackageResult<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut bytes = Vec::with_capacity(file.size().min(MAX_PREALLOCATION) as usize);
            file.read_to_end(&mut bytes)?;
            entries.push(PackEntry {
                name: file.name().to_string(),
                bytes,
            });
        }

        Ok(Self { entries })
    }

    /// `(name, bytes)` pairs in archive order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> + '_ {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for PackArchive {
    type Item = PackEntry;
    type IntoIter = std::vec::IntoIter<PackEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn pack(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("nested/", SimpleFileOptions::default())
            .unwrap();
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn entries_keep_archive_order() {
        let bytes = pack(&[
            ("version.info", b"[FHIR]\nversion=4.0.1\n"),
            ("b.xml", b"<b/>"),
            ("a.json", b"{}"),
        ]);

        let archive = PackArchive::from_bytes(&bytes).unwrap();
        let names: Vec<&str> = archive.entries().map(|(name, _)| name).collect();

        assert_eq!(names, vec!["version.info", "b.xml", "a.json"]);
        assert_eq!(archive.entries().nth(1).unwrap().1, b"<b/>");
    }

    #[test]
    fn entries_larger_than_the_reservation_read_fully() {
        let large: Vec<u8> = (0..MAX_PREALLOCATION as usize + 17)
            .map(|i| (i % 251) as u8)
            .collect();
        let bytes = pack(&[("large.bin", &large)]);

        let archive = PackArchive::from_bytes(&bytes).unwrap();
        let (name, data) = archive.entries().next().unwrap();

        assert_eq!(name, "large.bin");
        assert_eq!(data, large.as_slice());
    }

    #[test]
    fn garbage_is_a_zip_error() {
        let err = PackArchive::from_bytes(b"not a zip").unwrap_err();
        assert!(matches!(err, crate::PackageError::Zip(_)));
    }
}
