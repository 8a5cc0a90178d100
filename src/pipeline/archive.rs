//! Zip packing of rasterised pages.
//!
//! The archive is built in memory: the upload limit bounds the input, and a
//! JPEG page at 150 DPI is a few hundred kilobytes, so the whole response fits
//! comfortably in RAM. Entries keep input order.

use crate::error::ConvertError;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One file inside the output archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Entry name for a 1-based page number: `page_1.jpg`, `page_2.jpg`, …
pub fn page_entry_name(page_num: usize) -> String {
    format!("page_{page_num}.jpg")
}

/// Write `entries` into a deflate-compressed zip, in order.
///
/// # Errors
/// `EmptyOutput` if there are no entries or any entry is empty; zip writer
/// failures otherwise.
pub fn pack_entries(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ConvertError> {
    if entries.is_empty() {
        return Err(ConvertError::EmptyOutput {
            detail: "no pages to archive".into(),
        });
    }
    if let Some(empty) = entries.iter().find(|e| e.bytes.is_empty()) {
        return Err(ConvertError::EmptyOutput {
            detail: format!("archive entry '{}' is empty", empty.name),
        });
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.bytes)
            .map_err(|e| ConvertError::Archive(e.into()))?;
    }

    let bytes = zip.finish()?.into_inner();
    if bytes.is_empty() {
        return Err(ConvertError::EmptyOutput {
            detail: "zip writer produced no bytes".into(),
        });
    }

    debug!("Packed {} entries → {} bytes", entries.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn entry_names_are_one_based() {
        assert_eq!(page_entry_name(1), "page_1.jpg");
        assert_eq!(page_entry_name(12), "page_12.jpg");
    }

    #[test]
    fn entries_keep_order_and_content() {
        let entries = vec![
            entry("page_1.jpg", b"first"),
            entry("page_2.jpg", b"second"),
            entry("page_3.jpg", b"third"),
        ];
        let bytes = pack_entries(&entries).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        for (i, expected) in entries.iter().enumerate() {
            let mut file = archive.by_index(i).unwrap();
            assert_eq!(file.name(), expected.name);
            assert_eq!(file.compression(), CompressionMethod::Deflated);
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            assert_eq!(content, expected.bytes);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = pack_entries(&[]).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyOutput { .. }));
    }

    #[test]
    fn empty_entry_is_rejected() {
        let err = pack_entries(&[entry("page_1.jpg", b"x"), entry("page_2.jpg", b"")]).unwrap_err();
        assert!(err.to_string().contains("page_2.jpg"));
    }
}
