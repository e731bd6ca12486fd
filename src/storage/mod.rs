//! Batch scratch space, certificate file naming and the zip archive.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tempfile::TempDir;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, RenderError};
use crate::roster::Row;

pub const ARCHIVE_NAME: &str = "certificates.zip";

pub fn generate_registration_id() -> String {
    Uuid::new_v4().to_string()
}

/// The row's `registration_id`, or a fresh random one when absent or blank.
///
/// The id ends up verbatim in a file name, so path separators are refused
/// rather than rewritten.
pub fn resolve_registration_id(row: &Row) -> Result<String, RenderError> {
    match row.non_blank("registration_id") {
        Some(id) if id.contains(['/', '\\', '\0']) => {
            Err(RenderError::RegistrationId(id.to_string()))
        }
        Some(id) => Ok(id.to_string()),
        None => Ok(generate_registration_id()),
    }
}

fn unsafe_file_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\-_. ]").expect("valid file-name pattern"))
}

pub fn sanitize_file_name(s: &str) -> String {
    unsafe_file_chars().replace_all(s, "").trim().to_string()
}

/// `<sanitized name>-<registration id>.pdf`
pub fn certificate_file_name(name: &str, registration_id: &str) -> String {
    format!("{}-{}.pdf", sanitize_file_name(name), registration_id)
}

/// Per-batch working directory, removed with everything in it on drop.
pub fn create_scratch_dir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix("certforge-").tempdir()
}

/// Zip `documents` into `output`, one deflated entry per file, named after
/// the file. Zero documents still produce a valid, empty archive.
pub fn build_archive(documents: &[PathBuf], output: &Path) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut seen = HashSet::new();
    for path in documents {
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "document has no file name")
        })?;
        // Identical name + id: the later render already overwrote the file.
        if !seen.insert(name.to_string()) {
            continue;
        }
        zip.start_file(name, options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    fn entries(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (entry.name().to_string(), body)
            })
            .collect()
    }

    #[test]
    fn explicit_registration_id_is_kept() {
        let id = resolve_registration_id(&row(&[("registration_id", "ABC123")])).unwrap();
        assert_eq!(id, "ABC123");
    }

    #[test]
    fn missing_or_blank_registration_id_is_generated() {
        let a = resolve_registration_id(&row(&[])).unwrap();
        let b = resolve_registration_id(&row(&[("registration_id", "")])).unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
        assert!(Uuid::parse_str(&b).is_ok());
    }

    #[test]
    fn registration_id_with_path_separator_is_refused() {
        let err = resolve_registration_id(&row(&[("registration_id", "../etc/x")])).unwrap_err();
        assert!(matches!(err, RenderError::RegistrationId(_)));
    }

    #[test]
    fn file_names_drop_unsafe_characters() {
        assert_eq!(sanitize_file_name("  Zoë O'Brien/Ünal  "), "Zo OBriennal");
        assert_eq!(
            certificate_file_name("Ada Lovelace", "ABC123"),
            "Ada Lovelace-ABC123.pdf"
        );
        assert_eq!(certificate_file_name("Jean-Luc_P. 2", "x"), "Jean-Luc_P. 2-x.pdf");
    }

    #[test]
    fn archive_contains_one_entry_per_document() {
        let dir = create_scratch_dir().unwrap();
        let docs: Vec<PathBuf> = ["a-1.pdf", "b-2.pdf", "c-3.pdf"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, format!("%PDF {name}")).unwrap();
                path
            })
            .collect();

        let out = dir.path().join(ARCHIVE_NAME);
        build_archive(&docs, &out).unwrap();

        let entries = entries(&out);
        assert_eq!(
            entries.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["a-1.pdf", "b-2.pdf", "c-3.pdf"]
        );
        assert_eq!(entries[1].1, b"%PDF b-2.pdf");
    }

    #[test]
    fn empty_batch_gives_valid_empty_archive() {
        let dir = create_scratch_dir().unwrap();
        let out = dir.path().join(ARCHIVE_NAME);
        build_archive(&[], &out).unwrap();
        assert!(entries(&out).is_empty());
    }

    #[test]
    fn duplicate_file_names_are_archived_once() {
        let dir = create_scratch_dir().unwrap();
        let path = dir.path().join("Ada-1.pdf");
        std::fs::write(&path, "second render").unwrap();

        let out = dir.path().join(ARCHIVE_NAME);
        build_archive(&[path.clone(), path], &out).unwrap();
        assert_eq!(entries(&out), vec![("Ada-1.pdf".to_string(), b"second render".to_vec())]);
    }

    #[test]
    fn missing_document_fails_the_archive() {
        let dir = create_scratch_dir().unwrap();
        let out = dir.path().join(ARCHIVE_NAME);
        let err = build_archive(&[dir.path().join("gone.pdf")], &out).unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let dir = create_scratch_dir().unwrap();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("x.pdf"), "x").unwrap();
        drop(dir);
        assert!(!path.exists());
    }
}
