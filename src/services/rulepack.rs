//! Rule-pack packaging and version hashing (§4.8). Files are sorted by
//! relative path and written with a fixed mtime so the same input tree
//! always produces the same archive bytes, and therefore the same
//! SHA-256 `VersionHash`.

use std::io::{Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{DateTime as ZipDateTime, ZipWriter};

use crate::domain::error::RulePackError;

pub type VersionHash = String;

/// One file to include in the archive, already read into memory. Callers
/// walk a rule directory and build this list themselves so packaging has
/// no filesystem dependency of its own (easy to property-test).
pub struct RuleFile {
    pub relative_path: String,
    pub contents: Vec<u8>,
}

const FIXED_MTIME: (u16, u8, u8, u8, u8, u8) = (2020, 1, 1, 0, 0, 0);

/// Builds a deterministic zip archive from `files` (sorted by relative
/// path regardless of input order) and returns `(archive_bytes, sha256_hex)`.
pub fn package(mut files: Vec<RuleFile>) -> Result<(Vec<u8>, VersionHash), RulePackError> {
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let mut buffer = Vec::new();
    {
        let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let (y, mo, d, h, mi, s) = FIXED_MTIME;
        let mtime = ZipDateTime::from_date_and_time(y, mo, d, h, mi, s)
            .expect("fixed mtime is a valid date");
        let options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(mtime)
            .unix_permissions(0o644);

        for file in &files {
            writer.start_file(&file.relative_path, options)?;
            writer.write_all(&file.contents)?;
        }
        writer.finish()?;
    }

    let hash = sha256_hex(&buffer);
    Ok((buffer, hash))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Swaps the active rule-pack directory atomically: write to a temp path
/// under the same parent, then rename over the live directory's marker
/// file. Avoided is "write into the live tree directly", which could
/// expose a half-written snapshot to an in-flight scan.
pub fn atomic_write(dest: &Path, contents: &[u8]) -> Result<(), RulePackError> {
    let tmp = dest.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, dest)?;
    Ok(())
}

#[allow(dead_code)]
fn read_back(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_trees_hash_the_same() {
        let files_a = vec![
            RuleFile { relative_path: "b.json".into(), contents: b"{}".to_vec() },
            RuleFile { relative_path: "a.json".into(), contents: b"{\"x\":1}".to_vec() },
        ];
        let files_b = vec![
            RuleFile { relative_path: "a.json".into(), contents: b"{\"x\":1}".to_vec() },
            RuleFile { relative_path: "b.json".into(), contents: b"{}".to_vec() },
        ];

        let (_, hash_a) = package(files_a).unwrap();
        let (_, hash_b) = package(files_b).unwrap();
        assert_eq!(hash_a, hash_b, "ordering of input files must not affect the hash");
    }

    #[test]
    fn changing_one_byte_changes_the_hash() {
        let files_a = vec![RuleFile { relative_path: "a.json".into(), contents: b"{\"x\":1}".to_vec() }];
        let files_b = vec![RuleFile { relative_path: "a.json".into(), contents: b"{\"x\":2}".to_vec() }];

        let (_, hash_a) = package(files_a).unwrap();
        let (_, hash_b) = package(files_b).unwrap();
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn atomic_write_then_read_back_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pack.zip");
        atomic_write(&dest, b"archive-bytes").unwrap();
        assert_eq!(read_back(&dest).unwrap(), b"archive-bytes");
    }
}
