//! Checksum manifest: build, parse and verify the md5 line listing.
//!
//! One line per file, `<32 lowercase hex><two spaces><filename>`, newline
//! terminated. The format is a collaborator contract and is produced and
//! consumed verbatim.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

/// Fixed manifest file name on both ends of the link.
pub const MANIFEST_NAME: &str = "manifest.md5";

const DIGEST_HEX_LEN: usize = 32;
const READ_CHUNK: usize = 1024 * 1024;

/// Streaming MD5 of a file, as 32 lowercase hex characters.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Image files of `dir`, sorted by lowercase file name. The classifier hands
/// over a directory; the protocol only ever sees this path list.
pub fn find_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            images.push(path);
        }
    }
    images.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(images)
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no images found in {}", .0.display())]
    NoImages(PathBuf),
    #[error("manifest not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("manifest had no readable entries")]
    Empty,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Digest every image in `dir` and write `dir/manifest.md5`, replacing any
/// existing listing. Returns how many images were listed.
pub fn write_manifest(dir: &Path) -> Result<usize, ManifestError> {
    let images = find_images(dir)?;
    if images.is_empty() {
        return Err(ManifestError::NoImages(dir.to_path_buf()));
    }
    let mut out = BufWriter::new(File::create(dir.join(MANIFEST_NAME))?);
    for image in &images {
        let Some(name) = image.file_name() else {
            continue;
        };
        let digest = file_digest(image)?;
        writeln!(out, "{digest}  {}", name.to_string_lossy())?;
    }
    out.flush()?;
    Ok(images.len())
}

/// Split one manifest line into (digest, filename). Returns `None` for blank
/// lines, lines without the two-space separator, and digests of the wrong
/// length. The digest comes back lowercased.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (digest, filename) = line.split_once("  ")?;
    let digest = digest.trim();
    if digest.len() != DIGEST_HEX_LEN {
        return None;
    }
    Some((digest.to_ascii_lowercase(), filename.trim().to_string()))
}

/// Per-file verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    Missing,
    Changed { expected: String, actual: String },
}

/// Result of checking a directory against its manifest.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub checked: usize,
    pub failures: usize,
    pub entries: Vec<(String, VerifyOutcome)>,
}

/// Check every manifest entry of `dir` against the files on disk.
/// Unparseable lines are skipped; a manifest with no readable entries is an
/// error.
pub fn verify_manifest(dir: &Path) -> Result<VerifyReport, ManifestError> {
    let manifest_path = dir.join(MANIFEST_NAME);
    if !manifest_path.exists() {
        return Err(ManifestError::NotFound(manifest_path));
    }
    let text = fs::read_to_string(&manifest_path)?;
    let mut report = VerifyReport::default();
    for line in text.lines() {
        let Some((expected, filename)) = parse_line(line) else {
            continue;
        };
        report.checked += 1;
        let path = dir.join(&filename);
        let outcome = if !path.exists() {
            tracing::warn!(file = %filename, "manifest entry missing on disk");
            VerifyOutcome::Missing
        } else {
            let actual = file_digest(&path)?;
            if actual == expected {
                VerifyOutcome::Ok
            } else {
                tracing::warn!(
                    file = %filename,
                    expected = %expected,
                    actual = %actual,
                    "checksum changed"
                );
                VerifyOutcome::Changed { expected, actual }
            }
        };
        if outcome != VerifyOutcome::Ok {
            report.failures += 1;
        }
        report.entries.push((filename, outcome));
    }
    if report.checked == 0 {
        return Err(ManifestError::Empty);
    }
    Ok(report)
}
