//! Timetable bundles: a zip of one JSON document per grade level plus the
//! workspace's setup sections.
//!
//! This layer only moves documents in and out of the archive and checks
//! their digests. Callers validate the documents before anything is stored.

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT: &str = "timetable-bundle-v1";
const MANIFEST_ENTRY: &str = "manifest.json";
const SETUP_ENTRY: &str = "setup.json";
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Documents carried by a bundle. Each timetable is a `{grade_level,
/// classes}` payload in the same shape `timetable.save` accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub timetables: Vec<Value>,
    pub setup: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    app_version: String,
    exported_at: String,
    /// Archive entry name to lowercase hex SHA-256 of its bytes.
    files: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub bundle_format: &'static str,
    pub timetable_count: usize,
    pub file_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn timetable_entry_name(index: usize) -> String {
    format!("timetables/{:03}.json", index)
}

fn partial_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    out_path.with_file_name(name)
}

/// Writes `bundle` to `out_path`. The archive is assembled next to the
/// target and renamed into place, so a failed write never leaves a
/// truncated bundle behind.
pub fn write_bundle(out_path: &Path, bundle: &Bundle) -> anyhow::Result<WriteSummary> {
    let mut docs: Vec<(String, Vec<u8>)> = Vec::with_capacity(bundle.timetables.len() + 1);
    for (i, doc) in bundle.timetables.iter().enumerate() {
        let bytes = serde_json::to_vec_pretty(doc)
            .with_context(|| format!("failed to serialize timetable {}", i))?;
        docs.push((timetable_entry_name(i), bytes));
    }
    if let Some(setup) = bundle.setup.as_ref() {
        let bytes = serde_json::to_vec_pretty(setup).context("failed to serialize setup")?;
        docs.push((SETUP_ENTRY.to_string(), bytes));
    }

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        files: docs
            .iter()
            .map(|(name, bytes)| (name.clone(), sha256_hex(bytes)))
            .collect(),
    };

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let tmp = partial_path(out_path);
    let file = File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))?;
    let mut zip = ZipWriter::new(file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    for (name, bytes) in &docs {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {}", name))?;
    }
    zip.finish().context("failed to finalize bundle")?;

    std::fs::rename(&tmp, out_path)
        .with_context(|| format!("failed to move bundle to {}", out_path.display()))?;

    Ok(WriteSummary {
        bundle_format: BUNDLE_FORMAT,
        timetable_count: bundle.timetables.len(),
        file_count: docs.len() + 1,
    })
}

fn has_zip_signature(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    Ok(read == sig.len() && sig == ZIP_SIGNATURE)
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle is missing {}", name))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(bytes)
}

/// Reads and verifies a bundle. Every document listed in the manifest must
/// be present with a matching digest, and every document must parse as
/// JSON. Nothing is returned unless the whole bundle checks out.
pub fn read_bundle(in_path: &Path) -> anyhow::Result<Bundle> {
    if !has_zip_signature(in_path)? {
        bail!("{} is not a timetable bundle", in_path.display());
    }
    let file = File::open(in_path).with_context(|| format!("failed to open {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;

    let manifest: Manifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let mut docs: BTreeMap<String, Value> = BTreeMap::new();
    for (name, expected) in &manifest.files {
        let bytes = read_entry(&mut archive, name)?;
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(anyhow!(
                "checksum mismatch for {}: expected {}, got {}",
                name,
                expected,
                actual
            ));
        }
        let doc = serde_json::from_slice(&bytes).with_context(|| format!("{} is not JSON", name))?;
        docs.insert(name.clone(), doc);
    }

    let setup = docs.remove(SETUP_ENTRY);
    let count = docs.keys().filter(|k| k.starts_with("timetables/")).count();
    let mut timetables = Vec::with_capacity(count);
    for i in 0..count {
        let name = timetable_entry_name(i);
        let doc = docs
            .remove(&name)
            .ok_or_else(|| anyhow!("bundle is missing {}", name))?;
        timetables.push(doc);
    }
    if let Some(extra) = docs.keys().next() {
        bail!("unexpected bundle entry: {}", extra);
    }

    Ok(Bundle { timetables, setup })
}
