//! Corpus loading and cache fingerprinting.
//!
//! The corpus is a flat directory of plain-text books. Each `.txt` file
//! becomes one immutable [`Document`]; the id is the file stem and the
//! title is the stem with separators expanded. Files are visited in
//! sorted path order so document and chunk ordering is stable across
//! runs on the same corpus.
//!
//! The fingerprint hashes every file's name, byte length, and
//! modification time together with the embedding model identifier and
//! the chunking parameters. Any change to the source books, the model,
//! or the window geometry produces a different fingerprint and forces
//! an index rebuild — a stale cache is never partially reused.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use taleforge_core::models::Document;

use crate::config::ChunkingConfig;

/// Read every `.txt` file under `dir` into a [`Document`], sorted by path.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("txt"))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read book: {}", path.display()))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        documents.push(Document {
            id: stem.clone(),
            title: title_from_stem(&stem),
            text,
        });
    }

    if documents.is_empty() {
        anyhow::bail!(
            "No .txt books found under {}. Add source texts before starting.",
            dir.display()
        );
    }

    Ok(documents)
}

/// `alices_adventures-in-wonderland` → `Alices Adventures In Wonderland`.
fn title_from_stem(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content fingerprint over the corpus directory, the embedding model,
/// and the chunking geometry.
pub fn fingerprint(dir: &Path, model_name: &str, dims: usize, chunking: &ChunkingConfig) -> Result<String> {
    let mut entries: Vec<(String, u64, u64)> = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|x| x.to_str()) != Some("txt")
        {
            continue;
        }
        let meta = entry.metadata()?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        entries.push((entry.path().display().to_string(), meta.len(), mtime));
    }
    entries.sort();

    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.update(dims.to_le_bytes());
    hasher.update(chunking.size.to_le_bytes());
    hasher.update(chunking.overlap.to_le_bytes());
    for (path, len, mtime) in &entries {
        hasher.update(path.as_bytes());
        hasher.update(len.to_le_bytes());
        hasher.update(mtime.to_le_bytes());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            size: 100,
            overlap: 20,
        }
    }

    #[test]
    fn test_load_documents_sorted_with_titles() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("gullivers_travels.txt"), "A voyage to Lilliput.").unwrap();
        fs::write(tmp.path().join("alice_in_wonderland.txt"), "Down the rabbit hole.").unwrap();
        fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let docs = load_documents(tmp.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "alice_in_wonderland");
        assert_eq!(docs[0].title, "Alice In Wonderland");
        assert_eq!(docs[1].title, "Gullivers Travels");
    }

    #[test]
    fn test_empty_corpus_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_documents(tmp.path()).is_err());
    }

    #[test]
    fn test_fingerprint_stable_for_unchanged_corpus() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("alice.txt"), "Curiouser and curiouser!").unwrap();
        let a = fingerprint(tmp.path(), "model-a", 8, &chunking()).unwrap();
        let b = fingerprint(tmp.path(), "model-a", 8, &chunking()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("alice.txt"), "Curiouser and curiouser!").unwrap();
        let before = fingerprint(tmp.path(), "model-a", 8, &chunking()).unwrap();
        fs::write(tmp.path().join("alice.txt"), "Off with their heads! Entirely new text.").unwrap();
        let after = fingerprint(tmp.path(), "model-a", 8, &chunking()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_fingerprint_changes_with_model_and_geometry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("alice.txt"), "Curiouser and curiouser!").unwrap();
        let base = fingerprint(tmp.path(), "model-a", 8, &chunking()).unwrap();
        assert_ne!(base, fingerprint(tmp.path(), "model-b", 8, &chunking()).unwrap());
        assert_ne!(base, fingerprint(tmp.path(), "model-a", 16, &chunking()).unwrap());
        let other = ChunkingConfig {
            size: 120,
            overlap: 20,
        };
        assert_ne!(base, fingerprint(tmp.path(), "model-a", 8, &other).unwrap());
    }
}
