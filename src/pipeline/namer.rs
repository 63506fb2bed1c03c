//! Collision-free naming for extracted images.
//!
//! Every input file gets a [`FileNamespace`] of the form `{stem}-{token}`,
//! where `token` is derived from the file's position in the batch, its name
//! and its bytes. Two uploads called `report.pdf`, even byte-identical ones,
//! therefore land in different folders. Namespaces are allocated up front in
//! input order, before any document runs, so concurrent processing cannot
//! race on them.

use crate::pipeline::input::InputFile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Hex characters of the digest kept in the namespace.
const TOKEN_LEN: usize = 12;

/// A per-file folder/key segment, unique within one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileNamespace(String);

impl FileNamespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out namespaces for one batch and refuses to issue any twice.
#[derive(Debug, Default)]
pub struct NamespaceAllocator {
    issued: HashSet<String>,
}

impl NamespaceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace for the file at `index` in the batch.
    pub fn allocate(&mut self, index: usize, file: &InputFile) -> FileNamespace {
        let stem = sanitize_stem(&file.file_name);
        let token = file_token(index, file);

        let mut candidate = format!("{stem}-{token}");
        let mut bump = 1usize;
        while !self.issued.insert(candidate.clone()) {
            bump += 1;
            candidate = format!("{stem}-{token}-{bump}");
        }
        FileNamespace(candidate)
    }

    /// Allocate namespaces for a whole batch, in input order.
    pub fn allocate_all(files: &[InputFile]) -> Vec<FileNamespace> {
        let mut allocator = Self::new();
        files
            .iter()
            .enumerate()
            .map(|(i, f)| allocator.allocate(i, f))
            .collect()
    }
}

fn file_token(index: usize, file: &InputFile) -> String {
    let mut hasher = Sha256::new();
    hasher.update((index as u64).to_le_bytes());
    hasher.update(file.file_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(&file.bytes);
    let digest = hex::encode(hasher.finalize());
    digest[..TOKEN_LEN].to_string()
}

/// File stem reduced to `[A-Za-z0-9._-]`, or `document` when nothing is left.
pub fn sanitize_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// `{namespace}/page_{page}_{seq}.{ext}`
pub fn image_entry_name(
    namespace: &FileNamespace,
    page_number: usize,
    sequence_in_page: usize,
    extension: &str,
) -> String {
    format!("{namespace}/page_{page_number}_{sequence_in_page}.{extension}")
}

/// `{namespace}/{file}` for Markdown artefacts stored beside the images.
pub fn artifact_entry_name(namespace: &FileNamespace, file: &str) -> String {
    format!("{namespace}/{file}")
}
