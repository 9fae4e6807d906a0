use core::fmt;
use std::collections::{BTreeMap, btree_map::Entry};

use tracing::info;

use crate::{
    backend::Backend,
    discovery::{METAL_EXTENSION, ShaderFile},
};

/// The constant name a shader file is emitted under.
///
/// A trailing `.metal` is dropped so that a native Metal source and the GLSL
/// sources for other backends share one symbol. `.` and `-` become `_` and the
/// result is uppercased.
pub fn symbol_name(filename: &str) -> String {
    let stem = filename
        .strip_suffix(METAL_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(filename);
    stem.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Tie-break used when two files map to the same symbol. Higher wins.
///
/// Only the Metal backend has preferences: a `vulkan/` source outranks an
/// `opengl/` one, which outranks everything else.
pub fn priority(backend: Backend, relative_path: &str) -> u8 {
    match backend {
        Backend::Metal if relative_path.starts_with("vulkan/") => 2,
        Backend::Metal if relative_path.starts_with("opengl/") => 1,
        _ => 0,
    }
}

/// A shader selected for emission under [`SymbolEntry::var_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub var_name: String,
    pub priority: u8,
    pub file: ShaderFile,
}

impl SymbolEntry {
    pub fn relative_path(&self) -> &str {
        &self.file.relative_path
    }
}

/// How a symbol collision was settled while building a [`SymbolRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryNotice {
    /// `replacement` had a strictly higher priority than `replaced`.
    Replaced {
        var_name: String,
        replaced: String,
        replacement: String,
    },
    /// `skipped` did not outrank the already registered `kept`.
    Skipped {
        var_name: String,
        kept: String,
        skipped: String,
    },
}

impl fmt::Display for RegistryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryNotice::Replaced {
                var_name,
                replaced,
                replacement,
            } => write!(
                f,
                "{var_name}: replacing `{replaced}` with higher priority `{replacement}`"
            ),
            RegistryNotice::Skipped {
                var_name,
                kept,
                skipped,
            } => write!(f, "{var_name}: skipping duplicate `{skipped}`, keeping `{kept}`"),
        }
    }
}

/// The final set of shaders to emit, unique by symbol and ordered by it.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    entries: BTreeMap<String, SymbolEntry>,
    notices: Vec<RegistryNotice>,
}

impl SymbolRegistry {
    /// Resolves `files` into one entry per symbol for `backend`.
    ///
    /// Files are considered in relative path order regardless of the order
    /// they are given in, so the outcome is reproducible.
    pub fn build(files: impl IntoIterator<Item = ShaderFile>, backend: Backend) -> Self {
        let mut files: Vec<ShaderFile> = files.into_iter().collect();
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut registry = Self::default();
        for file in files {
            registry.insert(file, backend);
        }
        registry
    }

    fn insert(&mut self, file: ShaderFile, backend: Backend) {
        let candidate = SymbolEntry {
            var_name: symbol_name(&file.filename),
            priority: priority(backend, &file.relative_path),
            file,
        };

        let notice = match self.entries.entry(candidate.var_name.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(candidate);
                return;
            }
            Entry::Occupied(mut occupied) if occupied.get().priority < candidate.priority => {
                let replaced = occupied.insert(candidate);
                RegistryNotice::Replaced {
                    var_name: replaced.var_name,
                    replacement: occupied.get().file.relative_path.clone(),
                    replaced: replaced.file.relative_path,
                }
            }
            Entry::Occupied(occupied) => RegistryNotice::Skipped {
                var_name: candidate.var_name,
                kept: occupied.get().file.relative_path.clone(),
                skipped: candidate.file.relative_path,
            },
        };
        info!("{notice}");
        self.notices.push(notice);
    }

    /// Entries in symbol order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &SymbolEntry> {
        self.entries.values()
    }

    pub fn get(&self, var_name: &str) -> Option<&SymbolEntry> {
        self.entries.get(var_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every collision settled while building, in the order they happened.
    pub fn notices(&self) -> &[RegistryNotice] {
        &self.notices
    }
}

impl<'a> IntoIterator for &'a SymbolRegistry {
    type Item = &'a SymbolEntry;
    type IntoIter = std::collections::btree_map::Values<'a, String, SymbolEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
