//! Packs a directory of shader sources into one generated C++ header.
//!
//! A run goes through [`discover`] once, resolves the [`Backend`], reduces the
//! files to a [`SymbolRegistry`], then for each symbol prepares a
//! [`CompiledPayload`] and writes it with a [`HeaderWriter`].

mod backend;
mod compile;
mod discovery;
mod emit;
mod registry;

pub use backend::{Backend, UnknownBackend};
pub use compile::{
    CompilationAdapter, CompiledPayload, needs_cross_compilation, stage_for_extension,
};
pub use discovery::{
    DiscoveryError, GLSL_EXTENSIONS, METAL_EXTENSION, ShaderFile, discover, is_shader_extension,
};
pub use emit::{DEFAULT_INCLUDE_GUARD, HeaderWriter, MAX_LITERAL_LEN, split_chunks};
pub use glsl_to_spirv;
pub use registry::{RegistryNotice, SymbolEntry, SymbolRegistry, priority, symbol_name};

/// The most commonly used types, for glob import.
pub mod prelude {
    pub use crate::{Backend, PackReport, PackSettings, ShaderPacker};
}

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use glsl_to_spirv::{CompilerChain, SpirvCompiler};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a whole packing run.
#[derive(Error, Debug)]
pub enum PackError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to write generated header: {0}")]
    Io(#[from] io::Error),
}

/// Settings for one packing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSettings {
    /// Directory searched recursively for shader sources.
    pub root: PathBuf,
    pub backend: Backend,
    /// Longest single string literal emitted, in characters.
    pub max_literal_len: usize,
    pub include_guard: String,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("shaders"),
            backend: Backend::default(),
            max_literal_len: MAX_LITERAL_LEN,
            include_guard: DEFAULT_INCLUDE_GUARD.to_owned(),
        }
    }
}

impl PackSettings {
    pub fn new(root: impl Into<PathBuf>, backend: Backend) -> Self {
        Self {
            root: root.into(),
            backend,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_literal_len(mut self, max_literal_len: usize) -> Self {
        self.max_literal_len = max_literal_len;
        self
    }

    #[must_use]
    pub fn with_include_guard(mut self, include_guard: impl Into<String>) -> Self {
        self.include_guard = include_guard.into();
        self
    }
}

/// Summary of a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackReport {
    /// Symbols declared in the header.
    pub symbols: usize,
    /// Symbols whose payload is compiled SPIR-V.
    pub compiled: usize,
    /// Relative paths of the files emitted empty because compilation failed.
    pub failed: Vec<String>,
    /// Relative paths of the files that vanished between discovery and read.
    pub skipped: Vec<String>,
    pub notices: Vec<RegistryNotice>,
}

/// Drives a packing run from discovery to the header trailer.
pub struct ShaderPacker<C = CompilerChain> {
    settings: PackSettings,
    adapter: CompilationAdapter<C>,
}

impl ShaderPacker<CompilerChain> {
    /// A packer using `glslc` with a `glslangValidator` fallback.
    pub fn new(settings: PackSettings) -> Self {
        Self::with_compiler(settings, CompilerChain::vulkan_sdk())
    }
}

impl<C: SpirvCompiler> ShaderPacker<C> {
    pub fn with_compiler(settings: PackSettings, compiler: C) -> Self {
        Self {
            settings,
            adapter: CompilationAdapter::new(compiler),
        }
    }

    pub fn settings(&self) -> &PackSettings {
        &self.settings
    }

    /// Writes the complete header for the configured root to `out`.
    ///
    /// Per-file problems never abort the run: a file that fails to compile or
    /// read is declared with an empty payload, and a file that disappeared
    /// since discovery is left out.
    pub fn pack<W: io::Write>(&self, out: W) -> Result<(W, PackReport), PackError> {
        let PackSettings {
            root,
            backend,
            max_literal_len,
            include_guard,
        } = &self.settings;
        let backend = *backend;

        let files = discover(root)?;
        info!(
            "packing {} shader(s) from {} for {backend}",
            files.len(),
            root.display()
        );
        let registry = SymbolRegistry::build(files, backend);

        let mut report = PackReport {
            notices: registry.notices().to_vec(),
            ..Default::default()
        };
        let mut header = HeaderWriter::begin(out, backend, include_guard, *max_literal_len)?;

        for entry in &registry {
            let Some(payload) = self.payload_for(entry, backend, &mut report) else {
                continue;
            };
            if matches!(payload, CompiledPayload::Binary(_)) && !payload.is_empty() {
                report.compiled += 1;
            }
            header.write_symbol(&entry.var_name, &payload.encode())?;
            report.symbols += 1;
        }

        let out = header.finish()?;
        info!("wrote {} symbol(s)", report.symbols);
        Ok((out, report))
    }

    /// Renders the header into memory.
    pub fn pack_to_string(&self) -> Result<(String, PackReport), PackError> {
        let (bytes, report) = self.pack(Vec::new())?;
        // Every piece written is a `str`.
        let header = String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Ok((header, report))
    }

    fn payload_for(
        &self,
        entry: &SymbolEntry,
        backend: Backend,
        report: &mut PackReport,
    ) -> Option<CompiledPayload> {
        let file = &entry.file;
        let source = match read_source(&file.absolute_path) {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("{} is no longer a file, skipping", file.relative_path);
                report.skipped.push(file.relative_path.clone());
                return None;
            }
            Err(err) => {
                warn!("failed to read {}: {err}", file.relative_path);
                report.failed.push(file.relative_path.clone());
                return Some(empty_payload(backend, file));
            }
        };

        match self.adapter.prepare(backend, file, source) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(
                    "failed to compile {}, emitting an empty literal: {err}",
                    file.relative_path
                );
                report.failed.push(file.relative_path.clone());
                Some(empty_payload(backend, file))
            }
        }
    }
}

fn empty_payload(backend: Backend, file: &ShaderFile) -> CompiledPayload {
    if needs_cross_compilation(backend, file) {
        CompiledPayload::Binary(Vec::new())
    } else {
        CompiledPayload::Text(String::new())
    }
}

/// Reads a discovered source, or `None` if it is no longer a regular file.
fn read_source(path: &Path) -> io::Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glsl_to_spirv::{CompileError, ShaderStage};

    struct FixedCompiler(Option<Vec<u8>>);

    impl SpirvCompiler for FixedCompiler {
        fn name(&self) -> &str {
            "fixed"
        }

        fn compile(&self, _source: &str, _stage: ShaderStage) -> Result<Vec<u8>, CompileError> {
            self.0.clone().ok_or(CompileError::Exhausted(Vec::new()))
        }
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn compiled_symbols_are_hex_encoded() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tri.vert", b"void main(){}");
        write(dir.path(), "notes.glsl", b"   \n");

        let packer = ShaderPacker::with_compiler(
            PackSettings::new(dir.path(), Backend::Vulkan),
            FixedCompiler(Some(vec![0x03, 0x02, 0x23, 0x07])),
        );
        let (header, report) = packer.pack_to_string().unwrap();
        assert!(header.contains("static const char* TRI_VERT = R\"(03022307)\";\n"));
        assert!(header.contains("static const char* NOTES_GLSL = R\"()\"; // empty\n"));
        assert_eq!(report.symbols, 2);
        assert_eq!(report.compiled, 1);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn failed_compilation_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.frag", b"void main(){}");
        write(dir.path(), "b.metal", b"kernel void k() {}");

        let packer = ShaderPacker::with_compiler(
            PackSettings::new(dir.path(), Backend::Vulkan),
            FixedCompiler(None),
        );
        let (header, report) = packer.pack_to_string().unwrap();
        assert!(header.contains("static const char* A_FRAG = R\"()\"; // empty\n"));
        assert!(header.contains("static const char* B = R\"(kernel void k() {})\";\n"));
        assert_eq!(report.failed, ["a.frag"]);
        assert_eq!(report.symbols, 2);
        assert_eq!(report.compiled, 0);
    }

    #[test]
    fn unreadable_source_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.vert", &[0xff, 0xfe, 0x00]);

        let packer = ShaderPacker::with_compiler(
            PackSettings::new(dir.path(), Backend::OpenGl),
            FixedCompiler(None),
        );
        let (header, report) = packer.pack_to_string().unwrap();
        assert!(header.contains("static const char* BAD_VERT = R\"()\"; // empty\n"));
        assert_eq!(report.failed, ["bad.vert"]);
    }

    #[test]
    fn missing_root_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let packer = ShaderPacker::with_compiler(
            PackSettings::new(dir.path().join("nope"), Backend::OpenGl),
            FixedCompiler(None),
        );
        assert!(matches!(
            packer.pack_to_string(),
            Err(PackError::Discovery(DiscoveryError::NotADirectory(_)))
        ));
    }

    #[test]
    fn vanished_paths_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gone.vert", b"void main(){}");
        let gone = dir.path().join("gone.vert");
        fs::remove_file(&gone).unwrap();
        fs::create_dir(dir.path().join("dir.frag")).unwrap();

        assert!(read_source(&gone).unwrap().is_none());
        assert!(read_source(&dir.path().join("dir.frag")).unwrap().is_none());
    }

    #[test]
    fn vanished_file_is_skipped_without_a_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let entry = SymbolEntry {
            var_name: "GONE_VERT".to_owned(),
            priority: 0,
            file: ShaderFile {
                relative_path: "gone.vert".to_owned(),
                absolute_path: dir.path().join("gone.vert"),
                filename: "gone.vert".to_owned(),
                extension: "vert".to_owned(),
            },
        };
        let packer = ShaderPacker::with_compiler(
            PackSettings::new(dir.path(), Backend::Vulkan),
            FixedCompiler(Some(vec![1])),
        );

        let mut report = PackReport::default();
        assert_eq!(packer.payload_for(&entry, Backend::Vulkan, &mut report), None);
        assert_eq!(report.skipped, ["gone.vert"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.symbols, 0);
    }

    #[test]
    fn default_packer_embeds_text_without_compiling() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "opengl/ui.frag", b"void main(){}");

        let packer = ShaderPacker::new(PackSettings::new(dir.path(), Backend::OpenGl));
        assert_eq!(packer.settings().backend, Backend::OpenGl);
        let (header, report) = packer.pack_to_string().unwrap();
        assert!(header.contains("static const char* UI_FRAG = R\"(void main(){})\";\n"));
        assert_eq!(report.symbols, 1);
        assert_eq!(report.compiled, 0);
    }

    #[test]
    fn settings_builders() {
        let settings = PackSettings::new("assets/shaders", Backend::Metal)
            .with_max_literal_len(128)
            .with_include_guard("ENGINE_SHADERS_H");
        assert_eq!(settings.root, PathBuf::from("assets/shaders"));
        assert_eq!(settings.backend, Backend::Metal);
        assert_eq!(settings.max_literal_len, 128);
        assert_eq!(settings.include_guard, "ENGINE_SHADERS_H");
        assert_eq!(PackSettings::default().max_literal_len, MAX_LITERAL_LEN);
    }
}
