use glsl_to_spirv::{CompileError, ShaderStage, SpirvCompiler};
use tracing::warn;

use crate::{backend::Backend, discovery::ShaderFile};

/// What gets embedded for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledPayload {
    /// Shader source embedded as is.
    Text(String),
    /// A compiled SPIR-V module.
    Binary(Vec<u8>),
}

impl CompiledPayload {
    /// The literal text written to the header: the source itself, or two
    /// lowercase hex digits per byte of SPIR-V.
    pub fn encode(&self) -> String {
        match self {
            CompiledPayload::Text(text) => text.clone(),
            CompiledPayload::Binary(bytes) => hex::encode(bytes),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CompiledPayload::Text(text) => text.is_empty(),
            CompiledPayload::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// Whether `file` has to go through a SPIR-V compiler for `backend`.
pub fn needs_cross_compilation(backend: Backend, file: &ShaderFile) -> bool {
    backend.cross_compiles() && file.is_glsl()
}

/// The stage a GLSL file is compiled as. Extensions without a stage of their
/// own, such as `.glsl`, are compiled as vertex shaders.
pub fn stage_for_extension(extension: &str) -> ShaderStage {
    ShaderStage::from_extension(extension).unwrap_or_else(|| {
        warn!("no shader stage for extension `.{extension}`, compiling as a vertex shader");
        ShaderStage::Vertex
    })
}

/// Turns shader source into the payload emitted for it.
pub struct CompilationAdapter<C> {
    compiler: C,
}

impl<C: SpirvCompiler> CompilationAdapter<C> {
    pub fn new(compiler: C) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Produces the payload for `file`.
    ///
    /// Sources that need no cross-compilation come back as text. Blank GLSL
    /// sources become an empty binary without invoking a compiler. A compiler
    /// failure is returned to the caller, which decides what to emit instead.
    pub fn prepare(
        &self,
        backend: Backend,
        file: &ShaderFile,
        source: String,
    ) -> Result<CompiledPayload, CompileError> {
        if !needs_cross_compilation(backend, file) {
            return Ok(CompiledPayload::Text(source));
        }
        if source.trim().is_empty() {
            return Ok(CompiledPayload::Binary(Vec::new()));
        }

        let stage = stage_for_extension(&file.extension);
        self.compiler
            .compile(&source, stage)
            .map(CompiledPayload::Binary)
    }
}
