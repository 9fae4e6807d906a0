// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Compiles GLSL to SPIR-V by shelling out to the Vulkan SDK compilers.
//!
//! Each compiler is a [`SpirvCompiler`]. A [`CompilerChain`] tries several of
//! them in order, falling through to the next one when a tool is missing or
//! rejects the source.

mod stage;
mod tool;

pub use stage::ShaderStage;
pub use tool::{Glslc, GlslangValidator};

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;
use tracing::debug;

/// Errors produced while compiling a single shader.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The compiler executable could not be started because it does not exist.
    #[error("`{tool}` was not found (tried `{}`)", .program.display())]
    ToolNotFound {
        tool: &'static str,
        program: PathBuf,
    },
    /// The compiler ran and exited unsuccessfully.
    #[error("`{tool}` exited with {status}: {output}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
        output: String,
    },
    /// The compiler reported success but left no SPIR-V behind.
    #[error("`{tool}` reported success but produced no SPIR-V")]
    MissingOutput { tool: &'static str },
    #[error("i/o error while compiling shader: {0}")]
    Io(#[from] io::Error),
    /// Every compiler in a [`CompilerChain`] was tried, or the chain stopped
    /// early on an error that does not allow falling through.
    #[error("no compiler succeeded: {}", describe_failures(.0))]
    Exhausted(Vec<CompileError>),
}

impl CompileError {
    /// Whether a [`CompilerChain`] may move on to its next compiler after
    /// this error.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            CompileError::ToolNotFound { .. } | CompileError::Failed { .. }
        )
    }
}

fn describe_failures(failures: &[CompileError]) -> String {
    if failures.is_empty() {
        return "no compilers configured".to_owned();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Something that turns GLSL source for one stage into a SPIR-V module.
pub trait SpirvCompiler {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    fn compile(&self, source: &str, stage: ShaderStage) -> Result<Vec<u8>, CompileError>;
}

/// An ordered list of compilers tried one after another.
#[derive(Default)]
pub struct CompilerChain {
    compilers: Vec<Box<dyn SpirvCompiler>>,
}

impl CompilerChain {
    /// `glslc` first, `glslangValidator` as the fallback.
    pub fn vulkan_sdk() -> Self {
        Self::default()
            .with(Glslc::locate())
            .with(GlslangValidator::locate())
    }

    #[must_use]
    pub fn with(mut self, compiler: impl SpirvCompiler + 'static) -> Self {
        self.push(compiler);
        self
    }

    pub fn push(&mut self, compiler: impl SpirvCompiler + 'static) {
        self.compilers.push(Box::new(compiler));
    }
}

impl SpirvCompiler for CompilerChain {
    fn name(&self) -> &str {
        "compiler chain"
    }

    fn compile(&self, source: &str, stage: ShaderStage) -> Result<Vec<u8>, CompileError> {
        let mut failures = Vec::new();
        for compiler in &self.compilers {
            match compiler.compile(source, stage) {
                Ok(spirv) => return Ok(spirv),
                Err(err) if err.allows_fallback() => {
                    debug!("{} failed, trying the next compiler: {err}", compiler.name());
                    failures.push(err);
                }
                Err(err) => {
                    failures.push(err);
                    break;
                }
            }
        }
        Err(CompileError::Exhausted(failures))
    }
}
