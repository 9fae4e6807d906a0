use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::TempDir;
use tracing::debug;

use crate::{CompileError, ShaderStage, SpirvCompiler};

const OUTPUT_FILE: &str = "compilation_output.spv";

/// The `glslc` front end from the Vulkan SDK / shaderc.
///
/// The stage is inferred by `glslc` from the extension of the scratch input
/// file, so no stage flag is passed.
#[derive(Debug, Clone)]
pub struct Glslc {
    program: PathBuf,
}

impl Glslc {
    pub const NAME: &'static str = "glslc";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses the copy shipped in `$VULKAN_SDK` if there is one, otherwise
    /// whatever `glslc` resolves to on `PATH`.
    pub fn locate() -> Self {
        Self::new(locate_program(Self::NAME))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for Glslc {
    fn default() -> Self {
        Self::new(Self::NAME)
    }
}

impl SpirvCompiler for Glslc {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compile(&self, source: &str, stage: ShaderStage) -> Result<Vec<u8>, CompileError> {
        compile_in_scratch(Self::NAME, &self.program, source, stage, |command, input, output| {
            command.arg(input).arg("-o").arg(output);
        })
    }
}

/// The Khronos reference compiler, `glslangValidator`.
///
/// Unlike [`Glslc`] the stage is passed explicitly with `-S`.
#[derive(Debug, Clone)]
pub struct GlslangValidator {
    program: PathBuf,
}

impl GlslangValidator {
    pub const NAME: &'static str = "glslangValidator";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// See [`Glslc::locate`].
    pub fn locate() -> Self {
        Self::new(locate_program(Self::NAME))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for GlslangValidator {
    fn default() -> Self {
        Self::new(Self::NAME)
    }
}

impl SpirvCompiler for GlslangValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compile(&self, source: &str, stage: ShaderStage) -> Result<Vec<u8>, CompileError> {
        compile_in_scratch(Self::NAME, &self.program, source, stage, |command, input, output| {
            command
                .arg("-V")
                .arg("-S")
                .arg(stage.extension())
                .arg("-o")
                .arg(output)
                .arg(input);
        })
    }
}

/// Runs one compiler invocation inside a private temporary directory.
fn compile_in_scratch(
    tool: &'static str,
    program: &Path,
    source: &str,
    stage: ShaderStage,
    configure: impl FnOnce(&mut Command, &Path, &Path),
) -> Result<Vec<u8>, CompileError> {
    compile_in(tempfile::tempdir()?, tool, program, source, stage, configure)
}

/// Compiles with `scratch` holding the input and output files.
///
/// `scratch` is owned here, so the directory and everything in it is removed
/// on every return path.
fn compile_in(
    scratch: TempDir,
    tool: &'static str,
    program: &Path,
    source: &str,
    stage: ShaderStage,
    configure: impl FnOnce(&mut Command, &Path, &Path),
) -> Result<Vec<u8>, CompileError> {
    let input = scratch.path().join(format!("shader.{}", stage.extension()));
    let output = scratch.path().join(OUTPUT_FILE);
    fs::write(&input, source)?;

    let mut command = Command::new(program);
    configure(&mut command, &input, &output);
    debug!("running {command:?}");

    let result = match command.output() {
        Ok(result) => result,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CompileError::ToolNotFound {
                tool,
                program: program.to_owned(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    if !result.status.success() {
        return Err(CompileError::Failed {
            tool,
            status: result.status,
            output: diagnostics(&result),
        });
    }

    match fs::read(&output) {
        Ok(spirv) if !spirv.is_empty() => Ok(spirv),
        Ok(_) => Err(CompileError::MissingOutput { tool }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(CompileError::MissingOutput { tool })
        }
        Err(err) => Err(err.into()),
    }
}

// glslangValidator prints its errors on stdout, glslc on stderr.
fn diagnostics(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = stdout.trim().to_owned();
    if !text.is_empty() && !stderr.trim().is_empty() {
        text.push('\n');
    }
    text.push_str(stderr.trim());
    text
}

fn locate_program(name: &str) -> PathBuf {
    let executable = format!("{name}{}", env::consts::EXE_SUFFIX);
    if let Some(sdk) = env::var_os("VULKAN_SDK") {
        for bin in ["bin", "Bin"] {
            let candidate = Path::new(&sdk).join(bin).join(&executable);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(executable)
}
