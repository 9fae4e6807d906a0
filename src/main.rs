//! Command line front end for packing a shader directory into a header.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use argh::FromArgs;
use shader_pack::{
    Backend, DEFAULT_INCLUDE_GUARD, MAX_LITERAL_LEN, PackError, PackReport, PackSettings,
    ShaderPacker, UnknownBackend,
    glsl_to_spirv::{CompilerChain, Glslc, GlslangValidator},
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pack a directory of GLSL and Metal shaders into one generated C++ header.
#[derive(FromArgs, Debug)]
struct Args {
    /// directory searched recursively for shader sources
    #[argh(positional)]
    input_dir: PathBuf,

    /// header file to generate
    #[argh(positional)]
    output_file: PathBuf,

    /// target backend: opengl, vulkan or metal (true/1/yes select vulkan,
    /// false/0/no select opengl); inferred from the input path when omitted
    #[argh(positional)]
    backend: Option<String>,

    /// include guard macro of the generated header
    #[argh(option, default = "DEFAULT_INCLUDE_GUARD.to_owned()")]
    guard: String,

    /// longest string literal emitted, in characters
    #[argh(option, default = "MAX_LITERAL_LEN")]
    max_literal_len: usize,

    /// path to the glslc executable
    #[argh(option)]
    glslc: Option<PathBuf>,

    /// path to the glslangValidator executable
    #[argh(option)]
    glslang: Option<PathBuf>,

    /// exit with an error if the output file is out of date instead of writing it
    #[argh(switch)]
    check: bool,

    /// log debug output
    #[argh(switch, short = 'v')]
    verbose: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Backend(#[from] UnknownBackend),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Packs the shaders and writes or checks the header. `Ok(false)` means
/// `--check` found the header out of date.
fn run(args: Args) -> Result<bool, CliError> {
    // Resolved before anything else so a bad token never touches the output.
    let backend = Backend::resolve(args.backend.as_deref(), &args.input_dir)?;
    info!("using the {backend} backend");

    let settings = PackSettings::new(&args.input_dir, backend)
        .with_max_literal_len(args.max_literal_len)
        .with_include_guard(args.guard);
    let compilers = CompilerChain::default()
        .with(args.glslc.map_or_else(Glslc::locate, Glslc::new))
        .with(
            args.glslang
                .map_or_else(GlslangValidator::locate, GlslangValidator::new),
        );

    let (header, report) = ShaderPacker::with_compiler(settings, compilers).pack_to_string()?;
    log_report(&report);

    let up_to_date = fs::read(&args.output_file)
        .is_ok_and(|existing| existing == header.as_bytes());

    if args.check {
        if up_to_date {
            info!("{} is up to date", args.output_file.display());
            return Ok(true);
        }
        error!(
            "{} is out of date, rerun without --check to regenerate it",
            args.output_file.display()
        );
        return Ok(false);
    }

    if up_to_date {
        info!("{} is unchanged", args.output_file.display());
        return Ok(true);
    }
    replace_file(&args.output_file, header.as_bytes()).map_err(|source| CliError::Write {
        path: args.output_file.clone(),
        source,
    })?;
    info!("wrote {}", args.output_file.display());
    Ok(true)
}

fn log_report(report: &PackReport) {
    info!(
        "{} symbol(s), {} compiled to SPIR-V",
        report.symbols, report.compiled
    );
    if !report.failed.is_empty() {
        warn!(
            "{} shader(s) emitted empty: {}",
            report.failed.len(),
            report.failed.join(", ")
        );
    }
}

/// Replaces `path` with `contents` through a temporary file in the same
/// directory, so readers never observe a partially written header.
fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
