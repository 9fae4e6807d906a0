use core::{fmt, str::FromStr};
use std::path::{Component, Path};

use thiserror::Error;

/// The graphics API a packing run targets. Exactly one is chosen per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Shader source is embedded as text, no cross-compilation.
    #[default]
    OpenGl,
    /// GLSL stages are compiled to SPIR-V and embedded hex-encoded.
    Vulkan,
    /// Native `.metal` sources are embedded as text.
    Metal,
}

/// An explicit backend token that is neither a backend name nor one of the
/// legacy boolean aliases.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized backend `{0}`, expected one of opengl, vulkan, metal")]
pub struct UnknownBackend(pub String);

impl Backend {
    /// Backends in the order their names are looked for in a root path.
    const PATH_PRIORITY: [Backend; 3] = [Backend::Metal, Backend::Vulkan, Backend::OpenGl];

    pub fn name(self) -> &'static str {
        match self {
            Backend::OpenGl => "opengl",
            Backend::Vulkan => "vulkan",
            Backend::Metal => "metal",
        }
    }

    /// Whether GLSL sources are compiled to SPIR-V for this backend.
    pub fn cross_compiles(self) -> bool {
        self == Backend::Vulkan
    }

    /// Picks the backend for a run.
    ///
    /// An explicit token always wins over the root path. Without one, the
    /// directory names in `root` are sniffed with [`Backend::from_root_path`].
    pub fn resolve(explicit: Option<&str>, root: &Path) -> Result<Self, UnknownBackend> {
        match explicit {
            Some(token) => token.parse(),
            None => Ok(Self::from_root_path(root)),
        }
    }

    /// Infers the backend from the directory names of `root`.
    ///
    /// The path is normalized lexically first, so `shaders/vulkan/..` is just
    /// `shaders`. A final segment naming a backend decides it. Otherwise any
    /// segment naming `metal`, then `vulkan`, then `opengl` does, and a path
    /// naming none of them is [`Backend::OpenGl`].
    pub fn from_root_path(root: &Path) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for component in root.components() {
            match component {
                Component::Normal(segment) => segments.extend(segment.to_str()),
                Component::ParentDir => {
                    segments.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        if let Some(backend) = segments.last().copied().and_then(Self::from_name) {
            return backend;
        }
        Self::PATH_PRIORITY
            .into_iter()
            .find(|backend| segments.contains(&backend.name()))
            .unwrap_or_default()
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::PATH_PRIORITY
            .into_iter()
            .find(|backend| backend.name() == name)
    }
}

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lowercase = token.trim().to_ascii_lowercase();
        match lowercase.as_str() {
            "opengl" | "false" | "0" | "no" => Ok(Backend::OpenGl),
            "vulkan" | "true" | "1" | "yes" => Ok(Backend::Vulkan),
            "metal" => Ok(Backend::Metal),
            _ => Err(UnknownBackend(token.to_owned())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
