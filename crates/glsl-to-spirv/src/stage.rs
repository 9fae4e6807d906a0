use core::fmt;

/// Pipeline stage a GLSL source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
    Geometry,
    TessellationControl,
    TessellationEvaluation,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Compute,
        ShaderStage::Geometry,
        ShaderStage::TessellationControl,
        ShaderStage::TessellationEvaluation,
    ];

    /// Maps a file extension (without the leading dot) to its stage.
    ///
    /// Returns [`None`] for anything outside the conventional GLSL stage
    /// extensions, including the stage-less `glsl`.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.extension() == extension)
    }

    /// The conventional file extension for this stage, which is also the
    /// stage name understood by `glslangValidator -S`.
    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
            ShaderStage::Geometry => "geom",
            ShaderStage::TessellationControl => "tesc",
            ShaderStage::TessellationEvaluation => "tese",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
