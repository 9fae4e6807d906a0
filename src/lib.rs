//! Packs a tree of shader sources into a single generated C++ header.
//!
//! GLSL sources are embedded as text for OpenGL, compiled to SPIR-V and
//! embedded hex-encoded for Vulkan, and native `.metal` sources are embedded
//! as text for Metal. See [`ShaderPacker`] for the entry point.

pub use shader_pack_pipeline::*;
