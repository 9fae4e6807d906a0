use std::io::{self, Write};

use tracing::warn;

use crate::backend::Backend;

/// Upper bound on the characters in one string literal. Hex and ASCII source
/// stay under MSVC's 65,535-byte literal limit; a chunk of multi-byte UTF-8
/// can exceed it, so lower the bound for such sources.
pub const MAX_LITERAL_LEN: usize = 60_000;

pub const DEFAULT_INCLUDE_GUARD: &str = "ATLAS_GENERATED_SHADERS_H";

const PROVENANCE: &str = "// This file contains packed shader source code.";
const SPIRV_NOTE: &str = "// SPIR-V payloads are hex-encoded, two lowercase digits per byte.";

const LITERAL_OPEN: &str = "R\"(";
const LITERAL_CLOSE: &str = ")\"";

/// Splits `payload` into consecutive pieces of at most `max_len` characters.
///
/// Always returns at least one piece, so an empty payload is a single empty
/// chunk. Pieces never split a UTF-8 sequence.
pub fn split_chunks(payload: &str, max_len: usize) -> Vec<&str> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_len)
            .map_or(rest.len(), |(index, _)| index);
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    if chunks.is_empty() {
        chunks.push("");
    }
    chunks
}

/// Writes the generated header: preamble, one declaration per symbol, trailer.
pub struct HeaderWriter<W: Write> {
    out: W,
    include_guard: String,
    max_literal_len: usize,
}

impl<W: Write> HeaderWriter<W> {
    /// Writes the preamble and returns a writer ready for symbols.
    pub fn begin(
        mut out: W,
        backend: Backend,
        include_guard: &str,
        max_literal_len: usize,
    ) -> io::Result<Self> {
        writeln!(out, "{PROVENANCE}")?;
        if backend.cross_compiles() {
            writeln!(out, "{SPIRV_NOTE}")?;
        }
        writeln!(out, "#ifndef {include_guard}")?;
        writeln!(out, "#define {include_guard}")?;
        writeln!(out)?;
        Ok(Self {
            out,
            include_guard: include_guard.to_owned(),
            max_literal_len,
        })
    }

    /// Declares `var_name` holding `payload`, split into as many literals as
    /// the length bound requires.
    pub fn write_symbol(&mut self, var_name: &str, payload: &str) -> io::Result<()> {
        if payload.contains(LITERAL_CLOSE) {
            warn!(
                "{var_name}: payload contains `{LITERAL_CLOSE}`, which ends a raw string literal"
            );
        }

        let chunks = split_chunks(payload, self.max_literal_len);
        let mut declaration = format!("static const char* {var_name} =");
        if let [chunk] = chunks.as_slice() {
            declaration.push(' ');
            push_literal(&mut declaration, chunk);
            declaration.push(';');
            if chunk.is_empty() {
                declaration.push_str(" // empty");
            }
        } else {
            for chunk in &chunks {
                declaration.push_str("\n    ");
                push_literal(&mut declaration, chunk);
            }
            declaration.push(';');
        }
        declaration.push_str("\n\n");

        self.out.write_all(declaration.as_bytes())
    }

    /// Writes the trailer and hands back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        writeln!(self.out, "#endif // {}", self.include_guard)?;
        self.out.flush()?;
        Ok(self.out)
    }
}

fn push_literal(declaration: &mut String, chunk: &str) {
    declaration.push_str(LITERAL_OPEN);
    declaration.push_str(chunk);
    declaration.push_str(LITERAL_CLOSE);
}
