//! Build-script rewrite applied by the patch branch.

/// First line of the inserted preamble. Its presence marks a patched script.
pub const PATCH_MARKER_BEGIN: &str = "# >>> forge3d recovery patch >>>";
pub const PATCH_MARKER_END: &str = "# <<< forge3d recovery patch <<<";

const PREAMBLE_BODY: &str = r#"import os as _forge3d_os
_forge3d_os.environ["NVCC_APPEND_FLAGS"] = (_forge3d_os.environ.get("NVCC_APPEND_FLAGS", "") + " -allow-unsupported-compiler").strip()
_forge3d_os.environ["CL"] = (_forge3d_os.environ.get("CL", "") + " /WX-").strip()
_forge3d_os.environ["CFLAGS"] = (_forge3d_os.environ.get("CFLAGS", "") + " -Wno-error").strip()"#;

/// Result of patching a build script's source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchedSource {
    Patched(String),
    /// The marker is already present; nothing to do.
    AlreadyPatched,
}

/// Insert the warnings-not-errors preamble into a `setup.py`.
///
/// The preamble goes after any shebang/encoding comments and any
/// `from __future__` imports, which must stay at the top of the module.
pub fn patch_build_script(source: &str) -> PatchedSource {
    if source.contains(PATCH_MARKER_BEGIN) {
        return PatchedSource::AlreadyPatched;
    }

    let lines: Vec<&str> = source.lines().collect();
    let insert_at = insertion_point(&lines);

    let mut out = String::with_capacity(source.len() + PREAMBLE_BODY.len() + 128);
    for line in &lines[..insert_at] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(PATCH_MARKER_BEGIN);
    out.push('\n');
    out.push_str(PREAMBLE_BODY);
    out.push('\n');
    out.push_str(PATCH_MARKER_END);
    out.push('\n');
    for line in &lines[insert_at..] {
        out.push_str(line);
        out.push('\n');
    }
    PatchedSource::Patched(out)
}

fn insertion_point(lines: &[&str]) -> usize {
    if let Some(last_future) = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("from __future__"))
    {
        return end_of_statement(lines, last_future) + 1;
    }
    lines
        .iter()
        .take_while(|l| l.starts_with("#!") || (l.starts_with('#') && l.contains("coding")))
        .count()
}

/// Index of the line closing a statement that starts at `start`, following a
/// parenthesised import across lines.
fn end_of_statement(lines: &[&str], start: usize) -> usize {
    let (mut opened, mut closed) = (0usize, 0usize);
    for (i, line) in lines.iter().enumerate().skip(start) {
        let code = line.split('#').next().unwrap_or_default();
        opened += code.matches('(').count();
        closed += code.matches(')').count();
        if closed >= opened {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}
