//! pimoc-drv - the compiler driver.
//!
//! Owns the outer I/O shell around the core pipeline: reads a `.pim` file,
//! runs lexer → block parser → macro expansion → semantic compiler, and
//! renders the resulting LLVM IR text or a fatal [`pimoc_util::CompileError`]
//! with a source snippet and caret (spec §6, §7). Grounded on the teacher's
//! driver shape (a small [`Config`] plus a single `run` entry point used by
//! both `main` and the integration tests) with the multi-file/MIR/LIR/regalloc
//! pipeline it used to orchestrate stripped out — this spec's core emits IR
//! text directly and has no object/executable stage of its own (spec §6:
//! "the driver pipes the IR through `llc`/`clang`"; that piping is out of
//! scope, see Non-goals).

use std::path::{Path, PathBuf};

use pimoc_gen::Backend;
use pimoc_lex::{Lexer, StringInterner};
use pimoc_util::{CompileError, SourceMap};

/// Compiler configuration (spec §10.3). Deliberately tiny: no optimization
/// levels, no target triples, no `--emit-*` flags — those belong to the
/// teacher's drivers, not to this one.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the `.pim` source file.
    pub input: PathBuf,
    /// Where to write the emitted LLVM IR text. `None` means stdout.
    pub output: Option<PathBuf>,
    /// Maps to `RUST_LOG=debug` when set and `RUST_LOG` isn't already
    /// present in the environment.
    pub verbose: bool,
}

impl Config {
    /// Builds a [`Config`] from `std::env::args()` (spec §10.3: no
    /// argument-parsing crate). Accepts `<input> [-o <output>] [-v|--verbose]`.
    pub fn from_args() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut input = None;
        let mut output = None;
        let mut verbose = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-o" | "--output" => {
                    let path = args.next().ok_or_else(|| anyhow::anyhow!("-o requires a path"))?;
                    output = Some(PathBuf::from(path));
                }
                "-v" | "--verbose" => verbose = true,
                other if input.is_none() => input = Some(PathBuf::from(other)),
                other => anyhow::bail!("unexpected argument: {other}"),
            }
        }

        let input = input.ok_or_else(|| anyhow::anyhow!("usage: pimoc <input.pim> [-o <output>] [-v]"))?;
        Ok(Config { input, output, verbose })
    }
}

/// Runs the full pipeline for `config`, writing IR text to `config.output`
/// (or stdout) and returning `Err` with a rendered diagnostic on failure.
pub fn run(config: Config) -> anyhow::Result<()> {
    validate_extension(&config.input)?;

    let source = std::fs::read_to_string(&config.input)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", config.input.display()))?;

    let path = config.input.display().to_string();
    let ir = compile(&source, &path).map_err(|e| anyhow::anyhow!(render_error(&source, &path, &e)))?;

    match config.output {
        Some(path) => std::fs::write(&path, ir).map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?,
        None => print!("{ir}"),
    }

    Ok(())
}

/// Rejects anything other than a `.pim` source file (spec §6).
fn validate_extension(path: &Path) -> anyhow::Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pim") => Ok(()),
        _ => anyhow::bail!("{}: expected a .pim source file", path.display()),
    }
}

/// Runs the core pipeline over `source` and returns the emitted LLVM IR as
/// text. `path` names the module for the IR and the diagnostics it may
/// raise; it carries no other meaning to the core (spec §6 input contract).
pub fn compile(source: &str, path: &str) -> Result<String, CompileError> {
    log::debug!("compiling {path}");

    let interner = StringInterner::new();
    let lexer = Lexer::new(&interner);
    let lines = lexer.lex(source)?;
    log::debug!("lexed {} line(s)", lines.len());

    let mut tree = pimoc_par::parse(&lines)?;
    let macros = pimoc_macro::directive::collect(&lines)?;
    pimoc_macro::expand(&mut tree, &macros)?;

    let context = inkwell::context::Context::create();
    let module_name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    let mut backend = Backend::new(&context, module_name);

    pimoc_sem::compile(&tree, &mut backend)?;
    backend.verify()?;

    Ok(backend.emit_llvm_ir())
}

/// Renders a fatal [`CompileError`] via [`SourceMap::format_span`] — a
/// `<path>:<line>` header, the offending source line, and a caret underneath
/// (spec §6, §7) — prefixed with the error itself. Errors with no span
/// (`CompileError::Internal`) are rendered without a snippet.
pub fn render_error(source: &str, path: &str, err: &CompileError) -> String {
    match err.span() {
        Some(span) => {
            let map = SourceMap::new(path, source);
            format!("{err}\n{}", map.format_span(span))
        }
        None => format!("{path}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program() {
        let ir = compile("func void main() { return; }", "main.pim").expect("trivial program should compile");
        assert!(ir.contains("define void @main"));
    }

    #[test]
    fn rejects_non_pim_extension() {
        let err = validate_extension(Path::new("main.txt")).unwrap_err();
        assert!(err.to_string().contains("expected a .pim source file"));
    }

    #[test]
    fn renders_fatal_error_with_snippet() {
        let source = "func void main() { bogus; }";
        let err = compile(source, "main.pim").unwrap_err();
        let rendered = render_error(source, "main.pim", &err);
        assert!(rendered.contains("main.pim:1"));
        assert!(rendered.contains(source));
    }
}
