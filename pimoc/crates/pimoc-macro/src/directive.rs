//! Directive pass (spec §4.4).
//!
//! Scans the lexer's flat per-line token records for `# define` lines and
//! records their bodies, rejecting empty, self-referential, and mutually
//! recursive definitions before the block parser or expansion pass ever
//! run. No teacher file grounds this directly — the teacher has no
//! preprocessor stage — so the pass is shaped the way the rest of this
//! workspace shapes a single-purpose, `Result`-returning scan: a flat
//! function over borrowed input, no accumulating state beyond what it
//! returns.

use std::collections::{HashMap, HashSet};

use log::debug;

use pimoc_lex::{LineTokens, Token, TokenKind};
use pimoc_util::{CompileError, Span};

/// Macro name → recorded body tokens, as recorded by `# define` lines.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    defs: HashMap<String, Vec<Token>>,
}

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<&[Token]> {
        self.defs.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

fn is_upper_name(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit())
}

/// Names of every macro-kind token appearing in `body`.
fn referenced_macros(body: &[Token]) -> impl Iterator<Item = &str> {
    body.iter()
        .filter(|t| t.kind == TokenKind::Macro)
        .map(|t| t.text.as_str())
}

/// True if, starting from `start`, the recorded macro dependency graph
/// reaches `target` (spec §11 Open Question 1's cycle check).
fn reaches(start: &str, target: &str, defs: &HashMap<String, Vec<Token>>) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![start.to_string()];
    while let Some(name) = stack.pop() {
        if name == target {
            return true;
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(body) = defs.get(&name) {
            stack.extend(referenced_macros(body).map(str::to_string));
        }
    }
    false
}

/// Runs the directive pass over every lexed line, returning the finished
/// macro table.
pub fn collect(lines: &[LineTokens]) -> Result<MacroTable, CompileError> {
    let mut table = MacroTable::default();

    for line in lines {
        let Some(first) = line.tokens.first() else {
            continue;
        };
        if first.text != "#" {
            continue;
        }

        let rest = &line.tokens[1..];
        let Some(keyword) = rest.first() else {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(first.line),
                command: "#".into(),
            });
        };

        if keyword.text != "define" {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(first.line),
                command: keyword.text.clone(),
            });
        }

        let Some(name_tok) = rest.get(1) else {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(first.line),
                command: "define".into(),
            });
        };
        if !is_upper_name(&name_tok.text) {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(name_tok.line),
                command: format!("define {}", name_tok.text),
            });
        }
        let name = name_tok.text.clone();

        if table.defs.contains_key(&name) {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(name_tok.line),
                command: format!("define {name} (already defined)"),
            });
        }

        let body: Vec<Token> = rest[2..].to_vec();
        if body.is_empty() {
            return Err(CompileError::InvalidPreprocessorCommand {
                span: Span::new(name_tok.line),
                command: format!("define {name} (empty body)"),
            });
        }

        for referenced in referenced_macros(&body) {
            if referenced == name || reaches(referenced, &name, &table.defs) {
                return Err(CompileError::InvalidPreprocessorCommand {
                    span: Span::new(name_tok.line),
                    command: format!("define {name} (recursive via {referenced})"),
                });
            }
        }

        debug!("recorded macro {name} ({} tokens)", body.len());
        table.defs.insert(name, body);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pimoc_lex::{Lexer, StringInterner};

    fn lex(src: &str) -> Vec<LineTokens> {
        let (rewritten, interner) = StringInterner::rewrite(src).unwrap();
        Lexer::new(&interner).lex(&rewritten).unwrap()
    }

    #[test]
    fn records_a_simple_define() {
        let table = collect(&lex("# define FORTY_TWO 42\n")).unwrap();
        assert_eq!(table.get("FORTY_TWO").unwrap()[0].text, "42");
    }

    #[test]
    fn rejects_empty_body() {
        let err = collect(&lex("# define EMPTY\n")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }

    #[test]
    fn rejects_lowercase_name() {
        let err = collect(&lex("# define lower 1\n")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }

    #[test]
    fn rejects_redefinition() {
        let err = collect(&lex("# define A 1\n# define A 2\n")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }

    #[test]
    fn rejects_self_reference() {
        let err = collect(&lex("# define A §A\n")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }

    #[test]
    fn rejects_mutual_recursion() {
        let src = "# define A §B\n# define B §A\n";
        let err = collect(&lex(src)).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }

    #[test]
    fn unsupported_directive_is_rejected() {
        let err = collect(&lex("# mem 4\n")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPreprocessorCommand { .. }));
    }
}
