//! Two-pass block parser (spec §4.3).
//!
//! Grounded on the teacher's `Parser` shape (a cursor plus a `Vec<Token>`,
//! `Option`-returning handlers that the driver loop matches against) but
//! reworked around the fail-fast `Result<_, CompileError>` model rather than
//! an accumulating `Handler`, and around a tree of `Block`s instead of a
//! recursive-descent AST.

use log::trace;

use pimoc_lex::{LineTokens, Token, TokenKind};
use pimoc_util::{CompileError, Span};

use crate::block::{Block, BlockId, BlockKind, BlockTree, Element, TokenNode};

/// Runs both passes over a lexer's output and returns the finished tree.
pub fn parse(lines: &[LineTokens]) -> Result<BlockTree, CompileError> {
    let mut tree = fold_brackets(lines)?;
    post_process(&mut tree, tree.root())?;
    Ok(tree)
}

/// Pass 1: a single cursor over every non-directive line, pushing a child
/// block on every open delimiter and popping on the matching close.
fn fold_brackets(lines: &[LineTokens]) -> Result<BlockTree, CompileError> {
    let mut tree = BlockTree::new();
    let mut stack: Vec<BlockId> = vec![tree.root()];

    for line in lines {
        if is_directive_line(line) {
            continue;
        }
        for token in &line.tokens {
            let current = *stack.last().expect("root is never popped");
            match open_kind(token) {
                Some(kind) => {
                    let block = Block::new(kind, Some(current), Some(token.clone()));
                    let id = tree.push(block);
                    tree.get_mut(current)
                        .elements
                        .push(Element::Block(id));
                    stack.push(id);
                }
                None if is_close(token) => {
                    if stack.len() == 1 {
                        return Err(CompileError::BlockDelimitation {
                            span: Span::new(token.line),
                            detail: format!("unmatched closing '{}'", token.text),
                        });
                    }
                    let closed = stack.pop().unwrap();
                    let expected = close_for(tree.get(closed).kind);
                    if token.text != expected {
                        return Err(CompileError::BlockDelimitation {
                            span: Span::new(token.line),
                            detail: format!(
                                "expected closing '{expected}' but found '{}'",
                                token.text
                            ),
                        });
                    }
                }
                None => {
                    tree.get_mut(current)
                        .elements
                        .push(Element::Token(TokenNode::new(token.clone())));
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(CompileError::BlockDelimitation {
            span: Span::DUMMY,
            detail: "unterminated block at end of file".into(),
        });
    }

    trace!("bracket folding produced {} blocks", tree.len());
    Ok(tree)
}

fn is_directive_line(line: &LineTokens) -> bool {
    line.tokens
        .first()
        .map(|t| t.kind == TokenKind::PpCommand || t.text == "#")
        .unwrap_or(false)
}

fn open_kind(token: &Token) -> Option<BlockKind> {
    match token.text.as_str() {
        "[" => Some(BlockKind::Stack),
        "{" => Some(BlockKind::Segment),
        "(" => Some(BlockKind::Options),
        _ => None,
    }
}

fn is_close(token: &Token) -> bool {
    matches!(token.text.as_str(), "]" | "}" | ")")
}

fn close_for(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Stack => "]",
        BlockKind::Segment => "}",
        BlockKind::Options => ")",
        BlockKind::Root => unreachable!("root block is never pushed onto the close stack"),
    }
}

/// Pass 2: idempotent post-processing, applied recursively, repeated per
/// block until a full scan makes no change.
fn post_process(tree: &mut BlockTree, id: BlockId) -> Result<(), CompileError> {
    loop {
        let mut changed = false;
        changed |= collapse_dotted_names(tree, id)?;
        changed |= attach_type_suffixes(tree, id)?;
        changed |= attach_options(tree, id)?;
        if !changed {
            break;
        }
    }

    let children: Vec<BlockId> = tree
        .get(id)
        .elements
        .iter()
        .filter_map(Element::as_block)
        .collect();
    for child in children {
        post_process(tree, child)?;
    }
    Ok(())
}

fn dotted_name(text: &str) -> bool {
    text == "^" || text.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
}

/// Collapses `name . name`, `name . ^`, `^ . name` into one dotted name.
fn collapse_dotted_names(tree: &mut BlockTree, id: BlockId) -> Result<bool, CompileError> {
    let elements = &mut tree.get_mut(id).elements;
    let mut i = 0;
    let mut changed = false;
    while i + 2 < elements.len() {
        let matches = match (&elements[i], &elements[i + 1], &elements[i + 2]) {
            (Element::Token(a), Element::Token(op), Element::Token(b)) => {
                op.token.text == "."
                    && dotted_name(&a.token.text)
                    && dotted_name(&b.token.text)
            }
            _ => false,
        };
        if matches {
            let a = elements[i].as_token().unwrap().clone();
            let b = elements[i + 2].as_token().unwrap().clone();
            let mut merged = a.token.clone();
            merged.text = format!("{}.{}", a.token.text, b.token.text);
            elements.splice(i..i + 3, [Element::Token(TokenNode::new(merged))]);
            changed = true;
        } else {
            i += 1;
        }
    }
    Ok(changed)
}

/// Attaches `name : type` suffixes directly on the block-parser level (the
/// lexer already handles the common case via rule 11; this additionally
/// covers names produced by dotted-name collapsing in the same pass).
fn attach_type_suffixes(tree: &mut BlockTree, id: BlockId) -> Result<bool, CompileError> {
    let elements = &mut tree.get_mut(id).elements;
    let mut i = 0;
    let mut changed = false;
    while i + 2 < elements.len() {
        let matches = match (&elements[i], &elements[i + 1], &elements[i + 2]) {
            (Element::Token(name), Element::Token(colon), Element::Token(ty)) => {
                colon.token.text == ":"
                    && name.token.ty.is_none()
                    && matches!(name.token.kind, TokenKind::Name | TokenKind::Integer | TokenKind::Decimal)
                    && ty.token.kind == TokenKind::Type
            }
            _ => false,
        };
        if matches {
            let ty_text = elements[i + 2].as_token().unwrap().token.text.clone();
            if let Element::Token(name) = &mut elements[i] {
                name.token.ty = Some(ty_text);
            }
            elements.splice(i + 1..i + 3, []);
            changed = true;
        } else {
            i += 1;
        }
    }
    Ok(changed)
}

/// Attaches an `options` block immediately following a `name` token.
fn attach_options(tree: &mut BlockTree, id: BlockId) -> Result<bool, CompileError> {
    let len = tree.get(id).elements.len();
    let mut changed = false;
    let mut i = 0;
    while i + 1 < len.min(tree.get(id).elements.len()) {
        let candidate = match (&tree.get(id).elements[i], &tree.get(id).elements[i + 1]) {
            (Element::Token(name), Element::Block(block_id))
                if name.token.kind == TokenKind::Name && name.options.is_none() =>
            {
                Some(*block_id)
            }
            _ => None,
        };
        let attach = candidate.filter(|block_id| tree.get(*block_id).kind == BlockKind::Options);
        if let Some(block_id) = attach {
            let elements = &mut tree.get_mut(id).elements;
            if let Element::Token(name) = &mut elements[i] {
                name.options = Some(block_id);
            }
            elements.remove(i + 1);
            changed = true;
        } else {
            i += 1;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pimoc_lex::{Lexer, StringInterner};

    fn parse_source(src: &str) -> BlockTree {
        let (rewritten, interner) = StringInterner::rewrite(src).unwrap();
        let lines = Lexer::new(&interner).lex(&rewritten).unwrap();
        parse(&lines).unwrap()
    }

    #[test]
    fn stack_block_folds_into_a_child() {
        let tree = parse_source("[ 1 2 + ]\n");
        let root = tree.get(tree.root());
        assert_eq!(root.elements.len(), 1);
        let block_id = root.elements[0].as_block().unwrap();
        assert_eq!(tree.get(block_id).kind, BlockKind::Stack);
        assert_eq!(tree.get(block_id).elements.len(), 3);
    }

    #[test]
    fn mismatched_close_is_rejected() {
        let (rewritten, interner) = StringInterner::rewrite("[ 1 }\n").unwrap();
        let lines = Lexer::new(&interner).lex(&rewritten).unwrap();
        let err = parse(&lines).unwrap_err();
        assert!(matches!(err, CompileError::BlockDelimitation { .. }));
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let (rewritten, interner) = StringInterner::rewrite("{ 1 2\n").unwrap();
        let lines = Lexer::new(&interner).lex(&rewritten).unwrap();
        let err = parse(&lines).unwrap_err();
        assert!(matches!(err, CompileError::BlockDelimitation { .. }));
    }

    #[test]
    fn dotted_name_segments_collapse() {
        let tree = parse_source("a . b\n");
        let root = tree.get(tree.root());
        assert_eq!(root.elements.len(), 1);
        assert_eq!(root.elements[0].as_token().unwrap().token.text, "a.b");
    }

    #[test]
    fn options_block_attaches_to_preceding_name() {
        let tree = parse_source("foo ( 1 2 )\n");
        let root = tree.get(tree.root());
        assert_eq!(root.elements.len(), 1);
        let name = root.elements[0].as_token().unwrap();
        assert_eq!(name.token.text, "foo");
        assert!(name.options.is_some());
    }

    #[test]
    fn directive_lines_are_skipped_by_bracket_folding() {
        let tree = parse_source("# define FOO 1\n1\n");
        let root = tree.get(tree.root());
        assert_eq!(root.elements.len(), 1);
    }
}
