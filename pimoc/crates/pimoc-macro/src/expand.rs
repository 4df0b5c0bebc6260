//! Expansion pass (spec §4.4).
//!
//! Walks the block tree produced by `pimoc-par`, replacing every `macro`
//! kind token with its recorded body in place, until no `macro` token
//! remains. Termination is guaranteed because the directive pass already
//! rejects recursive macro definitions (spec §11 Open Question 1).

use log::trace;

use pimoc_par::{BlockId, BlockTree, Element, TokenNode};
use pimoc_lex::TokenKind;
use pimoc_util::{CompileError, Span};

use crate::directive::MacroTable;

/// Expands every macro token in `tree` to a fixpoint.
pub fn expand(tree: &mut BlockTree, table: &MacroTable) -> Result<(), CompileError> {
    if table.is_empty() {
        return Ok(());
    }
    let mut rounds = 0;
    loop {
        let changed = expand_block(tree, tree.root(), table)?;
        rounds += 1;
        if !changed {
            break;
        }
    }
    trace!("macro expansion converged after {rounds} rounds");
    Ok(())
}

fn expand_block(tree: &mut BlockTree, id: BlockId, table: &MacroTable) -> Result<bool, CompileError> {
    let mut changed = false;
    let mut i = 0;
    loop {
        let len = tree.get(id).elements.len();
        if i >= len {
            break;
        }
        let is_macro = matches!(
            &tree.get(id).elements[i],
            Element::Token(t) if t.token.kind == TokenKind::Macro
        );
        if is_macro {
            let (name, line) = match &tree.get(id).elements[i] {
                Element::Token(t) => (t.token.text.clone(), t.token.line),
                Element::Block(_) => unreachable!(),
            };
            let body = table.get(&name).ok_or_else(|| CompileError::InvalidMacro {
                span: Span::new(line),
                name: name.clone(),
            })?;
            let replacement: Vec<Element> = body
                .iter()
                .cloned()
                .map(TokenNode::new)
                .map(Element::Token)
                .collect();
            let count = replacement.len();
            tree.get_mut(id).elements.splice(i..i + 1, replacement);
            changed = true;
            i += count;
            continue;
        }
        i += 1;
    }

    let children: Vec<BlockId> = tree
        .get(id)
        .elements
        .iter()
        .filter_map(Element::as_block)
        .collect();
    for child in children {
        changed |= expand_block(tree, child, table)?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pimoc_lex::{Lexer, StringInterner};

    fn expand_source(src: &str) -> BlockTree {
        let (rewritten, interner) = StringInterner::rewrite(src).unwrap();
        let lines = Lexer::new(&interner).lex(&rewritten).unwrap();
        let table = crate::directive::collect(&lines).unwrap();
        let mut tree = pimoc_par::parse(&lines).unwrap();
        expand(&mut tree, &table).unwrap();
        tree
    }

    #[test]
    fn macro_token_is_replaced_by_its_body() {
        let tree = expand_source("# define FORTY_TWO 42\n§FORTY_TWO\n");
        let root = tree.get(tree.root());
        assert_eq!(root.elements.len(), 1);
        assert_eq!(root.elements[0].as_token().unwrap().token.text, "42");
    }

    #[test]
    fn undefined_macro_is_rejected() {
        let (rewritten, interner) = StringInterner::rewrite("§UNDEFINED\n").unwrap();
        let lines = Lexer::new(&interner).lex(&rewritten).unwrap();
        let table = crate::directive::collect(&lines).unwrap();
        let mut tree = pimoc_par::parse(&lines).unwrap();
        let err = expand(&mut tree, &table).unwrap_err();
        assert!(matches!(err, CompileError::InvalidMacro { .. }));
    }

    #[test]
    fn nested_macro_expands_inside_block() {
        let tree = expand_source("# define ONE 1\n[ §ONE §ONE ]\n");
        let root = tree.get(tree.root());
        let block_id = root.elements[0].as_block().unwrap();
        let block = tree.get(block_id);
        assert_eq!(block.elements.len(), 2);
        assert_eq!(block.elements[0].as_token().unwrap().token.text, "1");
    }

    fn count_macro_tokens(tree: &BlockTree, id: BlockId) -> usize {
        tree.get(id)
            .elements
            .iter()
            .map(|e| match e {
                Element::Token(t) if t.token.kind == TokenKind::Macro => 1,
                Element::Block(b) => count_macro_tokens(tree, *b),
                _ => 0,
            })
            .sum()
    }

    /// Invariant 3 (spec §8): for acyclic definitions, the macro-token count
    /// reaches zero regardless of how many invocations a block holds.
    #[quickcheck_macros::quickcheck]
    fn macro_expansion_count_reaches_zero(repeats: u8) -> bool {
        let repeats = (repeats % 20) + 1;
        let body = vec!["§ONE"; repeats as usize].join(" ");
        let src = format!("# define ONE 1\n[ {body} ]\n");
        let tree = expand_source(&src);
        count_macro_tokens(&tree, tree.root()) == 0
    }
}
