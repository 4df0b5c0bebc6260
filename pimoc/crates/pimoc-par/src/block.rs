//! Block tree (spec §3 "Block", §4.3).
//!
//! The lexer's flat `{line, tokens}` records are folded into a tree of
//! brace/bracket/paren-delimited blocks. Blocks are arena-indexed
//! (`pimoc_util::index_vec`) rather than linked through `Rc`/`RefCell`, the
//! same shape the teacher's own arena-backed trees use elsewhere in the
//! workspace.

use pimoc_util::define_idx;
use pimoc_util::index_vec::IndexVec;
use pimoc_lex::Token;

define_idx!(BlockId);

/// What a block's surrounding delimiters mean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// The whole file; has no opening delimiter of its own.
    Root,
    /// `[ ... ]` — an operator stack (spec §4.5.1 composite `LiteralValue`).
    Stack,
    /// `{ ... }` — a statement sequence (function/proc/if/while bodies).
    Segment,
    /// `( ... )` — a call-site argument list or parameter list.
    Options,
}

/// A token together with the `options` block attached to it by pass 2, when
/// it is immediately followed by a `(...)` block (spec §4.3's "attach an
/// `options` block ... as the name's call-site or parameter-list
/// arguments"). Kept as a pimoc-par-local wrapper rather than a field on
/// `pimoc_lex::Token` itself, so the lexer's token type stays free of
/// block-tree concerns.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenNode {
    pub token: Token,
    pub options: Option<BlockId>,
}

impl TokenNode {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            options: None,
        }
    }
}

/// A block's child: either a leaf token or a nested block.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Token(TokenNode),
    Block(BlockId),
}

impl Element {
    pub fn as_token(&self) -> Option<&TokenNode> {
        match self {
            Element::Token(t) => Some(t),
            Element::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            Element::Block(id) => Some(*id),
            Element::Token(_) => None,
        }
    }
}

/// One node of the block tree.
#[derive(Clone, Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub parent: Option<BlockId>,
    /// The opening delimiter token (`None` for the root block).
    pub start_token: Option<Token>,
    /// Stack size requested via a `N:[` sized opener; `None` means the
    /// default 128-slot allocation (spec §4.5.1).
    pub size: Option<u32>,
    pub elements: Vec<Element>,
}

impl Block {
    pub(crate) fn new(kind: BlockKind, parent: Option<BlockId>, start_token: Option<Token>) -> Self {
        let size = start_token.as_ref().and_then(|t| t.size);
        Self {
            kind,
            parent,
            start_token,
            size,
            elements: Vec::new(),
        }
    }
}

/// Arena owning every block produced by a single parse. `root()` is always
/// valid once a `BlockTree` exists.
#[derive(Clone, Debug)]
pub struct BlockTree {
    blocks: IndexVec<BlockId, Block>,
    root: BlockId,
}

impl BlockTree {
    pub(crate) fn new() -> Self {
        let mut blocks = IndexVec::new();
        let root = blocks.push(Block::new(BlockKind::Root, None, None));
        Self { blocks, root }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    pub(crate) fn push(&mut self, block: Block) -> BlockId {
        self.blocks.push(block)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
