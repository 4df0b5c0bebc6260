//! Control-flow scaffolding kept only during emission of a single construct
//! (spec §3 "Context", §4.6).

use inkwell::basic_block::BasicBlock;

/// Blocks live only while `if`/`elif`/`else` is being emitted (spec §4.6).
pub struct IfContext<'ctx> {
    pub final_block: BasicBlock<'ctx>,
    pub if_block: BasicBlock<'ctx>,
    pub else_block: BasicBlock<'ctx>,
    pub elif_blocks: Vec<BasicBlock<'ctx>>,
    /// Branch fan-out points between sibling `elif`s.
    pub interm_blocks: Vec<BasicBlock<'ctx>>,
}

/// Blocks live only while `while` is being emitted (spec §4.6).
pub struct WhileContext<'ctx> {
    pub while_block: BasicBlock<'ctx>,
    pub final_block: BasicBlock<'ctx>,
}
