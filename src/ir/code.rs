//! Method bodies: basic blocks, catch handlers and the value table.

use std::fmt;

use crate::{
    ir::instruction::{BlockId, Instruction, Invoke, ValueId},
    metadata::types::TypeRef,
};

/// Type information of one value.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    /// The static type of the value
    pub ty: TypeRef,
}

/// An exception handler attached to a block.
#[derive(Clone, Debug, PartialEq)]
pub struct CatchHandler {
    /// Caught exception type, `None` for catch-all
    pub guard: Option<TypeRef>,
    /// Handler entry block
    pub target: BlockId,
}

/// A straight-line instruction sequence with a single entry.
///
/// All throwing instructions in a block are covered by the same catch handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    /// Block identifier, equal to the index in [`Code::blocks`]
    pub id: BlockId,
    /// Instructions, the last one being a terminator
    pub instructions: Vec<Instruction>,
    /// Handlers protecting every throwing instruction of this block
    pub catch_handlers: Vec<CatchHandler>,
}

impl BasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            instructions: Vec::new(),
            catch_handlers: Vec::new(),
        }
    }

    /// True if the block is inside a protected region.
    #[must_use]
    pub fn has_catch_handlers(&self) -> bool {
        !self.catch_handlers.is_empty()
    }
}

/// The body of a method.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Code {
    /// Basic blocks, entry block first
    pub blocks: Vec<BasicBlock>,
    /// Value table indexed by [`ValueId`]
    pub values: Vec<Value>,
}

impl Code {
    /// Creates a body with a single empty entry block.
    #[must_use]
    pub fn new() -> Self {
        Code {
            blocks: vec![BasicBlock::new(BlockId::new(0))],
            values: Vec::new(),
        }
    }

    /// Allocates a fresh value of the given type.
    pub fn new_value(&mut self, ty: TypeRef) -> ValueId {
        self.values.push(Value { ty });
        ValueId::new(self.values.len() - 1)
    }

    /// The static type of a value.
    #[must_use]
    pub fn value_type(&self, value: ValueId) -> Option<&TypeRef> {
        self.values.get(value.index()).map(|v| &v.ty)
    }

    /// Changes the static type of a value.
    pub fn set_value_type(&mut self, value: ValueId, ty: TypeRef) {
        if let Some(entry) = self.values.get_mut(value.index()) {
            entry.ty = ty;
        }
    }

    /// Appends a new empty block with the given handlers.
    pub fn new_block(&mut self, catch_handlers: Vec<CatchHandler>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        let mut block = BasicBlock::new(id);
        block.catch_handlers = catch_handlers;
        self.blocks.push(block);
        id
    }

    /// Returns a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Iterates all instructions in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Iterates all invokes in block order.
    pub fn invokes(&self) -> impl Iterator<Item = &Invoke> {
        self.instructions().filter_map(Instruction::as_invoke)
    }

    /// Number of instructions reading `value`.
    #[must_use]
    pub fn users_of(&self, value: ValueId) -> usize {
        self.instructions()
            .filter(|insn| insn.operands().contains(&value))
            .count()
    }

    /// Replaces every read of `old` with `new`.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        for block in &mut self.blocks {
            for insn in &mut block.instructions {
                for operand in insn.operands_mut() {
                    if *operand == old {
                        *operand = new;
                    }
                }
            }
        }
    }

    /// Moves `instructions[index..]` of `block` into a new block carrying the same handlers and
    /// terminates `block` with a goto to it.
    ///
    /// Returns the id of the new block.
    pub fn split_block(&mut self, block: BlockId, index: usize) -> BlockId {
        let Some(source) = self.blocks.get_mut(block.index()) else {
            return block;
        };
        let index = index.min(source.instructions.len());
        let tail = source.instructions.split_off(index);
        let handlers = source.catch_handlers.clone();
        let new_id = self.new_block(handlers);
        if let Some(new_block) = self.blocks.get_mut(new_id.index()) {
            new_block.instructions = tail;
        }
        if let Some(source) = self.blocks.get_mut(block.index()) {
            source
                .instructions
                .push(Instruction::Goto { target: new_id });
        }
        new_id
    }

    /// Splits the instructions `[start, end)` of `block` so that every throwing instruction of
    /// the range ends up in a block of its own, each keeping the original catch handlers.
    ///
    /// Returns the block holding the first instruction following the range.
    pub fn isolate_throwing_range(&mut self, block: BlockId, start: usize, end: usize) -> BlockId {
        let mut current = block;
        let mut cursor = start;
        let mut remaining = end.saturating_sub(start);

        if cursor > 0 {
            current = self.split_block(current, cursor);
            cursor = 0;
        }

        while remaining > 0 {
            let throws = self
                .block(current)
                .and_then(|b| b.instructions.get(cursor))
                .is_some_and(Instruction::can_throw);
            cursor += 1;
            remaining -= 1;
            if throws {
                current = self.split_block(current, cursor);
                cursor = 0;
            }
        }

        if cursor > 0 {
            current = self.split_block(current, cursor);
        }
        current
    }

    /// Visits every type referenced by the body.
    pub fn for_each_type(&self, mut f: impl FnMut(&TypeRef)) {
        for value in &self.values {
            f(&value.ty);
        }
        for block in &self.blocks {
            for handler in &block.catch_handlers {
                if let Some(guard) = &handler.guard {
                    f(guard);
                }
            }
            for insn in &block.instructions {
                insn.for_each_type(&mut f);
            }
        }
    }

    /// Rewrites every type referenced by the body.
    pub fn map_types(&mut self, f: &impl Fn(&TypeRef) -> TypeRef) {
        for value in &mut self.values {
            value.ty = f(&value.ty);
        }
        for block in &mut self.blocks {
            for handler in &mut block.catch_handlers {
                if let Some(guard) = &handler.guard {
                    handler.guard = Some(f(guard));
                }
            }
            for insn in &mut block.instructions {
                insn.map_types(f);
            }
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{}:", block.id)?;
            for handler in &block.catch_handlers {
                match &handler.guard {
                    Some(guard) => write!(f, " catch({guard}) -> {}", handler.target)?,
                    None => write!(f, " catch-all -> {}", handler.target)?,
                }
            }
            writeln!(f)?;
            for insn in &block.instructions {
                writeln!(f, "  {insn}")?;
            }
        }
        Ok(())
    }
}
