//! Fluent builder for synthesized method bodies.
//!
//! [`CodeBuilder`] keeps a cursor on the block being filled. Every emitting method appends to
//! that block and returns the defined value, so bodies read top to bottom like the bytecode they
//! produce.
//!
//! # Example
//!
//! ```rust
//! use vivify::ir::{CodeBuilder, InvokeKind};
//! use vivify::metadata::types::{MethodRef, Proto, TypeRef};
//!
//! let convert = MethodRef::new(
//!     TypeRef::new("Wrapper"),
//!     "convert",
//!     Proto::new(TypeRef::object(), vec![TypeRef::object()]),
//! );
//!
//! let mut builder = CodeBuilder::new();
//! let arg = builder.argument(TypeRef::object());
//! let result = builder.invoke(InvokeKind::Static, convert, vec![arg], false);
//! builder.return_value(result);
//! let code = builder.build();
//! assert_eq!(code.blocks.len(), 1);
//! ```

use crate::{
    ir::{
        code::Code,
        instruction::{BlockId, IfKind, Instruction, Invoke, InvokeKind, ValueId},
    },
    metadata::types::{FieldRef, MethodRef, TypeRef},
};

/// Builds a [`Code`] block by block.
pub struct CodeBuilder {
    code: Code,
    current: BlockId,
    arguments: usize,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    /// Creates a builder positioned on a fresh entry block.
    #[must_use]
    pub fn new() -> Self {
        CodeBuilder {
            code: Code::new(),
            current: BlockId::new(0),
            arguments: 0,
        }
    }

    fn emit(&mut self, insn: Instruction) {
        if let Some(block) = self.code.blocks.get_mut(self.current.index()) {
            block.instructions.push(insn);
        }
    }

    /// Declares the next incoming argument.
    pub fn argument(&mut self, ty: TypeRef) -> ValueId {
        let dest = self.code.new_value(ty);
        let index = self.arguments;
        self.arguments += 1;
        self.emit(Instruction::Argument { dest, index });
        dest
    }

    /// Declares one argument per type, in order.
    pub fn arguments<'a>(&mut self, types: impl IntoIterator<Item = &'a TypeRef>) -> Vec<ValueId> {
        types.into_iter().map(|ty| self.argument(ty.clone())).collect()
    }

    /// `const-null` typed as `ty`.
    pub fn const_null(&mut self, ty: TypeRef) -> ValueId {
        let dest = self.code.new_value(ty);
        self.emit(Instruction::ConstNull { dest });
        dest
    }

    /// `const-string`.
    pub fn const_string(&mut self, value: impl Into<String>) -> ValueId {
        let dest = self.code.new_value(TypeRef::new(crate::metadata::types::STRING_TYPE));
        self.emit(Instruction::ConstString {
            dest,
            value: value.into(),
        });
        dest
    }

    /// `new-instance`.
    pub fn new_instance(&mut self, ty: TypeRef) -> ValueId {
        let dest = self.code.new_value(ty.clone());
        self.emit(Instruction::NewInstance { dest, ty });
        dest
    }

    /// `check-cast`.
    pub fn check_cast(&mut self, value: ValueId, ty: TypeRef) -> ValueId {
        let dest = self.code.new_value(ty.clone());
        self.emit(Instruction::CheckCast { dest, value, ty });
        dest
    }

    /// `instance-of`.
    pub fn instance_of(&mut self, value: ValueId, ty: TypeRef) -> ValueId {
        let dest = self.code.new_value(TypeRef::new("boolean"));
        self.emit(Instruction::InstanceOf { dest, value, ty });
        dest
    }

    /// `iget`.
    pub fn instance_get(&mut self, object: ValueId, field: FieldRef) -> ValueId {
        let dest = self.code.new_value(field.ty.clone());
        self.emit(Instruction::InstanceGet {
            dest,
            object,
            field,
        });
        dest
    }

    /// `iput`.
    pub fn instance_put(&mut self, object: ValueId, value: ValueId, field: FieldRef) {
        self.emit(Instruction::InstancePut {
            object,
            value,
            field,
        });
    }

    /// Emits an invoke. Returns the result value for non-`void` methods.
    pub fn invoke(
        &mut self,
        kind: InvokeKind,
        method: MethodRef,
        args: Vec<ValueId>,
        interface: bool,
    ) -> Option<ValueId> {
        let dest = if method.proto.return_type.is_void() {
            None
        } else {
            Some(self.code.new_value(method.proto.return_type.clone()))
        };
        self.emit(Instruction::Invoke(Invoke::new(
            kind, method, args, dest, interface,
        )));
        dest
    }

    /// Emits a static invoke of a single-argument conversion method.
    pub fn convert(&mut self, conversion: MethodRef, value: ValueId) -> ValueId {
        match self.invoke(InvokeKind::Static, conversion, vec![value], false) {
            Some(converted) => converted,
            None => value,
        }
    }

    /// Appends a new block and returns its id without moving the cursor.
    pub fn create_block(&mut self) -> BlockId {
        self.code.new_block(Vec::new())
    }

    /// Moves the cursor to `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Ends the current block with a two-way branch. Returns `(then, else)` blocks.
    pub fn branch(&mut self, kind: IfKind, value: ValueId) -> (BlockId, BlockId) {
        let then_block = self.create_block();
        let else_block = self.create_block();
        self.emit(Instruction::If {
            kind,
            value,
            then_block,
            else_block,
        });
        (then_block, else_block)
    }

    /// Ends the current block with a goto.
    pub fn goto(&mut self, target: BlockId) {
        self.emit(Instruction::Goto { target });
    }

    /// Ends the current block with a return.
    pub fn return_value(&mut self, value: Option<ValueId>) {
        self.emit(Instruction::Return { value });
    }

    /// Ends the current block with a throw.
    pub fn throw(&mut self, value: ValueId) {
        self.emit(Instruction::Throw { value });
    }

    /// Finishes the body.
    #[must_use]
    pub fn build(self) -> Code {
        self.code
    }
}
