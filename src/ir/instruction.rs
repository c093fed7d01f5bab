//! Instructions of the register IR.
//!
//! The instruction set is deliberately small: it covers the operations the desugaring engine
//! inspects (invokes) and the operations it synthesizes (conversion stubs, wrappers, dispatch
//! holders). Everything else a front end produces is carried as [`Instruction::Other`], which
//! keeps its operands visible so that use-replacement and type rewriting stay correct.
//!
//! # Control Flow
//!
//! Blocks have no implicit fall-through. Every block ends in [`Instruction::Goto`],
//! [`Instruction::If`] (with both successors explicit), [`Instruction::Return`] or
//! [`Instruction::Throw`].

use std::fmt;

use crate::metadata::types::{FieldRef, MethodRef, TypeRef};

/// Identifier of a value (virtual register) inside one [`crate::ir::Code`].
///
/// # Examples
///
/// ```rust
/// use vivify::ir::ValueId;
///
/// let id = ValueId::new(3);
/// assert_eq!(id.index(), 3);
/// assert_eq!(id.to_string(), "v3");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

impl ValueId {
    /// Creates a new value identifier.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index into the value table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a basic block. Equal to the block's index in [`crate::ir::Code::blocks`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a new block identifier.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index into the block list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Dispatch kind of an invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum InvokeKind {
    /// `invokestatic`
    #[strum(serialize = "invoke-static")]
    Static,
    /// `invokevirtual`
    #[strum(serialize = "invoke-virtual")]
    Virtual,
    /// `invokeinterface`
    #[strum(serialize = "invoke-interface")]
    Interface,
    /// `invokespecial` on a superclass method
    #[strum(serialize = "invoke-super")]
    Super,
    /// `invokespecial` on a private method or constructor
    #[strum(serialize = "invoke-direct")]
    Direct,
}

impl InvokeKind {
    /// True for every kind that passes a receiver as the first argument.
    #[must_use]
    pub fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }
}

/// A method invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Invoke {
    /// Dispatch kind
    pub kind: InvokeKind,
    /// The symbolic method reference
    pub method: MethodRef,
    /// Arguments, receiver first for non-static kinds
    pub args: Vec<ValueId>,
    /// Result value, `None` for `void` methods or unused results that were never materialized
    pub dest: Option<ValueId>,
    /// True if the reference is an interface method reference
    pub interface: bool,
}

impl Invoke {
    /// Creates a new invoke.
    pub fn new(
        kind: InvokeKind,
        method: MethodRef,
        args: Vec<ValueId>,
        dest: Option<ValueId>,
        interface: bool,
    ) -> Self {
        Invoke {
            kind,
            method,
            args,
            dest,
            interface,
        }
    }

    /// Shorthand for a static, non-interface invoke.
    pub fn new_static(method: MethodRef, args: Vec<ValueId>, dest: Option<ValueId>) -> Self {
        Invoke::new(InvokeKind::Static, method, args, dest, false)
    }

    /// True for `invoke-super`.
    #[must_use]
    pub fn is_super(&self) -> bool {
        self.kind == InvokeKind::Super
    }

    /// True for `invoke-static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.kind == InvokeKind::Static
    }

    /// The arguments without the receiver.
    #[must_use]
    pub fn non_receiver_args(&self) -> &[ValueId] {
        if self.kind.has_receiver() {
            self.args.get(1..).unwrap_or(&[])
        } else {
            &self.args
        }
    }
}

/// Condition of an [`Instruction::If`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum IfKind {
    /// Branch if the value is zero / null
    #[strum(serialize = "if-eqz")]
    Eqz,
    /// Branch if the value is non-zero / non-null
    #[strum(serialize = "if-nez")]
    Nez,
}

/// A single IR instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Loads the `index`-th incoming argument (receiver is argument 0).
    Argument {
        /// Destination value
        dest: ValueId,
        /// Argument position
        index: usize,
    },
    /// Loads `null`.
    ConstNull {
        /// Destination value
        dest: ValueId,
    },
    /// Loads a string constant.
    ConstString {
        /// Destination value
        dest: ValueId,
        /// The string literal
        value: String,
    },
    /// Allocates an uninitialized instance.
    NewInstance {
        /// Destination value
        dest: ValueId,
        /// The instantiated class
        ty: TypeRef,
    },
    /// Checked cast.
    CheckCast {
        /// Destination value
        dest: ValueId,
        /// The value being cast
        value: ValueId,
        /// The target type
        ty: TypeRef,
    },
    /// Type test producing a boolean.
    InstanceOf {
        /// Destination value
        dest: ValueId,
        /// The value being tested
        value: ValueId,
        /// The tested type
        ty: TypeRef,
    },
    /// Instance field read.
    InstanceGet {
        /// Destination value
        dest: ValueId,
        /// The object read from
        object: ValueId,
        /// The field
        field: FieldRef,
    },
    /// Instance field write.
    InstancePut {
        /// The object written to
        object: ValueId,
        /// The stored value
        value: ValueId,
        /// The field
        field: FieldRef,
    },
    /// Method invocation.
    Invoke(Invoke),
    /// Any instruction the engine does not need to understand.
    Other {
        /// Mnemonic, for display only
        mnemonic: String,
        /// Optional result value
        dest: Option<ValueId>,
        /// Operand values
        operands: Vec<ValueId>,
        /// Whether the instruction may throw
        can_throw: bool,
    },
    /// Two-way conditional branch.
    If {
        /// The branch condition
        kind: IfKind,
        /// The tested value
        value: ValueId,
        /// Successor when the condition holds
        then_block: BlockId,
        /// Successor otherwise
        else_block: BlockId,
    },
    /// Unconditional branch.
    Goto {
        /// Successor block
        target: BlockId,
    },
    /// Method return.
    Return {
        /// Returned value, `None` for `void`
        value: Option<ValueId>,
    },
    /// Throws the given exception.
    Throw {
        /// The thrown value
        value: ValueId,
    },
}

impl Instruction {
    /// The value defined by this instruction, if any.
    #[must_use]
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Instruction::Argument { dest, .. }
            | Instruction::ConstNull { dest }
            | Instruction::ConstString { dest, .. }
            | Instruction::NewInstance { dest, .. }
            | Instruction::CheckCast { dest, .. }
            | Instruction::InstanceOf { dest, .. }
            | Instruction::InstanceGet { dest, .. } => Some(*dest),
            Instruction::Invoke(invoke) => invoke.dest,
            Instruction::Other { dest, .. } => *dest,
            _ => None,
        }
    }

    /// All values read by this instruction.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Instruction::CheckCast { value, .. }
            | Instruction::InstanceOf { value, .. }
            | Instruction::If { value, .. }
            | Instruction::Throw { value } => vec![*value],
            Instruction::InstanceGet { object, .. } => vec![*object],
            Instruction::InstancePut { object, value, .. } => vec![*object, *value],
            Instruction::Invoke(invoke) => invoke.args.clone(),
            Instruction::Other { operands, .. } => operands.clone(),
            Instruction::Return { value } => value.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable access to all values read by this instruction.
    pub fn operands_mut(&mut self) -> Vec<&mut ValueId> {
        match self {
            Instruction::CheckCast { value, .. }
            | Instruction::InstanceOf { value, .. }
            | Instruction::If { value, .. }
            | Instruction::Throw { value } => vec![value],
            Instruction::InstanceGet { object, .. } => vec![object],
            Instruction::InstancePut { object, value, .. } => vec![object, value],
            Instruction::Invoke(invoke) => invoke.args.iter_mut().collect(),
            Instruction::Other { operands, .. } => operands.iter_mut().collect(),
            Instruction::Return { value } => value.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// True if this instruction may raise an exception.
    #[must_use]
    pub fn can_throw(&self) -> bool {
        match self {
            Instruction::NewInstance { .. }
            | Instruction::CheckCast { .. }
            | Instruction::InstanceGet { .. }
            | Instruction::InstancePut { .. }
            | Instruction::Invoke(_)
            | Instruction::Throw { .. } => true,
            Instruction::Other { can_throw, .. } => *can_throw,
            _ => false,
        }
    }

    /// True for instructions that end a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::If { .. }
                | Instruction::Goto { .. }
                | Instruction::Return { .. }
                | Instruction::Throw { .. }
        )
    }

    /// Successor blocks named by this instruction.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::If {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Instruction::Goto { target } => vec![*target],
            _ => Vec::new(),
        }
    }

    /// Returns the invoke if this is one.
    #[must_use]
    pub fn as_invoke(&self) -> Option<&Invoke> {
        match self {
            Instruction::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    /// Visits every type referenced by this instruction.
    pub fn for_each_type(&self, mut f: impl FnMut(&TypeRef)) {
        match self {
            Instruction::NewInstance { ty, .. }
            | Instruction::CheckCast { ty, .. }
            | Instruction::InstanceOf { ty, .. } => f(ty),
            Instruction::InstanceGet { field, .. } | Instruction::InstancePut { field, .. } => {
                f(&field.holder);
                f(&field.ty);
            }
            Instruction::Invoke(invoke) => {
                f(&invoke.method.holder);
                invoke.method.proto.types().for_each(f);
            }
            _ => {}
        }
    }

    /// Rewrites every type referenced by this instruction.
    pub fn map_types(&mut self, f: &impl Fn(&TypeRef) -> TypeRef) {
        match self {
            Instruction::NewInstance { ty, .. }
            | Instruction::CheckCast { ty, .. }
            | Instruction::InstanceOf { ty, .. } => *ty = f(ty),
            Instruction::InstanceGet { field, .. } | Instruction::InstancePut { field, .. } => {
                *field = FieldRef::new(f(&field.holder), &field.name, f(&field.ty));
            }
            Instruction::Invoke(invoke) => {
                let method = &invoke.method;
                invoke.method =
                    MethodRef::new(f(&method.holder), &method.name, method.proto.map_types(f));
            }
            _ => {}
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.dest() {
            write!(f, "{dest} = ")?;
        }
        match self {
            Instruction::Argument { index, .. } => write!(f, "argument {index}"),
            Instruction::ConstNull { .. } => write!(f, "const-null"),
            Instruction::ConstString { value, .. } => write!(f, "const-string {value:?}"),
            Instruction::NewInstance { ty, .. } => write!(f, "new-instance {ty}"),
            Instruction::CheckCast { value, ty, .. } => write!(f, "check-cast {value}, {ty}"),
            Instruction::InstanceOf { value, ty, .. } => write!(f, "instance-of {value}, {ty}"),
            Instruction::InstanceGet { object, field, .. } => write!(f, "iget {object}, {field}"),
            Instruction::InstancePut {
                object,
                value,
                field,
            } => write!(f, "iput {value}, {object}, {field}"),
            Instruction::Invoke(invoke) => {
                write!(f, "{} {}", invoke.kind, invoke.method)?;
                for arg in &invoke.args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Instruction::Other {
                mnemonic, operands, ..
            } => {
                write!(f, "{mnemonic}")?;
                for operand in operands {
                    write!(f, " {operand}")?;
                }
                Ok(())
            }
            Instruction::If {
                kind,
                value,
                then_block,
                else_block,
            } => write!(f, "{kind} {value} ? {then_block} : {else_block}"),
            Instruction::Goto { target } => write!(f, "goto {target}"),
            Instruction::Return { value: Some(value) } => write!(f, "return {value}"),
            Instruction::Return { value: None } => write!(f, "return-void"),
            Instruction::Throw { value } => write!(f, "throw {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::Proto;

    fn method() -> MethodRef {
        MethodRef::new(
            TypeRef::new("java.util.function.Consumer"),
            "accept",
            Proto::new(TypeRef::void(), vec![TypeRef::object()]),
        )
    }

    #[test]
    fn invoke_receiver_handling() {
        let invoke = Invoke::new(
            InvokeKind::Interface,
            method(),
            vec![ValueId::new(0), ValueId::new(1)],
            None,
            true,
        );
        assert_eq!(invoke.non_receiver_args(), &[ValueId::new(1)]);

        let invoke = Invoke::new_static(method(), vec![ValueId::new(4)], None);
        assert_eq!(invoke.non_receiver_args(), &[ValueId::new(4)]);
    }

    #[test]
    fn operands_and_dest() {
        let put = Instruction::InstancePut {
            object: ValueId::new(0),
            value: ValueId::new(1),
            field: FieldRef::new(TypeRef::new("a.W"), "wrappedValue", TypeRef::object()),
        };
        assert_eq!(put.dest(), None);
        assert_eq!(put.operands(), vec![ValueId::new(0), ValueId::new(1)]);
        assert!(put.can_throw());
        assert!(!put.is_terminator());
    }

    #[test]
    fn map_types_rewrites_invoke() {
        let mut insn = Instruction::Invoke(Invoke::new_static(method(), vec![], None));
        insn.map_types(&|ty| {
            if ty.name().starts_with("java.util.function.") {
                TypeRef::new(ty.name().replace("java.util.function.", "j$.util.function."))
            } else {
                ty.clone()
            }
        });
        let invoke = insn.as_invoke().expect("invoke");
        assert_eq!(invoke.method.holder.name(), "j$.util.function.Consumer");
    }

    #[test]
    fn display() {
        let insn = Instruction::If {
            kind: IfKind::Eqz,
            value: ValueId::new(2),
            then_block: BlockId::new(1),
            else_block: BlockId::new(2),
        };
        assert_eq!(insn.to_string(), "if-eqz v2 ? B1 : B2");
        assert_eq!(
            Instruction::Return { value: None }.to_string(),
            "return-void"
        );
    }
}
