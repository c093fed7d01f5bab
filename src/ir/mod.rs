//! Register-based intermediate representation of method bodies.
//!
//! The desugaring engine reads application code in this form and emits every synthesized body
//! (wrapper forwarding methods, conversion stubs, callbacks, dispatch holders) in it as well.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Code                                                     │
//! │  values: [Value { ty }]           indexed by ValueId     │
//! │  blocks: [BasicBlock]             indexed by BlockId     │
//! │     ├── instructions: [Instruction]  (last = terminator) │
//! │     └── catch_handlers: [CatchHandler]                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Catch handlers are attached per block, so every throwing instruction in a block shares the
//! same handlers. Inserting a throwing instruction into a protected block therefore requires
//! splitting; see [`Code::isolate_throwing_range`].
//!
//! # Key Types
//!
//! - [`Code`] - A method body
//! - [`Instruction`] / [`Invoke`] - The instruction set
//! - [`CodeBuilder`] - Fluent construction of synthesized bodies

mod builder;
mod code;
mod instruction;

pub use builder::CodeBuilder;
pub use code::{BasicBlock, CatchHandler, Code, Value};
pub use instruction::{BlockId, IfKind, Instruction, Invoke, InvokeKind, ValueId};
