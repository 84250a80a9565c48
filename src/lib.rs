//! RookScript — an embeddable scripting runtime.
//!
//! This crate is the runtime core of a small C-like scripting language: a
//! dynamically typed [`Value`] model, a fixed-capacity instance stack that
//! interleaves operand values with activation frames and variable scopes,
//! and a bytecode interpreter with pluggable host capabilities. Front-ends
//! (lexer, parser, assembler) produce an immutable [`Script`]; the runtime
//! only reads it, so one script can back many instances.
//!
//! # Quick start
//!
//! ```
//! use rookscript::{
//!     FunctionDescriptor, FunctionTable, Instruction, Literal, ScriptBuilder,
//!     ScriptInstance, Value,
//! };
//!
//! // A hand-assembled program: return double(4) + 1;
//! let script = ScriptBuilder::new()
//!     .entry("main", 0)
//!     .emit(Instruction::Push(Literal::Int(4)))
//!     .emit(Instruction::CallHost("double".to_string()))
//!     .emit(Instruction::Push(Literal::Int(1)))
//!     .emit(Instruction::Add)
//!     .emit(Instruction::Return)
//!     .build();
//!
//! let mut instance = ScriptInstance::builder()
//!     .with_script(script)
//!     .with_function_resolver(FunctionTable::new().with(
//!         FunctionDescriptor::new("double", 1, |instance, out| {
//!             let n = instance.pop_value()?.coerce_int();
//!             *out = Value::Int(n * 2);
//!             Ok(true)
//!         }),
//!     ))
//!     .create_instance()
//!     .unwrap();
//!
//! assert_eq!(instance.call_and_return_as::<i64>("main", &[]).unwrap(), 9);
//! ```
//!
//! # Host functions
//!
//! Scripts reach native capability through a [`HostFunctionResolver`]. The
//! call ABI is deliberately small: a function pops its declared number of
//! arguments from the instance (last argument on top), writes one result
//! value, and says whether execution continues. Failures either fault the
//! instance or — for functions that opt in — come back to the script as
//! first-class error values it can inspect.
//!
//! # Resource limits
//!
//! There is no preemption. The operand and activation depths are fixed at
//! build time, and a configurable runaway limit bounds the number of
//! executed operations per call, which is the only defense against
//! non-terminating scripts. Hosts that need finer control can drive
//! [`ScriptInstance::step`] themselves.
//!
//! # Threading
//!
//! An instance is single-threaded; values share storage via `Rc` and never
//! cross threads. A [`Script`] is plain data and freely shareable. Run one
//! instance per thread for parallelism.

mod buffer;
mod builder;
mod bytecode;
mod environment;
mod error;
mod operators;
mod resolver;
mod script;
mod stack;
mod value;
mod vm;

pub use buffer::{BufferData, Endianness};
pub use builder::{DEFAULT_ACTIVATION_DEPTH, DEFAULT_VALUE_DEPTH, ScriptInstanceBuilder};
pub use bytecode::{Instruction, Literal};
pub use environment::ScriptEnvironment;
pub use error::{Error, Result};
pub use resolver::{
    CompoundHostFunctionResolver, FunctionDescriptor, FunctionTable, HostFn, HostFunction,
    HostFunctionResolver, ParameterUsage, ScopeResolver, ScopeTable, SharedScope, Usage,
    VariableResolver, describe_functions,
};
pub use script::{Entry, Script, ScriptBuilder, SourcePosition};
pub use stack::{Scope, ScriptInstanceStack};
pub use value::{ErrorValue, FromValue, MapData, TypeMismatch, Value, ValueIterator};
pub use vm::ScriptInstance;
