//! The interpreter.
//!
//! A [`ScriptInstance`] owns everything mutable about one execution: the
//! program counter, the instance stack, the runaway counter, and the
//! terminated flag. The script and the resolvers are host-supplied and only
//! read. Dispatch is a single `match` over the instruction tag per fetch —
//! no per-opcode objects, no dynamic dispatch on the hot path.
//!
//! This module is the **only** one that mutates runtime state; `operators`
//! and `value` are stateless helpers it leans on.

use std::rc::Rc;

use crate::bytecode::Instruction;
use crate::environment::ScriptEnvironment;
use crate::error::{Error, Result};
use crate::operators;
use crate::resolver::{
    CompoundHostFunctionResolver, HostFunction, HostFunctionResolver, ScopeResolver, ScopeTable,
    VariableResolver,
};
use crate::script::Script;
use crate::stack::ScriptInstanceStack;
use crate::value::{FromValue, MapData, Value};

/// Return index of the terminal frame: returning to it ends execution.
const HALT_INDEX: usize = usize::MAX;

/// Marker pushed by `PushSentinel` to delimit variable-argument regions.
struct StackSentinel;

fn is_sentinel(value: &Value) -> bool {
    value.object_is::<StackSentinel>()
}

/// A single script execution context.
///
/// Instances are built with [`ScriptInstance::builder`], run entry points
/// with [`call`], and can be reused: each `call` resets the stack and the
/// runaway counter. One instance runs one script at a time; the backing
/// [`Script`] may be shared by any number of instances.
///
/// # Example
///
/// ```
/// use rookscript::{Instruction, Literal, ScriptBuilder, ScriptInstance, Value};
///
/// let script = ScriptBuilder::new()
///     .entry("main", 0)
///     .emit(Instruction::Push(Literal::Int(2)))
///     .emit(Instruction::Push(Literal::Int(3)))
///     .emit(Instruction::Add)
///     .emit(Instruction::Return)
///     .build();
///
/// let mut instance = ScriptInstance::builder()
///     .with_script(script)
///     .create_instance()
///     .unwrap();
///
/// assert_eq!(instance.call("main", &[]).unwrap(), Value::Int(5));
/// ```
///
/// [`call`]: ScriptInstance::call
pub struct ScriptInstance {
    script: Rc<Script>,
    stack: ScriptInstanceStack,
    functions: CompoundHostFunctionResolver,
    scopes: ScopeTable,
    environment: ScriptEnvironment,
    pc: usize,
    runaway_limit: u64,
    runaway_count: u64,
    terminated: bool,
}

impl std::fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("pc", &self.pc)
            .field("runaway_limit", &self.runaway_limit)
            .field("runaway_count", &self.runaway_count)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl ScriptInstance {
    /// Start building an instance.
    pub fn builder() -> crate::builder::ScriptInstanceBuilder {
        crate::builder::ScriptInstanceBuilder::new()
    }

    pub(crate) fn new(
        script: Rc<Script>,
        stack: ScriptInstanceStack,
        functions: CompoundHostFunctionResolver,
        scopes: ScopeTable,
        environment: ScriptEnvironment,
        runaway_limit: u64,
    ) -> Self {
        Self {
            script,
            stack,
            functions,
            scopes,
            environment,
            pc: 0,
            runaway_limit,
            runaway_count: 0,
            terminated: true,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn stack(&self) -> &ScriptInstanceStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ScriptInstanceStack {
        &mut self.stack
    }

    pub fn host_function_resolver(&self) -> &CompoundHostFunctionResolver {
        &self.functions
    }

    pub fn scope_resolver(&self) -> &ScopeTable {
        &self.scopes
    }

    pub fn environment(&self) -> &ScriptEnvironment {
        &self.environment
    }

    /// Cooperatively stop the instance; takes effect before the next fetch.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Pop an operand value. This is how host functions take arguments;
    /// the last argument is on top.
    pub fn pop_value(&mut self) -> Result<Value> {
        self.stack.pop()
    }

    /// Push an operand value, for host functions that leave extra data.
    pub fn push_value(&mut self, value: Value) -> Result<()> {
        self.stack.push(value)
    }

    // -- Execution ----------------------------------------------------------

    /// Reset the instance to run an entry point: clear the stack, push the
    /// call arguments (leftmost first) and the terminal frame, and aim the
    /// program counter at the entry.
    ///
    /// Arguments beyond the entry's parameter count are dropped; missing
    /// ones read as null.
    pub fn init(&mut self, entry_name: &str, args: &[Value]) -> Result<()> {
        let entry = self.script.entry(entry_name).ok_or_else(|| {
            Error::ScriptExecution(format!("entry point '{}' does not exist", entry_name))
        })?;
        self.stack.reset();
        self.terminated = false;
        self.runaway_count = 0;
        for i in 0..entry.parameter_count {
            self.stack.push(args.get(i).cloned().unwrap_or(Value::Null))?;
        }
        self.stack.push_frame(HALT_INDEX)?;
        self.pc = entry.index;
        Ok(())
    }

    /// Execute one instruction.
    ///
    /// Returns whether the instance can keep running. Faults terminate the
    /// instance and surface as errors. Useful for hosts that interleave
    /// script execution with their own work, or enforce wall-clock budgets.
    pub fn step(&mut self) -> Result<bool> {
        if self.terminated {
            return Ok(false);
        }
        if self.runaway_limit > 0 && self.runaway_count >= self.runaway_limit {
            self.terminated = true;
            return Err(Error::RunawayScript(self.runaway_limit));
        }

        let script = Rc::clone(&self.script);
        let Some(instruction) = script.instruction(self.pc) else {
            // Ran off the end of the instruction vector.
            self.terminated = true;
            return Ok(false);
        };
        self.pc += 1;

        let result = self.dispatch(instruction);
        self.runaway_count += 1;

        if let Err(err) = result {
            self.terminated = true;
            return Err(err);
        }
        Ok(!self.terminated)
    }

    /// Invoke an entry point and return the value it returns.
    pub fn call(&mut self, entry_name: &str, args: &[Value]) -> Result<Value> {
        self.init(entry_name, args)?;
        while self.step()? {}
        Ok(self.stack.pop().unwrap_or(Value::Null))
    }

    /// Invoke an entry point and extract the result as a Rust type.
    pub fn call_and_return_as<T: FromValue>(
        &mut self,
        entry_name: &str,
        args: &[Value],
    ) -> Result<T> {
        let value = self.call(entry_name, args)?;
        T::from_value(&value).map_err(|e| {
            Error::ScriptExecution(format!("entry point '{}' result: {}", entry_name, e))
        })
    }

    // -- Dispatch -----------------------------------------------------------

    /// Resolve a jump label or fault; an unresolved label is a front-end
    /// bug, not a script-visible condition.
    fn target(&self, label: &str) -> Result<usize> {
        self.script.label_index(label).ok_or_else(|| {
            Error::ScriptExecution(format!("label {} does not correspond to an index", label))
        })
    }

    fn binary(&mut self, op: impl Fn(&Value, &Value) -> Value) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        self.stack.push(op(&a, &b))
    }

    fn unary(&mut self, op: impl Fn(&Value) -> Value) -> Result<()> {
        let a = self.stack.pop()?;
        self.stack.push(op(&a))
    }

    fn comparison(&mut self, keep: impl Fn(std::cmp::Ordering) -> bool) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let result = operators::compare(&a, &b).is_some_and(&keep);
        self.stack.push(Value::Bool(result))
    }

    /// Invoke a resolved host function and push its single return value.
    fn invoke_host(&mut self, function: Rc<dyn HostFunction>, name: &str) -> Result<()> {
        let mut out = Value::Null;
        match function.execute(self, &mut out) {
            Ok(keep_going) => {
                self.stack.push(out)?;
                if !keep_going {
                    self.terminated = true;
                }
                Ok(())
            }
            Err(err) if function.returns_errors() => {
                self.stack.push(Value::error(err.kind(), err.to_string()))
            }
            Err(err) => Err(Error::ScriptExecution(format!(
                "host function '{}' failed: {}",
                name, err
            ))),
        }
    }

    fn dispatch(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            // --- Control ---
            Instruction::Noop => {}
            Instruction::Jump(label) => {
                self.pc = self.target(label)?;
            }
            Instruction::JumpTrue(label) => {
                if self.stack.pop()?.is_truthy() {
                    self.pc = self.target(label)?;
                }
            }
            Instruction::JumpFalse(label) => {
                if !self.stack.pop()?.is_truthy() {
                    self.pc = self.target(label)?;
                }
            }
            Instruction::JumpBranch(when_true, when_false) => {
                let label = if self.stack.pop()?.is_truthy() {
                    when_true
                } else {
                    when_false
                };
                self.pc = self.target(label)?;
            }
            Instruction::JumpFalseCoalesce(label) => {
                if self.stack.peek(0)?.is_truthy() {
                    self.pc = self.target(label)?;
                } else {
                    self.stack.pop()?;
                }
            }
            Instruction::JumpNullCoalesce(label) => {
                if !self.stack.peek(0)?.is_null() {
                    self.pc = self.target(label)?;
                } else {
                    self.stack.pop()?;
                }
            }
            Instruction::CheckError(label) => {
                if self.stack.peek(0)?.is_error() {
                    self.pc = self.target(label)?;
                }
            }
            Instruction::Return => {
                let value = self.stack.pop().unwrap_or(Value::Null);
                let return_index = self.stack.pop_frame()?;
                self.stack.push(value)?;
                if return_index == HALT_INDEX || self.stack.frame_depth() == 0 {
                    self.terminated = true;
                } else {
                    self.pc = return_index;
                }
            }

            // --- Calls ---
            Instruction::Call(label) => {
                let start = self.target(label)?;
                self.stack.push_frame(self.pc)?;
                self.pc = start;
            }
            Instruction::CallHost(name) => {
                let function = self.functions.get(name).ok_or_else(|| {
                    Error::ScriptExecution(format!("host function '{}' not found", name))
                })?;
                self.invoke_host(function, name)?;
            }
            Instruction::CallHostNamespace(namespace, name) => {
                let function = self.functions.get_namespaced(namespace, name).ok_or_else(|| {
                    Error::ScriptExecution(format!(
                        "host function '{}::{}' not found",
                        namespace, name
                    ))
                })?;
                self.invoke_host(function, name)?;
            }

            // --- Stack manipulation ---
            Instruction::Push(literal) => {
                self.stack.push(literal.to_value())?;
            }
            Instruction::PushNull => {
                self.stack.push(Value::Null)?;
            }
            Instruction::Pop => {
                self.stack.pop()?;
            }
            Instruction::PushSentinel => {
                self.stack.push(Value::object(StackSentinel))?;
            }
            Instruction::PopSentinel(count) => {
                let mut remaining = *count;
                while remaining > 0 {
                    if is_sentinel(&self.stack.pop()?) {
                        remaining -= 1;
                    }
                }
            }

            // --- Variables ---
            Instruction::PushVariable(name) => {
                let value = self.stack.get_var(name).unwrap_or(Value::Null);
                self.stack.push(value)?;
            }
            Instruction::PopVariable(name) => {
                let value = self.stack.pop()?;
                self.stack.set_var(name, value);
            }
            Instruction::Set(name, literal) => {
                self.stack.set_var(name, literal.to_value());
            }
            Instruction::SetVariable(dst, src) => {
                let value = self.stack.get_var(src).unwrap_or(Value::Null);
                self.stack.set_var(dst, value);
            }
            Instruction::PushScopeVariable(scope, name) => {
                let mut out = Value::Null;
                if let Some(resolver) = self.scopes.get_scope(scope) {
                    resolver.get(name, &mut out);
                }
                self.stack.push(out)?;
            }
            Instruction::PopScopeVariable(scope, name) => {
                let value = self.stack.pop()?;
                if let Some(resolver) = self.scopes.get_scope(scope) {
                    resolver.set(name, value);
                }
            }

            // --- Collections ---
            Instruction::PushListNew => {
                self.stack.push(Value::new_list())?;
            }
            Instruction::PushListInit => {
                let count = self.stack.pop()?.coerce_int().max(0) as usize;
                let mut items = vec![Value::Null; count];
                for slot in items.iter_mut().rev() {
                    *slot = self.stack.pop()?;
                }
                self.stack.push(Value::list(items))?;
            }
            Instruction::PushListIndex => {
                let index = self.stack.pop()?.coerce_int();
                let list = self.stack.pop()?;
                self.stack.push(list.list_get(index))?;
            }
            Instruction::PushListIndexContents => {
                let index = self.stack.peek(0)?.coerce_int();
                let element = self.stack.peek(1)?.list_get(index);
                self.stack.push(element)?;
            }
            Instruction::PopList => {
                let value = self.stack.pop()?;
                let index = self.stack.pop()?.coerce_int();
                let list = self.stack.pop()?;
                list.list_set(index, value);
            }
            Instruction::PushMapNew => {
                self.stack.push(Value::new_map())?;
            }
            Instruction::PushMapInit => {
                let count = self.stack.pop()?.coerce_int().max(0) as usize;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let value = self.stack.pop()?;
                    let key = self.stack.pop()?;
                    pairs.push((key.coerce_string(), value));
                }
                let mut data = MapData::new();
                for (key, value) in pairs.into_iter().rev() {
                    data.set(key, value);
                }
                self.stack.push(Value::map(data))?;
            }
            Instruction::PushMapKey => {
                let key = self.stack.pop()?.coerce_string();
                let map = self.stack.pop()?;
                self.stack.push(map.map_get(&key))?;
            }
            Instruction::PushMapKeyContents => {
                let key = self.stack.peek(0)?.coerce_string();
                let value = self.stack.peek(1)?.map_get(&key);
                self.stack.push(value)?;
            }
            Instruction::PopMap => {
                let value = self.stack.pop()?;
                let key = self.stack.pop()?.coerce_string();
                let map = self.stack.pop()?;
                map.map_set(key, value);
            }

            // --- Iteration ---
            Instruction::PushIterator => {
                let value = self.stack.pop()?;
                self.stack.push(Value::make_iterator(value))?;
            }
            Instruction::Iterate(label, want_key) => {
                let iterator = match self.stack.peek(0)? {
                    Value::Iterator(it) => Rc::clone(it),
                    other => {
                        return Err(Error::ScriptExecution(format!(
                            "top of stack is not an iterator, got {}",
                            other.type_name()
                        )));
                    }
                };
                let next = iterator.borrow_mut().next();
                match next {
                    Some((key, value)) => {
                        self.stack.push(value)?;
                        if *want_key {
                            self.stack.push(key)?;
                        }
                    }
                    None => {
                        self.stack.pop()?;
                        self.pc = self.target(label)?;
                    }
                }
            }

            // --- Arithmetic and logic ---
            Instruction::Not => self.unary(operators::not)?,
            Instruction::Negate => self.unary(operators::negate)?,
            Instruction::Absolute => self.unary(operators::absolute)?,
            Instruction::Logical => self.unary(operators::logical)?,
            Instruction::LogicalNot => self.unary(operators::logical_not)?,
            Instruction::Add => self.binary(operators::add)?,
            Instruction::Subtract => self.binary(operators::subtract)?,
            Instruction::Multiply => self.binary(operators::multiply)?,
            Instruction::Divide => self.binary(operators::divide)?,
            Instruction::Modulo => self.binary(operators::modulo)?,
            Instruction::And => self.binary(operators::bitwise_and)?,
            Instruction::Or => self.binary(operators::bitwise_or)?,
            Instruction::Xor => self.binary(operators::bitwise_xor)?,
            Instruction::LogicalAnd => self.binary(operators::logical_and)?,
            Instruction::LogicalOr => self.binary(operators::logical_or)?,
            Instruction::LeftShift => self.binary(operators::left_shift)?,
            Instruction::RightShift => self.binary(operators::right_shift)?,
            Instruction::RightShiftPadded => self.binary(operators::right_shift_padded)?,
            Instruction::Less => self.comparison(std::cmp::Ordering::is_lt)?,
            Instruction::LessOrEqual => self.comparison(std::cmp::Ordering::is_le)?,
            Instruction::Greater => self.comparison(std::cmp::Ordering::is_gt)?,
            Instruction::GreaterOrEqual => self.comparison(std::cmp::Ordering::is_ge)?,
            Instruction::Equal => {
                self.binary(|a, b| Value::Bool(operators::value_equals(a, b)))?
            }
            Instruction::NotEqual => {
                self.binary(|a, b| Value::Bool(!operators::value_equals(a, b)))?
            }
            Instruction::StrictEqual => {
                self.binary(|a, b| Value::Bool(operators::strict_equals(a, b)))?
            }
            Instruction::StrictNotEqual => {
                self.binary(|a, b| Value::Bool(!operators::strict_equals(a, b)))?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Literal;
    use crate::script::ScriptBuilder;
    use pretty_assertions::assert_eq;

    fn instance_for(script: crate::script::Script) -> ScriptInstance {
        ScriptInstance::builder()
            .with_script(script)
            .create_instance()
            .unwrap()
    }

    #[test]
    fn test_missing_entry_point() {
        let mut instance = instance_for(ScriptBuilder::new().build());
        let err = instance.call("main", &[]).unwrap_err();
        assert!(matches!(err, Error::ScriptExecution(_)));
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_unresolved_label_faults() {
        let script = ScriptBuilder::new()
            .entry("main", 0)
            .emit(Instruction::Jump("nowhere".to_string()))
            .build();
        let mut instance = instance_for(script);
        let err = instance.call("main", &[]).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
        assert!(instance.is_terminated());
    }

    #[test]
    fn test_iterate_on_non_iterator_faults() {
        let script = ScriptBuilder::new()
            .entry("main", 0)
            .emit(Instruction::Push(Literal::Int(5)))
            .emit(Instruction::Iterate("done".to_string(), false))
            .label("done")
            .emit(Instruction::Return)
            .build();
        let mut instance = instance_for(script);
        let err = instance.call("main", &[]).unwrap_err();
        assert!(err.to_string().contains("not an iterator"));
    }

    #[test]
    fn test_running_off_the_end_terminates() {
        let script = ScriptBuilder::new()
            .entry("main", 0)
            .emit(Instruction::Push(Literal::Int(1)))
            .build();
        let mut instance = instance_for(script);
        assert_eq!(instance.call("main", &[]).unwrap(), Value::Int(1));
        assert!(instance.is_terminated());
    }

    #[test]
    fn test_step_and_terminate() {
        let script = ScriptBuilder::new()
            .entry("main", 0)
            .label("spin")
            .emit(Instruction::Jump("spin".to_string()))
            .build();
        let mut instance = instance_for(script);
        instance.init("main", &[]).unwrap();
        assert!(instance.step().unwrap());
        assert!(instance.step().unwrap());
        instance.terminate();
        assert!(!instance.step().unwrap());
    }

    #[test]
    fn test_instance_is_reusable() {
        let script = ScriptBuilder::new()
            .entry("main", 1)
            .emit(Instruction::PopVariable("x".to_string()))
            .emit(Instruction::PushVariable("x".to_string()))
            .emit(Instruction::Push(Literal::Int(1)))
            .emit(Instruction::Add)
            .emit(Instruction::Return)
            .build();
        let mut instance = instance_for(script);
        assert_eq!(instance.call("main", &[Value::Int(1)]).unwrap(), Value::Int(2));
        assert_eq!(instance.call("main", &[Value::Int(7)]).unwrap(), Value::Int(8));
    }
}
