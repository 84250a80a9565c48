//! Instance construction.
//!
//! [`ScriptInstanceBuilder`] assembles a [`ScriptInstance`] from a compiled
//! script, an I/O environment, host function resolvers (global or
//! namespaced), named variable scopes, stack capacities, and a runaway
//! limit. Misconfiguration surfaces as [`Error::Build`] from
//! [`create_instance`](ScriptInstanceBuilder::create_instance), never as a
//! runtime fault.

use std::rc::Rc;

use crate::environment::ScriptEnvironment;
use crate::error::{Error, Result};
use crate::resolver::{
    CompoundHostFunctionResolver, HostFunctionResolver, ScopeTable, VariableResolver,
};
use crate::script::Script;
use crate::stack::ScriptInstanceStack;
use crate::vm::ScriptInstance;

/// Default maximum number of activation frames.
pub const DEFAULT_ACTIVATION_DEPTH: usize = 256;

/// Default maximum number of operand values.
pub const DEFAULT_VALUE_DEPTH: usize = 2048;

/// Builder for [`ScriptInstance`]s.
///
/// # Example
///
/// ```
/// use rookscript::{
///     FunctionDescriptor, FunctionTable, Instruction, ScriptBuilder, ScriptInstance, Value,
/// };
///
/// let script = ScriptBuilder::new()
///     .entry("main", 0)
///     .emit(Instruction::CallHost("answer".to_string()))
///     .emit(Instruction::Return)
///     .build();
///
/// let mut instance = ScriptInstance::builder()
///     .with_script(script)
///     .with_function_resolver(FunctionTable::new().with(
///         FunctionDescriptor::new("answer", 0, |_, out| {
///             *out = Value::Int(42);
///             Ok(true)
///         }),
///     ))
///     .with_runaway_limit(10_000)
///     .create_instance()
///     .unwrap();
///
/// assert_eq!(instance.call("main", &[]).unwrap(), Value::Int(42));
/// ```
#[derive(Default)]
pub struct ScriptInstanceBuilder {
    script: Option<Rc<Script>>,
    environment: Option<ScriptEnvironment>,
    functions: CompoundHostFunctionResolver,
    scopes: ScopeTable,
    activation_depth: Option<usize>,
    value_depth: Option<usize>,
    runaway_limit: u64,
}

impl ScriptInstanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compiled script to execute.
    pub fn with_script(mut self, script: Script) -> Self {
        self.script = Some(Rc::new(script));
        self
    }

    /// Set a script already shared with other instances.
    pub fn with_shared_script(mut self, script: Rc<Script>) -> Self {
        self.script = Some(script);
        self
    }

    /// Set the I/O environment. Defaults to the process standard streams.
    pub fn with_environment(mut self, environment: ScriptEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Set the host function resolver, discarding any previously added.
    pub fn with_function_resolver(mut self, resolver: impl HostFunctionResolver + 'static) -> Self {
        self.functions = CompoundHostFunctionResolver::new().with(Rc::new(resolver));
        self
    }

    /// Add another globally visible function resolver. Earlier resolvers
    /// win name collisions.
    pub fn and_function_resolver(mut self, resolver: impl HostFunctionResolver + 'static) -> Self {
        self.functions = self.functions.with(Rc::new(resolver));
        self
    }

    /// Add a function resolver visible only under a namespace.
    pub fn with_named_function_resolver(
        mut self,
        namespace: impl Into<String>,
        resolver: impl HostFunctionResolver + 'static,
    ) -> Self {
        self.functions = self.functions.with_namespace(namespace, Rc::new(resolver));
        self
    }

    /// Register a named variable scope.
    pub fn with_scope(
        mut self,
        name: impl Into<String>,
        resolver: impl VariableResolver + 'static,
    ) -> Self {
        self.scopes.add(name, Rc::new(resolver));
        self
    }

    /// Set the stack capacities: maximum activation frames and maximum
    /// operand values.
    pub fn with_script_stack(mut self, activation_depth: usize, value_depth: usize) -> Self {
        self.activation_depth = Some(activation_depth);
        self.value_depth = Some(value_depth);
        self
    }

    /// Cap the number of operations per call; zero means unlimited.
    pub fn with_runaway_limit(mut self, limit: u64) -> Self {
        self.runaway_limit = limit;
        self
    }

    /// Build the instance.
    pub fn create_instance(self) -> Result<ScriptInstance> {
        let script = self
            .script
            .ok_or_else(|| Error::Build("a script was not set".to_string()))?;
        let activation_depth = self.activation_depth.unwrap_or(DEFAULT_ACTIVATION_DEPTH);
        let value_depth = self.value_depth.unwrap_or(DEFAULT_VALUE_DEPTH);
        if activation_depth == 0 {
            return Err(Error::Build("activation depth must be greater than zero".to_string()));
        }
        if value_depth == 0 {
            return Err(Error::Build("value depth must be greater than zero".to_string()));
        }

        Ok(ScriptInstance::new(
            script,
            ScriptInstanceStack::new(activation_depth, value_depth),
            self.functions,
            self.scopes,
            self.environment.unwrap_or_default(),
            self.runaway_limit,
        ))
    }
}
