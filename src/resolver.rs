//! Pluggable host capability contracts.
//!
//! Hosts expose native functionality to scripts through two indirections: a
//! [`HostFunctionResolver`] mapping names (optionally inside a namespace)
//! to callable [`HostFunction`]s, and a [`ScopeResolver`] mapping names to
//! [`VariableResolver`] scopes. All name lookups are case-insensitive.
//!
//! [`FunctionTable`] is the batteries-included resolver: hosts register
//! closures with a name, an arity, and optional [`Usage`] metadata, no
//! reflection involved. [`CompoundHostFunctionResolver`] composes several
//! resolvers under global or namespaced visibility.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::stack::Scope;
use crate::value::Value;
use crate::vm::ScriptInstance;

// ---------------------------------------------------------------------------
// Host functions
// ---------------------------------------------------------------------------

/// A native capability callable from scripts.
///
/// The call ABI: `execute` pops exactly [`parameter_count`] values from the
/// instance's operand stack (last argument on top), does its work, writes
/// its result into `out`, and returns `Ok(true)` to continue execution or
/// `Ok(false)` to halt the instance. A returned `Err` is fatal unless the
/// function [`returns_errors`], in which case the VM pushes it back to the
/// script as an error value.
///
/// [`parameter_count`]: HostFunction::parameter_count
/// [`returns_errors`]: HostFunction::returns_errors
pub trait HostFunction {
    fn name(&self) -> &str;

    /// How many operand values `execute` pops.
    fn parameter_count(&self) -> usize;

    /// Optional signature and documentation metadata.
    fn usage(&self) -> Option<&Usage> {
        None
    }

    /// When true, failures from `execute` become error values on the
    /// operand stack instead of terminating the instance.
    fn returns_errors(&self) -> bool {
        false
    }

    fn execute(&self, instance: &mut ScriptInstance, out: &mut Value) -> Result<bool>;
}

/// Maps function names to host functions. Lookup is case-insensitive.
pub trait HostFunctionResolver {
    fn contains(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Rc<dyn HostFunction>>;

    /// Every function this resolver knows, for host-side help listings.
    fn all(&self) -> Vec<Rc<dyn HostFunction>>;
}

/// Shared handles resolve through their target, so a host can register the
/// same resolver with several instances and keep its own handle.
impl<T: HostFunctionResolver + ?Sized> HostFunctionResolver for Rc<T> {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn get(&self, name: &str) -> Option<Rc<dyn HostFunction>> {
        (**self).get(name)
    }

    fn all(&self) -> Vec<Rc<dyn HostFunction>> {
        (**self).all()
    }
}

/// Closure type backing a [`FunctionDescriptor`].
pub type HostFn = Rc<dyn Fn(&mut ScriptInstance, &mut Value) -> Result<bool>>;

/// A host function built from a name, an arity, and a closure.
///
/// # Example
///
/// ```
/// use rookscript::{FunctionDescriptor, Usage, Value};
///
/// let double = FunctionDescriptor::new("double", 1, |instance, out| {
///     let n = instance.pop_value()?.coerce_int();
///     *out = Value::Int(n * 2);
///     Ok(true)
/// })
/// .usage(Usage::new("Double an integer.").parameter("n", "int", "The value").returns("int"));
///
/// assert_eq!(double.signature(), "double(n: int) -> int");
/// ```
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    parameter_count: usize,
    usage: Option<Usage>,
    returns_errors: bool,
    func: HostFn,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        parameter_count: usize,
        func: impl Fn(&mut ScriptInstance, &mut Value) -> Result<bool> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_count,
            usage: None,
            returns_errors: false,
            func: Rc::new(func),
        }
    }

    /// Attach signature and documentation metadata.
    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Opt into error-return mode: failures become error values on the
    /// operand stack instead of faulting the instance.
    pub fn returning_errors(mut self) -> Self {
        self.returns_errors = true;
        self
    }

    /// Rendered call signature, from usage metadata when present.
    pub fn signature(&self) -> String {
        match &self.usage {
            Some(usage) => usage.signature(&self.name),
            None => format!("{}(<{} args>)", self.name, self.parameter_count),
        }
    }
}

impl HostFunction for FunctionDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    fn returns_errors(&self) -> bool {
        self.returns_errors
    }

    fn execute(&self, instance: &mut ScriptInstance, out: &mut Value) -> Result<bool> {
        (self.func)(instance, out)
    }
}

/// A registry of [`FunctionDescriptor`]s, resolvable by case-insensitive
/// name.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Rc<FunctionDescriptor>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous function with the same
    /// name.
    pub fn add(&mut self, descriptor: FunctionDescriptor) {
        self.functions
            .insert(descriptor.name.to_lowercase(), Rc::new(descriptor));
    }

    /// Chainable [`add`](Self::add).
    pub fn with(mut self, descriptor: FunctionDescriptor) -> Self {
        self.add(descriptor);
        self
    }
}

impl HostFunctionResolver for FunctionTable {
    fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    fn get(&self, name: &str) -> Option<Rc<dyn HostFunction>> {
        self.functions
            .get(&name.to_lowercase())
            .map(|f| Rc::clone(f) as Rc<dyn HostFunction>)
    }

    fn all(&self) -> Vec<Rc<dyn HostFunction>> {
        self.functions
            .values()
            .map(|f| Rc::clone(f) as Rc<dyn HostFunction>)
            .collect()
    }
}

/// A sequence of resolvers, each visible globally or under a namespace.
///
/// Global lookups consult global entries in registration order, first match
/// wins. Namespaced lookups consult only entries registered under that
/// namespace.
#[derive(Clone, Default)]
pub struct CompoundHostFunctionResolver {
    entries: Vec<(Option<String>, Rc<dyn HostFunctionResolver>)>,
}

impl CompoundHostFunctionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver with global visibility.
    pub fn with(mut self, resolver: Rc<dyn HostFunctionResolver>) -> Self {
        self.entries.push((None, resolver));
        self
    }

    /// Append a resolver visible only under `namespace`.
    pub fn with_namespace(
        mut self,
        namespace: impl Into<String>,
        resolver: Rc<dyn HostFunctionResolver>,
    ) -> Self {
        self.entries
            .push((Some(namespace.into().to_lowercase()), resolver));
        self
    }

    pub fn contains_namespaced(&self, namespace: &str, name: &str) -> bool {
        self.get_namespaced(namespace, name).is_some()
    }

    pub fn get_namespaced(&self, namespace: &str, name: &str) -> Option<Rc<dyn HostFunction>> {
        let namespace = namespace.to_lowercase();
        self.entries
            .iter()
            .filter(|(ns, _)| ns.as_deref() == Some(namespace.as_str()))
            .find_map(|(_, r)| r.get(name))
    }
}

impl HostFunctionResolver for CompoundHostFunctionResolver {
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn get(&self, name: &str) -> Option<Rc<dyn HostFunction>> {
        self.entries
            .iter()
            .filter(|(ns, _)| ns.is_none())
            .find_map(|(_, r)| r.get(name))
    }

    fn all(&self) -> Vec<Rc<dyn HostFunction>> {
        self.entries.iter().flat_map(|(_, r)| r.all()).collect()
    }
}

// ---------------------------------------------------------------------------
// Usage metadata
// ---------------------------------------------------------------------------

/// A host function parameter, for documentation.
#[derive(Debug, Clone)]
pub struct ParameterUsage {
    pub name: String,
    pub type_hint: String,
    pub description: String,
}

/// Documentation metadata for a host function, rendered into host-side help.
///
/// # Example
///
/// ```
/// use rookscript::Usage;
///
/// let usage = Usage::new("Read a line from standard input.")
///     .parameter("prompt", "string", "Prompt text to print first")
///     .returns("string");
///
/// assert_eq!(usage.signature("readline"), "readline(prompt: string) -> string");
/// ```
#[derive(Debug, Clone)]
pub struct Usage {
    pub description: String,
    pub parameters: Vec<ParameterUsage>,
    pub returns: String,
}

impl Usage {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            parameters: Vec::new(),
            returns: "null".to_string(),
        }
    }

    pub fn parameter(
        mut self,
        name: impl Into<String>,
        type_hint: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterUsage {
            name: name.into(),
            type_hint: type_hint.into(),
            description: description.into(),
        });
        self
    }

    pub fn returns(mut self, type_hint: impl Into<String>) -> Self {
        self.returns = type_hint.into();
        self
    }

    /// Render a call signature for the given function name.
    pub fn signature(&self, name: &str) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_hint))
            .collect();
        format!("{}({}) -> {}", name, params.join(", "), self.returns)
    }

    /// Render full documentation: signature, description, and parameters.
    pub fn doc(&self, name: &str) -> String {
        let mut doc = format!("{}\n    {}", self.signature(name), self.description);
        for p in &self.parameters {
            doc.push_str(&format!("\n    {}: {}", p.name, p.description));
        }
        doc
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Render help for every function a resolver exposes, sorted by name.
pub fn describe_functions(resolver: &dyn HostFunctionResolver) -> String {
    let mut functions = resolver.all();
    functions.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
    functions
        .iter()
        .map(|f| match f.usage() {
            Some(usage) => usage.doc(f.name()),
            None => format!("{}(<{} args>)", f.name(), f.parameter_count()),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// A named variable store supplied by the host. Keys are case-insensitive.
pub trait VariableResolver {
    fn contains(&self, name: &str) -> bool;

    /// Read a variable into `out`. Returns whether the name was found;
    /// `out` is left null otherwise.
    fn get(&self, name: &str, out: &mut Value) -> bool;

    /// Write a variable. Writes to read-only names are silently ignored.
    fn set(&self, name: &str, value: Value);

    fn is_read_only(&self, name: &str) -> bool;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T: VariableResolver + ?Sized> VariableResolver for Rc<T> {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn get(&self, name: &str, out: &mut Value) -> bool {
        (**self).get(name, out)
    }

    fn set(&self, name: &str, value: Value) {
        (**self).set(name, value)
    }

    fn is_read_only(&self, name: &str) -> bool {
        (**self).is_read_only(name)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// Maps scope names to variable resolvers. Lookup is case-insensitive.
pub trait ScopeResolver {
    fn contains_scope(&self, name: &str) -> bool;

    fn get_scope(&self, name: &str) -> Option<Rc<dyn VariableResolver>>;
}

/// A [`VariableResolver`] backed by an in-memory [`Scope`].
///
/// # Example
///
/// ```
/// use rookscript::{SharedScope, Value, VariableResolver};
///
/// let scope = SharedScope::new()
///     .with("greeting", Value::from("hello"))
///     .with_read_only("version", Value::Int(2));
///
/// scope.set("version", Value::Int(99));
/// let mut out = Value::Null;
/// assert!(scope.get("VERSION", &mut out));
/// assert_eq!(out, Value::Int(2));
/// ```
#[derive(Debug, Default)]
pub struct SharedScope {
    vars: RefCell<Scope>,
}

impl SharedScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable define.
    pub fn with(self, name: &str, value: Value) -> Self {
        self.vars.borrow_mut().set(name, value);
        self
    }

    /// Chainable read-only define.
    pub fn with_read_only(self, name: &str, value: Value) -> Self {
        self.vars.borrow_mut().define_read_only(name, value);
        self
    }
}

impl VariableResolver for SharedScope {
    fn contains(&self, name: &str) -> bool {
        self.vars.borrow().contains(name)
    }

    fn get(&self, name: &str, out: &mut Value) -> bool {
        match self.vars.borrow().get(name) {
            Some(v) => {
                *out = v.clone();
                true
            }
            None => {
                *out = Value::Null;
                false
            }
        }
    }

    fn set(&self, name: &str, value: Value) {
        self.vars.borrow_mut().set(name, value);
    }

    fn is_read_only(&self, name: &str) -> bool {
        self.vars.borrow().is_read_only(name)
    }

    fn size(&self) -> usize {
        self.vars.borrow().len()
    }
}

/// A [`ScopeResolver`] over named scopes registered by the host.
#[derive(Clone, Default)]
pub struct ScopeTable {
    scopes: HashMap<String, Rc<dyn VariableResolver>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, resolver: Rc<dyn VariableResolver>) {
        self.scopes.insert(name.into().to_lowercase(), resolver);
    }

    /// Chainable [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, resolver: Rc<dyn VariableResolver>) -> Self {
        self.add(name, resolver);
        self
    }
}

impl ScopeResolver for ScopeTable {
    fn contains_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(&name.to_lowercase())
    }

    fn get_scope(&self, name: &str) -> Option<Rc<dyn VariableResolver>> {
        self.scopes.get(&name.to_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop(name: &str, argc: usize) -> FunctionDescriptor {
        FunctionDescriptor::new(name, argc, |_, _| Ok(true))
    }

    #[test]
    fn test_function_table_case_insensitive() {
        let table = FunctionTable::new().with(noop("Print", 1));
        assert!(table.contains("print"));
        assert!(table.contains("PRINT"));
        assert!(!table.contains("println"));
        assert_eq!(table.get("print").unwrap().parameter_count(), 1);
    }

    #[test]
    fn test_compound_namespacing() {
        let io = Rc::new(FunctionTable::new().with(noop("open", 1)));
        let math = Rc::new(FunctionTable::new().with(noop("abs", 1)));
        let global = Rc::new(FunctionTable::new().with(noop("print", 1)));

        let compound = CompoundHostFunctionResolver::new()
            .with(global)
            .with_namespace("IO", io)
            .with_namespace("math", math);

        assert!(compound.contains("print"));
        // Namespaced functions are invisible globally.
        assert!(!compound.contains("open"));
        assert!(compound.contains_namespaced("io", "OPEN"));
        assert!(compound.contains_namespaced("math", "abs"));
        assert!(!compound.contains_namespaced("math", "open"));
        assert_eq!(compound.all().len(), 3);
    }

    #[test]
    fn test_compound_first_match_wins() {
        let first = Rc::new(FunctionTable::new().with(noop("f", 1)));
        let second = Rc::new(FunctionTable::new().with(noop("f", 2)));
        let compound = CompoundHostFunctionResolver::new().with(first).with(second);
        assert_eq!(compound.get("f").unwrap().parameter_count(), 1);
    }

    #[test]
    fn test_usage_rendering() {
        let usage = Usage::new("Add two numbers.")
            .parameter("a", "int", "First addend")
            .parameter("b", "int", "Second addend")
            .returns("int");
        assert_eq!(usage.signature("add"), "add(a: int, b: int) -> int");
        let doc = usage.doc("add");
        assert!(doc.contains("Add two numbers."));
        assert!(doc.contains("a: First addend"));
    }

    #[test]
    fn test_describe_functions() {
        let table = FunctionTable::new()
            .with(noop("zeta", 0).usage(Usage::new("Does Z.").returns("int")))
            .with(noop("alpha", 2));
        let help = describe_functions(&table);
        assert!(help.contains("alpha(<2 args>)"));
        assert!(help.contains("zeta() -> int"));
        // Sorted by name.
        assert!(help.find("alpha").unwrap() < help.find("zeta").unwrap());
    }

    #[test]
    fn test_shared_scope_read_only() {
        let scope = SharedScope::new()
            .with("x", Value::Int(1))
            .with_read_only("lang", Value::from("rookscript"));

        scope.set("X", Value::Int(5));
        scope.set("lang", Value::from("other"));

        let mut out = Value::Null;
        assert!(scope.get("x", &mut out));
        assert_eq!(out, Value::Int(5));
        assert!(scope.get("Lang", &mut out));
        assert_eq!(out, Value::from("rookscript"));
        assert!(!scope.get("missing", &mut out));
        assert_eq!(out, Value::Null);
        assert_eq!(scope.size(), 2);
    }

    #[test]
    fn test_scope_table() {
        let table = ScopeTable::new().with("Config", Rc::new(SharedScope::new()));
        assert!(table.contains_scope("config"));
        assert!(!table.contains_scope("other"));
        assert!(table.get_scope("CONFIG").is_some());
    }
}
