//! The compiled, callable artifact ([`Dispatcher`]) and the mutable
//! pre-compile state a caller assembles before compiling one ([`System`]).

use std::rc::Rc;

use tracing::trace;

use crate::errors::{create_error, ArgumentsError};
use crate::pool::ReferencePool;
use crate::registry::{RegistryError, TypeRegistry, Value};
use crate::signature::Signature;
use crate::tree::Node;

/// Mutable state a caller builds up before compiling a dispatcher: the type
/// universe, its conversions, and any type names to silently drop (§4.1,
/// §6).
#[derive(Default)]
pub struct System {
    registry: TypeRegistry,
}

/// A fresh, isolated system with its own registry, conversions and ignore
/// list (§4.8).
pub fn create() -> System {
    System::new()
}

impl System {
    pub fn new() -> Self {
        System { registry: TypeRegistry::empty() }
    }

    pub fn add_type(
        &mut self,
        name: impl Into<String>,
        test: impl Fn(&Value) -> bool + 'static,
    ) -> Result<(), RegistryError> {
        self.registry.add_type(name, test)
    }

    pub fn add_conversion(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        convert: impl Fn(Value) -> Value + 'static,
    ) -> Result<(), RegistryError> {
        self.registry.add_conversion(from, to, convert)
    }

    pub fn ignore(&mut self, name: impl Into<String>) {
        self.registry.ignore(name);
    }

    pub fn type_of(&self, value: &Value) -> String {
        self.registry.type_of(value)
    }

    pub fn convert(&self, value: Value, to: &str) -> Result<Value, RegistryError> {
        self.registry.convert(value, to)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

/// A compiled multiple-dispatch function: a name, a discrimination tree over
/// its expanded signatures, and the pool and registry snapshot the tree's
/// handles index into (§5 — a compiled Dispatcher never observes later
/// registry mutation).
pub struct Dispatcher {
    name: String,
    root: Node,
    pool: ReferencePool,
    registry: TypeRegistry,
    signatures: Vec<Rc<Signature>>,
}

impl Dispatcher {
    pub(crate) fn new(
        name: String,
        root: Node,
        pool: ReferencePool,
        registry: TypeRegistry,
        signatures: Vec<Rc<Signature>>,
    ) -> Dispatcher {
        Dispatcher { name, root, pool, registry, signatures }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The conversion-aware signatures this dispatcher actually compiled,
    /// in compare order (useful for introspection and help text).
    pub fn signatures(&self) -> &[Rc<Signature>] {
        &self.signatures
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Dispatch `args` to the most specific matching implementation,
    /// applying any conversions the matched branch requires (§4.4, §4.7).
    pub fn call(&self, args: &[Value]) -> Result<Value, ArgumentsError> {
        let mut working: Vec<Value> = args.to_vec();
        trace!(function = %self.name, argc = args.len(), "dispatching");
        match walk(&self.root, &mut working, 0, &self.pool, &self.registry) {
            Some(value) => Ok(value),
            None => Err(self.build_error(args)),
        }
    }

    fn build_error(&self, args: &[Value]) -> ArgumentsError {
        let (index, expected) = probe(&self.root, args, 0, &self.registry);
        if expected.is_empty() {
            create_error(&self.name, args.len(), index, None, None)
        } else {
            let actual = args.get(index).map(|a| self.registry.type_of(a));
            create_error(&self.name, args.len(), index, actual.as_deref(), Some(expected))
        }
    }
}

fn walk(node: &Node, working: &mut Vec<Value>, pos: usize, pool: &ReferencePool, registry: &TypeRegistry) -> Option<Value> {
    if pos == working.len() {
        return node.signature.map(|handle| {
            let sig = pool.signature(handle);
            (sig.implementation)(working)
        });
    }

    for child in &node.children {
        if child.variadic {
            if let Some(result) = try_variadic(child, working, pos, pool, registry) {
                return Some(result);
            }
            continue;
        }

        let original = working[pos].clone();
        let param = child.param.as_ref().expect("non-root node always carries a param");
        let matches = param.any_type
            || child
                .test
                .map(|handle| (pool.test(handle).test)(&original))
                .unwrap_or(false);
        if !matches {
            continue;
        }

        working[pos] = match child.convert {
            Some(handle) => (pool.convert(handle).convert)(original.clone()),
            None => original.clone(),
        };
        if let Some(result) = walk(child, working, pos + 1, pool, registry) {
            return Some(result);
        }
        working[pos] = original;
    }

    None
}

fn try_variadic(leaf: &Node, working: &mut Vec<Value>, pos: usize, pool: &ReferencePool, registry: &TypeRegistry) -> Option<Value> {
    let param = leaf.param.as_ref().expect("variadic leaf carries its Param");
    let mut tail = Vec::with_capacity(working.len().saturating_sub(pos));
    for arg in &working[pos..] {
        tail.push(match_variadic_arg(param, arg, registry)?);
    }
    let handle = leaf.signature.expect("variadic leaf is always terminal");
    let mut full = working[..pos].to_vec();
    full.extend(tail);
    Some((pool.signature(handle).implementation)(&full))
}

fn match_variadic_arg(
    param: &crate::param::Param,
    arg: &Value,
    registry: &TypeRegistry,
) -> Option<Value> {
    if param.any_type {
        return Some(arg.clone());
    }
    let actual = registry.type_of(arg);
    for (ty, conv) in param.types.iter().zip(param.conversions.iter()) {
        match conv {
            None if *ty == actual => return Some(arg.clone()),
            Some(c) if c.from == actual => return Some((c.convert)(arg.clone())),
            _ => {}
        }
    }
    None
}

/// Best-effort walk for error reporting: finds the deepest argument index a
/// call could have reached and the direct (non-conversion) types expected
/// there, without mutating `args` or applying any conversion (§4.7).
fn probe(node: &Node, args: &[Value], pos: usize, registry: &TypeRegistry) -> (usize, Vec<String>) {
    if pos == args.len() {
        return (pos, expected_types(node));
    }

    let mut best = (pos, expected_types(node));
    let actual = registry.type_of(&args[pos]);
    for child in &node.children {
        if child.variadic {
            let param = child.param.as_ref().expect("variadic leaf carries its Param");
            let deeper = probe_variadic(param, args, pos, registry);
            if deeper.0 > best.0 {
                best = deeper;
            }
            continue;
        }
        let param = child.param.as_ref().unwrap();
        if param.any_type || param.types.iter().any(|t| *t == actual) {
            let deeper = probe(child, args, pos + 1, registry);
            if deeper.0 > best.0 {
                best = deeper;
            }
        }
    }
    best
}

/// Walks the trailing arguments a variadic Param would consume using the same
/// direct/conversion test `try_variadic` applies, returning the first index
/// that fails to match (or `args.len()` if every trailing argument matches)
/// together with that Param's direct types.
fn probe_variadic(
    param: &crate::param::Param,
    args: &[Value],
    pos: usize,
    registry: &TypeRegistry,
) -> (usize, Vec<String>) {
    for (i, arg) in args.iter().enumerate().skip(pos) {
        if match_variadic_arg(param, arg, registry).is_none() {
            return (i, param.direct_types().into_iter().map(str::to_string).collect());
        }
    }
    (args.len(), param.direct_types().into_iter().map(str::to_string).collect())
}

fn expected_types(node: &Node) -> Vec<String> {
    let mut out = Vec::new();
    for child in &node.children {
        let Some(param) = &child.param else { continue };
        for ty in param.direct_types() {
            if !out.iter().any(|o: &String| o == ty) {
                out.push(ty.to_string());
            }
        }
    }
    out
}
