//! The discrimination tree: one node per tested argument position, built by
//! grouping expanded [`Signature`]s on their shared Param at each depth
//! (§4.4).
//!
//! Dispatch walks the tree by backtracking: at a node, candidate children are
//! tried in comparator order, and a child whose subtree ultimately fails to
//! match lets the walk fall back to the next sibling rather than raising
//! immediately. Only the *whole tree* failing to produce a match is a
//! definitive error. `fall_through` is kept on each node as the spec names it
//! (§4.4) but is informational here — the backtracking walk in
//! [`crate::dispatcher`] already recovers from a failed branch whenever a
//! later sibling exists, so node construction never needs to special-case it
//! to stay correct.

use std::rc::Rc;

use crate::errors::CompileError;
use crate::param::{compare_params, Param};
use crate::pool::{ConvertHandle, ReferencePool, SignatureHandle, TestHandle};
use crate::registry::TypeRegistry;
use crate::signature::Signature;

pub struct Node {
    /// The Param that must match the argument at this node's depth. `None`
    /// only for the root, which tests nothing of its own.
    pub param: Option<Param>,
    pub test: Option<TestHandle>,
    pub convert: Option<ConvertHandle>,
    /// A trailing variadic Param: this node consumes every remaining
    /// argument rather than descending one level per argument.
    pub variadic: bool,
    pub children: Vec<Node>,
    /// Filled when a call can terminate exactly here (arity matches).
    pub signature: Option<SignatureHandle>,
    pub fall_through: bool,
}

impl Node {
    fn leaf(signature: SignatureHandle) -> Node {
        Node {
            param: None,
            test: None,
            convert: None,
            variadic: false,
            children: Vec::new(),
            signature: Some(signature),
            fall_through: false,
        }
    }
}

type Entry = (Rc<Signature>, SignatureHandle);

/// Build the root node over every expanded, registered signature.
pub fn build_tree(
    signatures: &[Rc<Signature>],
    pool: &mut ReferencePool,
    registry: &TypeRegistry,
) -> Result<Node, CompileError> {
    let entries: Vec<Entry> = signatures
        .iter()
        .map(|s| (s.clone(), pool.add_signature(s.clone())))
        .collect();
    build_node(entries, 0, pool, registry)
}

fn build_node(
    entries: Vec<Entry>,
    depth: usize,
    pool: &mut ReferencePool,
    registry: &TypeRegistry,
) -> Result<Node, CompileError> {
    let mut terminal: Vec<Entry> = Vec::new();
    let mut deeper: Vec<Entry> = Vec::new();
    for (sig, handle) in entries {
        if sig.params.len() == depth {
            terminal.push((sig, handle));
        } else {
            deeper.push((sig, handle));
        }
    }

    if terminal.len() > 1 {
        return Err(CompileError::DuplicateSignature {
            key: terminal[0].0.canonical_key(),
        });
    }
    let terminal_signature = terminal.into_iter().next().map(|(_, h)| h);

    // Group the entries that still have a Param at `depth` by that Param's
    // identity: same type name, same conversion (if any), same variadic flag.
    let mut groups: Vec<(Param, Vec<Entry>)> = Vec::new();
    for (sig, handle) in deeper {
        let param = sig.params[depth].clone();
        let existing = groups.iter_mut().find(|(p, _)| same_slot(p, &param));
        match existing {
            Some((_, bucket)) => bucket.push((sig, handle)),
            None => groups.push((param, vec![(sig, handle)])),
        }
    }

    let mut children = Vec::with_capacity(groups.len());
    for (param, bucket) in groups {
        if param.var_args {
            if bucket.len() != 1 {
                return Err(CompileError::ConflictingVariadicParam { depth });
            }
            let (sig, handle) = bucket.into_iter().next().unwrap();
            let mut leaf = Node::leaf(handle);
            leaf.param = Some(param.clone());
            leaf.variadic = true;
            leaf.test = resolve_test(&param, pool, registry);
            leaf.convert = resolve_convert(&param, pool);
            let _ = sig;
            children.push(leaf);
            continue;
        }

        let test = resolve_test(&param, pool, registry);
        let convert = resolve_convert(&param, pool);
        let mut child = build_node(bucket, depth + 1, pool, registry)?;
        child.param = Some(param);
        child.test = test;
        child.convert = convert;
        children.push(child);
    }

    children.sort_by(|a, b| {
        compare_params(a.param.as_ref().unwrap(), b.param.as_ref().unwrap(), registry)
    });

    let fall_through = children.iter().any(|c| c.param.as_ref().is_some_and(|p| p.any_type));

    Ok(Node {
        param: None,
        test: None,
        convert: None,
        variadic: false,
        children,
        signature: terminal_signature,
        fall_through,
    })
}

fn same_slot(a: &Param, b: &Param) -> bool {
    if a.var_args != b.var_args {
        return false;
    }
    if a.types != b.types {
        return false;
    }
    match (a.first_conversion(), b.first_conversion()) {
        (None, None) => true,
        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn resolve_test(param: &Param, pool: &mut ReferencePool, registry: &TypeRegistry) -> Option<TestHandle> {
    if param.any_type {
        return None;
    }
    let name = param.types.first()?;
    let entry = registry.entry(name)?;
    Some(pool.add_test(entry.clone()))
}

fn resolve_convert(param: &Param, pool: &mut ReferencePool) -> Option<ConvertHandle> {
    param.first_conversion().map(|c| pool.add_convert(c.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{value, TypeRegistry};
    use crate::signature::Signature;
    use std::rc::Rc;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::empty();
        reg.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
        reg.add_type("string", |v| v.as_any().downcast_ref::<String>().is_some()).unwrap();
        reg
    }

    fn noop() -> Rc<dyn Fn(&[crate::registry::Value]) -> crate::registry::Value> {
        Rc::new(|_| value(()))
    }

    #[test]
    fn root_has_one_child_per_distinct_first_param() {
        let reg = registry();
        let a = Rc::new(Signature::parse("number", noop()).unwrap());
        let b = Rc::new(Signature::parse("string", noop()).unwrap());
        let mut pool = ReferencePool::new();
        let root = build_tree(&[a, b], &mut pool, &reg).unwrap();
        assert_eq!(root.children.len(), 2);
        assert!(root.signature.is_none());
    }

    #[test]
    fn shared_prefix_collapses_into_one_child_with_descendants() {
        let reg = registry();
        let a = Rc::new(Signature::parse("number, number", noop()).unwrap());
        let b = Rc::new(Signature::parse("number, string", noop()).unwrap());
        let mut pool = ReferencePool::new();
        let root = build_tree(&[a, b], &mut pool, &reg).unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].children.len(), 2);
    }

    #[test]
    fn arity_zero_signature_terminates_at_the_root() {
        let reg = registry();
        let a = Rc::new(Signature::parse("", noop()).unwrap());
        let mut pool = ReferencePool::new();
        let root = build_tree(&[a], &mut pool, &reg).unwrap();
        assert!(root.signature.is_some());
        assert!(root.children.is_empty());
    }

    #[test]
    fn variadic_param_becomes_a_terminal_leaf() {
        let reg = registry();
        let a = Rc::new(Signature::parse("...number", noop()).unwrap());
        let mut pool = ReferencePool::new();
        let root = build_tree(&[a], &mut pool, &reg).unwrap();
        assert_eq!(root.children.len(), 1);
        assert!(root.children[0].variadic);
        assert!(root.children[0].signature.is_some());
    }
}
