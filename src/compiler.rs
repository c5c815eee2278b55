//! Turns a signature-text-to-implementation mapping into a compiled
//! [`Dispatcher`]: parse, validate against the registry, expand unions and
//! conversions, deduplicate, sort, and build the discrimination tree (§4.8).

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, debug_span, trace};

use crate::dispatcher::{Dispatcher, System};
use crate::errors::CompileError;
use crate::param::Param;
use crate::pool::ReferencePool;
use crate::registry::{TypeRegistry, Value, ANY};
use crate::signature::{canonical_key_for, compare_signatures, Implementation, Signature};
use crate::tree::build_tree;

/// A `signature text -> implementation` mapping. Insertion-ordered so that
/// `compose` produces the same dispatcher byte-for-byte across runs given
/// the same input order, matching the builtin-registration order guarantee
/// the reference crate's own categories rely on.
pub type SignatureMap = IndexMap<String, Implementation>;

/// Compile a single named dispatcher from `signature text -> implementation`
/// pairs (§4.8, the `compose(name, mapping)` entry point).
pub fn compose(
    name: impl Into<String>,
    mapping: SignatureMap,
    system: &System,
) -> Result<Dispatcher, CompileError> {
    let name = name.into();
    let span = debug_span!("compile", name = %name);
    let _enter = span.enter();
    let registry = system.registry();

    let mut parsed = Vec::with_capacity(mapping.len());
    for (text, implementation) in mapping {
        let signature = Signature::parse(&text, implementation)?;
        validate_types(&signature, registry)?;
        if signature.ignore(registry.ignored()) {
            trace!(signature = %text, "dropped: mentions an ignored type");
        } else {
            parsed.push(signature);
        }
    }

    if parsed.is_empty() {
        return Err(CompileError::EmptySignatureSet);
    }

    let expanded: Vec<Signature> = parsed
        .iter()
        .flat_map(|s| {
            let branches = s.expand(registry);
            trace!(signature = %s.canonical_key(), branches = branches.len(), "expanded");
            branches
        })
        .collect();
    let signatures = dedup_and_sort(expanded, registry)?;
    let pruned = prune_redundant_variadic_conversions(signatures);
    if pruned.iter().any(|s| s.var_args()) {
        trace!("checked variadic arms for conversions preempted by a direct sibling");
    }

    debug!(arms = pruned.len(), "compiled dispatcher");

    let mut pool = ReferencePool::new();
    let root = build_tree(&pruned, &mut pool, registry)?;

    Ok(Dispatcher::new(name, root, pool, registry.snapshot(), pruned))
}

/// Merge already-compiled dispatchers into one that dispatches across the
/// union of their signatures (§4.8, the `compose(...dispatchers)` path).
/// All inputs must have been compiled against the same [`TypeRegistry`]
/// contents; the merged dispatcher's registry snapshot is taken from the
/// first input.
pub fn compose_dispatchers(name: impl Into<String>, dispatchers: &[Dispatcher]) -> Result<Dispatcher, CompileError> {
    let name = name.into();
    let Some(first) = dispatchers.first() else {
        return Err(CompileError::EmptySignatureSet);
    };
    let registry = first.registry();

    let mut all: Vec<Signature> = Vec::new();
    for dispatcher in dispatchers {
        for sig in dispatcher.signatures() {
            all.push(Signature::from_params(sig.params.clone(), sig.implementation.clone()));
        }
    }

    let signatures = dedup_across_merge(all)?;
    let signatures = dedup_and_sort(signatures, registry)?;
    let signatures = prune_redundant_variadic_conversions(signatures);

    let mut pool = ReferencePool::new();
    let root = build_tree(&signatures, &mut pool, registry)?;

    Ok(Dispatcher::new(name, root, pool, registry.snapshot(), signatures))
}

fn validate_types(signature: &Signature, registry: &TypeRegistry) -> Result<(), CompileError> {
    for param in &signature.params {
        for ty in &param.types {
            if ty == ANY {
                continue;
            }
            registry.require_entry(ty)?;
        }
    }
    Ok(())
}

/// Resolve a canonical-key collision per §4.4(b): identical implementations
/// silently collapse; otherwise the smaller signature under the Signature
/// comparator replaces the existing one, and only an exact order tie (two
/// genuinely incomparable candidates) is a hard error.
fn dedup_and_sort(expanded: Vec<Signature>, registry: &TypeRegistry) -> Result<Vec<Rc<Signature>>, CompileError> {
    let mut by_key: IndexMap<String, Rc<Signature>> = IndexMap::new();
    for sig in expanded {
        let key = sig.canonical_key();
        let should_replace = match by_key.get(&key) {
            None => true,
            Some(existing) if Rc::ptr_eq(&existing.implementation, &sig.implementation) => false,
            Some(existing) => match compare_signatures(&sig, existing, registry) {
                Ordering::Less => true,
                Ordering::Equal => return Err(CompileError::DuplicateSignature { key }),
                Ordering::Greater => false,
            },
        };
        if should_replace {
            by_key.insert(key, Rc::new(sig));
        }
    }

    // `sort_by` is stable, so signatures that tie under the comparator keep
    // their relative insertion order.
    let mut signatures: Vec<Rc<Signature>> = by_key.into_values().collect();
    signatures.sort_by(|a, b| compare_signatures(a, b, registry));
    Ok(signatures)
}

/// Drop a variadic Param's conversion-sourced type when some other surviving
/// signature accepts that conversion's `from` type directly, at the same
/// parameter index (§4.4(d)): the non-variadic arm would win that match
/// anyway, so the variadic branch would never actually take the conversion.
fn prune_redundant_variadic_conversions(signatures: Vec<Rc<Signature>>) -> Vec<Rc<Signature>> {
    let mut out = Vec::with_capacity(signatures.len());
    for sig in &signatures {
        if !sig.var_args() {
            out.push(sig.clone());
            continue;
        }
        let idx = sig.params.len() - 1;
        let variadic_param = &sig.params[idx];
        if !variadic_param.has_conversions() {
            out.push(sig.clone());
            continue;
        }

        let mut kept_types = Vec::new();
        let mut kept_conversions = Vec::new();
        for (ty, conv) in variadic_param.types.iter().zip(variadic_param.conversions.iter()) {
            let preempted = match conv {
                Some(c) => signatures.iter().any(|other| {
                    !Rc::ptr_eq(other, sig)
                        && other.params.len() > idx
                        && !other.params[idx].var_args
                        && other.params[idx]
                            .types
                            .iter()
                            .zip(other.params[idx].conversions.iter())
                            .any(|(other_ty, other_conv)| other_ty == &c.from && other_conv.is_none())
                }),
                None => false,
            };
            if !preempted {
                kept_types.push(ty.clone());
                kept_conversions.push(conv.clone());
            }
        }

        if kept_types.len() == variadic_param.types.len() {
            out.push(sig.clone());
            continue;
        }

        let any_type = kept_types.iter().any(|t| t == ANY);
        let mut pruned_param = variadic_param.clone();
        pruned_param.types = kept_types;
        pruned_param.conversions = kept_conversions;
        pruned_param.any_type = any_type;
        let mut new_params = sig.params.clone();
        new_params[idx] = pruned_param;
        out.push(Rc::new(Signature::from_params(new_params, sig.implementation.clone())));
    }
    out
}

fn dedup_across_merge(expanded: Vec<Signature>) -> Result<Vec<Signature>, CompileError> {
    let mut by_key: IndexMap<String, &Signature> = IndexMap::new();
    let mut out = Vec::with_capacity(expanded.len());
    for sig in &expanded {
        let key = sig.canonical_key();
        if let Some(existing) = by_key.get(&key)
            && !Rc::ptr_eq(&existing.implementation, &sig.implementation)
        {
            return Err(CompileError::DuplicateAcrossMerge { key });
        }
        by_key.entry(key).or_insert(sig);
    }
    for sig in expanded {
        out.push(sig);
    }
    Ok(out)
}

/// Exact, conversion-free lookup against a dispatcher's attached signature
/// map (§4.8, §6): no coercion and no `any`-matching, unlike `call`.
pub fn find<'a>(dispatcher: &'a Dispatcher, signature_text: &str) -> Option<&'a Rc<Signature>> {
    let text = signature_text.trim();
    let params: Vec<Param> = if text.is_empty() {
        Vec::new()
    } else {
        text.split(',').map(Param::parse).collect()
    };
    let key = canonical_key_for(&params);
    dispatcher
        .signatures()
        .iter()
        .find(|s| !s.has_conversions() && s.canonical_key() == key)
}

/// `typeOf` / `convert` re-exports used directly by callers that just want
/// the registry behavior without a compiled dispatcher (§6).
pub fn type_of(system: &System, value: &Value) -> String {
    system.type_of(value)
}

pub fn convert(system: &System, value: Value, to: &str) -> Result<Value, crate::registry::RegistryError> {
    system.convert(value, to)
}
