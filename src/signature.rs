//! A sequence of [`Param`]s plus an implementation reference, with expansion
//! and ordering relative to an ambient [`TypeRegistry`] (§4.3).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::errors::CompileError;
use crate::param::{compare_params, Param};
use crate::registry::{TypeRegistry, Value};

/// A user-supplied implementation: positional arguments in, a value out.
pub type Implementation = Rc<dyn Fn(&[Value]) -> Value>;

pub struct Signature {
    pub params: Vec<Param>,
    pub implementation: Implementation,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("key", &self.canonical_key())
            .finish()
    }
}

impl Signature {
    /// Parse `"param0, param1, ..."`. Empty text is a legal arity-0
    /// signature — distinct from a single `any` Param (§9).
    pub fn parse(text: &str, implementation: Implementation) -> Result<Signature, CompileError> {
        let trimmed = text.trim();
        let params = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split(',').map(Param::parse).collect::<Vec<_>>()
        };

        for (i, p) in params.iter().enumerate() {
            if p.var_args && i != params.len() - 1 {
                return Err(CompileError::MisplacedVariadic { signature: text.to_string() });
            }
        }

        Ok(Signature { params, implementation })
    }

    pub fn from_params(params: Vec<Param>, implementation: Implementation) -> Signature {
        Signature { params, implementation }
    }

    pub fn var_args(&self) -> bool {
        self.params.last().is_some_and(|p| p.var_args)
    }

    pub fn any_type(&self) -> bool {
        self.params.iter().any(|p| p.any_type)
    }

    pub fn has_conversions(&self) -> bool {
        self.params.iter().any(|p| p.has_conversions())
    }

    pub fn ignore(&self, ignored: &std::collections::HashSet<String>) -> bool {
        self.params
            .iter()
            .any(|p| p.types.iter().any(|t| ignored.contains(t)))
    }

    /// Canonical key used to detect duplicate signatures after expansion:
    /// each Param's accepted types joined by `|`, comma-separated across
    /// positions, with a `...` marker on a trailing variadic Param.
    /// Conversions do not affect the key — a slot that accepts `number`
    /// directly and one that accepts it via conversion are the same slot.
    pub fn canonical_key(&self) -> String {
        canonical_key_for(&self.params)
    }

    /// Whether this signature could still match a call whose first
    /// `prefix.len()` arguments were matched against `prefix` (used to
    /// filter the any-type index while walking the discrimination tree).
    /// A trailing variadic Param is treated as repeatable.
    pub fn params_start_with(&self, prefix: &[Param]) -> bool {
        for (i, p) in prefix.iter().enumerate() {
            match self.params.get(i) {
                Some(sp) => {
                    if !sp.matches(p) {
                        return false;
                    }
                }
                None => {
                    let Some(last) = self.params.last() else { return false };
                    if !(last.var_args && last.matches(p)) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Split unions and inject conversions, producing one or more
    /// conversion-aware signatures whose non-variadic Params each carry
    /// exactly one accepted type (§4.3).
    pub fn expand(&self, registry: &TypeRegistry) -> Vec<Signature> {
        expand_params(&self.params, registry)
            .into_iter()
            .map(|params| Signature::from_params(params, self.implementation.clone()))
            .collect()
    }
}

/// The canonical key for a raw parameter list, shared by [`Signature::canonical_key`]
/// and `find`'s exact, conversion-free lookup.
pub fn canonical_key_for(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| {
            let body = p.types.join("|");
            if p.var_args { format!("...{body}") } else { body }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn expand_non_variadic_branches(p: &Param, registry: &TypeRegistry) -> Vec<Param> {
    let mut branches: Vec<Param> = p
        .types
        .iter()
        .map(|t| Param::single(t.clone(), None, false))
        .collect();
    for conv in registry.conversions() {
        let accepts_to = p.types.iter().any(|t| t == &conv.to);
        let already_has_from = p.types.iter().any(|t| t == &conv.from);
        if accepts_to && !already_has_from {
            branches.push(Param::single(conv.from.clone(), Some(conv.clone()), false));
        }
    }
    branches
}

fn expand_variadic_param(p: &Param, registry: &TypeRegistry) -> Param {
    let mut types = p.types.clone();
    let mut conversions = p.conversions.clone();
    for conv in registry.conversions() {
        let accepts_to = p.types.iter().any(|t| t == &conv.to);
        let already_has_from = p.types.iter().any(|t| t == &conv.from);
        if accepts_to && !already_has_from {
            types.push(conv.from.clone());
            conversions.push(Some(conv.clone()));
        }
    }
    let any_type = types.iter().any(|t| t == crate::registry::ANY);
    Param { types, conversions, var_args: true, any_type }
}

fn expand_params(params: &[Param], registry: &TypeRegistry) -> Vec<Vec<Param>> {
    let (prefix, variadic): (&[Param], Option<&Param>) = match params.last() {
        Some(last) if last.var_args => (&params[..params.len() - 1], Some(last)),
        _ => (params, None),
    };

    let mut combos: Vec<Vec<Param>> = vec![Vec::new()];
    for p in prefix {
        let branches = expand_non_variadic_branches(p, registry);
        let mut next = Vec::with_capacity(combos.len() * branches.len().max(1));
        for combo in &combos {
            for b in &branches {
                let mut c = combo.clone();
                c.push(b.clone());
                next.push(c);
            }
        }
        combos = next;
    }

    if let Some(v) = variadic {
        let expanded = expand_variadic_param(v, registry);
        for combo in combos.iter_mut() {
            combo.push(expanded.clone());
        }
    }

    combos
}

/// Total order over Signatures relative to an ambient [`TypeRegistry`]: a
/// shorter parameter list sorts first, then fewer conversion-bearing
/// parameters, then lexicographically by the Param comparator (§4.3).
pub fn compare_signatures(a: &Signature, b: &Signature, registry: &TypeRegistry) -> Ordering {
    let len_cmp = a.params.len().cmp(&b.params.len());
    if len_cmp != Ordering::Equal {
        return len_cmp;
    }

    let a_conv_count = a.params.iter().filter(|p| p.has_conversions()).count();
    let b_conv_count = b.params.iter().filter(|p| p.has_conversions()).count();
    let conv_cmp = a_conv_count.cmp(&b_conv_count);
    if conv_cmp != Ordering::Equal {
        return conv_cmp;
    }

    for (pa, pb) in a.params.iter().zip(b.params.iter()) {
        let cmp = compare_params(pa, pb, registry);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::value;

    fn noop() -> Implementation {
        Rc::new(|_args: &[Value]| value(()))
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::empty();
        reg.add_type("number", |_| true).unwrap();
        reg.add_type("string", |_| true).unwrap();
        reg.add_type("boolean", |_| true).unwrap();
        reg.add_type("any", |_| true).unwrap();
        reg
    }

    #[test]
    fn empty_text_is_an_arity_zero_signature() {
        let sig = Signature::parse("", noop()).unwrap();
        assert!(sig.params.is_empty());
        assert_eq!(sig.canonical_key(), "");
    }

    #[test]
    fn misplaced_variadic_is_a_syntax_error() {
        let err = Signature::parse("...number, string", noop()).unwrap_err();
        assert!(matches!(err, CompileError::MisplacedVariadic { .. }));
    }

    #[test]
    fn canonical_key_marks_trailing_variadic() {
        let sig = Signature::parse("number, ...string", noop()).unwrap();
        assert_eq!(sig.canonical_key(), "number,...string");
    }

    #[test]
    fn expand_splits_union_into_one_branch_per_type() {
        let reg = registry();
        let sig = Signature::parse("number|string", noop()).unwrap();
        let expanded = sig.expand(&reg);
        assert_eq!(expanded.len(), 2);
        let keys: Vec<_> = expanded.iter().map(Signature::canonical_key).collect();
        assert!(keys.contains(&"number".to_string()));
        assert!(keys.contains(&"string".to_string()));
    }

    #[test]
    fn expand_injects_a_branch_per_applicable_conversion() {
        let mut reg = registry();
        reg.add_conversion("boolean", "number", |v| v).unwrap();
        let sig = Signature::parse("number", noop()).unwrap();
        let expanded = sig.expand(&reg);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().any(|s| !s.has_conversions()));
        assert!(expanded.iter().any(|s| s.has_conversions()));
    }

    #[test]
    fn expand_does_not_split_variadic_types() {
        let reg = registry();
        let sig = Signature::parse("...number|string", noop()).unwrap();
        let expanded = sig.expand(&reg);
        assert_eq!(expanded.len(), 1);
        assert!(expanded[0].params[0].var_args);
        assert_eq!(expanded[0].params[0].types.len(), 2);
    }

    #[test]
    fn shorter_signature_sorts_first() {
        let reg = registry();
        let short = Signature::parse("number", noop()).unwrap();
        let long = Signature::parse("number, string", noop()).unwrap();
        assert_eq!(compare_signatures(&short, &long, &reg), Ordering::Less);
    }

    #[test]
    fn params_start_with_treats_trailing_variadic_as_repeatable() {
        let sig = Signature::parse("...number", noop()).unwrap();
        let prefix = vec![Param::parse("number"), Param::parse("number"), Param::parse("number")];
        assert!(sig.params_start_with(&prefix));
    }
}
