//! A single parameter slot: accepted type names, optional parallel
//! conversions, and a variadic flag.
//!
//! [`Param::parse`] enforces the empty-text -> `["any"]` rule; callers that
//! already hold a type list should use [`Param::from_types`] instead so an
//! explicit arity-0 [`crate::signature::Signature`] is never confused with a
//! single wildcard Param (see SPEC_FULL.md §9).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::registry::{ConversionEntry, TypeRegistry, ANY, OBJECT};

/// A parameter slot in a [`crate::signature::Signature`].
#[derive(Debug, Clone)]
pub struct Param {
    pub types: Vec<String>,
    pub conversions: Vec<Option<Rc<ConversionEntry>>>,
    pub var_args: bool,
    pub any_type: bool,
}

impl Param {
    /// Parse a single raw parameter spec: `[...]type[|type...]`.
    ///
    /// Empty text (after stripping a `...` prefix) yields a single `any`
    /// type, per §4.1.
    pub fn parse(text: &str) -> Param {
        let text = text.trim();
        let (var_args, body) = match text.strip_prefix("...") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let body = body.trim();
        let types: Vec<String> = if body.is_empty() {
            vec![ANY.to_string()]
        } else {
            body.split('|').map(|s| s.trim().to_string()).collect()
        };
        Param::from_types(types, var_args)
    }

    /// Build a Param directly from an already-split type list.
    pub fn from_types(types: Vec<String>, var_args: bool) -> Param {
        let any_type = types.iter().any(|t| t == ANY);
        let conversions = vec![None; types.len()];
        Param {
            types,
            conversions,
            var_args,
            any_type,
        }
    }

    /// A single-type Param, optionally reached through a conversion.
    pub fn single(ty: String, conversion: Option<Rc<ConversionEntry>>, var_args: bool) -> Param {
        let any_type = ty == ANY;
        Param {
            types: vec![ty],
            conversions: vec![conversion],
            var_args,
            any_type,
        }
    }

    pub fn overlapping(&self, other: &Param) -> bool {
        self.types.iter().any(|t| other.types.iter().any(|o| o == t))
    }

    pub fn matches(&self, other: &Param) -> bool {
        self.any_type || other.any_type || self.overlapping(other)
    }

    pub fn contains_any_of(&self, names: &std::collections::HashSet<&str>) -> bool {
        self.types.iter().any(|t| names.contains(t.as_str()))
    }

    pub fn has_conversions(&self) -> bool {
        self.conversions.iter().any(|c| c.is_some())
    }

    pub fn has_object(&self) -> bool {
        self.types.iter().any(|t| t == OBJECT)
    }

    /// The first conversion-bearing slot's conversion, if any.
    pub fn first_conversion(&self) -> Option<&Rc<ConversionEntry>> {
        self.conversions.iter().flatten().next()
    }

    /// Type names reached without a conversion (used for error messages,
    /// which never mention conversion-only types).
    pub fn direct_types(&self) -> Vec<&str> {
        self.types
            .iter()
            .zip(self.conversions.iter())
            .filter(|(_, c)| c.is_none())
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn to_display_string(&self, show_target: bool) -> String {
        let mut seen = Vec::new();
        for (ty, conv) in self.types.iter().zip(self.conversions.iter()) {
            let rendered = if show_target {
                conv.as_ref().map(|c| c.to.as_str()).unwrap_or(ty.as_str())
            } else {
                ty.as_str()
            };
            if !seen.iter().any(|s: &String| s == rendered) {
                seen.push(rendered.to_string());
            }
        }
        let body = seen.join("|");
        if self.var_args {
            format!("...{body}")
        } else {
            body
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string(false))
    }
}

/// Total order over Params relative to an ambient [`TypeRegistry`] (§4.2).
///
/// Earlier rules win: `any` sorts last, `Object` sorts second-to-last, a
/// fixed-arity Param sorts before a variadic Param of the same type tier
/// (a variadic catch-all is less specific than an exact-arity match),
/// conversion-free Params sort before conversion-bearing ones, ties among
/// conversion-bearing Params break on conversion-list order, and remaining
/// ties break on type-registry order (unregistered names sort after every
/// registered one).
pub fn compare_params(a: &Param, b: &Param, registry: &TypeRegistry) -> Ordering {
    if a.any_type != b.any_type {
        return if a.any_type { Ordering::Greater } else { Ordering::Less };
    }
    if a.has_object() != b.has_object() {
        return if a.has_object() { Ordering::Greater } else { Ordering::Less };
    }
    if a.var_args != b.var_args {
        return if a.var_args { Ordering::Greater } else { Ordering::Less };
    }
    let a_has_conv = a.has_conversions();
    let b_has_conv = b.has_conversions();
    if a_has_conv != b_has_conv {
        return if a_has_conv { Ordering::Greater } else { Ordering::Less };
    }
    if a_has_conv {
        let a_idx = a.first_conversion().and_then(|c| registry.conversion_index(c));
        let b_idx = b.first_conversion().and_then(|c| registry.conversion_index(c));
        return unregistered_last(a_idx).cmp(&unregistered_last(b_idx));
    }
    let a_idx = a.types.first().and_then(|t| registry.type_index(t));
    let b_idx = b.types.first().and_then(|t| registry.type_index(t));
    unregistered_last(a_idx).cmp(&unregistered_last(b_idx))
}

/// An unregistered name (or an unfindable conversion) sorts after every
/// registered one — the open question in §9 resolved explicitly.
fn unregistered_last(idx: Option<usize>) -> usize {
    idx.unwrap_or(usize::MAX)
}
