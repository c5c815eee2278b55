//! Type registry: the universe of type names a compiler may reference, plus
//! user-declared conversions between them.
//!
//! A [`TypeRegistry`] is mutable only before a dispatcher is compiled; the
//! compiler clones the vectors it needs into the compiled artifact so later
//! mutation of the registry is never observed by an already-compiled
//! dispatcher (see the crate-level concurrency notes).

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Any runtime value routed through a dispatcher.
///
/// Values are reference-counted so cloning at a call site (to pass the same
/// argument into multiple predicate tests) is cheap. `Debug` is required so
/// dispatch errors can render the offending value.
pub trait DynAny: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug> DynAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value flowing through a dispatcher.
pub type Value = Rc<dyn DynAny>;

/// Construct a [`Value`] from any owned, debuggable type.
pub fn value<T: Any + fmt::Debug>(v: T) -> Value {
    Rc::new(v)
}

/// A registered type: a name plus the runtime predicate that recognizes it.
pub struct TypeEntry {
    pub name: String,
    pub test: Box<dyn Fn(&Value) -> bool>,
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry").field("name", &self.name).finish()
    }
}

/// A user-declared coercion from one registered type to another.
///
/// The registry's conversion list is ordered; list order breaks ties when two
/// candidate matches differ only in which conversion they used (earlier
/// conversions win — see the signature and Param comparators).
pub struct ConversionEntry {
    pub from: String,
    pub to: String,
    pub convert: Box<dyn Fn(Value) -> Value>,
}

impl fmt::Debug for ConversionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEntry")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// The reserved wildcard type name.
pub const ANY: &str = "any";

/// The permissive structural type name, sorted just before `any` (see the
/// Param comparator).
pub const OBJECT: &str = "Object";

/// Error shape returned while mutating a [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateType {
        name: String,
    },
    UnknownType {
        name: String,
        suggestion: Option<String>,
    },
    UnknownConversionEndpoint {
        from: String,
        to: String,
        missing: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateType { name } => {
                write!(f, "type '{name}' is already registered")
            }
            RegistryError::UnknownType { name, suggestion } => match suggestion {
                Some(hint) => write!(f, "unknown type '{name}' (did you mean '{hint}'?)"),
                None => write!(f, "unknown type '{name}'"),
            },
            RegistryError::UnknownConversionEndpoint { from, to, missing } => {
                write!(f, "conversion {from} -> {to} references unknown type '{missing}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Ordered universe of types, conversions, and ignored type names.
///
/// Entry order is user-visible: it drives the Param comparator's tie-break
/// (§4.2) and the `Object`-deferred rule in [`TypeRegistry::type_of`].
pub struct TypeRegistry {
    types: Vec<Rc<TypeEntry>>,
    conversions: Vec<Rc<ConversionEntry>>,
    ignored: HashSet<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl TypeRegistry {
    /// A registry with no types, conversions, or ignored names.
    pub fn empty() -> Self {
        TypeRegistry {
            types: Vec::new(),
            conversions: Vec::new(),
            ignored: HashSet::new(),
        }
    }

    pub fn add_type(&mut self, name: impl Into<String>, test: impl Fn(&Value) -> bool + 'static) -> Result<(), RegistryError> {
        let name = name.into();
        if self.type_index(&name).is_some() {
            return Err(RegistryError::DuplicateType { name });
        }
        self.types.push(Rc::new(TypeEntry {
            name,
            test: Box::new(test),
        }));
        Ok(())
    }

    pub fn add_conversion(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        convert: impl Fn(Value) -> Value + 'static,
    ) -> Result<(), RegistryError> {
        let from = from.into();
        let to = to.into();
        if self.type_index(&from).is_none() {
            return Err(RegistryError::UnknownConversionEndpoint {
                from: from.clone(),
                to,
                missing: from,
            });
        }
        if self.type_index(&to).is_none() {
            return Err(RegistryError::UnknownConversionEndpoint {
                from,
                to: to.clone(),
                missing: to,
            });
        }
        self.conversions.push(Rc::new(ConversionEntry {
            from,
            to,
            convert: Box::new(convert),
        }));
        Ok(())
    }

    /// Mark a type name as ignored: any signature mentioning it anywhere is
    /// dropped during compilation (see `Signature::ignore`).
    pub fn ignore(&mut self, name: impl Into<String>) {
        self.ignored.insert(name.into());
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    pub fn ignored(&self) -> &HashSet<String> {
        &self.ignored
    }

    pub fn types(&self) -> &[Rc<TypeEntry>] {
        &self.types
    }

    pub fn conversions(&self) -> &[Rc<ConversionEntry>] {
        &self.conversions
    }

    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name == name)
    }

    pub fn entry(&self, name: &str) -> Option<&Rc<TypeEntry>> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn require_entry(&self, name: &str) -> Result<Rc<TypeEntry>, RegistryError> {
        self.entry(name).cloned().ok_or_else(|| {
            let suggestion = self
                .types
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name))
                .map(|t| t.name.clone());
            RegistryError::UnknownType {
                name: name.to_string(),
                suggestion,
            }
        })
    }

    pub fn conversion_index(&self, entry: &Rc<ConversionEntry>) -> Option<usize> {
        self.conversions.iter().position(|c| Rc::ptr_eq(c, entry))
    }

    /// Conversions whose `to` matches `to_name`, in registry order.
    pub fn conversions_to<'a>(&'a self, to_name: &'a str) -> impl Iterator<Item = &'a Rc<ConversionEntry>> {
        self.conversions.iter().filter(move |c| c.to == to_name)
    }

    /// Classify `value` against the registry. `Object` is deferred until
    /// every other entry has been tried, so structural types like `Array`
    /// take precedence over a permissive `Object` predicate regardless of
    /// registration order.
    pub fn type_of(&self, value: &Value) -> String {
        let mut object_entry = None;
        for entry in &self.types {
            if entry.name == OBJECT {
                object_entry = Some(entry);
                continue;
            }
            if (entry.test)(value) {
                return entry.name.clone();
            }
        }
        if let Some(entry) = object_entry
            && (entry.test)(value)
        {
            return entry.name.clone();
        }
        "unknown".to_string()
    }

    /// Find the first registered conversion from `type_of(value)` to `to`,
    /// applying it. Returns the value unchanged if it already classifies as
    /// `to`.
    pub fn convert(&self, value: Value, to: &str) -> Result<Value, RegistryError> {
        let from = self.type_of(&value);
        if from == to {
            return Ok(value);
        }
        for conv in self.conversions_to(to) {
            if conv.from == from {
                return Ok((conv.convert)(value));
            }
        }
        self.require_entry(to)?;
        Err(RegistryError::UnknownConversionEndpoint {
            from,
            to: to.to_string(),
            missing: "no applicable conversion".to_string(),
        })
    }

    /// A deep-enough snapshot for a compiled dispatcher: cloning the `Rc`
    /// vectors is cheap and decouples future registry mutation from already
    /// compiled dispatchers (see §5).
    pub fn snapshot(&self) -> TypeRegistry {
        TypeRegistry {
            types: self.types.clone(),
            conversions: self.conversions.clone(),
            ignored: self.ignored.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_numbers() -> TypeRegistry {
        let mut reg = TypeRegistry::empty();
        reg.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some())
            .unwrap();
        reg.add_type("boolean", |v| v.as_any().downcast_ref::<bool>().is_some())
            .unwrap();
        reg
    }

    #[test]
    fn type_of_classifies_registered_types() {
        let reg = registry_with_numbers();
        assert_eq!(reg.type_of(&value(1.0_f64)), "number");
        assert_eq!(reg.type_of(&value(true)), "boolean");
    }

    #[test]
    fn type_of_falls_back_to_unknown() {
        let reg = registry_with_numbers();
        assert_eq!(reg.type_of(&value("x".to_string())), "unknown");
    }

    #[test]
    fn object_entry_is_deferred_regardless_of_registration_order() {
        let mut reg = TypeRegistry::empty();
        // Object registered first: Array must still win if registered later.
        reg.add_type(OBJECT, |_| true).unwrap();
        reg.add_type("Array", |v| v.as_any().downcast_ref::<Vec<i64>>().is_some())
            .unwrap();
        assert_eq!(reg.type_of(&value(Vec::<i64>::new())), "Array");
    }

    #[test]
    fn duplicate_type_name_is_rejected() {
        let mut reg = registry_with_numbers();
        let err = reg.add_type("number", |_| true).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType { name: "number".into() });
    }

    #[test]
    fn unknown_type_lookup_suggests_case_insensitive_match() {
        let reg = registry_with_numbers();
        let err = reg.require_entry("Number").unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownType {
                name: "Number".into(),
                suggestion: Some("number".into()),
            }
        );
    }

    #[test]
    fn convert_applies_first_matching_conversion() {
        let mut reg = registry_with_numbers();
        reg.add_conversion("boolean", "number", |v| {
            let b = *v.as_any().downcast_ref::<bool>().unwrap();
            value(if b { 1.0_f64 } else { 0.0_f64 })
        })
        .unwrap();
        let converted = reg.convert(value(true), "number").unwrap();
        assert_eq!(*converted.as_any().downcast_ref::<f64>().unwrap(), 1.0);
    }

    #[test]
    fn convert_is_identity_when_already_the_target_type() {
        let reg = registry_with_numbers();
        let v = value(3.0_f64);
        let out = reg.convert(v.clone(), "number").unwrap();
        assert!(Rc::ptr_eq(&v, &out));
    }
}
