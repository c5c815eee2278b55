//! Append-only, category-indexed pool of values closed over by the lowered
//! discrimination tree.
//!
//! The reference `typed-function` implementation emits textual source and
//! uses the pool to hand that source stable variable names (`test3`,
//! `convert0`, `signature2`); this crate interprets the tree directly (see
//! SPEC_FULL.md §9) but keeps the pool for the same reason it existed
//! originally: deduplicating identical predicates/conversions/signatures by
//! identity and handing the tree stable, cheap-to-copy handles instead of
//! cloning trait objects into every node that needs them.

use std::rc::Rc;

use crate::registry::{ConversionEntry, TypeEntry};
use crate::signature::Signature;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);
    };
}

handle!(TestHandle);
handle!(ConvertHandle);
handle!(SignatureHandle);

#[derive(Default)]
pub struct ReferencePool {
    tests: Vec<Rc<TypeEntry>>,
    converts: Vec<Rc<ConversionEntry>>,
    signatures: Vec<Rc<Signature>>,
}

impl ReferencePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_test(&mut self, entry: Rc<TypeEntry>) -> TestHandle {
        if let Some(i) = self.tests.iter().position(|t| Rc::ptr_eq(t, &entry)) {
            return TestHandle(i);
        }
        self.tests.push(entry);
        TestHandle(self.tests.len() - 1)
    }

    pub fn add_convert(&mut self, entry: Rc<ConversionEntry>) -> ConvertHandle {
        if let Some(i) = self.converts.iter().position(|c| Rc::ptr_eq(c, &entry)) {
            return ConvertHandle(i);
        }
        self.converts.push(entry);
        ConvertHandle(self.converts.len() - 1)
    }

    pub fn add_signature(&mut self, sig: Rc<Signature>) -> SignatureHandle {
        if let Some(i) = self.signatures.iter().position(|s| Rc::ptr_eq(s, &sig)) {
            return SignatureHandle(i);
        }
        self.signatures.push(sig);
        SignatureHandle(self.signatures.len() - 1)
    }

    pub fn test(&self, handle: TestHandle) -> &Rc<TypeEntry> {
        &self.tests[handle.0]
    }

    pub fn convert(&self, handle: ConvertHandle) -> &Rc<ConversionEntry> {
        &self.converts[handle.0]
    }

    pub fn signature(&self, handle: SignatureHandle) -> &Rc<Signature> {
        &self.signatures[handle.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::value;

    #[test]
    fn add_test_dedups_by_identity() {
        let mut pool = ReferencePool::new();
        let entry = Rc::new(TypeEntry {
            name: "number".into(),
            test: Box::new(|_| true),
        });
        let h1 = pool.add_test(entry.clone());
        let h2 = pool.add_test(entry.clone());
        assert_eq!(h1, h2);

        let other = Rc::new(TypeEntry {
            name: "string".into(),
            test: Box::new(|_| false),
        });
        let h3 = pool.add_test(other);
        assert_ne!(h1, h3);
        assert!((pool.test(h1).test)(&value(1.0_f64)));
    }
}
