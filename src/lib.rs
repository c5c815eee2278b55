//! Multiple-dispatch function composition: build one callable from several
//! type-annotated implementations and let argument types pick the arm.
//!
//! Pipeline: [`Param::parse`]/[`Signature::parse`] → [`compiler::compose`]
//! expands unions and registered conversions into single-type branches,
//! deduplicates and orders them (§4.2, §4.3), then [`tree::build_tree`]
//! groups them into a [`tree::Node`] discrimination tree. A compiled
//! [`Dispatcher`] walks that tree per call, backtracking across sibling
//! branches until an arm matches or every branch is exhausted (§4.4).
//!
//! ```
//! use dispatch::SignatureMap;
//! use std::rc::Rc;
//! use dispatch::{value, System, compose};
//!
//! let mut system = System::new();
//! system.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
//! system.add_type("string", |v| v.as_any().downcast_ref::<String>().is_some()).unwrap();
//!
//! let mut mapping: SignatureMap = SignatureMap::new();
//! mapping.insert("number".into(), Rc::new(|args| args[0].clone()));
//! mapping.insert("string".into(), Rc::new(|_args| value("text".to_string())));
//!
//! let describe = compose("describe", mapping, &system).unwrap();
//! let out = describe.call(&[value(1.0_f64)]).unwrap();
//! assert_eq!(*out.as_any().downcast_ref::<f64>().unwrap(), 1.0);
//! ```

mod compiler;
mod dispatcher;
mod errors;
mod param;
mod pool;
mod registry;
mod signature;
mod tree;

pub use compiler::{compose, compose_dispatchers, convert, find, type_of, SignatureMap};
pub use dispatcher::{create, Dispatcher, System};
pub use errors::{ArgumentsError, ArgumentsErrorKind, CompileError};
pub use param::Param;
pub use pool::{ConvertHandle, ReferencePool, SignatureHandle, TestHandle};
pub use registry::{value, DynAny, RegistryError, TypeRegistry, Value, ANY, OBJECT};
pub use signature::{Implementation, Signature};
