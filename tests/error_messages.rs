//! Golden-style checks on the rendered `ArgumentsError` message, the text a
//! caller actually sees when a dispatch fails.

use dispatch::{compose, create, value, SignatureMap, Value};
use std::rc::Rc;

#[test]
fn too_few_arguments_message() {
    let mut system = create();
    system.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
    system.add_type("string", |v| v.as_any().downcast_ref::<String>().is_some()).unwrap();
    let mut mapping: SignatureMap = SignatureMap::new();
    mapping.insert("number, string".into(), Rc::new(|args: &[Value]| args[0].clone()));
    let dispatcher = compose("d", mapping, &system).unwrap();

    let err = dispatcher.call(&[value(1.0_f64)]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"d(): too few arguments (index 1, expected one of [string])");
}

#[test]
fn too_many_arguments_message() {
    let mut system = create();
    system.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
    let mut mapping: SignatureMap = SignatureMap::new();
    mapping.insert("number".into(), Rc::new(|args: &[Value]| args[0].clone()));
    let dispatcher = compose("d", mapping, &system).unwrap();

    let err = dispatcher.call(&[value(1.0_f64), value(2.0_f64)]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"d(): too many arguments (expected 1, got 2)");
}

#[test]
fn unexpected_type_message_with_a_single_candidate_type() {
    let mut system = create();
    system.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
    system.add_type("string", |v| v.as_any().downcast_ref::<String>().is_some()).unwrap();
    let mut mapping: SignatureMap = SignatureMap::new();
    mapping.insert("number".into(), Rc::new(|args: &[Value]| args[0].clone()));
    let dispatcher = compose("d", mapping, &system).unwrap();

    let err = dispatcher.call(&[value("x".to_string())]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"d(): unexpected type of argument at index 0 (got string, expected one of [number])");
}

#[test]
fn anonymous_dispatcher_renders_a_placeholder_name() {
    let mut system = create();
    system.add_type("number", |v| v.as_any().downcast_ref::<f64>().is_some()).unwrap();
    let mut mapping: SignatureMap = SignatureMap::new();
    mapping.insert("number".into(), Rc::new(|args: &[Value]| args[0].clone()));
    let dispatcher = compose("", mapping, &system).unwrap();

    let err = dispatcher.call(&[value(1.0_f64), value(2.0_f64)]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"<anonymous>(): too many arguments (expected 1, got 2)");
}
