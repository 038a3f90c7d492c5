//! Conversion between [`HostValue`] and interpreter values.

use std::collections::HashMap;

use super::interpreter::Interpreter;
use super::value::{FunctionKind, ObjectKind, ObjectRef, Property, Value};
use super::{HostObject, HostProperty, HostValue};

/// Script objects created for host objects, keyed both ways so a host object
/// maps to one script object and back.
#[derive(Default)]
pub(crate) struct HostBindings {
    by_host: HashMap<usize, ObjectRef>,
    by_script: HashMap<usize, HostObject>,
}

pub(crate) fn from_host(interp: &mut Interpreter, value: HostValue) -> Value {
    match value {
        HostValue::Undefined => Value::Undefined,
        HostValue::Null => Value::Null,
        HostValue::Bool(flag) => Value::Bool(flag),
        HostValue::Number(number) => Value::Number(number),
        HostValue::String(text) => Value::String(text),
        HostValue::List(items) => {
            let elements = items
                .into_iter()
                .map(|item| from_host(interp, item))
                .collect();
            interp.new_array(elements)
        }
        HostValue::Function(func) => interp.host_function("", func),
        HostValue::Object(host) => Value::Object(object_from_host(interp, host)),
    }
}

fn object_from_host(interp: &mut Interpreter, host: HostObject) -> ObjectRef {
    if let Some(existing) = interp.host_bindings.by_host.get(&host.identity()) {
        return existing.clone();
    }
    let object = interp.new_object();
    // Registered before populating so self-references resolve to this object.
    interp
        .host_bindings
        .by_host
        .insert(host.identity(), object.clone());
    interp
        .host_bindings
        .by_script
        .insert(object.identity(), host.clone());

    for (name, property) in host.properties() {
        let property = match property {
            HostProperty::Value(value) => Property::Data {
                value: from_host(interp, value),
                enumerable: true,
            },
            HostProperty::Method(func) => Property::Data {
                value: Value::Object(interp.new_function(&name, 0, FunctionKind::Host(func))),
                enumerable: true,
            },
            HostProperty::Accessor { get, set } => Property::Accessor {
                get: Some(Value::Object(interp.new_function(
                    &format!("get {name}"),
                    0,
                    FunctionKind::Host(get),
                ))),
                set: set.map(|set| {
                    Value::Object(interp.new_function(
                        &format!("set {name}"),
                        1,
                        FunctionKind::Host(set),
                    ))
                }),
                enumerable: true,
            },
        };
        object.borrow_mut().properties.insert(name, property);
    }
    object
}

pub(crate) fn to_host(interp: &Interpreter, value: &Value) -> HostValue {
    let mut seen = Vec::new();
    to_host_inner(interp, value, &mut seen)
}

fn to_host_inner(interp: &Interpreter, value: &Value, seen: &mut Vec<usize>) -> HostValue {
    match value {
        Value::Undefined => HostValue::Undefined,
        Value::Null => HostValue::Null,
        Value::Bool(flag) => HostValue::Bool(*flag),
        Value::Number(number) => HostValue::Number(*number),
        Value::String(text) => HostValue::String(text.clone()),
        Value::Object(object) => {
            if let Some(host) = interp.host_bindings.by_script.get(&object.identity()) {
                return HostValue::Object(host.clone());
            }
            let identity = object.identity();
            if seen.contains(&identity) {
                return HostValue::Undefined;
            }
            seen.push(identity);
            let converted = object_to_host(interp, object, seen);
            seen.pop();
            converted
        }
    }
}

fn object_to_host(interp: &Interpreter, object: &ObjectRef, seen: &mut Vec<usize>) -> HostValue {
    if let Some(FunctionKind::Host(func)) = object.function_kind() {
        return HostValue::Function(func);
    }
    let data = object.borrow();
    match &data.kind {
        ObjectKind::Function(_) => HostValue::Undefined,
        ObjectKind::Array(elements) => HostValue::List(
            elements
                .iter()
                .map(|element| to_host_inner(interp, element, seen))
                .collect(),
        ),
        ObjectKind::Error => {
            let text = |key: &str| match data.properties.get(key) {
                Some(Property::Data {
                    value: Value::String(text),
                    ..
                }) => Some(text.clone()),
                _ => None,
            };
            let name = text("name").unwrap_or_else(|| error_name_from_prototype(object));
            HostValue::Object(
                HostObject::new()
                    .with_value("name", name)
                    .with_value("message", text("message").unwrap_or_default()),
            )
        }
        ObjectKind::RegExp(regexp) => HostValue::String(format!("/{}/{}", regexp.source, regexp.flags)),
        ObjectKind::Ordinary => {
            let snapshot = HostObject::new();
            for (key, property) in data.properties.iter() {
                if let Property::Data {
                    value,
                    enumerable: true,
                } = property
                {
                    let value = to_host_inner(interp, value, seen);
                    snapshot.define(key, HostProperty::Value(value));
                }
            }
            HostValue::Object(snapshot)
        }
    }
}

fn error_name_from_prototype(object: &ObjectRef) -> String {
    let mut cursor = object.prototype();
    while let Some(prototype) = cursor {
        if let Some(Property::Data {
            value: Value::String(name),
            ..
        }) = prototype.own_property("name")
        {
            return name;
        }
        cursor = prototype.prototype();
    }
    "Error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptRuntime;

    #[test]
    fn host_object_converts_to_a_single_script_object() -> crate::Result<()> {
        let mut interp = Interpreter::new();
        let shared = HostObject::new().with_value("n", 1.0);
        interp.bind("a", HostValue::Object(shared.clone()))?;
        interp.bind("b", HostValue::Object(shared.clone()))?;
        assert_eq!(interp.run("a === b", "same")?, HostValue::Bool(true));
        match interp.run("a", "back")? {
            HostValue::Object(back) => assert!(back.ptr_eq(&shared)),
            other => panic!("expected object, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn script_values_snapshot_to_host_values() -> crate::Result<()> {
        let mut interp = Interpreter::new();
        let value = interp.run("({ list: [1, 'two', null], nested: { ok: true } })", "snap")?;
        let HostValue::Object(object) = value else {
            panic!("expected object");
        };
        match object.get("list") {
            Some(HostProperty::Value(HostValue::List(items))) => assert_eq!(
                items,
                vec![
                    HostValue::Number(1.0),
                    HostValue::from("two"),
                    HostValue::Null
                ]
            ),
            _ => panic!("list missing"),
        }
        Ok(())
    }

    #[test]
    fn cyclic_script_objects_do_not_recurse_forever() -> crate::Result<()> {
        let mut interp = Interpreter::new();
        let value = interp.run("var o = {}; o.self = o; o", "cycle")?;
        let HostValue::Object(object) = value else {
            panic!("expected object");
        };
        assert!(matches!(
            object.get("self"),
            Some(HostProperty::Value(HostValue::Undefined))
        ));
        Ok(())
    }
}
