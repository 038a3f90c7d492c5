//! Standard built-in objects installed into every interpreter.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;

use super::interpreter::{ErrorKind, Interpreter};
use super::json;
use super::regex::{Captures, Regex};
use super::value::{
    Abrupt, BoundFunction, BuiltinFn, FunctionKind, Heap, JsResult, ObjectKind, ObjectRef, Property,
    RegExpData, Value, array_index, format_number, format_number_radix, relative_index,
    to_int32, to_uint32,
};

/// Intrinsic prototypes shared by every object the interpreter creates.
pub(crate) struct Realm {
    pub(crate) object_prototype: ObjectRef,
    pub(crate) function_prototype: ObjectRef,
    pub(crate) array_prototype: ObjectRef,
    pub(crate) string_prototype: ObjectRef,
    pub(crate) number_prototype: ObjectRef,
    pub(crate) boolean_prototype: ObjectRef,
    pub(crate) regexp_prototype: ObjectRef,
    pub(crate) error_prototype: ObjectRef,
    pub(crate) type_error_prototype: ObjectRef,
    pub(crate) range_error_prototype: ObjectRef,
    pub(crate) syntax_error_prototype: ObjectRef,
    pub(crate) reference_error_prototype: ObjectRef,
}

impl Realm {
    pub(crate) fn new(heap: &Heap) -> Self {
        let object_prototype = heap.alloc(ObjectKind::Ordinary, None);
        let derived = |parent: &ObjectRef| heap.alloc(ObjectKind::Ordinary, Some(parent.clone()));
        let error_prototype = derived(&object_prototype);
        Self {
            function_prototype: derived(&object_prototype),
            array_prototype: derived(&object_prototype),
            string_prototype: derived(&object_prototype),
            number_prototype: derived(&object_prototype),
            boolean_prototype: derived(&object_prototype),
            regexp_prototype: derived(&object_prototype),
            type_error_prototype: derived(&error_prototype),
            range_error_prototype: derived(&error_prototype),
            syntax_error_prototype: derived(&error_prototype),
            reference_error_prototype: derived(&error_prototype),
            error_prototype,
            object_prototype,
        }
    }
}

pub(crate) fn install(interp: &mut Interpreter) {
    interp.define_global("undefined", Value::Undefined, false);
    interp.define_global("NaN", Value::Number(f64::NAN), false);
    interp.define_global("Infinity", Value::Number(f64::INFINITY), false);

    install_object(interp);
    install_function(interp);
    install_array(interp);
    install_string(interp);
    install_number(interp);
    install_boolean(interp);
    install_errors(interp);
    install_regexp(interp);
    install_math(interp);
    install_json(interp);
    install_global_functions(interp);
}

fn method(interp: &Interpreter, target: &ObjectRef, name: &'static str, arity: usize, func: BuiltinFn) {
    let function = interp.builtin_function(name, arity, func);
    target.set_hidden(name, Value::Object(function));
}

fn global_function(interp: &mut Interpreter, name: &'static str, arity: usize, func: BuiltinFn) {
    let function = interp.builtin_function(name, arity, func);
    interp.define_global(name, Value::Object(function), true);
}

fn constructor(
    interp: &mut Interpreter,
    name: &'static str,
    arity: usize,
    func: BuiltinFn,
    prototype: &ObjectRef,
) -> ObjectRef {
    let function = interp.builtin_function(name, arity, func);
    function.set_hidden("prototype", Value::Object(prototype.clone()));
    prototype.set_hidden("constructor", Value::Object(function.clone()));
    interp.define_global(name, Value::Object(function.clone()), true);
    function
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn arg_number(interp: &mut Interpreter, args: &[Value], index: usize) -> JsResult<f64> {
    interp.to_number(&arg(args, index))
}

fn arg_integer(interp: &mut Interpreter, args: &[Value], index: usize, default: f64) -> JsResult<f64> {
    match args.get(index) {
        None | Some(Value::Undefined) => Ok(default),
        Some(value) => {
            let number = interp.to_number(value)?;
            Ok(if number.is_nan() { 0.0 } else { number.trunc() })
        }
    }
}

fn to_object(interp: &mut Interpreter, value: &Value) -> JsResult<ObjectRef> {
    match value {
        Value::Object(object) => Ok(object.clone()),
        Value::Undefined | Value::Null => {
            Err(interp.type_error("Cannot convert undefined or null to object"))
        }
        _ => Ok(interp.new_object()),
    }
}

fn callback(interp: &mut Interpreter, args: &[Value], method: &str) -> JsResult<Value> {
    let function = arg(args, 0);
    if function.is_callable() {
        Ok(function)
    } else {
        let text = interp.to_js_string(&function)?;
        Err(interp.type_error(format!("{text} is not a function (in {method})")))
    }
}

// ---- Object ----

fn install_object(interp: &mut Interpreter) {
    let prototype = interp.realm.object_prototype.clone();
    let object = constructor(interp, "Object", 1, object_ctor, &prototype);
    method(interp, &object, "keys", 1, object_keys);
    method(interp, &object, "values", 1, object_values);
    method(interp, &object, "entries", 1, object_entries);
    method(interp, &object, "assign", 2, object_assign);
    method(interp, &object, "create", 2, object_create);
    method(interp, &object, "getPrototypeOf", 1, object_get_prototype_of);
    method(interp, &object, "setPrototypeOf", 2, object_set_prototype_of);
    method(interp, &object, "defineProperty", 3, object_define_property);
    method(interp, &object, "fromEntries", 1, object_from_entries);

    method(interp, &prototype, "hasOwnProperty", 1, object_has_own_property);
    method(interp, &prototype, "isPrototypeOf", 1, object_is_prototype_of);
    method(interp, &prototype, "toString", 0, object_to_string);
    method(interp, &prototype, "valueOf", 0, object_value_of);
}

fn object_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::Object(interp.new_object())),
        other => Ok(other),
    }
}

fn object_keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    let keys = interp
        .own_keys(&target)
        .into_iter()
        .map(Value::String)
        .collect();
    Ok(interp.new_array(keys))
}

fn object_values(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    let values = interp
        .own_enumerable_entries(&target)?
        .into_iter()
        .map(|(_, value)| value)
        .collect();
    Ok(interp.new_array(values))
}

fn object_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    let entries = interp.own_enumerable_entries(&target)?;
    let pairs = entries
        .into_iter()
        .map(|(key, value)| interp.new_array(vec![Value::String(key), value]))
        .collect();
    Ok(interp.new_array(pairs))
}

fn object_assign(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = Value::Object(to_object(interp, &arg(args, 0))?);
    for source in args.iter().skip(1) {
        for (key, value) in interp.own_enumerable_entries(source)? {
            interp.set_property(&target, &key, value)?;
        }
    }
    Ok(target)
}

fn object_create(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        _ => return Err(interp.type_error("Object prototype may only be an Object or null")),
    };
    let object = Value::Object(interp.heap.alloc(ObjectKind::Ordinary, prototype));
    let descriptors = arg(args, 1);
    if !descriptors.is_nullish() {
        for (key, descriptor) in interp.own_enumerable_entries(&descriptors)? {
            define_from_descriptor(interp, &object, &key, &descriptor)?;
        }
    }
    Ok(object)
}

fn object_get_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(object) => object.prototype(),
        Value::String(_) => Some(interp.realm.string_prototype.clone()),
        Value::Number(_) => Some(interp.realm.number_prototype.clone()),
        Value::Bool(_) => Some(interp.realm.boolean_prototype.clone()),
        Value::Undefined | Value::Null => {
            return Err(interp.type_error("Cannot convert undefined or null to object"));
        }
    };
    Ok(prototype.map_or(Value::Null, Value::Object))
}

fn object_set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    let prototype = match arg(args, 1) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        _ => return Err(interp.type_error("Object prototype may only be an Object or null")),
    };
    if let Value::Object(object) = &target {
        let mut cursor = prototype.clone();
        while let Some(candidate) = cursor {
            if candidate.ptr_eq(object) {
                return Err(interp.type_error("Cyclic __proto__ value"));
            }
            cursor = candidate.prototype();
        }
        object.borrow_mut().prototype = prototype;
    }
    Ok(target)
}

fn object_define_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let target = arg(args, 0);
    if !matches!(target, Value::Object(_)) {
        return Err(interp.type_error("Object.defineProperty called on non-object"));
    }
    let key = interp.to_property_key(&arg(args, 1))?;
    define_from_descriptor(interp, &target, &key, &arg(args, 2))?;
    Ok(target)
}

fn define_from_descriptor(
    interp: &mut Interpreter,
    target: &Value,
    key: &str,
    descriptor: &Value,
) -> JsResult<()> {
    let Value::Object(descriptor_object) = descriptor else {
        return Err(interp.type_error("Property description must be an object"));
    };
    let Value::Object(object) = target else {
        return Ok(());
    };
    let enumerable = interp.get_property(descriptor, "enumerable")?.truthy();
    let get = interp.get_property(descriptor, "get")?;
    let set = interp.get_property(descriptor, "set")?;
    let has_accessor = interp.has_property(descriptor_object, "get")
        || interp.has_property(descriptor_object, "set");
    if has_accessor {
        for accessor in [&get, &set] {
            if !accessor.is_nullish() && !accessor.is_callable() {
                return Err(interp.type_error("Getter and setter must be functions"));
            }
        }
        object.borrow_mut().properties.insert(
            key.to_string(),
            Property::Accessor {
                get: (!get.is_nullish()).then_some(get),
                set: (!set.is_nullish()).then_some(set),
                enumerable,
            },
        );
        return Ok(());
    }
    let value = interp.get_property(descriptor, "value")?;
    if object.is_array() && (array_index(key).is_some() || key == "length") {
        return interp.set_property(target, key, value);
    }
    object
        .borrow_mut()
        .properties
        .insert(key.to_string(), Property::Data { value, enumerable });
    Ok(())
}

fn object_from_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let object = Value::Object(interp.new_object());
    for entry in interp.iterate(&arg(args, 0))? {
        let key = interp.get_property(&entry, "0")?;
        let key = interp.to_property_key(&key)?;
        let value = interp.get_property(&entry, "1")?;
        interp.set_property(&object, &key, value)?;
    }
    Ok(object)
}

fn object_has_own_property(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let owned = match this {
        Value::Object(object) => {
            let data = object.borrow();
            let in_array = match &data.kind {
                ObjectKind::Array(elements) => {
                    key == "length" || array_index(&key).is_some_and(|i| i < elements.len())
                }
                _ => false,
            };
            in_array || data.properties.contains(&key)
        }
        Value::String(text) => {
            key == "length" || array_index(&key).is_some_and(|i| i < text.chars().count())
        }
        Value::Undefined | Value::Null => {
            return Err(interp.type_error("Cannot convert undefined or null to object"));
        }
        _ => false,
    };
    Ok(Value::Bool(owned))
}

fn object_is_prototype_of(_interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let (Value::Object(prototype), Value::Object(object)) = (this, arg(args, 0)) else {
        return Ok(Value::Bool(false));
    };
    let mut cursor = object.prototype();
    while let Some(candidate) = cursor {
        if candidate.ptr_eq(prototype) {
            return Ok(Value::Bool(true));
        }
        cursor = candidate.prototype();
    }
    Ok(Value::Bool(false))
}

fn object_to_string(_interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let tag = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(object) => match object.borrow().kind {
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Ordinary => "Object",
        },
    };
    Ok(Value::String(format!("[object {tag}]")))
}

fn object_value_of(_interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(this.clone())
}

// ---- Function ----

fn install_function(interp: &mut Interpreter) {
    let prototype = interp.realm.function_prototype.clone();
    constructor(interp, "Function", 1, function_ctor, &prototype);
    method(interp, &prototype, "call", 1, function_call);
    method(interp, &prototype, "apply", 2, function_apply);
    method(interp, &prototype, "bind", 1, function_bind);
    method(interp, &prototype, "toString", 0, function_to_string);
}

fn function_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(interp.to_js_string(value)?);
    }
    let body = parts.pop().unwrap_or_default();
    interp.compile_function(&parts.join(","), &body)
}

fn function_call(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let rest = args.get(1..).map(<[Value]>::to_vec).unwrap_or_default();
    interp.call_function(this, arg(args, 0), rest)
}

fn function_apply(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        other => array_like_values(interp, &other)?,
    };
    interp.call_function(this, arg(args, 0), list)
}

fn function_bind(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    if !this.is_callable() {
        return Err(interp.type_error("Bind must be called on a function"));
    }
    let name = interp.get_property(this, "name")?;
    let name = interp.to_js_string(&name)?;
    let length = match interp.get_property(this, "length")? {
        Value::Number(length) => length as usize,
        _ => 0,
    };
    let bound_args = args.get(1..).map(<[Value]>::to_vec).unwrap_or_default();
    let arity = length.saturating_sub(bound_args.len());
    let bound = interp.new_function(
        &format!("bound {name}"),
        arity,
        FunctionKind::Bound(std::rc::Rc::new(BoundFunction {
            target: this.clone(),
            this: arg(args, 0),
            args: bound_args,
        })),
    );
    Ok(Value::Object(bound))
}

fn function_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    if !this.is_callable() {
        return Err(interp.type_error("Function.prototype.toString requires that 'this' be a Function"));
    }
    let name = interp.get_property(this, "name")?;
    let name = interp.to_js_string(&name)?;
    Ok(Value::String(format!("function {name}() {{ [native code] }}")))
}

// ---- Array ----

fn install_array(interp: &mut Interpreter) {
    let prototype = interp.realm.array_prototype.clone();
    let array = constructor(interp, "Array", 1, array_ctor, &prototype);
    method(interp, &array, "isArray", 1, array_is_array);
    method(interp, &array, "from", 1, array_from);
    method(interp, &array, "of", 0, array_of);

    method(interp, &prototype, "push", 1, array_push);
    method(interp, &prototype, "pop", 0, array_pop);
    method(interp, &prototype, "shift", 0, array_shift);
    method(interp, &prototype, "unshift", 1, array_unshift);
    method(interp, &prototype, "slice", 2, array_slice);
    method(interp, &prototype, "splice", 2, array_splice);
    method(interp, &prototype, "concat", 1, array_concat);
    method(interp, &prototype, "join", 1, array_join);
    method(interp, &prototype, "reverse", 0, array_reverse);
    method(interp, &prototype, "indexOf", 1, array_index_of);
    method(interp, &prototype, "lastIndexOf", 1, array_last_index_of);
    method(interp, &prototype, "includes", 1, array_includes);
    method(interp, &prototype, "find", 1, array_find);
    method(interp, &prototype, "findIndex", 1, array_find_index);
    method(interp, &prototype, "filter", 1, array_filter);
    method(interp, &prototype, "map", 1, array_map);
    method(interp, &prototype, "forEach", 1, array_for_each);
    method(interp, &prototype, "some", 1, array_some);
    method(interp, &prototype, "every", 1, array_every);
    method(interp, &prototype, "reduce", 1, array_reduce);
    method(interp, &prototype, "reduceRight", 1, array_reduce_right);
    method(interp, &prototype, "sort", 1, array_sort);
    method(interp, &prototype, "fill", 1, array_fill);
    method(interp, &prototype, "flat", 0, array_flat);
    method(interp, &prototype, "flatMap", 1, array_flat_map);
    method(interp, &prototype, "at", 1, array_at);
    method(interp, &prototype, "toString", 0, array_to_string);
}

/// Elements of an array, string, or `length`-carrying object.
fn array_like_values(interp: &mut Interpreter, value: &Value) -> JsResult<Vec<Value>> {
    match value {
        Value::Object(object) => {
            if let Some(elements) = object.array_elements() {
                return Ok(elements);
            }
            let length = interp.get_property(value, "length")?;
            let length = interp.to_number(&length)?;
            let length = if length.is_nan() || length <= 0.0 {
                0
            } else {
                length.min(f64::from(u32::MAX)) as usize
            };
            let mut out = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                out.push(interp.get_property(value, &index.to_string())?);
            }
            Ok(out)
        }
        Value::String(text) => Ok(text.chars().map(|ch| Value::String(ch.to_string())).collect()),
        Value::Undefined | Value::Null => {
            Err(interp.type_error("Cannot convert undefined or null to object"))
        }
        _ => Ok(Vec::new()),
    }
}

fn this_array(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectRef> {
    match this {
        Value::Object(object) if object.is_array() => Ok(object.clone()),
        _ => Err(interp.type_error(format!("Array.prototype.{method} called on non-array"))),
    }
}

fn with_elements<R>(array: &ObjectRef, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    match &mut array.borrow_mut().kind {
        ObjectKind::Array(elements) => Some(f(elements)),
        _ => None,
    }
}

fn array_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    if let [Value::Number(length)] = args {
        if *length < 0.0 || length.fract() != 0.0 || *length > f64::from(u32::MAX) {
            return Err(interp.range_error("Invalid array length"));
        }
        return Ok(interp.new_array(vec![Value::Undefined; *length as usize]));
    }
    Ok(interp.new_array(args.to_vec()))
}

fn array_is_array(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(
        arg(args, 0).as_object().is_some_and(ObjectRef::is_array),
    ))
}

fn array_from(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = match arg(args, 0) {
        Value::Undefined | Value::Null => {
            return Err(interp.type_error("Array.from requires an array-like object"));
        }
        source => array_like_values(interp, &source)?,
    };
    let mapper = arg(args, 1);
    if mapper.is_nullish() {
        return Ok(interp.new_array(values));
    }
    let mut mapped = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        mapped.push(interp.call_function(&mapper, arg(args, 2), vec![value, Value::from(index)])?);
    }
    Ok(interp.new_array(mapped))
}

fn array_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(interp.new_array(args.to_vec()))
}

fn array_push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "push")?;
    let length = with_elements(&array, |elements| {
        elements.extend_from_slice(args);
        elements.len()
    });
    Ok(Value::from(length.unwrap_or_default()))
}

fn array_pop(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "pop")?;
    Ok(with_elements(&array, Vec::pop).flatten().unwrap_or_default())
}

fn array_shift(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "shift")?;
    let shifted = with_elements(&array, |elements| {
        (!elements.is_empty()).then(|| elements.remove(0))
    });
    Ok(shifted.flatten().unwrap_or_default())
}

fn array_unshift(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "unshift")?;
    let length = with_elements(&array, |elements| {
        elements.splice(0..0, args.iter().cloned());
        elements.len()
    });
    Ok(Value::from(length.unwrap_or_default()))
}

fn array_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let len = values.len();
    let start = relative_index(arg_integer(interp, args, 0, 0.0)?, len);
    let end = relative_index(arg_integer(interp, args, 1, len as f64)?, len);
    let slice = values.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default();
    Ok(interp.new_array(slice))
}

fn array_splice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "splice")?;
    let len = array.array_elements().map_or(0, |elements| elements.len());
    let start = relative_index(arg_integer(interp, args, 0, 0.0)?, len);
    let delete_count = if args.is_empty() {
        0
    } else if args.len() == 1 {
        len - start
    } else {
        (arg_integer(interp, args, 1, 0.0)?.max(0.0) as usize).min(len - start)
    };
    let inserted = args.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
    let removed = with_elements(&array, |elements| {
        elements
            .splice(start..start + delete_count, inserted)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default();
    Ok(interp.new_array(removed))
}

fn array_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut out = array_like_values(interp, this)?;
    for value in args {
        match value.as_object().and_then(ObjectRef::array_elements) {
            Some(elements) => out.extend(elements),
            None => out.push(value.clone()),
        }
    }
    Ok(interp.new_array(out))
}

fn join_values(interp: &mut Interpreter, values: &[Value], separator: &str) -> JsResult<String> {
    let mut out = String::new();
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push_str(separator);
        }
        if !value.is_nullish() {
            out.push_str(&interp.to_js_string(value)?);
        }
    }
    Ok(out)
}

fn array_join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => interp.to_js_string(&other)?,
    };
    Ok(Value::String(join_values(interp, &values, &separator)?))
}

fn array_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    Ok(Value::String(join_values(interp, &values, ",")?))
}

fn array_reverse(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "reverse")?;
    with_elements(&array, |elements| elements.reverse());
    Ok(this.clone())
}

fn array_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let start = relative_index(arg_integer(interp, args, 1, 0.0)?, values.len());
    let needle = arg(args, 0);
    let found = values
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, value)| value.strict_equals(&needle))
        .map_or(-1.0, |(index, _)| index as f64);
    Ok(Value::Number(found))
}

fn array_last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let needle = arg(args, 0);
    let from = arg_integer(interp, args, 1, values.len() as f64 - 1.0)?;
    let from = if from < 0.0 { values.len() as f64 + from } else { from };
    if from < 0.0 {
        return Ok(Value::Number(-1.0));
    }
    let last = (from as usize).min(values.len().saturating_sub(1));
    let found = values
        .iter()
        .enumerate()
        .take(last + 1)
        .rev()
        .find(|(_, value)| value.strict_equals(&needle))
        .map_or(-1.0, |(index, _)| index as f64);
    Ok(Value::Number(found))
}

fn array_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let start = relative_index(arg_integer(interp, args, 1, 0.0)?, values.len());
    let needle = arg(args, 0);
    Ok(Value::Bool(
        values.iter().skip(start).any(|value| value.same_value_zero(&needle)),
    ))
}

/// Runs `callback(element, index, array)` for each element until `visit`
/// returns `Some`.
fn each_with_callback<R>(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    method: &str,
    mut visit: impl FnMut(&mut Interpreter, usize, &Value, Value) -> JsResult<Option<R>>,
) -> JsResult<Option<R>> {
    let values = array_like_values(interp, this)?;
    let function = callback(interp, args, method)?;
    let this_arg = arg(args, 1);
    for (index, value) in values.into_iter().enumerate() {
        let result = interp.call_function(
            &function,
            this_arg.clone(),
            vec![value.clone(), Value::from(index), this.clone()],
        )?;
        if let Some(found) = visit(interp, index, &value, result)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn array_find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = each_with_callback(interp, this, args, "find", |_, _, value, result| {
        Ok(result.truthy().then(|| value.clone()))
    })?;
    Ok(found.unwrap_or_default())
}

fn array_find_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = each_with_callback(interp, this, args, "findIndex", |_, index, _, result| {
        Ok(result.truthy().then_some(index as f64))
    })?;
    Ok(Value::Number(found.unwrap_or(-1.0)))
}

fn array_filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut kept = Vec::new();
    each_with_callback::<()>(interp, this, args, "filter", |_, _, value, result| {
        if result.truthy() {
            kept.push(value.clone());
        }
        Ok(None)
    })?;
    Ok(interp.new_array(kept))
}

fn array_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut mapped = Vec::new();
    each_with_callback::<()>(interp, this, args, "map", |_, _, _, result| {
        mapped.push(result);
        Ok(None)
    })?;
    Ok(interp.new_array(mapped))
}

fn array_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    each_with_callback::<()>(interp, this, args, "forEach", |_, _, _, _| Ok(None))?;
    Ok(Value::Undefined)
}

fn array_some(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let found = each_with_callback(interp, this, args, "some", |_, _, _, result| {
        Ok(result.truthy().then_some(()))
    })?;
    Ok(Value::Bool(found.is_some()))
}

fn array_every(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let failed = each_with_callback(interp, this, args, "every", |_, _, _, result| {
        Ok((!result.truthy()).then_some(()))
    })?;
    Ok(Value::Bool(failed.is_none()))
}

fn reduce_values(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    indices: Vec<usize>,
    values: &[Value],
) -> JsResult<Value> {
    let function = callback(interp, args, "reduce")?;
    let mut indices = indices.into_iter();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match indices.next() {
            Some(first) => values[first].clone(),
            None => return Err(interp.type_error("Reduce of empty array with no initial value")),
        },
    };
    for index in indices {
        accumulator = interp.call_function(
            &function,
            Value::Undefined,
            vec![accumulator, values[index].clone(), Value::from(index), this.clone()],
        )?;
    }
    Ok(accumulator)
}

fn array_reduce(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let indices = (0..values.len()).collect();
    reduce_values(interp, this, args, indices, &values)
}

fn array_reduce_right(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let indices = (0..values.len()).rev().collect();
    reduce_values(interp, this, args, indices, &values)
}

fn compare_for_sort(
    interp: &mut Interpreter,
    comparator: &Value,
    left: &Value,
    right: &Value,
) -> JsResult<Ordering> {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    if comparator.is_nullish() {
        let a = interp.to_js_string(left)?;
        let b = interp.to_js_string(right)?;
        return Ok(a.cmp(&b));
    }
    let result = interp.call_function(comparator, Value::Undefined, vec![left.clone(), right.clone()])?;
    let result = interp.to_number(&result)?;
    Ok(if result < 0.0 {
        Ordering::Less
    } else if result > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

/// Stable merge sort with a fallible comparator.
fn merge_sort(interp: &mut Interpreter, comparator: &Value, values: Vec<Value>) -> JsResult<Vec<Value>> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let mut left = values;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, comparator, left)?;
    let right = merge_sort(interp, comparator, right)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare_for_sort(interp, comparator, a, b)? == Ordering::Greater,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    Ok(merged)
}

fn array_sort(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "sort")?;
    let comparator = arg(args, 0);
    if !comparator.is_nullish() && !comparator.is_callable() {
        return Err(interp.type_error("The comparison function must be either a function or undefined"));
    }
    let values = array.array_elements().unwrap_or_default();
    let sorted = merge_sort(interp, &comparator, values)?;
    with_elements(&array, |elements| *elements = sorted);
    Ok(this.clone())
}

fn array_fill(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let array = this_array(interp, this, "fill")?;
    let len = array.array_elements().map_or(0, |elements| elements.len());
    let start = relative_index(arg_integer(interp, args, 1, 0.0)?, len);
    let end = relative_index(arg_integer(interp, args, 2, len as f64)?, len);
    let value = arg(args, 0);
    with_elements(&array, |elements| {
        for slot in elements.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    });
    Ok(this.clone())
}

fn flatten_into(out: &mut Vec<Value>, values: Vec<Value>, depth: f64) {
    for value in values {
        match value.as_object().and_then(ObjectRef::array_elements) {
            Some(inner) if depth >= 1.0 => flatten_into(out, inner, depth - 1.0),
            _ => out.push(value),
        }
    }
}

fn array_flat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let depth = arg_integer(interp, args, 0, 1.0)?;
    let mut out = Vec::new();
    flatten_into(&mut out, values, depth);
    Ok(interp.new_array(out))
}

fn array_flat_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut mapped = Vec::new();
    each_with_callback::<()>(interp, this, args, "flatMap", |_, _, _, result| {
        mapped.push(result);
        Ok(None)
    })?;
    let mut out = Vec::new();
    flatten_into(&mut out, mapped, 1.0);
    Ok(interp.new_array(out))
}

fn array_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let values = array_like_values(interp, this)?;
    let index = arg_integer(interp, args, 0, 0.0)?;
    let index = if index < 0.0 { values.len() as f64 + index } else { index };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(values.get(index as usize).cloned().unwrap_or_default())
}

// ---- String ----

fn install_string(interp: &mut Interpreter) {
    let prototype = interp.realm.string_prototype.clone();
    let string = constructor(interp, "String", 1, string_ctor, &prototype);
    method(interp, &string, "fromCharCode", 1, string_from_char_code);

    method(interp, &prototype, "charAt", 1, string_char_at);
    method(interp, &prototype, "charCodeAt", 1, string_char_code_at);
    method(interp, &prototype, "codePointAt", 1, string_code_point_at);
    method(interp, &prototype, "at", 1, string_at);
    method(interp, &prototype, "indexOf", 1, string_index_of);
    method(interp, &prototype, "lastIndexOf", 1, string_last_index_of);
    method(interp, &prototype, "includes", 1, string_includes);
    method(interp, &prototype, "startsWith", 1, string_starts_with);
    method(interp, &prototype, "endsWith", 1, string_ends_with);
    method(interp, &prototype, "slice", 2, string_slice);
    method(interp, &prototype, "substring", 2, string_substring);
    method(interp, &prototype, "substr", 2, string_substr);
    method(interp, &prototype, "toUpperCase", 0, string_to_upper_case);
    method(interp, &prototype, "toLowerCase", 0, string_to_lower_case);
    method(interp, &prototype, "trim", 0, string_trim);
    method(interp, &prototype, "trimStart", 0, string_trim_start);
    method(interp, &prototype, "trimEnd", 0, string_trim_end);
    method(interp, &prototype, "padStart", 2, string_pad_start);
    method(interp, &prototype, "padEnd", 2, string_pad_end);
    method(interp, &prototype, "repeat", 1, string_repeat);
    method(interp, &prototype, "concat", 1, string_concat);
    method(interp, &prototype, "split", 2, string_split);
    method(interp, &prototype, "replace", 2, string_replace);
    method(interp, &prototype, "replaceAll", 2, string_replace_all);
    method(interp, &prototype, "match", 1, string_match);
    method(interp, &prototype, "search", 1, string_search);
    method(interp, &prototype, "normalize", 0, string_normalize);
    method(interp, &prototype, "localeCompare", 1, string_locale_compare);
    method(interp, &prototype, "toString", 0, string_value_of);
    method(interp, &prototype, "valueOf", 0, string_value_of);
}

fn this_string(interp: &mut Interpreter, this: &Value) -> JsResult<String> {
    if this.is_nullish() {
        return Err(interp.type_error("String.prototype method called on null or undefined"));
    }
    interp.to_js_string(this)
}

fn arg_string(interp: &mut Interpreter, args: &[Value], index: usize) -> JsResult<String> {
    interp.to_js_string(&arg(args, index))
}

fn char_to_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map_or(text.len(), |(byte, _)| byte)
}

fn byte_to_char(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.chars().count())
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn string_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    if args.is_empty() {
        return Ok(Value::from(""));
    }
    Ok(Value::String(arg_string(interp, args, 0)?))
}

fn string_from_char_code(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut units = Vec::with_capacity(args.len());
    for value in args {
        units.push(interp.to_number(value)? as i64 as u16);
    }
    let text = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Ok(Value::String(text))
}

fn string_char_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let index = arg_integer(interp, args, 0, 0.0)?;
    if index < 0.0 {
        return Ok(Value::from(""));
    }
    Ok(Value::String(
        text.chars()
            .nth(index as usize)
            .map(String::from)
            .unwrap_or_default(),
    ))
}

fn string_char_code_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let index = arg_integer(interp, args, 0, 0.0)?;
    if index < 0.0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(
        text.chars()
            .nth(index as usize)
            .map_or(f64::NAN, |ch| {
                let mut units = [0u16; 2];
                f64::from(ch.encode_utf16(&mut units)[0])
            }),
    ))
}

fn string_code_point_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let index = arg_integer(interp, args, 0, 0.0)?;
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(text
        .chars()
        .nth(index as usize)
        .map_or(Value::Undefined, |ch| Value::Number(f64::from(u32::from(ch)))))
}

fn string_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let len = text.chars().count();
    let index = arg_integer(interp, args, 0, 0.0)?;
    let index = if index < 0.0 { len as f64 + index } else { index };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(text
        .chars()
        .nth(index as usize)
        .map_or(Value::Undefined, |ch| Value::String(ch.to_string())))
}

fn string_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let needle = arg_string(interp, args, 0)?;
    let len = text.chars().count();
    let start = arg_integer(interp, args, 1, 0.0)?.clamp(0.0, len as f64) as usize;
    let from = char_to_byte(&text, start);
    let found = text[from..]
        .find(&needle)
        .map_or(-1.0, |byte| byte_to_char(&text, from + byte) as f64);
    Ok(Value::Number(found))
}

fn string_last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let needle = arg_string(interp, args, 0)?;
    let len = text.chars().count();
    let position = match arg(args, 1) {
        Value::Undefined => len as f64,
        other => {
            let number = interp.to_number(&other)?;
            if number.is_nan() { len as f64 } else { number.trunc() }
        }
    };
    let start = position.clamp(0.0, len as f64) as usize;
    let limit = char_to_byte(&text, start);
    let found = text
        .match_indices(needle.as_str())
        .map(|(byte, _)| byte)
        .take_while(|byte| *byte <= limit)
        .last()
        .map_or(-1.0, |byte| byte_to_char(&text, byte) as f64);
    Ok(Value::Number(found))
}

fn reject_regexp(interp: &mut Interpreter, value: &Value, method: &str) -> JsResult<()> {
    if regexp_data(value).is_some() {
        return Err(interp.type_error(format!(
            "First argument to String.prototype.{method} must not be a regular expression"
        )));
    }
    Ok(())
}

fn string_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    reject_regexp(interp, &arg(args, 0), "includes")?;
    let needle = arg_string(interp, args, 0)?;
    let start = arg_integer(interp, args, 1, 0.0)?.max(0.0) as usize;
    let from = char_to_byte(&text, start);
    Ok(Value::Bool(text[from..].contains(&needle)))
}

fn string_starts_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    reject_regexp(interp, &arg(args, 0), "startsWith")?;
    let needle = arg_string(interp, args, 0)?;
    let start = arg_integer(interp, args, 1, 0.0)?.max(0.0) as usize;
    let from = char_to_byte(&text, start);
    Ok(Value::Bool(text[from..].starts_with(&needle)))
}

fn string_ends_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    reject_regexp(interp, &arg(args, 0), "endsWith")?;
    let needle = arg_string(interp, args, 0)?;
    let len = text.chars().count();
    let end = arg_integer(interp, args, 1, len as f64)?.clamp(0.0, len as f64) as usize;
    let until = char_to_byte(&text, end);
    Ok(Value::Bool(text[..until].ends_with(&needle)))
}

fn string_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let len = text.chars().count();
    let start = relative_index(arg_integer(interp, args, 0, 0.0)?, len);
    let end = relative_index(arg_integer(interp, args, 1, len as f64)?, len);
    Ok(Value::String(char_slice(&text, start, end)))
}

fn string_substring(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let len = text.chars().count() as f64;
    let a = arg_integer(interp, args, 0, 0.0)?.clamp(0.0, len) as usize;
    let b = arg_integer(interp, args, 1, len)?.clamp(0.0, len) as usize;
    Ok(Value::String(char_slice(&text, a.min(b), a.max(b))))
}

fn string_substr(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let len = text.chars().count();
    let start = relative_index(arg_integer(interp, args, 0, 0.0)?, len);
    let count = arg_integer(interp, args, 1, len as f64)?.max(0.0) as usize;
    Ok(Value::String(char_slice(&text, start, start.saturating_add(count).min(len))))
}

fn string_to_upper_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::String(this_string(interp, this)?.to_uppercase()))
}

fn string_to_lower_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::String(this_string(interp, this)?.to_lowercase()))
}

fn is_js_whitespace(ch: char) -> bool {
    ch.is_whitespace() || ch == '\u{FEFF}'
}

fn string_trim(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::from(this_string(interp, this)?.trim_matches(is_js_whitespace)))
}

fn string_trim_start(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::from(this_string(interp, this)?.trim_start_matches(is_js_whitespace)))
}

fn string_trim_end(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::from(this_string(interp, this)?.trim_end_matches(is_js_whitespace)))
}

fn padding(interp: &mut Interpreter, text: &str, args: &[Value]) -> JsResult<String> {
    let target = arg_integer(interp, args, 0, 0.0)?.max(0.0) as usize;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => interp.to_js_string(&other)?,
    };
    let len = text.chars().count();
    if target <= len || filler.is_empty() {
        return Ok(String::new());
    }
    Ok(filler.chars().cycle().take(target - len).collect())
}

fn string_pad_start(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let pad = padding(interp, &text, args)?;
    Ok(Value::String(pad + &text))
}

fn string_pad_end(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let pad = padding(interp, &text, args)?;
    Ok(Value::String(text + &pad))
}

fn string_repeat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let count = arg_integer(interp, args, 0, 0.0)?;
    if count < 0.0 || count.is_infinite() {
        return Err(interp.range_error(format!("Invalid count value: {}", format_number(count))));
    }
    if (count as usize).saturating_mul(text.len()) > (1 << 28) {
        return Err(interp.range_error("Invalid string length"));
    }
    Ok(Value::String(text.repeat(count as usize)))
}

fn string_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut text = this_string(interp, this)?;
    for value in args {
        text.push_str(&interp.to_js_string(value)?);
    }
    Ok(Value::String(text))
}

fn string_split(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => {
            let number = interp.to_number(&other)?;
            to_uint32(number) as usize
        }
    };
    let separator = arg(args, 0);
    let mut parts: Vec<Value> = if let Some((regex, _, _)) = regexp_data(&separator) {
        split_by_regex(interp, &regex, &text)?
    } else if separator.is_nullish() {
        vec![Value::String(text)]
    } else {
        let separator = interp.to_js_string(&separator)?;
        if separator.is_empty() {
            text.chars().map(|ch| Value::String(ch.to_string())).collect()
        } else {
            text.split(separator.as_str()).map(Value::from).collect()
        }
    };
    parts.truncate(limit);
    Ok(interp.new_array(parts))
}

fn split_by_regex(interp: &mut Interpreter, regex: &Regex, text: &str) -> JsResult<Vec<Value>> {
    let matches = regex
        .captures_all(text)
        .map_err(|err| interp.syntax_error(err.to_string()))?;
    let mut parts = Vec::new();
    let mut last_end = 0;
    for captures in matches {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() == whole.end() && (whole.start() == last_end || whole.start() >= text.len()) {
            continue;
        }
        parts.push(Value::from(&text[last_end..whole.start()]));
        for group in 1..captures.len() {
            parts.push(
                captures
                    .get(group)
                    .map_or(Value::Undefined, |matched| Value::from(matched.as_str())),
            );
        }
        last_end = whole.end();
    }
    parts.push(Value::from(&text[last_end..]));
    Ok(parts)
}

/// Expands `$&`, `$1`, `$<name>` and friends in a replacement template.
fn expand_replacement(
    template: &str,
    text: &str,
    captures: &Captures,
    names: &[Option<String>],
) -> String {
    let Some(whole) = captures.get(0) else {
        return template.to_string();
    };
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(whole.as_str());
            }
            Some('`') => {
                chars.next();
                out.push_str(&text[..whole.start()]);
            }
            Some('\'') => {
                chars.next();
                out.push_str(&text[whole.end()..]);
            }
            Some('<') => {
                let rest: String = chars.clone().collect();
                match rest.find('>') {
                    Some(close) if names.iter().any(Option::is_some) => {
                        let name = &rest[1..close];
                        if let Some(index) = names.iter().position(|n| n.as_deref() == Some(name)) {
                            if let Some(matched) = captures.get(index) {
                                out.push_str(matched.as_str());
                            }
                        }
                        for _ in 0..=rest[..close].chars().count() {
                            chars.next();
                        }
                    }
                    _ => out.push('$'),
                }
            }
            Some(digit) if digit.is_ascii_digit() => {
                chars.next();
                let mut index = digit.to_digit(10).unwrap_or(0) as usize;
                if let Some(next) = chars.peek().and_then(|c| c.to_digit(10)) {
                    let two = index * 10 + next as usize;
                    if two > 0 && two < captures.len() {
                        chars.next();
                        index = two;
                    }
                }
                if index > 0 && index < captures.len() {
                    if let Some(matched) = captures.get(index) {
                        out.push_str(matched.as_str());
                    }
                } else {
                    out.push('$');
                    out.push(digit);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

fn replacement_for(
    interp: &mut Interpreter,
    replacer: &Value,
    text: &str,
    captures: &Captures,
    names: &[Option<String>],
) -> JsResult<String> {
    if !replacer.is_callable() {
        let template = interp.to_js_string(replacer)?;
        return Ok(expand_replacement(&template, text, captures, names));
    }
    let whole = captures.get(0);
    let mut call_args = vec![Value::from(whole.map_or("", |m| m.as_str()))];
    for group in 1..captures.len() {
        call_args.push(
            captures
                .get(group)
                .map_or(Value::Undefined, |matched| Value::from(matched.as_str())),
        );
    }
    call_args.push(Value::from(byte_to_char(text, whole.map_or(0, |m| m.start()))));
    call_args.push(Value::from(text));
    let result = interp.call_function(replacer, Value::Undefined, call_args)?;
    interp.to_js_string(&result)
}

fn replace_impl(interp: &mut Interpreter, this: &Value, args: &[Value], all: bool) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let pattern = arg(args, 0);
    let replacer = arg(args, 1);

    let (regex, global) = match regexp_data(&pattern) {
        Some((regex, flags, _)) => {
            if all && !flags.contains('g') {
                return Err(interp.type_error("replaceAll must be called with a global RegExp"));
            }
            (regex, flags.contains('g'))
        }
        None => {
            let needle = interp.to_js_string(&pattern)?;
            let regex = Regex::compile(&regex_escape(&needle), "")
                .map_err(|err| interp.syntax_error(err.to_string()))?;
            (regex, all)
        }
    };
    let names = regex.group_names();
    let matches = if global {
        regex.captures_all(&text)
    } else {
        regex
            .captures_from_pos(&text, 0)
            .map(|found| found.into_iter().collect())
    }
    .map_err(|err| interp.syntax_error(err.to_string()))?;
    if global {
        if let Value::Object(object) = &pattern {
            object.set_hidden("lastIndex", Value::Number(0.0));
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in &matches {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        out.push_str(&text[last_end..whole.start()]);
        out.push_str(&replacement_for(interp, &replacer, &text, captures, &names)?);
        last_end = whole.end();
    }
    out.push_str(&text[last_end..]);
    Ok(Value::String(out))
}

fn regex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if "\\.*+?()[]{}|^$/".contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn string_replace(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    replace_impl(interp, this, args, false)
}

fn string_replace_all(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    replace_impl(interp, this, args, true)
}

fn coerce_regexp(interp: &mut Interpreter, value: &Value) -> JsResult<Value> {
    if regexp_data(value).is_some() {
        return Ok(value.clone());
    }
    let source = match value {
        Value::Undefined => "(?:)".to_string(),
        other => interp.to_js_string(other)?,
    };
    new_regexp(interp, &source, "")
}

fn string_match(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let regexp = coerce_regexp(interp, &arg(args, 0))?;
    let Some((regex, flags, _)) = regexp_data(&regexp) else {
        return Ok(Value::Null);
    };
    if !flags.contains('g') {
        return regexp_exec(interp, &regexp, &[Value::String(text)]);
    }
    let matches = regex
        .captures_all(&text)
        .map_err(|err| interp.syntax_error(err.to_string()))?;
    if let Value::Object(object) = &regexp {
        object.set_hidden("lastIndex", Value::Number(0.0));
    }
    if matches.is_empty() {
        return Ok(Value::Null);
    }
    let found = matches
        .iter()
        .filter_map(|captures| captures.get(0).map(|m| Value::from(m.as_str())))
        .collect();
    Ok(interp.new_array(found))
}

fn string_search(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let regexp = coerce_regexp(interp, &arg(args, 0))?;
    let Some((regex, _, _)) = regexp_data(&regexp) else {
        return Ok(Value::Number(-1.0));
    };
    let found = regex
        .captures_from_pos(&text, 0)
        .map_err(|err| interp.syntax_error(err.to_string()))?;
    Ok(Value::Number(
        found
            .and_then(|captures| captures.get(0).map(|m| byte_to_char(&text, m.start()) as f64))
            .unwrap_or(-1.0),
    ))
}

fn string_normalize(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let form = match arg(args, 0) {
        Value::Undefined => "NFC".to_string(),
        other => interp.to_js_string(&other)?,
    };
    let normalized = match form.as_str() {
        "NFC" => text.nfc().collect(),
        "NFD" => text.nfd().collect(),
        "NFKC" => text.nfkc().collect(),
        "NFKD" => text.nfkd().collect(),
        _ => {
            return Err(interp.range_error(format!(
                "The normalization form should be one of NFC, NFD, NFKC, NFKD. Received {form}"
            )));
        }
    };
    Ok(Value::String(normalized))
}

fn string_locale_compare(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = this_string(interp, this)?;
    let other = arg_string(interp, args, 0)?;
    Ok(Value::Number(match text.cmp(&other) {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

fn string_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    match this {
        Value::String(_) => Ok(this.clone()),
        _ => Err(interp.type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

// ---- Number / Boolean ----

fn install_number(interp: &mut Interpreter) {
    let prototype = interp.realm.number_prototype.clone();
    let number = constructor(interp, "Number", 1, number_ctor, &prototype);
    method(interp, &number, "isInteger", 1, number_is_integer);
    method(interp, &number, "isSafeInteger", 1, number_is_safe_integer);
    method(interp, &number, "isFinite", 1, number_is_finite);
    method(interp, &number, "isNaN", 1, number_is_nan);
    method(interp, &number, "parseFloat", 1, global_parse_float);
    method(interp, &number, "parseInt", 2, global_parse_int);
    for (name, value) in [
        ("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0),
        ("MIN_SAFE_INTEGER", -9_007_199_254_740_991.0),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        number.set_hidden(name, Value::Number(value));
    }

    method(interp, &prototype, "toString", 1, number_to_string);
    method(interp, &prototype, "toFixed", 1, number_to_fixed);
    method(interp, &prototype, "toPrecision", 1, number_to_precision);
    method(interp, &prototype, "valueOf", 0, number_value_of);
}

fn this_number(interp: &mut Interpreter, this: &Value) -> JsResult<f64> {
    match this {
        Value::Number(value) => Ok(*value),
        _ => Err(interp.type_error("Number.prototype method requires that 'this' be a Number")),
    }
}

fn number_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    if args.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(arg_number(interp, args, 0)?))
}

fn number_is_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(matches!(
        arg(args, 0),
        Value::Number(value) if value.is_finite() && value.fract() == 0.0
    )))
}

fn number_is_safe_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(matches!(
        arg(args, 0),
        Value::Number(value)
            if value.is_finite() && value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_991.0
    )))
}

fn number_is_finite(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(value) if value.is_finite())))
}

fn number_is_nan(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(value) if value.is_nan())))
}

fn number_to_string(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let value = this_number(interp, this)?;
    let radix = arg_integer(interp, args, 0, 10.0)?;
    if !(2.0..=36.0).contains(&radix) {
        return Err(interp.range_error("toString() radix must be between 2 and 36"));
    }
    Ok(Value::String(format_number_radix(value, radix as u32)))
}

fn number_to_fixed(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let value = this_number(interp, this)?;
    let digits = arg_integer(interp, args, 0, 0.0)?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(interp.range_error("toFixed() digits argument must be between 0 and 100"));
    }
    if !value.is_finite() || value.abs() >= 1e21 {
        return Ok(Value::String(format_number(value)));
    }
    // -0 prints without a sign.
    let value = if value == 0.0 { 0.0 } else { value };
    let digits = digits as usize;
    let scaled = value * 10f64.powi(digits as i32);
    // Exact halves round away from zero.
    let text = if scaled.fract().abs() == 0.5 {
        let rounded = scaled.trunc() + scaled.signum();
        format!("{:.*}", digits, rounded / 10f64.powi(digits as i32))
    } else {
        format!("{value:.digits$}")
    };
    Ok(Value::String(text))
}

fn number_to_precision(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let value = this_number(interp, this)?;
    if matches!(arg(args, 0), Value::Undefined) || !value.is_finite() {
        return Ok(Value::String(format_number(value)));
    }
    let precision = arg_integer(interp, args, 0, 1.0)?;
    if !(1.0..=100.0).contains(&precision) {
        return Err(interp.range_error("toPrecision() argument must be between 1 and 100"));
    }
    let precision = precision as usize;
    if value == 0.0 {
        return Ok(Value::String(format!("{:.*}", precision - 1, 0.0)));
    }
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -6 || exponent >= precision as i32 {
        let formatted = format!("{:.*e}", precision - 1, value);
        let text = match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
        return Ok(Value::String(text));
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    Ok(Value::String(format!("{value:.decimals$}")))
}

fn number_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::Number(this_number(interp, this)?))
}

fn install_boolean(interp: &mut Interpreter) {
    let prototype = interp.realm.boolean_prototype.clone();
    constructor(interp, "Boolean", 1, boolean_ctor, &prototype);
    method(interp, &prototype, "toString", 0, boolean_to_string);
    method(interp, &prototype, "valueOf", 0, boolean_value_of);
}

fn boolean_ctor(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(arg(args, 0).truthy()))
}

fn boolean_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    match this {
        Value::Bool(value) => Ok(Value::String(value.to_string())),
        _ => Err(interp.type_error("Boolean.prototype.toString requires that 'this' be a Boolean")),
    }
}

fn boolean_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    match this {
        Value::Bool(_) => Ok(this.clone()),
        _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
    }
}

// ---- Errors ----

fn install_errors(interp: &mut Interpreter) {
    let error_prototype = interp.realm.error_prototype.clone();
    constructor(interp, "Error", 1, error_ctor, &error_prototype);
    error_prototype.set_hidden("name", Value::from("Error"));
    error_prototype.set_hidden("message", Value::from(""));
    method(interp, &error_prototype, "toString", 0, error_to_string);

    let subtypes: [(&'static str, ObjectRef, BuiltinFn); 4] = [
        ("TypeError", interp.realm.type_error_prototype.clone(), type_error_ctor),
        ("RangeError", interp.realm.range_error_prototype.clone(), range_error_ctor),
        ("SyntaxError", interp.realm.syntax_error_prototype.clone(), syntax_error_ctor),
        ("ReferenceError", interp.realm.reference_error_prototype.clone(), reference_error_ctor),
    ];
    for (name, prototype, ctor) in subtypes {
        constructor(interp, name, 1, ctor, &prototype);
        prototype.set_hidden("name", Value::from(name));
        prototype.set_hidden("message", Value::from(""));
    }
}

fn construct_error(interp: &mut Interpreter, kind: ErrorKind, args: &[Value]) -> JsResult<Value> {
    let error = interp.make_error(kind, "");
    if let Value::Object(object) = &error {
        match arg(args, 0) {
            Value::Undefined => {
                object.borrow_mut().properties.remove("message");
            }
            message => {
                let message = interp.to_js_string(&message)?;
                object.set_hidden("message", Value::String(message));
            }
        }
        let options = arg(args, 1);
        if let Value::Object(options_object) = &options {
            if interp.has_property(options_object, "cause") {
                let cause = interp.get_property(&options, "cause")?;
                object.set_hidden("cause", cause);
            }
        }
    }
    Ok(error)
}

fn error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    construct_error(interp, ErrorKind::Error, args)
}

fn type_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    construct_error(interp, ErrorKind::TypeError, args)
}

fn range_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    construct_error(interp, ErrorKind::RangeError, args)
}

fn syntax_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    construct_error(interp, ErrorKind::SyntaxError, args)
}

fn reference_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    construct_error(interp, ErrorKind::ReferenceError, args)
}

fn error_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    if !matches!(this, Value::Object(_)) {
        return Err(interp.type_error("Error.prototype.toString called on non-object"));
    }
    let name = match interp.get_property(this, "name")? {
        Value::Undefined => "Error".to_string(),
        other => interp.to_js_string(&other)?,
    };
    let message = match interp.get_property(this, "message")? {
        Value::Undefined => String::new(),
        other => interp.to_js_string(&other)?,
    };
    Ok(Value::String(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{name}: {message}"),
    }))
}

// ---- RegExp ----

fn install_regexp(interp: &mut Interpreter) {
    let prototype = interp.realm.regexp_prototype.clone();
    constructor(interp, "RegExp", 2, regexp_ctor, &prototype);
    method(interp, &prototype, "exec", 1, regexp_exec);
    method(interp, &prototype, "test", 1, regexp_test);
    method(interp, &prototype, "toString", 0, regexp_to_string);
}

/// Creates a RegExp object; invalid patterns throw `SyntaxError`.
pub(crate) fn new_regexp(interp: &mut Interpreter, source: &str, flags: &str) -> JsResult<Value> {
    let regex = Regex::compile(source, flags).map_err(|err| {
        interp.syntax_error(format!("Invalid regular expression: /{source}/{flags}: {err}"))
    })?;
    let object = interp.heap.alloc(
        ObjectKind::RegExp(Box::new(RegExpData {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })),
        Some(interp.realm.regexp_prototype.clone()),
    );
    object.set_hidden("source", Value::from(source));
    object.set_hidden("flags", Value::from(flags));
    for (name, flag) in [
        ("global", 'g'),
        ("ignoreCase", 'i'),
        ("multiline", 'm'),
        ("dotAll", 's'),
        ("unicode", 'u'),
        ("sticky", 'y'),
    ] {
        object.set_hidden(name, Value::Bool(flags.contains(flag)));
    }
    object.set_hidden("lastIndex", Value::Number(0.0));
    Ok(Value::Object(object))
}

/// Regex, flags and source of a RegExp object.
fn regexp_data(value: &Value) -> Option<(Regex, String, String)> {
    let object = value.as_object()?;
    match &object.borrow().kind {
        ObjectKind::RegExp(data) => Some((data.regex.clone(), data.flags.clone(), data.source.clone())),
        _ => None,
    }
}

fn regexp_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let pattern = arg(args, 0);
    let explicit_flags = match arg(args, 1) {
        Value::Undefined => None,
        other => Some(interp.to_js_string(&other)?),
    };
    if let Some((_, flags, source)) = regexp_data(&pattern) {
        return new_regexp(interp, &source, &explicit_flags.unwrap_or(flags));
    }
    let source = match pattern {
        Value::Undefined => "(?:)".to_string(),
        other => interp.to_js_string(&other)?,
    };
    new_regexp(interp, &source, &explicit_flags.unwrap_or_default())
}

fn regexp_exec(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let Some((regex, flags, _)) = regexp_data(this) else {
        return Err(interp.type_error("RegExp.prototype.exec called on incompatible receiver"));
    };
    let text = arg_string(interp, args, 0)?;
    let tracks_last_index = flags.contains('g') || flags.contains('y');
    let start = if tracks_last_index {
        let last_index = interp.get_property(this, "lastIndex")?;
        let last_index = interp.to_number(&last_index)?;
        let last_index = if last_index.is_nan() { 0.0 } else { last_index.trunc().max(0.0) };
        if last_index as usize > text.chars().count() {
            interp.set_property(this, "lastIndex", Value::Number(0.0))?;
            return Ok(Value::Null);
        }
        char_to_byte(&text, last_index as usize)
    } else {
        0
    };

    let found = regex
        .captures_from_pos(&text, start)
        .map_err(|err| interp.syntax_error(err.to_string()))?;
    let found = found.filter(|captures| {
        !flags.contains('y') || captures.get(0).is_some_and(|whole| whole.start() == start)
    });
    let Some(captures) = found else {
        if tracks_last_index {
            interp.set_property(this, "lastIndex", Value::Number(0.0))?;
        }
        return Ok(Value::Null);
    };
    let Some(whole) = captures.get(0) else {
        return Ok(Value::Null);
    };
    if tracks_last_index {
        let end = byte_to_char(&text, whole.end());
        interp.set_property(this, "lastIndex", Value::from(end))?;
    }

    let elements = (0..captures.len())
        .map(|group| {
            captures
                .get(group)
                .map_or(Value::Undefined, |matched| Value::from(matched.as_str()))
        })
        .collect();
    let result = interp.new_array(elements);
    if let Value::Object(object) = &result {
        object.set_data("index", Value::from(byte_to_char(&text, whole.start())));
        object.set_data("input", Value::from(text.as_str()));
        let names = regex.group_names();
        let groups = if names.iter().any(Option::is_some) {
            let groups = interp.new_object();
            for (index, name) in names.iter().enumerate() {
                if let Some(name) = name {
                    groups.set_data(
                        name,
                        captures
                            .get(index)
                            .map_or(Value::Undefined, |matched| Value::from(matched.as_str())),
                    );
                }
            }
            Value::Object(groups)
        } else {
            Value::Undefined
        };
        object.set_data("groups", groups);
    }
    Ok(result)
}

fn regexp_test(interp: &mut Interpreter, this: &Value, args: &[Value]) -> JsResult<Value> {
    let result = regexp_exec(interp, this, args)?;
    Ok(Value::Bool(!matches!(result, Value::Null)))
}

fn regexp_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> JsResult<Value> {
    match regexp_data(this) {
        Some((_, flags, source)) => Ok(Value::String(format!("/{source}/{flags}"))),
        None => Err(interp.type_error("RegExp.prototype.toString called on incompatible receiver")),
    }
}

// ---- Math ----

fn install_math(interp: &mut Interpreter) {
    let math = interp.new_object();
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        math.set_hidden(name, Value::Number(value));
    }
    method(interp, &math, "abs", 1, math_abs);
    method(interp, &math, "floor", 1, math_floor);
    method(interp, &math, "ceil", 1, math_ceil);
    method(interp, &math, "round", 1, math_round);
    method(interp, &math, "trunc", 1, math_trunc);
    method(interp, &math, "sign", 1, math_sign);
    method(interp, &math, "sqrt", 1, math_sqrt);
    method(interp, &math, "cbrt", 1, math_cbrt);
    method(interp, &math, "exp", 1, math_exp);
    method(interp, &math, "log", 1, math_log);
    method(interp, &math, "log2", 1, math_log2);
    method(interp, &math, "log10", 1, math_log10);
    method(interp, &math, "sin", 1, math_sin);
    method(interp, &math, "cos", 1, math_cos);
    method(interp, &math, "tan", 1, math_tan);
    method(interp, &math, "asin", 1, math_asin);
    method(interp, &math, "acos", 1, math_acos);
    method(interp, &math, "atan", 1, math_atan);
    method(interp, &math, "atan2", 2, math_atan2);
    method(interp, &math, "pow", 2, math_pow);
    method(interp, &math, "hypot", 2, math_hypot);
    method(interp, &math, "min", 2, math_min);
    method(interp, &math, "max", 2, math_max);
    method(interp, &math, "random", 0, math_random);
    interp.define_global("Math", Value::Object(math), true);
}

fn unary_math(interp: &mut Interpreter, args: &[Value], f: fn(f64) -> f64) -> JsResult<Value> {
    Ok(Value::Number(f(arg_number(interp, args, 0)?)))
}

fn math_abs(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::abs)
}

fn math_floor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::floor)
}

fn math_ceil(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::ceil)
}

fn math_round(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, |value| {
        if !value.is_finite() {
            return value;
        }
        let floor = value.floor();
        if value - floor >= 0.5 { floor + 1.0 } else { floor }
    })
}

fn math_trunc(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::trunc)
}

fn math_sign(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, |value| {
        if value.is_nan() || value == 0.0 {
            value
        } else {
            value.signum()
        }
    })
}

fn math_sqrt(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::sqrt)
}

fn math_cbrt(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::cbrt)
}

fn math_exp(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::exp)
}

fn math_log(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::ln)
}

fn math_log2(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::log2)
}

fn math_log10(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::log10)
}

fn math_sin(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::sin)
}

fn math_cos(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::cos)
}

fn math_tan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::tan)
}

fn math_asin(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::asin)
}

fn math_acos(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::acos)
}

fn math_atan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    unary_math(interp, args, f64::atan)
}

fn math_atan2(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let y = arg_number(interp, args, 0)?;
    let x = arg_number(interp, args, 1)?;
    Ok(Value::Number(y.atan2(x)))
}

fn math_pow(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let base = arg(args, 0);
    let exponent = arg(args, 1);
    interp.binary_op(super::ast::BinaryOp::Pow, &base, &exponent)
}

fn math_hypot(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut sum = 0.0;
    for value in args {
        let number = interp.to_number(value)?;
        if number.is_infinite() {
            return Ok(Value::Number(f64::INFINITY));
        }
        sum += number * number;
    }
    Ok(Value::Number(sum.sqrt()))
}

fn math_min(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut result = f64::INFINITY;
    for value in args {
        let number = interp.to_number(value)?;
        if number.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if number < result || (number == 0.0 && result == 0.0 && number.is_sign_negative()) {
            result = number;
        }
    }
    Ok(Value::Number(result))
}

fn math_max(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let number = interp.to_number(value)?;
        if number.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if number > result || (number == 0.0 && result == 0.0 && result.is_sign_negative()) {
            result = number;
        }
    }
    Ok(Value::Number(result))
}

fn math_random(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    // xorshift64*: deterministic, so page runs are reproducible.
    let mut x = interp.rng_state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    interp.rng_state = if x == 0 { 0xA5A5_A5A5_A5A5_A5A5 } else { x };
    let out = x.wrapping_mul(0x2545_F491_4F6C_DD1D);
    Ok(Value::Number((out >> 11) as f64 * (1.0 / (1u64 << 53) as f64)))
}

// ---- JSON ----

fn install_json(interp: &mut Interpreter) {
    let json_object = interp.new_object();
    method(interp, &json_object, "stringify", 3, json::json_stringify);
    method(interp, &json_object, "parse", 2, json::json_parse);
    interp.define_global("JSON", Value::Object(json_object), true);
}

// ---- global functions ----

fn install_global_functions(interp: &mut Interpreter) {
    global_function(interp, "parseInt", 2, global_parse_int);
    global_function(interp, "parseFloat", 1, global_parse_float);
    global_function(interp, "isNaN", 1, global_is_nan);
    global_function(interp, "isFinite", 1, global_is_finite);
    global_function(interp, "encodeURIComponent", 1, global_encode_uri_component);
    global_function(interp, "encodeURI", 1, global_encode_uri);
    global_function(interp, "decodeURIComponent", 1, global_decode_uri_component);
    global_function(interp, "decodeURI", 1, global_decode_uri);
}

fn global_parse_int(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    let radix = to_int32(arg_number(interp, args, 1)?);
    Ok(Value::Number(parse_int(&text, radix)))
}

fn parse_int(text: &str, radix: i32) -> f64 {
    let text = text.trim_start_matches(is_js_whitespace);
    let (sign, mut digits) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = radix;
    let has_hex_prefix = digits.starts_with("0x") || digits.starts_with("0X");
    if radix == 0 {
        radix = if has_hex_prefix { 16 } else { 10 };
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && has_hex_prefix {
        digits = &digits[2..];
    }
    let mut value = 0f64;
    let mut any = false;
    for ch in digits.chars() {
        let Some(digit) = ch.to_digit(radix as u32) else {
            break;
        };
        any = true;
        value = value * f64::from(radix) + f64::from(digit);
    }
    if any { sign * value } else { f64::NAN }
}

fn global_parse_float(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    Ok(Value::Number(parse_float(&text)))
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start_matches(is_js_whitespace);
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.starts_with("Infinity") {
        return if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut longest = None;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
                longest = Some(end);
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            b'e' | b'E' if seen_digit => {
                let mut probe = end + 1;
                if matches!(bytes.get(probe), Some(b'+' | b'-')) {
                    probe += 1;
                }
                let exponent_start = probe;
                while bytes.get(probe).is_some_and(u8::is_ascii_digit) {
                    probe += 1;
                }
                if probe > exponent_start {
                    longest = Some(probe);
                }
                break;
            }
            _ => break,
        }
    }
    longest
        .and_then(|end| text[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn global_is_nan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(arg_number(interp, args, 0)?.is_nan()))
}

fn global_is_finite(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    Ok(Value::Bool(arg_number(interp, args, 0)?.is_finite()))
}

const URI_UNRESERVED: &str = "-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,#";

fn encode_uri(text: &str, keep: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || keep.contains(ch) {
            out.push(ch);
        } else {
            let mut buffer = [0u8; 4];
            for byte in ch.encode_utf8(&mut buffer).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_uri(text: &str, preserve: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = text.get(i + 1..i + 3)?;
        let byte = u8::from_str_radix(hex, 16).ok()?;
        if byte.is_ascii() && preserve.contains(byte as char) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(byte);
        }
        i += 3;
    }
    String::from_utf8(out).ok()
}

fn uri_error(interp: &Interpreter) -> Abrupt {
    let error = interp.make_error(ErrorKind::Error, "URI malformed");
    if let Value::Object(object) = &error {
        object.set_hidden("name", Value::from("URIError"));
    }
    Abrupt::Throw(error)
}

fn global_encode_uri_component(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    Ok(Value::String(encode_uri(&text, URI_UNRESERVED)))
}

fn global_encode_uri(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    let keep = format!("{URI_UNRESERVED}{URI_RESERVED}");
    Ok(Value::String(encode_uri(&text, &keep)))
}

fn global_decode_uri_component(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    decode_uri(&text, "")
        .map(Value::String)
        .ok_or_else(|| uri_error(interp))
}

fn global_decode_uri(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = arg_string(interp, args, 0)?;
    decode_uri(&text, URI_RESERVED)
        .map(Value::String)
        .ok_or_else(|| uri_error(interp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_handles_prefixes_and_radix() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("0x1F", 0), 31.0);
        assert_eq!(parse_int("-101", 2), -5.0);
        assert!(parse_int("zz", 10).is_nan());
        assert!(parse_int("1", 40).is_nan());
    }

    #[test]
    fn parse_float_takes_longest_numeric_prefix() {
        assert_eq!(parse_float("3.25em"), 3.25);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn uri_component_round_trip_covers_multibyte() {
        let encoded = encode_uri("a b/ü", URI_UNRESERVED);
        assert_eq!(encoded, "a%20b%2F%C3%BC");
        assert_eq!(decode_uri(&encoded, "").as_deref(), Some("a b/ü"));
        assert_eq!(decode_uri("%E0%A4%A", ""), None);
    }
}
