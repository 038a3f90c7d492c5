use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::HostFn;
use super::ast::FunctionDecl;
use super::interpreter::{Interpreter, ScopeRef};
use super::regex::Regex;

pub(crate) type JsResult<T> = std::result::Result<T, Abrupt>;

pub(crate) type BuiltinFn = fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value>;

/// Non-local exit out of expression evaluation.
#[derive(Debug, Clone)]
pub(crate) enum Abrupt {
    Throw(Value),
    /// A nullish base inside an optional chain; caught at the chain boundary.
    ShortCircuit,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
}

impl Value {
    pub(crate) fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub(crate) fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub(crate) fn is_callable(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_callable)
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::Object(_) => true,
        }
    }

    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(object) if object.is_callable() => "function",
            Self::Object(_) => "object",
        }
    }

    pub(crate) fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// SameValueZero, as used by `includes`.
    pub(crate) fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

#[derive(Clone)]
pub(crate) struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            properties: PropertyMap::default(),
            prototype,
            kind,
        })))
    }

    pub(crate) fn borrow(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }

    pub(crate) fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    pub(crate) fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    pub(crate) fn prototype(&self) -> Option<ObjectRef> {
        self.borrow().prototype.clone()
    }

    pub(crate) fn function_kind(&self) -> Option<FunctionKind> {
        match &self.borrow().kind {
            ObjectKind::Function(kind) => Some(kind.clone()),
            _ => None,
        }
    }

    pub(crate) fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.borrow().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    pub(crate) fn own_property(&self, key: &str) -> Option<Property> {
        self.borrow().properties.get(key).cloned()
    }

    /// Defines or overwrites an enumerable data property.
    pub(crate) fn set_data(&self, key: &str, value: Value) {
        self.borrow_mut().properties.insert(
            key.to_string(),
            Property::Data {
                value,
                enumerable: true,
            },
        );
    }

    /// Defines a non-enumerable data property (built-in methods and the like).
    pub(crate) fn set_hidden(&self, key: &str, value: Value) {
        self.borrow_mut().properties.insert(
            key.to_string(),
            Property::Data {
                value,
                enumerable: false,
            },
        );
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(f, "Object({})", data.kind.label()),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

/// Every object allocated by one interpreter, tracked weakly.
///
/// Closures capture the scope that holds them and objects may point at each
/// other, so reference counting alone never frees a finished page. [`release`]
/// empties every live object and breaks those cycles.
///
/// [`release`]: Heap::release
#[derive(Default)]
pub(crate) struct Heap {
    objects: RefCell<Vec<Weak<RefCell<ObjectData>>>>,
    next_sweep: Cell<usize>,
}

const MIN_SWEEP_THRESHOLD: usize = 1024;

impl Heap {
    pub(crate) fn alloc(&self, kind: ObjectKind, prototype: Option<ObjectRef>) -> ObjectRef {
        let object = ObjectRef::new(kind, prototype);
        let mut objects = self.objects.borrow_mut();
        if objects.len() >= self.next_sweep.get().max(MIN_SWEEP_THRESHOLD) {
            objects.retain(|weak| weak.strong_count() > 0);
            self.next_sweep.set(objects.len() * 2);
        }
        objects.push(Rc::downgrade(&object.0));
        object
    }

    #[cfg(test)]
    pub(crate) fn live_objects(&self) -> usize {
        self.objects
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Drops the properties, prototype and internal slots of every live object.
    pub(crate) fn release(&self) {
        let objects = std::mem::take(&mut *self.objects.borrow_mut());
        for weak in objects {
            let Some(object) = weak.upgrade() else {
                continue;
            };
            let Ok(mut data) = object.try_borrow_mut() else {
                continue;
            };
            let contents = ObjectData {
                properties: std::mem::take(&mut data.properties),
                prototype: data.prototype.take(),
                kind: std::mem::replace(&mut data.kind, ObjectKind::Ordinary),
            };
            drop(data);
            drop(contents);
        }
        self.next_sweep.set(0);
    }
}

pub(crate) struct ObjectData {
    pub(crate) properties: PropertyMap,
    pub(crate) prototype: Option<ObjectRef>,
    pub(crate) kind: ObjectKind,
}

pub(crate) enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(FunctionKind),
    Error,
    RegExp(Box<RegExpData>),
}

impl ObjectKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Ordinary => "Object",
            Self::Array(_) => "Array",
            Self::Function(_) => "Function",
            Self::Error => "Error",
            Self::RegExp(_) => "RegExp",
        }
    }
}

pub(crate) struct RegExpData {
    pub(crate) source: String,
    pub(crate) flags: String,
    pub(crate) regex: Regex,
}

impl RegExpData {
    pub(crate) fn global(&self) -> bool {
        self.flags.contains('g')
    }

    pub(crate) fn sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

#[derive(Clone)]
pub(crate) enum FunctionKind {
    Script(Rc<Closure>),
    Builtin { name: &'static str, func: BuiltinFn },
    Host(HostFn),
    Bound(Rc<BoundFunction>),
}

pub(crate) struct Closure {
    pub(crate) decl: Rc<FunctionDecl>,
    pub(crate) scope: ScopeRef,
}

pub(crate) struct BoundFunction {
    pub(crate) target: Value,
    pub(crate) this: Value,
    pub(crate) args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub(crate) enum Property {
    Data {
        value: Value,
        enumerable: bool,
    },
    Accessor {
        get: Option<Value>,
        set: Option<Value>,
        enumerable: bool,
    },
}

impl Property {
    pub(crate) fn enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }
}

/// Insertion-ordered property table.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyMap {
    entries: Vec<(String, Property)>,
    index_by_key: HashMap<String, usize>,
}

impl PropertyMap {
    pub(crate) fn get(&self, key: &str) -> Option<&Property> {
        let index = *self.index_by_key.get(key)?;
        self.entries.get(index).map(|(_, property)| property)
    }

    pub(crate) fn insert(&mut self, key: String, property: Property) {
        if let Some(index) = self.index_by_key.get(&key).copied() {
            if let Some((_, existing)) = self.entries.get_mut(index) {
                *existing = property;
                return;
            }
        }
        self.index_by_key.insert(key.clone(), self.entries.len());
        self.entries.push((key, property));
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some(index) = self.index_by_key.remove(key) else {
            return false;
        };
        self.entries.remove(index);
        for (position, (entry_key, _)) in self.entries.iter().enumerate().skip(index) {
            self.index_by_key.insert(entry_key.clone(), position);
        }
        true
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.index_by_key.contains_key(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.entries.iter().map(|(key, property)| (key, property))
    }
}

/// Parses a canonical array index (`"0"`, `"12"`, not `"01"` or `"1.0"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>()
        .ok()
        .filter(|index| *index != u32::MAX)
        .map(|index| index as usize)
}

/// Number to string conversion with ECMAScript formatting.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let abs = value.abs();
    if (1e-6..1e21).contains(&abs) {
        if value.fract() == 0.0 {
            return format!("{value:.0}");
        }
        return format!("{value}");
    }
    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

pub(crate) fn format_number_radix(value: f64, radix: u32) -> String {
    if radix == 10 || !value.is_finite() {
        return format_number(value);
    }
    let negative = value < 0.0;
    let mut int_part = value.abs().trunc();
    let mut frac_part = value.abs().fract();

    let mut digits = Vec::new();
    if int_part == 0.0 {
        digits.push('0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % f64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        int_part = (int_part / f64::from(radix)).trunc();
    }
    digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(digits);
    if frac_part > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac_part *= f64::from(radix);
            let digit = frac_part.trunc() as u32;
            out.push(char::from_digit(digit, radix).unwrap_or('0'));
            frac_part -= frac_part.trunc();
            if frac_part <= f64::EPSILON {
                break;
            }
        }
    }
    out
}

/// `ToNumber` for string input.
pub(crate) fn string_to_number(src: &str) -> f64 {
    let text = src.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{FEFF}');
    if text.is_empty() {
        return 0.0;
    }
    let (sign, unsigned) = match text.as_bytes()[0] {
        b'-' => (-1.0, &text[1..]),
        b'+' => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = text.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            return digits.chars().try_fold(0f64, |acc, ch| {
                ch.to_digit(radix)
                    .map(|digit| acc * f64::from(radix) + f64::from(digit))
            })
            .unwrap_or(f64::NAN);
        }
    }
    let valid = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && unsigned.bytes().any(|b| b.is_ascii_digit());
    if !valid {
        return f64::NAN;
    }
    unsigned
        .parse::<f64>()
        .map(|value| sign * value)
        .unwrap_or(f64::NAN)
}

pub(crate) fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}

pub(crate) fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let modulo = value.trunc().rem_euclid(4_294_967_296.0);
    modulo as u32
}

/// Relative index helper shared by `slice`-style methods.
pub(crate) fn relative_index(value: f64, len: usize) -> usize {
    let len_f = len as f64;
    let value = if value.is_nan() { 0.0 } else { value.trunc() };
    if value < 0.0 {
        (len_f + value).max(0.0) as usize
    } else {
        value.min(len_f) as usize
    }
}
