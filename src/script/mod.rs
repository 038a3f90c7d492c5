//! Embedded scripting runtime.
//!
//! The rest of the crate talks to scripts only through [`ScriptRuntime`] and
//! the interpreter-neutral [`HostValue`] model, so the bundled
//! [`Interpreter`] can be swapped for another engine.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Result;

mod ast;
mod builtins;
mod convert;
mod cursor;
mod interpreter;
mod json;
mod lexer;
mod parser;
mod regex;
mod value;

pub use interpreter::Interpreter;

/// A scripting engine able to receive host bindings and run source text.
pub trait ScriptRuntime {
    /// Defines a global binding visible to every later `run`.
    fn bind(&mut self, name: &str, value: HostValue) -> Result<()>;

    /// Parses and runs one script body. `origin` names the body in errors.
    ///
    /// A syntax error yields `Error::ScriptParse`; an uncaught exception
    /// yields `Error::ScriptRuntime`.
    fn run(&mut self, source: &str, origin: &str) -> Result<HostValue>;
}

/// Native callable exposed to scripts.
pub type HostFn = Rc<dyn Fn(&[HostValue]) -> std::result::Result<HostValue, HostError>>;

/// Values crossing the host / script boundary.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<HostValue>),
    Object(HostObject),
    Function(HostFn),
}

impl HostValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Loose string conversion used for host arguments.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value::format_number(*value),
            Self::String(value) => value.clone(),
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    Self::Undefined | Self::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".into(),
            Self::Function(_) => "function () { [native code] }".into(),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Number(value) => f.debug_tuple("Number").field(value).finish(),
            Self::String(value) => f.debug_tuple("String").field(value).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(object).finish(),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Option<String>> for HostValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::String)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A named property of a [`HostObject`].
#[derive(Clone)]
pub enum HostProperty {
    Value(HostValue),
    Method(HostFn),
    Accessor { get: HostFn, set: Option<HostFn> },
}

/// Host-side object description. Cloning shares the same object, and binding
/// the same object twice yields one script object.
#[derive(Clone, Default)]
pub struct HostObject {
    properties: Rc<RefCell<Vec<(String, HostProperty)>>>,
}

impl HostObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, name: &str, value: impl Into<HostValue>) -> Self {
        self.define(name, HostProperty::Value(value.into()));
        self
    }

    pub fn with_method(
        self,
        name: &str,
        method: impl Fn(&[HostValue]) -> std::result::Result<HostValue, HostError> + 'static,
    ) -> Self {
        self.define(name, HostProperty::Method(Rc::new(method)));
        self
    }

    pub fn with_accessor(
        self,
        name: &str,
        get: impl Fn(&[HostValue]) -> std::result::Result<HostValue, HostError> + 'static,
        set: Option<HostFn>,
    ) -> Self {
        self.define(
            name,
            HostProperty::Accessor {
                get: Rc::new(get),
                set,
            },
        );
        self
    }

    /// Adds or replaces `name`.
    pub fn define(&self, name: &str, property: HostProperty) {
        let mut properties = self.properties.borrow_mut();
        match properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = property,
            None => properties.push((name.to_string(), property)),
        }
    }

    pub fn get(&self, name: &str) -> Option<HostProperty> {
        self.properties
            .borrow()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, property)| property.clone())
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties
            .borrow()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn properties(&self) -> Vec<(String, HostProperty)> {
        self.properties.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.properties) as *const () as usize
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("properties", &self.property_names())
            .finish()
    }
}

/// Error raised by a native callable; surfaces in script as a thrown error
/// object of type `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub name: String,
    pub message: String,
}

impl HostError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for HostError {}
