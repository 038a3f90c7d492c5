use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{
    Argument, ArrayElement, AssignOp, BinaryOp, DeclKind, Expr, ForTarget, FunctionBody,
    FunctionDecl, LogicalOp, MemberKey, PropertyDef, PropertyKey, Stmt, SwitchCase, UnaryOp,
    UpdateOp, collect_var_names,
};
use super::builtins::{self, Realm};
use super::convert::{self, HostBindings};
use super::parser::parse_program;
use super::value::{
    Abrupt, BuiltinFn, Closure, FunctionKind, Heap, JsResult, ObjectKind, ObjectRef, Property,
    Value, array_index, format_number, string_to_number, to_int32, to_uint32,
};
use super::{HostError, HostFn, HostValue, ScriptRuntime};
use crate::{Error, Result};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

pub(crate) const DEFAULT_MAX_CALL_DEPTH: usize = 512;

pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Default)]
pub(crate) struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
}

struct Binding {
    value: Value,
    mutable: bool,
}

impl Scope {
    fn root() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        }))
    }
}

fn declare(scope: &ScopeRef, name: &str, value: Value, mutable: bool) {
    scope
        .borrow_mut()
        .bindings
        .insert(name.to_string(), Binding { value, mutable });
}

fn has_own_binding(scope: &ScopeRef, name: &str) -> bool {
    scope.borrow().bindings.contains_key(name)
}

fn lookup_binding(scope: &ScopeRef, name: &str) -> Option<(Value, bool)> {
    let mut current = Some(scope.clone());
    while let Some(frame) = current {
        let data = frame.borrow();
        if let Some(binding) = data.bindings.get(name) {
            return Some((binding.value.clone(), binding.mutable));
        }
        current = data.parent.clone();
    }
    None
}

enum AssignOutcome {
    Assigned,
    Constant,
    Missing,
}

fn assign_binding(scope: &ScopeRef, name: &str, value: Value) -> AssignOutcome {
    let mut current = Some(scope.clone());
    while let Some(frame) = current {
        let mut data = frame.borrow_mut();
        if let Some(binding) = data.bindings.get_mut(name) {
            if !binding.mutable {
                return AssignOutcome::Constant;
            }
            binding.value = value;
            return AssignOutcome::Assigned;
        }
        current = data.parent.clone();
    }
    AssignOutcome::Missing
}

/// Statement completion other than a thrown exception.
#[derive(Debug)]
enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

enum LoopControl {
    Next,
    Break,
    Exit(Completion),
}

fn loop_control(completion: Completion, label: Option<&str>) -> LoopControl {
    match completion {
        Completion::Normal | Completion::Continue(None) => LoopControl::Next,
        Completion::Break(None) => LoopControl::Break,
        Completion::Break(Some(target)) if label == Some(target.as_str()) => LoopControl::Break,
        Completion::Continue(Some(target)) if label == Some(target.as_str()) => LoopControl::Next,
        other => LoopControl::Exit(other),
    }
}

/// Assignable location resolved once, so compound forms evaluate their base a
/// single time.
enum Reference {
    Binding(String),
    Property(Value, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
}

impl ErrorKind {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "Error" => Some(Self::Error),
            "TypeError" => Some(Self::TypeError),
            "RangeError" => Some(Self::RangeError),
            "SyntaxError" => Some(Self::SyntaxError),
            "ReferenceError" => Some(Self::ReferenceError),
            _ => None,
        }
    }
}

/// Tree-walking interpreter for the page-script language subset.
///
/// Globals defined through [`ScriptRuntime::bind`] and top-level declarations
/// persist across `run` calls on the same interpreter.
pub struct Interpreter {
    global: ScopeRef,
    pub(crate) heap: Heap,
    pub(crate) realm: Realm,
    pub(crate) host_bindings: HostBindings,
    pub(crate) rng_state: u64,
    call_depth: usize,
    max_call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.global.borrow_mut().bindings.clear();
        self.host_bindings = HostBindings::default();
        self.heap.release();
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_call_depth(DEFAULT_MAX_CALL_DEPTH)
    }

    /// Script calls nested deeper than `max_call_depth` throw a `RangeError`.
    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        let heap = Heap::default();
        let realm = Realm::new(&heap);
        let mut interpreter = Self {
            global: Scope::root(),
            heap,
            realm,
            host_bindings: HostBindings::default(),
            rng_state: 0xA5A5_A5A5_A5A5_A5A5,
            call_depth: 0,
            max_call_depth: max_call_depth.max(1),
        };
        builtins::install(&mut interpreter);
        interpreter
    }

    pub(crate) fn define_global(&mut self, name: &str, value: Value, mutable: bool) {
        declare(&self.global, name, value, mutable);
    }

    // ---- object construction helpers ----

    pub(crate) fn new_object(&self) -> ObjectRef {
        self.heap.alloc(
            ObjectKind::Ordinary,
            Some(self.realm.object_prototype.clone()),
        )
    }

    pub(crate) fn new_array(&self, elements: Vec<Value>) -> Value {
        Value::Object(self.heap.alloc(
            ObjectKind::Array(elements),
            Some(self.realm.array_prototype.clone()),
        ))
    }

    pub(crate) fn new_function(&self, name: &str, arity: usize, kind: FunctionKind) -> ObjectRef {
        let function = self.heap.alloc(
            ObjectKind::Function(kind),
            Some(self.realm.function_prototype.clone()),
        );
        function.set_hidden("name", Value::from(name));
        function.set_hidden("length", Value::from(arity));
        function
    }

    pub(crate) fn builtin_function(
        &self,
        name: &'static str,
        arity: usize,
        func: BuiltinFn,
    ) -> ObjectRef {
        self.new_function(name, arity, FunctionKind::Builtin { name, func })
    }

    pub(crate) fn host_function(&self, name: &str, func: HostFn) -> Value {
        Value::Object(self.new_function(name, 0, FunctionKind::Host(func)))
    }

    fn make_closure(&self, decl: Rc<FunctionDecl>, scope: &ScopeRef) -> Value {
        let name = decl.name.clone().unwrap_or_default();
        let arity = decl
            .params
            .iter()
            .take_while(|param| param.default.is_none() && !param.rest)
            .count();
        let is_arrow = decl.is_arrow;
        let function = self.new_function(
            &name,
            arity,
            FunctionKind::Script(Rc::new(Closure {
                decl,
                scope: scope.clone(),
            })),
        );
        if !is_arrow {
            let prototype = self.new_object();
            prototype.set_hidden("constructor", Value::Object(function.clone()));
            function.set_hidden("prototype", Value::Object(prototype));
        }
        Value::Object(function)
    }

    fn make_function_expression(&self, decl: &Rc<FunctionDecl>, scope: &ScopeRef) -> Value {
        match (&decl.name, decl.is_arrow) {
            (Some(name), false) => {
                let own_scope = Scope::child(scope);
                let function = self.make_closure(decl.clone(), &own_scope);
                declare(&own_scope, name, function.clone(), false);
                function
            }
            _ => self.make_closure(decl.clone(), scope),
        }
    }

    /// Compiles `function anonymous(params) { body }` against the global scope.
    pub(crate) fn compile_function(&mut self, params: &str, body: &str) -> JsResult<Value> {
        let source = format!("(function anonymous({params}\n) {{\n{body}\n}})");
        let program = parse_program(&source).map_err(|err| self.syntax_error(err.to_string()))?;
        match program.as_slice() {
            [Stmt::Expr(expr @ Expr::Function(_))] => {
                let global = self.global.clone();
                self.eval_expr(expr, &global)
            }
            _ => Err(self.syntax_error("Invalid function body")),
        }
    }

    // ---- errors ----

    pub(crate) fn make_error(&self, kind: ErrorKind, message: &str) -> Value {
        let prototype = match kind {
            ErrorKind::Error => &self.realm.error_prototype,
            ErrorKind::TypeError => &self.realm.type_error_prototype,
            ErrorKind::RangeError => &self.realm.range_error_prototype,
            ErrorKind::SyntaxError => &self.realm.syntax_error_prototype,
            ErrorKind::ReferenceError => &self.realm.reference_error_prototype,
        };
        let error = self.heap.alloc(ObjectKind::Error, Some(prototype.clone()));
        error.set_hidden("message", Value::from(message));
        Value::Object(error)
    }

    pub(crate) fn throw(&self, kind: ErrorKind, message: impl AsRef<str>) -> Abrupt {
        Abrupt::Throw(self.make_error(kind, message.as_ref()))
    }

    pub(crate) fn type_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw(ErrorKind::TypeError, message)
    }

    pub(crate) fn range_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw(ErrorKind::RangeError, message)
    }

    pub(crate) fn syntax_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw(ErrorKind::SyntaxError, message)
    }

    fn host_error(&self, err: HostError) -> Abrupt {
        match ErrorKind::from_name(&err.name) {
            Some(kind) => self.throw(kind, &err.message),
            None => {
                let error = self.make_error(ErrorKind::Error, &err.message);
                if let Value::Object(object) = &error {
                    object.set_hidden("name", Value::from(err.name.as_str()));
                }
                Abrupt::Throw(error)
            }
        }
    }

    fn uncaught(&mut self, abrupt: Abrupt, origin: &str) -> Error {
        let summary = match abrupt {
            Abrupt::Throw(value) => self.error_summary(&value),
            Abrupt::ShortCircuit => "undefined".to_string(),
        };
        Error::ScriptRuntime(format!("{origin}: Uncaught {summary}"))
    }

    /// `Name: message` for error-like values, the string form otherwise.
    pub(crate) fn error_summary(&mut self, value: &Value) -> String {
        if let Value::Object(object) = value {
            let is_error = matches!(object.borrow().kind, ObjectKind::Error);
            if is_error {
                let name = self
                    .get_property(value, "name")
                    .and_then(|name| self.to_js_string(&name))
                    .unwrap_or_else(|_| "Error".to_string());
                let message = self
                    .get_property(value, "message")
                    .and_then(|message| self.to_js_string(&message))
                    .unwrap_or_default();
                return if message.is_empty() {
                    name
                } else {
                    format!("{name}: {message}")
                };
            }
        }
        self.to_js_string(value)
            .unwrap_or_else(|_| "[object]".to_string())
    }

    // ---- program execution ----

    fn run_program(&mut self, program: &[Stmt]) -> JsResult<Value> {
        let global = self.global.clone();
        let mut var_names = Vec::new();
        collect_var_names(program, &mut var_names);
        for name in var_names {
            if !has_own_binding(&global, &name) {
                declare(&global, &name, Value::Undefined, true);
            }
        }
        self.hoist_functions(program, &global);

        let mut last = Value::Undefined;
        for stmt in program {
            match stmt {
                Stmt::Expr(expr) => last = self.eval_expr(expr, &global)?,
                other => {
                    self.exec_stmt(other, &global)?;
                }
            }
        }
        Ok(last)
    }

    fn hoist_functions(&mut self, stmts: &[Stmt], scope: &ScopeRef) {
        for stmt in stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if let Some(name) = &decl.name {
                    let function = self.make_closure(decl.clone(), scope);
                    declare(scope, name, function, true);
                }
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> JsResult<Completion> {
        let block_scope = Scope::child(scope);
        self.hoist_functions(stmts, &block_scope);
        self.exec_stmts(stmts, &block_scope)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> JsResult<Completion> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> JsResult<Completion> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_stmt_inner(stmt, scope)
        })
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt, scope: &ScopeRef) -> JsResult<Completion> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::VarDecl { kind, decls } => {
                for (name, init) in decls {
                    self.exec_declarator(*kind, name, init.as_ref(), scope)?;
                }
                Ok(Completion::Normal)
            }
            Stmt::FunctionDecl(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, scope)?.truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::Block(stmts) => self.exec_block(stmts, scope),
            Stmt::For { .. }
            | Stmt::ForIn { .. }
            | Stmt::ForOf { .. }
            | Stmt::While { .. }
            | Stmt::DoWhile { .. } => self.exec_loop(stmt, scope, None),
            Stmt::Break(label) => Ok(Completion::Break(label.clone())),
            Stmt::Continue(label) => Ok(Completion::Continue(label.clone())),
            Stmt::Throw(expr) => {
                let value = self.eval_expr(expr, scope)?;
                Err(Abrupt::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, scope);
                if let Some(handler) = handler {
                    if let Err(Abrupt::Throw(thrown)) = result {
                        let catch_scope = Scope::child(scope);
                        if let Some(param) = &handler.param {
                            declare(&catch_scope, param, thrown, true);
                        }
                        result = self.exec_block(&handler.body, &catch_scope);
                    }
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, scope)? {
                        Completion::Normal => {}
                        overriding => return Ok(overriding),
                    }
                }
                result
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, scope),
            Stmt::Labeled(label, body) => {
                let completion = match body.as_ref() {
                    Stmt::For { .. }
                    | Stmt::ForIn { .. }
                    | Stmt::ForOf { .. }
                    | Stmt::While { .. }
                    | Stmt::DoWhile { .. } => self.exec_loop(body, scope, Some(label))?,
                    other => self.exec_stmt(other, scope)?,
                };
                match completion {
                    Completion::Break(Some(target)) if &target == label => Ok(Completion::Normal),
                    other => Ok(other),
                }
            }
        }
    }

    fn exec_declarator(
        &mut self,
        kind: DeclKind,
        name: &str,
        init: Option<&Expr>,
        scope: &ScopeRef,
    ) -> JsResult<()> {
        match kind {
            DeclKind::Var => {
                let Some(init) = init else {
                    return Ok(());
                };
                let value = self.eval_named(init, name, scope)?;
                if let AssignOutcome::Missing = assign_binding(scope, name, value.clone()) {
                    declare(scope, name, value, true);
                }
            }
            DeclKind::Let | DeclKind::Const => {
                let value = match init {
                    Some(init) => self.eval_named(init, name, scope)?,
                    None => Value::Undefined,
                };
                declare(scope, name, value, kind == DeclKind::Let);
            }
        }
        Ok(())
    }

    fn exec_loop(
        &mut self,
        stmt: &Stmt,
        scope: &ScopeRef,
        label: Option<&str>,
    ) -> JsResult<Completion> {
        match stmt {
            Stmt::While { test, body } => {
                while self.eval_expr(test, scope)?.truthy() {
                    match loop_control(self.exec_stmt(body, scope)?, label) {
                        LoopControl::Next => {}
                        LoopControl::Break => break,
                        LoopControl::Exit(completion) => return Ok(completion),
                    }
                }
            }
            Stmt::DoWhile { body, test } => loop {
                match loop_control(self.exec_stmt(body, scope)?, label) {
                    LoopControl::Next => {}
                    LoopControl::Break => break,
                    LoopControl::Exit(completion) => return Ok(completion),
                }
                if !self.eval_expr(test, scope)?.truthy() {
                    break;
                }
            },
            Stmt::For {
                init,
                test,
                update,
                body,
            } => return self.exec_for(init.as_deref(), test, update, body, scope, label),
            Stmt::ForIn {
                target,
                object,
                body,
            } => {
                let object = self.eval_expr(object, scope)?;
                let keys = self.for_in_keys(&object);
                let values = keys.into_iter().map(Value::String).collect();
                return self.exec_for_each(target, values, body, scope, label);
            }
            Stmt::ForOf {
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval_expr(iterable, scope)?;
                let values = self.iterate(&iterable)?;
                return self.exec_for_each(target, values, body, scope, label);
            }
            _ => return self.exec_stmt(stmt, scope),
        }
        Ok(Completion::Normal)
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: &Option<Expr>,
        update: &Option<Expr>,
        body: &Stmt,
        scope: &ScopeRef,
        label: Option<&str>,
    ) -> JsResult<Completion> {
        let mut iteration_scope = Scope::child(scope);
        let mut per_iteration: Vec<String> = Vec::new();
        if let Some(init) = init {
            if let Stmt::VarDecl {
                kind: DeclKind::Let | DeclKind::Const,
                decls,
            } = init
            {
                per_iteration = decls.iter().map(|(name, _)| name.clone()).collect();
            }
            self.exec_stmt(init, &iteration_scope)?;
        }
        // Each iteration sees its own copy of `let` bindings, so closures
        // created in the body capture that iteration's values.
        let copy_bindings = |from: &ScopeRef| -> ScopeRef {
            let next = Scope::child(scope);
            for name in &per_iteration {
                if let Some(binding) = from.borrow().bindings.get(name) {
                    declare(&next, name, binding.value.clone(), binding.mutable);
                }
            }
            next
        };
        if !per_iteration.is_empty() {
            iteration_scope = copy_bindings(&iteration_scope);
        }
        loop {
            if let Some(test) = test {
                if !self.eval_expr(test, &iteration_scope)?.truthy() {
                    break;
                }
            }
            match loop_control(self.exec_stmt(body, &iteration_scope)?, label) {
                LoopControl::Next => {}
                LoopControl::Break => break,
                LoopControl::Exit(completion) => return Ok(completion),
            }
            if !per_iteration.is_empty() {
                iteration_scope = copy_bindings(&iteration_scope);
            }
            if let Some(update) = update {
                self.eval_expr(update, &iteration_scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_each(
        &mut self,
        target: &ForTarget,
        values: Vec<Value>,
        body: &Stmt,
        scope: &ScopeRef,
        label: Option<&str>,
    ) -> JsResult<Completion> {
        for value in values {
            let iteration_scope = Scope::child(scope);
            match target {
                ForTarget::Decl(DeclKind::Var, name) => {
                    if let AssignOutcome::Missing = assign_binding(scope, name, value.clone()) {
                        declare(&self.global, name, value, true);
                    }
                }
                ForTarget::Decl(kind, name) => {
                    declare(&iteration_scope, name, value, *kind == DeclKind::Let);
                }
                ForTarget::Expr(expr) => {
                    let reference = self.resolve_reference(expr, scope)?;
                    self.put_reference(reference, value, scope)?;
                }
            }
            match loop_control(self.exec_stmt(body, &iteration_scope)?, label) {
                LoopControl::Next => {}
                LoopControl::Break => break,
                LoopControl::Exit(completion) => return Ok(completion),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        scope: &ScopeRef,
    ) -> JsResult<Completion> {
        let value = self.eval_expr(discriminant, scope)?;
        let switch_scope = Scope::child(scope);
        for case in cases {
            self.hoist_functions(&case.body, &switch_scope);
        }

        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test, &switch_scope)?.strict_equals(&value) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };
        for case in &cases[start..] {
            match self.exec_stmts(&case.body, &switch_scope)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    // ---- expressions ----

    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_expr_inner(expr, scope)
        })
    }

    fn eval_expr_inner(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match expr {
            Expr::Number(value) => Ok(Value::Number(*value)),
            Expr::String(value) => Ok(Value::String(value.clone())),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => self.lookup_identifier(name, scope),
            Expr::This => Ok(lookup_binding(scope, "this")
                .map(|(value, _)| value)
                .unwrap_or_default()),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(index) {
                        let value = self.eval_expr(expr, scope)?;
                        out.push_str(&self.to_js_string(&value)?);
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Regex { pattern, flags } => builtins::new_regexp(self, pattern, flags),
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        ArrayElement::Hole => values.push(Value::Undefined),
                        ArrayElement::Expr(expr) => values.push(self.eval_expr(expr, scope)?),
                        ArrayElement::Spread(expr) => {
                            let spread = self.eval_expr(expr, scope)?;
                            values.extend(self.iterate(&spread)?);
                        }
                    }
                }
                Ok(self.new_array(values))
            }
            Expr::Object(props) => self.eval_object_literal(props, scope),
            Expr::Function(decl) => Ok(self.make_function_expression(decl, scope)),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, scope),
            Expr::Update { op, prefix, target } => {
                let reference = self.resolve_reference(target, scope)?;
                let current = self.get_reference(&reference, scope)?;
                let old = self.to_number(&current)?;
                let new = match op {
                    UpdateOp::Inc => old + 1.0,
                    UpdateOp::Dec => old - 1.0,
                };
                self.put_reference(reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval_expr(left, scope)?;
                let short_circuits = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval_expr(right, scope)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval_expr(test, scope)?.truthy() {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            Expr::New { callee, args } => {
                let constructor = self.eval_expr(callee, scope)?;
                let args = self.eval_arguments(args, scope)?;
                if !constructor.is_callable() {
                    return Err(
                        self.type_error(format!("{} is not a constructor", describe_expr(callee)))
                    );
                }
                self.construct(&constructor, args)
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let base = self.eval_expr(object, scope)?;
                if *optional && base.is_nullish() {
                    return Err(Abrupt::ShortCircuit);
                }
                let key = self.member_key(property, scope)?;
                self.get_property(&base, &key)
            }
            Expr::OptionalChain(inner) => match self.eval_expr(inner, scope) {
                Err(Abrupt::ShortCircuit) => Ok(Value::Undefined),
                other => other,
            },
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval_expr(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    /// Evaluates `expr`, naming it `name` when it is an anonymous function.
    fn eval_named(&mut self, expr: &Expr, name: &str, scope: &ScopeRef) -> JsResult<Value> {
        let value = self.eval_expr(expr, scope)?;
        if let (Expr::Function(decl), Value::Object(function)) = (expr, &value) {
            if decl.name.is_none() {
                function.set_hidden("name", Value::from(name));
            }
        }
        Ok(value)
    }

    fn lookup_identifier(&mut self, name: &str, scope: &ScopeRef) -> JsResult<Value> {
        match lookup_binding(scope, name) {
            Some((value, _)) => Ok(value),
            None => Err(self.throw(ErrorKind::ReferenceError, format!("{name} is not defined"))),
        }
    }

    fn member_key(&mut self, key: &MemberKey, scope: &ScopeRef) -> JsResult<String> {
        match key {
            MemberKey::Named(name) => Ok(name.clone()),
            MemberKey::Computed(expr) => {
                let value = self.eval_expr(expr, scope)?;
                self.to_property_key(&value)
            }
        }
    }

    fn eval_object_literal(&mut self, props: &[PropertyDef], scope: &ScopeRef) -> JsResult<Value> {
        let object = self.new_object();
        for prop in props {
            match prop {
                PropertyDef::Init(key, value) => {
                    if let PropertyKey::Static(name) = key {
                        if name == "__proto__" {
                            match self.eval_expr(value, scope)? {
                                Value::Object(prototype) => {
                                    object.borrow_mut().prototype = Some(prototype)
                                }
                                Value::Null => object.borrow_mut().prototype = None,
                                _ => {}
                            }
                            continue;
                        }
                    }
                    let key = self.property_key(key, scope)?;
                    let value = self.eval_named(value, &key, scope)?;
                    object.set_data(&key, value);
                }
                PropertyDef::Getter(key, decl) | PropertyDef::Setter(key, decl) => {
                    let key = self.property_key(key, scope)?;
                    let function = self.make_closure(decl.clone(), scope);
                    let is_getter = matches!(prop, PropertyDef::Getter(..));
                    let (mut get, mut set) = match object.own_property(&key) {
                        Some(Property::Accessor { get, set, .. }) => (get, set),
                        _ => (None, None),
                    };
                    if is_getter {
                        get = Some(function);
                    } else {
                        set = Some(function);
                    }
                    object.borrow_mut().properties.insert(
                        key,
                        Property::Accessor {
                            get,
                            set,
                            enumerable: true,
                        },
                    );
                }
                PropertyDef::Spread(expr) => {
                    let source = self.eval_expr(expr, scope)?;
                    for (key, value) in self.own_enumerable_entries(&source)? {
                        object.set_data(&key, value);
                    }
                }
            }
        }
        Ok(Value::Object(object))
    }

    fn property_key(&mut self, key: &PropertyKey, scope: &ScopeRef) -> JsResult<String> {
        match key {
            PropertyKey::Static(name) => Ok(name.clone()),
            PropertyKey::Computed(expr) => {
                let value = self.eval_expr(expr, scope)?;
                self.to_property_key(&value)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match op {
            UnaryOp::TypeOf => {
                if let Expr::Ident(name) = operand {
                    if lookup_binding(scope, name).is_none() {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.eval_expr(operand, scope)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOp::Delete => match operand {
                Expr::Member {
                    object, property, ..
                } => {
                    let base = self.eval_expr(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    Ok(Value::Bool(self.delete_property(&base, &key)?))
                }
                Expr::Ident(_) => Ok(Value::Bool(false)),
                other => {
                    self.eval_expr(other, scope)?;
                    Ok(Value::Bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval_expr(operand, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(operand, scope)?.truthy())),
            UnaryOp::Neg => {
                let value = self.eval_expr(operand, scope)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.eval_expr(operand, scope)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.eval_expr(operand, scope)?;
                Ok(Value::Number(f64::from(!to_int32(self.to_number(&value)?))))
            }
        }
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        scope: &ScopeRef,
    ) -> JsResult<Value> {
        let reference = self.resolve_reference(target, scope)?;
        let value = match op {
            AssignOp::Assign => match &reference {
                Reference::Binding(name) | Reference::Property(_, name) => {
                    self.eval_named(value, name, scope)?
                }
            },
            AssignOp::Compound(binary) => {
                let current = self.get_reference(&reference, scope)?;
                let rhs = self.eval_expr(value, scope)?;
                self.binary_op(binary, &current, &rhs)?
            }
            AssignOp::Logical(logical) => {
                let current = self.get_reference(&reference, scope)?;
                let keep = match logical {
                    LogicalOp::And => !current.truthy(),
                    LogicalOp::Or => current.truthy(),
                    LogicalOp::Nullish => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval_expr(value, scope)?
            }
        };
        self.put_reference(reference, value.clone(), scope)?;
        Ok(value)
    }

    fn resolve_reference(&mut self, target: &Expr, scope: &ScopeRef) -> JsResult<Reference> {
        match target {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member {
                object, property, ..
            } => {
                let base = self.eval_expr(object, scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property(base, key))
            }
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> JsResult<Value> {
        match reference {
            Reference::Binding(name) => self.lookup_identifier(name, scope),
            Reference::Property(base, key) => self.get_property(base, key),
        }
    }

    fn put_reference(&mut self, reference: Reference, value: Value, scope: &ScopeRef) -> JsResult<()> {
        match reference {
            Reference::Binding(name) => match assign_binding(scope, &name, value.clone()) {
                AssignOutcome::Assigned => Ok(()),
                AssignOutcome::Constant => Err(self.type_error("Assignment to constant variable.")),
                AssignOutcome::Missing => {
                    declare(&self.global, &name, value, true);
                    Ok(())
                }
            },
            Reference::Property(base, key) => self.set_property(&base, &key, value),
        }
    }

    fn eval_arguments(&mut self, args: &[Argument], scope: &ScopeRef) -> JsResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Expr(expr) => values.push(self.eval_expr(expr, scope)?),
                Argument::Spread(expr) => {
                    let spread = self.eval_expr(expr, scope)?;
                    values.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
        scope: &ScopeRef,
    ) -> JsResult<Value> {
        let (this, function) = match callee {
            Expr::Member {
                object,
                property,
                optional: member_optional,
            } => {
                let base = self.eval_expr(object, scope)?;
                if *member_optional && base.is_nullish() {
                    return Err(Abrupt::ShortCircuit);
                }
                let key = self.member_key(property, scope)?;
                let function = self.get_property(&base, &key)?;
                (base, function)
            }
            other => (Value::Undefined, self.eval_expr(other, scope)?),
        };
        if optional && function.is_nullish() {
            return Err(Abrupt::ShortCircuit);
        }
        let args = self.eval_arguments(args, scope)?;
        if !function.is_callable() {
            return Err(self.type_error(format!("{} is not a function", describe_expr(callee))));
        }
        self.call_function(&function, this, args)
    }

    // ---- calls ----

    fn with_call_depth<T>(&mut self, f: impl FnOnce(&mut Self) -> JsResult<T>) -> JsResult<T> {
        if self.call_depth >= self.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || f(self));
        self.call_depth -= 1;
        result
    }

    pub(crate) fn call_function(
        &mut self,
        function: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> JsResult<Value> {
        let Some(kind) = function.as_object().and_then(ObjectRef::function_kind) else {
            let description = self.describe_value(function);
            return Err(self.type_error(format!("{description} is not a function")));
        };
        match kind {
            FunctionKind::Bound(bound) => {
                let mut all = bound.args.clone();
                all.extend(args);
                self.call_function(&bound.target, bound.this.clone(), all)
            }
            FunctionKind::Builtin { func, .. } => {
                self.with_call_depth(|interp| func(interp, &this, &args))
            }
            FunctionKind::Host(host) => self.call_host(&host, &args),
            FunctionKind::Script(closure) => {
                self.with_call_depth(|interp| interp.call_closure(&closure, this, args))
            }
        }
    }

    fn call_host(&mut self, host: &HostFn, args: &[Value]) -> JsResult<Value> {
        let host_args: Vec<HostValue> = args
            .iter()
            .map(|arg| convert::to_host(self, arg))
            .collect();
        match host(&host_args) {
            Ok(value) => Ok(convert::from_host(self, value)),
            Err(err) => Err(self.host_error(err)),
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> JsResult<Value> {
        let decl = closure.decl.clone();
        let scope = Scope::child(&closure.scope);
        if !decl.is_arrow {
            declare(&scope, "this", this, false);
            let arguments = self.new_array(args.clone());
            declare(&scope, "arguments", arguments, true);
        }
        for (index, param) in decl.params.iter().enumerate() {
            let value = if param.rest {
                self.new_array(args.get(index..).map(<[Value]>::to_vec).unwrap_or_default())
            } else {
                args.get(index).cloned().unwrap_or_default()
            };
            let value = match (&param.default, value) {
                (Some(default), Value::Undefined) => self.eval_expr(default, &scope)?,
                (_, value) => value,
            };
            declare(&scope, &param.name, value, true);
        }
        for name in &decl.var_names {
            if !has_own_binding(&scope, name) {
                declare(&scope, name, Value::Undefined, true);
            }
        }
        match &decl.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, &scope),
            FunctionBody::Block(stmts) => {
                self.hoist_functions(stmts, &scope);
                match self.exec_stmts(stmts, &scope)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    pub(crate) fn construct(&mut self, constructor: &Value, args: Vec<Value>) -> JsResult<Value> {
        let kind = constructor.as_object().and_then(ObjectRef::function_kind);
        match kind {
            Some(FunctionKind::Script(closure)) if !closure.decl.is_arrow => {
                let prototype = match self.get_property(constructor, "prototype")? {
                    Value::Object(prototype) => prototype,
                    _ => self.realm.object_prototype.clone(),
                };
                let instance = Value::Object(self.heap.alloc(ObjectKind::Ordinary, Some(prototype)));
                let this = instance.clone();
                let result =
                    self.with_call_depth(|interp| interp.call_closure(&closure, this, args))?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance,
                })
            }
            Some(FunctionKind::Builtin { func, .. }) => {
                self.with_call_depth(|interp| func(interp, &Value::Undefined, &args))
            }
            Some(FunctionKind::Bound(bound)) => {
                let mut all = bound.args.clone();
                all.extend(args);
                self.construct(&bound.target, all)
            }
            _ => {
                let description = self.describe_value(constructor);
                Err(self.type_error(format!("{description} is not a constructor")))
            }
        }
    }

    fn describe_value(&mut self, value: &Value) -> String {
        match value {
            Value::String(text) => format!("\"{text}\""),
            Value::Object(object) if object.is_callable() => "function".to_string(),
            Value::Object(_) => "object".to_string(),
            other => self.to_js_string(other).unwrap_or_default(),
        }
    }

    // ---- property access ----

    pub(crate) fn get_property(&mut self, base: &Value, key: &str) -> JsResult<Value> {
        match base {
            Value::Undefined | Value::Null => {
                let kind = if matches!(base, Value::Null) {
                    "null"
                } else {
                    "undefined"
                };
                Err(self.type_error(format!(
                    "Cannot read properties of {kind} (reading '{key}')"
                )))
            }
            Value::String(text) => {
                if key == "length" {
                    return Ok(Value::from(text.chars().count()));
                }
                if let Some(index) = array_index(key) {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map(|ch| Value::String(ch.to_string()))
                        .unwrap_or_default());
                }
                let prototype = self.realm.string_prototype.clone();
                self.get_object_property(&prototype, key, base)
            }
            Value::Number(_) => {
                let prototype = self.realm.number_prototype.clone();
                self.get_object_property(&prototype, key, base)
            }
            Value::Bool(_) => {
                let prototype = self.realm.boolean_prototype.clone();
                self.get_object_property(&prototype, key, base)
            }
            Value::Object(object) => self.get_object_property(object, key, base),
        }
    }

    fn get_object_property(
        &mut self,
        object: &ObjectRef,
        key: &str,
        receiver: &Value,
    ) -> JsResult<Value> {
        let mut current = Some(object.clone());
        while let Some(target) = current {
            let found = {
                let data = target.borrow();
                if let ObjectKind::Array(elements) = &data.kind {
                    if key == "length" {
                        return Ok(Value::from(elements.len()));
                    }
                    if let Some(index) = array_index(key) {
                        return Ok(elements.get(index).cloned().unwrap_or_default());
                    }
                }
                data.properties.get(key).cloned()
            };
            match found {
                Some(Property::Data { value, .. }) => return Ok(value),
                Some(Property::Accessor { get, .. }) => {
                    return match get {
                        Some(getter) => self.call_function(&getter, receiver.clone(), Vec::new()),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = target.prototype(),
            }
        }
        Ok(Value::Undefined)
    }

    pub(crate) fn set_property(&mut self, base: &Value, key: &str, value: Value) -> JsResult<()> {
        let object = match base {
            Value::Undefined | Value::Null => {
                let kind = if matches!(base, Value::Null) {
                    "null"
                } else {
                    "undefined"
                };
                return Err(self.type_error(format!(
                    "Cannot set properties of {kind} (setting '{key}')"
                )));
            }
            Value::Object(object) => object,
            // Writes to primitives are dropped.
            _ => return Ok(()),
        };

        if object.is_array() {
            if key == "length" {
                let length = match &value {
                    Value::Number(number) => *number,
                    Value::String(text) => string_to_number(text),
                    _ => f64::NAN,
                };
                if length < 0.0 || length.fract() != 0.0 || length > f64::from(u32::MAX) {
                    return Err(self.range_error("Invalid array length"));
                }
                if let ObjectKind::Array(elements) = &mut object.borrow_mut().kind {
                    elements.resize(length as usize, Value::Undefined);
                }
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if let ObjectKind::Array(elements) = &mut object.borrow_mut().kind {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                }
                return Ok(());
            }
        }

        let mut current = Some(object.clone());
        while let Some(target) = current {
            match target.own_property(key) {
                Some(Property::Accessor { set, .. }) => {
                    if let Some(setter) = set {
                        self.call_function(&setter, base.clone(), vec![value])?;
                    }
                    return Ok(());
                }
                Some(Property::Data { .. }) => break,
                None => current = target.prototype(),
            }
        }

        let enumerable = match object.own_property(key) {
            Some(Property::Data { enumerable, .. }) => enumerable,
            _ => true,
        };
        object
            .borrow_mut()
            .properties
            .insert(key.to_string(), Property::Data { value, enumerable });
        Ok(())
    }

    fn delete_property(&mut self, base: &Value, key: &str) -> JsResult<bool> {
        let Value::Object(object) = base else {
            if base.is_nullish() {
                return Err(self.type_error(format!(
                    "Cannot convert undefined or null to object (deleting '{key}')"
                )));
            }
            return Ok(true);
        };
        let mut data = object.borrow_mut();
        if let ObjectKind::Array(elements) = &mut data.kind {
            if key == "length" {
                return Ok(false);
            }
            if let Some(index) = array_index(key) {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return Ok(true);
            }
        }
        data.properties.remove(key);
        Ok(true)
    }

    pub(crate) fn has_property(&self, object: &ObjectRef, key: &str) -> bool {
        let mut current = Some(object.clone());
        while let Some(target) = current {
            {
                let data = target.borrow();
                if let ObjectKind::Array(elements) = &data.kind {
                    if key == "length" || array_index(key).is_some_and(|i| i < elements.len()) {
                        return true;
                    }
                }
                if data.properties.contains(key) {
                    return true;
                }
            }
            current = target.prototype();
        }
        false
    }

    /// Own enumerable string keys, array indices first.
    pub(crate) fn own_keys(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(text) => (0..text.chars().count()).map(|i| i.to_string()).collect(),
            Value::Object(object) => {
                let data = object.borrow();
                let mut keys: Vec<String> = match &data.kind {
                    ObjectKind::Array(elements) => {
                        (0..elements.len()).map(|i| i.to_string()).collect()
                    }
                    _ => Vec::new(),
                };
                keys.extend(
                    data.properties
                        .iter()
                        .filter(|(_, property)| property.enumerable())
                        .map(|(key, _)| key.clone()),
                );
                keys
            }
            _ => Vec::new(),
        }
    }

    fn for_in_keys(&self, value: &Value) -> Vec<String> {
        let mut keys = self.own_keys(value);
        let mut prototype = match value {
            Value::Object(object) => object.prototype(),
            _ => None,
        };
        while let Some(object) = prototype {
            for key in self.own_keys(&Value::Object(object.clone())) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            prototype = object.prototype();
        }
        keys
    }

    pub(crate) fn own_enumerable_entries(&mut self, value: &Value) -> JsResult<Vec<(String, Value)>> {
        if value.is_nullish() {
            return Ok(Vec::new());
        }
        let keys = self.own_keys(value);
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let entry = self.get_property(value, &key)?;
            entries.push((key, entry));
        }
        Ok(entries)
    }

    /// Values produced by iterating `value` (`for…of`, spread).
    pub(crate) fn iterate(&mut self, value: &Value) -> JsResult<Vec<Value>> {
        match value {
            Value::String(text) => Ok(text.chars().map(|ch| Value::String(ch.to_string())).collect()),
            Value::Object(object) => match object.array_elements() {
                Some(elements) => Ok(elements),
                None => Err(self.type_error("object is not iterable")),
            },
            other => {
                let description = self.describe_value(other);
                Err(self.type_error(format!("{description} is not iterable")))
            }
        }
    }

    // ---- conversions ----

    pub(crate) fn to_primitive(&mut self, value: &Value, hint: Hint) -> JsResult<Value> {
        let Value::Object(_) = value else {
            return Ok(value.clone());
        };
        let order = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for method in order {
            let function = self.get_property(value, method)?;
            if function.is_callable() {
                let result = self.call_function(&function, value.clone(), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_number(&mut self, value: &Value) -> JsResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(value) => f64::from(u8::from(*value)),
            Value::Number(value) => *value,
            Value::String(text) => string_to_number(text),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub(crate) fn to_js_string(&mut self, value: &Value) -> JsResult<String> {
        Ok(match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Number(value) => format_number(*value),
            Value::String(text) => text.clone(),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_js_string(&primitive);
            }
        })
    }

    pub(crate) fn to_property_key(&mut self, value: &Value) -> JsResult<String> {
        match value {
            Value::String(text) => Ok(text.clone()),
            other => self.to_js_string(other),
        }
    }

    pub(crate) fn loose_equals(&mut self, left: &Value, right: &Value) -> JsResult<bool> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::String(b)) => *a == string_to_number(b),
            (Value::String(a), Value::Number(b)) => string_to_number(a) == *b,
            (Value::Bool(a), other) => {
                return self.loose_equals(&Value::Number(f64::from(u8::from(*a))), other);
            }
            (other, Value::Bool(b)) => {
                return self.loose_equals(other, &Value::Number(f64::from(u8::from(*b))));
            }
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(&primitive, right);
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, &primitive);
            }
            _ => left.strict_equals(right),
        })
    }

    /// Abstract relational comparison; `None` when either side is NaN.
    fn less_than(&mut self, left: &Value, right: &Value) -> JsResult<Option<bool>> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Some(a < b));
        }
        let a = self.to_number(&left)?;
        let b = self.to_number(&right)?;
        if a.is_nan() || b.is_nan() {
            return Ok(None);
        }
        Ok(Some(a < b))
    }

    pub(crate) fn binary_op(&mut self, op: BinaryOp, left: &Value, right: &Value) -> JsResult<Value> {
        let numeric = |interp: &mut Self, f: fn(f64, f64) -> f64| -> JsResult<Value> {
            let a = interp.to_number(left)?;
            let b = interp.to_number(right)?;
            Ok(Value::Number(f(a, b)))
        };
        let int32 = |interp: &mut Self, f: fn(i32, i32) -> i32| -> JsResult<Value> {
            let a = to_int32(interp.to_number(left)?);
            let b = to_int32(interp.to_number(right)?);
            Ok(Value::Number(f64::from(f(a, b))))
        };
        match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut out = self.to_js_string(&left)?;
                    out.push_str(&self.to_js_string(&right)?);
                    Ok(Value::String(out))
                } else {
                    let a = self.to_number(&left)?;
                    let b = self.to_number(&right)?;
                    Ok(Value::Number(a + b))
                }
            }
            BinaryOp::Sub => numeric(self, |a, b| a - b),
            BinaryOp::Mul => numeric(self, |a, b| a * b),
            BinaryOp::Div => numeric(self, |a, b| a / b),
            BinaryOp::Mod => numeric(self, |a, b| a % b),
            BinaryOp::Pow => numeric(self, js_pow),
            BinaryOp::Eq => Ok(Value::Bool(self.loose_equals(left, right)?)),
            BinaryOp::Ne => Ok(Value::Bool(!self.loose_equals(left, right)?)),
            BinaryOp::StrictEq => Ok(Value::Bool(left.strict_equals(right))),
            BinaryOp::StrictNe => Ok(Value::Bool(!left.strict_equals(right))),
            BinaryOp::Lt => Ok(Value::Bool(self.less_than(left, right)? == Some(true))),
            BinaryOp::Gt => Ok(Value::Bool(self.less_than(right, left)? == Some(true))),
            BinaryOp::Le => Ok(Value::Bool(self.less_than(right, left)? == Some(false))),
            BinaryOp::Ge => Ok(Value::Bool(self.less_than(left, right)? == Some(false))),
            BinaryOp::BitAnd => int32(self, |a, b| a & b),
            BinaryOp::BitOr => int32(self, |a, b| a | b),
            BinaryOp::BitXor => int32(self, |a, b| a ^ b),
            BinaryOp::ShiftLeft => int32(self, |a, b| a.wrapping_shl(b as u32 & 31)),
            BinaryOp::ShiftRight => int32(self, |a, b| a.wrapping_shr(b as u32 & 31)),
            BinaryOp::UnsignedShiftRight => {
                let a = to_uint32(self.to_number(left)?);
                let b = to_uint32(self.to_number(right)?);
                Ok(Value::Number(f64::from(a >> (b & 31))))
            }
            BinaryOp::In => {
                let Value::Object(object) = right else {
                    let key = self.to_js_string(left)?;
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in non-object"
                    )));
                };
                let key = self.to_property_key(left)?;
                Ok(Value::Bool(self.has_property(object, &key)))
            }
            BinaryOp::InstanceOf => Ok(Value::Bool(self.instance_of(left, right)?)),
        }
    }

    pub(crate) fn instance_of(&mut self, value: &Value, constructor: &Value) -> JsResult<bool> {
        if !constructor.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let constructor = match constructor.as_object().and_then(ObjectRef::function_kind) {
            Some(FunctionKind::Bound(bound)) => bound.target.clone(),
            _ => constructor.clone(),
        };
        let Value::Object(object) = value else {
            return Ok(false);
        };
        let Value::Object(prototype) = self.get_property(&constructor, "prototype")? else {
            return Err(self.type_error("Function has non-object prototype in instanceof check"));
        };
        let mut current = object.prototype();
        while let Some(candidate) = current {
            if candidate.ptr_eq(&prototype) {
                return Ok(true);
            }
            current = candidate.prototype();
        }
        Ok(false)
    }
}

fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Source-like rendering of a callee for error messages.
fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member {
            object, property, ..
        } => match property {
            MemberKey::Named(name) => format!("{}.{name}", describe_expr(object)),
            MemberKey::Computed(_) => format!("{}[...]", describe_expr(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", describe_expr(callee)),
        Expr::OptionalChain(inner) => describe_expr(inner),
        _ => "expression".to_string(),
    }
}

impl ScriptRuntime for Interpreter {
    fn bind(&mut self, name: &str, value: HostValue) -> Result<()> {
        let value = convert::from_host(self, value);
        self.define_global(name, value, true);
        Ok(())
    }

    fn run(&mut self, source: &str, origin: &str) -> Result<HostValue> {
        let program = parse_program(source).map_err(|err| match err {
            Error::ScriptParse(message) => Error::ScriptParse(format!("{origin}: {message}")),
            other => other,
        })?;
        self.call_depth = 0;
        match self.run_program(&program) {
            Ok(value) => Ok(convert::to_host(self, &value)),
            Err(abrupt) => Err(self.uncaught(abrupt, origin)),
        }
    }
}
