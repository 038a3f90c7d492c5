use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Array(Vec<ArrayElement>),
    Object(Vec<PropertyDef>),
    Function(Rc<FunctionDecl>),
    Unary(UnaryOp, Box<Expr>),
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Member {
        object: Box<Expr>,
        property: MemberKey,
        optional: bool,
    },
    /// Boundary of an optional chain; a short-circuit inside yields `undefined`.
    OptionalChain(Box<Expr>),
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemberKey {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArrayElement {
    Hole,
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Argument {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropertyKey {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropertyDef {
    Init(PropertyKey, Expr),
    Getter(PropertyKey, Rc<FunctionDecl>),
    Setter(PropertyKey, Rc<FunctionDecl>),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Assign,
    Compound(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Param {
    pub(crate) name: String,
    pub(crate) default: Option<Expr>,
    pub(crate) rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FunctionBody {
    Block(Vec<Stmt>),
    /// Concise arrow body.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionDecl {
    pub(crate) name: Option<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) body: FunctionBody,
    pub(crate) is_arrow: bool,
    /// `var` names declared anywhere in the body, outside nested functions.
    pub(crate) var_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ForTarget {
    Decl(DeclKind, String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SwitchCase {
    pub(crate) test: Option<Expr>,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CatchClause {
    pub(crate) param: Option<String>,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Expr(Expr),
    VarDecl {
        kind: DeclKind,
        decls: Vec<(String, Option<Expr>)>,
    },
    FunctionDecl(Rc<FunctionDecl>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        target: ForTarget,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        target: ForTarget,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Labeled(String, Box<Stmt>),
    Empty,
}

/// Collects `var` declarations of a statement list, skipping nested functions.
pub(crate) fn collect_var_names(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        collect_stmt_var_names(stmt, out);
    }
}

fn collect_stmt_var_names(stmt: &Stmt, out: &mut Vec<String>) {
    fn push(name: &String, out: &mut Vec<String>) {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
    match stmt {
        Stmt::VarDecl {
            kind: DeclKind::Var,
            decls,
        } => {
            for (name, _) in decls {
                push(name, out);
            }
        }
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            collect_stmt_var_names(consequent, out);
            if let Some(alternate) = alternate {
                collect_stmt_var_names(alternate, out);
            }
        }
        Stmt::Block(stmts) => collect_var_names(stmts, out),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_stmt_var_names(init, out);
            }
            collect_stmt_var_names(body, out);
        }
        Stmt::ForIn { target, body, .. } | Stmt::ForOf { target, body, .. } => {
            if let ForTarget::Decl(DeclKind::Var, name) = target {
                push(name, out);
            }
            collect_stmt_var_names(body, out);
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Labeled(_, body) => {
            collect_stmt_var_names(body, out)
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_var_names(block, out);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, out);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, out);
            }
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, out);
            }
        }
        _ => {}
    }
}
