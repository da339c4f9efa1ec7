//! Static resolver pass for the **Rill** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, forward‑read in initializer, invalid `return`).
//! 3. Record, for each variable occurrence found in a tracked scope, how many
//!    environments up its binding lives — the interpreter's side table.
//!
//! The scope stack pushes and pops exactly where the interpreter pushes and
//! pops environments (block entry, function body).  That lockstep is the
//! correctness‑critical invariant: a recorded hop count is only meaningful
//! because both passes agree on the nesting.
//!
//! The top‑level scope is deliberately *not* tracked.  Globals stay
//! dynamically extensible (a REPL defines new ones every line), so top‑level
//! names get no side‑table entry and resolve against the global environment
//! at use time.
//!
//! Errors do not stop the walk: every diagnostic is reported into the sink
//! and resolution continues, so one pass surfaces all of them.

use crate::error::{Diagnostics, RillError};
use crate::interpreter::Interpreter;
use crate::parser::{Expr, Stmt};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances into the interpreter's side table.
pub struct Resolver<'a, 'i> {
    interpreter: &'i mut Interpreter<'a>,
    diagnostics: &'i mut Diagnostics,
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    current_function: FunctionType,
}

impl<'a, 'i> Resolver<'a, 'i> {
    /// Create a new resolver bound to the given interpreter and sink.
    pub fn new(interpreter: &'i mut Interpreter<'a>, diagnostics: &'i mut Diagnostics) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            diagnostics,
            scopes: Vec::new(),
            current_function: FunctionType::None,
        }
    }

    /// Walk all top‑level statements.  Runs to completion regardless of how
    /// many diagnostics come out; the caller checks the sink afterwards.
    pub fn resolve(&mut self, statements: &'a [Stmt<'a>]) {
        info!("Beginning resolve pass over {} statement(s)", statements.len());

        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                // One scope per block, in lockstep with the interpreter's
                // one environment per block.
                self.begin_scope();

                for statement in statements {
                    self.resolve_stmt(statement);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so a reference to
                // the name *inside* its own initializer is caught mid-way.
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function { name, params, body } => {
                // The name is defined before the body resolves, so the
                // function can call itself.
                self.declare(name);
                self.define(name);

                self.resolve_function(params, body);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch.as_deref() {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics.report(RillError::resolve(
                        keyword.line,
                        "Cannot return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable(name) => {
                // Declared but not yet defined in the innermost scope means
                // we are inside this very name's initializer.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.diagnostics.report(RillError::resolve(
                            name.line,
                            "Cannot read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(expr, name);
            }

            Expr::Assign { name, value } => {
                // First resolve the RHS, then bind the LHS occurrence.
                self.resolve_expr(value);
                self.resolve_local(expr, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, params: &'a [&'a Token<'a>], body: &'a [Stmt<'a>]) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        for statement in body {
            self.resolve_stmt(statement);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Mark `name` present‑but‑not‑ready in the innermost tracked scope.
    /// No tracked scope ⇒ top level ⇒ nothing to record.
    fn declare(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                self.diagnostics.report(RillError::resolve(
                    name.line,
                    "Variable with this name already declared in this scope.",
                ));
            }

            scope.insert(name.lexeme, false);
        }
    }

    /// Mark `name` ready for reads.
    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Walk the scope stack innermost → outermost; the number of scopes
    /// skipped before the name is found is the hop count recorded against
    /// this occurrence.  Not found anywhere ⇒ no entry ⇒ the interpreter
    /// falls back to a dynamic global lookup.
    fn resolve_local(&mut self, expr: &'a Expr<'a>, name: &Token<'a>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.resolve_local(expr, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
