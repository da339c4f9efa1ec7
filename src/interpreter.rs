//! Tree‑walking evaluator for Rill.
//!
//! The interpreter owns the session's global environment, the current‑
//! environment cursor, and the resolver‑populated side table of binding
//! distances.  One instance lives for a whole session: a REPL feeds it every
//! line, so globals accumulate while block/call environments come and go.
//!
//! Non‑local control flow is explicit.  Executing a statement yields a
//! [`Flow`]: either `Normal` or a pending `Return` carrying the value on its
//! way to the nearest call boundary.  Runtime failures travel in the `Err`
//! channel.  Every executor matches on all three outcomes; nothing unwinds
//! the host stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::callable::{Callable, RillFunction};
use crate::environment::Environment;
use crate::error::{Result, RillError};
use crate::parser::{Expr, ExprId, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing one statement.
///
/// `Return` is a signal in transit: block and loop executors pass it upward
/// untouched, and [`Callable::invoke`] absorbs it at the call boundary.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,
    locals: HashMap<ExprId, usize>,
    out: Rc<RefCell<dyn Write>>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter printing to stdout, with the native functions
    /// pre‑defined in its global environment.
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(std::io::stdout())))
    }

    /// Create an interpreter printing to an arbitrary sink.  Tests hand in an
    /// in‑memory buffer and assert on what a program printed.
    pub fn with_output(out: Rc<RefCell<dyn Write>>) -> Self {
        info!("Initializing interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Rc::new(Callable::Native {
                name: "clock",
                arity: 0,
                func: native_clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    // ────────────────────── resolver side table ───────────────────

    /// Record that `expr` refers to a binding `depth` environments up.
    /// Called by the resolver; consulted read‑only afterwards.
    pub fn resolve_local(&mut self, expr: &Expr<'a>, depth: usize) {
        self.locals.insert(expr.id(), depth);
    }

    /// The recorded hop count for `expr`, if the resolver found it in a
    /// tracked scope.  `None` means dynamic global lookup.
    pub fn resolved_depth(&self, expr: &Expr<'a>) -> Option<usize> {
        self.locals.get(&expr.id()).copied()
    }

    // ───────────────────────── execution ──────────────────────────

    /// Execute `statements` in order against the session state.
    ///
    /// Stops at the first runtime error and returns it; everything already
    /// executed (prints included) stands.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}

                // The resolver rejects top-level returns, so a signal
                // reaching here has nowhere further to go.
                Flow::Return(_) => break,
            }
        }

        info!("Interpretation completed");

        Ok(())
    }

    fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out.borrow_mut(), "{}", value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let child = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, child)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}

                        // A pending return unwinds the loop on its way to
                        // the call boundary.
                        signal @ Flow::Return(_) => return Ok(signal),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining function '{}'", name.lexeme);

                // Capture the environment in effect right now: that is what
                // makes the value a closure.
                let function = RillFunction {
                    name: *name,
                    params: params.as_slice(),
                    body: body.as_slice(),
                    closure: Rc::clone(&self.environment),
                };

                self.environment
                    .borrow_mut()
                    .define(name.lexeme, Value::Callable(Rc::new(Callable::Function(function))));

                Ok(Flow::Normal)
            }

            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }
        }
    }

    /// Execute `statements` with `environment` as the current scope, then
    /// restore the previous scope.  Restoration is unconditional: it happens
    /// on normal completion, on a propagating return signal, and on a
    /// runtime error alike.
    pub fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Flow<'a>> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(Flow::Normal);

        for statement in statements {
            result = self.execute(statement);

            match &result {
                Ok(Flow::Normal) => {}
                _ => break,
            }
        }

        self.environment = previous;

        result
    }

    // ───────────────────────── evaluation ─────────────────────────

    /// Evaluate an expression to a [`Value`].
    pub fn evaluate(&mut self, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(evaluate_literal(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // Short-circuit: the result is the operand itself, never a
                // coerced boolean.
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),
                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable(name) => self.lookup_variable(name, expr),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(&expr.id()) {
                    Some(&distance) => {
                        Environment::assign_at(
                            &self.environment,
                            distance,
                            name.lexeme,
                            value.clone(),
                        );
                    }

                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut argument_values = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                match callee_value {
                    Value::Callable(callable) => {
                        debug!("Invoking callable with {} arguments", argument_values.len());

                        callable.invoke(self, argument_values, paren)
                    }

                    _ => Err(RillError::runtime(paren.line, "Can only call functions.")),
                }
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &'a Token<'a>, right: &'a Expr<'a>) -> Result<Value<'a>> {
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RillError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_value.is_truthy())),

            _ => Err(RillError::runtime(operator.line, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &'a Expr<'a>,
        operator: &'a Token<'a>,
        right: &'a Expr<'a>,
    ) -> Result<Value<'a>> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                _ => Err(RillError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            // Division follows IEEE 754: dividing by zero yields an infinity
            // or NaN, never a runtime error.
            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
                _ => Err(RillError::runtime(operator.line, "Operands must be numbers")),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            _ => Err(RillError::runtime(
                operator.line,
                "Invalid binary operator.",
            )),
        }
    }

    /// Side‑table hit ⇒ jump straight to the recorded depth; miss ⇒ the name
    /// was never in a tracked scope, so it lives (if anywhere) in globals.
    fn lookup_variable(&self, name: &'a Token<'a>, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        match self.locals.get(&expr.id()) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }
}

fn evaluate_literal<'a>(literal: &LiteralValue) -> Value<'a> {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::Str(s.clone()),
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Nil => Value::Nil,
    }
}

/// Seconds since the Unix epoch, as a Number.
fn native_clock<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    Ok(Value::Number(Utc::now().timestamp_micros() as f64 / 1e6))
}
