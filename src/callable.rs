//! The calling contract shared by user‑defined and native functions.
//!
//! Both kinds expose a fixed [`arity`](Callable::arity) and an
//! [`invoke`](Callable::invoke) that checks it before running.  A user
//! function executes its body inside a fresh environment enclosing the
//! environment captured at the *definition* site (lexical scoping, never the
//! caller's environment); a native function is a plain `fn` pointer with a
//! declared arity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::environment::Environment;
use crate::error::{Result, RillError};
use crate::interpreter::{Flow, Interpreter};
use crate::parser::Stmt;
use crate::token::Token;
use crate::value::Value;

/// A user‑declared function: its declaration slices plus the environment it
/// closed over.  The slices borrow the AST, so no part of the declaration is
/// copied per call.
#[derive(Clone)]
pub struct RillFunction<'a> {
    pub name: &'a Token<'a>,
    pub params: &'a [&'a Token<'a>],
    pub body: &'a [Stmt<'a>],

    /// Environment in effect where the function was *declared*.
    pub closure: Rc<RefCell<Environment<'a>>>,
}

impl<'a> fmt::Debug for RillFunction<'a> {
    // Manual impl: the closure environment may (indirectly) contain this very
    // function, so printing it structurally would recurse forever.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RillFunction")
            .field("name", &self.name.lexeme)
            .field("params", &self.params.len())
            .field("closure", &Rc::as_ptr(&self.closure))
            .finish()
    }
}

/// Anything a call expression can invoke.
#[derive(Debug, Clone)]
pub enum Callable<'a> {
    /// Declared in source with `fun`.
    Function(RillFunction<'a>),

    /// Provided by the host.
    Native {
        name: &'static str,
        arity: usize,
        func: fn(&[Value<'a>]) -> std::result::Result<Value<'a>, String>,
    },
}

impl<'a> Callable<'a> {
    /// Number of arguments this callable requires.
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.params.len(),
            Callable::Native { arity, .. } => *arity,
        }
    }

    /// Invoke with already‑evaluated arguments.
    ///
    /// `paren` is the call site's closing parenthesis, used to locate arity
    /// and native failures.  A pending return signal from the body is
    /// absorbed here ‑ this is the call boundary ‑ and a body that completes
    /// without returning yields nil.
    pub fn invoke(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
        paren: &'a Token<'a>,
    ) -> Result<Value<'a>> {
        if arguments.len() != self.arity() {
            return Err(RillError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    self.arity(),
                    arguments.len()
                ),
            ));
        }

        match self {
            Callable::Function(function) => {
                debug!("Calling function '{}'", function.name.lexeme);

                // The new environment encloses the captured closure, not the
                // caller's environment.
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &function.closure,
                ))));

                for (param, argument) in function.params.iter().zip(arguments) {
                    environment.borrow_mut().define(param.lexeme, argument);
                }

                match interpreter.execute_block(function.body, environment)? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Nil),
                }
            }

            Callable::Native { name, func, .. } => {
                debug!("Calling native function '{}'", name);

                func(&arguments).map_err(|message| RillError::runtime(paren.line, message))
            }
        }
    }
}

impl<'a> fmt::Display for Callable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(function) => write!(f, "<fn {}>", function.name.lexeme),
            Callable::Native { .. } => write!(f, "<native fn>"),
        }
    }
}
