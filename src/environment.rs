//! Chained runtime scopes.
//!
//! An [`Environment`] owns one name→value map and an optional link to its
//! enclosing environment; the chain from the innermost scope to the global
//! one is what a variable lookup walks.  Ownership points strictly upward
//! (child holds the parent under `Rc`), so blocks and calls can discard their
//! environment on exit while closures keep theirs alive.

use crate::error::{Result, RillError};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    /// The root (global) environment: no enclosing link.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A child environment for a block or a call.
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert into *this* environment unconditionally; re‑declaration of an
    /// existing name overwrites it.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        self.values.insert(name, value);
    }

    /// Look `name` up, searching outward from this environment to the root.
    pub fn get(&self, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RillError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Overwrite an existing binding, searching outward from this environment
    /// to the root.  Assigning a name that exists nowhere is an error.
    pub fn assign(&mut self, name: &Token<'a>, value: Value<'a>) -> Result<()> {
        if self.values.contains_key(name.lexeme) {
            self.values.insert(name.lexeme, value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RillError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links upward.  The resolver only
    /// hands out distances it has verified, so running off the chain cannot
    /// happen for resolved lookups; the chain end is returned as a backstop.
    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'a>>> {
        let mut env: Rc<RefCell<Environment<'a>>> = Rc::clone(env);

        for _ in 0..distance {
            let parent = env.borrow().enclosing.clone();

            match parent {
                Some(p) => env = p,
                None => break,
            }
        }

        env
    }

    /// Read `name` directly out of the environment exactly `distance` hops up.
    /// No chain search: the resolver already decided where the binding lives.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &Token<'a>,
    ) -> Result<Value<'a>> {
        let target = Self::ancestor(env, distance);
        let value = target.borrow().values.get(name.lexeme).cloned();

        value.ok_or_else(|| {
            RillError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )
        })
    }

    /// Write `name` directly in the environment exactly `distance` hops up.
    ///
    /// Overwrite‑or‑create, never insert‑only: the binding the resolver saw
    /// is already present at that depth, and repeated assignments to the same
    /// resolved local must keep succeeding.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &'a str,
        value: Value<'a>,
    ) {
        let target = Self::ancestor(env, distance);

        target.borrow_mut().values.insert(name, value);
    }
}
