use crate::parser::{Expr, LiteralValue};
use crate::token::TokenType;

/// Parenthesized prefix printer for expression trees.
///
/// Debugging surface behind the `parse` subcommand: it renders the shape the
/// parser actually built, operator first, so precedence mistakes are visible
/// at a glance.
pub struct Ast;

impl Ast {
    pub fn print(&self, expr: &Expr<'_>) -> String {
        match expr {
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let op_str = match operator.token_type {
                    TokenType::PLUS => "+",
                    TokenType::MINUS => "-",
                    TokenType::STAR => "*",
                    TokenType::SLASH => "/",
                    TokenType::BANG_EQUAL => "!=",
                    TokenType::EQUAL_EQUAL => "==",
                    TokenType::GREATER => ">",
                    TokenType::GREATER_EQUAL => ">=",
                    TokenType::LESS => "<",
                    TokenType::LESS_EQUAL => "<=",
                    _ => "?",
                };

                format!("({} {} {})", op_str, self.print(left), self.print(right))
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let op_str = match operator.token_type {
                    TokenType::AND => "and",
                    TokenType::OR => "or",
                    _ => "?",
                };

                format!("({} {} {})", op_str, self.print(left), self.print(right))
            }

            Expr::Unary { operator, right } => {
                let op_str = match operator.token_type {
                    TokenType::MINUS => "-",
                    TokenType::BANG => "!",
                    _ => "?",
                };

                format!("({} {})", op_str, self.print(right))
            }

            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                LiteralValue::Str(s) => s.to_string(),

                LiteralValue::True => "true".to_string(),

                LiteralValue::False => "false".to_string(),

                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Variable(name) => name.lexeme.to_string(),

            Expr::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut rendered = format!("(call {}", self.print(callee));

                for argument in arguments {
                    rendered.push(' ');
                    rendered.push_str(&self.print(argument));
                }

                rendered.push(')');
                rendered
            }
        }
    }
}
