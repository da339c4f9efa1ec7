use rill::error::Diagnostics;
use rill::interpreter::Interpreter;
use rill::parser::{Expr, Parser, Stmt};
use rill::resolver::Resolver;
use rill::scanner::Scanner;
use rill::token::Token;

fn tokenize(source: &str) -> Vec<Token<'_>> {
    Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("test source should tokenize cleanly")
}

/// Parse and resolve `source`, returning the program, the interpreter whose
/// side table was populated, and every diagnostic the passes produced.
///
/// The program is leaked into a plain slice so its nodes (the side table's
/// keys) stay put while the caller inspects them.
fn resolve_program<'a>(tokens: &'a [Token<'a>]) -> (&'a [Stmt<'a>], Interpreter<'a>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();

    let mut parser = Parser::new(tokens, &mut diagnostics);
    let program = parser.parse();
    assert!(!diagnostics.had_errors(), "test source should parse cleanly");

    let program: &'a [Stmt<'a>] = Box::leak(program.into_boxed_slice());

    let mut interpreter = Interpreter::new();

    {
        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
        resolver.resolve(program);
    }

    (program, interpreter, diagnostics)
}

/// Dig the expression out of a `print` statement.
fn printed_expr<'p, 'a>(stmt: &'p Stmt<'a>) -> &'p Expr<'a> {
    match stmt {
        Stmt::Print(expr) => expr,
        other => panic!("expected a print statement, got {:?}", other),
    }
}

#[test]
fn hop_count_matches_block_distance() {
    let tokens = tokenize(
        "var g = 1;\
         {\
           var a = 2;\
           {\
             var b = 3;\
             print b;\
             print a;\
             print g;\
           }\
         }",
    );

    let (program, interpreter, diagnostics) = resolve_program(&tokens);
    assert!(!diagnostics.had_errors());

    let Stmt::Block(ref outer) = program[1] else {
        panic!("expected the outer block");
    };
    let Stmt::Block(ref inner) = outer[1] else {
        panic!("expected the inner block");
    };

    // `b` lives in the innermost scope, `a` one hop out.
    assert_eq!(interpreter.resolved_depth(printed_expr(&inner[1])), Some(0));
    assert_eq!(interpreter.resolved_depth(printed_expr(&inner[2])), Some(1));

    // `g` is top-level: untracked, no side-table entry, dynamic lookup.
    assert_eq!(interpreter.resolved_depth(printed_expr(&inner[3])), None);
}

#[test]
fn parameters_resolve_inside_the_function_scope() {
    let tokens = tokenize("fun show(x) { print x; }");

    let (program, interpreter, diagnostics) = resolve_program(&tokens);
    assert!(!diagnostics.had_errors());

    let Stmt::Function { ref body, .. } = program[0] else {
        panic!("expected a function declaration");
    };

    assert_eq!(interpreter.resolved_depth(printed_expr(&body[0])), Some(0));
}

#[test]
fn closure_reference_counts_intervening_scopes() {
    let tokens = tokenize("fun outer(x) { fun inner() { print x; } }");

    let (program, interpreter, diagnostics) = resolve_program(&tokens);
    assert!(!diagnostics.had_errors());

    let Stmt::Function { ref body, .. } = program[0] else {
        panic!("expected the outer function");
    };
    let Stmt::Function {
        body: ref inner_body,
        ..
    } = body[0]
    else {
        panic!("expected the inner function");
    };

    // One hop: out of inner's scope into outer's parameter scope.
    assert_eq!(
        interpreter.resolved_depth(printed_expr(&inner_body[0])),
        Some(1)
    );
}

#[test]
fn identical_expressions_resolve_independently() {
    // Both statements print `a`, but the two occurrences sit at different
    // depths; entries are per node, not per name.
    let tokens = tokenize(
        "{\
           var a = 1;\
           print a;\
           { print a; }\
         }",
    );

    let (program, interpreter, diagnostics) = resolve_program(&tokens);
    assert!(!diagnostics.had_errors());

    let Stmt::Block(ref outer) = program[0] else {
        panic!("expected the outer block");
    };
    let Stmt::Block(ref inner) = outer[2] else {
        panic!("expected the inner block");
    };

    assert_eq!(interpreter.resolved_depth(printed_expr(&outer[1])), Some(0));
    assert_eq!(interpreter.resolved_depth(printed_expr(&inner[0])), Some(1));
}

#[test]
fn reading_a_name_in_its_own_initializer_is_an_error() {
    let tokens = tokenize("{ var a = a; }");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert!(diagnostics
        .errors()
        .iter()
        .any(|e| e.to_string().contains("its own initializer")));
}

#[test]
fn top_level_self_reference_is_not_a_static_error() {
    // The global scope is untracked: `var a = a;` at top level resolves
    // dynamically (and only fails at runtime if `a` was never defined).
    let tokens = tokenize("var a = a;");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert!(!diagnostics.had_errors());
}

#[test]
fn return_outside_a_function_is_an_error() {
    let tokens = tokenize("return 1;");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert!(diagnostics
        .errors()
        .iter()
        .any(|e| e.to_string().contains("Cannot return from top-level code.")));
}

#[test]
fn return_inside_a_function_is_fine() {
    let tokens = tokenize("fun f() { return 1; }");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert!(!diagnostics.had_errors());
}

#[test]
fn redeclaration_in_same_scope_is_an_error() {
    let tokens = tokenize("{ var a = 1; var a = 2; }");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert!(diagnostics
        .errors()
        .iter()
        .any(|e| e.to_string().contains("already declared")));
}

#[test]
fn resolution_continues_past_the_first_error() {
    // Two independent static errors in one program: both must be reported.
    let tokens = tokenize("return 1; { var a = a; }");

    let (_program, _interpreter, diagnostics) = resolve_program(&tokens);

    assert_eq!(diagnostics.errors().len(), 2);
}
