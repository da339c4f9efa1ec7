use rill::error::Diagnostics;
use rill::parser::{Expr, LiteralValue, Parser, Stmt};
use rill::scanner::Scanner;
use rill::token::Token;

fn tokenize(source: &str) -> Vec<Token<'_>> {
    Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("test source should tokenize cleanly")
}

fn parse<'a>(tokens: &'a [Token<'a>], diagnostics: &mut Diagnostics) -> Vec<Stmt<'a>> {
    let mut parser = Parser::new(tokens, diagnostics);
    parser.parse()
}

#[test]
fn parses_a_clean_program() {
    let tokens = tokenize("var a = 1; print a + 2;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(!diagnostics.had_errors());
    assert_eq!(program.len(), 2);
    assert!(matches!(program[0], Stmt::Var { .. }));
    assert!(matches!(program[1], Stmt::Print(_)));
}

#[test]
fn recovers_at_statement_boundary_and_keeps_parsing() {
    // The first statement is broken; the second must still come out.
    let tokens = tokenize("var = 1; print 2;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert_eq!(diagnostics.errors().len(), 1);
    assert_eq!(program.len(), 1);
    assert!(matches!(program[0], Stmt::Print(_)));
}

#[test]
fn reports_multiple_independent_errors_in_one_pass() {
    let tokens = tokenize("foo bar; var x = 3; baz qux;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert_eq!(diagnostics.errors().len(), 2);
    assert_eq!(program.len(), 1);
    assert!(matches!(program[0], Stmt::Var { .. }));
}

#[test]
fn invalid_assignment_target_is_reported_without_aborting() {
    let tokens = tokenize("1 = 2; print 3;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(diagnostics
        .errors()
        .iter()
        .any(|e| e.to_string().contains("Invalid assignment target.")));

    // Parsing continued: both statements are present.
    assert_eq!(program.len(), 2);
}

#[test]
fn argument_cap_is_reported_without_aborting() {
    let arguments = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let source = format!("f({});", arguments);

    let tokens = tokenize(&source);
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(diagnostics
        .errors()
        .iter()
        .any(|e| e.to_string().contains("255 arguments")));

    // The call still parsed, every argument included.
    assert_eq!(program.len(), 1);
    let Stmt::Expression(Expr::Call { ref arguments, .. }) = program[0] else {
        panic!("expected a call expression statement");
    };
    assert_eq!(arguments.len(), 256);
}

#[test]
fn for_desugars_into_while_with_blocks() {
    let tokens = tokenize("for (var i = 0; i < 3; i = i + 1) print i;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(!diagnostics.had_errors());
    assert_eq!(program.len(), 1);

    // { var i = 0; while (i < 3) { print i; i = i + 1; } }
    let Stmt::Block(ref outer) = program[0] else {
        panic!("expected the initializer block");
    };
    assert_eq!(outer.len(), 2);
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While {
        ref condition,
        ref body,
    } = outer[1]
    else {
        panic!("expected the desugared while loop");
    };
    assert!(matches!(condition, Expr::Binary { .. }));

    let Stmt::Block(ref inner) = **body else {
        panic!("expected the increment block");
    };
    assert_eq!(inner.len(), 2);
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
}

#[test]
fn for_without_condition_defaults_to_true() {
    let tokens = tokenize("for (;;) print 1;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(!diagnostics.had_errors());

    // No initializer and no increment: the loop is a bare while (true).
    let Stmt::While { ref condition, .. } = program[0] else {
        panic!("expected a bare while loop");
    };
    assert_eq!(*condition, Expr::Literal(LiteralValue::True));
}

#[test]
fn call_applies_to_returned_callables() {
    let tokens = tokenize("f(1)(2);");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(!diagnostics.had_errors());

    let Stmt::Expression(Expr::Call {
        ref callee,
        ref arguments,
        ..
    }) = program[0]
    else {
        panic!("expected the outer call");
    };
    assert_eq!(arguments.len(), 1);
    assert!(matches!(**callee, Expr::Call { .. }));
}

#[test]
fn function_declaration_collects_parameters_in_order() {
    let tokens = tokenize("fun add(a, b, c) { return a + b + c; }");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    assert!(!diagnostics.had_errors());

    let Stmt::Function {
        ref name,
        ref params,
        ref body,
    } = program[0]
    else {
        panic!("expected a function declaration");
    };
    assert_eq!(name.lexeme, "add");

    let param_names: Vec<_> = params.iter().map(|p| p.lexeme).collect();
    assert_eq!(param_names, vec!["a", "b", "c"]);

    assert_eq!(body.len(), 1);
    assert!(matches!(body[0], Stmt::Return { .. }));
}

#[test]
fn reserved_class_keyword_has_no_production() {
    let tokens = tokenize("class Foo {} print 1;");
    let mut diagnostics = Diagnostics::new();

    let program = parse(&tokens, &mut diagnostics);

    // `class` is reserved but unimplemented: it cannot start a statement,
    // and recovery resumes at the next boundary.
    assert!(diagnostics.had_errors());
    assert!(program.iter().any(|s| matches!(s, Stmt::Print(_))));
}
