use std::cell::RefCell;
use std::rc::Rc;

use rill::error::{Diagnostics, RillError};
use rill::interpreter::Interpreter;
use rill::parser::Parser;
use rill::resolver::Resolver;
use rill::scanner::Scanner;
use rill::token::Token;

/// Run `source` through the whole pipeline, capturing printed output.
///
/// Panics on static diagnostics (these tests exercise runtime behavior);
/// returns whatever `interpret` returned alongside everything printed
/// before it stopped.
fn run(source: &str) -> (String, Result<(), RillError>) {
    let tokens: Vec<Token<'_>> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("test source should tokenize cleanly");

    let mut diagnostics = Diagnostics::new();

    let mut parser = Parser::new(&tokens, &mut diagnostics);
    let program = parser.parse();
    assert!(
        !diagnostics.had_errors(),
        "test source should parse cleanly: {:?}",
        diagnostics.errors()
    );

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_output(output.clone());

    {
        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
        resolver.resolve(&program);
    }
    assert!(
        !diagnostics.had_errors(),
        "test source should resolve cleanly: {:?}",
        diagnostics.errors()
    );

    let result = interpreter.interpret(&program);

    let printed = String::from_utf8(output.borrow().clone()).expect("output should be UTF-8");

    (printed, result)
}

/// Run a program that must succeed; return its printed output.
fn run_ok(source: &str) -> String {
    let (printed, result) = run(source);
    result.expect("program should run without a runtime error");
    printed
}

/// Run a program that must fail; return the runtime error's message and line.
fn run_err(source: &str) -> (String, usize) {
    let (_, result) = run(source);

    match result.expect_err("program should produce a runtime error") {
        RillError::Runtime { message, line } => (message, line),
        other => panic!("expected a runtime error, got {}", other),
    }
}

// ───────────────────────── printing & stringification ─────────────────────

#[test]
fn numbers_print_without_integral_suffix() {
    assert_eq!(run_ok("print 4.0; print 4.5; print 2;"), "4\n4.5\n2\n");
}

#[test]
fn nil_and_booleans_print_lowercase() {
    assert_eq!(run_ok("print nil; print true; print false;"), "nil\ntrue\nfalse\n");
}

#[test]
fn strings_print_without_quotes() {
    assert_eq!(run_ok("print \"hello\";"), "hello\n");
}

#[test]
fn functions_print_by_name() {
    assert_eq!(
        run_ok("fun greet() {} print greet; print clock;"),
        "<fn greet>\n<native fn>\n"
    );
}

// ───────────────────────────── arithmetic ─────────────────────────────────

#[test]
fn addition_of_numbers_and_concatenation_of_strings() {
    assert_eq!(run_ok("print 1 + 1;"), "2\n");
    assert_eq!(run_ok("print \"a\" + \"b\";"), "ab\n");
}

#[test]
fn mixed_operand_addition_is_a_runtime_error() {
    let (message, _) = run_err("print \"a\" + 1;");
    assert_eq!(message, "Operands must be two numbers or two strings.");
}

#[test]
fn arithmetic_requires_numbers() {
    let (message, _) = run_err("print 1 - nil;");
    assert_eq!(message, "Operands must be numbers");

    let (message, _) = run_err("print \"x\" * 2;");
    assert_eq!(message, "Operands must be numbers");
}

#[test]
fn division_by_zero_follows_ieee() {
    // Signed infinity, not a runtime error.
    assert_eq!(run_ok("print 1 / 0;"), "inf\n");
    assert_eq!(run_ok("print -1 / 0;"), "-inf\n");
}

#[test]
fn unary_minus_requires_a_number() {
    let (message, _) = run_err("print -\"oops\";");
    assert_eq!(message, "Operand must be a number.");
}

#[test]
fn comparisons_require_numbers() {
    assert_eq!(run_ok("print 1 < 2; print 2 <= 2; print 3 > 4;"), "true\ntrue\nfalse\n");

    let (message, _) = run_err("print \"a\" < \"b\";");
    assert_eq!(message, "Operands must be numbers");
}

// ─────────────────────── truthiness & equality ────────────────────────────

#[test]
fn only_nil_and_false_are_falsy() {
    assert_eq!(
        run_ok(
            "if (nil) print \"bad\"; else print \"nil falsy\";\
             if (0) print \"zero truthy\";\
             if (\"\") print \"empty truthy\";"
        ),
        "nil falsy\nzero truthy\nempty truthy\n"
    );
}

#[test]
fn equality_never_errors_and_respects_kinds() {
    assert_eq!(
        run_ok(
            "print nil == nil;\
             print nil == false;\
             print 1 == 1;\
             print 1 == \"1\";\
             print \"a\" == \"a\";\
             print 1 != 2;"
        ),
        "true\nfalse\ntrue\nfalse\ntrue\ntrue\n"
    );
}

#[test]
fn logical_operators_return_operand_values() {
    assert_eq!(
        run_ok(
            "print \"hi\" or 2;\
             print nil or \"yes\";\
             print nil and 2;\
             print 1 and 2;"
        ),
        "hi\nyes\nnil\n2\n"
    );
}

#[test]
fn logical_operators_short_circuit() {
    // The right-hand call must never run when the left side decides.
    assert_eq!(
        run_ok(
            "fun shout() { print \"ran\"; return true; }\
             var a = false and shout();\
             var b = true or shout();\
             print a; print b;"
        ),
        "false\ntrue\n"
    );
}

// ──────────────────────── variables & scoping ─────────────────────────────

#[test]
fn blocks_shadow_and_restore() {
    assert_eq!(
        run_ok(
            "var a = \"outer\";\
             {\
               var a = \"inner\";\
               print a;\
             }\
             print a;"
        ),
        "inner\nouter\n"
    );
}

#[test]
fn assignment_is_an_expression_yielding_the_value() {
    assert_eq!(run_ok("var a = 1; print a = 2; print a;"), "2\n2\n");
}

#[test]
fn repeated_assignment_to_a_resolved_local() {
    // The second write through the side table must overwrite, not fail.
    assert_eq!(
        run_ok(
            "{\
               var n = 0;\
               n = 1;\
               n = 2;\
               print n;\
             }"
        ),
        "2\n"
    );
}

#[test]
fn undefined_variable_read_is_a_runtime_error() {
    let (message, line) = run_err("print missing;");
    assert_eq!(message, "Undefined variable 'missing'.");
    assert_eq!(line, 1);
}

#[test]
fn undefined_variable_assignment_is_a_runtime_error() {
    let (message, _) = run_err("missing = 1;");
    assert_eq!(message, "Undefined variable 'missing'.");
}

#[test]
fn uninitialized_variables_are_nil() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
}

// ─────────────────────────── control flow ─────────────────────────────────

#[test]
fn while_loop_counts() {
    assert_eq!(
        run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn for_loop_matches_equivalent_while() {
    let for_output = run_ok("for (var i = 0; i < 3; i = i + 1) print i;");
    let while_output = run_ok("{ var i = 0; while (i < 3) { print i; i = i + 1; } }");

    assert_eq!(for_output, "0\n1\n2\n");
    assert_eq!(for_output, while_output);
}

#[test]
fn if_else_branches() {
    assert_eq!(
        run_ok("if (1 < 2) print \"then\"; else print \"else\";"),
        "then\n"
    );
    assert_eq!(
        run_ok("if (1 > 2) print \"then\"; else print \"else\";"),
        "else\n"
    );
}

// ──────────────────────────── functions ───────────────────────────────────

#[test]
fn functions_compute_and_return() {
    assert_eq!(
        run_ok(
            "fun add(a, b) { return a + b; }\
             print add(1, 2);"
        ),
        "3\n"
    );
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
}

#[test]
fn return_unwinds_nested_blocks_and_loops() {
    assert_eq!(
        run_ok(
            "fun find() {\
               var i = 0;\
               while (true) {\
                 if (i == 2) { return i; }\
                 i = i + 1;\
               }\
             }\
             print find();"
        ),
        "2\n"
    );
}

#[test]
fn recursion_works() {
    assert_eq!(
        run_ok(
            "fun fib(n) {\
               if (n <= 1) return n;\
               return fib(n - 1) + fib(n - 2);\
             }\
             for (var i = 0; i < 10; i = i + 1) {\
               print fib(i);\
             }"
        ),
        "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n"
    );
}

#[test]
fn arity_mismatch_states_expected_and_actual() {
    let (message, _) = run_err("fun two(a, b) {} two(1);");
    assert_eq!(message, "Expected 2 arguments but got 1.");

    let (message, _) = run_err("fun none() {} none(1, 2, 3);");
    assert_eq!(message, "Expected 0 arguments but got 3.");
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    let (message, _) = run_err("var notfn = 42; notfn();");
    assert_eq!(message, "Can only call functions.");
}

#[test]
fn returned_callables_apply_directly() {
    assert_eq!(
        run_ok(
            "fun adder(a) {\
               fun add(b) { return a + b; }\
               return add;\
             }\
             print adder(1)(2);"
        ),
        "3\n"
    );
}

#[test]
fn native_clock_is_a_number() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

// ───────────────────────────── closures ───────────────────────────────────

#[test]
fn counter_closures_keep_captured_state() {
    assert_eq!(
        run_ok(
            "fun makeCounter() {\
               var i = 0;\
               fun count() {\
                 i = i + 1;\
                 return i;\
               }\
               return count;\
             }\
             var counter = makeCounter();\
             print counter();\
             print counter();"
        ),
        "1\n2\n"
    );
}

#[test]
fn two_counters_do_not_interfere() {
    assert_eq!(
        run_ok(
            "fun makeCounter() {\
               var i = 0;\
               fun count() {\
                 i = i + 1;\
                 return i;\
               }\
               return count;\
             }\
             var first = makeCounter();\
             var second = makeCounter();\
             print first();\
             print first();\
             print second();\
             print first();"
        ),
        "1\n2\n1\n3\n"
    );
}

#[test]
fn closures_bind_lexically_not_dynamically() {
    // The function sees the `a` in scope where it was defined, even after a
    // later declaration introduces a closer `a` at the call site's scope.
    assert_eq!(
        run_ok(
            "var a = \"global\";\
             {\
               fun showA() {\
                 print a;\
               }\
               showA();\
               var a = \"block\";\
               showA();\
             }"
        ),
        "global\nglobal\n"
    );
}

// ─────────────────────────── error behavior ───────────────────────────────

#[test]
fn execution_halts_at_first_runtime_error_but_keeps_prior_output() {
    let (printed, result) = run("print \"before\"; print 1 + nil; print \"after\";");

    assert_eq!(printed, "before\n");
    assert!(result.is_err());
}

#[test]
fn runtime_error_reports_the_offending_line() {
    let (_, line) = run_err("print 1;\nprint 2;\nprint 3 * nil;");
    assert_eq!(line, 3);
}

#[test]
fn session_state_survives_a_runtime_error() {
    // One interpreter, two interpret calls, as a REPL would drive it.  The
    // failing block must restore the environment cursor and leave globals
    // intact for the next call.
    let tokens_first: Vec<Token<'_>> = Scanner::new(
        "var a = \"kept\"; { var b = 1; print b + nil; }".as_bytes(),
    )
    .collect::<Result<Vec<_>, _>>()
    .expect("first line should tokenize cleanly");

    let tokens_second: Vec<Token<'_>> = Scanner::new("print a;".as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("second line should tokenize cleanly");

    let mut diagnostics = Diagnostics::new();

    let mut parser = Parser::new(&tokens_first, &mut diagnostics);
    let program_first = parser.parse();

    let mut parser = Parser::new(&tokens_second, &mut diagnostics);
    let program_second = parser.parse();

    assert!(!diagnostics.had_errors());

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_output(output.clone());

    {
        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
        resolver.resolve(&program_first);
        resolver.resolve(&program_second);
    }
    assert!(!diagnostics.had_errors());

    assert!(interpreter.interpret(&program_first).is_err());
    interpreter
        .interpret(&program_second)
        .expect("the session should still be usable");

    let printed = String::from_utf8(output.borrow().clone()).expect("output should be UTF-8");
    assert_eq!(printed, "kept\n");
}
