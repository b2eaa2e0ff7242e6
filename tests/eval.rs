use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lion_compiler::ast::{Bindings, Env, Node, NodeKind, Span, Value};
use lion_compiler::builtins::prelude;
use lion_compiler::error::Error;
use lion_compiler::eval::evaluate;
use lion_compiler::*;

fn eval_source(source: &str, env: &Env) -> Result<Node, Error> {
    let forms = parser::parse_program(source)?;
    let expanded = macros::expand(&forms)?;
    evaluate(&expanded.ast[0], env)
}

fn int(n: i64) -> Node {
    Node::native(Value::Int(n), None)
}

#[test]
fn test_numeric_atoms() {
    let result = eval_source("-42", &Bindings::new()).unwrap();
    assert_eq!(result, Node::native(Value::Int(-42), Some(Span::new(0, 3))));
}

#[test]
fn test_integer_overflow() {
    let err = eval_source("99999999999999999999", &Bindings::new()).unwrap_err();
    assert!(matches!(err, Error::Type { .. }));
}

#[test]
fn test_bound_atoms_move_to_the_reference() {
    let env = Bindings::new().with("answer", Node::native(Value::Str("yes".into()), None));
    let result = eval_source("answer", &env).unwrap();
    assert_eq!(result, Node::native(Value::Str("yes".into()), Some(Span::new(0, 6))));
}

#[test]
fn test_unbound_atoms() {
    let err = eval_source("(f nope)", &Bindings::new()).unwrap_err();
    match err {
        Error::Reference { name, span, .. } => {
            assert_eq!(name, "f");
            assert_eq!(span, Some(Span::new(1, 2)));
        }
        other => panic!("expected a reference error, got {other:?}"),
    }
}

#[test]
fn test_quoted_atoms_are_not_evaluated() {
    let result = eval_source("'x", &Bindings::new()).unwrap();
    assert_eq!(result, Node::atom("x", Some(Span::new(1, 2))));
}

#[test]
fn test_quoted_lists_evaluate_one_level() {
    let env = Bindings::new().with("x", int(5));
    let result = eval_source("'(x 'y)", &env).unwrap();
    assert_eq!(result.to_string(), "([raw: 5] y)");
}

#[test]
fn test_self_evaluating_nodes() {
    for source in [r#""a \"string\"""#, ".keyword"] {
        let forms = parser::parse_program(source).unwrap();
        assert_eq!(evaluate(&forms[0], &Bindings::new()).unwrap(), forms[0], "{source}");
    }
    assert_eq!(evaluate(&Node::null(), &Bindings::new()).unwrap(), Node::null());
}

#[test]
fn test_curried_host_functions() {
    let result = eval_source("(+ 2 3)", &prelude()).unwrap();
    assert_eq!(result, int(5));
    let result = eval_source("(<= 4 3)", &prelude()).unwrap();
    assert_eq!(result, Node::native(Value::Bool(false), None));
}

#[test]
fn test_host_functions_see_evaluated_arguments() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let env = prelude().with(
        "count",
        Node::native_fn(move |args| {
            counter.fetch_add(args.len(), Ordering::SeqCst);
            Ok(args.last().cloned().unwrap_or_else(Node::null))
        }),
    );
    let result = eval_source("(count 1 (+ 1 1) 3)", &env).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert_eq!(result, Node::native(Value::Int(3), Some(Span::new(17, 18))));
}

#[test]
fn test_conditional() {
    assert_eq!(eval_source("(? (< 1 2) 10 20)", &prelude()).unwrap(), int(10).relocated(Some(Span::new(11, 13))));
    assert_eq!(eval_source("(? 0 10 20)", &prelude()).unwrap(), int(20).relocated(Some(Span::new(8, 10))));
}

#[test]
fn test_conditional_needs_a_host_value() {
    let err = eval_source("(? 'x 1 2)", &prelude()).unwrap_err();
    assert!(err.to_string().contains("condition"), "{err}");
}

#[test]
fn test_shadowed_conditional_is_a_call() {
    let env = prelude().with("?", Node::native_fn(|args| Ok(Node::native(Value::Int(args.len() as i64), None))));
    assert_eq!(eval_source("(? 0 1 2)", &env).unwrap(), int(3));
}

#[test]
fn test_lambdas_are_values() {
    let result = eval_source("(lambda (x) x)", &Bindings::new()).unwrap();
    assert!(result.as_lambda().is_some());
}

#[test]
fn test_lambda_application_by_substitution() {
    let result = eval_source("((lambda (x y) (- x y)) 10 3)", &prelude()).unwrap();
    assert_eq!(result, int(7));
}

#[test]
fn test_bound_lambdas() {
    let double = parser::parse_program("(lambda (n) (+ n n))").unwrap().remove(0);
    let env = prelude().with("double", double);
    assert_eq!(eval_source("(double 21)", &env).unwrap(), int(42));
}

#[test]
fn test_arguments_are_substituted_into_inner_lambdas() {
    let result = eval_source("((lambda (x) ((lambda (y) x) 2)) 1)", &prelude()).unwrap();
    assert_eq!(result, int(1).relocated(Some(Span::new(33, 34))));
}

#[test]
fn test_bodies_only_see_the_host_environment() {
    let err = eval_source("((lambda (x) z) 1)", &prelude()).unwrap_err();
    assert!(matches!(err, Error::Reference { ref name, .. } if name == "z"));
}

#[test]
fn test_calling_a_non_function() {
    let err = eval_source("(\"text\" 1)", &Bindings::new()).unwrap_err();
    assert!(err.to_string().contains("not callable"), "{err}");
}

#[test]
fn test_empty_list() {
    let err = eval_source("()", &Bindings::new()).unwrap_err();
    assert!(matches!(err, Error::Type { .. }));
}

#[test]
fn test_host_function_values_print() {
    let f = prelude().get("+").cloned().unwrap();
    assert!(matches!(f.kind, NodeKind::Native(Value::Func(_))));
    assert_eq!(f.to_string(), "[raw: <host fn>]");
}

#[test]
fn test_host_errors_point_at_the_call() {
    let err = eval_source("(/ 1 0)", &prelude()).unwrap_err();
    assert_eq!(err.spans(), vec![Span::new(0, 7)]);
    assert_eq!(err.to_string(), "type error: [0 --> 7] division by zero");

    let err = eval_source("(+ 1 (* 9223372036854775807 2))", &prelude()).unwrap_err();
    assert_eq!(err.spans(), vec![Span::new(5, 30)]);
}
