//! Tree-walking evaluator.
//!
//! Functions are applied by substitution: the argument is spliced into the
//! lambda body with the macro expander, and the result is evaluated against
//! the environment the evaluation started with. Nothing is ever added to
//! that environment, so there are no closures.

use tracing::trace;

use crate::ast::{Bindings, Env, Node, NodeKind, Span, Value};
use crate::error::Error;
use crate::macros::expand_expr;

/// Matches `-?[0-9]+`.
fn is_integer(name: &str) -> bool {
    let digits = name.strip_prefix('-').unwrap_or(name);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn evaluate(expr: &Node, env: &Env) -> Result<Node, Error> {
    match &expr.kind {
        NodeKind::Native(_) | NodeKind::NativeFn(_) | NodeKind::Str(_) | NodeKind::Null | NodeKind::Keyword(_) => {
            Ok(expr.clone())
        }
        NodeKind::Atom(name) => evaluate_atom(expr, name, env),
        NodeKind::Quoted(inner) => evaluate_quoted(inner, env),
        NodeKind::List(items) => evaluate_list(expr, items, env),
    }
}

fn evaluate_atom(expr: &Node, name: &str, env: &Env) -> Result<Node, Error> {
    if is_integer(name) {
        let n = name
            .parse::<i64>()
            .map_err(|_| Error::type_error([expr.span], format!("{name} does not fit in 64 bits")))?;
        return Ok(Node::native(Value::Int(n), expr.span).with_type(expr.ty().clone()));
    }
    match env.get(name) {
        Some(bound) => Ok(evaluate(bound, env)?.relocated(expr.span)),
        None => Err(Error::reference(name, expr.span)),
    }
}

/// A quoted list has its elements evaluated once; anything else comes back as is.
fn evaluate_quoted(inner: &Node, env: &Env) -> Result<Node, Error> {
    match inner.as_list() {
        Some(items) => {
            let items = items.iter().map(|item| evaluate(item, env)).collect::<Result<_, _>>()?;
            Ok(Node::list(items, inner.span).with_type(inner.ty().clone()))
        }
        None => Ok(inner.clone()),
    }
}

fn is_conditional(items: &[Node], env: &Env) -> bool {
    items.len() == 4 && items[0].is_atom("?") && !env.contains("?")
}

fn evaluate_list(expr: &Node, items: &[Node], env: &Env) -> Result<Node, Error> {
    let Some((head, args)) = items.split_first() else {
        return Err(Error::type_error([expr.span], "i can't call an empty list"));
    };

    if is_conditional(items, env) {
        return evaluate_conditional(items, env);
    }
    if expr.as_lambda().is_some() {
        return Ok(expr.clone());
    }
    let bound_lambda = head
        .as_atom()
        .and_then(|name| env.get(name))
        .filter(|bound| bound.as_lambda().is_some());
    if let Some(lambda) = bound_lambda {
        return call(lambda.clone(), args, expr.span, env);
    }
    if head.as_lambda().is_some() {
        return call(head.clone(), args, expr.span, env);
    }

    let callee = evaluate(head, env)?;
    call(callee, args, expr.span, env)
}

fn evaluate_conditional(items: &[Node], env: &Env) -> Result<Node, Error> {
    let cond = evaluate(&items[1], env)?;
    let truthy = match &cond.kind {
        NodeKind::Native(value) => value.is_truthy(),
        NodeKind::NativeFn(_) => true,
        _ => {
            return Err(Error::type_error(
                [items[1].span],
                format!("a condition must evaluate to a host value, not a {}", cond.kind_name()),
            ))
        }
    };
    evaluate(&items[if truthy { 2 } else { 3 }], env)
}

/// Applies `callee` to `args`. Host functions taking every argument at once get
/// them in one go; everything else is applied one argument at a time. Host
/// errors without a location are pinned to the call at `span`.
fn call(callee: Node, args: &[Node], span: Option<Span>, env: &Env) -> Result<Node, Error> {
    if let NodeKind::NativeFn(f) = &callee.kind {
        let args: Vec<Node> = args.iter().map(|arg| evaluate(arg, env)).collect::<Result<_, _>>()?;
        return f(&args).map_err(|e| e.or_at(span));
    }
    args.iter().try_fold(callee, |callee, arg| {
        let arg = evaluate(arg, env)?;
        apply(&callee, arg, env).map_err(|e| e.or_at(span))
    })
}

fn apply(callee: &Node, arg: Node, env: &Env) -> Result<Node, Error> {
    match &callee.kind {
        NodeKind::Native(Value::Func(f)) => Ok(Node::native(f(arg)?, None)),
        NodeKind::NativeFn(f) => f(std::slice::from_ref(&arg)),
        _ => match callee.as_lambda() {
            Some((params, body)) => substitute(callee.span, params, body, arg, env),
            None => Err(Error::type_error(
                [callee.span],
                format!("a {} is not callable", callee.kind_name()),
            )),
        },
    }
}

fn substitute(span: Option<Span>, params: &[Node], body: &Node, arg: Node, env: &Env) -> Result<Node, Error> {
    let [param] = params else {
        return Err(Error::type_error(
            [span],
            format!("a lambda value takes exactly one parameter, not {}", params.len()),
        ));
    };
    let Some(name) = param.as_atom() else {
        return Err(Error::type_error([param.span], "a lambda parameter must be an atom"));
    };
    trace!(param = name, "substituting");
    let expanded = expand_expr(body, &Bindings::new().with(name, arg))?;
    match expanded.ast {
        Some(body) => evaluate(&body, env),
        None => Err(Error::type_error([body.span], "this lambda's body expands to nothing")),
    }
}
