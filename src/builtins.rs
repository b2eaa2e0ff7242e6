use crate::ast::{Env, Node, NodeKind, Value};
use crate::error::Error;

/// Reads an integer out of an evaluated argument.
fn as_int(node: &Node) -> Result<i64, Error> {
    match &node.kind {
        NodeKind::Native(Value::Int(n)) => Ok(*n),
        NodeKind::Atom(name) => name
            .parse()
            .map_err(|_| Error::type_error([node.span], format!("`{name}` is not an integer"))),
        _ => Err(Error::type_error(
            [node.span],
            format!("i expected an integer, but found a {}", node.kind_name()),
        )),
    }
}

fn overflow(op: &str) -> Error {
    Error::type_error([], format!("integer overflow in `{op}`"))
}

/// A curried two-argument integer function.
fn binary(op: fn(i64, i64) -> Result<Value, Error>) -> Node {
    Node::native(
        Value::func(move |lhs| {
            let lhs = as_int(&lhs)?;
            Ok(Value::func(move |rhs| op(lhs, as_int(&rhs)?)))
        }),
        None,
    )
}

/// Host bindings for evaluating programs: integer arithmetic and comparison.
pub fn prelude() -> Env {
    [
        ("+", binary(|a, b| a.checked_add(b).map(Value::Int).ok_or_else(|| overflow("+")))),
        ("-", binary(|a, b| a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow("-")))),
        ("*", binary(|a, b| a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow("*")))),
        (
            "/",
            binary(|a, b| match b {
                0 => Err(Error::type_error([], "division by zero")),
                _ => a.checked_div(b).map(Value::Int).ok_or_else(|| overflow("/")),
            }),
        ),
        (
            "%",
            binary(|a, b| match b {
                0 => Err(Error::type_error([], "division by zero")),
                _ => a.checked_rem(b).map(Value::Int).ok_or_else(|| overflow("%")),
            }),
        ),
        ("=", binary(|a, b| Ok(Value::Bool(a == b)))),
        ("<", binary(|a, b| Ok(Value::Bool(a < b)))),
        ("<=", binary(|a, b| Ok(Value::Bool(a <= b)))),
        (">", binary(|a, b| Ok(Value::Bool(a > b)))),
        (">=", binary(|a, b| Ok(Value::Bool(a >= b)))),
    ]
    .into_iter()
    .collect()
}

/// Bindings visible while a user macro runs.
pub fn macro_env() -> Env {
    let first = Node::native_fn(|args| match args {
        [list] => list
            .as_list()
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| Error::type_error([list.span], "`first` needs a non-empty list")),
        _ => Err(Error::type_error([], format!("`first` takes one argument, not {}", args.len()))),
    });
    [("first", first)].into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(env: &Env, name: &str, lhs: i64, rhs: i64) -> Result<Value, Error> {
        let NodeKind::Native(Value::Func(f)) = &env.get(name).unwrap().kind else {
            panic!("{name} is not a host function");
        };
        let Value::Func(g) = f(Node::native(Value::Int(lhs), None))? else {
            panic!("{name} is not curried");
        };
        g(Node::native(Value::Int(rhs), None))
    }

    #[test]
    fn arithmetic_is_curried() {
        let env = prelude();
        assert_eq!(call(&env, "+", 2, 3).unwrap(), Value::Int(5));
        assert_eq!(call(&env, "-", 2, 3).unwrap(), Value::Int(-1));
        assert_eq!(call(&env, "<=", 2, 3).unwrap(), Value::Bool(true));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = call(&prelude(), "/", 1, 0).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn numeric_atoms_count_as_integers() {
        assert_eq!(as_int(&Node::atom("-12", None)).unwrap(), -12);
        assert!(as_int(&Node::atom("x", None)).is_err());
    }
}
