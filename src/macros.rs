//! Special forms and user macros.
//!
//! Expansion is plain tree substitution: a bound atom is replaced by its
//! value wherever it occurs, inner binders included.

use tracing::{debug, trace};

use crate::ast::{Bindings, Node, NodeKind, Span};
use crate::builtins::macro_env;
use crate::error::Error;
use crate::eval::evaluate;

/// Result of expanding a whole program.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub ast: Vec<Node>,
    pub consts: Bindings,
}

/// Result of expanding one node. `ast` is `None` for forms like `def` that
/// only produce bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub ast: Option<Node>,
    pub consts: Bindings,
}

impl Expanded {
    fn node(ast: Node) -> Self {
        Self {
            ast: Some(ast),
            consts: Bindings::new(),
        }
    }
}

pub fn expand(forms: &[Node]) -> Result<Expansion, Error> {
    expand_with(forms, Bindings::new())
}

/// Expands top-level forms left to right. Constants defined by earlier forms
/// are substituted into later ones.
pub fn expand_with(forms: &[Node], consts: Bindings) -> Result<Expansion, Error> {
    let mut ast = Vec::with_capacity(forms.len());
    let mut consts = consts;
    for form in forms {
        let expanded = expand_expr(form, &consts)?;
        ast.extend(expanded.ast);
        consts = consts.merge(&expanded.consts);
    }
    debug!(forms = ast.len(), consts = consts.len(), "expanded program");
    Ok(Expansion { ast, consts })
}

/// Expands a single node with `replacements` substituted for atoms.
pub fn expand_expr(node: &Node, replacements: &Bindings) -> Result<Expanded, Error> {
    let ty = curry_type(node.ty());
    match &node.kind {
        NodeKind::Atom(name) => Ok(Expanded::node(match replacements.get(name) {
            Some(value) => value.clone(),
            None => node.clone().with_type(ty),
        })),
        NodeKind::Quoted(inner) => {
            let expanded = expand_expr(inner, replacements)?;
            let inner = expanded.ast.unwrap_or_else(Node::null);
            Ok(Expanded {
                ast: Some(Node::quoted(inner, node.span).with_type(ty)),
                consts: expanded.consts,
            })
        }
        NodeKind::List(items) => expand_list(node, items, replacements),
        _ => Ok(Expanded::node(node.clone().with_type(ty))),
    }
}

fn expand_list(node: &Node, items: &[Node], replacements: &Bindings) -> Result<Expanded, Error> {
    let special = node.head_name().filter(|name| !replacements.contains(name));
    match special {
        Some("let") => expand_let(node, items, replacements),
        Some("def") => expand_def(node, items, replacements),
        Some("lambda") => expand_lambda(node, items, replacements),
        _ => match user_macro(items, replacements) {
            Some((header, body)) => expand_macro(node, header, body, &items[1..]),
            None => expand_children(node, items, replacements),
        },
    }
}

/// Expands `(name value ...)` pairs against the replacements in scope.
fn bind_pairs(pairs: &[Node], replacements: &Bindings) -> Result<Bindings, Error> {
    let mut bound = Bindings::new();
    for pair in pairs.chunks_exact(2) {
        let (name, value) = (&pair[0], &pair[1]);
        let Some(name) = name.as_atom() else {
            return Err(Error::type_error(
                [name.span],
                format!("i can't assign to non-atoms, and this is a {}", name.kind_name()),
            ));
        };
        let Some(value) = expand_expr(value, replacements)?.ast else {
            return Err(Error::type_error([value.span], format!("`{name}` is bound to something that expands to nothing")));
        };
        bound = bound.with(name, value);
    }
    Ok(bound)
}

fn expand_let(node: &Node, items: &[Node], replacements: &Bindings) -> Result<Expanded, Error> {
    let arity = items.len() - 1;
    if arity < 3 || arity % 2 == 0 {
        return Err(Error::type_error([node.span], format!("let called with {arity} arguments")));
    }
    let body = &items[arity];
    let bound = bind_pairs(&items[1..arity], replacements)?;
    expand_expr(body, &replacements.merge(&bound))
}

fn expand_def(node: &Node, items: &[Node], replacements: &Bindings) -> Result<Expanded, Error> {
    let arity = items.len() - 1;
    if arity < 2 || arity % 2 != 0 {
        return Err(Error::type_error([node.span], format!("def called with {arity} arguments")));
    }
    let consts = bind_pairs(&items[1..], replacements)?;
    trace!(names = ?consts.names().collect::<Vec<_>>(), "def");
    Ok(Expanded { ast: None, consts })
}

/// `(lambda (a b c) body)` becomes `(lambda (a) (lambda (b) (lambda (c) body)))`.
fn expand_lambda(node: &Node, items: &[Node], replacements: &Bindings) -> Result<Expanded, Error> {
    let [head, params, body] = items else {
        return Err(Error::type_error(
            [node.span],
            format!("a lambda needs a parameter list and a body, but this one has {} parts", items.len()),
        ));
    };
    let Some(params_list) = params.as_list() else {
        return Err(Error::type_error(
            [params.span],
            format!("the parameters of a lambda go in a list, not a {}", params.kind_name()),
        ));
    };
    if params_list.is_empty() {
        return Err(Error::type_error([params.span], "a lambda takes at least one parameter"));
    }

    let body = expand_expr(body, replacements)?;
    let Some(mut lambda) = body.ast else {
        return Err(Error::type_error([node.span], "this lambda's body expands to nothing"));
    };
    for param in params_list.iter().rev() {
        let Some(param) = expand_expr(param, replacements)?.ast else {
            return Err(Error::type_error([param.span], "this parameter expands to nothing"));
        };
        lambda = Node::list(vec![head.clone(), Node::list(vec![param], params.span), lambda], node.span);
    }
    Ok(Expanded {
        ast: Some(lambda.with_type(curry_type(node.ty()))),
        consts: body.consts,
    })
}

/// `((macro (env args) body) arg ...)` with `macro` not rebound. Returns the
/// header and the body.
fn user_macro<'a>(items: &'a [Node], replacements: &Bindings) -> Option<(&'a Node, &'a Node)> {
    if items.len() < 2 || replacements.contains("macro") {
        return None;
    }
    match items[0].as_list()? {
        [head, header, body] if head.is_atom("macro") && header.as_list().is_some() => Some((header, body)),
        _ => None,
    }
}

fn expand_macro(node: &Node, header: &Node, body: &Node, args: &[Node]) -> Result<Expanded, Error> {
    let names = match header.as_list() {
        Some([env, args]) => env.as_atom().zip(args.as_atom()),
        _ => None,
    };
    let Some((env_name, args_name)) = names else {
        return Err(Error::type_error(
            [header.span],
            "a macro header names exactly two atoms: the environment and the arguments",
        ));
    };

    let args = args.iter().map(|arg| Node::quoted(arg.clone(), None)).collect();
    let env = macro_env()
        .with(env_name, Node::null())
        .with(args_name, Node::quoted(Node::list(args, None), None));
    trace!(span = ?node.span, "expanding user macro");
    Ok(Expanded::node(evaluate(body, &env)?))
}

fn expand_children(node: &Node, items: &[Node], replacements: &Bindings) -> Result<Expanded, Error> {
    let mut children = Vec::with_capacity(items.len());
    let mut consts = Bindings::new();
    for item in items {
        let expanded = expand_expr(item, replacements)?;
        children.extend(expanded.ast);
        consts = consts.merge(&expanded.consts);
    }
    Ok(Expanded {
        ast: Some(Node::list(children, node.span).with_type(curry_type(node.ty()))),
        consts,
    })
}

fn cover(first: Option<Span>, last: Option<Span>) -> Option<Span> {
    match (first, last) {
        (Some(first), Some(last)) => Some(Span::new(first.start, last.end)),
        _ => None,
    }
}

/// Rewrites every arrow into its one-argument form:
/// `(-> A B C)` becomes `(-> A (-> B C))` and `(-> A)` becomes `A`.
pub fn curry_type(ty: &Node) -> Node {
    let Some(items) = ty.as_list() else {
        return ty.clone();
    };
    let items: Vec<Node> = items.iter().map(curry_type).collect();
    match items.as_slice() {
        [arrow, only] if arrow.is_atom("->") => only.clone().relocated(ty.span),
        [arrow, first, rest @ ..] if arrow.is_atom("->") && rest.len() > 1 => {
            let span = cover(rest[0].span, rest[rest.len() - 1].span);
            let tail = std::iter::once(arrow.clone()).chain(rest.iter().cloned()).collect();
            let tail = curry_type(&Node::list(tail, span));
            Node::list(vec![arrow.clone(), first.clone(), tail], ty.span)
        }
        _ => Node::list(items, ty.span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str) -> Node {
        Node::atom(name, None)
    }

    fn arrow(items: &[&str]) -> Node {
        Node::list(std::iter::once("->").chain(items.iter().copied()).map(atom).collect(), None)
    }

    #[test]
    fn arrows_nest_to_the_right() {
        let curried = curry_type(&arrow(&["a", "b", "c"]));
        assert_eq!(curried.to_string(), "(-> a (-> b c))");
        assert_eq!(curry_type(&arrow(&["a"])), atom("a"));
        assert_eq!(curry_type(&arrow(&["a", "b"])), arrow(&["a", "b"]));
    }

    #[test]
    fn nested_tail_covers_the_remaining_types() {
        let ty = Node::list(
            vec![
                Node::atom("->", Some(Span::new(1, 3))),
                Node::atom("a", Some(Span::new(4, 5))),
                Node::atom("b", Some(Span::new(6, 7))),
                Node::atom("c", Some(Span::new(8, 9))),
            ],
            Some(Span::new(0, 10)),
        );
        let curried = curry_type(&ty);
        let tail = &curried.as_list().unwrap()[2];
        assert_eq!(tail.span, Some(Span::new(6, 9)));
    }
}
