//! Structural type inference.
//!
//! Types are ordinary nodes: atoms like `i16`, arrows like `(-> i16 i16)`, and
//! `Null` for "unknown". While inferring, every type slot becomes an index into
//! a [`TypeTable`] arena and unknowns are merged with union-find, so two nodes
//! that must agree share one representative instead of being updated in place.

use tracing::{debug, trace};

use crate::ast::{Bindings, Node, NodeKind, Span};
use crate::error::Error;

type TypeVar = usize;

#[derive(Debug, Clone)]
enum Term {
    Unknown,
    Atom { name: String, span: Option<Span> },
    List { items: Vec<TypeVar>, span: Option<Span> },
}

#[derive(Debug, Default)]
struct TypeTable {
    terms: Vec<Term>,
    parent: Vec<TypeVar>,
}

impl TypeTable {
    fn push(&mut self, term: Term) -> TypeVar {
        let var = self.terms.len();
        self.terms.push(term);
        self.parent.push(var);
        var
    }

    fn fresh(&mut self) -> TypeVar {
        self.push(Term::Unknown)
    }

    fn find(&mut self, var: TypeVar) -> TypeVar {
        let mut root = var;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut var = var;
        while self.parent[var] != root {
            let next = self.parent[var];
            self.parent[var] = root;
            var = next;
        }
        root
    }

    /// Turns a type node into a term. `Null` anywhere becomes a fresh unknown.
    fn import(&mut self, ty: &Node) -> Result<TypeVar, Error> {
        match &ty.kind {
            NodeKind::Null => Ok(self.fresh()),
            NodeKind::Atom(name) => Ok(self.push(Term::Atom {
                name: name.clone(),
                span: ty.span,
            })),
            NodeKind::List(items) => {
                let items = items.iter().map(|item| self.import(item)).collect::<Result<_, _>>()?;
                Ok(self.push(Term::List { items, span: ty.span }))
            }
            _ => Err(Error::type_error(
                [ty.span],
                format!("a {} can't be used as a type", ty.kind_name()),
            )),
        }
    }

    fn export(&mut self, var: TypeVar) -> Node {
        let var = self.find(var);
        match self.terms[var].clone() {
            Term::Unknown => Node::null(),
            Term::Atom { name, span } => Node::atom(name, span),
            Term::List { items, span } => {
                Node::list(items.into_iter().map(|item| self.export(item)).collect(), span)
            }
        }
    }

    fn occurs(&mut self, var: TypeVar, within: TypeVar) -> bool {
        let within = self.find(within);
        if within == var {
            return true;
        }
        match self.terms[within].clone() {
            Term::List { items, .. } => items.into_iter().any(|item| self.occurs(var, item)),
            _ => false,
        }
    }

    /// Points the unknown `var` at `to`.
    fn bind(&mut self, var: TypeVar, to: TypeVar) -> Result<(), Error> {
        if self.occurs(var, to) {
            let ty = self.export(to);
            return Err(Error::type_error(
                [ty.span],
                format!("this type would have to contain itself: {ty}"),
            ));
        }
        self.parent[var] = to;
        Ok(())
    }

    /// Merges two types. When both are known the result keeps `a`'s span if
    /// it has one.
    fn unify(&mut self, a: TypeVar, b: TypeVar) -> Result<(), Error> {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return Ok(());
        }
        match (self.terms[a].clone(), self.terms[b].clone()) {
            (Term::Unknown, _) => self.bind(a, b),
            (_, Term::Unknown) => self.bind(b, a),
            (Term::Atom { name: x, span: sx }, Term::Atom { name: y, span: sy }) => {
                if x != y {
                    return Err(Error::type_error([sx, sy], format!("i can't unify `{x}` with `{y}`")));
                }
                self.terms[a] = Term::Atom { name: x, span: sx.or(sy) };
                self.parent[b] = a;
                Ok(())
            }
            (Term::List { items: xs, span: sx }, Term::List { items: ys, span: sy }) => {
                if xs.len() != ys.len() {
                    return Err(Error::type_error(
                        [sx, sy],
                        format!("a type with {} parts can't match one with {}", xs.len(), ys.len()),
                    ));
                }
                self.terms[a] = Term::List {
                    items: xs.clone(),
                    span: sx.or(sy),
                };
                self.parent[b] = a;
                xs.into_iter().zip(ys).try_for_each(|(x, y)| self.unify(x, y))
            }
            _ => {
                let (x, y) = (self.export(a), self.export(b));
                Err(Error::type_error(
                    [x.span, y.span],
                    format!("i can't unify `{x}` with `{y}`"),
                ))
            }
        }
    }

    /// `(-> ? ... ?)` with `arity` argument slots.
    fn arrow(&mut self, arity: usize) -> TypeVar {
        let mut items = vec![self.push(Term::Atom {
            name: "->".to_string(),
            span: None,
        })];
        items.extend((0..=arity).map(|_| self.fresh()));
        self.push(Term::List { items, span: None })
    }

    /// What is left of an arrow once some of its arguments are supplied.
    fn partial(&mut self, slots: &[TypeVar], ret: TypeVar) -> TypeVar {
        let mut items = vec![self.push(Term::Atom {
            name: "->".to_string(),
            span: None,
        })];
        items.extend_from_slice(slots);
        items.push(ret);
        self.push(Term::List { items, span: None })
    }

    /// Argument slots and return slot of an arrow. An unknown is first made
    /// into an arrow taking `arity` arguments.
    fn arrow_parts(&mut self, var: TypeVar, arity: usize) -> Result<Option<(Vec<TypeVar>, TypeVar)>, Error> {
        let mut var = self.find(var);
        if let Term::Unknown = self.terms[var] {
            let arrow = self.arrow(arity);
            self.unify(var, arrow)?;
            var = self.find(var);
        }
        let Term::List { items, .. } = self.terms[var].clone() else {
            return Ok(None);
        };
        let head = match items.first() {
            Some(&head) => self.find(head),
            None => return Ok(None),
        };
        let is_arrow = matches!(&self.terms[head], Term::Atom { name, .. } if name == "->");
        if !is_arrow || items.len() < 3 {
            return Ok(None);
        }
        Ok(Some((items[1..items.len() - 1].to_vec(), items[items.len() - 1])))
    }
}

/// Type variables assigned to a node and, for lists, its children.
enum Shape {
    Leaf(TypeVar),
    List(TypeVar, Vec<Shape>),
}

impl Shape {
    fn var(&self) -> TypeVar {
        match self {
            Shape::Leaf(var) | Shape::List(var, _) => *var,
        }
    }
}

#[derive(Default)]
struct Inferencer {
    table: TypeTable,
    /// Lambda parameters in scope, innermost last.
    scopes: Vec<(String, TypeVar)>,
}

impl Inferencer {
    fn lookup(&self, name: &str) -> Option<TypeVar> {
        self.scopes.iter().rev().find(|(bound, _)| bound == name).map(|(_, var)| *var)
    }

    fn infer_node(&mut self, node: &Node) -> Result<Shape, Error> {
        match &node.kind {
            NodeKind::List(items) => self.infer_list(node, items),
            NodeKind::Atom(name) => {
                let var = self.table.import(node.ty())?;
                if let Some(param) = self.lookup(name) {
                    self.table.unify(param, var)?;
                }
                Ok(Shape::Leaf(var))
            }
            _ => Ok(Shape::Leaf(self.table.import(node.ty())?)),
        }
    }

    fn infer_list(&mut self, node: &Node, items: &[Node]) -> Result<Shape, Error> {
        match items {
            [head, params, body] if head.is_atom("lambda") => self.infer_lambda(node, head, params, body),
            [_, _, ..] => self.infer_application(node, items),
            _ => {
                let children = items.iter().map(|item| self.infer_node(item)).collect::<Result<_, _>>()?;
                Ok(Shape::List(self.table.import(node.ty())?, children))
            }
        }
    }

    /// Walks an arrow against `count` arguments, calling `each` with every
    /// (slot, argument index) pair. Arrows shorter than the argument list are
    /// taken as curried, longer ones as partially applied. Returns the type left
    /// over, or `None` if something along the way is not an arrow.
    fn walk_arrow(
        &mut self,
        mut fun: TypeVar,
        count: usize,
        mut each: impl FnMut(&mut Self, TypeVar, usize) -> Result<(), Error>,
    ) -> Result<Result<TypeVar, TypeVar>, Error> {
        let mut i = 0;
        while i < count {
            let Some((slots, ret)) = self.table.arrow_parts(fun, count - i)? else {
                return Ok(Err(fun));
            };
            let take = slots.len().min(count - i);
            for (n, &slot) in slots[..take].iter().enumerate() {
                each(self, slot, i + n)?;
            }
            i += take;
            fun = if take < slots.len() {
                self.table.partial(&slots[take..], ret)
            } else {
                ret
            };
        }
        Ok(Ok(fun))
    }

    fn infer_lambda(&mut self, node: &Node, head: &Node, params: &Node, body: &Node) -> Result<Shape, Error> {
        let names = match params.as_list() {
            Some(list) if !list.is_empty() => list,
            _ => {
                return Err(Error::type_error(
                    [params.span],
                    "a lambda's parameters must be a non-empty list",
                ))
            }
        };
        if let Some(bad) = names.iter().find(|param| param.as_atom().is_none()) {
            return Err(Error::type_error([bad.span], "lambda parameters must be atoms"));
        }

        let own = self.table.import(node.ty())?;
        let mut bound = Vec::with_capacity(names.len());
        let ret = self.walk_arrow(own, names.len(), |inf, slot, n| {
            let param = &names[n];
            let var = inf.table.import(param.ty())?;
            inf.table.unify(var, slot)?;
            bound.push((param.as_atom().unwrap_or_default().to_string(), var));
            Ok(())
        })?;
        let ret = match ret {
            Ok(ret) => ret,
            Err(fun) => {
                let ty = self.table.export(fun);
                return Err(Error::type_error(
                    [node.span, ty.span],
                    format!("invalid type for lambda: {ty}"),
                ));
            }
        };

        let param_shapes = bound.iter().map(|(_, var)| Shape::Leaf(*var)).collect();
        let depth = self.scopes.len();
        self.scopes.extend(bound);
        let body_shape = self.infer_node(body);
        self.scopes.truncate(depth);
        let body_shape = body_shape?;
        self.table.unify(body_shape.var(), ret)?;

        trace!(params = names.len(), "inferred lambda");
        Ok(Shape::List(
            own,
            vec![
                Shape::Leaf(self.table.import(head.ty())?),
                Shape::List(self.table.import(params.ty())?, param_shapes),
                body_shape,
            ],
        ))
    }

    fn infer_application(&mut self, node: &Node, items: &[Node]) -> Result<Shape, Error> {
        let shapes: Vec<Shape> = items.iter().map(|item| self.infer_node(item)).collect::<Result<_, _>>()?;
        let own = self.table.import(node.ty())?;
        let args: Vec<TypeVar> = shapes[1..].iter().map(Shape::var).collect();

        let ret = self.walk_arrow(shapes[0].var(), args.len(), |inf, slot, n| inf.table.unify(slot, args[n]))?;
        let ret = match ret {
            Ok(ret) => ret,
            Err(fun) => {
                let ty = self.table.export(fun);
                return Err(Error::type_error(
                    [items[0].span, ty.span],
                    format!("uncallable type: {ty}"),
                ));
            }
        };
        self.table.unify(ret, own)?;
        Ok(Shape::List(own, shapes))
    }

    /// Reads the resolved types back into a copy of `node`.
    fn rebuild(&mut self, node: &Node, shape: &Shape) -> Node {
        match shape {
            Shape::Leaf(var) => node.clone().with_type(self.table.export(*var)),
            Shape::List(var, children) => {
                let items = node.as_list().unwrap_or_default();
                let items = items.iter().zip(children).map(|(item, child)| self.rebuild(item, child)).collect();
                Node::list(items, node.span).with_type(self.table.export(*var))
            }
        }
    }
}

/// Merges two type nodes into one. `Null` unifies with anything.
pub fn unify(a: &Node, b: &Node) -> Result<Node, Error> {
    let mut table = TypeTable::default();
    let (x, y) = (table.import(a)?, table.import(b)?);
    table.unify(x, y)?;
    Ok(table.export(x))
}

/// Resolves every type slot of `ast`.
pub fn infer(ast: &Node) -> Result<Node, Error> {
    let mut inferencer = Inferencer::default();
    let shape = inferencer.infer_node(ast)?;
    let typed = inferencer.rebuild(ast, &shape);
    debug!(terms = inferencer.table.terms.len(), "inferred {}", typed.kind_name());
    Ok(typed)
}

pub fn infer_all(forms: &[Node]) -> Result<Vec<Node>, Error> {
    forms.iter().map(infer).collect()
}

/// Infers every bound value on its own.
pub fn infer_bindings(bindings: &Bindings) -> Result<Bindings, Error> {
    bindings
        .iter()
        .map(|(name, node)| Ok((name, infer(node)?)))
        .collect()
}
