use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::Error;

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Moves the span `offset` bytes to the right.
    pub fn shifted(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} --> {}]", self.start, self.end)
    }
}

/// Curried host function: takes one evaluated argument node.
pub type HostFn = Arc<dyn Fn(Node) -> Result<Value, Error> + Send + Sync>;

/// Host function receiving every evaluated argument at once (RAW2).
pub type NativeFn = Arc<dyn Fn(&[Node]) -> Result<Node, Error> + Send + Sync>;

/// Opaque host value carried by a RAW node.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
    Func(HostFn),
}

impl Value {
    pub fn func(f: impl Fn(Node) -> Result<Value, Error> + Send + Sync + 'static) -> Self {
        Value::Func(Arc::new(f))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Unit => false,
            Value::Func(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Unit => write!(f, "Unit"),
            Value::Func(_) => write!(f, "Func(<host fn>)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Unit => write!(f, "()"),
            Value::Func(_) => write!(f, "<host fn>"),
        }
    }
}

/// What a node holds. `Native`/`NativeFn` are the evaluator's escape hatches
/// into the host (RAW and RAW2).
#[derive(Clone)]
pub enum NodeKind {
    Quoted(Box<Node>),
    List(Vec<Node>),
    Atom(String),
    Str(String),
    Null,
    Keyword(String),
    Native(Value),
    NativeFn(NativeFn),
}

impl PartialEq for NodeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeKind::Quoted(a), NodeKind::Quoted(b)) => a == b,
            (NodeKind::List(a), NodeKind::List(b)) => a == b,
            (NodeKind::Atom(a), NodeKind::Atom(b)) => a == b,
            (NodeKind::Str(a), NodeKind::Str(b)) => a == b,
            (NodeKind::Null, NodeKind::Null) => true,
            (NodeKind::Keyword(a), NodeKind::Keyword(b)) => a == b,
            (NodeKind::Native(a), NodeKind::Native(b)) => a == b,
            (NodeKind::NativeFn(a), NodeKind::NativeFn(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Quoted(inner) => f.debug_tuple("Quoted").field(inner).finish(),
            NodeKind::List(items) => f.debug_tuple("List").field(items).finish(),
            NodeKind::Atom(name) => f.debug_tuple("Atom").field(name).finish(),
            NodeKind::Str(text) => f.debug_tuple("Str").field(text).finish(),
            NodeKind::Null => write!(f, "Null"),
            NodeKind::Keyword(name) => f.debug_tuple("Keyword").field(name).finish(),
            NodeKind::Native(value) => f.debug_tuple("Native").field(value).finish(),
            NodeKind::NativeFn(_) => write!(f, "NativeFn(<host fn>)"),
        }
    }
}

/// The untyped placeholder every node's type defaults to.
static UNTYPED: Node = Node {
    kind: NodeKind::Null,
    span: None,
    ty: None,
};

/// An AST node. Types are nodes too; an untyped node reports a `Null` type.
/// `span` is `None` for synthesized nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Option<Span>,
    ty: Option<Box<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Option<Span>) -> Self {
        Self { kind, span, ty: None }
    }

    pub fn null() -> Self {
        Self::new(NodeKind::Null, None)
    }

    pub fn atom(name: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(NodeKind::Atom(name.into()), span)
    }

    pub fn list(items: Vec<Node>, span: Option<Span>) -> Self {
        Self::new(NodeKind::List(items), span)
    }

    pub fn quoted(inner: Node, span: Option<Span>) -> Self {
        Self::new(NodeKind::Quoted(Box::new(inner)), span)
    }

    pub fn string(text: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(NodeKind::Str(text.into()), span)
    }

    pub fn keyword(name: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(NodeKind::Keyword(name.into()), span)
    }

    pub fn native(value: Value, span: Option<Span>) -> Self {
        Self::new(NodeKind::Native(value), span)
    }

    pub fn native_fn(f: impl Fn(&[Node]) -> Result<Node, Error> + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::NativeFn(Arc::new(f)), None)
    }

    /// The node's type, `Null` when untyped.
    pub fn ty(&self) -> &Node {
        self.ty.as_deref().unwrap_or(&UNTYPED)
    }

    pub fn with_type(mut self, ty: Node) -> Self {
        self.set_type(ty);
        self
    }

    pub fn set_type(&mut self, ty: Node) {
        self.ty = if ty.is_null() { None } else { Some(Box::new(ty)) };
    }

    /// Moves the node to `span`, keeping everything else.
    pub fn relocated(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_atom(&self, name: &str) -> bool {
        self.as_atom() == Some(name)
    }

    /// Name of the head atom of a list, if there is one.
    pub fn head_name(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }

    /// `(lambda (params...) body)`: returns the parameter list and the body.
    pub fn as_lambda(&self) -> Option<(&[Node], &Node)> {
        match self.as_list()? {
            [head, params, body] if head.is_atom("lambda") => Some((params.as_list()?, body)),
            _ => None,
        }
    }

    /// Copy of the node with every type annotation, nested ones included, removed.
    pub fn without_types(&self) -> Node {
        let kind = match &self.kind {
            NodeKind::List(items) => NodeKind::List(items.iter().map(Node::without_types).collect()),
            NodeKind::Quoted(inner) => NodeKind::Quoted(Box::new(inner.without_types())),
            other => other.clone(),
        };
        Node::new(kind, self.span)
    }

    /// Human name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Quoted(_) => "quoted value",
            NodeKind::List(_) => "list",
            NodeKind::Atom(_) => "atom",
            NodeKind::Str(_) => "string",
            NodeKind::Null => "null",
            NodeKind::Keyword(_) => "keyword",
            NodeKind::Native(_) | NodeKind::NativeFn(_) => "host value",
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, types: bool) -> fmt::Result {
        match &self.kind {
            NodeKind::Null => return write!(f, "[null]"),
            NodeKind::Native(value) => write!(f, "[raw: {value}]")?,
            NodeKind::NativeFn(_) => write!(f, "[raw: <host fn>]")?,
            NodeKind::Atom(name) => write!(f, "{name}")?,
            NodeKind::Keyword(name) => write!(f, ".{name}")?,
            NodeKind::Str(text) => write!(f, "\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))?,
            NodeKind::Quoted(inner) => {
                write!(f, "'")?;
                inner.write(f, types)?;
            }
            NodeKind::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    item.write(f, types)?;
                }
                write!(f, ")")?;
            }
        }
        if types && !self.ty().is_null() {
            write!(f, ": ")?;
            self.ty().write(f, types)?;
        }
        Ok(())
    }
}

/// `{}` prints the tree as source; `{:#}` also prints non-null types.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, f.alternate())
    }
}

/// Immutable name -> node map. Used as the evaluator environment, the macro
/// expander's replacements and the top-level constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    map: BTreeMap<String, Node>,
}

pub type Env = Bindings;

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// New bindings with `name` bound to `value`.
    pub fn with(&self, name: impl Into<String>, value: Node) -> Self {
        let mut map = self.map.clone();
        map.insert(name.into(), value);
        Self { map }
    }

    /// New bindings holding both maps; `other` wins on collisions.
    pub fn merge(&self, other: &Bindings) -> Self {
        let mut map = self.map.clone();
        map.extend(other.map.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, Node)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (S, Node)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_types_are_not_stored() {
        let typed = Node::atom("x", None).with_type(Node::null());
        assert_eq!(typed, Node::atom("x", None));
        assert!(typed.ty().is_null());
    }

    #[test]
    fn bindings_extension_leaves_the_original_alone() {
        let base = Bindings::new().with("a", Node::atom("1", None));
        let extended = base.with("b", Node::atom("2", None));
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert!(!base.contains("b"));
    }

    #[test]
    fn merge_prefers_the_right_side() {
        let left = Bindings::new().with("a", Node::atom("1", None));
        let right = Bindings::new().with("a", Node::atom("2", None));
        assert_eq!(left.merge(&right).get("a"), Some(&Node::atom("2", None)));
    }

    #[test]
    fn truthiness_follows_the_host_values() {
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Unit.is_truthy());
    }
}
