//! What a native backend gets to see: one exported function per lambda
//! constant, with a mangled symbol and fully resolved types.

use crate::ast::{Bindings, Node};
use crate::error::Error;

fn mangle_char(c: char, out: &mut String) {
    let code = match c {
        'a'..='y' | 'A'..='Y' | '0'..='9' => {
            out.push(c);
            return;
        }
        'z' => "zz",
        'Z' => "ZZ",
        '(' => "ZL",
        ')' => "ZR",
        '[' => "ZM",
        ']' => "ZN",
        ':' => "ZC",
        '&' => "za",
        '|' => "zb",
        '^' => "zc",
        '$' => "zd",
        '=' => "ze",
        '>' => "zg",
        '#' => "zh",
        '.' => "zi",
        '<' => "zl",
        '-' => "zm",
        '!' => "zn",
        '+' => "zp",
        '\'' => "zq",
        '\\' => "zr",
        '/' => "zs",
        '*' => "zt",
        '_' => "zu",
        '%' => "zv",
        other => {
            let hex = format!("{:x}", u32::from(other));
            let pad = if hex.starts_with(|d: char| d.is_ascii_digit()) { "" } else { "0" };
            out.push_str(&format!("z{pad}{hex}U"));
            return;
        }
    };
    out.push_str(code);
}

/// Encodes an identifier using only ASCII letters and digits.
pub fn mangle_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        mangle_char(c, &mut out);
    }
    out
}

/// Counter for backend temporaries, one per compilation.
#[derive(Debug, Default)]
pub struct TempNames {
    next: usize,
}

impl TempNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.next);
        self.next += 1;
        name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub symbol: String,
    /// Parameter names and types, curried lambdas flattened.
    pub params: Vec<(String, Node)>,
    pub ret: Node,
    /// The innermost lambda body.
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInterface {
    pub name: String,
    pub functions: Vec<FunctionDecl>,
}

/// Lowers a checked module to some output.
pub trait Backend {
    type Output;

    fn lower(&mut self, module: &ModuleInterface, temps: &mut TempNames) -> Result<Self::Output, Error>;
}

fn is_resolved(ty: &Node) -> bool {
    match ty.as_list() {
        Some(items) => items.iter().all(is_resolved),
        None => !ty.is_null(),
    }
}

fn resolved(name: &str, what: &str, node: &Node) -> Result<Node, Error> {
    let ty = node.ty();
    if is_resolved(ty) {
        return Ok(ty.clone());
    }
    Err(Error::type_error(
        [node.span],
        format!("i can't export `{name}`: the type of {what} is not known ({ty})"),
    ))
}

fn declare(name: &str, lambda: &Node) -> Result<FunctionDecl, Error> {
    let mut params = Vec::new();
    let mut current = lambda;
    while let Some((list, body)) = current.as_lambda() {
        for param in list {
            let Some(param_name) = param.as_atom() else {
                return Err(Error::type_error([param.span], "lambda parameters must be atoms"));
            };
            params.push((param_name.to_string(), resolved(name, &format!("`{param_name}`"), param)?));
        }
        current = body;
    }
    Ok(FunctionDecl {
        name: name.to_string(),
        symbol: mangle_name(name),
        ret: resolved(name, "its result", current)?,
        params,
        body: current.clone(),
    })
}

/// Collects the exported functions of a module from its inferred constants.
/// Constants that are not lambdas are not exported.
pub fn module_interface(module_name: &str, consts: &Bindings) -> Result<ModuleInterface, Error> {
    let functions = consts
        .iter()
        .filter(|(_, node)| node.as_lambda().is_some())
        .map(|(name, node)| declare(name, node))
        .collect::<Result<_, _>>()?;
    Ok(ModuleInterface {
        name: module_name.to_string(),
        functions,
    })
}
