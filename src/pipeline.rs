use clap::ValueEnum;
use tracing::debug;

use crate::ast::{Bindings, Env, Node};
use crate::backend::module_interface;
use crate::builtins::prelude;
use crate::error::Error;
use crate::eval::evaluate;
use crate::macros::{expand, Expansion};
use crate::parser::parse_program;
use crate::types::{infer_all, infer_bindings};

/// Lexes, parses and expands a program.
pub fn front_end(source: &str) -> Result<Expansion, Error> {
    let forms = parse_program(source)?;
    expand(&forms)
}

/// Expanded program with every type slot resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked {
    pub ast: Vec<Node>,
    pub consts: Bindings,
}

pub fn typecheck(expansion: &Expansion) -> Result<Checked, Error> {
    let consts = infer_bindings(&expansion.consts)?;
    let ast = infer_all(&expansion.ast)?;
    debug!(forms = ast.len(), consts = consts.len(), "typechecked program");
    Ok(Checked { ast, consts })
}

/// Runs a whole program and returns the value of each top-level form.
/// Constants are visible to the evaluator next to `host`.
pub fn run(source: &str, host: &Env) -> Result<Vec<Node>, Error> {
    let checked = typecheck(&front_end(source)?)?;
    let env = host.merge(&checked.consts);
    checked.ast.iter().map(|form| evaluate(form, &env)).collect()
}

/// How far the driver takes a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Expand macros and special forms
    #[default]
    Expand,
    /// Expand and infer types
    Infer,
    /// List the functions a native backend would export
    Interface,
    /// Infer and evaluate every top-level form against the prelude
    Eval,
}

/// Runs `stage` over `source` and prints one line per resulting form.
/// `module` names the export table of the interface stage.
pub fn render(source: &str, module: &str, stage: Stage, types: bool) -> Result<Vec<String>, Error> {
    let show = |node: &Node| if types { format!("{node:#}") } else { format!("{node}") };
    match stage {
        Stage::Expand => Ok(front_end(source)?.ast.iter().map(show).collect()),
        Stage::Infer => Ok(typecheck(&front_end(source)?)?.ast.iter().map(show).collect()),
        Stage::Interface => {
            let checked = typecheck(&front_end(source)?)?;
            let interface = module_interface(module, &checked.consts)?;
            Ok(interface
                .functions
                .iter()
                .map(|f| {
                    let params: Vec<String> = f.params.iter().map(|(name, ty)| format!("{name}: {ty}")).collect();
                    format!("{} ({}): {} -> {}", f.symbol, f.name, params.join(", "), f.ret)
                })
                .collect())
        }
        Stage::Eval => Ok(run(source, &prelude())?.iter().map(show).collect()),
    }
}
