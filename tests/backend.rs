use lion_compiler::backend::{mangle_name, module_interface, Backend, ModuleInterface, TempNames};
use lion_compiler::error::Error;
use lion_compiler::pipeline::{front_end, typecheck};

fn interface(source: &str) -> Result<ModuleInterface, Error> {
    let checked = typecheck(&front_end(source)?)?;
    module_interface("main", &checked.consts)
}

/// Prints one C-style prototype per exported function.
struct Prototypes;

impl Backend for Prototypes {
    type Output = Vec<String>;

    fn lower(&mut self, module: &ModuleInterface, temps: &mut TempNames) -> Result<Self::Output, Error> {
        Ok(module
            .functions
            .iter()
            .map(|function| {
                let params: Vec<String> = function.params.iter().map(|(name, ty)| format!("{ty} {name}")).collect();
                format!(
                    "{} {}_{}({}) /* {} */",
                    function.ret,
                    module.name,
                    function.symbol,
                    params.join(", "),
                    temps.fresh("f")
                )
            })
            .collect())
    }
}

#[test]
fn test_mangling() {
    let cases = [
        ("fib", "fib"),
        ("z", "zz"),
        ("Z", "ZZ"),
        ("<=", "zlze"),
        ("?", "z3fU"),
        ("(x)", "ZLxZR"),
        ("set-x!", "setzmxzn"),
    ];
    for (name, symbol) in cases {
        assert_eq!(mangle_name(name), symbol, "{name}");
    }
}

#[test]
fn test_typed_functions_are_exported() {
    let module = interface("(def inc (lambda (x: i64) (+: (-> i64 i64 i64) x 1)))").unwrap();
    assert_eq!(module.name, "main");
    assert_eq!(module.functions.len(), 1);
    let inc = &module.functions[0];
    assert_eq!(inc.symbol, "inc");
    assert_eq!(inc.params.len(), 1);
    assert_eq!(inc.params[0].0, "x");
    assert!(inc.params[0].1.is_atom("i64"));
    assert!(inc.ret.is_atom("i64"));
}

#[test]
fn test_curried_lambdas_are_flattened() {
    let module = interface("(def add-two (lambda (a: i64 b: i64) (+: (-> i64 i64 i64) a b)))").unwrap();
    let add = &module.functions[0];
    assert_eq!(add.symbol, "addzmtwo");
    let names: Vec<&str> = add.params.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    insta::assert_snapshot!(add.body.to_string(), @"(+ a b)");
}

#[test]
fn test_constants_that_are_not_lambdas_are_skipped() {
    let module = interface("(def two 2)\n(def id (lambda (x: str) x))").unwrap();
    let symbols: Vec<&str> = module.functions.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(symbols, ["id"]);
}

#[test]
fn test_unresolved_types_cannot_be_exported() {
    let err = interface("(def id (lambda (x) x))").unwrap_err();
    assert!(matches!(err, Error::Type { .. }));
    assert!(err.to_string().contains("can't export `id`"), "{err}");
}

#[test]
fn test_backends_lower_the_interface() {
    let module = interface("(def inc (lambda (x: i64) (+: (-> i64 i64 i64) x 1)))\n(def neg (lambda (x: i64) (-: (-> i64 i64 i64) 0 x)))").unwrap();
    let mut temps = TempNames::new();
    let lines = Prototypes.lower(&module, &mut temps).unwrap();
    insta::assert_snapshot!(lines.join("\n"), @r"
    i64 main_inc(i64 x) /* f0 */
    i64 main_neg(i64 x) /* f1 */
    ");
}
