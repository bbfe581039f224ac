//! End-to-end tests: syntax trees through the salsa pipeline.

use braid::pipeline::{check_with_diagnostics, compile_with_diagnostics, run_with_diagnostics};
use braid::{BraidDatabaseImpl, LoadError, SourceProgram};
use braid_ast::{Ast, AstBuilder, BinaryOp, Expr};
use braid_core::{CompilationPhase, CompileError};
use braid_types::Mode;
use std::io::Write;

fn source(db: &BraidDatabaseImpl, ast: Ast) -> SourceProgram {
    SourceProgram::new(db, "test.json".into(), ast, Mode::General)
}

/// var x = 18; var y = x + 3; var double = fun n -> n * 2; double(y)
fn scenario_a() -> Ast {
    let mut b = AstBuilder::new();
    let eighteen = b.int(18);
    let let_x = b.let_("x", eighteen);
    let x = b.lookup("x");
    let three = b.int(3);
    let sum = b.binary(BinaryOp::Add, x, three);
    let let_y = b.let_("y", sum);
    let n = b.lookup("n");
    let two = b.int(2);
    let product = b.binary(BinaryOp::Mul, n, two);
    let double = b.fun(&[("n", None)], product);
    let let_double = b.let_("double", double);
    let callee = b.lookup("double");
    let y = b.lookup("y");
    let call = b.call(callee, vec![y]);
    let program = b.block(let_x, vec![let_y, let_double, call]);
    b.finish(program)
}

/// var x = <5>; !< 37 + [x] >, written as the JSON an external parser
/// would hand over.
const SCENARIO_B: &str = r#"{
  "id": 0,
  "kind": {
    "tag": "seq",
    "lhs": {
      "id": 1,
      "kind": {
        "tag": "let",
        "name": "x",
        "value": {
          "id": 2,
          "kind": {
            "tag": "quote",
            "body": { "id": 3, "kind": { "tag": "literal", "type": "int", "value": 5 } }
          }
        }
      }
    },
    "rhs": {
      "id": 4,
      "kind": {
        "tag": "run",
        "body": {
          "id": 5,
          "kind": {
            "tag": "quote",
            "body": {
              "id": 6,
              "kind": {
                "tag": "binary",
                "op": "add",
                "lhs": { "id": 7, "kind": { "tag": "literal", "type": "int", "value": 37 } },
                "rhs": {
                  "id": 8,
                  "kind": {
                    "tag": "escape",
                    "kind": "splice",
                    "body": { "id": 9, "kind": { "tag": "lookup", "name": "x" } }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}"#;

/// var x = 2; var y = !< 37 + %[x] >; !< 37 + y >
fn persist_chain() -> Ast {
    let mut b = AstBuilder::new();
    let two = b.int(2);
    let let_x = b.let_("x", two);
    let thirty_seven = b.int(37);
    let x = b.lookup("x");
    let persist = b.persist(x);
    let sum = b.binary(BinaryOp::Add, thirty_seven, persist);
    let quote = b.quote(sum);
    let run = b.run(quote);
    let let_y = b.let_("y", run);
    let thirty_seven = b.int(37);
    let y = b.lookup("y");
    let sum = b.binary(BinaryOp::Add, thirty_seven, y);
    let quote = b.quote(sum);
    let run = b.run(quote);
    let program = b.block(let_x, vec![let_y, run]);
    b.finish(program)
}

#[test]
fn test_scenario_a_checks_and_runs() {
    let db = BraidDatabaseImpl::default();
    let source = source(&db, scenario_a());
    assert_eq!(check_with_diagnostics(&db, source).ty.as_deref(), Some("Int"));
    assert_eq!(run_with_diagnostics(&db, source).value.as_deref(), Some("42"));
}

#[test]
fn test_scenario_b_from_json() {
    let db = BraidDatabaseImpl::default();
    let ast = Ast::from_json(SCENARIO_B).unwrap();
    let source = source(&db, ast);
    assert_eq!(check_with_diagnostics(&db, source).ty.as_deref(), Some("Int"));
    assert_eq!(run_with_diagnostics(&db, source).value.as_deref(), Some("42"));

    let compiled = compile_with_diagnostics(&db, source);
    assert!(compiled.diagnostics.is_empty());
    let ir = compiled.ir.unwrap();
    // The two quotes become fragments; the splice is owned by the second.
    assert_eq!(ir.main.quotes.len(), 2);
    let splices: Vec<_> = ir.progs.values().map(|prog| prog.owned_splice.len()).collect();
    assert_eq!(splices, vec![0, 1]);
}

#[test]
fn test_persisted_values_survive_run() {
    let db = BraidDatabaseImpl::default();
    let source = source(&db, persist_chain());
    assert_eq!(run_with_diagnostics(&db, source).value.as_deref(), Some("76"));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCENARIO_B.as_bytes()).unwrap();

    let db = BraidDatabaseImpl::default();
    let source = db.load(file.path(), Mode::General).unwrap();
    // A second load hands back the same input.
    assert_eq!(db.load(file.path(), Mode::General).unwrap(), source);
    assert_eq!(run_with_diagnostics(&db, source).value.as_deref(), Some("42"));

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    broken.write_all(b"{ \"id\": 0,").unwrap();
    let err = db.load(broken.path(), Mode::General).unwrap_err();
    assert!(matches!(err, LoadError::Parse(CompileError::Parse { .. })));
    assert!(err.to_string().starts_with("parse error at "));
}

#[test]
fn test_unresolved_snippet_fails_compilation() {
    // var s = <1>; < [$s] >
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let code = b.quote(one);
    let let_s = b.let_("s", code);
    let s = b.lookup("s");
    let hole = b.snippet(s);
    let quote = b.quote(hole);
    let program = b.seq(let_s, quote);

    let db = BraidDatabaseImpl::default();
    let source = source(&db, b.finish(program));
    let compiled = compile_with_diagnostics(&db, source);
    assert!(compiled.variants.is_none());
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].phase, CompilationPhase::VariantGeneration);
}

#[test]
fn test_snippet_variants_through_pipeline() {
    // var a = $<1>; var c = $<2>; c = $<3>; < [$a] + [$c] >
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let a_quote = b.snippet_quote(one);
    let let_a = b.let_("a", a_quote);
    let two = b.int(2);
    let c_first = b.snippet_quote(two);
    let let_c = b.let_("c", c_first);
    let three = b.int(3);
    let c_second = b.snippet_quote(three);
    let assign_c = b.assign("c", c_second);
    let a = b.lookup("a");
    let hole_a = b.snippet(a);
    let c = b.lookup("c");
    let hole_c = b.snippet(c);
    let sum = b.binary(BinaryOp::Add, hole_a, hole_c);
    let quote = b.quote(sum);
    let quote_id = quote.id;
    let program = b.block(let_a, vec![let_c, assign_c, quote]);

    let db = BraidDatabaseImpl::default();
    let source = source(&db, b.finish(program));
    let compiled = compile_with_diagnostics(&db, source);
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    let variants = compiled.variants.unwrap();
    let bodies: Vec<String> = variants[&quote_id]
        .as_ref()
        .unwrap()
        .iter()
        .map(|variant| render(&variant.progs[&quote_id].body))
        .collect();
    insta::assert_debug_snapshot!(bodies, @r#"
    [
        "1 + 2",
        "1 + 3",
    ]
    "#);
}

fn render(expr: &Expr) -> String {
    expr.to_string()
}
