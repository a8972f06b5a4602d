//! End-to-end behavior of parallel sequence evaluation.

use anyhow::Result;
use coa_core::{EvalConfig, EvalError, Value};
use coa_lang::{Builtin, Expr, RunError, Runtime};

fn num(n: f64) -> Expr {
    Expr::literal(n)
}

fn add(a: Expr, b: Expr) -> Expr {
    Expr::call(Builtin::Add, vec![a, b])
}

fn sequential() -> Runtime {
    Runtime::new(EvalConfig::default().with_parallel(false))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_definitions_both_bind() -> Result<()> {
    let runtime = Runtime::default();
    for _ in 0..100 {
        let outcome = runtime.run(vec![Expr::def("a", num(1.0)), Expr::def("b", num(2.0))]).await?;
        assert_eq!(outcome.bindings.get("a"), Some(&Value::Number(1.0)));
        assert_eq!(outcome.bindings.get("b"), Some(&Value::Number(2.0)));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependent_definition_observes_its_writer() -> Result<()> {
    let runtime = Runtime::default();
    for _ in 0..1000 {
        let program = vec![
            Expr::def("a", num(1.0)),
            Expr::def("noise", Expr::call(Builtin::Sleep, vec![num(0.0)])),
            Expr::def("b", Expr::ident("a")),
        ];
        let outcome = runtime.run(program).await?;
        assert_eq!(outcome.bindings.get("b"), Some(&Value::Number(1.0)));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_are_all_reported() {
    let program = vec![
        Expr::def("x", Expr::call(Builtin::Div, vec![num(1.0), num(0.0)]).at(1, 9)),
        Expr::def("y", Expr::call(Builtin::Div, vec![num(2.0), num(0.0)]).at(2, 9)),
    ];

    let err = Runtime::default().run(program).await.unwrap_err();
    let RunError::Failed(EvalError::Multiple(errors)) = &err else {
        panic!("expected an aggregate failure, got {err}");
    };
    assert_eq!(errors.len(), 2);
    let rendered = err.to_string();
    assert!(rendered.contains("2 errors:"));
    assert!(rendered.contains("1:9: division by zero"));
    assert!(rendered.contains("2:9: division by zero"));
}

#[tokio::test]
async fn single_node_returns_its_value() -> Result<()> {
    let outcome = Runtime::default().run(vec![add(num(40.0), num(2.0))]).await?;
    assert_eq!(outcome.value, Value::Number(42.0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_and_sequential_agree_on_pure_programs() -> Result<()> {
    let program = || {
        vec![
            Expr::def("a", num(1.0)),
            Expr::def("b", num(2.0)),
            Expr::def("c", add(Expr::ident("a"), Expr::ident("b"))),
            Expr::def("d", Expr::call(Builtin::Mul, vec![Expr::ident("b"), num(10.0)])),
            Expr::def("a", add(Expr::ident("d"), Expr::ident("c"))),
            Expr::list(vec![Expr::ident("a"), Expr::ident("c"), Expr::ident("d")]),
        ]
    };

    let expected = sequential().run(program()).await?;
    for _ in 0..50 {
        let outcome = Runtime::default().run(program()).await?;
        assert_eq!(outcome.value, expected.value);
        assert_eq!(outcome.bindings, expected.bindings);
    }
    assert_eq!(
        expected.value,
        Value::List(vec![Value::Number(23.0), Value::Number(3.0), Value::Number(20.0)])
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn effectful_sequence_keeps_output_order() -> Result<()> {
    let print = |s: &str| Expr::call(Builtin::Print, vec![Expr::literal(s)]);
    let program = vec![
        print("one"),
        Expr::block(vec![Expr::call(Builtin::Sleep, vec![num(2.0)]), print("two")]),
        print("three"),
        Expr::call(Builtin::Emit, vec![Expr::literal("log"), Expr::literal("four")]),
    ];

    let outcome = Runtime::default().run(program).await?;
    assert_eq!(outcome.output, ["one", "two", "three", "log: four"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reassignments_of_outer_names_are_ordered() -> Result<()> {
    let bump = || Expr::block(vec![Expr::modify("n", add(Expr::ident("n"), num(1.0)))]);
    for _ in 0..200 {
        let program = vec![Expr::def("n", num(0.0)), bump(), bump(), bump()];
        let outcome = Runtime::default().run(program).await?;
        assert_eq!(outcome.bindings.get("n"), Some(&Value::Number(3.0)));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reassignment_through_local_shadow_is_ordered() -> Result<()> {
    let program = || {
        vec![
            Expr::def("n", num(0.0)),
            Expr::block(vec![
                Expr::def("n", num(1.0)),
                Expr::call(Builtin::Sleep, vec![num(5.0)]),
                Expr::modify("n", num(2.0)),
            ]),
            Expr::def("r", Expr::ident("n")),
        ]
    };

    let expected = sequential().run(program()).await?;
    assert_eq!(expected.bindings.get("r"), Some(&Value::Number(2.0)));
    for _ in 0..20 {
        let outcome = Runtime::default().run(program()).await?;
        assert_eq!(outcome.bindings.get("r"), expected.bindings.get("r"));
        assert_eq!(outcome.bindings.get("n"), Some(&Value::Number(2.0)));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn later_write_is_not_seen_by_earlier_reader() -> Result<()> {
    for _ in 0..500 {
        let program = vec![
            Expr::def("a", num(1.0)),
            Expr::def("b", Expr::ident("a")),
            Expr::def("a", num(2.0)),
        ];
        let outcome = Runtime::default().run(program).await?;
        assert_eq!(outcome.bindings.get("b"), Some(&Value::Number(1.0)));
        assert_eq!(outcome.bindings.get("a"), Some(&Value::Number(2.0)));
    }
    Ok(())
}

#[tokio::test]
async fn undefined_name_is_a_recoverable_error() {
    let err = Runtime::default()
        .run(vec![Expr::def("b", Expr::ident("a")).at(1, 1)])
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    match err {
        RunError::Failed(EvalError::Undefined { names, .. }) => assert_eq!(names, ["a"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn assertion_failure_surfaces_message() {
    let program = vec![
        Expr::def("x", num(3.0)),
        Expr::call(
            Builtin::Assert,
            vec![Expr::call(Builtin::Lt, vec![Expr::ident("x"), num(1.0)]), Expr::literal("x too big")],
        )
        .at(2, 1),
    ];
    let err = sequential().run(program).await.unwrap_err();
    assert_eq!(err.to_string(), "evaluation failed: 2:1: failed assertion: x too big");
}
