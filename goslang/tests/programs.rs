use std::sync::Arc;

use goslang::{
    Console, Error, ErrorKind, HeapCreateInfo, Node, RunReport, RuntimeError, VM, VMCreateInfo,
    compile, run_program,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn ident(name: &str) -> Value {
    json!({"tag": "ident", "val": name})
}

fn int(val: i64) -> Value {
    json!({"tag": "lit", "kind": "int", "val": val})
}

fn float(val: f64) -> Value {
    json!({"tag": "lit", "kind": "float64", "val": val})
}

fn binop(op: &str, left: Value, right: Value) -> Value {
    json!({"tag": "binop", "op": op, "op1": left, "op2": right})
}

fn call(fun: Value, args: Vec<Value>) -> Value {
    json!({"tag": "call", "fun": fun, "args": args})
}

fn println(args: Vec<Value>) -> Value {
    call(ident("println"), args)
}

fn block(stmts: Vec<Value>) -> Value {
    json!({"tag": "block", "body": {"tag": "seq", "stmts": stmts}})
}

fn ret(results: Vec<Value>) -> Value {
    json!({"tag": "return", "results": results})
}

fn var(names: &[&str], types: Vec<Value>, vals: Vec<Value>) -> Value {
    json!({"tag": "varDecl", "spec": {"idents": names, "types": types, "vals": vals}})
}

fn if_then(cond: Value, then: Vec<Value>) -> Value {
    json!({"tag": "if", "cond": cond, "then": block(then)})
}

fn go(call: Value) -> Value {
    json!({"tag": "go", "call": call})
}

fn func_type(params: &[(&str, &str)], results: Vec<Value>) -> Value {
    json!({
        "tag": "funcType",
        "params": params.iter().map(|(name, _)| ident(name)).collect::<Vec<_>>(),
        "paramTypes": params.iter().map(|(_, ty)| ident(ty)).collect::<Vec<_>>(),
        "results": [],
        "resultTypes": results,
    })
}

fn func(name: &str, params: &[(&str, &str)], results: Vec<Value>, stmts: Vec<Value>) -> Value {
    json!({
        "tag": "funcDecl",
        "name": name,
        "type": func_type(params, results),
        "body": block(stmts),
    })
}

fn main_with(stmts: Vec<Value>) -> Vec<Value> {
    vec![func("main", &[], vec![], stmts)]
}

fn run(decls: Vec<Value>) -> (Result<RunReport, Error>, Vec<String>) {
    let tree = json!({"tag": "package", "decls": decls});
    let console = Arc::new(Console::capture());
    let result = Node::from_json(&tree)
        .map_err(Error::from)
        .and_then(|root| compile(&root).map_err(Error::from))
        .and_then(|program| run_program(program, VMCreateInfo::default(), console.clone()));
    (result, console.lines())
}

fn output(decls: Vec<Value>) -> Vec<String> {
    let (result, lines) = run(decls);
    if let Err(err) = result {
        panic!("program failed: {err}");
    }
    lines
}

fn failure(decls: Vec<Value>) -> ErrorKind {
    match run(decls).0 {
        Ok(report) => panic!("program succeeded: {report:?}"),
        Err(err) => err.kind(),
    }
}

#[test]
fn prints_arithmetic() {
    let lines = output(main_with(vec![println(vec![binop("+", int(1), int(2))])]));
    assert_eq!(lines, vec!["3"]);
}

#[test]
fn const_groups_count_with_iota() {
    let lines = output(main_with(vec![
        json!({"tag": "constDecl", "spec": {
            "idents": ["a", "b", "c"],
            "types": [],
            "vals": [ident("iota"), ident("iota"), ident("iota")],
        }}),
        println(vec![ident("a"), ident("b"), ident("c")]),
    ]));
    assert_eq!(lines, vec!["0 1 2"]);
}

fn const_group(names: &[&str]) -> Value {
    json!({"tag": "constDecl", "spec": {
        "idents": names,
        "types": [],
        "vals": names.iter().map(|_| ident("iota")).collect::<Vec<_>>(),
    }})
}

#[test]
fn each_const_group_restarts_iota() {
    let lines = output(main_with(vec![
        const_group(&["a", "b"]),
        const_group(&["c", "d"]),
        println(vec![ident("a"), ident("b"), ident("c"), ident("d")]),
    ]));
    assert_eq!(lines, vec!["0 1 0 1"]);
}

#[test]
fn division_by_zero() {
    let lines = output(main_with(vec![
        println(vec![binop("/", int(5), int(0)), binop("%", int(5), int(0))]),
        println(vec![binop("/", float(1.0), float(0.0))]),
    ]));
    assert_eq!(lines, vec!["0 0", "+Inf"]);
}

#[test]
fn declared_types_wrap_arithmetic() {
    let lines = output(main_with(vec![
        var(&["x"], vec![ident("uint8")], vec![int(255)]),
        var(&["y"], vec![ident("int8")], vec![]),
        println(vec![binop("+", ident("x"), int(1)), ident("y")]),
    ]));
    assert_eq!(lines, vec!["0 0"]);
}

#[test]
fn inner_blocks_shadow_outer_names() {
    let lines = output(main_with(vec![
        var(&["x"], vec![], vec![int(1)]),
        block(vec![
            var(&["x"], vec![], vec![int(2)]),
            println(vec![ident("x")]),
        ]),
        println(vec![ident("x")]),
    ]));
    assert_eq!(lines, vec!["2", "1"]);
}

#[test]
fn closures_keep_their_environment() {
    let inner = json!({
        "tag": "funcLit",
        "type": func_type(&[("x", "int")], vec![ident("int")]),
        "body": block(vec![ret(vec![binop("+", ident("x"), ident("n"))])]),
    });
    let lines = output(vec![
        func(
            "adder",
            &[("n", "int")],
            vec![func_type(&[("x", "int")], vec![ident("int")])],
            vec![ret(vec![inner])],
        ),
        func(
            "main",
            &[],
            vec![],
            vec![
                var(&["add5"], vec![], vec![call(ident("adder"), vec![int(5)])]),
                var(&["add7"], vec![], vec![call(ident("adder"), vec![int(7)])]),
                println(vec![
                    call(ident("add5"), vec![int(1)]),
                    call(ident("add7"), vec![int(1)]),
                ]),
            ],
        ),
    ]);
    assert_eq!(lines, vec!["6 8"]);
}

#[test]
fn multiple_results_assign_in_order() {
    let lines = output(vec![
        func(
            "pair",
            &[],
            vec![ident("int"), ident("int")],
            vec![ret(vec![int(1), int(2)])],
        ),
        func(
            "main",
            &[],
            vec![],
            vec![
                var(&["a", "b"], vec![], vec![call(ident("pair"), vec![])]),
                println(vec![ident("a"), ident("b")]),
            ],
        ),
    ]);
    assert_eq!(lines, vec!["1 2"]);
}

#[test]
fn builtins_min_max_and_conversions() {
    let lines = output(main_with(vec![
        println(vec![
            call(ident("min"), vec![int(3), int(1), int(2)]),
            call(ident("max"), vec![float(1.5), float(2.5)]),
        ]),
        println(vec![
            call(ident("uint8"), vec![int(255)]),
            call(ident("int8"), vec![int(-128)]),
            call(ident("float64"), vec![int(3)]),
        ]),
    ]));
    assert_eq!(lines, vec!["1 2.5", "255 -128 3"]);
}

fn countdown(name: &str, tail: bool) -> Value {
    let recurse = call(ident(name), vec![binop("-", ident("n"), int(1))]);
    let result = if tail {
        recurse
    } else {
        binop("+", int(1), recurse)
    };
    func(
        name,
        &[("n", "int")],
        vec![ident("int")],
        vec![
            if_then(binop("==", ident("n"), int(0)), vec![ret(vec![int(0)])]),
            ret(vec![result]),
        ],
    )
}

fn peak_return_depth(tail: bool, n: i64) -> usize {
    let (result, lines) = run(vec![
        countdown("count", tail),
        func(
            "main",
            &[],
            vec![],
            vec![println(vec![call(ident("count"), vec![int(n)])])],
        ),
    ]);
    let expected = if tail { 0 } else { n };
    assert_eq!(lines, vec![expected.to_string()]);
    result.unwrap().stats.peak_return_depth
}

#[test]
fn tail_calls_keep_the_control_stack_bounded() {
    let shallow = peak_return_depth(true, 10);
    let deep = peak_return_depth(true, 2000);
    assert_eq!(shallow, deep);
    assert!(deep < 10, "peak control stack {deep}");
}

#[test]
fn non_tail_recursion_grows_the_control_stack() {
    let deep = peak_return_depth(false, 1000);
    assert!(deep > 1000, "peak control stack {deep}");
}

#[test]
fn mutual_tail_recursion() {
    let parity = |name: &str, base: &str, other: &str| {
        func(
            name,
            &[("n", "int")],
            vec![ident("bool")],
            vec![
                if_then(binop("==", ident("n"), int(0)), vec![ret(vec![ident(base)])]),
                ret(vec![call(ident(other), vec![binop("-", ident("n"), int(1))])]),
            ],
        )
    };
    let (result, lines) = run(vec![
        parity("even", "true", "odd"),
        parity("odd", "false", "even"),
        func(
            "main",
            &[],
            vec![],
            vec![println(vec![
                call(ident("even"), vec![int(1000)]),
                call(ident("odd"), vec![int(7)]),
            ])],
        ),
    ]);
    assert_eq!(lines, vec!["true true"]);
    assert!(result.unwrap().stats.peak_return_depth < 10);
}

#[test]
fn goroutines_share_the_console() {
    let mut lines = output(vec![
        func(
            "worker",
            &[("n", "int")],
            vec![],
            vec![println(vec![ident("n")])],
        ),
        func(
            "main",
            &[],
            vec![],
            vec![
                go(call(ident("worker"), vec![int(1)])),
                go(call(ident("worker"), vec![int(2)])),
                println(vec![int(0)]),
            ],
        ),
    ]);
    lines.sort();
    assert_eq!(lines, vec!["0", "1", "2"]);
}

#[test]
fn go_calls_do_not_block_the_spawner() {
    let tree = json!({"tag": "package", "decls": [
        countdown("spin", true),
        func(
            "main",
            &[],
            vec![],
            vec![
                go(call(ident("spin"), vec![int(200_000)])),
                println(vec![int(7)]),
            ],
        ),
    ]});
    let program = compile(&Node::from_json(&tree).unwrap()).unwrap();
    let info = VMCreateInfo {
        heap: HeapCreateInfo { words: 1 << 23 },
        ..Default::default()
    };
    let vm = VM::new(info, program, Arc::new(Console::capture())).unwrap();

    vm.run().unwrap();
    assert_eq!(vm.console().lines(), vec!["7"]);
    assert_eq!(vm.dispatcher().spawned(), 1);
    assert!(vm.dispatcher().running() >= 1);

    vm.wait_idle();
    assert_eq!(vm.dispatcher().running(), 0);
    assert!(vm.failures().is_empty());
}

#[test]
fn goroutine_failures_stay_local() {
    let (result, lines) = run(vec![
        func(
            "bad",
            &[],
            vec![],
            vec![call(ident("panic"), vec![int(42)])],
        ),
        func(
            "main",
            &[],
            vec![],
            vec![go(call(ident("bad"), vec![])), println(vec![int(2)])],
        ),
    ]);
    let report = result.unwrap();
    assert_eq!(lines, vec!["2"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].error,
        RuntimeError::Panic(String::from("42"))
    );
}

#[test]
fn fatal_errors_report_their_kind() {
    assert_eq!(
        failure(main_with(vec![go(println(vec![int(1)]))])),
        ErrorKind::BuiltinInGoroutine
    );
    assert_eq!(
        failure(main_with(vec![
            println(vec![ident("x")]),
            var(&["x"], vec![], vec![int(1)]),
        ])),
        ErrorKind::UnassignedAccess
    );
    assert_eq!(
        failure(main_with(vec![call(ident("panic"), vec![int(7)])])),
        ErrorKind::Panic
    );
    assert_eq!(
        failure(main_with(vec![call(ident("uint8"), vec![int(256)])])),
        ErrorKind::NotRepresentable
    );
    assert_eq!(
        failure(main_with(vec![println(vec![binop(
            "+",
            ident("true"),
            int(1)
        )])])),
        ErrorKind::OperatorType
    );
    assert_eq!(
        failure(main_with(vec![if_then(int(1), vec![])])),
        ErrorKind::ConditionNotBool
    );
    assert_eq!(
        failure(main_with(vec![println(vec![binop("<<", int(1), int(-1))])])),
        ErrorKind::NegativeShift
    );
}

#[test]
fn compile_failures_report_their_kind() {
    assert_eq!(
        failure(vec![func("helper", &[], vec![], vec![])]),
        ErrorKind::MissingMain
    );
    assert_eq!(
        failure(main_with(vec![println(vec![ident("missing")])])),
        ErrorKind::UnresolvedIdentifier
    );
    assert_eq!(
        failure(main_with(vec![json!({"tag": "error", "val": "unsupported"})])),
        ErrorKind::Parse
    );
}
