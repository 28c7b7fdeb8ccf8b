use bitvm_ir::ir::{ExprKind, JmpMode, Node, Stmt, walk};

use crate::common::compile_source;

mod common;

#[test]
fn loop_labels_are_linked() {
    let result = compile_source(include_str!("scripts/sum.toml"), "sum").unwrap();
    let procedure = &result.procedure;

    let top = procedure.jump_target(6).unwrap();
    let done = procedure.jump_target(3).unwrap();
    assert_eq!(procedure.label_name(top), ".top.0");
    assert_eq!(procedure.label_name(done), ".done.1");
    assert_eq!(procedure.label_stmt(top), Some(2));
    assert_eq!(procedure.label_stmt(done), Some(7));
    assert_eq!(procedure.incoming_jumps(top), 1);
    assert_eq!(procedure.incoming_jumps(done), 1);
    assert!(matches!(
        procedure.stmts()[3],
        Stmt::Jmp {
            mode: JmpMode::IfZero,
            expr: Some(_),
            ..
        }
    ));
}

#[test]
fn label_with_several_incoming_jumps() {
    let result = compile_source(include_str!("scripts/branch.toml"), "branch").unwrap();
    let procedure = &result.procedure;

    let out = procedure.jump_target(0).unwrap();
    assert_eq!(procedure.jump_target(1), Some(out));
    assert_eq!(procedure.jump_target(3), Some(out));
    assert_eq!(procedure.incoming_jumps(out), 3);
    assert_eq!(procedure.label_stmt(out), Some(4));

    let Stmt::Label(unused) = procedure.stmts()[2] else {
        panic!("expected a label");
    };
    assert_eq!(procedure.label_name(unused), ".unused.1");
    assert_eq!(procedure.incoming_jumps(unused), 0);
}

#[test]
fn every_borrowed_value_is_used_twice() {
    let result = compile_source(include_str!("scripts/sum.toml"), "sum").unwrap();
    let procedure = &result.procedure;

    let mut shared = Vec::new();
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(idx, expr) = node {
            if expr.kind == ExprKind::Shared && !shared.contains(&idx) {
                shared.push(idx);
            }
        }
    });

    // Two borrowing calls, each sharing the array and the call itself.
    assert_eq!(shared.len(), 4);
    for idx in shared {
        assert_eq!(procedure.total_uses(idx), 2);
    }
}

#[test]
fn use_tracker_follows_code_generation_order() {
    let result = compile_source(include_str!("scripts/main.toml"), "main").unwrap();
    let procedure = &result.procedure;
    let mut uses = procedure.use_tracker();

    let mut order = Vec::new();
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(idx, expr) = node {
            if expr.is_shared() {
                order.push(idx);
            }
        }
    });

    let mut last_uses = 0;
    for idx in order {
        let stateless_before = procedure.exprs().is_stateless(idx, &uses);
        let count = uses.record_use(idx);
        assert_eq!(stateless_before, count > 1);
        if uses.is_last_use(idx) {
            last_uses += 1;
        }
    }
    assert_eq!(last_uses, 2);
}

#[test]
fn unresolved_dump_names_pending_jumps() {
    let script = bitvm_ir::driver::config::ProcedureScript::parse(include_str!(
        "scripts/branch.toml"
    ))
    .unwrap();
    let procedure = bitvm_ir::driver::script::lower_script(&script).unwrap();
    let dump = procedure.to_string();
    assert!(dump.starts_with("proc pick #4 in #1\n"), "{dump}");
    assert!(dump.contains("jmpnz .out.0 [ARG flag]"), "{dump}");
    assert!(!dump.contains("incoming"), "{dump}");

    let dump = procedure.resolve().unwrap().to_string();
    assert!(dump.contains(".out.0:  ; 3 incoming"), "{dump}");
}
