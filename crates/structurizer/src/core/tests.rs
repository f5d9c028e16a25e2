use super::*;
use crate::{
    interfaces::{BasicBlock, CaseValue, Terminator},
    ir::types::{CaseClause, Expr, Stmt},
};

fn structure(blocks: Vec<BasicBlock>) -> Result<StructuredFunction, Error> {
    let function = Function::new("test", blocks);
    FunctionStructurizer::new(&function).run()
}

fn body(blocks: Vec<BasicBlock>) -> Vec<Stmt> {
    structure(blocks).expect("failed to structurize").body
}

fn op(text: &str) -> Stmt {
    Stmt::Op(text.into())
}

fn if_stmt(condition: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
    Stmt::If { condition, then_body, else_body }
}

#[test]
fn test_if_without_else() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 99))
            .with_operation("%1 = load %a")
            .with_selection_merge(99),
        BasicBlock::new(20, Terminator::branch(99)).with_operation("store %b %1"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            op("%1 = load %a"),
            if_stmt(Expr::Value(1), vec![op("store %b %1")], vec![]),
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_if_else_with_premerge() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
        BasicBlock::new(20, Terminator::branch(80)).with_operation("%2 = add %x %y"),
        BasicBlock::new(30, Terminator::branch(80)).with_operation("%3 = sub %x %y"),
        BasicBlock::new(80, Terminator::branch(99)).with_operation("%4 = phi %2 %3"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            if_stmt(Expr::Value(1), vec![op("%2 = add %x %y")], vec![op("%3 = sub %x %y")]),
            op("%4 = phi %2 %3"),
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_identical_targets_are_spliced() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 20)).with_selection_merge(99),
        BasicBlock::new(20, Terminator::branch(99)).with_operation("%2 = not %1"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(body, vec![op("%2 = not %1"), Stmt::Return(None)]);
}

#[test]
fn test_loop_with_continuing_and_break_if() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::branch(30)).with_loop_merge(99, 40).with_operation("%2 = load %i"),
        BasicBlock::new(30, Terminator::branch(40)).with_operation("%3 = mul %2 %2"),
        BasicBlock::new(40, Terminator::conditional(5, 20, 99)).with_operation("%5 = lt %2 %n"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Loop {
                body: vec![op("%2 = load %i"), op("%3 = mul %2 %2")],
                continuing: vec![op("%5 = lt %2 %n"), Stmt::BreakIf(Expr::Value(5).negate())],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_continue_tail_breaking_on_true_condition() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::branch(40)).with_loop_merge(99, 40),
        BasicBlock::new(40, Terminator::conditional(5, 99, 20)),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Loop { body: vec![], continuing: vec![Stmt::BreakIf(Expr::Value(5))] },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_single_block_loop() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::conditional(1, 20, 99))
            .with_operation("%1 = call %step")
            .with_loop_merge(99, 20),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Loop {
                body: vec![
                    op("%1 = call %step"),
                    if_stmt(Expr::Value(1), vec![], vec![Stmt::Break]),
                ],
                continuing: vec![],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_loop_header_selection_becomes_nested_if() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::conditional(1, 30, 40)).with_loop_merge(99, 50),
        BasicBlock::new(30, Terminator::branch(50)).with_operation("%3 = call %a"),
        BasicBlock::new(40, Terminator::branch(50)).with_operation("%4 = call %b"),
        BasicBlock::new(50, Terminator::branch(20)).with_operation("%5 = add %i 1"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Loop {
                body: vec![if_stmt(
                    Expr::Value(1),
                    vec![op("%3 = call %a"), Stmt::Continue],
                    vec![op("%4 = call %b")],
                )],
                continuing: vec![op("%5 = add %i 1")],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_break_from_selection_inside_loop() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::branch(30)).with_loop_merge(99, 40),
        BasicBlock::new(30, Terminator::conditional(1, 99, 38)).with_selection_merge(38),
        BasicBlock::new(38, Terminator::branch(40)),
        BasicBlock::new(40, Terminator::branch(20)),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Loop {
                body: vec![if_stmt(Expr::Value(1), vec![Stmt::Break], vec![])],
                continuing: vec![],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_switch_elides_trailing_break() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::switch(3, 99, [(1, 20)]))
            .with_selection_merge(99),
        BasicBlock::new(20, Terminator::branch(99)).with_operation("%4 = call %one"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Switch {
                selector: 3,
                cases: vec![
                    CaseClause {
                        selectors: vec![CaseValue::Signed(1)],
                        is_default: false,
                        body: vec![op("%4 = call %one")],
                    },
                    CaseClause { selectors: vec![], is_default: true, body: vec![] },
                ],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_switch_keeps_break_before_more_clause_code() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::unsigned_switch(3, 30, [(1, 20)]))
            .with_selection_merge(99),
        BasicBlock::new(20, Terminator::conditional(4, 99, 25)),
        BasicBlock::new(25, Terminator::branch(99)).with_operation("%6 = call %late"),
        BasicBlock::new(30, Terminator::branch(99)).with_operation("%5 = call %default"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Switch {
                selector: 3,
                cases: vec![
                    CaseClause {
                        selectors: vec![],
                        is_default: true,
                        body: vec![op("%5 = call %default")],
                    },
                    CaseClause {
                        selectors: vec![CaseValue::Unsigned(1)],
                        is_default: false,
                        body: vec![
                            if_stmt(Expr::Value(4), vec![Stmt::Break], vec![]),
                            op("%6 = call %late"),
                        ],
                    },
                ],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_switch_case_with_nested_selection_breaks_from_then_branch() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::switch(3, 99, [(1, 20)])).with_selection_merge(99),
        BasicBlock::new(20, Terminator::conditional(4, 22, 25)).with_selection_merge(25),
        BasicBlock::new(22, Terminator::branch(99)).with_operation("%5 = call %a"),
        BasicBlock::new(25, Terminator::branch(99)).with_operation("%6 = call %b"),
        BasicBlock::new(99, Terminator::Return),
    ]);

    assert_eq!(
        body,
        vec![
            Stmt::Switch {
                selector: 3,
                cases: vec![
                    CaseClause {
                        selectors: vec![CaseValue::Signed(1)],
                        is_default: false,
                        body: vec![
                            if_stmt(
                                Expr::Value(4),
                                vec![op("%5 = call %a"), Stmt::Break],
                                vec![],
                            ),
                            op("%6 = call %b"),
                        ],
                    },
                    CaseClause { selectors: vec![], is_default: true, body: vec![] },
                ],
            },
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_switch_groups_case_values_by_target() {
    let body = body(vec![
        BasicBlock::new(
            10,
            Terminator::switch(3, 20, [(2, 30), (1, 30), (3, 99)]),
        )
        .with_selection_merge(99),
        BasicBlock::new(20, Terminator::branch(99)),
        BasicBlock::new(30, Terminator::branch(99)),
        BasicBlock::new(99, Terminator::Return),
    ]);

    let Some(Stmt::Switch { cases, .. }) = body.first() else {
        panic!("expected a switch, got {body:?}");
    };
    let clauses: Vec<(Vec<CaseValue>, bool)> =
        cases.iter().map(|clause| (clause.selectors.clone(), clause.is_default)).collect();
    assert_eq!(
        clauses,
        vec![
            (vec![], true),
            (vec![CaseValue::Signed(1), CaseValue::Signed(2)], false),
            (vec![CaseValue::Signed(3)], false),
        ]
    );
    assert!(cases.iter().all(|clause| clause.body.is_empty()));
}

#[test]
fn test_guard_protects_code_after_early_exit() {
    let structured = structure(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
        BasicBlock::new(20, Terminator::conditional(2, 99, 30)),
        BasicBlock::new(30, Terminator::branch(99)).with_operation("%5 = call %rest"),
        BasicBlock::new(99, Terminator::Return),
    ])
    .expect("failed to structurize");

    let guard = || "guard10".to_string();
    assert_eq!(structured.guards, vec![guard()]);
    assert_eq!(
        structured.body,
        vec![
            Stmt::DeclareGuard(guard()),
            if_stmt(
                Expr::Value(1),
                vec![
                    if_stmt(Expr::Value(2), vec![Stmt::ClearGuard(guard())], vec![]),
                    if_stmt(
                        Expr::Guard(guard()),
                        vec![op("%5 = call %rest"), Stmt::ClearGuard(guard())],
                        vec![],
                    ),
                ],
                vec![],
            ),
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_guard_prefix_is_configurable() {
    let function = Function::new(
        "test",
        vec![
            BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
            BasicBlock::new(20, Terminator::conditional(2, 99, 30)),
            BasicBlock::new(30, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ],
    );

    let structured = FunctionStructurizer::new(&function)
        .guard_prefix("flow_")
        .run()
        .expect("failed to structurize");
    assert_eq!(structured.guards, vec!["flow_10".to_string()]);
}

#[test]
fn test_function_exits() {
    let body = body(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
        BasicBlock::new(20, Terminator::Kill),
        BasicBlock::new(30, Terminator::ReturnValue { value: 7 }),
        BasicBlock::new(99, Terminator::Unreachable),
    ]);

    assert_eq!(
        body,
        vec![
            if_stmt(Expr::Value(1), vec![Stmt::Discard], vec![Stmt::Return(Some(7))]),
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_block_markers() {
    let function = Function::new(
        "test",
        vec![
            BasicBlock::new(10, Terminator::branch(20)).with_operation("%1 = load %a"),
            BasicBlock::new(20, Terminator::Return),
        ],
    );

    let structured =
        FunctionStructurizer::new(&function).block_markers(true).run().expect("failed to structurize");
    assert_eq!(
        structured.body,
        vec![
            Stmt::BlockMarker(10),
            op("%1 = load %a"),
            Stmt::BlockMarker(20),
            Stmt::Return(None),
        ]
    );
}

#[test]
fn test_rendered_loop() {
    let structured = structure(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::branch(30)).with_loop_merge(99, 40),
        BasicBlock::new(30, Terminator::branch(40)).with_operation("%3 = call %body"),
        BasicBlock::new(40, Terminator::conditional(5, 20, 99)),
        BasicBlock::new(99, Terminator::Return),
    ])
    .expect("failed to structurize");

    let expected = [
        "fn test() {",
        "    loop {",
        "        %3 = call %body;",
        "        continuing {",
        "            break if !%5;",
        "        }",
        "    }",
        "    return;",
        "}",
    ]
    .join("\n");
    assert_eq!(PseudoCodeEmitter::default().emit(&structured), expected);
}

#[test]
fn test_continue_target_heading_a_loop_is_rejected() {
    let err = structure(vec![
        BasicBlock::new(10, Terminator::branch(20)),
        BasicBlock::new(20, Terminator::branch(40)).with_loop_merge(99, 40),
        BasicBlock::new(40, Terminator::branch(50)).with_loop_merge(60, 50),
        BasicBlock::new(50, Terminator::conditional(1, 40, 60)),
        BasicBlock::new(60, Terminator::conditional(2, 20, 99)),
        BasicBlock::new(99, Terminator::Return),
    ])
    .expect_err("accepted a continue target heading another loop");

    assert!(matches!(err, Error::MalformedMerge(_)), "unexpected error: {err}");
}

#[test]
fn test_errors_propagate_from_analysis() {
    let err = structure(vec![
        BasicBlock::new(10, Terminator::conditional(1, 20, 30)),
        BasicBlock::new(20, Terminator::Return),
        BasicBlock::new(30, Terminator::Return),
    ])
    .expect_err("accepted an unstructured divergence");

    assert!(matches!(err, Error::MissingMerge(_)));
    assert_eq!(err.category(), "missing merge");
}

#[test]
fn test_order_is_a_permutation_of_reachable_blocks() {
    let function = Function::new(
        "test",
        vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::conditional(1, 30, 40)).with_loop_merge(99, 50),
            BasicBlock::new(30, Terminator::branch(50)),
            BasicBlock::new(40, Terminator::branch(50)),
            BasicBlock::new(50, Terminator::branch(20)),
            BasicBlock::new(77, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ],
    );
    let analysis = FunctionStructurizer::new(&function).analyze().expect("failed to analyze");
    let order = analysis.order();

    let mut sorted = order.to_vec();
    sorted.sort();
    assert_eq!(sorted, vec![10, 20, 30, 40, 50, 99]);
    assert_eq!(order.first(), Some(&10));

    // every block with an ordered predecessor has one earlier in the order
    for (pos, &id) in order.iter().enumerate().skip(1) {
        let predecessors: Vec<usize> = function
            .blocks
            .iter()
            .filter(|block| block.terminator.successors().contains(&id))
            .filter_map(|block| order.iter().position(|&ordered| ordered == block.id))
            .collect();
        if !predecessors.is_empty() {
            assert!(predecessors.iter().any(|&p| p < pos), "block {id} has no earlier predecessor");
        }
    }

    for (pos, &id) in order.iter().enumerate() {
        assert_eq!(analysis.registry().get(id).and_then(|info| info.pos), Some(pos));
    }
}

#[test]
fn test_analysis_is_deterministic() {
    let function = Function::new(
        "test",
        vec![
            BasicBlock::new(10, Terminator::switch(3, 30, [(1, 20)]))
                .with_selection_merge(99),
            BasicBlock::new(20, Terminator::branch(99)),
            BasicBlock::new(30, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ],
    );
    let structurizer = FunctionStructurizer::new(&function);

    let first = structurizer.analyze().expect("failed to analyze");
    let second = structurizer.analyze().expect("failed to analyze");
    assert_eq!(first.order(), second.order());
    assert_eq!(first.constructs(), second.constructs());
    assert_eq!(first.guards(), second.guards());
    assert_eq!(first.constructs()[0].kind, ConstructKind::Function);
}

#[test]
fn test_graph_labels_blocks_and_edges() {
    let function = Function::new(
        "test",
        vec![
            BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
            BasicBlock::new(20, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ],
    );
    let graph = FunctionStructurizer::new(&function)
        .analyze()
        .and_then(|analysis| analysis.graph())
        .expect("failed to build graph");

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);
    assert!(graph.node_weights().any(|label| label == "block 10 @ 0 (IfSelection)"));
    assert!(graph.node_weights().any(|label| label == "block 99 @ 2 (Function)"));
    assert_eq!(graph.edge_weights().filter(|kind| *kind == "if-break").count(), 2);
}
