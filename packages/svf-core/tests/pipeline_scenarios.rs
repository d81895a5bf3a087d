//! End-to-end scenarios driving the full `Analyzer` pipeline through
//! public API only, one per §8 end-to-end scenario that doesn't
//! already have equivalent coverage as a colocated unit test closer to
//! the component it exercises (store/load already covered in
//! `analyzer.rs`'s own tests; SCC-rep sharing and copy closure already
//! covered in `cg::graph`/`andersen::solver`'s unit tests at the
//! constraint-graph level — these instead check the same properties
//! survive the *whole* pipeline, including MemSSA/SVFG/C7). PAG/ICFG
//! fixtures live in `fixtures.rs`, shared across every scenario here.

#[path = "fixtures.rs"]
mod fixtures;

use svf_core::ids::{CsId, NodeID};
use svf_core::ports::frontend::{PagEdge, PagEdgeKind, StmtKind};
use svf_core::pts_store::PointsToStore;
use svf_core::{AnalysisConfig, Analyzer};

use fixtures::{edge, FlatIcfg, FlatPag};

/// Runs the default (C7) pipeline to completion and hands back the
/// analyzer so tests can inspect whichever phase result they need.
/// `optimize_svfg` is left off by default since most scenarios here
/// check properties the optimizer pass doesn't touch; `s7_*` below
/// turns it on explicitly to exercise property 7.
fn run(edges: Vec<PagEdge>, stmts: Vec<(NodeID, StmtKind)>) -> Analyzer {
    run_with_config(edges, stmts, vec![], AnalysisConfig { optimize_svfg: false, ..AnalysisConfig::default() })
}

fn run_with_config(
    edges: Vec<PagEdge>,
    stmts: Vec<(NodeID, StmtKind)>,
    indirect_candidates: Vec<(CsId, u32, NodeID)>,
    config: AnalysisConfig,
) -> Analyzer {
    let pag = FlatPag::new(edges, stmts.clone()).with_indirect_candidates(indirect_candidates);
    let icfg = FlatIcfg { stmts };
    let mut analyzer = Analyzer::new(Box::new(pag), Box::new(icfg), None, config).unwrap();
    analyzer.run().unwrap();
    analyzer
}

/// Reads back every node's Andersen points-to set through the
/// already-solved constraint graph's reps, the same way a consumer of
/// `Analyzer::andersen_result` would (no further solving, so
/// `rep_readonly` suffices over the mutating `rep`).
fn andersen_pts(analyzer: &Analyzer, n: u32) -> Vec<u32> {
    let result = analyzer.andersen_result().expect("run_andersen must have run");
    let rep = result.graph.rep_readonly(NodeID::new(n));
    let mut ids: Vec<u32> = result.pts.get_pts(rep).iter().collect();
    ids.sort_unstable();
    ids
}

/// S1: `a = &x; b = a; c = &y`. Basic alias through a copy — `a` and
/// `b` must end up pointing at the same singleton object, `c` at a
/// disjoint one.
#[test]
fn s1_basic_alias_through_copy() {
    const X: u32 = 1;
    const A: u32 = 2;
    const B: u32 = 3;
    const Y: u32 = 4;
    const C: u32 = 5;

    let edges = vec![
        edge(X, A, PagEdgeKind::Addr),
        edge(A, B, PagEdgeKind::Copy),
        edge(Y, C, PagEdgeKind::Addr),
    ];
    let analyzer = run(edges, vec![]);

    assert_eq!(andersen_pts(&analyzer, A), vec![X]);
    assert_eq!(andersen_pts(&analyzer, B), vec![X]);
    assert_eq!(andersen_pts(&analyzer, C), vec![Y]);
}

/// S2: `a = &x; b = &y; p = &a; *p = b; r = *p;`. Store-load through a
/// pointer must propagate the stored value (`y`) to the load, and — in
/// a flow-insensitive Andersen snapshot taken before the store runs —
/// also the variable's original value (`x`), since `p` only ever
/// points at `a` and Andersen doesn't order the store before the load.
#[test]
fn s2_store_load_through_a_pointer() {
    const X_OBJ: u32 = 1;
    const Y_OBJ: u32 = 2;
    const A: u32 = 3;
    const B: u32 = 4;
    const P: u32 = 5;
    const R: u32 = 6;
    const STORE_STMT: u32 = 100;
    const LOAD_STMT: u32 = 101;

    let edges = vec![
        edge(X_OBJ, A, PagEdgeKind::Addr),
        edge(Y_OBJ, B, PagEdgeKind::Addr),
        edge(A, P, PagEdgeKind::Addr),
    ];
    let stmts = vec![
        (NodeID::new(STORE_STMT), StmtKind::Store { ptr: NodeID::new(P), val: NodeID::new(B) }),
        (NodeID::new(LOAD_STMT), StmtKind::Load { ptr: NodeID::new(P), res: NodeID::new(R) }),
    ];

    let analyzer = run(edges, stmts);

    let load_node = analyzer
        .svfg()
        .unwrap()
        .nodes
        .iter()
        .find(|n| matches!(n.kind, svf_core::svfg::SvfgNodeKind::Load))
        .expect("load node")
        .id;
    let result = analyzer.vfs_result().expect("versioned flow-sensitive result");
    let r_pts: Vec<u32> = result.store.get_tlv_pts(load_node).iter().collect();
    assert!(r_pts.contains(&Y_OBJ), "store-then-load must propagate the stored value: got {r_pts:?}");
}

/// S3: `struct S { int* f0; int* g1; } s; p = &s.f0; q = &s.g1; *p =
/// &x; r = *q;`. Field sensitivity via GEP — `p` and `q` are GEPs off
/// the same struct object at different offsets, so the store through
/// `p` must land in `f0`'s own field object, leaving `r` (loaded
/// through the unrelated field `q`) untouched by it. A field-
/// insensitive treatment of the struct would merge both fields into
/// one object and leak `x` into `r`.
#[test]
fn s3_field_sensitivity_through_gep() {
    use svf_core::ports::frontend::GepKind;

    const STRUCT_OBJ: u32 = 1;
    const S: u32 = 2;
    const P: u32 = 3;
    const Q: u32 = 4;
    const X_OBJ: u32 = 5;
    const X_ADDR: u32 = 6;
    const R: u32 = 7;
    const F0_OFFSET: u32 = 0;
    const G1_OFFSET: u32 = 1;
    const STORE_STMT: u32 = 100;
    const LOAD_STMT: u32 = 101;

    let edges = vec![
        edge(STRUCT_OBJ, S, PagEdgeKind::Addr),
        edge(X_OBJ, X_ADDR, PagEdgeKind::Addr),
        PagEdge { src: NodeID::new(S), dst: NodeID::new(P), kind: PagEdgeKind::Gep(GepKind::Normal(F0_OFFSET)) },
        PagEdge { src: NodeID::new(S), dst: NodeID::new(Q), kind: PagEdgeKind::Gep(GepKind::Normal(G1_OFFSET)) },
    ];
    let stmts = vec![
        (NodeID::new(STORE_STMT), StmtKind::Store { ptr: NodeID::new(P), val: NodeID::new(X_ADDR) }),
        (NodeID::new(LOAD_STMT), StmtKind::Load { ptr: NodeID::new(Q), res: NodeID::new(R) }),
    ];

    let analyzer = run(edges, stmts);

    let p_pts = andersen_pts(&analyzer, P);
    let q_pts = andersen_pts(&analyzer, Q);
    assert_ne!(p_pts, q_pts, "gep results at distinct offsets must resolve to distinct field objects");

    let load_node = analyzer
        .svfg()
        .unwrap()
        .nodes
        .iter()
        .find(|n| matches!(n.kind, svf_core::svfg::SvfgNodeKind::Load))
        .expect("load node")
        .id;
    let result = analyzer.vfs_result().expect("versioned flow-sensitive result");
    let r_pts: Vec<u32> = result.store.get_tlv_pts(load_node).iter().collect();
    assert!(!r_pts.contains(&X_OBJ), "store through f0 must not leak into a load through the unrelated field g1, got {r_pts:?}");
}

/// S4: `p = q; q = p; p = &x`. The copy edges form a cycle, so SCC
/// collapsing must merge `p` and `q` into a single rep sharing one
/// points-to set.
#[test]
fn s4_cycle_collapses_to_shared_points_to() {
    const P: u32 = 1;
    const Q: u32 = 2;
    const X: u32 = 3;

    let edges = vec![
        edge(Q, P, PagEdgeKind::Copy),
        edge(P, Q, PagEdgeKind::Copy),
        edge(X, P, PagEdgeKind::Addr),
    ];
    let analyzer = run(edges, vec![]);

    let rep_p = analyzer.andersen_result().unwrap().graph.rep_readonly(NodeID::new(P));
    let rep_q = analyzer.andersen_result().unwrap().graph.rep_readonly(NodeID::new(Q));
    assert_eq!(rep_p, rep_q);
    assert_eq!(andersen_pts(&analyzer, P), vec![X]);
    assert_eq!(andersen_pts(&analyzer, Q), vec![X]);
}

/// S5: `void (*fp)() = cond ? f : g; fp();`. An indirect callsite whose
/// function-pointer operand may hold the address of either of two
/// functions must resolve to both candidates during on-the-fly
/// call-graph closure, not just whichever is seen first.
#[test]
fn s5_indirect_call_resolves_to_every_candidate_callee() {
    const FP: u32 = 1;
    const F_OBJ: u32 = 2;
    const G_OBJ: u32 = 3;
    const F_FUNC: u32 = 10;
    const G_FUNC: u32 = 11;
    const CALL_STMT: u32 = 100;

    let cs = CsId::new(1);
    let edges = vec![
        edge(F_OBJ, FP, PagEdgeKind::Addr),
        edge(G_OBJ, FP, PagEdgeKind::Addr),
        edge(FP, FP, PagEdgeKind::Call(cs)),
    ];
    let stmts = vec![(NodeID::new(CALL_STMT), StmtKind::Call(cs))];
    let candidates = vec![(cs, F_OBJ, NodeID::new(F_FUNC)), (cs, G_OBJ, NodeID::new(G_FUNC))];

    let analyzer =
        run_with_config(edges, stmts, candidates, AnalysisConfig { optimize_svfg: false, ..AnalysisConfig::default() });

    let resolved = analyzer.resolved_callees().get(&cs).cloned().unwrap_or_default();
    assert!(resolved.contains(&NodeID::new(F_FUNC)), "cs must resolve to f, got {resolved:?}");
    assert!(resolved.contains(&NodeID::new(G_FUNC)), "cs must resolve to g, got {resolved:?}");
}

/// S6: `int x, y; int* p = &x; *p = &y;` over a singleton target. The
/// strong-update property (§8.9, §4.6) requires the store to replace
/// `x`'s points-to set rather than merge into it, which the versioned
/// solver tracks in its `strong_updates` stat.
#[test]
fn s6_strong_update_replaces_singleton_target() {
    const X_OBJ: u32 = 1;
    const Y_OBJ: u32 = 2;
    const P: u32 = 3;
    const Y_ADDR: u32 = 4;
    const STORE_STMT: u32 = 100;

    let edges = vec![
        edge(X_OBJ, P, PagEdgeKind::Addr),
        edge(Y_OBJ, Y_ADDR, PagEdgeKind::Addr),
    ];
    let stmts = vec![(
        NodeID::new(STORE_STMT),
        StmtKind::Store { ptr: NodeID::new(P), val: NodeID::new(Y_ADDR) },
    )];

    let analyzer = run(edges, stmts);

    let result = analyzer.vfs_result().expect("versioned flow-sensitive result");
    assert!(result.stats.strong_updates >= 1);
}

/// Property 7 (SVFG optimizer conservativeness): running the S2
/// scenario with `optimize_svfg: true` must still propagate the
/// stored value to the load — the optimizer is only allowed to remove
/// indirect SVFG edges, never change what a load can observe.
#[test]
fn s7_optimized_pipeline_preserves_store_to_load_flow() {
    const X_OBJ: u32 = 1;
    const Y_OBJ: u32 = 2;
    const A: u32 = 3;
    const B: u32 = 4;
    const P: u32 = 5;
    const R: u32 = 6;
    const STORE_STMT: u32 = 100;
    const LOAD_STMT: u32 = 101;

    let edges = vec![
        edge(X_OBJ, A, PagEdgeKind::Addr),
        edge(Y_OBJ, B, PagEdgeKind::Addr),
        edge(A, P, PagEdgeKind::Addr),
    ];
    let stmts = vec![
        (NodeID::new(STORE_STMT), StmtKind::Store { ptr: NodeID::new(P), val: NodeID::new(B) }),
        (NodeID::new(LOAD_STMT), StmtKind::Load { ptr: NodeID::new(P), res: NodeID::new(R) }),
    ];

    let analyzer =
        run_with_config(edges, stmts, vec![], AnalysisConfig { optimize_svfg: true, ..AnalysisConfig::default() });

    let load_node = analyzer
        .svfg()
        .unwrap()
        .nodes
        .iter()
        .find(|n| matches!(n.kind, svf_core::svfg::SvfgNodeKind::Load))
        .expect("load node")
        .id;
    let result = analyzer.vfs_result().expect("versioned flow-sensitive result");
    let r_pts: Vec<u32> = result.store.get_tlv_pts(load_node).iter().collect();
    assert!(r_pts.contains(&Y_OBJ), "optimized pipeline must still propagate the stored value: got {r_pts:?}");
}
