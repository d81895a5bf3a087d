//! Textual Andersen points-to result (§6): one `<varId> -> { ... }`
//! line per constraint-graph node (already resolved through its SCC
//! rep), followed by one `<gepObjId> <baseObjId> <offset>` line per
//! derived GEP object the solve materialized.

use std::io::{BufRead, Write};

use crate::bitset::PointsTo;
use crate::cg::ConstraintGraph;
use crate::errors::{Result, SvfError};
use crate::ids::{NodeID, Offset};
use crate::pts_store::PointsToStore;

use super::PtsBackend;

/// Writes every constraint-graph node's resolved points-to set, then
/// the `gep_objects` triples the caller collected while solving (the
/// solver doesn't keep this list itself — see `DESIGN.md`).
pub fn write_andersen_result(
    w: &mut impl Write,
    graph: &ConstraintGraph,
    pts: &PtsBackend,
    gep_objects: &[(NodeID, NodeID, Offset)],
) -> Result<()> {
    let mut ids: Vec<NodeID> = graph.nodes().map(|n| n.id).collect();
    ids.sort_by_key(|n| n.raw());
    for var in ids {
        let rep = graph.rep_readonly(var);
        let set = pts.get_pts(rep);
        write!(w, "{} -> {{ ", var.raw())?;
        for o in set.iter() {
            write!(w, "{} ", o)?;
        }
        writeln!(w, "}}")?;
    }
    for &(gep, base, offset) in gep_objects {
        writeln!(w, "{} {} {}", gep.raw(), base.raw(), offset)?;
    }
    Ok(())
}

/// Parsed textual result: one resolved points-to set per var, plus the
/// derived GEP object triples, in file order.
pub struct AndersenTextResult {
    pub pts: std::collections::HashMap<NodeID, PointsTo>,
    pub gep_objects: Vec<(NodeID, NodeID, Offset)>,
}

/// Reads a result written by [`write_andersen_result`]. Any `<gepObjId>
/// <baseObjId> <offset>` line is replayed against `pag` via
/// `get_gep_obj_var`, and it's an invariant violation (not silently
/// ignored) if the front end hands back a different id than the one
/// recorded — this crate has no "create with this exact id" hook into
/// the front end's own id space, so a mismatch means the front end the
/// file was produced against isn't the one rereading it.
pub fn read_andersen_result(
    r: &mut impl BufRead,
    pag: &mut dyn crate::ports::frontend::ProgramAssignmentGraph,
) -> Result<AndersenTextResult> {
    let mut pts = std::collections::HashMap::new();
    let mut gep_objects = Vec::new();

    for line in r.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((lhs, rhs)) = line.split_once("->") {
            let var: u32 = lhs
                .trim()
                .parse()
                .map_err(|_| SvfError::io(format!("malformed var id: {line}")))?;
            let rhs = rhs.trim();
            let inner = rhs
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| SvfError::io(format!("malformed pts set: {line}")))?;
            let mut set = PointsTo::new();
            for tok in inner.split_whitespace() {
                let obj: u32 = tok
                    .parse()
                    .map_err(|_| SvfError::io(format!("malformed object id {tok} in: {line}")))?;
                set.insert(obj);
            }
            pts.insert(NodeID::new(var), set);
        } else {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(SvfError::io(format!("malformed gep-object line: {line}")));
            }
            let gep: u32 = fields[0]
                .parse()
                .map_err(|_| SvfError::io(format!("malformed gep id in: {line}")))?;
            let base: u32 = fields[1]
                .parse()
                .map_err(|_| SvfError::io(format!("malformed base id in: {line}")))?;
            let offset: Offset = fields[2]
                .parse()
                .map_err(|_| SvfError::io(format!("malformed offset in: {line}")))?;

            let created = pag.get_gep_obj_var(NodeID::new(base), offset);
            if created.raw() != gep {
                return Err(SvfError::invariant(format!(
                    "gep object id mismatch: file recorded {gep}, front end produced {}",
                    created.raw()
                )));
            }
            gep_objects.push((NodeID::new(gep), NodeID::new(base), offset));
        }
    }

    Ok(AndersenTextResult { pts, gep_objects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CsId;
    use crate::ports::frontend::{Icfg, PagEdge, ProgramAssignmentGraph, StmtKind};

    struct EmptyIcfg;
    impl Icfg for EmptyIcfg {
        fn functions(&self) -> Vec<NodeID> {
            vec![]
        }
        fn entry_block(&self, _func: NodeID) -> NodeID {
            NodeID::new(0)
        }
        fn blocks(&self, _func: NodeID) -> Vec<NodeID> {
            vec![]
        }
        fn successors(&self, _block: NodeID) -> Vec<NodeID> {
            vec![]
        }
        fn predecessors(&self, _block: NodeID) -> Vec<NodeID> {
            vec![]
        }
        fn has_reachable_return(&self, _func: NodeID) -> bool {
            false
        }
        fn statements(&self, _block: NodeID) -> Vec<NodeID> {
            vec![]
        }
        fn stmt_kind(&self, _stmt: NodeID) -> StmtKind {
            StmtKind::Other
        }
        fn function_of(&self, _node: NodeID) -> Option<NodeID> {
            None
        }
    }

    struct OneGepPag;
    impl ProgramAssignmentGraph for OneGepPag {
        fn nodes(&self) -> Vec<NodeID> {
            vec![NodeID::new(1), NodeID::new(2)]
        }
        fn edges(&self) -> Vec<PagEdge> {
            vec![]
        }
        fn get_base_obj(&self, n: NodeID) -> NodeID {
            n
        }
        fn get_all_fields_obj_vars(&self, _base: NodeID) -> PointsTo {
            PointsTo::new()
        }
        fn is_field_insensitive(&self, _n: NodeID) -> bool {
            false
        }
        fn is_heap_mem_obj(&self, _n: NodeID) -> bool {
            false
        }
        fn is_blk_obj_or_constant_obj(&self, _n: NodeID) -> bool {
            false
        }
        fn is_non_pointer_obj(&self, _n: NodeID) -> bool {
            false
        }
        fn is_local_var_in_recursive_fun(&self, _n: NodeID) -> bool {
            false
        }
        fn get_gep_obj_var(&mut self, _base: NodeID, _offset: Offset) -> NodeID {
            NodeID::new(99)
        }
        fn get_fi_obj_var(&mut self, base: NodeID) -> NodeID {
            base
        }
        fn set_field_insensitive(&mut self, _base: NodeID) {}
        fn indirect_callsites(&self) -> Vec<CsId> {
            vec![]
        }
        fn resolve_ind_calls(&self, _cs: CsId, _fp_pts: &PointsTo, _new_edges: &mut Vec<(CsId, NodeID)>) {}
        fn resolve_cpp_ind_calls(&self, _cs: CsId, _vtbl_pts: &PointsTo, _new_edges: &mut Vec<(CsId, NodeID)>) {}
        fn icfg(&self) -> &dyn Icfg {
            &EmptyIcfg
        }
    }

    #[test]
    fn roundtrip_pts_lines() {
        let mut graph = ConstraintGraph::new();
        graph.ensure_node(NodeID::new(1));
        graph.ensure_node(NodeID::new(2));
        let mut pts = PtsBackend::new(false);
        pts.add_pts(NodeID::new(1), 2);
        pts.add_pts(NodeID::new(1), 3);

        let mut buf = Vec::new();
        write_andersen_result(&mut buf, &graph, &pts, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("1 -> { 2 3 }") || text.contains("1 -> { 3 2 }"));

        let mut pag = OneGepPag;
        let mut cursor = std::io::Cursor::new(text.into_bytes());
        let result = read_andersen_result(&mut cursor, &mut pag).unwrap();
        let mut got: Vec<u32> = result.pts[&NodeID::new(1)].iter().collect();
        got.sort();
        assert_eq!(got, vec![2, 3]);
    }

    #[test]
    fn gep_line_mismatch_is_invariant_violation() {
        let mut pag = OneGepPag;
        let mut cursor = std::io::Cursor::new(b"10 1 4\n".to_vec());
        let err = read_andersen_result(&mut cursor, &mut pag).unwrap_err();
        assert!(matches!(err, SvfError::InvariantViolated(_)));
    }
}
