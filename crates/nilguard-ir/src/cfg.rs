//! CFG navigation over deserialized bridge data.
//!
//! Builds successor/predecessor indices from the edge list and computes
//! the dominator tree the analysis passes traverse. Dominance is computed
//! once per procedure with the iterative dominator-set algorithm; the
//! tree is exposed as per-block dominee lists.

use crate::ir::{BasicBlock, CfgEdge, EdgeKind, Procedure};
use std::collections::{HashMap, HashSet};

/// A traversable view of a procedure's CFG.
pub struct Cfg<'a> {
    proc: &'a Procedure,
    successors: HashMap<u32, Vec<(u32, &'a EdgeKind)>>,
    predecessors: HashMap<u32, Vec<(u32, &'a EdgeKind)>>,
    block_map: HashMap<u32, &'a BasicBlock>,
    dominees: HashMap<u32, Vec<u32>>,
}

impl<'a> Cfg<'a> {
    /// Build traversal indices and the dominator tree.
    pub fn from_procedure(proc: &'a Procedure) -> Self {
        let mut successors: HashMap<u32, Vec<(u32, &EdgeKind)>> = HashMap::new();
        let mut predecessors: HashMap<u32, Vec<(u32, &EdgeKind)>> = HashMap::new();
        let mut block_map = HashMap::new();

        for block in &proc.blocks {
            block_map.insert(block.id, block);
            successors.entry(block.id).or_default();
            predecessors.entry(block.id).or_default();
        }

        for edge in &proc.cfg_edges {
            successors
                .entry(edge.from_block)
                .or_default()
                .push((edge.to_block, &edge.kind));
            predecessors
                .entry(edge.to_block)
                .or_default()
                .push((edge.from_block, &edge.kind));
        }

        let dominees = compute_dominees(&proc.blocks, &proc.cfg_edges);

        Self {
            proc,
            successors,
            predecessors,
            block_map,
            dominees,
        }
    }

    /// Entry block: the first block in the procedure's list.
    pub fn entry_block(&self) -> Option<&'a BasicBlock> {
        self.proc.blocks.first()
    }

    /// Get block by ID.
    pub fn block(&self, id: u32) -> Option<&'a BasicBlock> {
        self.block_map.get(&id).copied()
    }

    /// Successors of a block.
    pub fn successors(&self, block_id: u32) -> &[(u32, &'a EdgeKind)] {
        self.successors
            .get(&block_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Predecessors of a block.
    pub fn predecessors(&self, block_id: u32) -> &[(u32, &'a EdgeKind)] {
        self.predecessors
            .get(&block_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All blocks in the CFG.
    pub fn blocks(&self) -> impl Iterator<Item = &'a BasicBlock> {
        self.proc.blocks.iter()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.proc.blocks.len()
    }

    /// Blocks immediately dominated by `block_id`, in block-list order.
    pub fn dominees(&self, block_id: u32) -> &[u32] {
        self.dominees
            .get(&block_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// For a block ending in a conditional branch: the `(true, false)`
    /// successor pair, from the edge kinds.
    pub fn cond_successors(&self, block_id: u32) -> Option<(u32, u32)> {
        let mut t = None;
        let mut f = None;
        for &(succ, kind) in self.successors(block_id) {
            match kind {
                EdgeKind::CondTrue => t = Some(succ),
                EdgeKind::CondFalse => f = Some(succ),
                _ => {}
            }
        }
        Some((t?, f?))
    }

    /// Reverse post-order from the entry block.
    pub fn reverse_postorder(&self) -> Vec<u32> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();

        if let Some(entry) = self.entry_block() {
            self.dfs_postorder(entry.id, &mut visited, &mut postorder);
        }

        postorder.reverse();
        postorder
    }

    fn dfs_postorder(&self, block_id: u32, visited: &mut HashSet<u32>, postorder: &mut Vec<u32>) {
        if !visited.insert(block_id) {
            return;
        }
        for &(succ_id, _) in self.successors(block_id) {
            self.dfs_postorder(succ_id, visited, postorder);
        }
        postorder.push(block_id);
    }
}

/// Compute per-block dominee lists with the iterative dominator-set
/// algorithm: `dom[b]` starts as all blocks, is refined to the
/// intersection of predecessor sets plus `b` itself until stable, and
/// the immediate dominator of `b` is its strict dominator with the
/// largest dominator set. Unreachable blocks get no dominator entry.
fn compute_dominees(blocks: &[BasicBlock], edges: &[CfgEdge]) -> HashMap<u32, Vec<u32>> {
    let n = blocks.len();
    if n == 0 {
        return HashMap::new();
    }

    let index: HashMap<u32, usize> = blocks.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
    let mut preds: Vec<Vec<usize>> = vec![vec![]; n];
    let mut succs: Vec<Vec<usize>> = vec![vec![]; n];
    for e in edges {
        if let (Some(&from), Some(&to)) = (index.get(&e.from_block), index.get(&e.to_block)) {
            succs[from].push(to);
            preds[to].push(from);
        }
    }

    // Reachability from the entry (blocks[0]); unreachable blocks are
    // never traversed and must not perturb the intersections.
    let mut reachable = vec![false; n];
    let mut work = vec![0usize];
    while let Some(i) = work.pop() {
        if reachable[i] {
            continue;
        }
        reachable[i] = true;
        work.extend(succs[i].iter().copied());
    }

    let all: HashSet<usize> = (0..n).filter(|&i| reachable[i]).collect();
    let mut dom: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    dom[0].insert(0);
    for i in 1..n {
        if reachable[i] {
            dom[i] = all.clone();
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for i in 1..n {
            if !reachable[i] {
                continue;
            }
            let mut new_dom: HashSet<usize> = HashSet::new();
            let mut first = true;
            for &p in &preds[i] {
                if !reachable[p] {
                    continue;
                }
                if first {
                    new_dom = dom[p].clone();
                    first = false;
                } else {
                    new_dom = new_dom.intersection(&dom[p]).copied().collect();
                }
            }
            new_dom.insert(i);
            if new_dom != dom[i] {
                dom[i] = new_dom;
                changed = true;
            }
        }
    }

    let mut dominees: HashMap<u32, Vec<u32>> = HashMap::new();
    // Iterate in block-list order so dominee lists are deterministic.
    for i in 1..n {
        if !reachable[i] {
            continue;
        }
        let idom = dom[i]
            .iter()
            .filter(|&&d| d != i)
            .max_by_key(|&&d| dom[d].len())
            .copied();
        if let Some(idom) = idom {
            dominees
                .entry(blocks[idom].id)
                .or_default()
                .push(blocks[i].id);
        }
    }
    dominees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    fn block(id: u32) -> BasicBlock {
        BasicBlock {
            id,
            name: format!("b{id}"),
            instructions: vec![],
        }
    }

    fn edge(from: u32, to: u32, kind: EdgeKind) -> CfgEdge {
        CfgEdge {
            from_block: from,
            to_block: to,
            kind,
        }
    }

    fn proc(blocks: Vec<BasicBlock>, cfg_edges: Vec<CfgEdge>) -> Procedure {
        Procedure {
            name: "test.Cfg".into(),
            short_name: "Cfg".into(),
            span: None,
            params: vec![],
            free_vars: vec![],
            blocks,
            cfg_edges,
            is_exported: false,
            is_external: false,
        }
    }

    /// 0 → 1 → 2
    fn linear() -> Procedure {
        proc(
            vec![block(0), block(1), block(2)],
            vec![
                edge(0, 1, EdgeKind::Unconditional),
                edge(1, 2, EdgeKind::Unconditional),
            ],
        )
    }

    /// 0 → {1, 2} → 3 (diamond)
    fn diamond() -> Procedure {
        proc(
            vec![block(0), block(1), block(2), block(3)],
            vec![
                edge(0, 1, EdgeKind::CondTrue),
                edge(0, 2, EdgeKind::CondFalse),
                edge(1, 3, EdgeKind::Unconditional),
                edge(2, 3, EdgeKind::Unconditional),
            ],
        )
    }

    #[test]
    fn test_linear_cfg() {
        let p = linear();
        let cfg = Cfg::from_procedure(&p);

        assert_eq!(cfg.block_count(), 3);
        assert_eq!(cfg.entry_block().unwrap().id, 0);
        assert_eq!(cfg.successors(0).len(), 1);
        assert_eq!(cfg.predecessors(2).len(), 1);
        assert_eq!(cfg.dominees(0), &[1]);
        assert_eq!(cfg.dominees(1), &[2]);
    }

    #[test]
    fn test_diamond_dominators() {
        let p = diamond();
        let cfg = Cfg::from_procedure(&p);

        // The join block is immediately dominated by the branch block,
        // not by either arm.
        assert_eq!(cfg.dominees(0), &[1, 2, 3]);
        assert!(cfg.dominees(1).is_empty());
        assert!(cfg.dominees(2).is_empty());
    }

    #[test]
    fn test_cond_successors() {
        let p = diamond();
        let cfg = Cfg::from_procedure(&p);

        assert_eq!(cfg.cond_successors(0), Some((1, 2)));
        assert_eq!(cfg.cond_successors(1), None);
    }

    #[test]
    fn test_reverse_postorder_starts_at_entry() {
        let p = diamond();
        let cfg = Cfg::from_procedure(&p);

        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo[0], 0);
        assert_eq!(rpo.len(), 4);
        // The join block comes after both arms.
        assert_eq!(rpo[3], 3);
    }

    #[test]
    fn test_loop_dominators() {
        // 0 → 1 → 2 → 1 (back edge), 1 → 3
        let p = proc(
            vec![block(0), block(1), block(2), block(3)],
            vec![
                edge(0, 1, EdgeKind::Unconditional),
                edge(1, 2, EdgeKind::CondTrue),
                edge(1, 3, EdgeKind::CondFalse),
                edge(2, 1, EdgeKind::Unconditional),
            ],
        );
        let cfg = Cfg::from_procedure(&p);

        assert_eq!(cfg.dominees(0), &[1]);
        assert_eq!(cfg.dominees(1), &[2, 3]);
    }

    #[test]
    fn test_unreachable_block_has_no_dominator() {
        let p = proc(
            vec![block(0), block(1), block(9)],
            vec![edge(0, 1, EdgeKind::Unconditional)],
        );
        let cfg = Cfg::from_procedure(&p);

        assert_eq!(cfg.dominees(0), &[1]);
        assert!(cfg.dominees(1).is_empty());
        assert!(cfg.dominees(9).is_empty());
    }
}
