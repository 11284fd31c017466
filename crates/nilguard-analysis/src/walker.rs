//! Dominance-order CFG walker shared by the propagation and diagnosis
//! passes.
//!
//! The walker visits reachable blocks of a procedure's CFG in dominance
//! order, maintaining a stack of dominating nilness facts. By traversing
//! the dominator tree, facts are popped as soon as a subtree has been
//! visited; a CFG traversal would have to retain a fact set per block.
//!
//! In `Summarize` mode the walk derives call-site and return-site
//! observations into the fact store. In `Diagnose` mode it reports nil
//! dereferences and degenerate nil comparisons, suppressing everything
//! downstream of an already-reported root cause.

use std::collections::{HashMap, HashSet};

use nilguard_diagnostics::diagnostic::Diagnostic;
use nilguard_ir::cfg::Cfg;
use nilguard_ir::index::ProcedureIndex;
use nilguard_ir::ir::{
    BasicBlock, Instruction, Package, Procedure, TypeKind, TypeRef, ValueKind,
};

use crate::lattice::Nilness;
use crate::rules;
use crate::stack::{lookup, lookup_vec, Fact};
use crate::store::FactStore;
use crate::summary::SiteKey;

/// Map from qualified procedure name to its defining package and body.
pub type ProcedureMap<'p> = HashMap<&'p str, (&'p Package, &'p Procedure)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Derive and update callee summaries from call and return sites.
    Summarize,
    /// Emit diagnostics using the converged summaries.
    Diagnose,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Some summary changed during a Summarize walk.
    pub updated: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walk one procedure. External declarations (no body) are skipped; in
/// Diagnose mode an unexported procedure with no observed call sites is
/// skipped as well (it is not a reachable source of bugs), while
/// exported procedures are checked even without observations since they
/// may be entry points.
pub fn walk_procedure<'p>(
    package: &'p Package,
    proc: &'p Procedure,
    procedures: &ProcedureMap<'p>,
    store: &mut FactStore,
    mode: Mode,
) -> WalkOutcome {
    if proc.is_external || proc.blocks.is_empty() {
        return WalkOutcome::default();
    }

    let summary = store.summary(&proc.name);
    let merged = summary.map(|s| s.merged_args()).unwrap_or_default();
    let called = summary.is_some_and(|s| s.has_call_sites());
    if mode == Mode::Diagnose && !called && !proc.is_exported {
        return WalkOutcome::default();
    }

    let mut stack = Vec::with_capacity(20);
    seed_entry_facts(proc, &merged, &mut stack);

    let mut walker = Walker {
        package,
        proc,
        procedures,
        store,
        cfg: Cfg::from_procedure(proc),
        index: ProcedureIndex::from_procedure(proc),
        type_map: package.types.iter().map(|t| (t.id, t)).collect(),
        mode,
        seen: HashSet::new(),
        already_reported: HashSet::new(),
        diagnostics: Vec::new(),
        updated: false,
    };

    let entry = proc.blocks[0].id;
    walker.visit(entry, &mut stack);

    WalkOutcome {
        updated: walker.updated,
        diagnostics: walker.diagnostics,
    }
}

/// Seed the entry block's fact stack from the procedure's own merged
/// argument observations. A vector one longer than the parameter list
/// carries the bound receiver of a method value in its leading position.
fn seed_entry_facts(proc: &Procedure, merged: &[Nilness], stack: &mut Vec<Fact>) {
    if merged.is_empty() {
        return;
    }
    if merged.len() == proc.params.len() {
        for (&p, &n) in proc.params.iter().zip(merged) {
            stack.push(Fact {
                value: p,
                nilness: n,
            });
        }
        return;
    }
    if merged.len() == proc.params.len() + 1 {
        let Some(&fv) = proc.free_vars.first() else {
            panic!(
                "receiver nilness recorded for `{}` but it has no free variables",
                proc.name
            );
        };
        stack.push(Fact {
            value: fv,
            nilness: merged[0],
        });
        for (i, &p) in proc.params.iter().enumerate() {
            stack.push(Fact {
                value: p,
                nilness: merged[i + 1],
            });
        }
        return;
    }
    panic!(
        "inconsistent argument count for `{}`: {} observed vs {} parameters",
        proc.name,
        merged.len(),
        proc.params.len()
    );
}

struct Walker<'p, 'x> {
    package: &'p Package,
    proc: &'p Procedure,
    procedures: &'x ProcedureMap<'p>,
    store: &'x mut FactStore,
    cfg: Cfg<'p>,
    index: ProcedureIndex<'p>,
    type_map: HashMap<u32, &'p TypeRef>,
    mode: Mode,
    seen: HashSet<u32>,
    already_reported: HashSet<u32>,
    diagnostics: Vec<Diagnostic>,
    updated: bool,
}

impl<'p, 'x> Walker<'p, 'x> {
    fn visit(&mut self, block_id: u32, stack: &mut Vec<Fact>) {
        if !self.seen.insert(block_id) {
            return;
        }
        let Some(block) = self.cfg.block(block_id) else {
            return;
        };

        let base = stack.len();
        self.scan_block(block, stack);

        if !self.prune(block, stack) {
            for d in self.cfg.dominees(block_id).to_vec() {
                self.visit(d, stack);
            }
        }

        // Facts learned inside this subtree do not dominate siblings.
        stack.truncate(base);
    }

    fn scan_block(&mut self, block: &'p BasicBlock, stack: &mut Vec<Fact>) {
        for instr in &block.instructions {
            if self.mode == Mode::Diagnose {
                if self.global_suppressed(instr) {
                    continue;
                }
                if self.already_reported.contains(&instr.id) {
                    continue;
                }
            }

            match instr.kind {
                ValueKind::Return => {
                    if self.mode == Mode::Summarize {
                        self.record_return(instr, stack);
                    }
                }
                ValueKind::Call => self.handle_call(instr, stack),
                ValueKind::FieldAddr if self.mode == Mode::Diagnose => {
                    self.check_operand(instr, stack, "field selection");
                }
                ValueKind::MapUpdate if self.mode == Mode::Diagnose => {
                    self.check_operand(instr, stack, "map update");
                }
                ValueKind::Slice if self.mode == Mode::Diagnose => {
                    // Slicing nil-checks its operand iff it is a pointer
                    // to an array; a nil slice or string slices fine.
                    if self.operand_is_pointer(instr) {
                        self.check_operand(instr, stack, "slice operation");
                    }
                }
                ValueKind::Store if self.mode == Mode::Diagnose => {
                    self.check_operand(instr, stack, "store");
                }
                ValueKind::TypeAssert if self.mode == Mode::Diagnose && !instr.comma_ok => {
                    // Only the single-result assertion panics.
                    self.check_operand(instr, stack, "type assertion");
                }
                ValueKind::UnOp if self.mode == Mode::Diagnose && instr.is_load() => {
                    self.check_operand(instr, stack, "load");
                }
                _ => {}
            }
        }
    }

    /// Record the nilness of the returned values at this return site
    /// into the enclosing procedure's summary.
    fn record_return(&mut self, instr: &'p Instruction, stack: &[Fact]) {
        let rns = lookup_vec(&self.index, stack, &instr.operands);
        if rns.is_empty() {
            return;
        }
        let summary = self.store.summary_mut(&self.proc.name);
        if let Some(len) = summary.returns_len() {
            if len != rns.len() {
                panic!(
                    "inconsistent return values count for `{}` at site {}",
                    self.proc.name, instr.id
                );
            }
        }
        self.updated |= summary.observe_returns(instr.id, rns);
    }

    fn handle_call(&mut self, instr: &'p Instruction, stack: &mut Vec<Fact>) {
        if self.mode == Mode::Diagnose {
            // Nil-check the invoked value itself; a direct static call
            // has no target register and cannot be nil.
            if let Some(target) = instr.call_target {
                let descr = instr.call_description.as_deref().unwrap_or("function call");
                self.not_nil(stack, instr, target, descr);
            }
        }

        let Some(callee_name) = instr.callee.as_deref() else {
            return;
        };
        let Some(&(callee_pkg, callee)) = self.procedures.get(callee_name) else {
            return;
        };

        let foreign = callee_pkg.path != self.package.path;
        if foreign && !self.store.package_done(&callee_pkg.path) {
            tracing::debug!(
                caller = %self.proc.name,
                callee = %callee_name,
                "callee package not yet analyzed; deferring"
            );
            return;
        }

        // Foreign procedures are sealed once their package is done: read
        // their return summaries, never update their argument facts.
        if self.mode == Mode::Summarize && !foreign {
            self.observe_call(instr, callee, stack);
        }

        self.push_return_facts(instr, callee_name, stack);
    }

    /// Fold this call site's argument nilness into the callee's summary,
    /// reconciling the off-by-one arity of method values.
    fn observe_call(&mut self, instr: &'p Instruction, callee: &'p Procedure, stack: &[Fact]) {
        let site: SiteKey = instr.id;
        let mut vec = lookup_vec(&self.index, stack, &instr.operands);
        let recv = if callee.free_vars.is_empty() {
            None
        } else {
            instr
                .bound_receiver
                .map(|r| lookup(&self.index, stack, r))
        };
        if let Some(r) = recv {
            vec.insert(0, r);
        }

        let stored = self
            .store
            .summary(&callee.name)
            .and_then(|s| s.args_len());
        match stored {
            None => {}
            Some(len) if len == vec.len() => {}
            Some(len) if len + 1 == vec.len() => {
                // Earlier observations predate receiver knowledge.
                self.updated |= self.store.summary_mut(&callee.name).prepend_receivers();
            }
            Some(len) if len == vec.len() + 1 => {
                let r = recv
                    .or_else(|| {
                        self.store
                            .summary(&callee.name)
                            .and_then(|s| s.merged_receiver())
                    })
                    .unwrap_or(Nilness::Unknown);
                vec.insert(0, r);
            }
            Some(len) => panic!(
                "inconsistent arguments but not method closure: `{}` called from `{}` at site {} with {} values, {} recorded",
                callee.name,
                self.proc.name,
                site,
                vec.len(),
                len
            ),
        }

        let summary = self.store.summary_mut(&callee.name);
        let mut changed = summary.observe_args(site, vec);
        if let Some(r) = recv {
            changed |= summary.observe_receiver(site, r);
        }
        self.updated |= changed;
    }

    /// Propagate a callee's known return nilness onto this call's value
    /// and its tuple projections.
    fn push_return_facts(&mut self, instr: &'p Instruction, callee_name: &str, stack: &mut Vec<Fact>) {
        let merged = match self.store.summary(callee_name) {
            Some(s) => s.merged_returns(),
            None => return,
        };
        match merged.len() {
            0 => {}
            1 => stack.push(Fact {
                value: instr.id,
                nilness: merged[0],
            }),
            n => {
                for &r in self.index.referrers(instr.id) {
                    let Some(user) = self.index.instr(r) else {
                        continue;
                    };
                    if user.kind != ValueKind::Extract {
                        panic!(
                            "return values of `{}` referenced not as projections at site {} in `{}`",
                            callee_name, instr.id, self.proc.name
                        );
                    }
                    let idx = user.extract_index as usize;
                    if idx >= n {
                        panic!(
                            "inconsistent return values count for `{}` at site {}",
                            callee_name, instr.id
                        );
                    }
                    stack.push(Fact {
                        value: user.id,
                        nilness: merged[idx],
                    });
                }
            }
        }
    }

    fn check_operand(&mut self, instr: &'p Instruction, stack: &[Fact], descr: &str) {
        let Some(&op) = instr.operands.first() else {
            return;
        };
        self.not_nil(stack, instr, op, descr);
    }

    /// Report unless `v` is provably non-nil, then suppress the
    /// dereference's downstream consequences.
    fn not_nil(&mut self, stack: &[Fact], instr: &'p Instruction, v: u32, descr: &str) {
        if lookup(&self.index, stack, v) == Nilness::NonNil {
            return;
        }
        self.diagnostics
            .push(rules::nil_dereference(instr, &self.proc.name, descr));
        self.suppress_root_cause(v);
    }

    /// Only report the root cause. A load of one of this package's
    /// globals exports a marker instead of walking referrers: globals do
    /// not track referrers, and one report per global is enough.
    fn suppress_root_cause(&mut self, v: u32) {
        if let Some(global) = self.loaded_global(v) {
            if global.starts_with(&format!("{}.", self.package.name)) {
                self.store.export_global_reported(global);
                return;
            }
        }

        let mut frontier: Vec<u32> = self.index.referrers(v).to_vec();
        loop {
            let mut next = Vec::new();
            for r in frontier {
                if !self.already_reported.insert(r) {
                    continue;
                }
                next.extend_from_slice(self.index.referrers(r));
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
    }

    /// If `v` is a `*` load of a package-level variable, its qualified
    /// name.
    fn loaded_global(&self, v: u32) -> Option<&'p str> {
        let instr = self.index.instr(v)?;
        if !instr.is_load() {
            return None;
        }
        let g = self.index.instr(*instr.operands.first()?)?;
        if g.kind != ValueKind::Global {
            return None;
        }
        g.global_name.as_deref()
    }

    /// An instruction operating on a global that already produced a
    /// diagnostic is skipped entirely.
    fn global_suppressed(&self, instr: &Instruction) -> bool {
        let Some(&first) = instr.operands.first() else {
            return false;
        };
        let Some(global) = self.loaded_global(first) else {
            return false;
        };
        self.store.global_reported(global)
    }

    fn operand_is_pointer(&self, instr: &Instruction) -> bool {
        let Some(&op) = instr.operands.first() else {
            return false;
        };
        let Some(x) = self.index.instr(op) else {
            return false;
        };
        self.type_map
            .get(&x.type_id)
            .is_some_and(|t| t.kind == TypeKind::Pointer)
    }

    /// If the block ends with a conditional branch over an equality
    /// comparison, the comparison and its equal/not-equal successors.
    fn nil_comparison(&self, block: &BasicBlock) -> Option<(&'p Instruction, u32, u32)> {
        let last = block.instructions.last()?;
        if last.kind != ValueKind::If {
            return None;
        }
        let binop = self.index.instr(*last.operands.first()?)?;
        if binop.kind != ValueKind::BinOp || binop.operands.len() != 2 {
            return None;
        }
        let (t, f) = self.cfg.cond_successors(block.id)?;
        match binop.bin_op.as_deref() {
            Some("==") => Some((binop, t, f)),
            Some("!=") => Some((binop, f, t)),
            _ => None,
        }
    }

    /// Branch handling for nil comparisons: report degenerate conditions,
    /// prune unreachable successor subtrees, and push a learned
    /// hypothesis into single-predecessor successors. Returns true when
    /// the block's dominees were visited here.
    fn prune(&mut self, block: &BasicBlock, stack: &mut Vec<Fact>) -> bool {
        let Some((binop, tsucc, fsucc)) = self.nil_comparison(block) else {
            return false;
        };
        let x = binop.operands[0];
        let y = binop.operands[1];
        let xn = lookup(&self.index, stack, x);
        let yn = lookup(&self.index, stack, y);
        let op = binop.bin_op.as_deref().unwrap_or("==");

        if xn != Nilness::Unknown
            && yn != Nilness::Unknown
            && (xn == Nilness::Nil || yn == Nilness::Nil)
        {
            // Degenerate condition: both operands known, at least one nil.
            if self.mode == Mode::Diagnose {
                let tautological = (xn == yn) == (op == "==");
                self.diagnostics.push(rules::degenerate_comparison(
                    binop,
                    &self.proc.name,
                    tautological,
                    xn,
                    op,
                    yn,
                ));
            }

            // The successor on the impossible edge is unreachable unless
            // it can also be entered from elsewhere.
            let skip = if xn == yn { fsucc } else { tsucc };
            for d in self.cfg.dominees(block.id).to_vec() {
                if d == skip && self.cfg.predecessors(d).len() == 1 {
                    continue;
                }
                self.visit(d, stack);
            }
            return true;
        }

        if xn == Nilness::Nil || yn == Nilness::Nil {
            // One side is nil, the other unknown: the equal successor
            // learns the unknown side is nil, the other that it is not.
            let f = if xn == Nilness::Nil {
                Fact {
                    value: y,
                    nilness: Nilness::Nil,
                }
            } else {
                Fact {
                    value: x,
                    nilness: Nilness::Nil,
                }
            };
            for d in self.cfg.dominees(block.id).to_vec() {
                // Hypotheses hold only across non-critical edges.
                let single_pred = self.cfg.predecessors(d).len() == 1;
                if single_pred && d == tsucc {
                    stack.push(f);
                    self.visit(d, stack);
                    stack.pop();
                } else if single_pred && d == fsucc {
                    stack.push(f.negate());
                    self.visit(d, stack);
                    stack.pop();
                } else {
                    self.visit(d, stack);
                }
            }
            return true;
        }

        false
    }
}
