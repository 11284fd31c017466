//! Per-procedure instruction and referrer indices.
//!
//! Topology stays owned by the IR; analysis passes look values up by id
//! and walk referrer sets without holding back-pointers.

use crate::ir::{Instruction, Procedure};
use std::collections::HashMap;

/// Instruction-by-id lookup plus the referrer map: for each register,
/// the ids of the instructions consuming it, in program order.
pub struct ProcedureIndex<'a> {
    instrs: HashMap<u32, &'a Instruction>,
    referrers: HashMap<u32, Vec<u32>>,
}

impl<'a> ProcedureIndex<'a> {
    pub fn from_procedure(proc: &'a Procedure) -> Self {
        let mut instrs = HashMap::new();
        let mut referrers: HashMap<u32, Vec<u32>> = HashMap::new();

        for block in &proc.blocks {
            for instr in &block.instructions {
                instrs.insert(instr.id, instr);
                for &op in &instr.operands {
                    referrers.entry(op).or_default().push(instr.id);
                }
                // Call targets and closure bindings consume registers too.
                if let Some(target) = instr.call_target {
                    referrers.entry(target).or_default().push(instr.id);
                }
                if let Some(recv) = instr.bound_receiver {
                    referrers.entry(recv).or_default().push(instr.id);
                }
            }
        }

        Self { instrs, referrers }
    }

    pub fn instr(&self, id: u32) -> Option<&'a Instruction> {
        self.instrs.get(&id).copied()
    }

    pub fn referrers(&self, id: u32) -> &[u32] {
        self.referrers
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
