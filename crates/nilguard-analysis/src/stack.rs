//! Dominating nilness facts and the value-nilness query.
//!
//! The walker carries a stack of `(register, nilness)` hypotheses valid
//! for the dominance subtree it is visiting. `lookup` resolves a
//! register against constants and intrinsically non-nil opcodes first,
//! then against the stack, most recent entry first.

use nilguard_ir::index::ProcedureIndex;
use nilguard_ir::ir::ValueKind;

use crate::lattice::Nilness;

/// A fact records that the current block is dominated by knowledge that
/// a register is nil or non-nil (from a branch condition, a call-site
/// observation, or a callee's return summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fact {
    pub value: u32,
    pub nilness: Nilness,
}

impl Fact {
    pub fn negate(self) -> Fact {
        Fact {
            value: self.value,
            nilness: self.nilness.negate(),
        }
    }
}

/// Nilness of register `v` given the dominating facts.
pub fn lookup(index: &ProcedureIndex<'_>, stack: &[Fact], v: u32) -> Nilness {
    let Some(instr) = index.instr(v) else {
        return scan(stack, v).unwrap_or(Nilness::Unknown);
    };

    match instr.kind {
        ValueKind::Const => {
            if instr.is_nil {
                Nilness::Nil
            } else {
                Nilness::NonNil
            }
        }

        // A free variable cell is non-nil by construction, but a bound
        // receiver seeded from call-site summaries overrides that: the
        // captured value itself may be nil.
        ValueKind::FreeVar => scan(stack, v).unwrap_or(Nilness::NonNil),

        // Values that cannot be the null reference by construction.
        ValueKind::Alloc
        | ValueKind::FieldAddr
        | ValueKind::IndexAddr
        | ValueKind::Global
        | ValueKind::FuncRef
        | ValueKind::Builtin
        | ValueKind::MakeChan
        | ValueKind::MakeClosure
        | ValueKind::MakeInterface
        | ValueKind::MakeMap
        | ValueKind::MakeSlice => Nilness::NonNil,

        _ => scan(stack, v).unwrap_or(Nilness::Unknown),
    }
}

/// Pointwise `lookup` over a register list.
pub fn lookup_vec(index: &ProcedureIndex<'_>, stack: &[Fact], vs: &[u32]) -> Vec<Nilness> {
    vs.iter().map(|&v| lookup(index, stack, v)).collect()
}

fn scan(stack: &[Fact], v: u32) -> Option<Nilness> {
    stack
        .iter()
        .rev()
        .find(|f| f.value == v)
        .map(|f| f.nilness)
}
