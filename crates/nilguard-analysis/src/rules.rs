//! Diagnostic constructors.

use nilguard_diagnostics::diagnostic::{Category, Diagnostic, Location};
use nilguard_ir::ir::{Instruction, Span};

use crate::lattice::Nilness;

/// A dereferencing operation whose operand is not provably non-nil.
pub fn nil_dereference(instr: &Instruction, proc_name: &str, descr: &str) -> Diagnostic {
    Diagnostic {
        category: Category::NilDeref,
        message: format!("nil dereference in {descr}"),
        location: location(instr.span.as_ref()),
        procedure: proc_name.to_owned(),
    }
}

/// A nil comparison whose outcome is statically determined.
pub fn degenerate_comparison(
    binop: &Instruction,
    proc_name: &str,
    tautological: bool,
    xn: Nilness,
    op: &str,
    yn: Nilness,
) -> Diagnostic {
    let adj = if tautological {
        "tautological"
    } else {
        "impossible"
    };
    Diagnostic {
        category: Category::Cond,
        message: format!("{adj} condition: {xn} {op} {yn}"),
        location: location(binop.span.as_ref()),
        procedure: proc_name.to_owned(),
    }
}

fn location(span: Option<&Span>) -> Location {
    match span {
        Some(s) => Location::new(s.file.clone(), s.start_line, s.start_col),
        None => Location::unknown(),
    }
}
