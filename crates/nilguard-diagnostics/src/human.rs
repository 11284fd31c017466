//! Human-readable formatter: one line per diagnostic plus a summary.

use crate::diagnostic::Diagnostic;

pub fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        out.push_str(&diag.to_string());
        out.push('\n');
    }
    match diagnostics.len() {
        0 => out.push_str("no issues found\n"),
        1 => out.push_str("1 issue found\n"),
        n => out.push_str(&format!("{n} issues found\n")),
    }
    out
}
