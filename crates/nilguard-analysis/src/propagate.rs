//! Interprocedural fixpoint driver.
//!
//! For each package, every source procedure is walked in Summarize mode
//! until no summary changes, then the package-done marker is exported
//! and every procedure is walked once in Diagnose mode. Nilness
//! positions only move toward Unknown, so the fixpoint is reached in at
//! most two rounds per call/return site; the loop is bounded by that
//! count as a backstop.

use nilguard_diagnostics::diagnostic::Diagnostic;
use nilguard_ir::ir::{Package, Program, ValueKind};

use crate::ignore::IgnoreMatcher;
use crate::store::FactStore;
use crate::walker::{walk_procedure, Mode, ProcedureMap};

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub ignore: IgnoreMatcher,
}

/// Whole-program nilness analyzer.
pub struct Analyzer;

impl Analyzer {
    pub fn analyze(program: &Program) -> Vec<Diagnostic> {
        Self::analyze_with_options(program, &AnalysisOptions::default())
    }

    pub fn analyze_with_options(
        program: &Program,
        options: &AnalysisOptions,
    ) -> Vec<Diagnostic> {
        let procedures = program.procedure_map();
        let mut store = FactStore::new();
        let mut diagnostics = Vec::new();

        // Packages arrive in dependency-free order; a package's callees
        // in earlier packages are sealed behind their done markers.
        for pkg in &program.packages {
            Self::propagate_package(pkg, &procedures, &mut store, &options.ignore);
            store.export_package_done(&pkg.path);

            for proc in &pkg.procedures {
                if options.ignore.is_ignored(proc) {
                    continue;
                }
                let out = walk_procedure(pkg, proc, &procedures, &mut store, Mode::Diagnose);
                diagnostics.extend(out.diagnostics);
            }
        }
        diagnostics
    }

    fn propagate_package(
        pkg: &Package,
        procedures: &ProcedureMap<'_>,
        store: &mut FactStore,
        ignore: &IgnoreMatcher,
    ) {
        let bound = Self::round_bound(pkg);
        for round in 1.. {
            let mut updated = false;
            for proc in &pkg.procedures {
                if ignore.is_ignored(proc) {
                    continue;
                }
                updated |= walk_procedure(pkg, proc, procedures, store, Mode::Summarize).updated;
            }
            if !updated {
                break;
            }
            if round >= bound {
                tracing::warn!(
                    package = %pkg.path,
                    rounds = bound,
                    "nilness propagation did not converge"
                );
                break;
            }
        }
    }

    /// Every position can change at most twice (toward Unknown), so the
    /// fixpoint needs no more rounds than twice the number of call and
    /// return sites.
    fn round_bound(pkg: &Package) -> usize {
        let sites = pkg
            .procedures
            .iter()
            .flat_map(|p| p.blocks.iter())
            .flat_map(|b| b.instructions.iter())
            .filter(|i| matches!(i.kind, ValueKind::Call | ValueKind::Return))
            .count();
        2 * sites + 2
    }
}
