//! SSA program types delivered by the front-end bridge.
//!
//! The bridge lowers each source package to a control-flow graph of basic
//! blocks over SSA registers. Instruction and register are one and the
//! same here: every value-producing instruction is addressed by its
//! program-unique `id`, and operands reference those ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root type: the whole program under analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub packages: Vec<Package>,
}

impl Program {
    /// Map from qualified procedure name to its package and procedure.
    ///
    /// Qualified names are unique across the program; the bridge emits
    /// them as `<package>.<name>` (methods as `(*pkg.T).Name`).
    pub fn procedure_map(&self) -> HashMap<&str, (&Package, &Procedure)> {
        let mut map = HashMap::new();
        for pkg in &self.packages {
            for proc in &pkg.procedures {
                map.insert(proc.name.as_str(), (pkg, proc));
            }
        }
        map
    }
}

/// A source package with full SSA for each of its procedures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeRef>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

/// Type reference with unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: u32,
    pub kind: TypeKind,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TypeKind {
    Basic,
    Named,
    Pointer,
    Slice,
    Array,
    Map,
    Chan,
    Struct,
    Interface,
    Signature,
    Tuple,
    #[serde(other)]
    Unknown,
}

/// Source location span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub end_col: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }
}

/// A procedure (function, method, or synthesized method-value wrapper)
/// with its full CFG.
///
/// `params` and `free_vars` list the instruction ids of the procedure's
/// `Parameter` and `FreeVar` registers, in declaration order. A
/// method-value wrapper carries the bound receiver as `free_vars[0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub span: Option<Span>,
    #[serde(default)]
    pub params: Vec<u32>,
    #[serde(default)]
    pub free_vars: Vec<u32>,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub cfg_edges: Vec<CfgEdge>,
    #[serde(default)]
    pub is_exported: bool,
    /// Declared but not defined in this program (no body).
    #[serde(default)]
    pub is_external: bool,
}

/// SSA basic block. The first block in a procedure's list is the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// CFG edge between basic blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from_block: u32,
    pub to_block: u32,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EdgeKind {
    Unconditional,
    CondTrue,
    CondFalse,
    #[serde(other)]
    Unknown,
}

/// SSA instruction / register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: u32,
    pub kind: ValueKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_id: u32,
    #[serde(default)]
    pub span: Option<Span>,
    /// Operand register ids. Positional meaning depends on `kind`:
    /// `UnOp [x]`, `BinOp [x, y]`, `Store [addr, value]`,
    /// `MapUpdate [map, key, value]`, `Return [results...]`, `If [cond]`,
    /// `Call [args...]`.
    #[serde(default)]
    pub operands: Vec<u32>,
    /// For `Extract`: which tuple position is projected (0-based).
    #[serde(default)]
    pub extract_index: u32,

    // Call-specific
    /// Qualified name of the statically resolved callee, when known.
    #[serde(default)]
    pub callee: Option<String>,
    /// The register being invoked, for indirect and closure calls.
    /// Absent for direct static calls.
    #[serde(default)]
    pub call_target: Option<u32>,
    /// Human description of the call shape ("function call",
    /// "dynamic function call", "dynamic method call", ...).
    #[serde(default)]
    pub call_description: Option<String>,
    /// When the callee is a method value: the caller-scope register bound
    /// as the callee's first free variable (the receiver).
    #[serde(default)]
    pub bound_receiver: Option<u32>,

    // TypeAssert-specific
    #[serde(default)]
    pub comma_ok: bool,

    // Const-specific
    #[serde(default)]
    pub const_value: Option<String>,
    #[serde(default)]
    pub is_nil: bool,

    // BinOp/UnOp-specific
    #[serde(default)]
    pub bin_op: Option<String>,
    #[serde(default)]
    pub un_op: Option<String>,

    // Global-specific: qualified name of the referenced package-level var.
    #[serde(default)]
    pub global_name: Option<String>,
}

impl Instruction {
    /// True for `UnOp` with the `*` operator (a pointer load).
    pub fn is_load(&self) -> bool {
        self.kind == ValueKind::UnOp && self.un_op.as_deref() == Some("*")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueKind {
    Const,
    Parameter,
    FreeVar,
    Global,
    FuncRef,
    Builtin,
    Alloc,
    FieldAddr,
    IndexAddr,
    MakeChan,
    MakeClosure,
    MakeInterface,
    MakeMap,
    MakeSlice,
    Call,
    Extract,
    BinOp,
    UnOp,
    Phi,
    TypeAssert,
    Slice,
    Store,
    MapUpdate,
    Return,
    If,
    Jump,
    Panic,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_program() {
        let json = r#"{
            "packages": [{
                "path": "example.com/pkg",
                "name": "pkg",
                "types": [{"id": 1, "kind": "Pointer", "name": "*User"}],
                "procedures": [{
                    "name": "pkg.Hello",
                    "short_name": "Hello",
                    "is_exported": true,
                    "params": [0],
                    "blocks": [{"id": 0, "instructions": [
                        {"id": 0, "kind": "Parameter", "name": "u", "type_id": 1}
                    ]}]
                }]
            }]
        }"#;

        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.packages.len(), 1);
        let proc = &program.packages[0].procedures[0];
        assert_eq!(proc.short_name, "Hello");
        assert!(proc.is_exported);
        assert_eq!(proc.params, vec![0]);
        assert_eq!(
            proc.blocks[0].instructions[0].kind,
            ValueKind::Parameter
        );
    }

    #[test]
    fn test_deserialize_call_instruction() {
        let json = r#"{
            "id": 7, "kind": "Call", "name": "t7",
            "operands": [3, 4],
            "callee": "pkg.load",
            "call_target": 6,
            "call_description": "dynamic function call",
            "bound_receiver": 2
        }"#;
        let instr: Instruction = serde_json::from_str(json).unwrap();
        assert_eq!(instr.kind, ValueKind::Call);
        assert_eq!(instr.callee.as_deref(), Some("pkg.load"));
        assert_eq!(instr.call_target, Some(6));
        assert_eq!(instr.bound_receiver, Some(2));
        assert_eq!(instr.operands, vec![3, 4]);
    }

    #[test]
    fn test_unknown_kind_falls_back() {
        let json = r#"{"id": 1, "kind": "DebugRef", "name": "t1"}"#;
        let instr: Instruction = serde_json::from_str(json).unwrap();
        assert_eq!(instr.kind, ValueKind::Unknown);
    }

    #[test]
    fn test_is_load() {
        let json = r#"{"id": 2, "kind": "UnOp", "un_op": "*", "operands": [1]}"#;
        let load: Instruction = serde_json::from_str(json).unwrap();
        assert!(load.is_load());

        let json = r#"{"id": 3, "kind": "UnOp", "un_op": "-", "operands": [1]}"#;
        let neg: Instruction = serde_json::from_str(json).unwrap();
        assert!(!neg.is_load());
    }

    #[test]
    fn test_procedure_map() {
        let program = Program {
            packages: vec![
                Package {
                    path: "example.com/a".into(),
                    name: "a".into(),
                    types: vec![],
                    procedures: vec![Procedure {
                        name: "a.One".into(),
                        short_name: "One".into(),
                        span: None,
                        params: vec![],
                        free_vars: vec![],
                        blocks: vec![],
                        cfg_edges: vec![],
                        is_exported: true,
                        is_external: false,
                    }],
                },
                Package {
                    path: "example.com/b".into(),
                    name: "b".into(),
                    types: vec![],
                    procedures: vec![Procedure {
                        name: "b.two".into(),
                        short_name: "two".into(),
                        span: None,
                        params: vec![],
                        free_vars: vec![],
                        blocks: vec![],
                        cfg_edges: vec![],
                        is_exported: false,
                        is_external: false,
                    }],
                },
            ],
        };

        let map = program.procedure_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a.One"].0.path, "example.com/a");
        assert_eq!(map["b.two"].1.short_name, "two");
    }

    #[test]
    fn test_span_creation() {
        let span = Span::new("main.go", 10, 5);
        assert_eq!(span.file, "main.go");
        assert_eq!(span.start_line, 10);
        assert_eq!(span.start_col, 5);
        assert_eq!(span.end_line, 10);
    }
}
