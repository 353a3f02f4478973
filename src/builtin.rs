// Copyright (c) 2022-2025 Fabian Schuiki

//! Canonical built-in types and cross-language coercions.
//!
//! The standard and IEEE VHDL types and the Verilog value types that take
//! part in mixed-language binding are registered here, together with the
//! conversion functions inserted at the language boundary. The coercion
//! tables are written in terms of symbolic type IDs and resolved to
//! canonical type handles once, on first use; the resolved tables live on
//! the registry instance rather than in process globals, so every
//! elaboration gets its own.

use crate::arenas::DesignArenas;
use crate::name::{Name, NameTable};
use crate::tree::{Tree, TreeData, TreeKind};
use crate::ty::{type_eq, GenericTypeKind, Type, TypeData, TypeKind};
use once_cell::unsync::OnceCell;

/// Symbolic IDs of the IEEE types that take part in coercions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IeeeType {
    StdUlogic,
    StdLogic,
}

/// Symbolic IDs of the Verilog value types.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VerilogType {
    Logic,
    NetValue,
    LogicArray,
    NetArray,
    WireArray,
}

/// VHDL signal into Verilog input port.
const TO_VERILOG: &[(IeeeType, VerilogType)] = &[
    (IeeeType::StdUlogic, VerilogType::Logic),
    (IeeeType::StdUlogic, VerilogType::NetValue),
];

/// Verilog output port into VHDL signal.
const TO_VHDL: &[(VerilogType, IeeeType)] = &[
    (VerilogType::Logic, IeeeType::StdLogic),
    (VerilogType::NetValue, IeeeType::StdLogic),
];

/// Verilog declaration into Verilog port of a different value type.
const VLOG_CONV: &[(VerilogType, VerilogType)] = &[
    (VerilogType::NetValue, VerilogType::Logic),
    (VerilogType::NetArray, VerilogType::LogicArray),
    (VerilogType::WireArray, VerilogType::LogicArray),
    (VerilogType::Logic, VerilogType::NetValue),
    (VerilogType::LogicArray, VerilogType::NetArray),
    (VerilogType::LogicArray, VerilogType::WireArray),
];

/// A resolved coercion table entry.
struct Coercion<'a> {
    from: Type<'a>,
    to: Type<'a>,
    decl: Tree<'a>,
}

/// The registry of canonical built-in types and conversion functions.
pub struct StdTypes<'a> {
    arenas: &'a DesignArenas<'a>,
    pub boolean: Type<'a>,
    pub integer: Type<'a>,
    pub real: Type<'a>,
    pub time: Type<'a>,
    pub character: Type<'a>,
    pub string: Type<'a>,
    pub std_ulogic: Type<'a>,
    pub std_logic: Type<'a>,
    pub std_logic_vector: Type<'a>,
    pub vlog_logic: Type<'a>,
    pub vlog_net_value: Type<'a>,
    pub vlog_logic_array: Type<'a>,
    pub vlog_net_array: Type<'a>,
    pub vlog_wire_array: Type<'a>,
    to_vhdl_name: Name,
    to_verilog_name: Name,
    to_logic_name: Name,
    to_net_name: Name,
    to_vhdl: OnceCell<Vec<Coercion<'a>>>,
    to_verilog: OnceCell<Vec<Coercion<'a>>>,
    vlog_conv: OnceCell<Vec<Coercion<'a>>>,
}

impl<'a> StdTypes<'a> {
    /// Build the canonical types. Called once per elaboration by whoever
    /// assembles the environment.
    pub fn new(arenas: &'a DesignArenas<'a>, names: &NameTable) -> StdTypes<'a> {
        let boolean = enum_type(arenas, names, "boolean", &["false", "true"], false);
        let integer = scalar(arenas, names, TypeKind::Integer, "integer");
        let real = scalar(arenas, names, TypeKind::Real, "real");
        let time = scalar(arenas, names, TypeKind::Physical, "time");

        let character = {
            let lits: Vec<String> = (0u8..128).map(|c| quoted_char(c as char)).collect();
            let refs: Vec<&str> = lits.iter().map(|s| s.as_str()).collect();
            enum_type(arenas, names, "character", &refs, true)
        };
        let string = array(arenas, names, "string", character);

        let std_ulogic = enum_type(
            arenas,
            names,
            "std_ulogic",
            &["'u'", "'x'", "'0'", "'1'", "'z'", "'w'", "'l'", "'h'", "'-'"],
            true,
        );
        let std_logic = {
            let t = arenas.alloc_type(TypeData::new(TypeKind::Subtype));
            t.set_ident(names.intern("std_logic", false));
            t.set_base(std_ulogic);
            t
        };
        let std_logic_vector = array(arenas, names, "std_logic_vector", std_logic);

        let vlog_logic = enum_type(arenas, names, "t_logic", &["'0'", "'1'", "'z'", "'x'"], true);
        let vlog_net_value = enum_type(
            arenas,
            names,
            "t_net_value",
            &["'0'", "'1'", "'z'", "'x'"],
            true,
        );
        let vlog_logic_array = array(arenas, names, "t_logic_array", vlog_logic);
        let vlog_net_array = array(arenas, names, "t_net_array", vlog_net_value);
        let vlog_wire_array = array(arenas, names, "t_wire_array", vlog_net_value);

        StdTypes {
            arenas,
            boolean,
            integer,
            real,
            time,
            character,
            string,
            std_ulogic,
            std_logic,
            std_logic_vector,
            vlog_logic,
            vlog_net_value,
            vlog_logic_array,
            vlog_net_array,
            vlog_wire_array,
            to_vhdl_name: names.intern("to_vhdl", false),
            to_verilog_name: names.intern("to_verilog", false),
            to_logic_name: names.intern("to_logic", false),
            to_net_name: names.intern("to_net", false),
            to_vhdl: OnceCell::new(),
            to_verilog: OnceCell::new(),
            vlog_conv: OnceCell::new(),
        }
    }

    fn ieee(&self, id: IeeeType) -> Type<'a> {
        match id {
            IeeeType::StdUlogic => self.std_ulogic,
            IeeeType::StdLogic => self.std_logic,
        }
    }

    fn verilog(&self, id: VerilogType) -> Type<'a> {
        match id {
            VerilogType::Logic => self.vlog_logic,
            VerilogType::NetValue => self.vlog_net_value,
            VerilogType::LogicArray => self.vlog_logic_array,
            VerilogType::NetArray => self.vlog_net_array,
            VerilogType::WireArray => self.vlog_wire_array,
        }
    }

    fn conv_decl(&self, name: Name, result: Type<'a>) -> Tree<'a> {
        let fty = self.arenas.alloc_type(TypeData::new(TypeKind::Func));
        fty.set_result(result);
        let decl = self.arenas.alloc_tree(TreeData::new(TreeKind::FuncDecl));
        decl.set_ident(name);
        decl.set_type(fty);
        decl
    }

    /// The conversion function for a VHDL value feeding a Verilog input
    /// port, or `None` if the pair has no coercion.
    pub fn to_verilog_func(&self, from: Type<'a>, to: Type<'a>) -> Option<Tree<'a>> {
        let table = self.to_verilog.get_or_init(|| {
            TO_VERILOG
                .iter()
                .map(|&(f, t)| {
                    let to = self.verilog(t);
                    Coercion {
                        from: self.ieee(f),
                        to,
                        decl: self.conv_decl(self.to_verilog_name, to),
                    }
                })
                .collect()
        });
        lookup(table, from, to)
    }

    /// The conversion function for a Verilog output port driving a VHDL
    /// value, or `None` if the pair has no coercion.
    pub fn to_vhdl_func(&self, from: Type<'a>, to: Type<'a>) -> Option<Tree<'a>> {
        let table = self.to_vhdl.get_or_init(|| {
            TO_VHDL
                .iter()
                .map(|&(f, t)| {
                    let to = self.ieee(t);
                    Coercion {
                        from: self.verilog(f),
                        to,
                        decl: self.conv_decl(self.to_vhdl_name, to),
                    }
                })
                .collect()
        });
        lookup(table, from, to)
    }

    /// The conversion function between two Verilog value types, or `None`
    /// if the pair has no coercion.
    pub fn vlog_conversion(&self, from: Type<'a>, to: Type<'a>) -> Option<Tree<'a>> {
        let table = self.vlog_conv.get_or_init(|| {
            VLOG_CONV
                .iter()
                .map(|&(f, t)| {
                    let from = self.verilog(f);
                    let to = self.verilog(t);
                    let name = match t {
                        VerilogType::Logic | VerilogType::LogicArray => self.to_logic_name,
                        _ => self.to_net_name,
                    };
                    Coercion {
                        from,
                        to,
                        decl: self.conv_decl(name, to),
                    }
                })
                .collect()
        });
        lookup(table, from, to)
    }

    /// Make an anonymous formal type generic of the given interface kind.
    pub fn generic_type(&self, kind: GenericTypeKind) -> Type<'a> {
        let t = self.arenas.alloc_type(TypeData::new(TypeKind::Generic));
        t.set_generic_kind(kind);
        t
    }
}

fn lookup<'a>(table: &[Coercion<'a>], from: Type<'a>, to: Type<'a>) -> Option<Tree<'a>> {
    table
        .iter()
        .find(|c| type_eq(c.from, from) && type_eq(c.to, to))
        .map(|c| c.decl)
}

fn scalar<'a>(
    arenas: &'a DesignArenas<'a>,
    names: &NameTable,
    kind: TypeKind,
    name: &str,
) -> Type<'a> {
    let t = arenas.alloc_type(TypeData::new(kind));
    t.set_ident(names.intern(name, false));
    t
}

fn array<'a>(
    arenas: &'a DesignArenas<'a>,
    names: &NameTable,
    name: &str,
    elem: Type<'a>,
) -> Type<'a> {
    let t = arenas.alloc_type(TypeData::new(TypeKind::Array));
    t.set_ident(names.intern(name, false));
    t.set_elem(elem);
    t
}

fn enum_type<'a>(
    arenas: &'a DesignArenas<'a>,
    names: &NameTable,
    name: &str,
    literals: &[&str],
    character: bool,
) -> Type<'a> {
    let t = arenas.alloc_type(TypeData::new(TypeKind::Enum));
    t.set_ident(names.intern(name, false));
    t.set_character(character);
    for (pos, lit) in literals.iter().enumerate() {
        let l = arenas.alloc_tree(TreeData::new(TreeKind::EnumLit));
        // Character literals are case sensitive, ordinary identifiers fold.
        l.set_ident(names.intern(lit, lit.starts_with('\'')));
        l.set_pos(pos);
        l.set_type(t);
        t.add_literal(l);
    }
    t
}

fn quoted_char(c: char) -> String {
    if c.is_ascii_graphic() || c == ' ' {
        format!("'{}'", c)
    } else {
        format!("'\\{}'", c as u32)
    }
}
