// Copyright (c) 2022-2025 Fabian Schuiki

//! Scenario tests for the elaboration driver.

#[macro_use]
mod common;

use mead::elab::elaborate;
use mead::library::Object;
use mead::tree::{Class, PortDir, TreeKind};
use mead::ty::GenericTypeKind;
use mead::vlog::{VlogData, VlogKind, VlogPortDir};

#[test]
fn arch_choice_by_mtime() {
    fixture!(env, fx);

    let e = fx.entity("foo");
    let rtl = fx.arch("rtl", e);
    let tb = fx.arch("tb", e);
    fx.add_vhdl("work.foo", e, 5);
    fx.add_vhdl("work.foo-rtl", rtl, 10);
    fx.add_vhdl("work.foo-tb", tb, 20);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    let top = fx.top_block(result);
    assert_eq!(fx.str_of(top.ident()), "foo");
    assert_eq!(fx.str_of(fx.hier(top).ident()), ":foo(tb)");
    assert!(fx.errors().is_empty());
}

#[test]
fn arch_choice_tie_across_files_warns() {
    fixture!(env, fx);

    let e = fx.entity("foo");
    let rtl = fx.arch("rtl", e);
    rtl.set_loc(fx.loc("a.vhd", 10));
    let tb = fx.arch("tb", e);
    tb.set_loc(fx.loc("b.vhd", 10));
    fx.add_vhdl("work.foo-rtl", rtl, 20);
    fx.add_vhdl("work.foo-tb", tb, 20);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    // First-encountered architecture is kept and the ambiguity reported.
    let top = fx.top_block(result);
    assert_eq!(fx.str_of(fx.hier(top).ident()), ":foo(rtl)");
    let warnings = fx.warnings();
    assert!(warnings
        .iter()
        .any(|w| w.contains("cannot determine which of")));
}

#[test]
fn arch_choice_tie_same_file_uses_line_numbers() {
    fixture!(env, fx);

    let e = fx.entity("foo");
    let rtl = fx.arch("rtl", e);
    rtl.set_loc(fx.loc("a.vhd", 10));
    let tb = fx.arch("tb", e);
    tb.set_loc(fx.loc("a.vhd", 30));
    fx.add_vhdl("work.foo-rtl", rtl, 20);
    fx.add_vhdl("work.foo-tb", tb, 20);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    let top = fx.top_block(result);
    assert_eq!(fx.str_of(fx.hier(top).ident()), ":foo(tb)");
    assert!(fx.warnings().is_empty());
}

#[test]
fn default_binding_missing_port_fails() {
    fixture!(env, fx);

    // Component c has ports (a, b); entity c has (a, b, extra) where extra
    // has no default and is an input, so it cannot be left open.
    let top = fx.entity("top");
    let top_rtl = fx.arch("rtl", top);
    fx.add_vhdl("work.top", top, 1);
    fx.add_vhdl("work.top-rtl", top_rtl, 1);

    let ec = fx.entity("c");
    fx.port(ec, "a", fx.std.std_logic, PortDir::In);
    fx.port(ec, "b", fx.std.std_logic, PortDir::In);
    fx.port(ec, "extra", fx.std.std_logic, PortDir::In);
    let ec_rtl = fx.arch("rtl", ec);
    fx.add_vhdl("work.c", ec, 1);
    fx.add_vhdl("work.c-rtl", ec_rtl, 1);

    let comp = fx.component("c");
    fx.port(comp, "a", fx.std.std_logic, PortDir::In);
    fx.port(comp, "b", fx.std.std_logic, PortDir::In);
    top_rtl.add_decl(comp);
    top_rtl.add_stmt(fx.instance("u1", comp));

    assert!(elaborate(&env, Object::Vhdl(top)).is_none());

    let errors = fx.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("extra"));
    assert!(errors[0].contains("work.c"));
    assert!(errors[0].contains("component c"));
}

#[test]
fn for_generate_expansion() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::ForGenerate);
    gen.set_ident(fx.intern("gen"));
    gen.set_loc(fx.loc("design.vhd", 30));
    gen.add_range(fx.range_to(1, 3));
    let genvar = fx.tree(TreeKind::GenericDecl);
    genvar.set_ident(fx.intern("i"));
    genvar.set_type(fx.std.integer);
    gen.add_decl(genvar);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    let top = fx.top_block(result);
    let blocks = top.stmts();
    assert_eq!(blocks.len(), 3);

    let parent_hier = fx.hier(top);
    for (n, b) in blocks.iter().enumerate() {
        let i = n as i64 + 1;
        assert_eq!(fx.str_of(b.ident()), format!("gen({})", i));

        // One positional genmap binding the loop variable to the index.
        let genmaps = b.genmaps();
        assert_eq!(genmaps.len(), 1);
        assert_eq!(genmaps[0].value().ival(), i);

        // Hierarchical path and dotted name extend the parent's.
        let h = fx.hier(b);
        let parent_path = fx.str_of(parent_hier.ident());
        let parent_dotted = fx.str_of(parent_hier.ident2());
        assert_eq!(
            fx.str_of(h.ident()),
            format!("{}:gen({})", parent_path, i)
        );
        assert_eq!(
            fx.str_of(h.ident2()),
            format!("{}.gen({})", parent_dotted, i)
        );
    }

    // One lowered unit per block plus the root architecture, each finalised
    // exactly once.
    assert_eq!(fx.registry.finalised.borrow().len(), 4);
}

#[test]
fn for_generate_empty_range() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::ForGenerate);
    gen.set_ident(fx.intern("gen"));
    gen.add_range(fx.range_to(3, 1));
    let genvar = fx.tree(TreeKind::GenericDecl);
    genvar.set_ident(fx.intern("i"));
    genvar.set_type(fx.std.integer);
    gen.add_decl(genvar);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    assert!(fx.top_block(result).stmts().is_empty());
    assert!(fx.errors().is_empty());
}

#[test]
fn mixed_binding_inserts_input_coercion() {
    fixture!(env, fx);

    let top = fx.entity("top");
    let top_rtl = fx.arch("rtl", top);
    fx.add_vhdl("work.top", top, 1);
    fx.add_vhdl("work.top-rtl", top_rtl, 1);

    let module = fx.vlog_module("vmod");
    fx.vlog_port(module, "clk", fx.std.vlog_logic, VlogPortDir::Input);
    fx.add_vlog("work.vmod", module, 1);

    let comp = fx.component("vmod");
    fx.port(comp, "clk", fx.std.std_logic, PortDir::In);
    top_rtl.add_decl(comp);
    top_rtl.add_stmt(fx.instance("u1", comp));

    let result = elaborate(&env, Object::Vhdl(top)).expect("elaboration failed");
    assert!(fx.errors().is_empty());

    let comp_block = fx.top_block(result).stmts()[0];
    assert_eq!(fx.str_of(comp_block.ident()), "u1");

    let vmod_block = comp_block.stmts()[0];
    let params = vmod_block.params();
    assert_eq!(params.len(), 1);

    let conv = params[0].value();
    assert_eq!(conv.kind, TreeKind::ConvFunc);
    assert_eq!(fx.str_of(conv.ident()), "to_verilog");
    assert_eq!(conv.ty().id, fx.std.vlog_logic.id);

    let inner = conv.value();
    assert_eq!(inner.kind, TreeKind::Ref);
    assert_eq!(fx.str_of(inner.ident()), "clk");
    assert_eq!(inner.target().ty().id, fx.std.std_logic.id);
}

#[test]
fn top_level_override_and_unused_warning() {
    fixture!(env, fx);

    let e = fx.entity("top");
    fx.generic(
        e,
        "WIDTH",
        fx.std.integer,
        Class::Constant,
        Some(fx.int_lit(8)),
    );
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    fx.sess.set_generic("WIDTH", "16").unwrap();
    fx.sess.set_generic("UNUSED", "7").unwrap();

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    let top = fx.top_block(result);
    let genmaps = top.genmaps();
    assert_eq!(genmaps.len(), 1);
    assert_eq!(genmaps[0].value().ival(), 16);

    let warnings = fx.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("generic value for UNUSED not used"));
}

#[test]
fn generic_default_without_override() {
    fixture!(env, fx);

    let e = fx.entity("top");
    fx.generic(
        e,
        "WIDTH",
        fx.std.integer,
        Class::Constant,
        Some(fx.int_lit(8)),
    );
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    assert_eq!(fx.top_block(result).genmaps()[0].value().ival(), 8);
}

#[test]
fn depth_guard_reports_once() {
    fixture!(env, fx);

    let e = fx.entity("r");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.r", e, 1);
    fx.add_vhdl("work.r-rtl", a, 1);

    // The architecture instantiates itself.
    a.add_stmt(fx.instance("u", a));

    assert!(elaborate(&env, Object::Vhdl(e)).is_none());

    let depth_errors: Vec<_> = fx
        .errors()
        .into_iter()
        .filter(|e| e.contains("maximum instantiation depth of 127 reached"))
        .collect();
    assert_eq!(depth_errors.len(), 1);
}

#[test]
fn unbound_component_elaborates_empty() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let comp = fx.component("nothing");
    a.add_decl(comp);
    a.add_stmt(fx.instance("u1", comp));

    let result = elaborate(&env, Object::Vhdl(e)).expect("unbound instance is not an error");

    let warnings = fx.warnings();
    assert!(warnings.iter().any(|w| w.contains("cannot find entity")));

    let block = fx.top_block(result).stmts()[0];
    assert!(block.stmts().is_empty());
}

#[test]
fn constant_generics_share_component_ports() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    // The component is deliberately not declared inside the architecture so
    // the instantiation copy leaves it shared.
    let comp = fx.component("nothing");
    fx.generic(
        comp,
        "W",
        fx.std.integer,
        Class::Constant,
        Some(fx.int_lit(4)),
    );
    let cport = fx.port(comp, "p", fx.std.std_logic, PortDir::In);
    a.add_stmt(fx.instance("u1", comp));

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    let block = fx.top_block(result).stmts()[0];
    assert_eq!(block.ports()[0].id, cport.id);
}

#[test]
fn type_generic_clones_component() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let comp = fx.component("nothing");
    let gt = fx.std.generic_type(GenericTypeKind::Private);
    let g = fx.tree(TreeKind::GenericDecl);
    g.set_ident(fx.intern("t"));
    g.set_type(gt);
    g.set_class(Class::Type);
    comp.add_generic(g);
    let cport = fx.port(comp, "p", gt, PortDir::In);

    let inst = fx.instance("u1", comp);
    let actual = fx.tree(TreeKind::TypeRef);
    actual.set_type(fx.std.integer);
    inst.add_genmap(fx.pos_param(0, actual));
    a.add_stmt(inst);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    let block = fx.top_block(result).stmts()[0];
    let port = block.ports()[0];
    // The component was cloned for this use site and its port type
    // substituted with the actual.
    assert_ne!(port.id, cport.id);
    assert_eq!(port.ty().id, fx.std.integer.id);
}

#[test]
fn if_generate_no_true_branch() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::IfGenerate);
    gen.set_ident(fx.intern("g"));
    let cond = fx.tree(TreeKind::Cond);
    cond.set_ident(fx.intern("g"));
    cond.set_value(fx.bool_ref(false));
    gen.add_cond(cond);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    assert!(fx.top_block(result).stmts().is_empty());
    assert!(fx.errors().is_empty());
}

#[test]
fn if_generate_else_branch() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::IfGenerate);
    gen.set_ident(fx.intern("g"));
    let cond = fx.tree(TreeKind::Cond);
    cond.set_ident(fx.intern("g"));
    cond.set_value(fx.bool_ref(false));
    gen.add_cond(cond);
    let els = fx.tree(TreeKind::Cond);
    els.set_ident(fx.intern("g_else"));
    gen.add_cond(els);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    let blocks = fx.top_block(result).stmts();
    assert_eq!(blocks.len(), 1);
    assert_eq!(fx.str_of(blocks[0].ident()), "g_else");
}

#[test]
fn case_generate_no_choice() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::CaseGenerate);
    gen.set_ident(fx.intern("g"));
    gen.set_value(fx.int_lit(5));
    let alt = fx.tree(TreeKind::Cond);
    alt.set_ident(fx.intern("one"));
    alt.set_value(fx.int_lit(1));
    gen.add_cond(alt);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    assert!(fx.top_block(result).stmts().is_empty());
    assert!(fx.errors().is_empty());
}

#[test]
fn case_generate_matching_choice() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let gen = fx.tree(TreeKind::CaseGenerate);
    gen.set_ident(fx.intern("g"));
    gen.set_value(fx.int_lit(1));
    let alt = fx.tree(TreeKind::Cond);
    alt.set_ident(fx.intern("one"));
    alt.set_value(fx.int_lit(1));
    gen.add_cond(alt);
    a.add_stmt(gen);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");
    let blocks = fx.top_block(result).stmts();
    assert_eq!(blocks.len(), 1);
    assert_eq!(fx.str_of(blocks[0].ident()), "one");
}

#[test]
fn explicit_spec_binding() {
    fixture!(env, fx);

    let top = fx.entity("top");
    let top_rtl = fx.arch("rtl", top);
    fx.add_vhdl("work.top", top, 1);
    fx.add_vhdl("work.top-rtl", top_rtl, 1);

    let e2 = fx.entity("e2");
    let e2_rtl = fx.arch("rtl", e2);
    fx.add_vhdl("work.e2", e2, 1);
    fx.add_vhdl("work.e2-rtl", e2_rtl, 1);

    let comp = fx.component("c2");
    top_rtl.add_decl(comp);

    let inst = fx.instance("u1", comp);
    let binding = fx.tree(TreeKind::Binding);
    binding.set_ident(e2.ident());
    binding.set_target(e2);
    binding.set_class(Class::Entity);
    let spec = fx.tree(TreeKind::Spec);
    spec.set_ident(fx.intern("u1"));
    spec.set_ident2(comp.ident());
    spec.set_value(binding);
    inst.set_spec(spec);
    top_rtl.add_stmt(inst);

    let result = elaborate(&env, Object::Vhdl(top)).expect("elaboration failed");
    assert!(fx.errors().is_empty());

    let comp_block = fx.top_block(result).stmts()[0];
    assert_eq!(fx.str_of(comp_block.ident()), "u1");
    let arch_block = comp_block.stmts()[0];
    assert_eq!(fx.str_of(arch_block.ident()), "e2");
}

#[test]
fn verilog_top_level() {
    fixture!(env, fx);

    let module = fx.vlog_module("vmod");
    fx.add_vlog("work.vmod", module, 1);

    let result = elaborate(&env, Object::Vlog(module)).expect("elaboration failed");
    assert_eq!(fx.str_of(result.ident()), "vmod.elab");

    let top = fx.top_block(result);
    assert_eq!(fx.str_of(top.ident()), "vmod");
    assert!(fx.errors().is_empty());
}

#[test]
fn verilog_nested_instance_with_coercion() {
    fixture!(env, fx);

    let parent = fx.vlog_module("parent");
    fx.vlog_port(parent, "a", fx.std.vlog_logic, VlogPortDir::Input);
    fx.add_vlog("work.parent", parent, 1);

    let child = fx.vlog_module("child");
    fx.vlog_port(child, "x", fx.std.vlog_net_value, VlogPortDir::Input);
    fx.add_vlog("work.child", child, 1);

    let inst = fx.arenas.alloc_vlog(VlogData::new(VlogKind::ModInst));
    inst.set_ident(fx.sess.names.intern("u0", true));
    inst.set_ident2(fx.sess.names.intern("child", true));
    inst.set_loc(fx.loc("design.v", 5));
    let conn = fx.arenas.alloc_vlog(VlogData::new(VlogKind::Ref));
    conn.set_ident(fx.sess.names.intern("a", true));
    conn.set_loc(fx.loc("design.v", 5));
    inst.add_param(conn);
    parent.add_stmt(inst);

    let result = elaborate(&env, Object::Vlog(parent)).expect("elaboration failed");
    assert!(fx.errors().is_empty());

    let top = fx.top_block(result);
    let child_block = top.stmts()[0];
    assert_eq!(fx.str_of(child_block.ident()), "u0");

    let params = child_block.params();
    assert_eq!(params.len(), 1);
    let conv = params[0].value();
    assert_eq!(conv.kind, TreeKind::ConvFunc);
    assert_eq!(fx.str_of(conv.ident()), "to_net");
    assert_eq!(conv.ty().id, fx.std.vlog_net_value.id);
}

#[test]
fn processes_are_lowered_and_copied() {
    fixture!(env, fx);

    let e = fx.entity("top");
    let a = fx.arch("rtl", e);
    fx.add_vhdl("work.top", e, 1);
    fx.add_vhdl("work.top-rtl", a, 1);

    let proc = fx.tree(TreeKind::Process);
    proc.set_ident(fx.intern("p0"));
    a.add_stmt(proc);

    let result = elaborate(&env, Object::Vhdl(e)).expect("elaboration failed");

    let top = fx.top_block(result);
    let stmts = top.stmts();
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, TreeKind::Process);
}
