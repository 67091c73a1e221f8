//! End-to-end tests exercising the kernel's public `run`/`run_with_input`
//! entry points against the concrete scenarios and boundary behaviors the
//! kernel is expected to accept or reject.

use mm0_kernel::driver::{run, run_with_input, Config};
use mm0_kernel::types::{
    Binder, Conv, DeclBody, DepSet, Environment, ExprArena, IoDir, NameTable, Proof, SortId,
    SortMods, Spec, Stmt, TermId, ThmId,
};
use mm0_kernel::util::ErrKind;

#[test]
fn scenario_1_accepts_trivial_sort_and_axiom() {
    let mut names = NameTable::new();
    let wff = names.intern("wff");
    let ax1 = names.intern("ax1");
    let top = names.intern("top");
    let mut arena = ExprArena::new();

    let mods = SortMods { provable: true, ..Default::default() };
    let env = Environment {
        specs: vec![
            Spec::Sort(wff, mods),
            Spec::Decl(top, DeclBody::Term { args: vec![], ret_sort: SortId(0), ret_deps: DepSet::EMPTY }),
            Spec::Decl(ax1, DeclBody::Axiom {
                args: vec![], hyp_names: vec![], hyps: vec![],
                concl: arena.mk_app(TermId(0), vec![]),
            }),
        ],
        ..Default::default()
    };
    let script = vec![Stmt::StepSort(wff), Stmt::StepTerm(top), Stmt::StepAxiom(ax1)];

    let out = run(&env, &script, Config::default()).unwrap();
    assert!(out.is_empty());
}

#[test]
fn scenario_2_rejects_mismatched_step() {
    let mut names = NameTable::new();
    let wff = names.intern("wff");
    let env = Environment { specs: vec![Spec::Sort(wff, SortMods::default())], ..Default::default() };
    let script = vec![Stmt::StepTerm(wff)];

    let err = run(&env, &script, Config::default()).unwrap_err();
    assert_eq!(err.len(), 1);
    assert!(err[0].msg.contains("incorrect step 'term wff'"));
}

#[test]
fn scenario_3_definition_and_unfolding_proof() {
    let mut names = NameTable::new();
    let wff = names.intern("wff");
    let not = names.intern("not");
    let trivial = names.intern("trivial");
    let thm = names.intern("thm");
    let x = names.intern("x");

    let mut arena = ExprArena::new();
    let var_x = arena.mk_var(x);

    // def not(x: wff): wff := x
    let not_def_args = vec![Binder::Bound { name: x, sort: SortId(0) }];
    let not_spec = Spec::Decl(not, DeclBody::Def {
        args: not_def_args.clone(), ret_sort: SortId(0), ret_deps: DepSet::EMPTY,
        dummies: vec![], body: var_x.clone(),
    });

    // axiom trivial(x: wff): not(x)
    let not_tid = TermId(0);
    let not_x = arena.mk_app(not_tid, vec![var_x.clone()]);
    let trivial_spec = Spec::Decl(trivial, DeclBody::Axiom {
        args: vec![Binder::Bound { name: x, sort: SortId(0) }],
        hyp_names: vec![], hyps: vec![], concl: not_x.clone(),
    });

    // theorem thm(x: wff): x := Conv(x, CSym(CUnfold(not, [x], [], CVar x)), Thm(trivial, [x], []))
    let trivial_tid = ThmId(0);
    let conv = Conv::CSym(Box::new(Conv::CUnfold {
        term: not_tid, args: vec![var_x.clone()], dummies: vec![], proof: Box::new(Conv::CVar(x)),
    }));
    let proof = Proof::Conv(var_x.clone(), conv, Box::new(Proof::Thm(trivial_tid, vec![var_x.clone()], vec![])));
    let thm_spec = Spec::Thm { args: vec![Binder::Bound { name: x, sort: SortId(0) }], hyp_names: vec![], hyps: vec![], concl: var_x.clone() };

    let env = Environment {
        specs: vec![Spec::Sort(wff, SortMods { provable: true, ..Default::default() }), not_spec, trivial_spec, thm_spec],
        ..Default::default()
    };
    let script = vec![
        Stmt::StepSort(wff),
        Stmt::StmtDef { name: not, args: not_def_args, ret_sort: SortId(0), ret_deps: DepSet::EMPTY, dummies: vec![], body: var_x.clone(), strict: true },
        Stmt::StepAxiom(trivial),
        Stmt::StmtThm {
            name: thm,
            args: vec![Binder::Bound { name: x, sort: SortId(0) }],
            hyp_names: vec![], hyps: vec![], concl: var_x,
            dummies: vec![], proof, strict: true,
        },
    ];

    let out = run(&env, &script, Config::default()).unwrap();
    assert!(out.is_empty());
}

#[test]
fn scenario_4_rejects_disjoint_variable_violation() {
    let mut names = NameTable::new();
    let wff = names.intern("wff");
    let needs_dv = names.intern("needs_dv");
    let thm = names.intern("thm");
    let x = names.intern("x");
    let p = names.intern("p");
    let y = names.intern("y");

    let mut arena = ExprArena::new();
    let c = names.intern("c");
    let var_c = arena.mk_var(c);

    // axiom needs_dv(x: wff, p: wff [no deps]): c
    let needs_dv_spec = Spec::Decl(needs_dv, DeclBody::Axiom {
        args: vec![
            Binder::Bound { name: x, sort: SortId(0) },
            Binder::Regular { name: p, sort: SortId(0), deps: DepSet::EMPTY },
        ],
        hyp_names: vec![], hyps: vec![], concl: var_c.clone(),
    });

    // theorem thm(y: wff): c := Thm(needs_dv, [y, y], [])  -- y instantiates both x and p
    let needs_dv_tid = ThmId(0);
    let var_y = arena.mk_var(y);
    let proof = Proof::Thm(needs_dv_tid, vec![var_y.clone(), var_y], vec![]);
    let thm_spec = Spec::Thm { args: vec![Binder::Bound { name: y, sort: SortId(0) }], hyp_names: vec![], hyps: vec![], concl: var_c.clone() };

    let env = Environment {
        specs: vec![Spec::Sort(wff, SortMods { provable: true, ..Default::default() }), needs_dv_spec, thm_spec],
        ..Default::default()
    };
    let script = vec![
        Stmt::StepSort(wff),
        Stmt::StepAxiom(needs_dv),
        Stmt::StmtThm {
            name: thm,
            args: vec![Binder::Bound { name: y, sort: SortId(0) }],
            hyp_names: vec![], hyps: vec![], concl: var_c,
            dummies: vec![], proof, strict: true,
        },
    ];

    let err = run(&env, &script, Config::default()).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err[0].kind, ErrKind::Dv);
}

fn io_signature_env() -> (NameTable, ExprArena, Vec<Spec>, Vec<Stmt>) {
    let mut names = NameTable::new();
    let mut arena = ExprArena::new();
    let byte = names.intern("byte");
    let mut specs = vec![Spec::Sort(byte, SortMods::default())];
    let mut script = vec![Stmt::StepSort(byte)];

    for i in 0..16u32 {
        let name = names.intern(&format!("x{:x}", i));
        specs.push(Spec::Decl(name, DeclBody::Term { args: vec![], ret_sort: SortId(0), ret_deps: DepSet::EMPTY }));
        script.push(Stmt::StepTerm(name));
    }
    let a = names.intern("a");
    let b = names.intern("b");
    let s0 = names.intern("s0");
    specs.push(Spec::Decl(s0, DeclBody::Term { args: vec![], ret_sort: SortId(0), ret_deps: DepSet::EMPTY }));
    script.push(Stmt::StepTerm(s0));
    let s1 = names.intern("s1");
    specs.push(Spec::Decl(s1, DeclBody::Term {
        args: vec![Binder::Regular { name: a, sort: SortId(0), deps: DepSet::EMPTY }],
        ret_sort: SortId(0), ret_deps: DepSet::EMPTY,
    }));
    script.push(Stmt::StepTerm(s1));
    let sadd = names.intern("sadd");
    specs.push(Spec::Decl(sadd, DeclBody::Term {
        args: vec![
            Binder::Regular { name: a, sort: SortId(0), deps: DepSet::EMPTY },
            Binder::Regular { name: b, sort: SortId(0), deps: DepSet::EMPTY },
        ],
        ret_sort: SortId(0), ret_deps: DepSet::EMPTY,
    }));
    script.push(Stmt::StepTerm(sadd));
    let ch = names.intern("ch");
    specs.push(Spec::Decl(ch, DeclBody::Term {
        args: vec![
            Binder::Regular { name: a, sort: SortId(0), deps: DepSet::EMPTY },
            Binder::Regular { name: b, sort: SortId(0), deps: DepSet::EMPTY },
        ],
        ret_sort: SortId(0), ret_deps: DepSet::EMPTY,
    }));
    script.push(Stmt::StepTerm(ch));

    (names, arena, specs, script)
}

fn hex_term_id(digit: u32) -> TermId {
    // Declared in `io_signature_env` right after the `byte` sort, in order
    // x0..xf, so digit `d` is the (d+1)th declaration (TermId 0-indexed).
    TermId(digit)
}

fn ch_term_id() -> TermId {
    TermId(16 + 3) // x0..xf (16), s0, s1, sadd, ch
}

#[test]
fn scenario_5_and_6_io_round_trip() {
    let (_names, mut arena, mut specs, mut script) = io_signature_env();

    let hi = arena.mk_app(hex_term_id(4), vec![]);
    let lo = arena.mk_app(hex_term_id(1), vec![]);
    let main_body = arena.mk_app(ch_term_id(), vec![hi, lo]);

    specs.push(Spec::Inout { dir: false, expr: main_body.clone() });
    script.push(Stmt::StepInout { dir: IoDir::Input, expr: main_body.clone() });

    let out = run_with_input(&Environment { specs: specs.clone(), ..Default::default() }, &script, Config::default(), b"A").unwrap();
    assert!(out.is_empty());

    let err = run_with_input(&Environment { specs, ..Default::default() }, &script, Config::default(), b"B").unwrap_err();
    assert!(err[0].msg.contains("input mismatch at char 0"));

    let (_, mut arena2, mut specs2, mut script2) = io_signature_env();
    let hi2 = arena2.mk_app(hex_term_id(4), vec![]);
    let lo2 = arena2.mk_app(hex_term_id(1), vec![]);
    let body2 = arena2.mk_app(ch_term_id(), vec![hi2, lo2]);
    specs2.push(Spec::Inout { dir: true, expr: body2.clone() });
    script2.push(Stmt::StepInout { dir: IoDir::Output, expr: body2 });

    let out = run(&Environment { specs: specs2, ..Default::default() }, &script2, Config::default()).unwrap();
    assert_eq!(out, vec![vec![0x41]]);
}

#[test]
fn sorry_is_rejected_even_if_well_scoped() {
    let mut names = NameTable::new();
    let wff = names.intern("wff");
    let thm = names.intern("thm");
    let mut arena = ExprArena::new();
    let x = names.intern("x");
    let var_x = arena.mk_var(x);

    let env = Environment {
        specs: vec![Spec::Sort(wff, SortMods { provable: true, ..Default::default() })],
        ..Default::default()
    };
    let script = vec![
        Stmt::StepSort(wff),
        Stmt::StmtThm {
            name: thm,
            args: vec![Binder::Bound { name: x, sort: SortId(0) }],
            hyp_names: vec![], hyps: vec![], concl: var_x,
            dummies: vec![], proof: Proof::Sorry, strict: false,
        },
    ];

    let err = run(&env, &script, Config::default()).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err[0].kind, ErrKind::Proof);
}
