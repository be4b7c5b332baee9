use alanc::{
    error::{Category, Severity, Stage},
    lex::Token,
    target::Arch,
};

use pretty_assertions::assert_eq;
use std::str::FromStr;

#[test]
fn programs_are_isolated() {
    let text = "{ int a a = \"x\" }$\n{ int b b = 2 print(b) }$";

    for arch in [Arch::Mos6502, Arch::RiscV] {
        let units = alanc::compile(text, arch);
        assert_eq!(units.len(), 2);

        let (first, second) = (&units[0], &units[1]);
        assert_eq!((first.number(), second.number()), (1, 2));

        assert!(first.failed());
        assert!(first.ast().is_some());
        assert!(first.program().is_none());
        assert_eq!(first.diagnostics().errors(), 1);

        assert!(!second.failed());
        assert!(second.diagnostics().is_empty());
        assert_eq!(second.program().map(|program| program.arch()), Some(arch));
    }
}

#[test]
fn syntax_error_does_not_stop_next_program() {
    let text = "{ print( }$ { int a a = 1 print(a) }$";

    for arch in [Arch::Mos6502, Arch::RiscV] {
        let units = alanc::compile(text, arch);
        assert_eq!(units.len(), 2);

        let (first, second) = (&units[0], &units[1]);

        assert!(first.failed());
        assert!(first.ast().is_none());
        assert!(first.program().is_none());
        assert_eq!(first.diagnostics_for(Stage::Parser).count(), 1);

        assert!(!second.failed());
        assert!(second.diagnostics().is_empty());
        assert_eq!(second.program().map(|program| program.arch()), Some(arch));
    }
}

#[test]
fn lexer_errors_stay_in_their_program() {
    let units = alanc::compile("{ @ }$ {}$ { print(1 # ) }$", Arch::Mos6502);
    assert_eq!(units.len(), 3);

    assert!(units[0].failed());
    assert!(units[0].cst().is_none());
    assert_eq!(units[0].diagnostics_for(Stage::Lexer).count(), 1);

    assert!(!units[1].failed());
    assert!(units[1].program().is_some());

    assert!(units[2].failed());
    assert_eq!(units[2].diagnostics_for(Stage::Lexer).count(), 1);
}

#[test]
fn syntax_errors_stop_before_analysis() {
    let units = alanc::compile("{ print( }$", Arch::Mos6502);
    let unit = &units[0];

    assert!(unit.failed());
    assert!(unit.cst().is_some());
    assert!(unit.ast().is_none());
    assert!(unit.symbols().is_none());
    assert_eq!(unit.diagnostics_for(Stage::Parser).count(), 1);
}

#[test]
fn missing_end_of_program_still_compiles() {
    let units = alanc::compile("{ int a a = 1 print(a) }", Arch::RiscV);
    assert_eq!(units.len(), 1);

    let unit = &units[0];
    assert!(!unit.failed());
    assert!(unit.program().is_some());

    let warnings: Vec<_> = unit.diagnostics().iter().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity(), Severity::Warning);
    assert_eq!(warnings[0].stage(), Stage::Lexer);
}

#[test]
fn diagnostics_are_ordered_by_stage_then_position() {
    let units = alanc::compile("{ b = 1\n a = 2 }", Arch::Mos6502);
    let order: Vec<_> = units[0]
        .diagnostics()
        .iter()
        .map(|diagnostic| (diagnostic.stage(), diagnostic.category(), diagnostic.line()))
        .collect();

    assert_eq!(
        order,
        vec![
            (Stage::Lexer, Category::Warning, 2),
            (Stage::Semantic, Category::Declaration, 1),
            (Stage::Semantic, Category::Declaration, 2),
        ]
    );
}

#[test]
fn tree_leaves_match_program_tokens() {
    let text = "{ int a a = 1 }$ { string s s = \"a b\" while s != \"c\" { print(s) s = \"c\" } }$";

    for unit in alanc::compile(text, Arch::Mos6502) {
        let leaves: Vec<_> = unit.cst().unwrap().terminals().cloned().collect();
        assert_eq!(leaves, unit.tokens());
        assert_eq!(unit.tokens().last().map(|token| *token.val()), Some(Token::Eop));
    }
}

#[test]
fn compilation_is_deterministic() {
    let text = "{ int a boolean b b = a == 2 if b { print(\"yes\") } a = 1 + a }$ { @ }$ { print(5) }";

    for arch in [Arch::Mos6502, Arch::RiscV] {
        let render = || {
            alanc::compile(text, arch)
                .iter()
                .map(|unit| {
                    let program = unit.program().map(ToString::to_string).unwrap_or_default();
                    format!("{}{}", unit.diagnostics(), program)
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(render(), render());
    }
}

#[test]
fn empty_input_has_no_programs() {
    assert!(alanc::compile("", Arch::Mos6502).is_empty());
    assert!(alanc::compile("  /* nothing */ \n", Arch::RiscV).is_empty());
}

#[test]
fn diagnostic_rendering() {
    let units = alanc::compile_named("main.alan", "{ int a a = true print(a) }$", Arch::Mos6502);

    let expected = "\
error [TypeError]: Type mismatch: cannot assign `boolean` to `a`, which is declared as `int`
 --> main.alan:[1:9-1:16]
  |
1 | { int a a = true print(a) }$
  |         ^^^^^^^^

Build failed with 1 error
";

    assert_eq!(units[0].diagnostics().to_string(), expected);
}

#[test]
fn diagnostic_rendering_with_tabs() {
    let units = alanc::compile_named("main.alan", "{\tint a a = true print(a) }$", Arch::Mos6502);

    let expected = "\
error [TypeError]: Type mismatch: cannot assign `boolean` to `a`, which is declared as `int`
 --> main.alan:[1:11-1:18]
  |
1 | {   int a a = true print(a) }$
  |           ^^^^^^^^

Build failed with 1 error
";

    assert_eq!(units[0].diagnostics().to_string(), expected);
}

#[test]
fn architecture_names() {
    assert_eq!(Arch::from_str("6502").unwrap(), Arch::Mos6502);
    assert_eq!(Arch::from_str("6502A").unwrap(), Arch::Mos6502);
    assert_eq!(Arch::from_str("RiscV").unwrap(), Arch::RiscV);
    assert_eq!(Arch::from_str("risc-v").unwrap(), Arch::RiscV);
    assert!(Arch::from_str("x86").is_err());

    assert_eq!(Arch::RiscV.to_string(), "riscv");
}
