//! Orquestación de fases.
//!
//! Un mismo texto puede contener varios programas, cada uno terminado
//! por `$`. El texto completo se somete a análisis léxico una sola vez
//! y luego se divide en unidades de compilación independientes. Cada
//! unidad recorre las fases restantes en orden y se detiene en cuanto
//! una fase reporta errores, conservando lo que ya había producido.

use crate::{
    arch::Arch,
    ast::Ast,
    codegen::{self, Program},
    error::{Diagnostic, Diagnostics, Stage},
    lex::{self, Token},
    parse::{self, Cst},
    semantic::{self, SymbolTable},
    source::{Located, Source},
};

use log::{debug, info};

/// Un programa delimitado por `$` junto a todo lo que produjo.
pub struct Unit {
    number: usize,
    tokens: Vec<Located<Token>>,
    diagnostics: Diagnostics,
    cst: Option<Cst>,
    ast: Option<Ast>,
    symbols: Option<SymbolTable>,
    program: Option<Program>,
}

impl Unit {
    /// Número de programa, comenzando en 1.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn tokens(&self) -> &[Located<Token>] {
        &self.tokens
    }

    /// Diagnósticos ordenados por fase y luego por posición.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Diagnósticos de una única fase.
    pub fn diagnostics_for(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.stage(stage)
    }

    pub fn cst(&self) -> Option<&Cst> {
        self.cst.as_ref()
    }

    pub fn ast(&self) -> Option<&Ast> {
        self.ast.as_ref()
    }

    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    /// Programa generado. Solo existe si la unidad no tiene errores.
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn failed(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Compila todos los programas en `text`.
pub fn compile(text: &str, arch: Arch) -> Vec<Unit> {
    compile_named("<input>", text, arch)
}

/// Igual que [`compile()`], con un nombre de origen para diagnósticos.
pub fn compile_named(name: &str, text: &str, arch: Arch) -> Vec<Unit> {
    let source = Source::new(name, text);
    let (tokens, lexer_diagnostics) = lex::tokenize(&source);

    debug!(
        "Lexed {} tokens with {} diagnostics from {}",
        tokens.len(),
        lexer_diagnostics.len(),
        name
    );

    let groups = split_programs(tokens);
    let mut lexer_diagnostics = assign_diagnostics(&groups, lexer_diagnostics);

    groups
        .into_iter()
        .zip(lexer_diagnostics.drain(..))
        .enumerate()
        .map(|(index, (tokens, diagnostics))| run_unit(index + 1, tokens, diagnostics, arch))
        .collect()
}

/// Divide la secuencia de tokens después de cada `$`.
///
/// El [`Token::Eof`] final no pertenece a ningún programa.
fn split_programs(tokens: Vec<Located<Token>>) -> Vec<Vec<Located<Token>>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token.val() {
            Token::Eof => break,
            Token::Eop => {
                current.push(token);
                groups.push(std::mem::take(&mut current));
            }

            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// Reparte diagnósticos léxicos a la unidad cuyo `$` los cubre.
fn assign_diagnostics(
    groups: &[Vec<Located<Token>>],
    diagnostics: Vec<Diagnostic>,
) -> Vec<Vec<Diagnostic>> {
    let mut assigned = vec![Vec::new(); groups.len()];
    if groups.is_empty() {
        return assigned;
    }

    let ends: Vec<_> = groups
        .iter()
        .map(|group| group.last().map(|token| token.location().end()))
        .collect();

    for diagnostic in diagnostics {
        let start = diagnostic.location().start();
        let index = ends
            .iter()
            .position(|end| end.map_or(false, |end| start < end))
            .unwrap_or(groups.len() - 1);

        assigned[index].push(diagnostic);
    }

    assigned
}

fn run_unit(
    number: usize,
    tokens: Vec<Located<Token>>,
    lexer_diagnostics: Vec<Diagnostic>,
    arch: Arch,
) -> Unit {
    info!("Compiling program {}", number);

    let mut unit = Unit {
        number,
        tokens,
        diagnostics: Diagnostics::from(lexer_diagnostics),
        cst: None,
        ast: None,
        symbols: None,
        program: None,
    };

    report_stage(&unit, Stage::Lexer);
    if !unit.failed() {
        let (cst, diagnostics) = parse::parse(&unit.tokens);
        unit.diagnostics.extend(diagnostics);
        unit.cst = Some(cst);

        report_stage(&unit, Stage::Parser);
    }

    if let (Some(cst), false) = (&unit.cst, unit.failed()) {
        let (ast, symbols, diagnostics) = semantic::analyze(cst);
        unit.diagnostics.extend(diagnostics);
        unit.ast = Some(ast);
        unit.symbols = Some(symbols);

        report_stage(&unit, Stage::Semantic);
    }

    if let (Some(ast), Some(symbols), false) = (&unit.ast, &unit.symbols, unit.failed()) {
        match codegen::generate(ast, symbols, arch) {
            Ok(program) => unit.program = Some(program),
            Err(error) => unit.diagnostics.extend(Some(Diagnostic::from(error))),
        }

        report_stage(&unit, Stage::Codegen);
    }

    unit.diagnostics.sort();

    if unit.failed() {
        info!("Program {} failed with {} errors", number, unit.diagnostics.errors());
    } else {
        info!("Program {} compiled with {} warnings", number, unit.diagnostics.warnings());
    }

    unit
}

fn report_stage(unit: &Unit, stage: Stage) {
    let (errors, warnings) = unit
        .diagnostics_for(stage)
        .fold((0, 0), |(errors, warnings), diagnostic| {
            if diagnostic.is_error() {
                (errors + 1, warnings)
            } else {
                (errors, warnings + 1)
            }
        });

    info!(
        "Program {}: {} stage finished with {} errors and {} warnings",
        unit.number, stage, errors, warnings
    );
}
