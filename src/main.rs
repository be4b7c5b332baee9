//! Punto de entrada.
//!
//! Este módulo expone una CLI sobre [`alanc::compile_named()`] y
//! decide a dónde se escribe cada uno de los productos de compilación.

use alanc::{target::Arch, Unit};
use anyhow::{self, bail, Context};
use bitflags::bitflags;
use clap::{self, crate_version, Arg, Command};

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    str::FromStr,
};

bitflags! {
    /// Representaciones intermedias que se muestran en stdout.
    struct Dump: u8 {
        const TOKENS  = 1 << 0;
        const CST     = 1 << 1;
        const AST     = 1 << 2;
        const SYMBOLS = 1 << 3;
    }
}

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("alanc")
        .version(crate_version!())
        .about("Compiler for the Alan language")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .default_value("-")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("ARCH")
                .takes_value(true)
                .default_value("6502")
                .help("Target architecture: 6502 or riscv"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .takes_value(true)
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump")
                .short('d')
                .long("dump")
                .value_name("STAGE")
                .takes_value(true)
                .multiple_occurrences(true)
                .use_value_delimiter(true)
                .possible_values(["tokens", "cst", "ast", "symbols"])
                .help("Print intermediate representations to stdout"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase log verbosity"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Se extraen argumentos necesarios
    let target = args.value_of("target").unwrap_or("6502");
    let arch = Arch::from_str(target)?;
    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("-");

    let mut dump = Dump::empty();
    for stage in args.values_of("dump").into_iter().flatten() {
        dump |= match stage {
            "tokens" => Dump::TOKENS,
            "cst" => Dump::CST,
            "ast" => Dump::AST,
            "symbols" => Dump::SYMBOLS,
            other => bail!("Unknown dump stage: {}", other),
        };
    }

    let (name, text) = match input {
        "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;

            ("<stdin>", text)
        }

        path => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file: {}", path))?;

            (path, text)
        }
    };

    let units = alanc::compile_named(name, &text, arch);
    if units.is_empty() {
        bail!("No programs found in {}", name);
    }

    let mut sink: Box<dyn Write> = match output {
        "-" => Box::new(io::stdout()),
        path => Box::new(
            File::create(path).with_context(|| format!("Failed to open for writing: {}", path))?,
        ),
    };

    let stdout = io::stdout();
    for unit in &units {
        eprintln!("Program {}", unit.number());
        eprint!("{}", unit.diagnostics());

        dump_unit(unit, dump, &mut stdout.lock()).context("Failed to write to stdout")?;

        if let Some(program) = unit.program() {
            writeln!(sink, "; program {}", unit.number())
                .and_then(|()| write!(sink, "{}", program))
                .with_context(|| format!("Failed to emit program to {}", output))?;
        }
    }

    sink.flush()
        .with_context(|| format!("Failed to emit program to {}", output))?;

    let failed = units.iter().filter(|unit| unit.failed()).count();
    if failed > 0 {
        bail!("{} of {} programs failed to compile", failed, units.len());
    }

    Ok(())
}

fn dump_unit(unit: &Unit, dump: Dump, out: &mut dyn Write) -> io::Result<()> {
    if dump.contains(Dump::TOKENS) {
        writeln!(out, "Tokens for program {}", unit.number())?;
        for token in unit.tokens() {
            writeln!(out, "{:>8}  {}", token.location().start(), token.val())?;
        }
    }

    if let (true, Some(cst)) = (dump.contains(Dump::CST), unit.cst()) {
        writeln!(out, "CST for program {}", unit.number())?;
        write!(out, "{}", cst)?;
    }

    if let (true, Some(ast)) = (dump.contains(Dump::AST), unit.ast()) {
        writeln!(out, "AST for program {}", unit.number())?;
        write!(out, "{}", ast)?;
    }

    if let (true, Some(symbols)) = (dump.contains(Dump::SYMBOLS), unit.symbols()) {
        writeln!(out, "Symbol table for program {}", unit.number())?;
        write!(out, "{}", symbols)?;
    }

    Ok(())
}
