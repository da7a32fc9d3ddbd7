//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use clap::{crate_version, Arg, Command};
use tinycxx::{codegen::LowerOptions, compile, lex::Lexer, source, Options, DEFAULT_MAX_DEPTH};
use tracing::{info, Level};

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let default_depth = DEFAULT_MAX_DEPTH.to_string();
    let args = Command::new("tinycxx")
        .version(crate_version!())
        .about("Compiles a C++ subset to x86-64 assembly")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("INPUT")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file ('-' or absent for stdout)"),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .takes_value(true)
                .value_name("N")
                .default_value(&default_depth)
                .help("Maximum nesting depth"),
        )
        .arg(
            Arg::new("eager-logic")
                .long("eager-logic")
                .help("Evaluate both operands of && and || before combining them"),
        )
        .arg(
            Arg::new("no-comments")
                .long("no-comments")
                .help("Do not emit comments in the assembly listing"),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Dump the syntax tree to stderr"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Raise log verbosity (repeatable)"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").context("No input file")?;
    let max_depth = args.value_of("max-depth").unwrap_or(default_depth.as_str());

    let mut options = Options {
        max_depth: max_depth
            .parse()
            .with_context(|| format!("Bad nesting depth: {}", max_depth))?,
        ..Options::default()
    };

    if args.is_present("eager-logic") {
        options.lowering |= LowerOptions::EAGER_LOGIC;
    }

    if args.is_present("no-comments") {
        options.lowering.remove(LowerOptions::COMMENTS);
    }

    let name = if input == "-" { "<stdin>" } else { input };
    let reader: Box<dyn BufRead> = match input {
        "-" => Box::new(BufReader::new(io::stdin())),
        path => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open for reading: {}", path))?;

            Box::new(BufReader::new(file))
        }
    };

    info!(input = name, ?options, "compiling");

    let (source, stream) = source::consume(reader, name);
    let compilation = compile(Lexer::new(stream), &options);

    if args.is_present("ast") {
        eprintln!("{:#?}", compilation.ast);
    }

    let assembly = match compilation.into_result() {
        Ok(assembly) => assembly,
        Err(diagnostics) => {
            eprint!("{}", diagnostics.with_source(source));
            bail!("Failed to compile {}", name);
        }
    };

    match args.value_of("output") {
        // Salida a stdout
        None | Some("-") => {
            let stdout = io::stdout();
            assembly
                .write_to(&mut stdout.lock())
                .context("Failed to emit to stdout")?;
        }

        // Salida a archivo
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            assembly
                .write_to(&mut file)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }
    }

    info!(lines = assembly.lines().len(), "done");
    Ok(())
}
