use qel::{run_qel, Opts, QelResult};
use std::io::Write;
use termcolor::{BufferedStandardStream, ColorChoice, WriteColor};

fn get_opts(color: bool) -> Opts {
    let matches = clap::App::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .author(clap::crate_authors!())
        .arg(
            clap::Arg::with_name("program")
                .help("Program to evaluate")
                .required(true),
        )
        .arg(
            clap::Arg::with_name("output-form")
                .short("-o")
                .long("--output-form")
                .next_line_help(true)
                .help(
                    "Qel emit format. Possible values:\n\
                    \tpretty:       Human-readable text, like \"1 + 2\".\n\
                    \ts-expression: Prefixed s-expression, like \"(+ 1 2)\".\n\
                    \tdebug:        Opaque internal representation. Note: this format is not stable.\n\
                    ",
                )
                .hide_possible_values(true)
                .default_value("pretty")
                .takes_value(true)
                .possible_values(&["pretty", "s-expression", "debug"]),
        )
        .arg(
            clap::Arg::with_name("simplify")
                .long("--simplify")
                .value_name("rulesets")
                .next_line_help(true)
                .help(
                    "Simplify the program with the given rule sets instead of evaluating it.\n\
                    A comma-separated list of names, e.g. \"all\" or \"basic, collectnumbers\";\n\
                    a leading \"!\" subtracts a named set or turns a display flag off.\n\
                    ",
                )
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("parse-only")
                .long("--parse-only")
                .help("Stop after parsing and dump the syntax tree"),
        )
        .get_matches();

    Opts {
        program: matches.value_of("program").unwrap().into(),
        emit_format: matches.value_of("output-form").unwrap().into(),
        simplify: matches.value_of("simplify").map(str::to_owned),
        parse_only: matches.is_present("parse-only"),
        color,
    }
}

fn main_impl() -> Result<(), Box<dyn std::error::Error>> {
    let mut ch_stdout = BufferedStandardStream::stdout(ColorChoice::Auto);
    let mut ch_stderr = BufferedStandardStream::stderr(ColorChoice::Auto);
    let is_tty = atty::is(atty::Stream::Stderr);
    let use_color = is_tty && ch_stderr.supports_color();

    let opts = get_opts(use_color);
    let QelResult {
        code,
        stdout,
        stderr,
    } = run_qel(opts);

    if !stderr.is_empty() {
        writeln!(&mut ch_stderr, "{}", stderr)?;
        ch_stderr.flush()?;
    }
    if !stdout.is_empty() {
        writeln!(&mut ch_stdout, "{}", stdout)?;
        ch_stdout.flush()?;
    }

    std::process::exit(code)
}

fn main() {
    let out = std::panic::catch_unwind(main_impl);

    if let Err(..) = out {
        eprint!("\nnote: you found an internal qel error (IQE; it's like an ICE, but for qel)!\n");
        std::process::exit(2);
    }
}
