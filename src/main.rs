use clap::{Parser as ClapParser, Subcommand};
use safe_expr::cli::{
    self, CheckOptions, CheckResult, CliError, EvalOptions, OutputFormat,
};
use std::io::{self, BufRead};

#[derive(ClapParser)]
#[command(name = "safe-expr")]
#[command(about = "safe-expr - Evaluate restricted Python-style expressions without running arbitrary code")]
#[command(version)]
struct Cli {
    /// Log evaluation details to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and print the result
    Eval {
        /// The expression (evaluates each stdin line if omitted)
        expression: Option<String>,

        /// Print the result as JSON
        #[arg(short, long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Report whether an expression uses only supported constructs
    Check {
        /// The expression to check
        expression: String,
    },

    /// List the functions expressions may call
    Functions,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Eval {
            expression,
            json,
            pretty,
        } => run_eval(expression, json, pretty),
        Commands::Check { expression } => run_check(expression),
        Commands::Functions => {
            print!("{}", cli::get_functions_overview());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG wins over -v
    let default = match verbose {
        0 => "warn",
        1 => "safe_expr=debug",
        _ => "safe_expr=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_eval(expression: Option<String>, json: bool, pretty: bool) -> Result<(), CliError> {
    let format = match (json, pretty) {
        (_, true) => OutputFormat::JsonPretty,
        (true, false) => OutputFormat::Json,
        (false, false) => OutputFormat::Display,
    };

    let expressions = match expression {
        Some(expression) => vec![expression],
        None if !atty::is(atty::Stream::Stdin) => io::stdin()
            .lock()
            .lines()
            .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .collect::<Result<Vec<_>, _>>()?,
        None => return Err(CliError::NoInput),
    };

    for expression in expressions {
        let options = EvalOptions { expression, format };
        println!("{}", cli::execute_eval(&options)?);
    }
    Ok(())
}

fn run_check(expression: String) -> Result<(), CliError> {
    match cli::execute_check(&CheckOptions { expression })? {
        CheckResult::Supported => println!("Expression is supported"),
        CheckResult::Unsupported(kind) => {
            println!("Unsupported construct: {}", kind);
            std::process::exit(1);
        }
    }
    Ok(())
}
