use clap::Parser;
use clap_verbosity_flag::Verbosity;
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod io;
mod utils;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Compile Cranelift IR in-process and run it against the host runtime", long_about = None)]
struct Args {
    #[command(flatten)]
    verbose: Verbosity,

    /// Config file to use instead of the nearest quill.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Compile, relocate and call an entry routine
    Run {
        /// CLIF source file
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Routine to call (defaults to [run].entry, then "main")
        #[arg(short, long, value_name = "NAME")]
        entry: Option<String>,
        /// Don't expose the host API to the compiled code
        #[arg(long)]
        no_api: bool,
        /// Arguments passed to the routine; numbers are passed as numbers
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Compile a source file and report diagnostics
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the addresses of relocated symbols
    Symbols {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Symbols to look up
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
        /// Don't expose the host API to the compiled code
        #[arg(long)]
        no_api: bool,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match args.command {
        Command::Run {
            file,
            entry,
            no_api,
            args: routine_args,
        } => commands::run::handle_run(&file, args.config.as_deref(), entry, no_api, &routine_args)?,
        Command::Check { file } => commands::check::handle_check(&file, args.config.as_deref())?,
        Command::Symbols { file, names, no_api } => {
            commands::symbols::handle_symbols(&file, args.config.as_deref(), &names, no_api)?
        }
    }
    Ok(())
}
