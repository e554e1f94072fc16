use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use qcc_lsp::QccLs;
use qcc_lsp::cli::{CommonArgs, run_check, run_doctor};
use tokio::io::{stdin, stdout};
use tower_lsp_server::{LspService, Server};

/// Language server and command-line checker for Basilisk C
#[derive(Parser)]
#[command(name = "qcc-lsp")]
#[command(version)]
#[command(about = "Language server and command-line checker for Basilisk C")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the language server on stdio (the default)
    Serve,
    /// Print diagnostics for one file
    Check {
        /// The file to check
        file: PathBuf,

        #[command(flatten)]
        args: CommonArgs,
    },
    /// Report which diagnostic tools are reachable
    Doctor {
        #[command(flatten)]
        args: CommonArgs,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "qcc_lsp=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

async fn check(file: PathBuf, args: CommonArgs) -> i32 {
    match run_check(&file, &args).await {
        Ok(outcome) => match outcome.render(args.json) {
            Ok(rendered) => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(rendered.as_bytes());
                let _ = out.flush();
                outcome.exit_code()
            }
            Err(e) => {
                eprintln!("{}", e);
                e.exit_code()
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

async fn doctor(args: CommonArgs) -> i32 {
    match run_doctor(&args).await {
        Ok(report) => {
            println!("{}", report);
            report.exit_code()
        }
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check { file, args }) => {
            init_logging(args.verbose);
            let code = check(file, args).await;
            std::process::exit(code);
        }
        Some(Commands::Doctor { args }) => {
            init_logging(args.verbose);
            let code = doctor(args).await;
            std::process::exit(code);
        }
        Some(Commands::Serve) | None => {
            init_logging(false);
            log::info!(target: "qcc_lsp::lsp", "Starting qcc-lsp {}", env!("CARGO_PKG_VERSION"));

            let (service, socket) = LspService::new(QccLs::new);
            Server::new(stdin(), stdout(), socket).serve(service).await;
        }
    }
}
