//
// main.rs
//
// Command-line entry point: language server or one-shot commands
//

use std::env;
use std::path::PathBuf;

use magnet::{backend, cli};

fn print_usage() {
    println!(
        "magnet {}, a definition index and language server for Magma scripts.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: magnet [OPTIONS]
       magnet <COMMAND> <FILE>

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Commands:

symbols <file>               Print the definitions, dependencies and diagnostics of a file as JSON
expand <file>                Print a file with every load and @require inlined
analysis-stats <path>        Time discovery, scanning and resolution over a directory
    [--csv] [--only <phase>]

"#
    );
}

fn file_argument(command: &str, argv: &mut impl Iterator<Item = String>) -> anyhow::Result<PathBuf> {
    argv.next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("'{command}' requires a file argument"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("magnet {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            "symbols" => {
                env_logger::init();
                let path = file_argument("symbols", &mut argv)?;
                println!("{}", cli::symbols(&path)?);
                return Ok(());
            }
            "expand" => {
                env_logger::init();
                let path = file_argument("expand", &mut argv)?;
                print!("{}", cli::expand(&path)?);
                return Ok(());
            }
            "analysis-stats" => {
                env_logger::init();
                let args = cli::analysis_stats::parse_args(&mut argv).map_err(|e| anyhow::anyhow!(e))?;
                let results = cli::analysis_stats::run_analysis_stats(&args).await;
                if args.csv {
                    cli::analysis_stats::print_results_csv(&results);
                } else {
                    cli::analysis_stats::print_results(&results);
                }
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    backend::start_lsp().await
}
