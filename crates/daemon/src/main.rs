use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::{Cat, Init, Ls, Mkdir, Put, Rm, Stats, Version};

crate::command_enum! {
    (Init, Init),
    (Put, Put),
    (Cat, Cat),
    (Rm, Rm),
    (Ls, Ls),
    (Mkdir, Mkdir),
    (Stats, Stats),
    (Version, Version),
}

/// Tiered virtual disk
#[derive(Parser, Debug)]
#[command(name = "tierfs", version, about)]
struct Cli {
    /// tierfs directory (default: ~/.tierfs)
    #[arg(long, global = true, env = "TIERFS_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `common=trace` (default: RUST_LOG, then info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Op for Cli {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tierfs_daemon::logging::init(cli.log_level.as_deref());

    let ctx = OpContext::new(cli.config_path.clone());
    match cli.execute(&ctx) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let err = anyhow::Error::new(err);
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
