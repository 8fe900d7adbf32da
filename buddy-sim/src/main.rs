//! # buddy-sim
//!
//! Scripted command-line driver for the `buddy-core` allocator. Reads
//! operations from a script file (or runs a built-in demo) and narrates
//! each `alloc`/`free` against a freshly constructed [`Arena`].
//!
//! ## Usage
//!
//! ```bash
//! buddy-sim demo
//! buddy-sim run --script ops.txt
//! buddy-sim stats --max-order 4
//! ```

use anyhow::Result;
use buddy_core::Arena;
use clap::Parser;

mod cli;
mod config;
mod driver;
mod script;

use cli::{ArenaArgs, Cli, Command};
use config::ArenaConfig;

fn build_arena(args: &ArenaArgs) -> Result<Arena> {
    let config = ArenaConfig::load()?.with_overrides(
        args.max_order,
        args.page_size,
        args.start_addr,
    );
    let arena = Arena::new(config.max_order, config.page_size, config.start_addr)?;
    log::info!(
        "arena ready: max_order={} page_size={} start_addr=0x{:x}",
        config.max_order,
        config.page_size,
        config.start_addr
    );
    Ok(arena)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Demo { arena } => {
            let mut arena = build_arena(&arena)?;
            driver::run_demo(&mut arena)?;
        }
        Command::Run { script: script_path, arena } => {
            let mut arena = build_arena(&arena)?;
            let text = std::fs::read_to_string(&script_path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", script_path.display()))?;
            let ops = script::parse(&text)?;
            driver::run_script(&mut arena, &ops)?;
        }
        Command::Stats { arena } => {
            let arena = build_arena(&arena)?;
            driver::print_stats(&arena);
        }
    }

    Ok(())
}
