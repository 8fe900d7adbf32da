use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "buddy-sim", about = "Scripted driver for the buddy-core allocator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand that constructs an [`Arena`](buddy_core::Arena).
/// `None` means "use `buddy.toml`, or the built-in default if that's absent too".
#[derive(Args)]
pub struct ArenaArgs {
    /// Largest order the arena can serve; default 10.
    #[arg(long)]
    pub max_order: Option<i32>,
    /// Size of an order-0 block in bytes; default 4096.
    #[arg(long)]
    pub page_size: Option<u64>,
    /// Base address of the managed range; default 0.
    #[arg(long)]
    pub start_addr: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the built-in illustrative script.
    Demo {
        #[command(flatten)]
        arena: ArenaArgs,
    },
    /// Run a script file of `alloc`/`free`/`stats` operations.
    Run {
        /// Path to the script file.
        #[arg(long)]
        script: PathBuf,
        #[command(flatten)]
        arena: ArenaArgs,
    },
    /// Construct an arena and immediately print its (empty) stats table.
    Stats {
        #[command(flatten)]
        arena: ArenaArgs,
    },
}
