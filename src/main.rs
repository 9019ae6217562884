use clap::Parser;
use env_logger::Env;

use keymatch::cli::SubCommandExtend;
use keymatch::config::{Opts, SubCommand};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Full(config) => config.run(&opts),
        SubCommand::Pair(config) => config.run(&opts),
        SubCommand::Show(config) => config.run(&opts),
    }
}
