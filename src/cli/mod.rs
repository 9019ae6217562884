mod full;
mod pair;
mod show;

pub use full::*;
pub use pair::*;
pub use show::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
