pub mod cli;
pub mod config;
pub mod descriptor;
pub mod distance;
mod error;
pub mod image_list;
pub mod index;
pub mod kdtree;
pub mod matcher;
pub mod pairs;
pub mod pipeline;
pub mod sink;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
pub use pipeline::{MatchConfig, PairwiseMatcher, RunSummary};
