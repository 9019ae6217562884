use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{IndexOptions, Opts, RatioOptions};
use crate::descriptor::{DESCRIPTOR_DIM, FileSource};
use crate::image_list::read_image_list;
use crate::pairs::{ExclusionSet, read_exclusions};
use crate::pipeline::{DEFAULT_MIN_MATCHES, MatchConfig, PairwiseMatcher, RunSummary};
use crate::sink::MatchFileWriter;
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct FullCommand {
    /// 图片列表，每行一个描述符文件路径
    #[arg(short = 'i', long = "input", value_name = "LIST")]
    pub list: PathBuf,
    /// 匹配结果输出文件
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
    /// 不连通图片列表，图片编号从 1 开始，列表中的图片对不进行匹配
    #[arg(short = 'n', long = "exclude", value_name = "FILE")]
    pub exclude: Option<PathBuf>,
    #[command(flatten)]
    pub ratio: RatioOptions,
    /// 图片对至少需要的匹配数量
    #[arg(short = 't', long, value_name = "N", default_value_t = DEFAULT_MIN_MATCHES)]
    pub min_matches: usize,
    /// 窗口半径，每张图片只和之前 W 张图片匹配，小于等于 0 表示不限制
    #[arg(short, long, value_name = "W", allow_negative_numbers = true)]
    pub window: Option<i64>,
    #[command(flatten)]
    pub index: IndexOptions,
    /// 并行处理的图片数量，0 表示使用全部 CPU
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,
    /// 汇总信息的输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub summary: OutputFormat,
}

impl FullCommand {
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            ratio: self.ratio.ratio,
            min_matches: self.min_matches,
            window: self.window.filter(|&w| w > 0).map(|w| w as usize),
            index: self.index.index,
            build: (&self.index).into(),
            search: (&self.index).into(),
            jobs: self.jobs,
        }
    }
}

impl SubCommandExtend for FullCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let matcher = PairwiseMatcher::new(self.match_config())?;

        let exclusions = match &self.exclude {
            Some(path) => read_exclusions(path)?,
            None => ExclusionSet::new(),
        };
        let paths = read_image_list(&self.list)?;
        info!("图片列表 '{}' 中共有 {} 张图片", self.list.display(), paths.len());

        let mut writer = MatchFileWriter::create(&self.output)?;

        let pb = utils::progress_bar(paths.len() as u64, opts.no_progress);
        let matcher = matcher.with_progress(pb.clone());
        let summary =
            matcher.run_files::<DESCRIPTOR_DIM, _, _>(&paths, &FileSource, &exclusions, &mut writer)?;
        writer.finish()?;
        pb.finish_and_clear();

        info!("匹配结果已写入 '{}'", self.output.display());
        print_summary(&summary, self)
    }
}

fn print_summary(summary: &RunSummary, opts: &FullCommand) -> Result<()> {
    match opts.summary {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?)
        }
        OutputFormat::Table => {
            println!("images\t{}", summary.images);
            println!("inert images\t{}", summary.inert_images);
            println!("candidate pairs\t{}", summary.candidate_pairs);
            if opts.exclude.is_some() {
                println!(
                    "skipped pairs\t{} ({:.2}%)",
                    summary.skipped_pairs,
                    summary.skipped_percent()
                );
            }
            println!("tested pairs\t{}", summary.tested_pairs);
            println!("accepted pairs\t{}", summary.accepted_pairs);
            println!("correspondences\t{}", summary.correspondences);
            println!("load time\t{:.2}s", summary.load_time.as_secs_f64());
            println!("matching time\t{:.2}s", summary.matching_time.as_secs_f64());
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
