use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{IndexOptions, Opts, RatioOptions};
use crate::descriptor::{DESCRIPTOR_DIM, read_descriptors};
use crate::index::AnyIndex;
use crate::matcher::match_descriptors;
use crate::pipeline::MatchConfig;
use crate::sink::{MatchFileWriter, PairSink};

#[derive(Parser, Debug, Clone)]
pub struct PairCommand {
    #[command(flatten)]
    pub ratio: RatioOptions,
    #[command(flatten)]
    pub index: IndexOptions,
    /// 查询图片的描述符文件
    pub query: PathBuf,
    /// 目标图片的描述符文件，在它上面建立索引
    pub target: PathBuf,
    /// 输出到文件，不指定时输出到标准输出
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl SubCommandExtend for PairCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let config = MatchConfig {
            ratio: self.ratio.ratio,
            index: self.index.index,
            build: (&self.index).into(),
            search: (&self.index).into(),
            ..Default::default()
        };
        config.validate()?;

        let query = read_descriptors::<DESCRIPTOR_DIM>(&self.query)?;
        let target = read_descriptors::<DESCRIPTOR_DIM>(&self.target)?;
        if target.is_empty() {
            bail!("目标图片 '{}' 没有描述符", self.target.display());
        }

        let index = AnyIndex::build(config.index, &target, config.build, config.search)?;
        let matches = match_descriptors(&query, &index, config.ratio);
        info!("{} 个查询描述符中有 {} 个通过比率测试", query.len(), matches.len());

        let writer: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("无法创建 '{}'", path.display()))?,
            )),
            None => Box::new(io::stdout().lock()),
        };
        let mut writer = MatchFileWriter::new(writer);
        writer.emit_pair(0, 1, &matches)?;
        writer.finish()?;
        Ok(())
    }
}
