use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::index::IndexKind;
use crate::kdtree::{BuildParams, SearchParams};
use crate::pipeline::DEFAULT_RATIO;

#[derive(Parser, Debug, Clone)]
pub struct RatioOptions {
    /// 比率测试阈值，最近邻距离小于等于次近邻距离的 RATIO 倍时才接受匹配
    #[arg(short, long, value_name = "RATIO", default_value_t = DEFAULT_RATIO, value_parser = parse_ratio)]
    pub ratio: f64,
}

#[derive(Parser, Debug, Clone)]
pub struct IndexOptions {
    /// 最近邻索引类型
    #[arg(long, value_enum, default_value_t = IndexKind::KdTree)]
    pub index: IndexKind,
    /// 近似搜索误差因子，返回的距离不超过真实距离的 (1 + EPS) 倍，0 表示精确搜索
    #[arg(long, value_name = "EPS", default_value_t = 0.0)]
    pub eps: f32,
    /// 每次查询最多扫描的叶子数量，0 表示不限制
    ///
    /// 设置后搜索结果为近似值，且没有误差保证
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub max_leaves: usize,
    /// k-d 树叶子节点最多包含的描述符数量
    #[arg(long, value_name = "SIZE", default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    pub leaf_size: u32,
}

impl From<&IndexOptions> for BuildParams {
    fn from(opts: &IndexOptions) -> Self {
        Self { leaf_size: opts.leaf_size as usize }
    }
}

impl From<&IndexOptions> for SearchParams {
    fn from(opts: &IndexOptions) -> Self {
        Self { eps: opts.eps, max_leaves: opts.max_leaves }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "keymatch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 不显示进度条
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 匹配图片列表中的所有图片对
    Full(FullCommand),
    /// 匹配两个描述符文件
    Pair(PairCommand),
    /// 显示描述符文件的信息
    Show(ShowCommand),
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|_| format!("无效的比率: {}", s))?;
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(ratio)
    } else {
        Err(format!("比率必须在 (0, 1] 范围内: {}", s))
    }
}
