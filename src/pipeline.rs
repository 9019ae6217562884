use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Serialize, Serializer};

use crate::descriptor::{DescriptorSource, ImageRecord};
use crate::error::{Error, Result};
use crate::index::{AnyIndex, IndexKind};
use crate::kdtree::{BuildParams, SearchParams};
use crate::matcher::{Correspondence, match_descriptors};
use crate::pairs::{ExclusionSet, window_start};
use crate::sink::PairSink;

pub const DEFAULT_RATIO: f64 = 0.6;
pub const DEFAULT_MIN_MATCHES: usize = 16;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// 比率测试阈值，范围 (0, 1]
    pub ratio: f64,
    /// 图片对至少需要的匹配数量
    pub min_matches: usize,
    /// 窗口半径，None 表示和之前所有图片匹配
    pub window: Option<usize>,
    pub index: IndexKind,
    pub build: BuildParams,
    pub search: SearchParams,
    /// 并行处理的目标图片数量，0 表示使用全部 CPU
    pub jobs: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            min_matches: DEFAULT_MIN_MATCHES,
            window: None,
            index: IndexKind::default(),
            build: BuildParams::default(),
            search: SearchParams::default(),
            jobs: 1,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(Error::Config(format!("比率必须在 (0, 1] 范围内：{}", self.ratio)));
        }
        if !(self.search.eps >= 0.0 && self.search.eps.is_finite()) {
            return Err(Error::Config(format!("eps 必须大于等于 0：{}", self.search.eps)));
        }
        if self.build.leaf_size == 0 {
            return Err(Error::Config("叶子节点大小至少为 1".to_string()));
        }
        Ok(())
    }

    fn workers(&self) -> usize {
        match self.jobs {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

/// 一次完整运行的统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub images: usize,
    /// 没有描述符的图片
    pub inert_images: usize,
    /// 窗口内两端都有描述符的图片对，包括被跳过的
    pub candidate_pairs: usize,
    /// 因为在不连通列表中而跳过的图片对
    pub skipped_pairs: usize,
    pub tested_pairs: usize,
    pub accepted_pairs: usize,
    /// 所有通过阈值的图片对的匹配总数
    pub correspondences: usize,
    #[serde(serialize_with = "as_secs")]
    pub load_time: Duration,
    /// 构建索引和匹配的总耗时，并行时为各线程耗时之和
    #[serde(serialize_with = "as_secs")]
    pub matching_time: Duration,
}

impl RunSummary {
    /// 跳过的图片对占候选图片对的百分比
    pub fn skipped_percent(&self) -> f64 {
        if self.candidate_pairs == 0 {
            return 0.0;
        }
        100.0 * self.skipped_pairs as f64 / self.candidate_pairs as f64
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

enum PairEvent {
    Skipped { query: usize },
    Tested { query: usize, matches: Vec<Correspondence> },
}

/// 加载所有图片的描述符，加载失败的图片视为没有描述符
pub fn load_images<const N: usize, D>(paths: &[String], source: &D) -> Vec<ImageRecord<N>>
where
    D: DescriptorSource<N> + ?Sized,
{
    let total = paths.len();
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let descriptors = source.load(path).unwrap_or_else(|e| {
                warn!("无法读取 '{path}' 的描述符，该图片不参与匹配：{e}");
                vec![]
            });
            info!("从 '{path}' 读取了 {} 个描述符 ({} / {total})", descriptors.len(), i + 1);
            ImageRecord::new(path.clone(), descriptors)
        })
        .collect()
}

/// 对图片列表中的图片两两匹配
///
/// 每张图片依次作为目标图片 i 建立索引，窗口内在它之前的图片 j 作为查询，
/// 匹配数量达到阈值的图片对以 (j, i) 的形式输出。
pub struct PairwiseMatcher {
    config: MatchConfig,
    progress: ProgressBar,
}

impl PairwiseMatcher {
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, progress: ProgressBar::hidden() })
    }

    /// 每处理完一张目标图片前进一格
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// 加载描述符后运行，并记录加载耗时
    pub fn run_files<const N: usize, D, S>(
        &self,
        paths: &[String],
        source: &D,
        exclusions: &ExclusionSet,
        sink: &mut S,
    ) -> Result<RunSummary>
    where
        D: DescriptorSource<N> + ?Sized,
        S: PairSink + ?Sized,
    {
        let start = Instant::now();
        let images = load_images::<N, D>(paths, source);
        let load_time = start.elapsed();
        info!("读取描述符耗时 {:.3}s", load_time.as_secs_f64());

        let mut summary = self.run(&images, exclusions, sink)?;
        summary.load_time = load_time;
        Ok(summary)
    }

    pub fn run<const N: usize, S>(
        &self,
        images: &[ImageRecord<N>],
        exclusions: &ExclusionSet,
        sink: &mut S,
    ) -> Result<RunSummary>
    where
        S: PairSink + ?Sized,
    {
        let targets = (0..images.len()).filter(|&i| !images[i].is_inert()).collect::<Vec<_>>();
        let mut summary = RunSummary {
            images: images.len(),
            inert_images: images.len() - targets.len(),
            ..Default::default()
        };
        self.progress.set_length(targets.len() as u64);

        let workers = self.config.workers();
        if workers <= 1 {
            for &target in &targets {
                info!("匹配第 {target} 张图片 '{}'", images[target].path);
                let elapsed = self.match_target(images, target, exclusions, |event| {
                    self.record(&mut summary, target, event, sink)
                })?;
                info!("匹配耗时 {:.3}s", elapsed.as_secs_f64());
                summary.matching_time += elapsed;
                self.progress.inc(1);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
            // 按块并行处理，每块结束后按目标图片顺序输出，结果与串行一致
            for chunk in targets.chunks(workers * 4) {
                let results = pool.install(|| {
                    chunk
                        .par_iter()
                        .map(|&target| {
                            let mut events = vec![];
                            let elapsed = self.match_target(images, target, exclusions, |event| {
                                events.push(event);
                                Ok(())
                            })?;
                            Ok((events, elapsed))
                        })
                        .collect::<Vec<Result<_>>>()
                });
                for (&target, result) in chunk.iter().zip(results) {
                    let (events, elapsed) = result?;
                    for event in events {
                        self.record(&mut summary, target, event, sink)?;
                    }
                    debug!(
                        "第 {target} 张图片 '{}' 匹配耗时 {:.3}s",
                        images[target].path,
                        elapsed.as_secs_f64()
                    );
                    summary.matching_time += elapsed;
                    self.progress.inc(1);
                }
            }
        }

        Ok(summary)
    }

    /// 为目标图片建立索引，并和窗口内之前的图片逐一匹配
    ///
    /// 索引只在这一轮中存在
    fn match_target<const N: usize>(
        &self,
        images: &[ImageRecord<N>],
        target: usize,
        exclusions: &ExclusionSet,
        mut on_event: impl FnMut(PairEvent) -> Result<()>,
    ) -> Result<Duration> {
        let start = Instant::now();
        let config = &self.config;
        let index =
            AnyIndex::build(config.index, &images[target].descriptors, config.build, config.search)?;

        for query in window_start(target, config.window)..target {
            let image = &images[query];
            if image.is_inert() {
                continue;
            }
            if exclusions.contains(query, target) {
                on_event(PairEvent::Skipped { query })?;
                continue;
            }
            let matches = match_descriptors(&image.descriptors, &index, config.ratio);
            on_event(PairEvent::Tested { query, matches })?;
        }

        Ok(start.elapsed())
    }

    fn record<S: PairSink + ?Sized>(
        &self,
        summary: &mut RunSummary,
        target: usize,
        event: PairEvent,
        sink: &mut S,
    ) -> Result<()> {
        summary.candidate_pairs += 1;
        match event {
            PairEvent::Skipped { query } => {
                info!("跳过不连通的图片对 ({query}, {target})");
                summary.skipped_pairs += 1;
            }
            PairEvent::Tested { query, matches } => {
                summary.tested_pairs += 1;
                let accepted = matches.len() >= self.config.min_matches;
                debug!(
                    "图片对 ({query}, {target})：{} 个匹配{}",
                    matches.len(),
                    if accepted { "" } else { "，低于阈值" }
                );
                if accepted {
                    sink.emit_pair(query, target, &matches)?;
                    summary.accepted_pairs += 1;
                    summary.correspondences += matches.len();
                }
            }
        }
        Ok(())
    }
}
