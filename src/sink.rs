use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::matcher::Correspondence;

/// 接收通过阈值的图片对
pub trait PairSink {
    /// `query_image < target_image`，匹配中的 query 是 query_image 中的位置，target 同理
    fn emit_pair(
        &mut self,
        query_image: usize,
        target_image: usize,
        matches: &[Correspondence],
    ) -> Result<()>;
}

/// 一对图片及其匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairMatches {
    pub query_image: usize,
    pub target_image: usize,
    pub matches: Vec<Correspondence>,
}

impl PairSink for Vec<PairMatches> {
    fn emit_pair(
        &mut self,
        query_image: usize,
        target_image: usize,
        matches: &[Correspondence],
    ) -> Result<()> {
        self.push(PairMatches { query_image, target_image, matches: matches.to_vec() });
        Ok(())
    }
}

/// 以文本格式写出匹配结果，每对图片为：
///
/// ```text
/// <j> <i>
/// <匹配数量>
/// <query_0> <target_0>
/// ...
/// ```
pub struct MatchFileWriter<W: Write> {
    writer: W,
}

impl MatchFileWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> MatchFileWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 刷新缓冲区并取回内部的 writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> PairSink for MatchFileWriter<W> {
    fn emit_pair(
        &mut self,
        query_image: usize,
        target_image: usize,
        matches: &[Correspondence],
    ) -> Result<()> {
        writeln!(self.writer, "{query_image} {target_image}")?;
        writeln!(self.writer, "{}", matches.len())?;
        for m in matches {
            writeln!(self.writer, "{} {}", m.query, m.target)?;
        }
        Ok(())
    }
}

pub fn read_match_file(path: impl AsRef<Path>) -> Result<Vec<PairMatches>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_match_file(&text).map_err(|reason| Error::MatchFile { path: path.to_path_buf(), reason })
}

pub fn parse_match_file(text: &str) -> Result<Vec<PairMatches>, String> {
    let mut numbers = text.split_ascii_whitespace().map(|token| {
        token.parse::<usize>().map_err(|_| format!("无效的数字 '{token}'"))
    });

    let mut pairs = vec![];
    while let Some(first) = numbers.next() {
        let mut next = |what: &str| {
            numbers.next().unwrap_or_else(|| Err(format!("读取{what}时文件意外结束")))
        };
        let query_image = first?;
        let target_image = next("图片对")?;
        let count = next("匹配数量")?;
        let mut matches = Vec::with_capacity(count);
        for _ in 0..count {
            matches.push(Correspondence { query: next("匹配")?, target: next("匹配")? });
        }
        pairs.push(PairMatches { query_image, target_image, matches });
    }
    Ok(pairs)
}
