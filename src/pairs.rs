use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{Error, Result};

/// 已知不重叠、不需要匹配的图片对，不区分顺序
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    pairs: HashSet<(usize, usize)>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一对图片（从 0 开始），返回是否为新的图片对
    pub fn insert(&mut self, a: usize, b: usize) -> bool {
        self.pairs.insert(normalize(a, b))
    }

    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.pairs.contains(&normalize(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(usize, usize)> for ExclusionSet {
    fn from_iter<T: IntoIterator<Item = (usize, usize)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (a, b) in iter {
            set.insert(a, b);
        }
        set
    }
}

fn normalize(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// 读取不连通图片列表
///
/// 文件中是空白分隔的整数对，图片编号**从 1 开始**，对应图片列表中的顺序。
/// 遇到第一个无法解析的内容时停止。
pub fn read_exclusions(path: impl AsRef<Path>) -> Result<ExclusionSet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let set = parse_exclusions(&text);
    info!("从 '{}' 读取了 {} 对不连通的图片", path.display(), set.len());
    Ok(set)
}

pub fn parse_exclusions(text: &str) -> ExclusionSet {
    let mut set = ExclusionSet::new();
    let mut numbers = text.split_ascii_whitespace().map_while(|token| token.parse::<i64>().ok());
    while let (Some(a), Some(b)) = (numbers.next(), numbers.next()) {
        if a < 1 || b < 1 || a == b {
            warn!("忽略无效的不连通图片对：{a} {b}");
            continue;
        }
        debug!("图片不连通（编号从 1 开始）：{a} {b}");
        set.insert(a as usize - 1, b as usize - 1);
    }
    set
}

/// 在窗口半径 `window` 下，目标图片 `i` 需要匹配的第一张图片
///
/// 没有窗口时和之前所有图片匹配
pub fn window_start(i: usize, window: Option<usize>) -> usize {
    window.map_or(0, |radius| i.saturating_sub(radius))
}
