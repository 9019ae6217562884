use std::cmp::Ordering;

use clap::ValueEnum;
use smallvec::SmallVec;

use crate::distance::knn_l2;
use crate::error::{Error, Result};
use crate::kdtree::{BuildParams, KdTree, SearchParams};

/// 单次查询的结果，比率测试只需要 2 个，放在栈上
pub type Neighbors = SmallVec<[Neighbor; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// 目标描述符在所属图片中的位置
    pub index: usize,
    /// 欧氏距离的平方
    pub distance: u32,
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.distance, self.index).cmp(&(other.distance, other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// N 维 u8 描述符上的最近邻索引
pub trait NearestNeighbors<const N: usize> {
    /// 索引中的描述符数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 返回距离 probe 最近的 k 个描述符，按 (距离, 索引) 升序，长度为 min(k, len)
    fn knn(&self, probe: &[u8; N], k: usize) -> Neighbors;
}

/// 暴力搜索，每次查询都和所有描述符计算距离
pub struct LinearIndex<'a, const N: usize> {
    points: &'a [[u8; N]],
}

impl<'a, const N: usize> LinearIndex<'a, N> {
    pub fn build(points: &'a [[u8; N]]) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyIndex);
        }
        Ok(Self { points })
    }
}

impl<const N: usize> NearestNeighbors<N> for LinearIndex<'_, N> {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn knn(&self, probe: &[u8; N], k: usize) -> Neighbors {
        let (ids, dis) = knn_l2::<N>(probe, self.points, k);
        ids.into_iter().zip(dis).map(|(index, distance)| Neighbor { index, distance }).collect()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexKind {
    /// k-d 树，支持精确和近似搜索
    #[default]
    KdTree,
    /// 暴力搜索
    Linear,
}

/// 按 IndexKind 选择的索引实现
pub enum AnyIndex<'a, const N: usize> {
    KdTree(KdTree<'a, N>),
    Linear(LinearIndex<'a, N>),
}

impl<'a, const N: usize> AnyIndex<'a, N> {
    pub fn build(
        kind: IndexKind,
        points: &'a [[u8; N]],
        build: BuildParams,
        search: SearchParams,
    ) -> Result<Self> {
        Ok(match kind {
            IndexKind::KdTree => Self::KdTree(KdTree::build(points, build)?.with_search(search)),
            IndexKind::Linear => Self::Linear(LinearIndex::build(points)?),
        })
    }
}

impl<const N: usize> NearestNeighbors<N> for AnyIndex<'_, N> {
    fn len(&self) -> usize {
        match self {
            Self::KdTree(index) => index.len(),
            Self::Linear(index) => index.len(),
        }
    }

    fn knn(&self, probe: &[u8; N], k: usize) -> Neighbors {
        match self {
            Self::KdTree(index) => index.knn(probe, k),
            Self::Linear(index) => index.knn(probe, k),
        }
    }
}
