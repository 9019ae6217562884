//! 描述符上的静态 k-d 树
//!
//! 每个节点在离散度（最大值 - 最小值）最大的维度上按中位数切分，
//! 查询使用 best-bin-first 优先搜索：待访问的子树放在最小堆中，
//! 按照子树到查询点距离的下界排序。
//!
//! `eps = 0` 时为精确搜索；`eps > 0` 时，返回的第 i 个近邻距离不超过真实第 i 个近邻距离的
//! `(1 + eps)` 倍（欧氏距离，换算成距离平方即 `(1 + eps)^2` 倍）。

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::distance::l2_squared;
use crate::error::{Error, Result};
use crate::index::{NearestNeighbors, Neighbor, Neighbors};

#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
    /// 叶子节点最多包含的描述符数量
    pub leaf_size: usize,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self { leaf_size: 8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// 近似搜索的误差因子，0 表示精确搜索
    pub eps: f32,
    /// 每次查询最多扫描的叶子数量，0 表示不限制。
    /// 设置后搜索结果没有误差保证
    pub max_leaves: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { eps: 0.0, max_leaves: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    /// perm[start..end] 中的描述符
    Leaf { start: u32, end: u32 },
    /// 左子树在 dim 维上的值 <= cut，右子树 >= cut
    Split { dim: u32, cut: u8, left: u32, right: u32 },
}

pub struct KdTree<'a, const N: usize> {
    points: &'a [[u8; N]],
    /// 描述符下标的排列，每个叶子对应其中连续的一段
    perm: Vec<u32>,
    nodes: Vec<Node>,
    search: SearchParams,
}

impl<'a, const N: usize> KdTree<'a, N> {
    pub fn build(points: &'a [[u8; N]], params: BuildParams) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyIndex);
        }
        check_size(points.len())?;

        let leaf_size = params.leaf_size.max(1);
        let mut perm = (0..points.len() as u32).collect::<Vec<_>>();
        let mut nodes = Vec::with_capacity(2 * points.len() / leaf_size + 1);
        build_recursive(points, &mut perm, 0, leaf_size, &mut nodes);

        Ok(Self { points, perm, nodes, search: SearchParams::default() })
    }

    pub fn with_search(mut self, search: SearchParams) -> Self {
        self.search = search;
        self
    }

    /// 树的深度，只有一个叶子时为 1
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], id: u32) -> usize {
            match nodes[id as usize] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + depth_of(nodes, left).max(depth_of(nodes, right)),
            }
        }
        depth_of(&self.nodes, 0)
    }

    fn scan_leaf(&self, probe: &[u8; N], start: u32, end: u32, k: usize, best: &mut Neighbors) {
        for &i in &self.perm[start as usize..end as usize] {
            let distance = l2_squared::<N>(probe, &self.points[i as usize]);
            insert_neighbor(best, k, Neighbor { index: i as usize, distance });
        }
    }
}

impl<const N: usize> NearestNeighbors<N> for KdTree<'_, N> {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn knn(&self, probe: &[u8; N], k: usize) -> Neighbors {
        let mut best = Neighbors::new();
        let k = k.min(self.points.len());
        if k == 0 {
            return best;
        }

        let scale = (1.0 + self.search.eps as f64).powi(2);
        // 下界乘以误差因子后仍超过当前第 k 个距离的子树，不可能带来足够好的结果
        let hopeless = |bound: u32, best: &Neighbors| {
            best.len() == k && bound as f64 * scale > best[k - 1].distance as f64
        };

        let mut heap = BinaryHeap::new();
        heap.push(Reverse((0u32, 0u32)));
        let mut leaves = 0;

        while let Some(Reverse((bound, mut node))) = heap.pop() {
            if hopeless(bound, &best) {
                break;
            }
            if self.search.max_leaves > 0 && leaves >= self.search.max_leaves {
                break;
            }
            // 沿着近的一侧下降到叶子，远的一侧放入堆中
            loop {
                match self.nodes[node as usize] {
                    Node::Split { dim, cut, left, right } => {
                        let v = probe[dim as usize];
                        let (near, far, diff) =
                            if v < cut { (left, right, cut - v) } else { (right, left, v - cut) };
                        let far_bound = bound.max(diff as u32 * diff as u32);
                        if !hopeless(far_bound, &best) {
                            heap.push(Reverse((far_bound, far)));
                        }
                        node = near;
                    }
                    Node::Leaf { start, end } => {
                        self.scan_leaf(probe, start, end, k, &mut best);
                        leaves += 1;
                        break;
                    }
                }
            }
        }

        best
    }
}

/// 节点和排列中的下标使用 u32
fn check_size(len: usize) -> Result<()> {
    if len > u32::MAX as usize {
        return Err(Error::TooManyDescriptors(len));
    }
    Ok(())
}

fn build_recursive<const N: usize>(
    points: &[[u8; N]],
    perm: &mut [u32],
    offset: usize,
    leaf_size: usize,
    nodes: &mut Vec<Node>,
) -> u32 {
    let id = nodes.len() as u32;
    let leaf = Node::Leaf { start: offset as u32, end: (offset + perm.len()) as u32 };
    if perm.len() <= leaf_size {
        nodes.push(leaf);
        return id;
    }

    let (dim, spread) = max_spread(points, perm);
    // 所有描述符完全相同，无法再切分
    if spread == 0 {
        nodes.push(leaf);
        return id;
    }

    let mid = perm.len() / 2;
    perm.select_nth_unstable_by_key(mid, |&i| points[i as usize][dim]);
    let cut = points[perm[mid] as usize][dim];

    // 先占位，子节点构建完成后再回填
    nodes.push(leaf);
    let (lo, hi) = perm.split_at_mut(mid);
    let left = build_recursive(points, lo, offset, leaf_size, nodes);
    let right = build_recursive(points, hi, offset + mid, leaf_size, nodes);
    nodes[id as usize] = Node::Split { dim: dim as u32, cut, left, right };
    id
}

/// 返回离散度最大的维度及其离散度，相同时取较小的维度
fn max_spread<const N: usize>(points: &[[u8; N]], perm: &[u32]) -> (usize, u8) {
    let mut lo = [u8::MAX; N];
    let mut hi = [u8::MIN; N];
    for &i in perm {
        let p = &points[i as usize];
        for d in 0..N {
            lo[d] = lo[d].min(p[d]);
            hi[d] = hi[d].max(p[d]);
        }
    }
    let mut best = (0, 0);
    for d in 0..N {
        let spread = hi[d] - lo[d];
        if spread > best.1 {
            best = (d, spread);
        }
    }
    best
}

/// 维护长度不超过 k 的升序列表
#[inline]
fn insert_neighbor(best: &mut Neighbors, k: usize, neighbor: Neighbor) {
    if best.len() == k {
        if neighbor >= best[k - 1] {
            return;
        }
        best.pop();
    }
    let pos = best.partition_point(|n| *n < neighbor);
    best.insert(pos, neighbor);
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rand::rngs::StdRng;

    use super::*;
    use crate::distance::knn_l2;

    fn random_points<const N: usize>(rng: &mut StdRng, n: usize) -> Vec<[u8; N]> {
        (0..n)
            .map(|_| {
                let mut p = [0u8; N];
                rng.fill_bytes(&mut p);
                p
            })
            .collect()
    }

    fn brute_force<const N: usize>(points: &[[u8; N]], probe: &[u8; N], k: usize) -> Vec<Neighbor> {
        let (ids, dis) = knn_l2(probe, points, k);
        ids.into_iter().zip(dis).map(|(index, distance)| Neighbor { index, distance }).collect()
    }

    #[test]
    fn test_empty_input() {
        let points: Vec<[u8; 8]> = vec![];
        assert!(matches!(KdTree::build(&points, BuildParams::default()), Err(Error::EmptyIndex)));
    }

    #[test]
    fn test_single_point() {
        let points = [[3u8; 8]];
        let tree = KdTree::build(&points, BuildParams::default()).unwrap();
        let result = tree.knn(&[0u8; 8], 2);
        assert_eq!(result.as_slice(), &[Neighbor { index: 0, distance: 72 }]);
    }

    #[test]
    fn test_size_limit() {
        assert!(check_size(u32::MAX as usize).is_ok());
        assert!(matches!(
            check_size(u32::MAX as usize + 1),
            Err(Error::TooManyDescriptors(n)) if n == u32::MAX as usize + 1
        ));
    }

    #[test]
    fn test_k_zero() {
        let points = [[3u8; 8], [4u8; 8]];
        let tree = KdTree::build(&points, BuildParams::default()).unwrap();
        assert!(tree.knn(&[0u8; 8], 0).is_empty());
    }

    #[test]
    fn test_identical_points_form_leaf() {
        let points = vec![[42u8; 16]; 100];
        let tree = KdTree::build(&points, BuildParams { leaf_size: 1 }).unwrap();
        assert_eq!(tree.depth(), 1);
        let result = tree.knn(&[42u8; 16], 2);
        assert_eq!(
            result.as_slice(),
            &[Neighbor { index: 0, distance: 0 }, Neighbor { index: 1, distance: 0 }]
        );
    }

    #[test]
    fn test_depth_is_logarithmic() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = random_points::<32>(&mut rng, 1024);
        let tree = KdTree::build(&points, BuildParams { leaf_size: 1 }).unwrap();
        // 中位数切分，深度为 log2(1024) + 1
        assert_eq!(tree.depth(), 11);
    }

    #[test]
    fn test_exact_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        for leaf_size in [1, 4, 8, 32] {
            let points = random_points::<128>(&mut rng, 500);
            let tree = KdTree::build(&points, BuildParams { leaf_size }).unwrap();
            for _ in 0..50 {
                let probe = random_points::<128>(&mut rng, 1)[0];
                for k in [1, 2, 5] {
                    assert_eq!(tree.knn(&probe, k).to_vec(), brute_force(&points, &probe, k));
                }
            }
        }
    }

    #[test]
    fn test_exact_with_duplicates_and_ties() {
        // 低维、取值范围小，产生大量距离相同的点
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<[u8; 4]> =
            (0..300).map(|_| std::array::from_fn(|_| rng.random_range(0..4u8))).collect();
        let tree = KdTree::build(&points, BuildParams { leaf_size: 2 }).unwrap();
        for _ in 0..100 {
            let probe: [u8; 4] = std::array::from_fn(|_| rng.random_range(0..4u8));
            assert_eq!(tree.knn(&probe, 2).to_vec(), brute_force(&points, &probe, 2));
        }
    }

    #[test]
    fn test_probe_is_member() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = random_points::<64>(&mut rng, 200);
        let tree = KdTree::build(&points, BuildParams::default()).unwrap();
        for (i, p) in points.iter().enumerate() {
            let result = tree.knn(p, 1);
            assert_eq!(result[0], Neighbor { index: i, distance: 0 });
        }
    }

    #[test]
    fn test_approximate_error_bound() {
        let mut rng = StdRng::seed_from_u64(11);
        let points = random_points::<128>(&mut rng, 1000);
        let eps = 0.5f32;
        let tree = KdTree::build(&points, BuildParams::default())
            .unwrap()
            .with_search(SearchParams { eps, max_leaves: 0 });
        let scale = (1.0 + eps as f64).powi(2);
        for _ in 0..50 {
            let probe = random_points::<128>(&mut rng, 1)[0];
            let approx = tree.knn(&probe, 2);
            let exact = brute_force(&points, &probe, 2);
            assert_eq!(approx.len(), 2);
            for (a, e) in approx.iter().zip(&exact) {
                assert!(a.distance as f64 <= scale * e.distance as f64);
                assert!(a.distance >= e.distance);
            }
        }
    }

    #[test]
    fn test_max_leaves_still_returns_k() {
        let mut rng = StdRng::seed_from_u64(5);
        let points = random_points::<16>(&mut rng, 400);
        let tree = KdTree::build(&points, BuildParams { leaf_size: 4 })
            .unwrap()
            .with_search(SearchParams { eps: 0.0, max_leaves: 1 });
        let probe = points[17];
        let result = tree.knn(&probe, 2);
        // 中位数切分保证每个叶子至少有 2 个描述符
        assert_eq!(result.len(), 2);
        assert!(result[0] <= result[1]);
        let exact = brute_force(&points, &probe, 2);
        assert!(result[0].distance >= exact[0].distance);
        assert!(result[1].distance >= exact[1].distance);
    }
}
