use crate::index::NearestNeighbors;

/// 一对候选匹配：查询图片中的描述符位置和目标图片中的描述符位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    pub query: usize,
    pub target: usize,
}

/// 使用最近邻 / 次近邻比率测试匹配两组描述符
///
/// 对 query 中的每个描述符，在 target 中查找最近的两个描述符，
/// 当 `d1 <= ratio^2 * d2`（d 为距离平方）时接受匹配。
/// 次近邻距离为 0 时视为歧义，直接拒绝。
///
/// 结果按 query 位置升序，不对 target 去重。
pub fn match_descriptors<const N: usize, I>(
    query: &[[u8; N]],
    target: &I,
    ratio: f64,
) -> Vec<Correspondence>
where
    I: NearestNeighbors<N> + ?Sized,
{
    if target.len() < 2 {
        return vec![];
    }

    let ratio2 = ratio * ratio;
    let mut matches = vec![];
    for (q, probe) in query.iter().enumerate() {
        let neighbors = target.knn(probe, 2);
        let [n1, n2] = neighbors[..] else {
            continue;
        };
        if n2.distance == 0 {
            continue;
        }
        if n1.distance as f64 <= ratio2 * n2.distance as f64 {
            matches.push(Correspondence { query: q, target: n1.index });
        }
    }
    matches
}
