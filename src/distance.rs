/// 两个描述符之间的欧氏距离平方
///
/// 128 维 u8 向量的最大值为 128 * 255^2，u32 足够容纳
#[inline(always)]
pub fn l2_squared<const N: usize>(va: &[u8; N], vb: &[u8; N]) -> u32 {
    match N {
        128 => l2_squared_unrolled(va, vb),
        _ => l2_squared_naive(va, vb),
    }
}

#[inline(always)]
pub fn l2_squared_naive<const N: usize>(va: &[u8; N], vb: &[u8; N]) -> u32 {
    let mut sum = 0;
    for i in 0..N {
        let d = va[i] as i32 - vb[i] as i32;
        sum += (d * d) as u32;
    }
    sum
}

/// 按 16 字节分块累加，方便 LLVM 向量化
#[inline(always)]
pub fn l2_squared_unrolled<const N: usize>(va: &[u8; N], vb: &[u8; N]) -> u32 {
    let (ca, ra) = va.as_chunks::<16>();
    let (cb, rb) = vb.as_chunks::<16>();
    let mut sum = 0u32;
    for (a, b) in ca.iter().zip(cb) {
        let mut acc = 0u32;
        for k in 0..16 {
            let d = a[k] as i32 - b[k] as i32;
            acc += (d * d) as u32;
        }
        sum += acc;
    }
    for (a, b) in ra.iter().zip(rb) {
        let d = *a as i32 - *b as i32;
        sum += (d * d) as u32;
    }
    sum
}

/// 暴力计算 va 到 vb 中每个向量的距离，并返回距离最小的 k 个索引和距离
///
/// 结果按 (距离, 索引) 升序排列，距离相同时索引小的在前
pub fn knn_l2<const N: usize>(va: &[u8; N], vb: &[[u8; N]], k: usize) -> (Vec<usize>, Vec<u32>) {
    if k == 0 {
        return (vec![], vec![]);
    }
    // 维护一个长度不超过 k 的升序数组，插入点从后往前找
    let mut best: Vec<(u32, usize)> = Vec::with_capacity(k + 1);
    for (i, vector) in vb.iter().enumerate() {
        let d = l2_squared::<N>(va, vector);
        if best.len() == k && (d, i) >= best[k - 1] {
            continue;
        }
        let pos = best.partition_point(|&entry| entry < (d, i));
        best.insert(pos, (d, i));
        best.truncate(k);
    }
    best.into_iter().map(|(d, i)| (i, d)).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_identical() {
        let va = [7u8; 128];
        assert_eq!(l2_squared(&va, &va), 0);
    }

    #[test]
    fn test_l2_max_distance() {
        let va = [0u8; 128];
        let vb = [255u8; 128];
        assert_eq!(l2_squared(&va, &vb), 128 * 255 * 255);
    }

    #[test]
    fn test_l2_unrolled_matches_naive() {
        let mut va = [0u8; 128];
        let mut vb = [0u8; 128];
        for i in 0..128 {
            va[i] = (i * 7 % 256) as u8;
            vb[i] = (255 - i * 3 % 256) as u8;
        }
        assert_eq!(l2_squared_unrolled(&va, &vb), l2_squared_naive(&va, &vb));
    }

    #[test]
    fn test_l2_odd_dimension() {
        // 19 = 16 + 3，覆盖剩余部分的处理
        let va = [1u8; 19];
        let vb = [3u8; 19];
        assert_eq!(l2_squared_unrolled(&va, &vb), 19 * 4);
        assert_eq!(l2_squared(&va, &vb), 19 * 4);
    }

    #[test]
    fn test_knn_l2_sorted() {
        let va = [0u8; 4];
        let vb = [[3, 0, 0, 0], [1, 0, 0, 0], [2, 0, 0, 0]];
        let (ids, dis) = knn_l2(&va, &vb, 3);
        assert_eq!(ids, &[1, 2, 0]);
        assert_eq!(dis, &[1, 4, 9]);
    }

    #[test]
    fn test_knn_l2_tie_prefers_smaller_index() {
        let va = [0u8; 4];
        let vb = [[2, 0, 0, 0], [0, 2, 0, 0], [0, 0, 1, 0]];
        let (ids, dis) = knn_l2(&va, &vb, 2);
        assert_eq!(ids, &[2, 0]);
        assert_eq!(dis, &[1, 4]);
    }

    #[test]
    fn test_knn_l2_k_limit() {
        let va = [0u8; 4];
        let vb = [[1u8; 4], [2u8; 4]];
        let (ids, _) = knn_l2(&va, &vb, 5);
        assert_eq!(ids, &[0, 1]);
    }

    #[test]
    fn test_knn_l2_k_zero() {
        let va = [0u8; 4];
        let vb = [[1u8; 4]];
        let (ids, dis) = knn_l2(&va, &vb, 0);
        assert!(ids.is_empty() && dis.is_empty());
    }
}
