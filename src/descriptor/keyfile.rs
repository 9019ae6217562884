use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 特征点在图片中的位置、尺度和方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub row: f32,
    pub col: f32,
    pub scale: f32,
    pub orientation: f32,
}

#[derive(Debug, Clone, Default)]
pub struct KeyFile<const N: usize> {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<[u8; N]>,
}

/// 读取 Lowe 格式的 key 文件
///
/// 文件由空白分隔的数字组成：首先是 `<特征点数量> <维度>`，
/// 然后每个特征点依次为 `row col scale orientation` 和维度个 0 ~ 255 的整数。
pub fn read_key_file<const N: usize>(path: impl AsRef<Path>) -> Result<KeyFile<N>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_key_file(&text).map_err(|reason| Error::descriptor(path, reason))
}

pub fn parse_key_file<const N: usize>(text: &str) -> Result<KeyFile<N>, String> {
    let mut tokens = Tokens { inner: text.split_ascii_whitespace(), consumed: 0 };

    let count: usize = tokens.next("特征点数量")?;
    let dim: usize = tokens.next("描述符维度")?;
    if dim != N {
        return Err(format!("描述符维度为 {dim}，应为 {N}"));
    }

    // 头部的数量不可信，每个特征点至少占 2 * (N + 4) 个字节
    let capacity = count.min(text.len() / (2 * (N + 4)));
    let mut keys = KeyFile {
        keypoints: Vec::with_capacity(capacity),
        descriptors: Vec::with_capacity(capacity),
    };
    for _ in 0..count {
        keys.keypoints.push(Keypoint {
            row: tokens.next("特征点行坐标")?,
            col: tokens.next("特征点列坐标")?,
            scale: tokens.next("特征点尺度")?,
            orientation: tokens.next("特征点方向")?,
        });
        let mut descriptor = [0u8; N];
        for value in descriptor.iter_mut() {
            *value = tokens.next("描述符的值")?;
        }
        keys.descriptors.push(descriptor);
    }

    Ok(keys)
}

struct Tokens<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
    consumed: usize,
}

impl Tokens<'_> {
    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, String> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| format!("读取{what}时文件意外结束"))?;
        self.consumed += 1;
        token.parse().map_err(|_| format!("第 {} 项的{what} '{token}' 无效", self.consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_keys() {
        let text = "2 4\n\
                    10.5 20.25 1.5 -0.3\n\
                    1 2 3 4\n\
                    30 40 2 0.7\n\
                    255 0 0 255\n";
        let keys = parse_key_file::<4>(text).unwrap();
        assert_eq!(keys.descriptors, vec![[1, 2, 3, 4], [255, 0, 0, 255]]);
        assert_eq!(
            keys.keypoints[0],
            Keypoint { row: 10.5, col: 20.25, scale: 1.5, orientation: -0.3 }
        );
        assert_eq!(keys.keypoints.len(), 2);
    }

    #[test]
    fn test_values_may_span_lines() {
        // Lowe 的输出每行 20 个值，这里不依赖换行位置
        let text = "1 4 0 0 1 0 9\n8\n7 6";
        let keys = parse_key_file::<4>(text).unwrap();
        assert_eq!(keys.descriptors, vec![[9, 8, 7, 6]]);
    }

    #[test]
    fn test_zero_keys() {
        let keys = parse_key_file::<128>("0 128\n").unwrap();
        assert!(keys.descriptors.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = parse_key_file::<128>("1 64\n").unwrap_err();
        assert!(err.contains("应为 128"));
    }

    #[test]
    fn test_truncated() {
        let err = parse_key_file::<4>("2 4\n0 0 1 0 1 2 3 4\n0 0 1 0 1 2").unwrap_err();
        assert!(err.contains("文件意外结束"));
    }

    #[test]
    fn test_value_out_of_range() {
        let err = parse_key_file::<4>("1 4\n0 0 1 0 1 2 3 256").unwrap_err();
        assert!(err.contains("'256'"));
    }

    #[test]
    fn test_huge_count_in_header() {
        let err = parse_key_file::<128>("9999999999999999 128\n").unwrap_err();
        assert!(err.contains("文件意外结束"));
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_key_file::<4>("").is_err());
    }
}
