mod keyfile;
mod npy;

use std::path::Path;

pub use keyfile::*;
pub use npy::*;

use crate::error::Result;

/// SIFT 描述符的维度，也是命令行使用的维度
pub const DESCRIPTOR_DIM: usize = 128;

/// 按图片引用加载 N 维描述符
pub trait DescriptorSource<const N: usize> {
    fn load(&self, image: &str) -> Result<Vec<[u8; N]>>;
}

impl<const N: usize, F> DescriptorSource<N> for F
where
    F: Fn(&str) -> Result<Vec<[u8; N]>>,
{
    fn load(&self, image: &str) -> Result<Vec<[u8; N]>> {
        self(image)
    }
}

/// 从文件加载描述符，`.npy` 按 numpy 矩阵读取，其余按 Lowe 的 key 文件格式读取
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl<const N: usize> DescriptorSource<N> for FileSource {
    fn load(&self, image: &str) -> Result<Vec<[u8; N]>> {
        read_descriptors(image)
    }
}

pub fn read_descriptors<const N: usize>(path: impl AsRef<Path>) -> Result<Vec<[u8; N]>> {
    let path = path.as_ref();
    if is_npy(path) { read_npy_descriptors(path) } else { Ok(read_key_file(path)?.descriptors) }
}

/// 扩展名为 `.npy`（不区分大小写）
pub fn is_npy(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("npy"))
}

/// 一张图片及其描述符，没有描述符的图片不参与任何匹配
#[derive(Debug, Clone)]
pub struct ImageRecord<const N: usize> {
    pub path: String,
    pub descriptors: Vec<[u8; N]>,
}

impl<const N: usize> ImageRecord<N> {
    pub fn new(path: impl Into<String>, descriptors: Vec<[u8; N]>) -> Self {
        Self { path: path.into(), descriptors }
    }

    pub fn is_inert(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_dispatch_on_extension() {
        let dir = TempDir::new().unwrap();

        let npy = dir.path().join("a.NPY");
        let array = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as u8);
        write_npy(&npy, &array).unwrap();
        let v = read_descriptors::<4>(&npy).unwrap();
        assert_eq!(v, vec![[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]]);

        let key = dir.path().join("a.key");
        std::fs::write(&key, "1 4\n0 0 1 0\n9 8 7 6\n").unwrap();
        let v = read_descriptors::<4>(&key).unwrap();
        assert_eq!(v, vec![[9, 8, 7, 6]]);
    }

    #[test]
    fn test_missing_file() {
        let result: Result<Vec<[u8; 4]>> = FileSource.load("/nonexistent/file.key");
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_closure_source() {
        let source = |image: &str| -> Result<Vec<[u8; 2]>> { Ok(vec![[image.len() as u8, 0]]) };
        assert_eq!(source.load("abc").unwrap(), vec![[3, 0]]);
    }

    #[test]
    fn test_image_record() {
        let empty = ImageRecord::<4>::new("a", vec![]);
        assert!(empty.is_inert());
        let image = ImageRecord::new("b", vec![[0u8; 4]]);
        assert!(!image.is_inert());
        assert_eq!(image.path, "b");
    }
}
