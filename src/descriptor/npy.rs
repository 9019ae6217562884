use std::path::Path;

use ndarray::Array2;
use ndarray_npy::read_npy;

use crate::error::{Error, Result};

/// 读取形状为 `(数量, N)` 的 u8 numpy 矩阵
pub fn read_npy_descriptors<const N: usize>(path: impl AsRef<Path>) -> Result<Vec<[u8; N]>> {
    let path = path.as_ref();
    let array: Array2<u8> =
        read_npy(path).map_err(|source| Error::Npy { path: path.to_path_buf(), source })?;
    if array.ncols() != N {
        return Err(Error::descriptor(
            path,
            format!("描述符维度为 {}，应为 {N}", array.ncols()),
        ));
    }

    // Fortran 顺序的矩阵需要先转成行优先
    let array = array.as_standard_layout();
    let data = array
        .as_slice()
        .ok_or_else(|| Error::descriptor(path, "矩阵在内存中不连续"))?;
    let (descriptors, _) = data.as_chunks::<N>();
    Ok(descriptors.to_vec())
}
