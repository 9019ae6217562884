use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// 读取图片列表，每行一个图片引用，忽略空行和只有空白的行
pub fn read_image_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let images = parse_image_list(&text);
    if images.is_empty() {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }
    Ok(images)
}

pub fn parse_image_list(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_owned).collect()
}
