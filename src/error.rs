use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// 参数不合法，在开始任何工作之前报告
    #[error("参数无效：{0}")]
    Config(String),
    #[error("无法访问 '{}'：{source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("写入匹配结果失败：{0}")]
    Write(#[from] io::Error),
    #[error("'{}' 中没有任何图片", .0.display())]
    EmptyInput(PathBuf),
    #[error("无法在 0 个描述符上建立索引")]
    EmptyIndex,
    #[error("描述符文件 '{}' 格式错误：{reason}", path.display())]
    Descriptor { path: PathBuf, reason: String },
    #[error("匹配结果文件 '{}' 格式错误：{reason}", path.display())]
    MatchFile { path: PathBuf, reason: String },
    #[error("无法创建线程池：{0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("无法读取 '{}'：{source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("单个索引最多支持 4294967295 个描述符，实际为 {0}")]
    TooManyDescriptors(usize),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn descriptor(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Descriptor { path: path.into(), reason: reason.into() }
    }
}
