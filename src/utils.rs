use indicatif::{ProgressBar, ProgressStyle};

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{elapsed_precise} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("无效的进度条模板")
        .progress_chars("=> ")
}

/// 创建进度条，hidden 为 true 时不显示
pub fn progress_bar(len: u64, hidden: bool) -> ProgressBar {
    if hidden { ProgressBar::hidden() } else { ProgressBar::new(len).with_style(pb_style()) }
}
