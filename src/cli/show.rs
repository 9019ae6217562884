use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::descriptor::{DESCRIPTOR_DIM, is_npy, read_key_file, read_npy_descriptors};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 描述符文件，.npy 或 key 文件
    pub file: PathBuf,
    /// 同时列出 key 文件中每个特征点的位置、尺度和方向
    #[arg(long)]
    pub keypoints: bool,
}

impl SubCommandExtend for ShowCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        if is_npy(&self.file) {
            let descriptors = read_npy_descriptors::<DESCRIPTOR_DIM>(&self.file)?;
            println!("descriptors\t{}", descriptors.len());
            println!("dimension\t{}", DESCRIPTOR_DIM);
            return Ok(());
        }

        let keys = read_key_file::<DESCRIPTOR_DIM>(&self.file)?;
        println!("descriptors\t{}", keys.descriptors.len());
        println!("dimension\t{}", DESCRIPTOR_DIM);
        if self.keypoints {
            for (i, kp) in keys.keypoints.iter().enumerate() {
                println!("{i}\t{:.2}\t{:.2}\t{:.2}\t{:.3}", kp.row, kp.col, kp.scale, kp.orientation);
            }
        }
        Ok(())
    }
}
