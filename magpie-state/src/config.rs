//! State storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the chain state stores.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The directory all databases live under.
    pub data_dir: PathBuf,

    /// A transaction shard larger than this triggers a partition-level
    /// doubling. The default keeps individual files FAT32-friendly.
    pub shard_target_bytes: u64,

    /// Worker threads for block script verification. `None` uses the
    /// available parallelism.
    pub verification_workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("magpie-data"),
            shard_target_bytes: (1 << 30) * 7 / 4, // 1.75 GiB
            verification_workers: None,
        }
    }
}

impl Config {
    pub fn with_data_dir(data_dir: PathBuf) -> Config {
        Config {
            data_dir,
            ..Default::default()
        }
    }
}
