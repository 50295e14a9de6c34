use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: String,

    /// Number of frames in the buffer pool, fixed for the pool's lifetime.
    pub pool_size: usize,

    /// Directory holding the paged files.
    pub data_dir: String,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("pool_size", 64)?
            .set_default("data_dir", "data")?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("CLOCKPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}
