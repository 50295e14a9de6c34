use std::path::Path;
use std::sync::Arc;

use clockpool::config::Config;
use clockpool::error::{Error, Result};
use clockpool::storage::buffer::BufferPoolManager;
use clockpool::storage::file::{DiskFile, File, FileRef};
use log::info;

fn main() -> Result<()> {
    let args = clap::command!()
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("Configuration file path")
                .default_value(""),
        )
        .arg(
            clap::Arg::new("pages")
                .short('n')
                .long("pages")
                .help("Number of pages to write through the buffer pool")
                .value_parser(clap::value_parser!(u32))
                .default_value("128"),
        )
        .get_matches();
    let cfg = Config::new(args.get_one::<String>("config").map(String::as_str).unwrap_or(""))?;
    env_logger::Builder::new().parse_filters(&cfg.log_level).init();
    let pages = args.get_one::<u32>("pages").copied().unwrap_or(128);

    std::fs::create_dir_all(&cfg.data_dir)?;
    let path = Path::new(&cfg.data_dir).join("clockpool.db");
    let file = if path.exists() { DiskFile::open(&path)? } else { DiskFile::create(&path)? };
    let disk = Arc::new(file);
    let file: FileRef = disk.clone();
    let bpm = BufferPoolManager::from_config(&cfg)?;
    info!("buffer pool with {} frames over {}", bpm.pool_size(), path.display());

    // write a stamp into each new page, more pages than frames so the
    // clock replacer has to evict.
    let mut written = Vec::with_capacity(pages as usize);
    for i in 0..pages {
        let mut guard = bpm.new_page(&file)?;
        let stamp = format!("page {} #{}", guard.page_no(), i);
        guard.write(|data| data[..stamp.len()].copy_from_slice(stamp.as_bytes()))?;
        written.push((guard.page_no(), stamp));
    }

    // read them back, some come from the pool, the rest from the file.
    for (page_no, stamp) in &written {
        let guard = bpm.fetch_page(&file, *page_no)?;
        let matched = guard.read(|data| &data[..stamp.len()] == stamp.as_bytes())?;
        if !matched {
            return Err(Error::BadState(format!("page {} lost its content", page_no)));
        }
    }
    print!("{}", bpm.dump()?);

    bpm.flush_file(&file)?;
    disk.sync()?;
    let stats = file.stats()?;
    info!(
        "{} pages verified, reads: {}, writes: {}, allocations: {}",
        written.len(),
        stats.reads,
        stats.writes,
        stats.allocations
    );
    Ok(())
}
