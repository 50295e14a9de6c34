macro_rules! setup {
    ($bpm:ident, $pool_size:expr) => {
        let _ = env_logger::builder().is_test(true).try_init();
        let $bpm = clockpool::storage::buffer::BufferPoolManager::new($pool_size)?;
    };
}

macro_rules! teardown {
    ($bpm:ident) => {
        $bpm.check_invariants()?;
        drop($bpm);
    };
}

mod disk;
mod workload;
