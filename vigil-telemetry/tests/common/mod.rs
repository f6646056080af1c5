use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .with(filter)
            .init();
    });
}

#[allow(dead_code)]
pub fn fixture(name: &str) -> &'static str {
    match name {
        "proc_stat_first.txt" => include_str!("../fixtures/proc_stat_first.txt"),
        "proc_stat_second.txt" => include_str!("../fixtures/proc_stat_second.txt"),
        "proc_meminfo.txt" => include_str!("../fixtures/proc_meminfo.txt"),
        "proc_meminfo_legacy.txt" => include_str!("../fixtures/proc_meminfo_legacy.txt"),
        other => panic!("unknown fixture: {other}"),
    }
}

/// Lay out a fake `/proc` containing the named fixture as `file_name`.
#[allow(dead_code)]
pub fn proc_root_with(file_name: &str, fixture_name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(file_name), fixture(fixture_name)).expect("write fixture");
    dir
}
