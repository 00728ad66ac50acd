use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness; set `RUST_LOG=info` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
