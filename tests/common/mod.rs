//! Shared setup for the integration tests.

/// Install a fmt subscriber honoring `RUST_LOG`, once per test binary.
///
/// Lets `RUST_LOG=sedum_routing=trace cargo test` show the engine's decision
/// logging alongside test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
