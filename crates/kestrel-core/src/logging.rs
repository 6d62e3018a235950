/// Install the default tracing subscriber for engine binaries and tools.
///
/// Panics if a global subscriber is already set; call it once at startup.
pub fn init() {
    init_with_filter("trace,wgpu_core=info,wgpu_hal=info,naga=info");
}

/// Install a tracing subscriber with an explicit filter directive string.
///
/// The `RUST_LOG` environment variable is not consulted; the given filter
/// is used as-is so tools get predictable output.
pub fn init_with_filter(filter: &str) {
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
