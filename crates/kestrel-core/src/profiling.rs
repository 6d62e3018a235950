//! Profiling hooks based on the `puffin` crate.
//!
//! Everything here is gated behind the `profiling` cargo feature. With the
//! feature disabled the macros and functions still exist but compile to
//! nothing, so call sites never need their own cfg.

#[cfg(feature = "profiling")]
use std::sync::OnceLock;

#[cfg(feature = "profiling")]
pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Where profiling data is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Serve frames to puffin_viewer over HTTP.
    PuffinHttp,
}

/// Default puffin_viewer port.
#[cfg(feature = "profiling")]
const PUFFIN_ADDR: &str = "0.0.0.0:8585";

#[cfg(feature = "profiling")]
static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Turn scope collection on and start serving profile data.
///
/// # Example
/// ```no_run
/// use kestrel_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::PuffinHttp);
/// ```
#[cfg(feature = "profiling")]
pub fn init_profiling(backend: ProfilingBackend) {
    let ProfilingBackend::PuffinHttp = backend;
    puffin::set_scopes_on(true);
    match puffin_http::Server::new(PUFFIN_ADDR) {
        Ok(server) => {
            tracing::info!("puffin profiler listening on http://{PUFFIN_ADDR}");
            // The static keeps the server alive for the process lifetime.
            let _ = PROFILING_SERVER.set(server);
        }
        Err(e) => tracing::error!("failed to start puffin server: {e}"),
    }
}

#[cfg(not(feature = "profiling"))]
pub fn init_profiling(_backend: ProfilingBackend) {}

/// Mark a frame boundary. Call once per frame so scopes group by frame.
#[cfg(feature = "profiling")]
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profiling"))]
#[inline]
pub fn new_frame() {}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_function {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_scope {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::{profile_function, profile_scope};
