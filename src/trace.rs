//! Feature-gated tracing macros.
//!
//! With the `tracing` feature the macros are the `tracing` crate's own.
//! Without it they expand to nothing, and span constructors return an
//! inert `Span`.
//!
//! ```rust,ignore
//! #[cfg(feature = "tracing")]
//! use crate::trace::{debug_span, trace};
//!
//! fn step() {
//!     #[cfg(feature = "tracing")]
//!     let _span = debug_span!("step", depth = 3).entered();
//!     #[cfg(feature = "tracing")]
//!     trace!(rule = 7, "rule_failed");
//! }
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, info, info_span, trace, warn, Span};

#[cfg(not(feature = "tracing"))]
mod noop {
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> SpanGuard {
            SpanGuard
        }
    }

    pub struct SpanGuard;

    #[macro_export]
    macro_rules! trace {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! info {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! warn {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    #[macro_export]
    macro_rules! info_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, info, info_span, trace, warn};
}

#[cfg(not(feature = "tracing"))]
pub use noop::*;

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
pub const LOG_ENV: &str = "SYMRW_LOG";

/// Install a stderr `fmt` subscriber filtered by `SYMRW_LOG`, then
/// `RUST_LOG`, then `info`. Later calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}

/// Record folded stacks to `path` for flamegraph rendering. The guard
/// flushes the file when dropped.
#[cfg(feature = "tracing")]
pub fn init_flamegraph(path: &str) -> std::io::Result<impl Drop> {
    use tracing_flame::FlameLayer;
    use tracing_subscriber::{prelude::*, registry::Registry};

    let (flame_layer, guard) =
        FlameLayer::with_file(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Registry::default().with(flame_layer).try_init().ok();
    Ok(guard)
}

#[cfg(not(feature = "tracing"))]
pub fn init_flamegraph(_path: &str) -> std::io::Result<impl Drop> {
    struct NoGuard;
    impl Drop for NoGuard {
        fn drop(&mut self) {}
    }
    Ok(NoGuard)
}

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;
