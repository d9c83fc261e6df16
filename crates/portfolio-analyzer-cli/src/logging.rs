use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "PFA_LOG";

/// Install a stderr subscriber so stdout stays clean for piped output.
///
/// `PFA_LOG` wins over `RUST_LOG`; without either the level is `warn`, or
/// `debug` for the analytics crates when `--verbose` is passed.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,pfa=debug,portfolio_analyzer_core=debug"
    } else {
        "warn"
    };
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
