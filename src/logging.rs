use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber. `verbosity_level` counts `-v` flags,
/// `RUST_LOG` directives take precedence.
pub fn setup_tracing(verbosity_level: u8) {
    let filter = match verbosity_level {
        0 => tracing::level_filters::LevelFilter::INFO,
        1 => tracing::level_filters::LevelFilter::DEBUG,
        _ => tracing::level_filters::LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();

    let stderr_writer = fmt::Layer::default()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_writer)
        .init();
}
