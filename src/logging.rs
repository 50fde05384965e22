use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(clap::Args, Debug, Clone)]
#[group()]
pub struct LoggingArgs {
    /// Enable debug mode.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl LoggingArgs {
    pub fn init(&self) -> Result<(), tracing_subscriber::util::TryInitError> {
        init_logging(self.json, self.debug)
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// default level.
pub fn init_logging(json: bool, debug_mode: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_level = if debug_mode { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = Registry::default().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(debug_mode))
            .try_init()
    }
}
