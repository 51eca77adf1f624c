use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the fmt subscriber, honouring `RUST_LOG` and defaulting to `info`.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Like [`init`], but `directives` replaces the default when `RUST_LOG` is unset.
pub fn init_with(directives: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(directives.unwrap_or(DEFAULT_FILTER)).unwrap_or_else(|err| {
            eprintln!("invalid log filter {directives:?}: {err}; using {DEFAULT_FILTER}");
            EnvFilter::new(DEFAULT_FILTER)
        })
    });
    install(filter);
}

fn install(filter: EnvFilter) {
    // Already installed (tests, embedding host): keep the existing subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
