use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` wins over the CLI verbosity flags.
pub fn init_logging(quiet: bool, verbose: bool) {
    let default_directive = if quiet {
        "chart_playlists=warn,warn"
    } else if verbose {
        "chart_playlists=debug,info"
    } else {
        "chart_playlists=info,warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // stdout is reserved for command output (result JSON, song lists)
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}
