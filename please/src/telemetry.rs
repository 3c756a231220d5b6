use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Logs always go to stderr so stdout stays clean for JSON output and, when
/// serving MCP over stdio, for the protocol itself. `MCP_GATEWAY_DEBUG=true`
/// raises the default level to debug; `RUST_LOG` still wins when set.
pub fn init() {
    let default = if std::env::var("MCP_GATEWAY_DEBUG").is_ok_and(|v| v == "true") {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
