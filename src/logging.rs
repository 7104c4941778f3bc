use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` switches stdout to JSON lines; `LOG_DIR` adds a daily
/// rolling JSON file. Keep the returned guards alive until shutdown or buffered
/// lines are lost.
pub fn init(service_name: &str) -> Vec<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut guards = Vec::new();

    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);
    let stdout_layer = if json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(stdout)
            .boxed()
    } else {
        fmt::layer().with_target(false).with_writer(stdout).boxed()
    };

    let file_layer = std::env::var("LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, format!("{service_name}.log"));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    tracing::info!(service = service_name, "logging initialized");
    guards
}
