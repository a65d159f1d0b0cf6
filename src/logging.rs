use crate::settings::{TracingFormat, TracingSettings};
use tracing_subscriber::{
    filter::LevelFilter, fmt::format::FmtSpan, layer::SubscriberExt, prelude::*, EnvFilter, Layer,
};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

pub fn init_logs(settings: &TracingSettings) -> Result<(), anyhow::Error> {
    if !settings.enabled {
        return Ok(());
    }

    let stdout_layer: Box<dyn Layer<_> + Sync + Send + 'static> = match settings.format {
        TracingFormat::Default => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_filter(env_filter())
            .boxed(),
        TracingFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_filter(env_filter())
            .boxed(),
    };

    tracing_subscriber::registry().with(stdout_layer).try_init()?;

    Ok(())
}
