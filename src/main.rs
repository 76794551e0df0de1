use tracing_subscriber::EnvFilter;
use webgl_deploy::cli;
use webgl_deploy::pipeline::CancelToken;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Cancelling after the current step...");
        handler_token.cancel();
    })?;

    cli::run(cancel)
}
