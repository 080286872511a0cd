use liso::config::Config;
use liso::http::{files::StaticFiles, Server};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!(www = %cfg.www.display(), "serving files");
    let mut server = Server::bind(cfg.listen, StaticFiles::new(&cfg.www))?;
    server.run()?;

    Ok(())
}
