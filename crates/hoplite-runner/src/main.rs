//! Headless Hoplite session runner.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod session;

use session::{Config, Session};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(level = config.level, seed = config.seed, "Starting Hoplite session...");

    let mut session = Session::start(&config)?;
    let outcome = session.advance()?;
    info!(
        %outcome,
        turns = session.engine().past().len(),
        "session stopped"
    );

    let save = session.autosave()?;
    match &config.autosave {
        Some(path) => {
            std::fs::write(path, save)?;
            info!(path = %path.display(), "autosave written");
        }
        None => println!("{}", save),
    }

    Ok(())
}
