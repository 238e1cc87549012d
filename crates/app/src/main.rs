mod commands;

use chrono::Utc;
use commands::{execute, parse_line, Flow};
use std::io::Write;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vector_fusion_core::{HubConfig, Session};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, source) = HubConfig::load()?;
    let session = Session::new(config.embedding.provider()?, config.embedding.model);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        config_source = ?source,
        endpoint = %config.store.endpoint,
        "vector-fusion-hub boot"
    );

    let span = info_span!("session", id = %session.id());
    run(session, config).instrument(span).await
}

async fn run(mut session: Session, config: HubConfig) -> anyhow::Result<()> {
    println!("vector-fusion-hub: type `help` for commands, `quit` to leave");
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        print!("hub> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                error.print()?;
                continue;
            }
        };

        match execute(&mut session, &config, command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(error) => eprintln!("error: {error:#}"),
        }
    }

    info!(stage = ?session.stage(), "session closed");
    Ok(())
}
