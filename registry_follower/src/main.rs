use changes_stream2::ChangesStream;
use dotenv::dotenv;
use log::{error, info, warn};
use registry_follower::bound::fetch_end_sequence;
use registry_follower::config::Config;
use registry_follower::progress::ProgressReporter;
use registry_follower::pump::{Persistence, StreamPump};
use registry_follower::sink::{open_sink, DetachedWriter};
use registry_follower::FollowerError;
use utils::{check_no_concurrent_processes, ProcessGuardError};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    match follow_until_end().await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

async fn follow_until_end() -> Result<(), FollowerError> {
    match check_no_concurrent_processes("registry_follower") {
        Err(ProcessGuardError::Pidof(e)) => warn!("Skipping concurrent process check: {}", e),
        other => other?,
    }

    let config = Config::from_env()?;

    let client = reqwest::Client::new();
    let end_sequence = fetch_end_sequence(&client, config.root_url()).await?;
    info!(
        "Current last seq on {} is: {}",
        config.root_url(),
        end_sequence
    );
    info!(
        "Starting replication for range: ({}, {}], writing {:?} output to {}",
        config
            .since_seq
            .map(|s| s.to_string())
            .unwrap_or_else(|| "start-of-time".to_owned()),
        end_sequence,
        config.output_mode,
        config.output_path.display()
    );

    let sink = open_sink(config.output_mode, config.output_path.clone());
    let persistence = if config.await_writes {
        Persistence::Awaited(sink)
    } else {
        // Queued writes still pending at exit are dropped.
        let (writer, _handle) = DetachedWriter::spawn(sink);
        Persistence::Detached(writer)
    };
    let reporter = ProgressReporter::new(std::io::stdout(), config.progress_stride);
    let mut pump = StreamPump::new(end_sequence, persistence, reporter);

    let changes = ChangesStream::new(config.changes_url())
        .await
        .map_err(|e| FollowerError::Subscribe(format!("{:?}", e)))?;

    let stats = pump.run(changes).await?;
    info!(
        "Done: processed {}, stored {}",
        stats.processed, stats.stored
    );
    Ok(())
}
