use anyhow::Context as _;
use joinwatch::config::Config;
use joinwatch::envelope::Envelope;
use joinwatch::notify::{DiscordWebhook, LogSink, Sink};
use joinwatch::query::A2sClient;
use joinwatch::{Database, Notifier, create_app};
use std::future::pending;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{MissedTickBehavior, interval};

type AppNotifier = Notifier<A2sClient, Database, Sink>;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            print_envelope(&Envelope::failure(e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            print_envelope(&Envelope::failure(format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Configuration: mode={}, server={}, db_path={}, query_timeout={}s, poll_interval={:?}, port={:?}",
        config.mode.name(),
        config.server_address,
        config.database_path,
        config.query_timeout.as_secs(),
        config.poll_interval.map(|d| d.as_secs()),
        config.port
    );

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;
    let source = A2sClient::new(config.server_address.clone(), config.query_timeout);
    let sink = match &config.discord_webhook_url {
        Some(url) => Sink::Discord(DiscordWebhook::new(url.clone())),
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL is not set, notifications will only be logged");
            Sink::Log(LogSink)
        }
    };
    let notifier = Arc::new(Notifier::new(config.settings(), source, db, sink));

    if config.port.is_none() && config.poll_interval.is_none() {
        let envelope = notifier.invoke().await;
        print_envelope(&envelope);
        return Ok(if envelope.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let http = async {
        match config.port {
            Some(port) => serve(notifier.clone(), port, config.request_timeout).await,
            None => pending().await,
        }
    };
    let polling = async {
        match config.poll_interval {
            Some(every) => poll(notifier.clone(), every).await,
            None => pending().await,
        }
    };

    tokio::select! {
        result = http => result?,
        _ = polling => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(notifier: Arc<AppNotifier>, port: u16, request_timeout: Duration) -> anyhow::Result<()> {
    let app = create_app(notifier, request_timeout);
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}

async fn poll(notifier: Arc<AppNotifier>, every: Duration) {
    tracing::info!("Polling every {}s", every.as_secs());
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        notifier.invoke().await;
    }
}

fn print_envelope(envelope: &Envelope) {
    match serde_json::to_string(envelope) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Could not serialize result: {}", e),
    }
}
