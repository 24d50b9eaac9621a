use garmin_connect_client::GarminConnectClient;
use garmin_connect_client::config::Config;
use garmin_connect_client::http_client::ReqwestGarminClient;
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configure logging from env var `GARMIN_CONNECT_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("GARMIN_CONNECT_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();

    let output_dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GARMIN_CONNECT_OUTPUT_DIR").ok());
    let Some(output_dir) = output_dir.map(PathBuf::from) else {
        eprintln!("usage: gc-download <output_dir>");
        eprintln!("or set GARMIN_CONNECT_OUTPUT_DIR");
        eprintln!("credentials are read from GARMIN_CONNECT_USERNAME and GARMIN_CONNECT_PASSWORD");
        return Ok(());
    };

    let cfg = Config::from_env()?;
    let mut client = ReqwestGarminClient::new(cfg.endpoints())?;

    let result = async {
        client.login(&cfg.username, &cfg.password).await?;
        client
            .download_all(&output_dir, cfg.filetype, cfg.continue_on_failure)
            .await
    }
    .await;

    match result {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(e) => {
            eprintln!("request failed: {e}");
            std::process::exit(1);
        }
    }
}
