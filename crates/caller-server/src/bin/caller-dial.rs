//! Places a single outbound call through Twilio.
//!
//! Usage: `caller-dial <to> [config.toml]`. The call is answered by a
//! running `caller-server` at `server.public_url`.

use caller_server::api_calls::{is_e164, outbound_call};
use caller_server::config::load_config;
use caller_twilio::TwilioClient;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(to) = args.next() else {
        eprintln!("usage: caller-dial <to> [config.toml]");
        return ExitCode::from(2);
    };
    let config_path = args
        .next()
        .or_else(|| std::env::var("CALLER_CONFIG_PATH").ok())
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match load_config(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !is_e164(&to) {
        tracing::error!(to = %to, "destination must be an E.164 number like +15551234567");
        return ExitCode::from(2);
    }

    let client = match TwilioClient::new(config.twilio.clone()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build Twilio client");
            return ExitCode::FAILURE;
        }
    };

    let call = outbound_call(&config, &to);
    match client.create_call(&call).await {
        Ok(call_sid) => {
            tracing::info!(call_sid = %call_sid, to = %to, webhook = %call.url, "call started");
            println!("{call_sid}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(to = %to, error = %e, "failed to place call");
            ExitCode::FAILURE
        }
    }
}
