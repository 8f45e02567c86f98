// src/main.rs
// advisor - submit a background and questions, stream back ordered answers

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use advisor::cli::{AdvisoryRequest, CliArgs, StreamingDisplay};
use advisor::config::{AdvisorConfig, CONFIG};
use advisor::session::{SessionController, SessionSettings, SessionState};
use advisor::transport::WsConnector;

/// Exit status for input rejected before connecting
const EXIT_VALIDATION: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();

    let mut config = CONFIG.clone();
    args.apply_to(&mut config);
    init_tracing(&config)?;
    config.validate()?;

    let request = AdvisoryRequest::from_args(&args)?;

    let connector = WsConnector::new(config.service_url.clone());
    info!("Service: {}", connector.url());
    info!("Model: {}", config.model);

    let mut controller = SessionController::new(connector, SessionSettings::from(&config));

    if let Err(e) = controller.submit(&request.background, request.questions.as_slice()) {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::from(EXIT_VALIDATION));
    }

    let mut display = StreamingDisplay::new(io::stdout(), args.format);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let update = tokio::select! {
            update = controller.next_update() => update,
            _ = &mut ctrl_c => {
                warn!("Interrupted, closing session");
                None
            }
        };

        let Some(update) = update else {
            break;
        };
        display.handle_update(&update, &controller.view())?;

        if controller.state().is_terminal() {
            break;
        }
    }

    controller.close();
    display.finish(&controller.view())?;

    Ok(match controller.state() {
        SessionState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn init_tracing(config: &AdvisorConfig) -> Result<()> {
    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    // debug logs carry their source location
    let debug = config.is_debug();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
