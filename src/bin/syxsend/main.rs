use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::{io::IsTerminal, process::ExitCode};
use syxsend::{
    args::{CommandTask, SyxArgs},
    config::{Backend, TransferConfig},
    error::SysexError,
    gui::port_selector,
    interrupt::{self, CancelToken},
    pipeline,
    transport::{EndpointSelector, Transport},
};

// Example:
// cargo run --bin syxsend -- --port Freetribe hex table.h
// cargo run --bin syxsend -- --out dump.syx wav -n 64 kick.wav

const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    interrupt::install();

    let args = SyxArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(SysexError::Cancelled) => {
            warn!("Interrupted, endpoint closed");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("{}", e);
            if interrupt::interrupted() {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(args: &SyxArgs) -> Result<(), SysexError> {
    let mut config = match &args.config {
        Some(path) => TransferConfig::load(path)?,
        None => TransferConfig::default(),
    };
    args.apply(&mut config);

    let mut transport = pipeline::transport_for(&config.backend);

    let source = match (&args.command, args.source()) {
        (CommandTask::List, _) => return list(&*transport),
        (CommandTask::Inspect(_), Some(source)) => {
            let settings = config.settings_for(&source);
            let inspection = pipeline::inspect(&source, &settings)?;
            println!("{}", source.path().display());
            println!("  values:        {}", inspection.values);
            println!("  payload bytes: {}", inspection.payload_len);
            println!(
                "  chunk frames:  {} of up to {} bytes",
                inspection.chunked_frames, inspection.chunk_size
            );
            println!("  first bytes:   {:02X?}", inspection.head);
            println!(
                "  round trip:    {}",
                if inspection.round_trips { "ok" } else { "MISMATCH" }
            );
            return Ok(());
        }
        (_, Some(source)) => source,
        (_, None) => return Ok(()),
    };

    let settings = config.settings_for(&source);
    let cancel = CancelToken::new();

    // Only ask when nothing picked an endpoint and someone is there to answer.
    let pick = args.port.is_none()
        && settings.endpoint == EndpointSelector::First
        && !matches!(settings.backend, Backend::SyxFile { .. })
        && std::io::stdin().is_terminal();
    let report = if pick {
        pipeline::run_interactive(
            &source,
            &settings,
            &mut *transport,
            cancel,
            |endpoints, backend| Ok(port_selector(endpoints, backend)?),
        )?
    } else {
        pipeline::run(&source, &settings, &mut *transport, cancel)?
    };
    info!(
        "Done: {} strategy, {} frames, {} bytes on the wire",
        report.strategy, report.frames_sent, report.bytes_sent
    );
    Ok(())
}

fn list(transport: &dyn Transport) -> Result<(), SysexError> {
    let endpoints = transport.list_endpoints()?;
    if endpoints.is_empty() {
        println!("No {} outputs found", transport.backend_name());
    }
    for endpoint in endpoints {
        println!("\t{}", endpoint);
    }
    Ok(())
}
