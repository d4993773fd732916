//! Console front-end for the Petri run controller.
//!
//! Wires the run controller to a remote engine over HTTP (or to the
//! in-process stub engine with `--offline`) and to a line-oriented
//! keyboard surface on stdin.
//!
//! # Architecture
//!
//! ```text
//! stdin --> key line --> KeyboardBus --> CommandDispatcher --+
//!       \-> command line ---------------------------------+--> RunController --> engine
//! ```
//!
//! After every line the controller's render view is printed as a status
//! block.

mod cli;
mod commands;
mod error;
mod status;

use std::sync::Arc;

use clap::Parser;
use petri_control::config::ControlConfig;
use petri_control::dispatch::{CommandDispatcher, Dispatch, KeyboardBus};
use petri_control::engine::SimulationEngine;
use petri_control::engine::http::HttpEngine;
use petri_control::engine::memory::InMemoryEngine;
use petri_control::prefs::{FileBackend, PreferenceBackend, PreferenceStore};
use petri_control::request::RunRequest;
use petri_control::RunController;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::commands::{ConsoleCommand, Input, USAGE, parse_line};
use crate::error::ConsoleError;

/// Whether the input loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Application entry point.
///
/// Loads configuration, initializes logging, opens the preference file,
/// builds the engine client and controller, restores the last simulation,
/// then reads stdin until EOF or `quit`.
///
/// # Errors
///
/// Returns an error if configuration, the engine client, or stdin fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ControlConfig::load_or_default(&cli.config).map_err(ConsoleError::from)?;

    // Logs go to stderr so the status block on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        config = %cli.config.display(),
        offline = cli.offline,
        "petri-console starting"
    );

    let backend = FileBackend::open(config.preferences.path.clone());
    info!(path = %backend.path().display(), "preferences opened");
    let prefs = PreferenceStore::new(backend);

    if cli.offline {
        info!("using the in-process stub engine");
        let controller = RunController::new(InMemoryEngine::new(), prefs, &config.controls);
        run(&controller, &config).await?;
    } else {
        let engine = HttpEngine::new(&config.engine).map_err(ConsoleError::from)?;
        info!(base_url = engine.base_url(), "using the HTTP engine");
        let controller = RunController::new(engine, prefs, &config.controls);
        run(&controller, &config).await?;
    }

    info!("petri-console exiting");
    Ok(())
}

/// Restore the last simulation, then serve stdin until EOF or `quit`.
async fn run<E, B>(
    controller: &RunController<E, B>,
    config: &ControlConfig,
) -> Result<(), ConsoleError>
where
    E: SimulationEngine,
    B: PreferenceBackend,
{
    match controller.restore().await {
        Ok(Some(id)) => info!(simulation_id = %id, "restored last simulation"),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "could not restore last simulation"),
    }

    let bus = Arc::new(KeyboardBus::new());
    let mut dispatcher =
        CommandDispatcher::new(Arc::clone(&bus), config.controls.keyboard_shortcuts);
    dispatcher.mount();
    if !dispatcher.is_enabled() {
        info!("keyboard shortcuts disabled by configuration");
    }

    println!("{USAGE}\n");
    println!("{}", status::render(&controller.view(), dispatcher.help_visible()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Input::Empty) => continue,
                    Ok(Input::Key(event)) => {
                        // Delivered back to us through the dispatcher branch.
                        bus.emit(&event);
                        continue;
                    }
                    Ok(Input::Command(command)) => {
                        if execute(controller, config, command).await == Flow::Quit {
                            break;
                        }
                    }
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                }
            }
            Some(event) = dispatcher.recv() => {
                match dispatcher.dispatch(&event, controller).await {
                    Dispatch::Failed(command, kind) => {
                        println!("{command:?} failed ({kind:?})");
                    }
                    Dispatch::Gated(command) => println!("{command:?} is not available right now"),
                    Dispatch::Disabled => println!("keyboard shortcuts are disabled"),
                    Dispatch::Ignored => println!("no shortcut for that key"),
                    Dispatch::Suppressed | Dispatch::HelpToggled(_) | Dispatch::Ran(_) => {}
                }
            }
        }
        println!("\n{}", status::render(&controller.view(), dispatcher.help_visible()));
    }
    Ok(())
}

/// Run one console command against the controller.
///
/// Controller failures are printed, not propagated: the user re-issues the
/// command.
async fn execute<E, B>(
    controller: &RunController<E, B>,
    config: &ControlConfig,
    command: ConsoleCommand,
) -> Flow
where
    E: SimulationEngine,
    B: PreferenceBackend,
{
    let outcome = match command {
        ConsoleCommand::Create { name, target } => {
            let name = name.unwrap_or_else(|| config.controls.default_run_name.clone());
            let mut request = RunRequest::new(name);
            if let Some(target) = target {
                request = request.with_target(target);
            }
            controller
                .create_run(&request)
                .await
                .map(|id| println!("created {id}"))
        }
        ConsoleCommand::Load(id) => controller.load(&id).await.map(|applied| {
            if !applied {
                println!("load of {id} was superseded");
            }
        }),
        ConsoleCommand::List => controller
            .list_simulations()
            .await
            .map(|listing| println!("{}", status::render_listing(&listing))),
        ConsoleCommand::Speed(raw) => controller.set_speed(raw).await.map(drop),
        ConsoleCommand::Autosave(enabled) => controller.set_autosave(enabled),
        ConsoleCommand::Target(target) => controller.set_target_generation(target),
        ConsoleCommand::Save { name, description } => controller
            .save_snapshot(&name, description.as_deref())
            .await
            .map(|receipt| println!("saved '{}' at {}", receipt.name, receipt.saved_at)),
        ConsoleCommand::RemoteReset => controller.reset_remote().await,
        ConsoleCommand::Dismiss => {
            controller.dismiss_error();
            Ok(())
        }
        ConsoleCommand::Status => Ok(()),
        ConsoleCommand::Help => {
            println!("{USAGE}");
            Ok(())
        }
        ConsoleCommand::Quit => return Flow::Quit,
    };
    if let Err(err) = outcome {
        println!("error: {err}");
    }
    Flow::Continue
}
