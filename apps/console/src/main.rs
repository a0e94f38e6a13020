use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ConsoleError, LabConsole, ServiceHandles, WorkflowEvent};
use futures::StreamExt;
use hypha_integration::{
    HyphaClient, HyphaConfig, RemoteIncubator, RemoteMicroscope, RemoteRoboticArm,
};
use serde::Serialize;
use shared::domain::{MicroscopeId, Slot};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod render;
mod settings;

use cli::{Cli, Command};
use settings::{load_settings, ConsoleSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }

    let console = connect(&settings)?;
    let printer = spawn_event_printer(console.subscribe_events());
    let outcome = run(&console, &settings, cli.command, cli.json).await;

    // the printer ends once every event sender is gone
    drop(console);
    printer.await.context("event printer panicked")?;
    outcome
}

fn connect(settings: &ConsoleSettings) -> Result<LabConsole> {
    let config = HyphaConfig::new(&settings.server_url, settings.workspace.clone())?
        .with_token(settings.token.clone())
        .with_request_timeout(settings.request_timeout());
    let client = HyphaClient::new(config)?;
    info!(
        server_url = %settings.server_url,
        workspace = %settings.workspace,
        "connecting to lab services"
    );

    let services = ServiceHandles::new()
        .with_incubator(Arc::new(
            RemoteIncubator::new(client.clone(), &settings.incubator_service_id)
                .with_batched_listing(settings.batched_listing),
        ))
        .with_robotic_arm(Arc::new(RemoteRoboticArm::new(
            client.clone(),
            &settings.robotic_arm_service_id,
        )))
        .with_microscope(
            MicroscopeId::ONE,
            Arc::new(RemoteMicroscope::new(
                client.clone(),
                &settings.microscope_1_service_id,
            )),
        )
        .with_microscope(
            MicroscopeId::TWO,
            Arc::new(RemoteMicroscope::new(client, &settings.microscope_2_service_id)),
        );
    Ok(LabConsole::new(services))
}

fn spawn_event_printer(events: broadcast::Receiver<WorkflowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => eprintln!("{event}"),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                }
            }
        }
    })
}

async fn run(
    console: &LabConsole,
    settings: &ConsoleSettings,
    command: Command,
    json: bool,
) -> Result<()> {
    let registry = console.registry();
    match command {
        Command::Slots { all } => {
            let cache = registry.refresh().await?;
            if json {
                let visible: Vec<&Slot> = cache
                    .slots()
                    .iter()
                    .filter(|slot| all || slot.is_occupied())
                    .collect();
                print_json(&visible)?;
            } else {
                print!("{}", render::slot_table(cache.slots(), all));
            }
        }
        Command::Watch { interval_secs } => {
            let every = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.refresh_interval());
            let refresh = console.spawn_refresh_loop(every);
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            refresh.stop();
        }
        Command::Add(args) => {
            let token = console.begin_operation("add sample")?;
            let added = registry.add_sample(&token, args.slot, &args.form()).await?;
            token.complete();
            print_slot(&added, json)?;
        }
        Command::Remove { slot } => {
            let token = console.begin_operation("remove sample")?;
            registry.remove_sample(&token, slot).await?;
            token.complete();
            println!("slot {slot} cleared");
        }
        Command::Edit(args) => {
            let token = console.begin_operation("edit sample")?;
            let edited = registry
                .edit_sample(&token, args.slot, &args.form())
                .await
                .inspect_err(|err| {
                    if let ConsoleError::EditIncomplete { removed, .. } = err {
                        if let Some(hint) = render::restore_hint(removed) {
                            eprintln!("to restore the previous record run: {hint}");
                        }
                    }
                })?;
            token.complete();
            print_slot(&edited, json)?;
        }
        Command::Unload { microscope } => {
            let token = console.begin_operation("unload microscope")?;
            let returned = registry
                .return_sample_from_microscope(&token, microscope)
                .await?;
            token.complete();
            print_slot(&returned, json)?;
        }
        Command::Load { slot, microscope } => {
            let token = console.begin_operation("load microscope")?;
            let loaded = registry
                .load_sample_onto_microscope(&token, slot, microscope)
                .await?;
            token.complete();
            print_slot(&loaded, json)?;
        }
        Command::Conflict { microscope } => {
            let occupant = console
                .workflow()
                .check_microscope_conflict(microscope)
                .await?;
            if json {
                print_json(&occupant)?;
            } else {
                println!("{}", render::conflict_line(microscope, occupant.as_ref()));
            }
        }
        Command::Environment => {
            let environment = console.environment().await?;
            if json {
                print_json(&environment)?;
            } else {
                println!("{}", render::environment_line(&environment));
            }
        }
        Command::MicroscopeStatus { microscope } => {
            let status = console
                .microscope(microscope)?
                .get_status()
                .await
                .map_err(|error| ConsoleError::remote("read microscope status", error))?;
            print_json(&status)?;
        }
    }
    Ok(())
}

fn print_slot(slot: &Slot, json: bool) -> Result<()> {
    if json {
        print_json(slot)
    } else {
        println!("{}", render::slot_summary(slot));
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
