use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use arbor_wm::actor::reactor::{
    self, Command, Event, MonitorInfo, Reactor, ReactorCommand, Record, SharedReactor,
};
use arbor_wm::common::config::{Config, config_file};
use arbor_wm::common::log;
use arbor_wm::layout_engine::LayoutEngine;
use arbor_wm::sys::geometry::Rect;
use arbor_wm::sys::headless::{HeadlessWindow, HeadlessWindowSystem};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Parser)]
struct Cli {
    /// Check the configuration file and exit.
    #[arg(long)]
    validate: bool,

    /// Record reactor events to the specified file path. Overwrites the file if
    /// it exists.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Size of the simulated display, e.g. `1920x1080`.
    #[arg(long, default_value = "1920x1080", value_parser = parse_size)]
    display: (i32, i32),

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-run a file written with --record and print the resulting tree.
    Replay { file: PathBuf },
}

fn parse_size(s: &str) -> Result<(i32, i32), String> {
    let (w, h) = s.split_once('x').ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| v.trim().parse::<i32>().map_err(|e| format!("{v:?}: {e}"));
    Ok((parse(w)?, parse(h)?))
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();
    install_panic_hook();

    if let Err(err) = run(opt) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run(opt: Cli) -> anyhow::Result<()> {
    if let Some(Commands::Replay { file }) = &opt.command {
        let reactor = reactor::replay(file, |event, result| match result {
            Ok(()) => println!("ok   {event:?}"),
            Err(err) => println!("err  {event:?}: {err}"),
        })?;
        println!("{}", reactor.layout_engine().draw_tree());
        return Ok(());
    }

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        Config::read(&config_path)
            .with_context(|| format!("could not read {}", config_path.display()))?
    } else {
        Config::default()
    };

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config validation passed");
            return Ok(());
        }
        for issue in &issues {
            eprintln!("{issue}");
        }
        anyhow::bail!("{} issue(s) found in {}", issues.len(), config_path.display());
    }

    let (broadcast_tx, mut broadcast_rx) = arbor_wm::actor::channel();
    let window_system = Arc::new(Mutex::new(HeadlessWindowSystem::new()));
    let reactor = SharedReactor::new(Reactor::new(
        config.clone(),
        LayoutEngine::new(config.gaps.clone()),
        Box::new(window_system.clone()),
        Record::new(opt.record.as_deref())?,
        broadcast_tx,
    ));
    let (events_tx, reactor_thread) = reactor.spawn_event_loop()?;

    std::thread::Builder::new().name("broadcast".to_string()).spawn(move || {
        while let Some((_span, event)) = broadcast_rx.blocking_recv() {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(%err, "could not serialize broadcast"),
            }
        }
    })?;

    let (width, height) = opt.display;
    let rect = Rect::new(0, 0, width, height);
    events_tx.send(Event::MonitorsChanged(vec![MonitorInfo {
        device_name: "HEADLESS1".to_string(),
        rect,
        working_rect: rect,
        scale_factor: 1.0,
    }]));

    info!("reading events from stdin, one per line");
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match ron::de::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, line, "could not parse event");
                continue;
            }
        };
        // The simulated OS learns about a window the moment it is shown.
        if let Event::WindowShown(handle) = event {
            window_system.lock().windows.entry(handle).or_insert_with(HeadlessWindow::default);
        }
        events_tx.send(event);
    }

    events_tx.send(Event::Command(Command::Reactor(ReactorCommand::SaveRecoveryCache {
        path: None,
    })));
    drop(events_tx);
    if reactor_thread.join().is_err() {
        anyhow::bail!("reactor thread panicked");
    }
    Ok(())
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // A panic on any thread takes the whole process down.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
