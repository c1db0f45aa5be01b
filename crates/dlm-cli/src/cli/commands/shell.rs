//! `dlm shell` – interactive front end over a task registry.
//!
//! Registry events and stdin lines are funneled into one channel so rows are
//! only ever rendered from this thread.

use anyhow::{Context, Result};
use dlm_core::config::DlmConfig;
use dlm_core::{DownloadTask, RegistryEvent, RegistrySink, TaskRegistry, TaskUrl};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use crate::cli::render::{describe_actions, format_row, header, RowTracker};

const HELP: &str = "\
commands:
  add <url>      start downloading <url>
  list           show all rows
  pause <row>    pause a downloading row
  resume <row>   resume a paused or failed row
  cancel <row>   cancel a row
  clear <row>    remove a finished, cancelled or failed row
  help           show this text
  quit           cancel running downloads and exit";

enum UiMessage {
    Registry(RegistryEvent),
    Input(String),
    InputClosed,
}

/// Forwards registry events into the UI channel.
struct UiSink(Sender<UiMessage>);

impl RegistrySink for UiSink {
    fn on_registry_event(&self, event: RegistryEvent) {
        let _ = self.0.send(UiMessage::Registry(event));
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Add(String),
    List,
    Pause(usize),
    Resume(usize),
    Cancel(usize),
    Clear(usize),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_string())?;
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for `{verb}`"));
    }
    let row = |arg: Option<&str>| -> Result<usize, String> {
        let arg = arg.ok_or_else(|| format!("`{verb}` needs a row number"))?;
        arg.parse()
            .map_err(|_| format!("`{arg}` is not a row number"))
    };
    let bare = |cmd: ShellCommand| match arg {
        None => Ok(cmd),
        Some(_) => Err(format!("`{verb}` takes no arguments")),
    };
    match verb.to_ascii_lowercase().as_str() {
        "add" => arg
            .map(|url| ShellCommand::Add(url.to_string()))
            .ok_or_else(|| "`add` needs a URL".to_string()),
        "list" | "ls" => bare(ShellCommand::List),
        "pause" => row(arg).map(ShellCommand::Pause),
        "resume" => row(arg).map(ShellCommand::Resume),
        "cancel" => row(arg).map(ShellCommand::Cancel),
        "clear" | "rm" => row(arg).map(ShellCommand::Clear),
        "help" | "?" => bare(ShellCommand::Help),
        "quit" | "exit" => bare(ShellCommand::Quit),
        other => Err(format!("unknown command `{other}` (try `help`)")),
    }
}

pub fn run_shell(cfg: &DlmConfig, download_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(download_dir)
        .with_context(|| format!("create download dir {}", download_dir.display()))?;

    let (tx, rx) = mpsc::channel();
    let registry = TaskRegistry::new(Arc::new(UiSink(tx.clone())));
    let options = cfg.transfer_options();

    std::thread::Builder::new()
        .name("dlm-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(UiMessage::Input(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(UiMessage::InputClosed);
        })
        .context("spawn stdin reader")?;

    println!("saving to {}; type `help` for commands", download_dir.display());
    prompt();
    let mut tracker = RowTracker::default();
    for message in rx {
        match message {
            UiMessage::Registry(RegistryEvent::RowUpdated(row)) => {
                if let Some(task) = registry.get(row) {
                    if tracker.should_render(&task) {
                        println!("{}", format_row(row, &task));
                    }
                }
            }
            UiMessage::Registry(RegistryEvent::RowInserted(row)) => {
                println!("added row {row}");
            }
            UiMessage::Registry(RegistryEvent::RowRemoved(row)) => {
                println!("cleared row {row}");
            }
            UiMessage::Input(line) => {
                if line.trim().is_empty() {
                    prompt();
                    continue;
                }
                match parse_command(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(cmd) => execute(&registry, cmd, download_dir, &options),
                    Err(msg) => eprintln!("{msg}"),
                }
                prompt();
            }
            UiMessage::InputClosed => break,
        }
    }

    shutdown(&registry);
    Ok(())
}

fn execute(
    registry: &TaskRegistry,
    cmd: ShellCommand,
    download_dir: &Path,
    options: &dlm_core::TransferOptions,
) {
    match cmd {
        ShellCommand::Add(raw) => match TaskUrl::parse(&raw) {
            Ok(url) => {
                let task = DownloadTask::start(url, download_dir, options.clone());
                println!("-> {}", task.destination().display());
                registry.add(task);
            }
            Err(e) => eprintln!("invalid URL: {e}"),
        },
        ShellCommand::List => {
            println!("{}", header());
            for (row, task) in registry.tasks().iter().enumerate() {
                println!("{}", format_row(row, task));
                if let Some(err) = task.last_error() {
                    println!("     error: {err}");
                }
            }
        }
        ShellCommand::Pause(row) => act(registry, row, "pause", |t| t.actions().pause, |t| t.pause()),
        ShellCommand::Resume(row) => {
            act(registry, row, "resume", |t| t.actions().resume, |t| t.resume())
        }
        ShellCommand::Cancel(row) => {
            act(registry, row, "cancel", |t| t.actions().cancel, |t| t.cancel())
        }
        ShellCommand::Clear(row) => match registry.remove_at(row) {
            Ok(task) => tracing::debug!(task = %task.id(), "cleared from shell"),
            Err(e) => eprintln!("cannot clear: {e}"),
        },
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
    }
}

/// Runs a lifecycle command on `row` if its current status allows it.
fn act(
    registry: &TaskRegistry,
    row: usize,
    name: &str,
    allowed: impl Fn(&DownloadTask) -> bool,
    apply: impl Fn(&DownloadTask) -> bool,
) {
    let Some(task) = registry.get(row) else {
        eprintln!("no row {row}");
        return;
    };
    if !allowed(&task) || !apply(&task) {
        let available = describe_actions(task.actions());
        let available = if available.is_empty() { "none" } else { available.as_str() };
        eprintln!(
            "cannot {name} row {row} ({}); available: {available}",
            task.status()
        );
    }
}

fn shutdown(registry: &TaskRegistry) {
    let tasks = registry.tasks();
    for task in &tasks {
        if task.status().is_active() {
            task.cancel();
        }
    }
    for task in &tasks {
        task.wait();
    }
    tracing::info!("shell exited with {} row(s)", tasks.len());
}

fn prompt() {
    print!("dlm> ");
    let _ = io::stdout().flush();
}
