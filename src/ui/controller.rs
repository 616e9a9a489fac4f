// Console Controller - Line-oriented front-end over the control bridge
//
// This module contains the ConsoleController which coordinates between:
// - The foreground queue (engine events and user input lines)
// - LiveRegistry (what the user sees in `list`)
// - AddSession (the file selection dialog, in text form)
// - BridgeHandle (every mutating action goes through submit)
//
// The controller never blocks on the engine. It only blocks on its own queue.

use crate::engine::{BridgeEvent, EngineCommand};
use crate::format::{activity_status, humanize_size, progress_permille, transfer_status};
use crate::models::{TorrentDescriptor, TorrentId, TorrentSnapshot};
use crate::registry::LiveRegistry;
use crate::selection::AddSession;
use crate::ui::bridge::BridgeHandle;
use crate::ui::dispatcher::ForegroundQueue;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::sync::LazyLock;
use thiserror::Error;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|(\S+)"#).expect("Invalid token regex"));

const HELP: &str = "\
Commands:
  list                        show every torrent
  add <descriptor.json>       open an add-session for a torrent
  files                       show the add-session's file tree
  toggle <path>...            flip the selection of files or directories
  dir <path>                  set the add-session's download directory
  ok                          submit the add-session
  cancel                      discard the add-session
  pause <id-prefix>...        pause torrents
  resume <id-prefix>...       resume torrents
  remove <id-prefix>...       remove torrents
  help                        show this text
  quit                        stop the engine and exit";

/// Everything the foreground dispatcher wakes up for
#[derive(Debug, Clone, PartialEq)]
pub enum ForegroundMessage {
    /// Notification from the engine loop
    Bridge(BridgeEvent),
    /// One line typed by the user
    Input(String),
    /// The input stream ended
    InputClosed,
}

impl From<BridgeEvent> for ForegroundMessage {
    fn from(event: BridgeEvent) -> Self {
        ForegroundMessage::Bridge(event)
    }
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Add(Utf8PathBuf),
    Files,
    Toggle(Vec<String>),
    Dir(Utf8PathBuf),
    Ok,
    Cancel,
    Pause(Vec<String>),
    Resume(Vec<String>),
    Remove(Vec<String>),
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("unbalanced quote")]
    UnbalancedQuote,
}

/// Split a line into words; double quotes group words containing spaces
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    if line.matches('"').count() % 2 != 0 {
        return Err(ParseError::UnbalancedQuote);
    }
    Ok(TOKEN_PATTERN
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect())
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut tokens = tokenize(line)?.into_iter();
    let Some(name) = tokens.next() else {
        return Err(ParseError::Empty);
    };
    let args: Vec<String> = tokens.collect();

    let one = |command: &'static str| -> Result<Utf8PathBuf, ParseError> {
        args.first()
            .map(Utf8PathBuf::from)
            .ok_or(ParseError::MissingArgument(command))
    };
    let many = |command: &'static str| -> Result<Vec<String>, ParseError> {
        if args.is_empty() {
            Err(ParseError::MissingArgument(command))
        } else {
            Ok(args.clone())
        }
    };

    Ok(match name.to_ascii_lowercase().as_str() {
        "list" | "ls" => ConsoleCommand::List,
        "add" => ConsoleCommand::Add(one("add")?),
        "files" => ConsoleCommand::Files,
        "toggle" => ConsoleCommand::Toggle(many("toggle")?),
        "dir" => ConsoleCommand::Dir(one("dir")?),
        "ok" => ConsoleCommand::Ok,
        "cancel" => ConsoleCommand::Cancel,
        "pause" => ConsoleCommand::Pause(many("pause")?),
        "resume" => ConsoleCommand::Resume(many("resume")?),
        "remove" | "rm" => ConsoleCommand::Remove(many("remove")?),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return Err(ParseError::Unknown(name)),
    })
}

/// Render one registry entry the way `list` shows it
pub fn status_line(snapshot: &TorrentSnapshot) -> String {
    let permille = progress_permille(snapshot);
    format!(
        "{}  {:>3}.{}%  {}\n        {}\n        {}",
        &snapshot.id.to_hex()[..8],
        permille / 10,
        permille % 10,
        snapshot.name,
        transfer_status(snapshot),
        activity_status(snapshot)
    )
}

/// Console controller that drives the bridge from text commands
///
/// # Example
/// ```ignore
/// let (sender, mut queue) = foreground_queue::<ForegroundMessage>();
/// let bridge = ControlBridge::new(engine, bridge_config, sender.clone());
/// bridge.start()?;
///
/// let mut controller = ConsoleController::new(bridge.handle(), download_dir, io::stdout());
/// controller.run(&mut queue)?;  // Blocks until `quit` or end of input
/// bridge.stop()?;
/// ```
pub struct ConsoleController<W: Write> {
    registry: LiveRegistry,
    bridge: BridgeHandle,
    session: Option<AddSession>,

    /// Last directory chosen in an add-session; seeds the next one
    download_dir: Utf8PathBuf,

    out: W,
}

impl<W: Write> ConsoleController<W> {
    /// Create a new console controller
    ///
    /// # Arguments
    /// * `bridge` - Submission handle of a started bridge
    /// * `download_dir` - Initial destination for add-sessions
    /// * `out` - Where command output is written
    pub fn new(bridge: BridgeHandle, download_dir: impl Into<Utf8PathBuf>, out: W) -> Self {
        Self {
            registry: LiveRegistry::new(),
            bridge,
            session: None,
            download_dir: download_dir.into(),
            out,
        }
    }

    pub fn registry(&self) -> &LiveRegistry {
        &self.registry
    }

    pub fn session(&self) -> Option<&AddSession> {
        self.session.as_ref()
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Dispatch messages until `quit`, end of input, or every sender is gone
    pub fn run(&mut self, queue: &mut ForegroundQueue<ForegroundMessage>) -> Result<()> {
        tracing::info!("console controller running");
        while let Some(message) = queue.next_blocking() {
            if !self.handle(message)? {
                break;
            }
        }
        tracing::info!("console controller finished");
        Ok(())
    }

    /// Handle one message; returns `false` when the controller should exit
    pub fn handle(&mut self, message: ForegroundMessage) -> Result<bool> {
        match message {
            ForegroundMessage::Bridge(event) => {
                self.on_event(event)?;
                Ok(true)
            }
            ForegroundMessage::Input(line) => self.on_input(&line),
            ForegroundMessage::InputClosed => {
                tracing::debug!("input closed");
                Ok(false)
            }
        }
    }

    fn on_event(&mut self, event: BridgeEvent) -> Result<()> {
        if let BridgeEvent::CommandFailed { command, message } = &event {
            writeln!(self.out, "error: {} failed: {}", command, message)?;
            return Ok(());
        }

        if let Err(e) = self.registry.apply(&event) {
            tracing::warn!(error = %e, "registry rejected engine event");
            return Ok(());
        }

        match &event {
            BridgeEvent::Added(snapshot) => writeln!(
                self.out,
                "added {} {}",
                &snapshot.id.to_hex()[..8],
                snapshot.name
            )?,
            BridgeEvent::Removed(id) => writeln!(self.out, "removed {}", &id.to_hex()[..8])?,
            BridgeEvent::Changed(_) | BridgeEvent::CommandFailed { .. } => {}
        }
        Ok(())
    }

    fn on_input(&mut self, line: &str) -> Result<bool> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(ParseError::Empty) => return Ok(true),
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                return Ok(true);
            }
        };

        tracing::debug!(?command, "console command");
        match command {
            ConsoleCommand::List => self.list()?,
            ConsoleCommand::Add(path) => self.open_session(&path)?,
            ConsoleCommand::Files => self.show_files()?,
            ConsoleCommand::Toggle(paths) => self.toggle(&paths)?,
            ConsoleCommand::Dir(dir) => self.set_dir(dir)?,
            ConsoleCommand::Ok => self.submit_session()?,
            ConsoleCommand::Cancel => {
                if self.session.take().is_some() {
                    writeln!(self.out, "add-session discarded")?;
                }
            }
            ConsoleCommand::Pause(prefixes) => {
                self.control(&prefixes, |id| EngineCommand::Pause { id })?
            }
            ConsoleCommand::Resume(prefixes) => {
                self.control(&prefixes, |id| EngineCommand::Resume { id })?
            }
            ConsoleCommand::Remove(prefixes) => {
                self.control(&prefixes, |id| EngineCommand::Remove { id })?
            }
            ConsoleCommand::Help => writeln!(self.out, "{}", HELP)?,
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn list(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            writeln!(self.out, "no torrents")?;
            return Ok(());
        }
        for snapshot in self.registry.iter() {
            writeln!(self.out, "{}", status_line(snapshot))?;
        }
        Ok(())
    }

    fn open_session(&mut self, path: &Utf8Path) -> Result<()> {
        if self.session.is_some() {
            writeln!(self.out, "an add-session is already open (use `ok` or `cancel`)")?;
            return Ok(());
        }

        let descriptor = match read_descriptor(path) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(%path, error = %e, "could not read torrent descriptor");
                writeln!(self.out, "error: {:#}", e)?;
                return Ok(());
            }
        };

        if self.registry.contains(&descriptor.info_hash) {
            tracing::info!(id = %descriptor.info_hash, "torrent already added");
            writeln!(self.out, "error: this torrent is already added")?;
            return Ok(());
        }

        match AddSession::new(descriptor, self.download_dir.clone()) {
            Ok(session) => {
                self.session = Some(session);
                self.show_files()?;
            }
            Err(e) => writeln!(self.out, "error: {}", e)?,
        }
        Ok(())
    }

    fn show_files(&mut self) -> Result<()> {
        let Some(session) = &self.session else {
            writeln!(self.out, "no add-session open")?;
            return Ok(());
        };

        let descriptor = session.descriptor();
        writeln!(
            self.out,
            "{} ({})",
            descriptor.name,
            humanize_size(descriptor.total_size())
        )?;
        for (tier, urls) in session.announce_tiers().iter().enumerate() {
            writeln!(self.out, "  tier {}: {}", tier + 1, urls.join(", "))?;
        }
        if let Some(tree) = session.tree() {
            for entry in tree.entries() {
                let size = entry.length.map(|len| format!(" ({})", humanize_size(len)));
                writeln!(
                    self.out,
                    "  {}{} {}{}",
                    "  ".repeat(entry.depth),
                    entry.state.marker(),
                    entry.name,
                    size.unwrap_or_default()
                )?;
            }
        }
        writeln!(self.out, "download to: {}", session.download_dir())?;
        writeln!(self.out, "{}", session.summary())?;
        Ok(())
    }

    fn toggle(&mut self, paths: &[String]) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            writeln!(self.out, "no add-session open")?;
            return Ok(());
        };

        for path in paths {
            match session.toggle(path.as_str()) {
                Ok(state) => writeln!(self.out, "{} {}", state.marker(), path)?,
                Err(e) => writeln!(self.out, "error: {}", e)?,
            }
        }
        let summary = session.summary();
        writeln!(self.out, "{}", summary)?;
        Ok(())
    }

    fn set_dir(&mut self, dir: Utf8PathBuf) -> Result<()> {
        match self.session.as_mut() {
            Some(session) => {
                session.set_download_dir(dir);
                writeln!(self.out, "download to: {}", session.download_dir())?;
            }
            None => writeln!(self.out, "no add-session open")?,
        }
        Ok(())
    }

    fn submit_session(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            writeln!(self.out, "no add-session open")?;
            return Ok(());
        };

        if !session.can_submit() {
            writeln!(self.out, "{}", session.summary())?;
            self.session = Some(session);
            return Ok(());
        }

        self.download_dir = session.download_dir().to_path_buf();
        let request = session.submit()?;
        writeln!(self.out, "adding {}", request.descriptor.name)?;
        // The result comes back as an Added or CommandFailed event.
        let _ = self.bridge.submit(EngineCommand::Add(Box::new(request)));
        Ok(())
    }

    fn control(
        &mut self,
        prefixes: &[String],
        command: impl Fn(TorrentId) -> EngineCommand,
    ) -> Result<()> {
        for prefix in prefixes {
            match self.registry.resolve_prefix(prefix) {
                Ok(Some(id)) => {
                    let _ = self.bridge.submit(command(id));
                }
                Ok(None) => tracing::debug!(%prefix, "no torrent matches prefix"),
                Err(e) => writeln!(self.out, "error: {}", e)?,
            }
        }
        Ok(())
    }
}

fn read_descriptor(path: &Utf8Path) -> Result<TorrentDescriptor> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read torrent descriptor: {}", path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse torrent descriptor: {}", path))
}
