// ControlBridge - Coordinates between the foreground dispatcher and the engine loop
//
// This is the critical abstraction that lets two execution contexts cooperate:
// 1. The foreground's synchronous dispatcher, which must never block on engine work
// 2. A single background thread running one current-thread tokio runtime that
//    hosts every engine routine
//
// The bridge provides:
// - Non-blocking command submission from any thread (commands are queued in FIFO order)
// - Event delivery from the engine into the foreground queue
// - Persisted state load before the run phase and save after the loop stops
// - An idempotent, blocking stop()

use crate::engine::events::EventTarget;
use crate::engine::{
    BridgeEvent, CommandOutcome, Engine, EngineCommand, EngineError, EventSink,
};
use crate::metrics::BridgeMetrics;
use crate::models::ClientConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

/// Settings for the background engine loop
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Opaque engine state file; absent means cold start
    pub state_file: Utf8PathBuf,
    /// Upper bound on the engine's shutdown routine
    pub shutdown_timeout: Duration,
    /// Name of the background thread
    pub thread_name: String,
}

impl BridgeConfig {
    pub fn new(state_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            shutdown_timeout: Duration::from_secs(5),
            thread_name: "torrent-engine".to_string(),
        }
    }
}

impl From<&ClientConfig> for BridgeConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            shutdown_timeout: config.shutdown_timeout(),
            ..Self::new(config.state_file.clone())
        }
    }
}

/// Lifecycle of a [`ControlBridge`]
///
/// `Created → Running → Stopping → Stopped`; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Created,
    Running,
    Stopping,
    Stopped,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("engine failed to start: {0}")]
    EngineStartup(String),

    #[error("bridge was already started")]
    AlreadyStarted,

    #[error("failed to save engine state to {path}: {message}")]
    PersistenceSave { path: Utf8PathBuf, message: String },

    #[error("engine thread panicked")]
    WorkerPanicked,
}

/// Failure of one submitted command, as seen by the submitter
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("engine loop is not running")]
    Closed,
}

impl CommandError {
    /// The command referenced a torrent the engine does not know
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommandError::Engine(EngineError::NotFound(_)))
    }
}

pub type CommandResult = Result<CommandOutcome, CommandError>;

enum Message {
    Command {
        command: EngineCommand,
        reply: oneshot::Sender<CommandResult>,
    },
    Shutdown,
}

/// Result of a submitted command that may be waited on or ignored
///
/// Dropping a `Pending` discards the result; the command still runs and its
/// failures are still logged on the engine side.
#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<CommandResult>,
}

impl Pending {
    /// Block until the command has run.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> CommandResult {
        self.rx.blocking_recv().unwrap_or(Err(CommandError::Closed))
    }

    /// Non-blocking check; `None` while the command is still queued or running
    pub fn try_result(&mut self) -> Option<CommandResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CommandError::Closed)),
        }
    }

    /// Await the result from async code
    pub async fn recv(self) -> CommandResult {
        self.rx.await.unwrap_or(Err(CommandError::Closed))
    }
}

/// Cloneable, thread-safe handle for submitting commands
///
/// This is the lightweight half of the bridge that front-end code captures;
/// it cannot start or stop the engine.
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Message>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeHandle {
    /// Queue `command` onto the engine loop and return immediately
    pub fn submit(&self, command: EngineCommand) -> Pending {
        let (reply, rx) = oneshot::channel();
        let kind = command.kind();
        match self.commands.send(Message::Command { command, reply }) {
            Ok(()) => {
                self.metrics.record_submitted();
                tracing::debug!(command = %kind, "command queued");
            }
            Err(_) => {
                // The rejected message drops its reply sender, so `rx` resolves to Closed.
                tracing::warn!(command = %kind, "engine loop is gone - command discarded");
            }
        }
        Pending { rx }
    }
}

struct Worker {
    thread: JoinHandle<Result<(), BridgeError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the engine's background thread and cooperative scheduler
///
/// # Example
/// ```ignore
/// let (sender, mut queue) = foreground_queue::<ForegroundMessage>();
/// let bridge = ControlBridge::new(MemoryEngine::new(), BridgeConfig::new("state.bin"), sender);
/// bridge.start()?;
///
/// bridge.submit(EngineCommand::Pause { id });   // returns immediately
///
/// while let Some(message) = queue.next_blocking() {
///     // apply events to the registry, handle input...
/// }
///
/// bridge.stop()?;   // blocks until the engine has shut down and saved its state
/// ```
pub struct ControlBridge<E: Engine> {
    config: BridgeConfig,
    handle: BridgeHandle,
    target: EventTarget,
    metrics: Arc<BridgeMetrics>,

    // Moved onto the background thread by start()
    engine: Mutex<Option<E>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,

    state: Mutex<BridgeState>,
    // Signalled once a stop() in progress reaches `Stopped`
    stopped: Condvar,
    worker: Mutex<Option<Worker>>,
}

impl<E: Engine> ControlBridge<E> {
    /// Create a bridge in the `Created` state
    ///
    /// Engine events are converted with `M::from` and pushed into `events`, the
    /// sending half of the foreground queue.
    pub fn new<M>(engine: E, config: BridgeConfig, events: mpsc::UnboundedSender<M>) -> Self
    where
        M: From<BridgeEvent> + Send + 'static,
    {
        let metrics = Arc::new(BridgeMetrics::new());
        let (commands, inbox) = mpsc::unbounded_channel();
        Self {
            config,
            handle: BridgeHandle {
                commands,
                metrics: metrics.clone(),
            },
            target: EventTarget::new(events, metrics.clone()),
            metrics,
            engine: Mutex::new(Some(engine)),
            inbox: Mutex::new(Some(inbox)),
            state: Mutex::new(BridgeState::Created),
            stopped: Condvar::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BridgeState {
        *lock(&self.state)
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A cloneable submission handle for other threads and callbacks
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Queue `command` onto the engine loop without blocking
    ///
    /// Commands submitted before `start()` wait in the queue; commands
    /// submitted after `stop()` resolve to [`CommandError::Closed`].
    pub fn submit(&self, command: EngineCommand) -> Pending {
        self.handle.submit(command)
    }

    /// Spawn the background thread and bring the engine up
    ///
    /// Returns once the engine's startup routine has finished and persisted
    /// state has been loaded. A startup failure leaves the bridge `Stopped`.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut state = lock(&self.state);
        if *state != BridgeState::Created {
            return Err(BridgeError::AlreadyStarted);
        }

        let (Some(engine), Some(inbox)) = (lock(&self.engine).take(), lock(&self.inbox).take())
        else {
            return Err(BridgeError::AlreadyStarted);
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let background = Background {
            engine,
            inbox,
            sink: EventSink::from_target(self.target.clone()),
            target: self.target.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || background.run(ready_tx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                *state = BridgeState::Stopped;
                return Err(BridgeError::EngineStartup(format!(
                    "failed to spawn engine thread: {e}"
                )));
            }
        };

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {
                *state = BridgeState::Running;
                *lock(&self.worker) = Some(Worker { thread });
                tracing::info!(thread = %self.config.thread_name, "engine loop running");
                Ok(())
            }
            Ok(Err(message)) => {
                *state = BridgeState::Stopped;
                let _ = thread.join();
                tracing::error!(error = %message, "engine startup failed");
                Err(BridgeError::EngineStartup(message))
            }
            Err(_) => {
                *state = BridgeState::Stopped;
                let _ = thread.join();
                Err(BridgeError::EngineStartup(
                    "engine thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Shut the engine down, save its state and join the background thread
    ///
    /// Blocks until everything has finished. Only the first call does any
    /// work. A call made while another is still shutting down waits for it to
    /// finish and then returns `Ok(())`, as does any call after that. A failure
    /// to save state does not interrupt shutdown and is returned to the first
    /// caller once the thread is joined.
    pub fn stop(&self) -> Result<(), BridgeError> {
        {
            let mut state = lock(&self.state);
            match *state {
                BridgeState::Created => {
                    *state = BridgeState::Stopped;
                    return Ok(());
                }
                BridgeState::Stopping => {
                    let _state = self
                        .stopped
                        .wait_while(state, |s| *s != BridgeState::Stopped)
                        .unwrap_or_else(PoisonError::into_inner);
                    return Ok(());
                }
                BridgeState::Stopped => return Ok(()),
                BridgeState::Running => *state = BridgeState::Stopping,
            }
        }

        tracing::info!("stopping engine loop");
        let worker = lock(&self.worker).take();
        let result = match worker {
            Some(worker) => {
                // Queued behind every command submitted before this call.
                let _ = self.handle.commands.send(Message::Shutdown);
                match worker.thread.join() {
                    Ok(result) => result,
                    Err(_) => Err(BridgeError::WorkerPanicked),
                }
            }
            None => Ok(()),
        };

        *lock(&self.state) = BridgeState::Stopped;
        self.stopped.notify_all();
        self.metrics.log_summary();

        if let Err(e) = &result {
            tracing::error!(error = %e, "engine shutdown reported an error");
        } else {
            tracing::info!("engine loop stopped");
        }
        result
    }
}

impl<E: Engine> Drop for ControlBridge<E> {
    fn drop(&mut self) {
        if self.state() == BridgeState::Running {
            let _ = self.stop();
        }
    }
}

/// Everything the background thread owns
struct Background<E: Engine> {
    engine: E,
    inbox: mpsc::UnboundedReceiver<Message>,
    sink: EventSink,
    target: EventTarget,
    metrics: Arc<BridgeMetrics>,
    config: BridgeConfig,
}

impl<E: Engine> Background<E> {
    fn run(mut self, ready: oneshot::Sender<Result<(), String>>) -> Result<(), BridgeError> {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = ready.send(Err(format!("failed to build engine runtime: {e}")));
                return Ok(());
            }
        };
        let local = LocalSet::new();

        let sink = self.sink;
        let engine = &mut self.engine;
        if let Err(e) = local.block_on(&runtime, engine.start(sink)) {
            let _ = ready.send(Err(e.to_string()));
            return Ok(());
        }

        load_state(&mut self.engine, &self.config.state_file);

        if ready.send(Ok(())).is_err() {
            tracing::warn!("bridge dropped during startup");
        }

        local.block_on(
            &runtime,
            serve(
                &mut self.engine,
                &mut self.inbox,
                &self.target,
                &self.metrics,
                self.config.shutdown_timeout,
            ),
        );

        // Loop has stopped; nothing else touches the engine now.
        let saved = save_state(&self.engine, &self.config.state_file);
        drop(local);
        drop(runtime);
        saved
    }
}

/// The run phase: execute queued commands in order until a shutdown request
async fn serve<E: Engine>(
    engine: &mut E,
    inbox: &mut mpsc::UnboundedReceiver<Message>,
    target: &EventTarget,
    metrics: &BridgeMetrics,
    shutdown_timeout: Duration,
) {
    while let Some(message) = inbox.recv().await {
        match message {
            Message::Command { command, reply } => {
                let result = dispatch(engine, command, target, metrics).await;
                // The submitter may have dropped its Pending.
                let _ = reply.send(result);
            }
            Message::Shutdown => break,
        }
    }

    inbox.close();
    let mut discarded = 0;
    while let Ok(message) = inbox.try_recv() {
        if let Message::Command { reply, .. } = message {
            let _ = reply.send(Err(CommandError::Closed));
            discarded += 1;
        }
    }
    if discarded > 0 {
        tracing::warn!(discarded, "commands arrived after shutdown was requested");
    }

    match tokio::time::timeout(shutdown_timeout, engine.stop()).await {
        Ok(Ok(())) => tracing::debug!("engine shutdown routine finished"),
        Ok(Err(e)) => tracing::warn!(error = %e, "engine shutdown routine failed"),
        Err(_) => tracing::warn!(?shutdown_timeout, "engine shutdown routine timed out"),
    }
}

/// Run one command, keeping every failure on this side of the boundary
async fn dispatch<E: Engine>(
    engine: &mut E,
    command: EngineCommand,
    target: &EventTarget,
    metrics: &BridgeMetrics,
) -> CommandResult {
    let kind = command.kind();
    let id = command.target();

    match command.execute(engine).await {
        Ok(outcome) => {
            metrics.record_completed();
            tracing::debug!(command = %kind, %id, "command completed");
            Ok(outcome)
        }
        Err(EngineError::NotFound(missing)) => {
            // Usually a race with removal; there is nothing to tell the user.
            metrics.record_not_found();
            tracing::debug!(command = %kind, id = %missing, "ignoring command for unknown torrent");
            Err(CommandError::Engine(EngineError::NotFound(missing)))
        }
        Err(e) => {
            metrics.record_failed();
            tracing::warn!(command = %kind, %id, error = %e, "command failed");
            target.send(BridgeEvent::CommandFailed {
                command: kind,
                message: e.to_string(),
            });
            Err(CommandError::Engine(e))
        }
    }
}

fn load_state<E: Engine>(engine: &mut E, path: &Utf8Path) {
    if !path.exists() {
        tracing::info!(%path, "no saved state - cold start");
        return;
    }

    let loaded = File::open(path)
        .map_err(EngineError::from)
        .and_then(|file| engine.load(&mut BufReader::new(file)));

    match loaded {
        Ok(()) => tracing::info!(%path, "loaded saved state"),
        Err(e) => tracing::warn!(%path, error = %e, "failed to load saved state - cold start"),
    }
}

fn save_state<E: Engine>(engine: &E, path: &Utf8Path) -> Result<(), BridgeError> {
    let failure = |message: String| BridgeError::PersistenceSave {
        path: path.to_path_buf(),
        message,
    };

    // Dump into `<path>.tmp` and rename it over the target.
    let temp = Utf8PathBuf::from(format!("{path}.tmp"));
    let written = File::create(&temp)
        .map_err(EngineError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            engine.dump(&mut writer)?;
            writer.flush()?;
            Ok(())
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(failure(e.to_string()));
    }

    fs::rename(&temp, path).map_err(|e| failure(e.to_string()))?;
    tracing::info!(%path, "saved engine state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> BridgeConfig {
        let path = Utf8PathBuf::try_from(dir.path().join("state.bin")).unwrap();
        BridgeConfig::new(path)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let bridge = ControlBridge::new(MemoryEngine::new(), config_in(&dir), tx);

        assert_eq!(bridge.state(), BridgeState::Created);
        bridge.start().unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);
        assert!(matches!(bridge.start(), Err(BridgeError::AlreadyStarted)));

        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[test]
    fn test_stop_before_start() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let bridge = ControlBridge::new(MemoryEngine::new(), config_in(&dir), tx);

        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(matches!(bridge.start(), Err(BridgeError::AlreadyStarted)));
        assert!(!dir.path().join("state.bin").exists());
    }

    #[test]
    fn test_submit_after_stop_is_closed() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let bridge = ControlBridge::new(MemoryEngine::new(), config_in(&dir), tx);
        bridge.start().unwrap();
        bridge.stop().unwrap();

        let pending = bridge.submit(EngineCommand::Pause {
            id: crate::models::TorrentId::new([1; 20]),
        });
        assert!(matches!(pending.wait(), Err(CommandError::Closed)));
    }

    #[test]
    fn test_bridge_config_from_client_config() {
        let client = ClientConfig {
            shutdown_timeout_secs: 9,
            ..ClientConfig::default()
        };
        let config = BridgeConfig::from(&client);
        assert_eq!(config.state_file, "state.bin");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(9));
    }
}
