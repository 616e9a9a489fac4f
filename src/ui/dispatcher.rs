// Foreground queue - the dispatcher's only wake source
//
// Engine events and user input are pushed from other threads; the foreground
// blocks on this queue and nothing else.

use tokio::sync::mpsc;

/// Create a foreground queue and the sender other threads push into
pub fn foreground_queue<M>() -> (mpsc::UnboundedSender<M>, ForegroundQueue<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ForegroundQueue { rx })
}

/// Receiving half, owned by the foreground dispatcher
#[derive(Debug)]
pub struct ForegroundQueue<M> {
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> ForegroundQueue<M> {
    /// Block until a message arrives; `None` once every sender is gone
    ///
    /// Must not be called from inside an async runtime.
    pub fn next_blocking(&mut self) -> Option<M> {
        self.rx.blocking_recv()
    }

    pub fn try_next(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }

    /// Take everything currently queued without blocking
    pub fn drain(&mut self) -> Vec<M> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}
