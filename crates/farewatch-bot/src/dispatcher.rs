//! Routes inbound messages to one worker task per chat.
//!
//! Each chat owns its [`Session`] inside its worker, so messages from the same
//! chat are handled strictly in arrival order while different chats proceed
//! concurrently. A worker whose chat has no conversation in progress exits
//! after [`DEFAULT_IDLE_TIMEOUT`] without messages; the next message spawns a
//! fresh one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use farewatch_types::InboundMessage;

use crate::channel::{ChannelPlugin, send_reply};
use crate::conversation::ConversationEngine;
use crate::session::{Session, Step};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type WorkerTable = Arc<Mutex<HashMap<i64, mpsc::UnboundedSender<InboundMessage>>>>;

pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn ChannelPlugin>,
    workers: WorkerTable,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(engine: Arc<ConversationEngine>, channel: Arc<dyn ChannelPlugin>) -> Self {
        Self {
            engine,
            channel,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// How long an idle chat's worker lingers before exiting.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Queue `msg` on its chat's worker, spawning the worker on first contact.
    pub async fn dispatch(&self, msg: InboundMessage) {
        let chat_id = msg.chat_id;
        let mut workers = self.workers.lock().await;

        let msg = match workers.get(&chat_id) {
            Some(tx) => match tx.send(msg) {
                Ok(()) => return,
                // Worker exited; start a fresh one below.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        if self.cancel.is_cancelled() {
            debug!(chat_id, "Dropping message after shutdown");
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(msg);
        workers.insert(chat_id, tx);
        debug!(chat_id, "Spawned chat worker");

        tokio::spawn(chat_worker(
            ChatWorker {
                engine: self.engine.clone(),
                channel: self.channel.clone(),
                workers: self.workers.clone(),
                idle_timeout: self.idle_timeout,
                chat_id,
            },
            rx,
            self.cancel.child_token(),
        ));
    }

    /// Number of chats with a live worker.
    #[cfg(test)]
    async fn active_chats(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Consume `rx` until it closes or `cancel` fires, then stop every worker.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        info!("Message loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
            }
        }
        self.cancel.cancel();
        let mut workers = self.workers.lock().await;
        let stopped = workers.len();
        workers.clear();
        info!(workers = stopped, "Message loop stopped");
    }
}

struct ChatWorker {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn ChannelPlugin>,
    workers: WorkerTable,
    idle_timeout: Duration,
    chat_id: i64,
}

async fn chat_worker(
    worker: ChatWorker,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    cancel: CancellationToken,
) {
    let ChatWorker {
        engine,
        channel,
        workers,
        idle_timeout,
        chat_id,
    } = worker;
    let mut session = Session::new(chat_id);
    loop {
        let next = if session.is_active() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => msg,
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                res = tokio::time::timeout(idle_timeout, rx.recv()) => match res {
                    Ok(msg) => msg,
                    Err(_) => {
                        // Senders only push while holding the table lock, so
                        // an empty queue here stays empty once we deregister.
                        let mut table = workers.lock().await;
                        match rx.try_recv() {
                            Ok(msg) => Some(msg),
                            Err(_) => {
                                table.remove(&chat_id);
                                debug!(chat_id, "Idle chat worker exiting");
                                break;
                            }
                        }
                    }
                },
            }
        };
        let Some(msg) = next else {
            break;
        };

        debug!(
            chat_id,
            channel_type = %msg.channel_type,
            sender = %msg.sender_id,
            step = ?session.step,
            "Processing inbound message"
        );

        // The return date answer triggers a price lookup, which can take a while.
        if session.step == Some(Step::ReturnDate) && msg.command.is_none() {
            if let Err(e) = channel.notify_processing(chat_id).await {
                debug!(chat_id, "Typing indicator failed: {e}");
            }
        }

        for reply in engine.handle(&mut session, &msg).await {
            if let Err(e) = send_reply(channel.as_ref(), chat_id, reply).await {
                warn!(chat_id, "Failed to send reply: {e}");
            }
        }
    }
    debug!(chat_id, "Chat worker stopped");
}
