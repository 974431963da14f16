//! Broadcast hub
//!
//! One task owns the subscriber set and handles commands from its mailbox one
//! at a time, so registration, removal and fan-out never interleave. [`Hub`]
//! is the cloneable handle the rest of the service talks to.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use thaiid_common::Event;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Messages a subscriber may have queued before it is dropped
pub const OUTBOX_CAPACITY: usize = 256;

/// A serialized event. Clones share one buffer, so queuing it for every
/// subscriber and handing it to the socket never copies the text.
pub type Frame = Utf8Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("hub has stopped")]
    Stopped,
}

enum Command {
    Register(SubscriberId, Subscriber),
    Unregister(SubscriberId),
    Broadcast(Frame),
    Count(oneshot::Sender<usize>),
}

struct Subscriber {
    closed: Arc<AtomicBool>,
    outbox: mpsc::Sender<Frame>,
}

/// Handle to the hub task
#[derive(Clone)]
pub struct Hub {
    mailbox: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Hub {
    /// Spawn the hub task on the current runtime
    pub fn spawn() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    /// Spawn a hub whose subscribers queue at most `capacity` messages
    pub fn with_capacity(capacity: usize) -> Self {
        let (mailbox, commands) = mpsc::unbounded_channel();
        tokio::spawn(HubTask::default().run(commands));

        Self {
            mailbox,
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    /// Add a subscriber. Frames arrive on the returned [`Outbox`] until the
    /// subscriber is unregistered or falls behind.
    pub fn register(&self) -> Result<(SubscriberHandle, Outbox), HubError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(self.capacity);

        let subscriber = Subscriber {
            closed: Arc::clone(&closed),
            outbox: tx,
        };
        self.send(Command::Register(id, subscriber))?;

        let handle = SubscriberHandle {
            id,
            closed,
            mailbox: self.mailbox.clone(),
        };
        Ok((handle, Outbox { rx }))
    }

    /// Serialize `event` once and queue it for every subscriber
    pub fn broadcast(&self, event: &Event) -> Result<(), HubError> {
        let frame: Frame = serde_json::to_string(event)?.into();
        self.send(Command::Broadcast(frame))
    }

    /// Number of live subscribers, as seen by the hub task
    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Count(tx))?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    fn send(&self, command: Command) -> Result<(), HubError> {
        self.mailbox.send(command).map_err(|_| HubError::Stopped)
    }
}

/// Registration of one subscriber
pub struct SubscriberHandle {
    id: SubscriberId,
    closed: Arc<AtomicBool>,
    mailbox: mpsc::UnboundedSender<Command>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove the subscriber from the hub. Calling it again does nothing.
    pub fn unregister(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // A stopped hub has already dropped every subscriber
        let _ = self.mailbox.send(Command::Unregister(self.id));
    }
}

/// Outbound queue of one subscriber
pub struct Outbox {
    rx: mpsc::Receiver<Frame>,
}

impl Outbox {
    /// Next frame, or `None` once the subscriber has been removed
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Frame, TryRecvError> {
        self.rx.try_recv()
    }
}

#[derive(Default)]
struct HubTask {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl HubTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Register(id, subscriber) => self.register(id, subscriber),
                Command::Unregister(id) => self.unregister(id),
                Command::Broadcast(frame) => self.broadcast(frame),
                Command::Count(reply) => {
                    let _ = reply.send(self.subscribers.len());
                }
            }
        }
        debug!("Hub stopped");
    }

    fn register(&mut self, id: SubscriberId, subscriber: Subscriber) {
        // Unregistered before the hub saw the registration
        if subscriber.closed.load(Ordering::Acquire) {
            return;
        }
        self.subscribers.insert(id, subscriber);
        info!(subscriber = %id, total = self.subscribers.len(), "Subscriber registered");
    }

    fn unregister(&mut self, id: SubscriberId) {
        // Dropping the sender ends the subscriber's outbox
        if self.subscribers.remove(&id).is_some() {
            info!(subscriber = %id, total = self.subscribers.len(), "Subscriber unregistered");
        }
    }

    fn broadcast(&mut self, frame: Frame) {
        let mut dropped = Vec::new();

        for (id, subscriber) in &self.subscribers {
            match subscriber.outbox.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %id, "Outbound queue full, dropping subscriber");
                    subscriber.closed.store(true, Ordering::Release);
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    subscriber.closed.store(true, Ordering::Release);
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.unregister(id);
        }
    }
}
