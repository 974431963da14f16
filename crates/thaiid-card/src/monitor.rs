//! Reader monitoring
//!
//! [`CardMonitor`] runs a [`Poller`] on a background thread. Each tick lists
//! the readers, tries an exclusive session on each one and turns presence
//! transitions into [`Event`]s: a card read on insertion, `CardRemoved` on
//! removal. A missing reader is reported on every tick.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thaiid_common::{ErrorCode, Event};
use tracing::{debug, info, trace, warn};

use crate::protocol::{RetryPolicy, ThaiIdCard};
use crate::reader::{CardContext, CardSession};

/// Whether each reader, by name, held a connectable card at the last tick
pub type ReaderPresence = HashMap<String, bool>;

/// Timing for the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Pause between ticks
    pub poll_interval: Duration,
    /// Pause after a listing failure or when no reader is attached
    pub reader_backoff: Duration,
    /// Applet selection retries on insertion
    pub retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            reader_backoff: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Commands sent to the monitor thread
#[derive(Debug)]
pub enum MonitorCommand {
    /// Stop the monitor thread at the next tick boundary
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("card monitor is already running")]
    AlreadyRunning,
    #[error("failed to spawn card monitor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The receiving side of the event stream went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event stream closed")]
pub struct StreamClosed;

/// Something that watches readers and produces card events
pub trait ReaderService {
    /// Start watching. Events arrive on the returned receiver until
    /// [`stop_monitoring`](Self::stop_monitoring) is called.
    fn start_monitoring(&mut self) -> Result<Receiver<Event>, MonitorError>;

    /// Stop watching. A no-op when not running.
    fn stop_monitoring(&mut self);

    fn is_monitoring(&self) -> bool;
}

/// One polling step over every visible reader
pub struct Poller<C> {
    context: Arc<C>,
    config: MonitorConfig,
    events: Sender<Event>,
}

impl<C: CardContext> Poller<C> {
    pub fn new(context: Arc<C>, config: MonitorConfig, events: Sender<Event>) -> Self {
        Self {
            context,
            config,
            events,
        }
    }

    /// Run one tick and return how long to wait before the next one
    pub fn poll(&self, presence: &mut ReaderPresence) -> Result<Duration, StreamClosed> {
        let readers = match self.context.list_readers() {
            Ok(readers) => readers,
            Err(err) => {
                warn!(error = %err, "Failed to list readers");
                return Ok(self.config.reader_backoff);
            }
        };

        if readers.is_empty() {
            debug!("No card reader found");
            self.emit(Event::Error(ErrorCode::ReaderNotFound))?;
            return Ok(self.config.reader_backoff);
        }

        for reader in &readers {
            self.poll_reader(reader, presence)?;
        }

        Ok(self.config.poll_interval)
    }

    fn poll_reader(&self, reader: &str, presence: &mut ReaderPresence) -> Result<(), StreamClosed> {
        let was_present = presence.get(reader).copied().unwrap_or(false);

        match self.context.connect(reader) {
            Ok(mut session) => {
                let mut emitted = Ok(());

                if !was_present {
                    presence.insert(reader.to_string(), true);
                    info!(reader, "Card detected");

                    let event = match ThaiIdCard::new(&mut session).read_card(&self.config.retry) {
                        Ok(record) => Event::from(record),
                        Err(err) => {
                            warn!(reader, error = %err, "Failed to read card data");
                            Event::Error(err.error_code())
                        }
                    };
                    emitted = self.emit(event);
                }

                // Leave the card powered so the next tick does not reset it
                if let Err(err) = session.release() {
                    debug!(reader, error = %err, "Failed to release card session");
                }

                emitted
            }
            Err(err) => {
                if was_present {
                    presence.insert(reader.to_string(), false);
                    info!(reader, "Card removed");
                    self.emit(Event::CardRemoved)?;
                } else {
                    trace!(reader, error = %err, "No card");
                }
                Ok(())
            }
        }
    }

    fn emit(&self, event: Event) -> Result<(), StreamClosed> {
        self.events.send(event).map_err(|_| StreamClosed)
    }
}

struct Worker {
    command_tx: Sender<MonitorCommand>,
    handle: JoinHandle<()>,
}

/// Background reader monitor
pub struct CardMonitor<C> {
    context: Arc<C>,
    config: MonitorConfig,
    worker: Option<Worker>,
}

impl<C> CardMonitor<C> {
    pub fn new(context: C, config: MonitorConfig) -> Self {
        Self {
            context: Arc::new(context),
            config,
            worker: None,
        }
    }

    fn shutdown_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            // The thread may already be gone if the receiver was dropped
            let _ = worker.command_tx.send(MonitorCommand::Stop);
            if worker.handle.join().is_err() {
                warn!("Card monitor thread panicked");
            }
        }
    }
}

impl<C> ReaderService for CardMonitor<C>
where
    C: CardContext + Send + Sync + 'static,
{
    fn start_monitoring(&mut self) -> Result<Receiver<Event>, MonitorError> {
        if self.is_monitoring() {
            return Err(MonitorError::AlreadyRunning);
        }
        self.shutdown_worker();

        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let poller = Poller::new(Arc::clone(&self.context), self.config.clone(), event_tx);

        let handle = thread::Builder::new()
            .name("card-monitor".to_string())
            .spawn(move || run(poller, command_rx))?;

        self.worker = Some(Worker { command_tx, handle });
        Ok(event_rx)
    }

    fn stop_monitoring(&mut self) {
        self.shutdown_worker();
    }

    fn is_monitoring(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl<C> Drop for CardMonitor<C> {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

fn run<C: CardContext>(poller: Poller<C>, command_rx: Receiver<MonitorCommand>) {
    info!("Card monitor started");

    let mut presence = ReaderPresence::new();

    loop {
        let delay = match poller.poll(&mut presence) {
            Ok(delay) => delay,
            Err(StreamClosed) => {
                debug!("Event receiver dropped");
                break;
            }
        };

        match command_rx.recv_timeout(delay) {
            Ok(MonitorCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    info!("Card monitor stopped");
}
