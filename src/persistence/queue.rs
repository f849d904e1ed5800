use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    error::TrackingError,
    models::{ActivityType, LocationSample},
};

use super::{SessionStore, SessionSummary};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// A warning is logged each time the backlog grows by this many commands.
const BACKLOG_WARN_STEP: usize = 256;

/// Receives the outcome of queued store calls.
pub(crate) trait QueueListener: Send + Sync + 'static {
    fn session_created(&self, session_id: &str);
    fn persistence_failed(&self, error: TrackingError);
}

#[derive(Debug)]
enum StoreCommand {
    Create {
        activity_type: ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    },
    Append(LocationSample),
    Finalize(SessionSummary),
    Attach(String),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget writer for one session. Commands are applied in the order
/// they were queued by a single background task, so the caller never waits
/// on the store and the store never sees two calls for a session at once.
///
/// The channel is unbounded: commands are queued from sampler callbacks that
/// cannot wait, and dropping a sample would corrupt the stored track. Growth
/// is one command per cadence tick while the store is stalled, and the
/// backlog is logged as it grows.
pub(crate) struct PersistenceQueue {
    sender: mpsc::UnboundedSender<StoreCommand>,
    cancel_token: CancellationToken,
    backlog: Arc<AtomicUsize>,
}

impl PersistenceQueue {
    pub(crate) fn spawn(store: Arc<dyn SessionStore>, listener: Arc<dyn QueueListener>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let backlog = Arc::new(AtomicUsize::new(0));

        tokio::spawn(persistence_worker(
            store,
            receiver,
            cancel_token.clone(),
            listener,
            backlog.clone(),
        ));

        Self {
            sender,
            cancel_token,
            backlog,
        }
    }

    pub(crate) fn create(
        &self,
        activity_type: ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    ) {
        self.send(StoreCommand::Create {
            activity_type,
            is_movement_based,
            start_time,
        });
    }

    pub(crate) fn append(&self, sample: LocationSample) {
        self.send(StoreCommand::Append(sample));
    }

    pub(crate) fn finalize(&self, summary: SessionSummary) {
        self.send(StoreCommand::Finalize(summary));
    }

    pub(crate) fn attach(&self, photo_ref: String) {
        self.send(StoreCommand::Attach(photo_ref));
    }

    /// Resolves once every command queued before this call has been applied.
    /// Resolves early if the queue is cancelled.
    pub(crate) fn flush(&self) -> oneshot::Receiver<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(StoreCommand::Flush(reply_tx));
        reply_rx
    }

    /// Drops everything still queued. A call already in flight completes.
    pub(crate) fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Commands queued but not yet applied, including one in flight.
    pub(crate) fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }

    fn send(&self, command: StoreCommand) {
        let pending = self.backlog.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(command).is_err() {
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            log_warn!("persistence worker is gone; command dropped");
            return;
        }
        if pending % BACKLOG_WARN_STEP == 0 {
            log_warn!("store is falling behind: {pending} writes pending");
        }
    }
}

async fn persistence_worker(
    store: Arc<dyn SessionStore>,
    mut receiver: mpsc::UnboundedReceiver<StoreCommand>,
    cancel_token: CancellationToken,
    listener: Arc<dyn QueueListener>,
    backlog: Arc<AtomicUsize>,
) {
    let mut session_id: Option<String> = None;
    let mut creation_failed = false;

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("persistence queue cancelled");
                break;
            }
            command = receiver.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let result = match command {
            StoreCommand::Create {
                activity_type,
                is_movement_based,
                start_time,
            } => match store
                .create_session(&activity_type, is_movement_based, start_time)
                .await
            {
                Ok(id) => {
                    log_info!("session stored as {id}");
                    listener.session_created(&id);
                    session_id = Some(id);
                    Ok(())
                }
                Err(err) => {
                    creation_failed = true;
                    Err(err.context("failed to create session"))
                }
            },
            StoreCommand::Append(sample) => match &session_id {
                Some(id) => store
                    .append_sample(id, &sample)
                    .await
                    .map_err(|err| err.context("failed to append sample")),
                None => {
                    // The create failure was already reported once.
                    log_debug!("skipping sample for session that was never stored");
                    Ok(())
                }
            },
            StoreCommand::Finalize(summary) => match &session_id {
                Some(id) => store
                    .finalize_session(id, &summary)
                    .await
                    .map_err(|err| err.context("failed to finalize session")),
                None => Err(missing_session(creation_failed)),
            },
            StoreCommand::Attach(photo_ref) => match &session_id {
                Some(id) => store
                    .attach_verification(id, &photo_ref)
                    .await
                    .map_err(|err| err.context("failed to attach verification")),
                None => Err(missing_session(creation_failed)),
            },
            StoreCommand::Flush(reply_tx) => {
                let _ = reply_tx.send(());
                Ok(())
            }
        };

        backlog.fetch_sub(1, Ordering::SeqCst);

        if let Err(err) = result {
            log_error!("{err:#}");
            listener.persistence_failed(TrackingError::persistence(&err));
        }
    }
}

fn missing_session(creation_failed: bool) -> anyhow::Error {
    if creation_failed {
        anyhow!("session was never stored")
    } else {
        anyhow!("session has no store id")
    }
}
