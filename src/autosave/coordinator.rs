use std::time::Duration;

use futures::future::{BoxFuture, OptionFuture};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{DraftSnapshot, Identity, Persist, SaveError};

/// Timing policy for an [`Autosave`].
#[derive(Clone, Copy, Debug)]
pub struct AutosaveConfig {
    /// Period of the heartbeat save.
    pub interval: Duration,
    /// Quiet period after the last edit before a save.
    pub debounce: Duration,
    /// How long [`SaveStatus::Error`] is shown before reverting to idle.
    pub error_display: Duration,
    /// When false, only manual saves go through.
    pub enabled: bool,
}

impl AutosaveConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30_000);
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2_000);
    pub const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_millis(3_000);
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            debounce: Self::DEFAULT_DEBOUNCE,
            error_display: Self::DEFAULT_ERROR_DISPLAY,
            enabled: true,
        }
    }
}

/// What an editor shows next to the save button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Debounce,
    Heartbeat,
    Manual,
}

enum Command {
    SaveNow,
    SetEnabled(bool),
    Exit(oneshot::Sender<Option<JoinHandle<()>>>),
    Dispose,
}

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;
type InFlight = BoxFuture<'static, Result<DraftSnapshot, SaveError>>;

/// Handle to a running autosave coordinator.
///
/// The coordinator watches a draft owned by the editor and decides when to persist it: after a
/// quiet period following an edit, on a fixed heartbeat, on request, and once more on exit. At
/// most one save is in flight at a time; a trigger firing while one is pending is dropped and the
/// edit is picked up by the next trigger instead. Failures are reported and retried only by the
/// next natural trigger.
pub struct Autosave {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
    task: JoinHandle<()>,
}

pub struct AutosaveBuilder<P> {
    persist: P,
    data: watch::Receiver<DraftSnapshot>,
    identity: watch::Receiver<Option<Identity>>,
    config: AutosaveConfig,
    on_save: Callback<DraftSnapshot>,
    on_error: Callback<SaveError>,
}

impl Autosave {
    /// Start configuring a coordinator observing `data`, saving as whoever `identity` currently names.
    pub fn builder<P: Persist>(
        persist: P, data: watch::Receiver<DraftSnapshot>, identity: watch::Receiver<Option<Identity>>,
    ) -> AutosaveBuilder<P> {
        AutosaveBuilder {
            persist,
            data,
            identity,
            config: AutosaveConfig::default(),
            on_save: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
        }
    }

    /// Cancel any pending debounce and save the current draft now.
    pub fn save_now(&self) {
        let _ = self.commands.send(Command::SaveNow);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetEnabled(enabled));
    }

    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// The editor is going away: fire off a last save of unsaved changes and stop.
    ///
    /// The returned task is detached and may outlive the caller. It yields nothing, the outcome of
    /// the final save isn't observable.
    pub async fn exit(self) -> Option<JoinHandle<()>> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Exit(tx)).is_err() {
            return None;
        }
        let flush = rx.await.ok().flatten();
        let _ = self.task.await;
        flush
    }

    /// Stop all timers without saving.
    pub async fn dispose(self) {
        let _ = self.commands.send(Command::Dispose);
        let _ = self.task.await;
    }
}

impl<P: Persist> AutosaveBuilder<P> {
    pub fn config(mut self, config: AutosaveConfig) -> Self {
        self.config = config;
        self
    }

    /// Called with the stored record after every successful save.
    pub fn on_save(mut self, f: impl Fn(&DraftSnapshot) + Send + Sync + 'static) -> Self {
        self.on_save = Box::new(f);
        self
    }

    /// Called after every failed save.
    pub fn on_error(mut self, f: impl Fn(&SaveError) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }

    pub fn spawn(mut self) -> Autosave {
        // A zero period can't drive a timer.
        if self.config.interval.is_zero() {
            tracing::warn!("autosave interval must be non-zero, using {:?}", AutosaveConfig::DEFAULT_INTERVAL);
            self.config.interval = AutosaveConfig::DEFAULT_INTERVAL;
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);

        // A draft loaded from the server is already persisted.
        let baseline = {
            let draft = self.data.borrow();
            draft.last_saved.is_some().then(|| draft.clone())
        };

        let coordinator = Coordinator {
            persist: self.persist,
            data: self.data,
            identity: self.identity,
            enabled: self.config.enabled,
            config: self.config,
            baseline,
            debounce_at: None,
            error_until: None,
            status: status_tx,
            on_save: self.on_save,
            on_error: self.on_error,
        };
        let task = tokio::spawn(coordinator.run(rx));

        Autosave { commands, status, task }
    }
}

struct Coordinator<P> {
    persist: P,
    data: watch::Receiver<DraftSnapshot>,
    identity: watch::Receiver<Option<Identity>>,
    config: AutosaveConfig,
    enabled: bool,
    /// The last record the persistence endpoint confirmed.
    baseline: Option<DraftSnapshot>,
    debounce_at: Option<Instant>,
    error_until: Option<Instant>,
    status: watch::Sender<SaveStatus>,
    on_save: Callback<DraftSnapshot>,
    on_error: Callback<SaveError>,
}

impl<P: Persist> Coordinator<P> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut heartbeat = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<InFlight> = None;
        let mut watching = true;

        loop {
            tokio::select! {
                Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    self.settle(result);
                }
                changed = self.data.changed(), if watching => match changed {
                    Ok(()) => self.on_change(),
                    // The editor dropped its end. Keep saving its last state on the heartbeat.
                    Err(_) => watching = false,
                },
                _ = time::sleep_until(self.debounce_at.unwrap_or_else(Instant::now)), if self.debounce_at.is_some() => {
                    self.debounce_at = None;
                    self.request(Trigger::Debounce, &mut in_flight);
                }
                _ = heartbeat.tick() => {
                    if self.enabled {
                        self.request(Trigger::Heartbeat, &mut in_flight);
                    }
                }
                _ = time::sleep_until(self.error_until.unwrap_or_else(Instant::now)), if self.error_until.is_some() => {
                    self.error_until = None;
                    self.status.send_if_modified(|status| match status {
                        SaveStatus::Error => {
                            *status = SaveStatus::Idle;
                            true
                        }
                        _ => false,
                    });
                }
                command = commands.recv() => match command {
                    Some(Command::SaveNow) => {
                        self.debounce_at = None;
                        self.request(Trigger::Manual, &mut in_flight);
                    }
                    Some(Command::SetEnabled(enabled)) => {
                        self.enabled = enabled;
                        match enabled {
                            true => self.on_change(),
                            false => self.debounce_at = None,
                        }
                    }
                    Some(Command::Exit(reply)) => {
                        let _ = reply.send(self.flush(in_flight.is_some()));
                        break;
                    }
                    Some(Command::Dispose) | None => break,
                },
            }
        }

        // In-flight calls are never cancelled, let it finish on its own.
        if let Some(call) = in_flight {
            tokio::spawn(async move {
                let _ = call.await;
            });
        }
        tracing::trace!("autosave stopped");
    }

    /// The draft as it would be sent right now.
    fn outgoing(&self) -> DraftSnapshot {
        let mut draft = self.data.borrow().clone();
        if draft.identifier.is_none() {
            draft.identifier = self.baseline.as_ref().and_then(|b| b.identifier.clone());
        }
        draft
    }

    fn is_dirty(&self, draft: &DraftSnapshot) -> bool {
        self.baseline.as_ref().is_none_or(|baseline| !baseline.same_content(draft))
    }

    /// Restart the quiet period if the draft now differs from what's saved.
    fn on_change(&mut self) {
        if !self.enabled {
            return;
        }
        let dirty = self.is_dirty(&self.data.borrow());
        self.debounce_at = dirty.then(|| Instant::now() + self.config.debounce);
    }

    fn request(&mut self, trigger: Trigger, in_flight: &mut Option<InFlight>) {
        let Some(author) = self.identity.borrow().clone() else {
            tracing::trace!(?trigger, "not signed in, skipping save");
            return;
        };
        let draft = self.outgoing();
        if !draft.is_meaningful() {
            tracing::trace!(?trigger, "draft is empty, skipping save");
            return;
        }
        if trigger != Trigger::Manual && !self.is_dirty(&draft) {
            tracing::trace!(?trigger, "nothing new to save");
            return;
        }
        if in_flight.is_some() {
            tracing::debug!(?trigger, "save already in flight, dropping request");
            return;
        }

        tracing::debug!(?trigger, identifier = ?draft.identifier, "saving draft");
        self.error_until = None;
        self.status.send_replace(SaveStatus::Saving);
        *in_flight = Some(self.persist.persist(&author, &draft));
    }

    fn settle(&mut self, result: Result<DraftSnapshot, SaveError>) {
        match result {
            Ok(saved) => {
                tracing::debug!(identifier = ?saved.identifier, last_saved = ?saved.last_saved, "draft saved");
                self.status.send_replace(SaveStatus::Saved);
                (self.on_save)(&saved);
                self.baseline = Some(saved);
            }
            Err(err) => {
                tracing::warn!("autosave failed: {err}");
                self.error_until = Some(Instant::now() + self.config.error_display);
                self.status.send_replace(SaveStatus::Error);
                (self.on_error)(&err);
            }
        }
    }

    /// Best-effort save on exit. Detached, nobody observes the result.
    fn flush(&self, busy: bool) -> Option<JoinHandle<()>> {
        if !self.enabled || busy {
            return None;
        }
        let author = self.identity.borrow().clone()?;
        let draft = self.outgoing();
        if !draft.is_meaningful() || !self.is_dirty(&draft) {
            return None;
        }

        tracing::debug!(identifier = ?draft.identifier, "flushing draft on exit");
        let call = self.persist.persist(&author, &draft);
        Some(tokio::spawn(async move {
            if let Err(err) = call.await {
                tracing::debug!("exit flush failed: {err}");
            }
        }))
    }
}
