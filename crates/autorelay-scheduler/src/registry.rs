//! Job registry — at most one live recurring job per user.
//!
//! Each job owns a tokio task that sleeps until the next cron fire, then
//! runs one workflow tick. Stopping a job flips a watch flag: the flag is
//! set before `stop` returns, so no further tick can start afterwards
//! (an in-flight tick is allowed to finish). The registry entry survives an
//! explicit stop in the Stopped state so status reporting reflects it until
//! the job is restarted.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use autorelay_core::error::{AutorelayError, Result};
use autorelay_store::CredentialStore;

use crate::cron;
use crate::workflow::WorkflowExecutor;

/// Default schedule: every day at 02:00.
pub const DEFAULT_SCHEDULE: &str = "0 2 * * *";

/// Observable state of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Source of tick timing. Production sleeps until the next cron fire;
/// tests inject a fast trigger for determinism.
#[async_trait]
pub trait TickTimer: Send + Sync {
    /// Suspend until the next fire of `schedule`.
    /// Returns `false` when the schedule has no future fire.
    async fn wait_next(&self, schedule: &str) -> bool;
}

/// Cron-driven timer.
pub struct CronTimer;

#[async_trait]
impl TickTimer for CronTimer {
    async fn wait_next(&self, schedule: &str) -> bool {
        let Some(next) = cron::next_fire(schedule, Utc::now()) else {
            tracing::warn!("schedule '{schedule}' has no future fire");
            return false;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tracing::debug!("next fire at {next} (in {}s)", wait.as_secs());
        tokio::time::sleep(wait).await;
        true
    }
}

/// One registered job: the schedule, its stop flag, and the owned task.
struct JobHandle {
    schedule: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Request cancellation. Effective immediately: once the flag is set,
    /// the job loop will not start another tick.
    fn cancel(&self) {
        let _ = self.stop_tx.send(true);
    }

    fn state(&self) -> JobState {
        if *self.stop_tx.borrow() || self.task.is_finished() {
            JobState::Stopped
        } else {
            JobState::Running
        }
    }
}

/// Registry of per-user jobs.
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobHandle>>,
    store: Arc<CredentialStore>,
    executor: Arc<WorkflowExecutor>,
    timer: Arc<dyn TickTimer>,
}

impl JobRegistry {
    pub fn new(store: Arc<CredentialStore>, executor: Arc<WorkflowExecutor>) -> Self {
        Self::with_timer(store, executor, Arc::new(CronTimer))
    }

    pub fn with_timer(
        store: Arc<CredentialStore>,
        executor: Arc<WorkflowExecutor>,
        timer: Arc<dyn TickTimer>,
    ) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            store,
            executor,
            timer,
        }
    }

    /// Start (or restart) the recurring job for `user_id`.
    ///
    /// Requires a stored credential; the credential is re-read on every tick,
    /// so later updates take effect without a restart. Any existing job for
    /// the user is cancelled before the new one is installed — there is never
    /// a window with two live timers for one user.
    pub fn start(&self, user_id: &str, schedule: &str) -> Result<()> {
        // A schedule that never fires must be rejected here, not discovered
        // by the job loop dying on its first wait.
        if cron::next_fire(schedule, Utc::now()).is_none() {
            return Err(AutorelayError::InvalidInput(format!(
                "invalid schedule '{schedule}'"
            )));
        }
        // Credential check happens before the registry write. A user whose
        // credential vanished concurrently fails here, with no state change.
        if self.store.get(user_id).is_none() {
            return Err(AutorelayError::UserNotLoggedIn(user_id.to_string()));
        }

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.remove(user_id) {
            old.cancel();
            tracing::info!("replacing existing job for user {user_id}");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(job_loop(
            user_id.to_string(),
            schedule.to_string(),
            self.timer.clone(),
            self.store.clone(),
            self.executor.clone(),
            stop_rx,
        ));
        jobs.insert(
            user_id.to_string(),
            JobHandle {
                schedule: schedule.to_string(),
                stop_tx,
                task,
            },
        );
        tracing::info!("job started for user {user_id} (schedule '{schedule}')");
        Ok(())
    }

    /// Stop the job for `user_id`. `NotFound` when no job is registered.
    /// No further tick fires once this returns.
    pub fn stop(&self, user_id: &str) -> Result<()> {
        let jobs = self.jobs.lock().unwrap();
        match jobs.get(user_id) {
            Some(handle) => {
                handle.cancel();
                tracing::info!("job stopped for user {user_id}");
                Ok(())
            }
            None => Err(AutorelayError::NotFound(format!(
                "no job registered for user {user_id}"
            ))),
        }
    }

    /// Live state per registered user, derived from the underlying task —
    /// a job whose task has exited reports Stopped even if still registered.
    pub fn status(&self) -> HashMap<String, JobState> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(user, handle)| (user.clone(), handle.state()))
            .collect()
    }

    /// Schedule of the registered job for `user_id`, if any.
    pub fn schedule_of(&self, user_id: &str) -> Option<String> {
        self.jobs
            .lock()
            .unwrap()
            .get(user_id)
            .map(|h| h.schedule.clone())
    }

    /// Cancel every job. Used at service shutdown.
    pub fn shutdown(&self) {
        let jobs = self.jobs.lock().unwrap();
        for (user, handle) in jobs.iter() {
            handle.cancel();
            tracing::debug!("job cancelled for user {user} at shutdown");
        }
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The per-user loop: wait for the next fire, re-read the credential, run
/// one tick. The stop flag is checked around every suspension point so a
/// stopped job never starts another tick.
async fn job_loop(
    user_id: String,
    schedule: String,
    timer: Arc<dyn TickTimer>,
    store: Arc<CredentialStore>,
    executor: Arc<WorkflowExecutor>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            fired = timer.wait_next(&schedule) => {
                if !fired || *stop_rx.borrow() {
                    break;
                }
                match store.get(&user_id) {
                    Some(cred) => executor.run_tick(&user_id, &cred.token).await,
                    None => tracing::warn!("no credential for user {user_id}, skipping tick"),
                }
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("job loop exited for user {user_id}");
}
