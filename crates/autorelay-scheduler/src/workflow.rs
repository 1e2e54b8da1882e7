//! The per-tick check-in workflow.
//!
//! Four sequential steps against the remote API, every call authenticated
//! with the user's stored credential. Errors never escape a tick: the run is
//! logged and the scheduler moves on.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Remote error code meaning the bonus quota for today is used up.
/// Not a failure — the claim loop just stops early.
pub const QUOTA_EXHAUSTED: i64 = 429;

/// Field the profile response must carry for the credential to count as live.
const PROFILE_ID_FIELD: &str = "userId";

/// A failed remote call: the API's own error code plus its message.
/// Transport-level failures use code `-1`.
#[derive(Debug, Error)]
#[error("remote call failed (code {code}): {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(-1, message)
    }
}

/// The four remote calls a tick performs. The production implementation is
/// [`crate::remote::HttpRemoteApi`]; tests inject fakes.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch_profile(&self, token: &str) -> Result<Value, RemoteError>;
    async fn claim_reward(&self, token: &str) -> Result<Value, RemoteError>;
    async fn claim_bonus(&self, token: &str) -> Result<Value, RemoteError>;
    async fn fetch_status(&self, token: &str) -> Result<Value, RemoteError>;
}

/// Randomized pause between bonus-claim attempts.
/// The delay is picked uniformly in `[min, max)`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    min: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// The production bounds: 30–40 seconds.
    pub fn standard() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(40))
    }

    /// Zero delay, for deterministic tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    fn pick(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..hi))
    }
}

/// Runs the four-step workflow for one tick.
pub struct WorkflowExecutor {
    api: Arc<dyn RemoteApi>,
    backoff: BackoffPolicy,
    bonus_attempts: u32,
}

impl WorkflowExecutor {
    pub fn new(api: Arc<dyn RemoteApi>, backoff: BackoffPolicy, bonus_attempts: u32) -> Self {
        Self {
            api,
            backoff,
            bonus_attempts,
        }
    }

    /// Execute one tick for `user_id`. Never propagates an error — a failed
    /// tick must not crash the scheduler or block future ticks.
    pub async fn run_tick(&self, user_id: &str, token: &str) {
        tracing::info!("tick started for user {user_id}");
        match self.run_steps(user_id, token).await {
            Ok(()) => tracing::info!("tick finished for user {user_id}"),
            Err(e) => tracing::warn!("tick failed for user {user_id}: {e}"),
        }
    }

    async fn run_steps(&self, user_id: &str, token: &str) -> Result<(), RemoteError> {
        // Step 1: profile. A response without the identifying field means
        // the stored credential has expired — the tick ends quietly.
        let profile = self.api.fetch_profile(token).await?;
        if !identifies_user(&profile) {
            tracing::warn!("credential for user {user_id} looks expired, skipping tick");
            return Ok(());
        }

        // Step 2: reward claim. Outcome recorded, not branched on —
        // "already claimed" is as fine as "claimed".
        match self.api.claim_reward(token).await {
            Ok(_) => tracing::info!("reward claimed for user {user_id}"),
            Err(e) => tracing::info!("reward claim for user {user_id}: {e}"),
        }

        // Step 3: bonus claims, with a randomized pause between successes.
        for attempt in 1..=self.bonus_attempts {
            match self.api.claim_bonus(token).await {
                Ok(_) => {
                    tracing::info!(
                        "bonus claimed for user {user_id} ({attempt}/{})",
                        self.bonus_attempts
                    );
                    if attempt < self.bonus_attempts {
                        // No shared lock is held here; only this user's
                        // tick is suspended.
                        tokio::time::sleep(self.backoff.pick()).await;
                    }
                }
                Err(e) if e.code == QUOTA_EXHAUSTED => {
                    tracing::info!("bonus quota exhausted for user {user_id} after {attempt} claim(s)");
                    break;
                }
                Err(e) => {
                    tracing::warn!("bonus claim failed for user {user_id}: {e}");
                    break;
                }
            }
        }

        // Step 4: final status, logging the credential expiry if reported.
        let status = self.api.fetch_status(token).await?;
        if let Some(expiry) = status.get("expireAt").and_then(|v| v.as_str()) {
            tracing::info!("credential for user {user_id} expires at {expiry}");
        }
        Ok(())
    }
}

/// Whether a profile response carries a non-empty identifying field.
fn identifies_user(profile: &Value) -> bool {
    profile
        .get(PROFILE_ID_FIELD)
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted fake: records every call, serves canned bonus outcomes.
    struct FakeApi {
        calls: Mutex<Vec<&'static str>>,
        profile: Value,
        bonus_script: Mutex<Vec<Result<Value, RemoteError>>>,
        status_fails: bool,
    }

    impl FakeApi {
        fn new(profile: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                profile,
                bonus_script: Mutex::new(Vec::new()),
                status_fails: false,
            }
        }

        fn live_profile() -> Value {
            json!({ "userId": "u1", "name": "tester" })
        }

        fn with_bonus_script(self, script: Vec<Result<Value, RemoteError>>) -> Self {
            *self.bonus_script.lock().unwrap() = script;
            self
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| **c == name).count()
        }
    }

    #[async_trait]
    impl RemoteApi for FakeApi {
        async fn fetch_profile(&self, _token: &str) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push("profile");
            Ok(self.profile.clone())
        }

        async fn claim_reward(&self, _token: &str) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push("reward");
            Ok(json!({ "claimed": true }))
        }

        async fn claim_bonus(&self, _token: &str) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push("bonus");
            let mut script = self.bonus_script.lock().unwrap();
            if script.is_empty() {
                Ok(json!({ "claimed": true }))
            } else {
                script.remove(0)
            }
        }

        async fn fetch_status(&self, _token: &str) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push("status");
            if self.status_fails {
                Err(RemoteError::transport("boom"))
            } else {
                Ok(json!({ "expireAt": "2026-09-30T00:00:00Z" }))
            }
        }
    }

    fn executor(api: Arc<FakeApi>) -> WorkflowExecutor {
        WorkflowExecutor::new(api, BackoffPolicy::none(), 8)
    }

    #[tokio::test]
    async fn expired_profile_short_circuits() {
        let api = Arc::new(FakeApi::new(json!({ "code": 401 })));
        executor(api.clone()).run_tick("u1", "tok").await;
        assert_eq!(api.calls(), vec!["profile"]);
    }

    #[tokio::test]
    async fn empty_id_field_counts_as_expired() {
        let api = Arc::new(FakeApi::new(json!({ "userId": "" })));
        executor(api.clone()).run_tick("u1", "tok").await;
        assert_eq!(api.calls(), vec!["profile"]);
    }

    #[tokio::test]
    async fn full_run_claims_all_bonuses() {
        let api = Arc::new(FakeApi::new(FakeApi::live_profile()));
        executor(api.clone()).run_tick("u1", "tok").await;
        assert_eq!(api.count("profile"), 1);
        assert_eq!(api.count("reward"), 1);
        assert_eq!(api.count("bonus"), 8);
        assert_eq!(api.count("status"), 1);
    }

    #[tokio::test]
    async fn quota_exhausted_stops_after_exactly_k_calls() {
        for k in 1..=8usize {
            let mut script: Vec<Result<Value, RemoteError>> = Vec::new();
            for _ in 0..k - 1 {
                script.push(Ok(json!({ "claimed": true })));
            }
            script.push(Err(RemoteError::new(QUOTA_EXHAUSTED, "daily limit")));
            let api = Arc::new(FakeApi::new(FakeApi::live_profile()).with_bonus_script(script));
            executor(api.clone()).run_tick("u1", "tok").await;
            assert_eq!(api.count("bonus"), k, "k = {k}");
            // Quota exhaustion is not an error; the final status still runs.
            assert_eq!(api.count("status"), 1, "k = {k}");
        }
    }

    #[tokio::test]
    async fn other_bonus_error_stops_loop() {
        let script = vec![
            Ok(json!({ "claimed": true })),
            Err(RemoteError::new(500, "server error")),
        ];
        let api = Arc::new(FakeApi::new(FakeApi::live_profile()).with_bonus_script(script));
        executor(api.clone()).run_tick("u1", "tok").await;
        assert_eq!(api.count("bonus"), 2);
        assert_eq!(api.count("status"), 1);
    }

    #[tokio::test]
    async fn status_failure_is_contained() {
        let mut fake = FakeApi::new(FakeApi::live_profile());
        fake.status_fails = true;
        let api = Arc::new(fake);
        // Must not panic or propagate.
        executor(api.clone()).run_tick("u1", "tok").await;
        assert_eq!(api.count("status"), 1);
    }

    #[test]
    fn backoff_bounds() {
        let policy = BackoffPolicy::new(Duration::from_millis(30), Duration::from_millis(40));
        for _ in 0..100 {
            let d = policy.pick();
            assert!(d >= Duration::from_millis(30));
            assert!(d < Duration::from_millis(40));
        }
        assert_eq!(BackoffPolicy::none().pick(), Duration::ZERO);
    }
}
