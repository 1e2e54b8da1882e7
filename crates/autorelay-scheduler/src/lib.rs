//! # Autorelay Scheduler
//!
//! Per-user recurring automation: a lightweight cron parser, the job
//! registry that owns one cancellable timer task per user, and the
//! multi-step check-in workflow each tick executes against the remote API.
//!
//! ## Architecture
//! ```text
//! JobRegistry (userId -> JobHandle)
//!   └── per-user tokio task
//!         ├── TickTimer: sleep until next cron fire ("0 2 * * *")
//!         └── on fire → CredentialStore lookup → WorkflowExecutor
//!               ├── 1. fetch profile   (missing id field = expired, end tick)
//!               ├── 2. claim reward    (outcome logged, never branched on)
//!               ├── 3. claim bonus ×8  (randomized 30–40s pause, early exit)
//!               └── 4. fetch status    (log credential expiry)
//! ```
//!
//! A failed tick is logged and swallowed; the scheduler keeps ticking.

pub mod cron;
pub mod registry;
pub mod remote;
pub mod workflow;

pub use registry::{CronTimer, DEFAULT_SCHEDULE, JobRegistry, JobState, TickTimer};
pub use remote::HttpRemoteApi;
pub use workflow::{BackoffPolicy, QUOTA_EXHAUSTED, RemoteApi, RemoteError, WorkflowExecutor};
