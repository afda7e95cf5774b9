//! Scenario tests for sync sessions.
//!
//! - `harness.rs`    - Scripted page source, recording clock, fake auth
//! - `dedup.rs`      - Concurrent callers share one session
//! - `throttle.rs`   - Offline and throttle guards
//! - `paging.rs`     - Page walk, progress events, record counts
//! - `retry.rs`      - Backoff on transient failures
//! - `empty_page.rs` - Empty pages never clobber cached rows
//! - `failures.rs`   - Auth, rate limit, malformed and transaction failures
//! - `cancel.rs`     - Cooperative cancellation
//! - `status.rs`     - Status snapshots and listener management

mod dedup;
mod failures;
mod retry;
mod status;
mod throttle;
