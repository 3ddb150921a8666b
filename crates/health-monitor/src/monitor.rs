//! Health Monitor: probes the broker, guards calls behind a circuit breaker,
//! retries with backoff and replays failed orders.
//!
//! # Locking
//!
//! Breaker state lives behind a `parking_lot::Mutex` that is never held
//! across an `.await`. The order queue lives behind a `tokio::sync::Mutex`
//! because a replay pass holds it while the executor runs. Alerts are always
//! emitted after both locks are released.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use algo_trade_core::{
    AccountStatus, BrokerAccount, BrokerError, Clock, HealthConfig, JsonStore, OrderTicket,
    StorageConfig,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, AlertDispatcher, AlertSeverity};
use crate::breaker::{BreakerState, FailureOutcome};
use crate::error::{Result, RetryError};
use crate::queue::{DrainReport, OrderQueue, QueuedOrder};
use crate::retry::BackoffPolicy;
use crate::types::{HealthCheckResult, HealthDetails, HealthStatus, TradingPermission};

/// Admission decision taken before a wrapped call.
enum Gate {
    Closed,
    Blocked { remaining_secs: u64 },
    Reprobe,
}

pub struct HealthMonitor<B> {
    broker: B,
    config: HealthConfig,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    breaker: Mutex<BreakerState>,
    breaker_store: JsonStore<BreakerState>,
    queue: tokio::sync::Mutex<OrderQueue>,
    queue_store: JsonStore<OrderQueue>,
    alerts: AlertDispatcher,
    last_status: Mutex<HealthStatus>,
}

impl<B: BrokerAccount> HealthMonitor<B> {
    /// Opens the monitor, restoring breaker state and the order queue from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if either persisted file exists but cannot be read.
    pub fn open(
        broker: B,
        config: HealthConfig,
        storage: &StorageConfig,
        alerts: AlertDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let breaker_store: JsonStore<BreakerState> =
            JsonStore::new(storage.path_for(&config.state_file));
        let queue_store: JsonStore<OrderQueue> =
            JsonStore::new(storage.path_for(&config.queue_file));

        let breaker = breaker_store.load()?.unwrap_or_default();
        let queue = queue_store.load()?.unwrap_or_default();

        if breaker.is_open() {
            warn!(
                consecutive_failures = breaker.consecutive_failures,
                tripped_at = ?breaker.tripped_at,
                "Circuit breaker restored in open position"
            );
        }
        if !queue.is_empty() {
            info!(pending = queue.len(), "Restored failed order queue");
        }

        Ok(Self {
            broker,
            backoff: BackoffPolicy::from_config(&config),
            config,
            clock,
            breaker: Mutex::new(breaker),
            breaker_store,
            queue: tokio::sync::Mutex::new(queue),
            queue_store,
            alerts,
            last_status: Mutex::new(HealthStatus::Unknown),
        })
    }

    #[must_use]
    pub fn breaker_snapshot(&self) -> BreakerState {
        self.breaker.lock().clone()
    }

    /// Status reported by the most recent probe.
    #[must_use]
    pub fn last_status(&self) -> HealthStatus {
        *self.last_status.lock()
    }

    pub async fn queued_orders(&self) -> Vec<QueuedOrder> {
        self.queue.lock().await.orders.iter().cloned().collect()
    }

    #[must_use]
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.recent(limit)
    }

    // =========================================================================
    // Health probe
    // =========================================================================

    /// Probes the broker once and updates breaker state.
    pub async fn check_health(&self) -> HealthCheckResult {
        let started = Instant::now();
        let probe = self.broker.account_status().await;
        let latency = started.elapsed();
        let now = self.clock.now();

        let result = match probe {
            Ok(account) if account.is_blocked() => self.on_blocked(account, latency, now).await,
            Ok(account) => self.on_probe_success(account, latency, now).await,
            Err(err) => self.on_probe_failure(&err, latency, now).await,
        };

        *self.last_status.lock() = result.status;
        debug!(
            status = %result.status,
            latency_ms = ?result.latency_ms,
            consecutive_failures = result.consecutive_failures,
            "Health check complete"
        );
        result
    }

    fn classify_latency(&self, latency: Duration) -> HealthStatus {
        if latency < self.config.warning_latency() {
            HealthStatus::Healthy
        } else if latency < self.config.critical_latency() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }

    async fn on_probe_success(
        &self,
        account: AccountStatus,
        latency: Duration,
        now: DateTime<Utc>,
    ) -> HealthCheckResult {
        let status = self.classify_latency(latency);
        let cooldown = self.config.cooldown();

        let (snapshot, closed, rearmed) = {
            let mut state = self.breaker.lock();
            state.last_check = Some(now);
            if status == HealthStatus::Healthy {
                state.reset_counter();
            }
            let closed = status.permits_breaker_reset() && state.awaiting_probe(cooldown, now);
            if closed {
                state.close();
            }
            // A reachable but unfit broker does not earn a reset.
            let rearmed = !status.permits_breaker_reset() && state.rearm(cooldown, now);
            (state.clone(), closed, rearmed)
        };
        self.persist_breaker(&snapshot);

        if rearmed {
            warn!(
                status = %status,
                latency_ms = millis(latency),
                cooldown_secs = self.config.cooldown_secs,
                "Broker still unfit after cool-down, circuit breaker re-armed"
            );
        }

        if status == HealthStatus::Degraded {
            warn!(latency_ms = millis(latency), "Brokerage API responding slowly");
        } else if status == HealthStatus::Unhealthy {
            warn!(latency_ms = millis(latency), "Brokerage API latency above critical threshold");
        }

        if closed {
            self.alerts
                .emit(
                    AlertSeverity::Info,
                    "Circuit breaker reset after successful health check",
                    json!({ "status": status, "latency_ms": millis(latency) }),
                )
                .await;
        }

        HealthCheckResult {
            status,
            latency_ms: Some(millis(latency)),
            error: None,
            timestamp: now,
            consecutive_failures: snapshot.consecutive_failures,
            details: HealthDetails {
                equity: Some(account.equity),
                buying_power: Some(account.buying_power),
                trading_blocked: false,
                account_blocked: false,
                circuit_open: snapshot.is_open(),
            },
        }
    }

    async fn on_blocked(
        &self,
        account: AccountStatus,
        latency: Duration,
        now: DateTime<Utc>,
    ) -> HealthCheckResult {
        let snapshot = {
            let mut state = self.breaker.lock();
            state.last_check = Some(now);
            if !state.force_open(now) {
                state.rearm(self.config.cooldown(), now);
            }
            state.clone()
        };
        self.persist_breaker(&snapshot);

        self.alerts
            .emit(
                AlertSeverity::Critical,
                "Broker has blocked trading on the account",
                json!({
                    "trading_blocked": account.trading_blocked,
                    "account_blocked": account.account_blocked,
                    "equity": account.equity,
                }),
            )
            .await;

        HealthCheckResult {
            status: HealthStatus::Critical,
            latency_ms: Some(millis(latency)),
            error: Some("account or trading blocked by broker".to_string()),
            timestamp: now,
            consecutive_failures: snapshot.consecutive_failures,
            details: HealthDetails {
                equity: Some(account.equity),
                buying_power: Some(account.buying_power),
                trading_blocked: account.trading_blocked,
                account_blocked: account.account_blocked,
                circuit_open: true,
            },
        }
    }

    async fn on_probe_failure(
        &self,
        err: &BrokerError,
        latency: Duration,
        now: DateTime<Utc>,
    ) -> HealthCheckResult {
        warn!(error = %err, "Health check failed");

        let (snapshot, outcome) = {
            let mut state = self.breaker.lock();
            state.last_check = Some(now);
            let outcome = state.record_failure(
                self.config.failure_threshold,
                self.config.cooldown(),
                now,
            );
            (state.clone(), outcome)
        };
        self.persist_breaker(&snapshot);
        self.announce_failure(outcome, "health_check", err).await;

        let status = if snapshot.consecutive_failures >= self.config.failure_threshold {
            HealthStatus::Critical
        } else {
            HealthStatus::Unhealthy
        };

        HealthCheckResult {
            status,
            latency_ms: Some(millis(latency)),
            error: Some(err.to_string()),
            timestamp: now,
            consecutive_failures: snapshot.consecutive_failures,
            details: HealthDetails {
                circuit_open: snapshot.is_open(),
                ..Default::default()
            },
        }
    }

    // =========================================================================
    // Trading permission
    // =========================================================================

    /// Whether the execution layer may place orders right now.
    #[must_use]
    pub fn is_trading_allowed(&self) -> TradingPermission {
        let now = self.clock.now();
        let state = self.breaker.lock();

        if state.is_open() {
            return match state.cooldown_remaining(self.config.cooldown(), now) {
                Some(remaining) => TradingPermission::deny(format!(
                    "Circuit breaker tripped ({} consecutive failures), re-probe in {}s",
                    state.consecutive_failures,
                    remaining.num_seconds()
                )),
                None => TradingPermission::allow(
                    "Circuit breaker cool-down elapsed; next call re-probes broker health",
                ),
            };
        }

        if state.consecutive_failures > 0 {
            return TradingPermission::allow(format!(
                "warning: {} consecutive failures",
                state.consecutive_failures
            ));
        }

        TradingPermission::allow("healthy")
    }

    // =========================================================================
    // Wrapped calls
    // =========================================================================

    /// Runs `operation` with exponential backoff behind the circuit breaker.
    ///
    /// One exhausted call counts as a single consecutive failure. Non-retryable
    /// broker errors end the loop early and still count.
    ///
    /// # Errors
    ///
    /// `CircuitOpen` if the breaker refuses the call, `Exhausted` once the
    /// attempts run out.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> std::result::Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BrokerError>>,
    {
        self.admit(label).await?;

        let max_attempts = self.backoff.max_attempts;
        let mut attempt = 0u32;
        let last_error = loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation = label, attempt, "Brokerage call succeeded after retry");
                    }
                    self.record_call_success();
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Brokerage call failed"
                    );
                    if !err.is_retryable() || attempt >= max_attempts {
                        break err;
                    }
                    let delay = self.backoff.delay_for(attempt - 1);
                    debug!(operation = label, delay_ms = millis(delay), "Backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        };

        error!(operation = label, attempts = attempt, error = %last_error, "Brokerage call exhausted");
        self.record_call_failure(label, &last_error).await;

        Err(RetryError::Exhausted {
            operation: label.to_string(),
            attempts: attempt,
            last_error,
        })
    }

    /// Like [`Self::execute_with_retry`] but abandons the whole loop at `deadline`.
    ///
    /// # Errors
    ///
    /// `DeadlineExceeded` when the deadline expires, otherwise as `execute_with_retry`.
    pub async fn execute_with_deadline<T, F, Fut>(
        &self,
        label: &str,
        deadline: Duration,
        operation: F,
    ) -> std::result::Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BrokerError>>,
    {
        if let Ok(result) =
            tokio::time::timeout(deadline, self.execute_with_retry(label, operation)).await
        {
            return result;
        }

        let deadline_ms = millis(deadline);
        error!(operation = label, deadline_ms, "Brokerage call exceeded deadline");
        self.record_call_failure(
            label,
            &BrokerError::Timeout(format!("deadline of {deadline_ms}ms exceeded")),
        )
        .await;

        Err(RetryError::DeadlineExceeded {
            operation: label.to_string(),
            deadline_ms,
        })
    }

    async fn admit(&self, label: &str) -> std::result::Result<(), RetryError> {
        let gate = self.gate();
        match gate {
            Gate::Closed => Ok(()),
            Gate::Blocked { remaining_secs } => {
                warn!(operation = label, remaining_secs, "Circuit breaker open, call refused");
                Err(RetryError::CircuitOpen { remaining_secs })
            }
            Gate::Reprobe => {
                info!(operation = label, "Cool-down elapsed, re-probing broker health");
                self.check_health().await;
                match self.gate() {
                    Gate::Closed => Ok(()),
                    Gate::Blocked { remaining_secs } => {
                        warn!(
                            operation = label,
                            remaining_secs, "Re-probe failed, circuit breaker stays open"
                        );
                        Err(RetryError::CircuitOpen { remaining_secs })
                    }
                    Gate::Reprobe => Err(RetryError::CircuitOpen { remaining_secs: 0 }),
                }
            }
        }
    }

    fn gate(&self) -> Gate {
        let now = self.clock.now();
        let state = self.breaker.lock();
        if !state.is_open() {
            return Gate::Closed;
        }
        match state.cooldown_remaining(self.config.cooldown(), now) {
            Some(remaining) => Gate::Blocked {
                remaining_secs: u64::try_from(remaining.num_seconds()).unwrap_or(0).max(1),
            },
            None => Gate::Reprobe,
        }
    }

    fn record_call_success(&self) {
        let snapshot = {
            let mut state = self.breaker.lock();
            if state.consecutive_failures == 0 {
                return;
            }
            state.reset_counter();
            state.clone()
        };
        self.persist_breaker(&snapshot);
    }

    async fn record_call_failure(&self, label: &str, err: &BrokerError) {
        let now = self.clock.now();
        let (snapshot, outcome) = {
            let mut state = self.breaker.lock();
            let outcome = state.record_failure(
                self.config.failure_threshold,
                self.config.cooldown(),
                now,
            );
            (state.clone(), outcome)
        };
        self.persist_breaker(&snapshot);
        self.announce_failure(outcome, label, err).await;
    }

    async fn announce_failure(&self, outcome: FailureOutcome, label: &str, err: &BrokerError) {
        match outcome {
            FailureOutcome::Tripped { failures } => {
                self.alerts
                    .emit(
                        AlertSeverity::Critical,
                        format!("Circuit breaker tripped after {failures} consecutive failures"),
                        json!({
                            "operation": label,
                            "error": err.to_string(),
                            "cooldown_secs": self.config.cooldown_secs,
                        }),
                    )
                    .await;
            }
            FailureOutcome::Rearmed { failures } => {
                warn!(
                    operation = label,
                    consecutive_failures = failures,
                    cooldown_secs = self.config.cooldown_secs,
                    "Broker still failing after cool-down, circuit breaker re-armed"
                );
            }
            FailureOutcome::Counted { failures } => {
                debug!(operation = label, consecutive_failures = failures, "Failure recorded");
            }
        }
    }

    // =========================================================================
    // Failed order queue
    // =========================================================================

    /// Appends a failed order to the durable queue and raises a warning alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted. The order stays
    /// queued in memory.
    pub async fn queue_failed_order(
        &self,
        ticket: OrderTicket,
        error: impl Into<String>,
    ) -> Result<QueuedOrder> {
        let order = QueuedOrder::new(ticket, error, self.config.order_max_retries, self.clock.now());

        let pending = {
            let mut queue = self.queue.lock().await;
            queue.push(order.clone());
            self.queue_store.save(&queue)?;
            queue.len()
        };

        self.alerts
            .emit(
                AlertSeverity::Warning,
                "Order queued for retry",
                json!({
                    "id": order.id,
                    "symbol": order.symbol,
                    "notional": order.notional,
                    "side": order.side,
                    "error": order.last_error,
                    "pending": pending,
                }),
            )
            .await;

        Ok(order)
    }

    /// Replays queued orders in FIFO order if the broker is fit.
    ///
    /// Each order's replay counter is incremented before the attempt; an
    /// order past its allowance is discarded with a critical alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted after the pass.
    pub async fn process_order_queue<T, F, Fut>(&self, mut executor: F) -> Result<DrainReport>
    where
        F: FnMut(OrderTicket) -> Fut,
        Fut: Future<Output = std::result::Result<T, BrokerError>>,
    {
        let health = self.check_health().await;
        let blocking = {
            let now = self.clock.now();
            self.breaker.lock().is_blocking(self.config.cooldown(), now)
        };

        if health.status.blocks_replay() || blocking {
            let remaining = self.queue.lock().await.len();
            info!(
                status = %health.status,
                circuit_open = blocking,
                pending = remaining,
                "Broker unfit, skipping order queue replay"
            );
            return Ok(DrainReport::skipped(health.status, remaining));
        }

        let mut report = DrainReport::default();
        let mut discarded = Vec::new();
        let saved;
        {
            let mut queue = self.queue.lock().await;
            let pending: Vec<QueuedOrder> = queue.orders.drain(..).collect();

            for mut order in pending {
                order.retry_count += 1;
                if order.is_exhausted() {
                    error!(
                        id = %order.id,
                        symbol = %order.symbol,
                        retry_count = order.retry_count,
                        "Queued order exceeded replay allowance, discarding"
                    );
                    report.discarded += 1;
                    discarded.push(order);
                    continue;
                }

                match executor(order.ticket()).await {
                    Ok(_) => {
                        info!(
                            id = %order.id,
                            symbol = %order.symbol,
                            retry_count = order.retry_count,
                            "Queued order replayed"
                        );
                        report.replayed += 1;
                    }
                    Err(err) => {
                        warn!(id = %order.id, symbol = %order.symbol, error = %err, "Queued order replay failed");
                        order.last_error = Some(err.to_string());
                        report.failed += 1;
                        queue.push(order);
                    }
                }
            }

            report.remaining = queue.len();
            saved = self.queue_store.save(&queue);
        }

        for order in &discarded {
            self.alerts
                .emit(
                    AlertSeverity::Critical,
                    "Queued order discarded after exhausting retries",
                    json!({
                        "id": order.id,
                        "symbol": order.symbol,
                        "notional": order.notional,
                        "side": order.side,
                        "retry_count": order.retry_count,
                        "last_error": order.last_error,
                    }),
                )
                .await;
        }

        if let Err(e) = saved {
            error!(
                path = %self.queue_store.path().display(),
                error = %e,
                discarded = report.discarded,
                "Failed to persist order queue after replay"
            );
            return Err(e.into());
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            discarded = report.discarded,
            remaining = report.remaining,
            "Order queue replay complete"
        );
        Ok(report)
    }

    // =========================================================================
    // Operator controls
    // =========================================================================

    /// Closes the breaker and clears the failure counter.
    pub async fn force_reset(&self) {
        let (snapshot, was_open) = {
            let mut state = self.breaker.lock();
            let was_open = state.is_open();
            state.close();
            (state.clone(), was_open)
        };
        self.persist_breaker(&snapshot);

        self.alerts
            .emit(
                AlertSeverity::Info,
                "Circuit breaker manually reset",
                json!({ "was_open": was_open }),
            )
            .await;
    }

    /// Persists breaker state, the order queue and the alert log.
    ///
    /// # Errors
    ///
    /// Returns the first write failure.
    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.breaker_snapshot();
        self.breaker_store.save(&snapshot)?;
        {
            let queue = self.queue.lock().await;
            self.queue_store.save(&queue)?;
        }
        self.alerts.flush()?;
        Ok(())
    }

    fn persist_breaker(&self, state: &BreakerState) {
        if let Err(e) = self.breaker_store.save(state) {
            error!(
                path = %self.breaker_store.path().display(),
                error = %e,
                "Failed to persist circuit breaker state"
            );
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
