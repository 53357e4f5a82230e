// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rate-limit scheduler
//!
//! Enforces a minimum interval between outbound backend calls. A call that
//! comes too soon is deferred on a tokio timer; a second, child timer emits
//! countdown ticks for the status line. Cancelling the deferred call also
//! cancels its countdown, but not the other way round.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often countdown ticks are emitted while a call is deferred.
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

/// Longest a single call is ever deferred.
pub const MAX_DEFERRAL: Duration = Duration::from_secs(60 * 60);

/// Outcome of asking whether a call may go out now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Immediate,
    Deferred(Duration),
}

/// Decide whether a call at `now` may proceed, given the last accepted call.
pub fn schedule(now: Instant, last_call: Option<Instant>, min_interval: Duration) -> Schedule {
    let Some(last_call) = last_call else {
        return Schedule::Immediate;
    };
    let elapsed = now.saturating_duration_since(last_call);
    if elapsed >= min_interval {
        Schedule::Immediate
    } else {
        Schedule::Deferred((min_interval - elapsed).min(MAX_DEFERRAL))
    }
}

/// Timer notifications delivered back to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The deferred call for `ticket` may go out now
    Fire { ticket: u64 },
    /// Time left before `ticket` fires
    Countdown { ticket: u64, remaining: Duration },
}

type Emit = Arc<dyn Fn(TimerEvent) + Send + Sync>;

struct PendingCall {
    ticket: u64,
    call: CancellationToken,
    countdown: CancellationToken,
}

pub struct RateScheduler {
    last_call: Option<Instant>,
    pending: Option<PendingCall>,
    emit: Emit,
}

impl RateScheduler {
    /// `emit` is invoked from timer tasks; it must not block.
    pub fn new(emit: impl Fn(TimerEvent) + Send + Sync + 'static) -> Self {
        Self {
            last_call: None,
            pending: None,
            emit: Arc::new(emit),
        }
    }

    /// Request a call slot for `ticket`. Any earlier pending call is cancelled.
    ///
    /// On [`Schedule::Immediate`] the caller proceeds right away; on
    /// [`Schedule::Deferred`] a [`TimerEvent::Fire`] arrives after the delay
    /// unless cancelled first. Must be called inside a tokio runtime.
    pub fn request(&mut self, ticket: u64, min_interval: Duration) -> Schedule {
        self.cancel();

        let now = Instant::now();
        let decision = schedule(now, self.last_call, min_interval);
        if let Schedule::Deferred(delay) = decision {
            let Some(deadline) = now.checked_add(delay) else {
                tracing::warn!(target: "answerbot.scheduler", ticket, "deadline out of range; not deferring");
                return Schedule::Immediate;
            };
            tracing::debug!(
                target: "answerbot.scheduler",
                ticket,
                delay_ms = delay.as_millis() as u64,
                "rate limiting: deferring call"
            );
            self.pending = Some(self.spawn_timers(ticket, deadline));
        }
        decision
    }

    fn spawn_timers(&self, ticket: u64, deadline: Instant) -> PendingCall {
        let call = CancellationToken::new();
        let countdown = call.child_token();

        let emit = Arc::clone(&self.emit);
        let token = call.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => emit(TimerEvent::Fire { ticket }),
            }
        });

        let emit = Arc::clone(&self.emit);
        let token = countdown.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(COUNTDOWN_TICK);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            break;
                        }
                        emit(TimerEvent::Countdown { ticket, remaining });
                    }
                }
            }
        });

        PendingCall {
            ticket,
            call,
            countdown,
        }
    }

    /// Cancel the pending call and its countdown, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(target: "answerbot.scheduler", ticket = pending.ticket, "cancelled pending call");
            pending.call.cancel();
        }
    }

    /// Stop the countdown display only; the deferred call still fires.
    pub fn cancel_countdown(&mut self) {
        if let Some(pending) = &self.pending {
            pending.countdown.cancel();
        }
    }

    /// Consume a fire notification. Returns false for a ticket that is no
    /// longer pending (cancelled or replaced).
    pub fn take_fired(&mut self, ticket: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending_ticket(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the time a response was accepted into history.
    pub fn record_accepted(&mut self, at: Instant) {
        self.last_call = Some(at);
    }

    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }
}

impl Drop for RateScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateScheduler")
            .field("last_call", &self.last_call)
            .field("pending", &self.pending_ticket())
            .finish()
    }
}
