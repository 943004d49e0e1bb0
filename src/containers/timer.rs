//! Scheduled repetition of a nested flow

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::common::{EngineError, Result};
use crate::context::{StopTimer, TestContext};
use crate::engine::{ActionContainer, ContainerState, SourceSpan, TestAction};

static TIMER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Shared stop flag for a running timer. Stopping is edge-triggered: the
/// current fire finishes, then the schedule ends.
struct TimerHandle {
    stopped: AtomicBool,
    notify: Notify,
}

impl TimerHandle {
    fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl StopTimer for TimerHandle {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Fires its children on a fixed schedule: an optional initial delay, then
/// one fire every `interval` until the repeat count is exhausted or the
/// timer is stopped through the context's timer registry.
///
/// Each fire publishes the one-based fire number under the variable
/// `<timer_id>-index` before the children run. Forked timers run on a
/// background task and report failures through the context's asynchronous
/// error list; inline timers propagate the failure directly.
pub struct Timer {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    timer_id: String,
    delay: Duration,
    interval: Duration,
    repeat_count: Option<u64>,
    fork: bool,
    actions: Vec<Arc<dyn TestAction>>,
    state: Arc<ContainerState>,
}

impl Timer {
    pub fn new() -> Self {
        let sequence = TIMER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            name: "timer".to_string(),
            description: None,
            span: None,
            timer_id: format!("testflow-timer-{sequence}"),
            delay: Duration::ZERO,
            interval: Duration::from_millis(1000),
            repeat_count: None,
            fork: false,
            actions: Vec::new(),
            state: Arc::new(ContainerState::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }

    /// Identifier used for the fire-index variable and for stopping the
    /// timer through the context.
    pub fn timer_id(mut self, timer_id: impl Into<String>) -> Self {
        self.timer_id = timer_id.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Total number of fires. Unset timers fire until stopped.
    pub fn repeat_count(mut self, repeat_count: u64) -> Self {
        self.repeat_count = Some(repeat_count);
        self
    }

    /// Detach the schedule onto a background task.
    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }

    fn index_variable(&self) -> String {
        format!("{}-index", self.timer_id)
    }

    async fn run_schedule(
        timer_id: String,
        index_variable: String,
        delay: Duration,
        interval: Duration,
        repeat_count: Option<u64>,
        actions: Vec<Arc<dyn TestAction>>,
        state: Arc<ContainerState>,
        handle: Arc<TimerHandle>,
        context: TestContext,
    ) -> Result<()> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut fire: u64 = 1;
        loop {
            if handle.is_stopped() {
                debug!(timer_id, "timer stopped");
                break;
            }

            context.set_variable(&index_variable, fire as i64);
            debug!(timer_id, fire, "timer firing");
            for child in &actions {
                state.set_last_executed(Arc::clone(child));
                context.set_active_action(child.name());
                if let Err(cause) = child.execute(&context).await {
                    return Err(EngineError::Timer {
                        timer_id,
                        fire,
                        cause: Box::new(cause),
                    });
                }
            }

            if repeat_count.is_some_and(|count| fire >= count) {
                break;
            }
            fire += 1;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = handle.notify.notified() => {}
            }
        }

        state.mark_done();
        Ok(())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Timer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let handle = Arc::new(TimerHandle::new());
        context.register_timer(&self.timer_id, Arc::clone(&handle) as Arc<dyn StopTimer>);

        if self.fork {
            let timer_id = self.timer_id.clone();
            let index_variable = self.index_variable();
            let delay = self.delay;
            let interval = self.interval;
            let repeat_count = self.repeat_count;
            let actions = self.actions.clone();
            let state = Arc::clone(&self.state);
            let timer_context = context.clone();

            tokio::spawn(async move {
                if let Err(error) = Self::run_schedule(
                    timer_id,
                    index_variable,
                    delay,
                    interval,
                    repeat_count,
                    actions,
                    state,
                    handle,
                    timer_context.clone(),
                )
                .await
                {
                    warn!(%error, "forked timer failed");
                    timer_context.push_async_error(error);
                }
            });
            Ok(())
        } else {
            Self::run_schedule(
                self.timer_id.clone(),
                self.index_variable(),
                self.delay,
                self.interval,
                self.repeat_count,
                self.actions.clone(),
                Arc::clone(&self.state),
                handle,
                context.clone(),
            )
            .await
        }
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Timer {
    fn actions(&self) -> &[Arc<dyn TestAction>] {
        &self.actions
    }

    fn last_executed(&self) -> Option<Arc<dyn TestAction>> {
        self.state.last_executed()
    }

    fn set_last_executed(&self, action: Arc<dyn TestAction>) {
        self.state.set_last_executed(action);
    }

    fn is_done(&self, _context: &TestContext) -> bool {
        self.state.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CustomAction;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> CustomAction {
        let counter = Arc::clone(counter);
        CustomAction::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_repeat_count_times() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();

        let timer = Timer::new()
            .timer_id("heartbeat")
            .interval(Duration::from_millis(100))
            .repeat_count(3)
            .action(counting(&counter));
        timer.execute(&ctx).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(timer.is_done(&ctx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_fire_index_variable() {
        let ctx = TestContext::new();
        let timer = Timer::new()
            .timer_id("ticker")
            .interval(Duration::from_millis(10))
            .repeat_count(2)
            .action(CustomAction::new("record", |ctx| {
                let index = ctx.get_variable_string("ticker-index")?;
                ctx.set_variable(&format!("seen-{index}"), true);
                Ok(())
            }));
        timer.execute(&ctx).await.unwrap();

        assert!(ctx.has_variable("seen-1"));
        assert!(ctx.has_variable("seen-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forked_timer_stops_through_the_registry() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = TestContext::new();

        let timer = Timer::new()
            .timer_id("background")
            .interval(Duration::from_millis(100))
            .fork(true)
            .action(counting(&counter));
        timer.execute(&ctx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        ctx.stop_timer("background");
        tokio::time::sleep(Duration::from_millis(500)).await;

        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 3, "expected at least 3 fires, got {fired}");
        // No further fires after the stop
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_failure_carries_timer_id_and_fire() {
        let ctx = TestContext::new();
        let timer = Timer::new()
            .timer_id("doomed")
            .interval(Duration::from_millis(10))
            .repeat_count(5)
            .action(CustomAction::new("boom", |_| {
                Err(EngineError::action_failed("boom", "kaput"))
            }));

        let err = timer.execute(&ctx).await.unwrap_err();
        match err {
            EngineError::Timer { timer_id, fire, .. } => {
                assert_eq!(timer_id, "doomed");
                assert_eq!(fire, 1);
            }
            other => panic!("expected timer error, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forked_failure_lands_on_the_async_error_list() {
        let ctx = TestContext::new();
        let timer = Timer::new()
            .timer_id("background-doomed")
            .interval(Duration::from_millis(10))
            .fork(true)
            .action(CustomAction::new("boom", |_| {
                Err(EngineError::action_failed("boom", "kaput"))
            }));

        timer.execute(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let errors = ctx.take_async_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("background-doomed"));
    }
}
