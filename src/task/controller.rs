// src/task/controller.rs
// Lifecycle controller for one cancellable remote operation

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::locale::LocaleProvider;

use super::state::{ErrorClass, OperationError, TaskResult, TaskState, ValidationError};
use super::surface::{StatusKind, TaskSurface};
use super::ticker::Ticker;

const CANCELLING_KEY: &str = "cancelling";
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// The work a controller drives. `prepare` checks preconditions and snapshots
/// everything the call needs; a precondition failure means no call is made and
/// no state changes. `execute` performs the remote call and is expected to
/// observe the token cooperatively; a result that arrives anyway is honored.
#[async_trait]
pub trait TaskOperation: Send + Sync + 'static {
    type Input: Send + 'static;

    fn prepare(&self) -> Result<Self::Input, ValidationError>;

    /// Whether preconditions currently hold. Drives re-enablement of the
    /// action control after settlement.
    fn ready(&self) -> bool;

    async fn execute(
        &self,
        input: Self::Input,
        token: CancellationToken,
    ) -> Result<String, OperationError>;
}

/// Locale keys for one task's display text.
#[derive(Debug, Clone, Copy)]
pub struct TaskTextKeys {
    pub start: &'static str,
    pub cancel: &'static str,
    pub waiting: &'static str,
    pub success: &'static str,
    pub fail: &'static str,
    pub interrupted: &'static str,
}

impl TaskTextKeys {
    pub fn transcription() -> Self {
        Self {
            start: "transcribe_start",
            cancel: "transcribe_cancel",
            waiting: "transcribing_wait",
            success: "transcribe_success",
            fail: "transcribe_fail",
            interrupted: "transcribe_interrupted",
        }
    }

    pub fn summarization() -> Self {
        Self {
            start: "summarize_start",
            cancel: "summarize_cancel",
            waiting: "summarizing_wait",
            success: "summarize_success",
            fail: "summarize_fail",
            interrupted: "summarize_interrupted",
        }
    }
}

struct ActiveRun {
    id: Uuid,
    token: CancellationToken,
    ticker: Ticker,
}

struct Inner {
    state: TaskState,
    run: Option<ActiveRun>,
    result: Option<TaskResult>,
    success_stamp: Option<String>,
}

/// Drives one remote operation at a time through the
/// Idle/Running/Cancelling/terminal lifecycle and keeps the bound surface
/// consistent with it. Cloning shares the same controller.
pub struct TaskController<Op: TaskOperation> {
    op: Arc<Op>,
    surface: Arc<dyn TaskSurface>,
    locale: Arc<dyn LocaleProvider>,
    keys: TaskTextKeys,
    inner: Arc<Mutex<Inner>>,
}

impl<Op: TaskOperation> Clone for TaskController<Op> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            surface: self.surface.clone(),
            locale: self.locale.clone(),
            keys: self.keys,
            inner: self.inner.clone(),
        }
    }
}

impl<Op: TaskOperation> TaskController<Op> {
    pub fn new(
        op: Arc<Op>,
        surface: Arc<dyn TaskSurface>,
        locale: Arc<dyn LocaleProvider>,
        keys: TaskTextKeys,
    ) -> Self {
        surface.set_action_label(&locale.text(keys.start));
        surface.set_action_enabled(op.ready());
        Self {
            op,
            surface,
            locale,
            keys,
            inner: Arc::new(Mutex::new(Inner {
                state: TaskState::Idle,
                run: None,
                result: None,
                success_stamp: None,
            })),
        }
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().unwrap().state
    }

    pub fn last_result(&self) -> Option<TaskResult> {
        self.inner.lock().unwrap().result.clone()
    }

    /// Trigger the task. The same trigger doubles as the cancel control: a
    /// start while `Running` is a cancel, a start while `Cancelling` is
    /// ignored (the control is disabled while the call unwinds).
    pub fn start(&self) {
        {
            let inner = self.inner.lock().unwrap();
            match inner.state {
                TaskState::Running => {
                    drop(inner);
                    self.cancel();
                    return;
                }
                TaskState::Cancelling => return,
                _ => {}
            }
        }

        let input = match self.op.prepare() {
            Ok(input) => input,
            Err(err) => {
                self.surface
                    .set_status(StatusKind::Error, &self.locale.text(err.message_key));
                return;
            }
        };

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        let ticker = Ticker::spawn(self.surface.clone());
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = TaskState::Running;
            inner.result = None;
            inner.success_stamp = None;
            inner.run = Some(ActiveRun {
                id: run_id,
                token: token.clone(),
                ticker,
            });
        }

        self.surface.clear_status();
        self.surface.set_result_text(&self.locale.text(self.keys.waiting));
        self.surface.set_result_loading(true);
        self.surface.set_action_label(&self.locale.text(self.keys.cancel));
        self.surface.set_action_enabled(true);
        self.surface.set_selector_enabled(false);
        self.surface.set_inputs_enabled(false);
        tracing::info!(run_id = %run_id, "task started");

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.op.execute(input, token).await;
            this.settle(run_id, outcome);
        });
    }

    /// Signal the in-flight call to stop. Valid only while `Running`; the
    /// terminal "interrupted" text is deferred until the call unwinds.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != TaskState::Running {
            return;
        }
        match inner.run.as_ref() {
            Some(run) => {
                run.token.cancel();
                run.ticker.reset();
            }
            None => return,
        }
        inner.state = TaskState::Cancelling;
        drop(inner);

        self.surface.set_elapsed(Some("0.0s"));
        self.surface.set_action_enabled(false);
        self.surface.set_result_text(&self.locale.text(CANCELLING_KEY));
        tracing::info!("task cancellation requested");
    }

    /// Align the action control with the current precondition validity.
    /// While a run is in flight the control stays bound to cancel and is not
    /// touched here, so input edits can never take the cancel affordance away.
    pub fn sync_action_enabled(&self) {
        if !self.state().is_in_flight() {
            self.surface.set_action_enabled(self.op.ready());
        }
    }

    /// Re-render the current state's text after a locale change. State does
    /// not change; a result-box placeholder left behind in another locale's
    /// in-progress phrasing is cleared.
    pub fn refresh_locale(&self) {
        let state = self.state();
        if !state.is_in_flight() {
            let current = self.surface.result_text();
            let trimmed = current.trim();
            if !trimmed.is_empty() && self.locale.progress_phrases().iter().any(|p| p == trimmed) {
                self.surface.set_result_text("");
            }
        }
        let label_key = if state == TaskState::Running {
            self.keys.cancel
        } else {
            self.keys.start
        };
        self.surface.set_action_label(&self.locale.text(label_key));
        self.project();
    }

    fn settle(&self, run_id: Uuid, outcome: Result<String, OperationError>) {
        let mut inner = self.inner.lock().unwrap();
        let run = match inner.run.take() {
            Some(run) if run.id == run_id => run,
            other => {
                // A newer run owns the controller; this settlement is stale.
                inner.run = other;
                tracing::warn!(run_id = %run_id, "stale settlement ignored");
                return;
            }
        };
        drop(run);

        let (state, result) = match outcome {
            Ok(payload) => {
                inner.success_stamp = Some(Local::now().format(TIMESTAMP_FORMAT).to_string());
                (TaskState::Succeeded, TaskResult::Success { payload })
            }
            Err(err) if err.is_cancelled() => (TaskState::Cancelled, TaskResult::Cancelled),
            Err(err) => {
                let class = err.class();
                tracing::warn!(?class, "task failed: {}", err);
                (
                    TaskState::Failed,
                    TaskResult::Failure {
                        class,
                        detail: err.to_string(),
                    },
                )
            }
        };
        tracing::info!(run_id = %run_id, ?state, "task settled");
        inner.state = state;
        inner.result = Some(result);
        drop(inner);

        self.surface.set_elapsed(None);
        self.surface.set_result_loading(false);
        self.surface.set_selector_enabled(true);
        self.surface.set_inputs_enabled(true);
        self.surface.set_action_label(&self.locale.text(self.keys.start));
        self.surface.set_action_enabled(self.op.ready());
        self.project();
    }

    /// Pure projection of the current state into display text.
    fn project(&self) {
        let inner = self.inner.lock().unwrap();
        match inner.state {
            TaskState::Idle => {}
            TaskState::Running => {
                self.surface.set_result_text(&self.locale.text(self.keys.waiting));
            }
            TaskState::Cancelling => {
                self.surface.set_result_text(&self.locale.text(CANCELLING_KEY));
            }
            TaskState::Succeeded => {
                if let Some(TaskResult::Success { payload }) = &inner.result {
                    self.surface.set_result_text(payload);
                }
                let label = self.locale.text(self.keys.success);
                let stamp = inner.success_stamp.as_deref().unwrap_or_default();
                self.surface
                    .set_status(StatusKind::Success, &join_label(&label, stamp));
            }
            TaskState::Failed => {
                self.surface.set_result_text("");
                if let Some(TaskResult::Failure { class, detail }) = &inner.result {
                    let label = self.locale.text(self.keys.fail);
                    let mut message = self.locale.text(class.locale_key());
                    if *class == ErrorClass::Other && !detail.is_empty() {
                        message.push(' ');
                        message.push_str(detail);
                    }
                    self.surface
                        .set_status(StatusKind::Error, &join_label(&label, &message));
                }
            }
            TaskState::Cancelled => {
                self.surface.set_result_text("");
                self.surface
                    .set_status(StatusKind::Error, &self.locale.text(self.keys.interrupted));
            }
        }
    }
}

/// Joins a status label and its detail, inserting a colon unless the label
/// already ends in one (or in whitespace, for locales that carry their own
/// punctuation).
fn join_label(label: &str, detail: &str) -> String {
    if label.is_empty() {
        return detail.to_string();
    }
    if label.ends_with([':', '：']) || label.ends_with(char::is_whitespace) {
        format!("{} {}", label.trim_end(), detail)
    } else {
        format!("{}: {}", label, detail)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::locale::LocaleStore;
    use crate::task::surface::PanelSurface;

    /// Scripted operation: settles with a preset outcome, either on demand
    /// (via `release`) or when its token fires, whichever the script says.
    struct ScriptedOp {
        ready: AtomicBool,
        valid: bool,
        calls: AtomicUsize,
        obey_cancel: bool,
        outcome: Mutex<Option<Result<String, OperationError>>>,
        release: Notify,
    }

    impl ScriptedOp {
        fn succeeding(payload: &str) -> Self {
            Self::new(true, true, Ok(payload.to_string()))
        }

        fn failing(err: OperationError) -> Self {
            Self::new(true, true, Err(err))
        }

        fn invalid() -> Self {
            Self::new(false, false, Ok(String::new()))
        }

        fn new(ready: bool, valid: bool, outcome: Result<String, OperationError>) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                valid,
                calls: AtomicUsize::new(0),
                obey_cancel: true,
                outcome: Mutex::new(Some(outcome)),
                release: Notify::new(),
            }
        }

        fn ignoring_cancel(mut self) -> Self {
            self.obey_cancel = false;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskOperation for ScriptedOp {
        type Input = ();

        fn prepare(&self) -> Result<(), ValidationError> {
            if self.valid {
                Ok(())
            } else {
                Err(ValidationError::new("summarize_section_disabled_tooltip"))
            }
        }

        fn ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn execute(
            &self,
            _input: (),
            token: CancellationToken,
        ) -> Result<String, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.obey_cancel {
                tokio::select! {
                    biased;
                    _ = self.release.notified() => {}
                    _ = token.cancelled() => return Err(OperationError::Cancelled),
                }
            } else {
                self.release.notified().await;
            }
            self.outcome.lock().unwrap().take().unwrap_or(Err(OperationError::Network(
                "outcome already consumed".to_string(),
            )))
        }
    }

    fn controller(op: Arc<ScriptedOp>) -> (TaskController<ScriptedOp>, Arc<PanelSurface>, Arc<LocaleStore>) {
        let surface = Arc::new(PanelSurface::new());
        let locale = Arc::new(LocaleStore::bundled());
        let controller = TaskController::new(
            op,
            surface.clone(),
            locale.clone(),
            TaskTextKeys::summarization(),
        );
        (controller, surface, locale)
    }

    /// Let spawned drivers and tickers run under the paused clock.
    async fn drain() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_with_valid_input_succeeds() {
        let op = Arc::new(ScriptedOp::succeeding("foo"));
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        assert_eq!(controller.state(), TaskState::Running);
        assert_eq!(surface.snapshot().result_text, "Loon kokkuvõtet...");
        assert!(surface.snapshot().result_loading);
        assert!(!surface.snapshot().selector_enabled);

        op.release.notify_one();
        drain().await;

        assert_eq!(controller.state(), TaskState::Succeeded);
        assert_eq!(
            controller.last_result(),
            Some(TaskResult::Success { payload: "foo".to_string() })
        );
        let panel = surface.snapshot();
        assert_eq!(panel.result_text, "foo");
        assert!(!panel.result_loading);
        assert!(panel.selector_enabled);
        assert!(panel.elapsed.is_none());
        let (kind, text) = panel.status.expect("success status");
        assert_eq!(kind, StatusKind::Success);
        assert!(text.starts_with("Kokkuvõte loodud:"), "status was {text}");
        assert_eq!(op.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_preconditions_issue_no_call_and_keep_state() {
        let op = Arc::new(ScriptedOp::invalid());
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        drain().await;

        assert_eq!(controller.state(), TaskState::Idle);
        assert_eq!(op.calls(), 0);
        let (kind, text) = surface.snapshot().status.expect("validation notice");
        assert_eq!(kind, StatusKind::Error);
        assert_eq!(text, "Lisa kõigepealt transkriptsioon");
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_toggles_into_cancel() {
        let op = Arc::new(ScriptedOp::succeeding("unused"));
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        assert_eq!(controller.state(), TaskState::Running);

        controller.start();
        assert_eq!(controller.state(), TaskState::Cancelling);
        assert!(!surface.snapshot().action_enabled);
        assert_eq!(surface.snapshot().result_text, "Katkestan...");

        drain().await;
        assert_eq!(controller.state(), TaskState::Cancelled);
        assert_eq!(op.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_settlement_ends_cancelled() {
        let op = Arc::new(ScriptedOp::succeeding("unused"));
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        controller.cancel();
        assert_eq!(controller.state(), TaskState::Cancelling);
        assert_eq!(surface.snapshot().elapsed.as_deref(), Some("0.0s"));

        drain().await;

        assert_eq!(controller.state(), TaskState::Cancelled);
        assert_eq!(controller.last_result(), Some(TaskResult::Cancelled));
        let panel = surface.snapshot();
        assert_eq!(panel.result_text, "");
        let (_, text) = panel.status.expect("interrupted status");
        assert_eq!(text, "Kokkuvõtte loomine katkestati");
    }

    #[tokio::test(start_paused = true)]
    async fn success_arriving_after_cancel_wins() {
        let op = Arc::new(ScriptedOp::succeeding("foo").ignoring_cancel());
        let (controller, _, _) = controller(op.clone());

        controller.start();
        controller.cancel();
        assert_eq!(controller.state(), TaskState::Cancelling);

        // The provider never honored the abort; its result lands anyway.
        op.release.notify_one();
        drain().await;

        assert_eq!(controller.state(), TaskState::Succeeded);
        assert_eq!(
            controller.last_result(),
            Some(TaskResult::Success { payload: "foo".to_string() })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn http_401_classifies_as_invalid_credential() {
        let op = Arc::new(ScriptedOp::failing(OperationError::Provider {
            status: Some(401),
            message: "Incorrect API key provided: sk-proj".to_string(),
        }));
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        op.release.notify_one();
        drain().await;

        assert_eq!(controller.state(), TaskState::Failed);
        match controller.last_result() {
            Some(TaskResult::Failure { class, .. }) => {
                assert_eq!(class, ErrorClass::InvalidCredential);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let panel = surface.snapshot();
        assert_eq!(panel.result_text, "");
        let (kind, text) = panel.status.expect("failure status");
        assert_eq!(kind, StatusKind::Error);
        assert!(text.contains("API võti puudub või on vale"), "status was {text}");
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_restarts_directly_into_running() {
        let op = Arc::new(ScriptedOp::succeeding("first"));
        let (controller, _, _) = controller(op.clone());

        controller.start();
        op.release.notify_one();
        drain().await;
        assert_eq!(controller.state(), TaskState::Succeeded);

        *op.outcome.lock().unwrap() = Some(Ok("second".to_string()));
        controller.start();
        assert_eq!(controller.state(), TaskState::Running);
        op.release.notify_one();
        drain().await;
        assert_eq!(
            controller.last_result(),
            Some(TaskResult::Success { payload: "second".to_string() })
        );
        assert_eq!(op.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_readout_increases_and_resets_on_cancel() {
        // The op ignores the abort so the task stays in Cancelling while the
        // clock advances.
        let op = Arc::new(ScriptedOp::succeeding("unused").ignoring_cancel());
        let (controller, surface, _) = controller(op.clone());

        controller.start();
        assert_eq!(surface.snapshot().elapsed.as_deref(), Some("0.0s"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(surface.snapshot().elapsed.as_deref(), Some("0.2s"));

        controller.cancel();
        assert_eq!(surface.snapshot().elapsed.as_deref(), Some("0.0s"));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let elapsed = surface.snapshot().elapsed.expect("readout still shown");
        let seconds: f64 = elapsed.trim_end_matches('s').parse().expect("numeric readout");
        assert!(seconds > 0.0, "readout resumed after reset: {elapsed}");
        assert!(seconds < 1.05, "readout restarted from zero: {elapsed}");
    }

    #[tokio::test(start_paused = true)]
    async fn locale_switch_rerenders_success_without_changing_state() {
        let op = Arc::new(ScriptedOp::succeeding("foo"));
        let (controller, surface, locale) = controller(op.clone());

        controller.start();
        op.release.notify_one();
        drain().await;
        let (_, est_status) = surface.snapshot().status.expect("status");
        let stamp = est_status
            .strip_prefix("Kokkuvõte loodud:")
            .expect("estonian label")
            .trim()
            .to_string();

        locale.set_active("eng");
        controller.refresh_locale();

        assert_eq!(controller.state(), TaskState::Succeeded);
        let (_, eng_status) = surface.snapshot().status.expect("status");
        assert_eq!(eng_status, format!("Summary generated: {stamp}"));
        assert_eq!(surface.snapshot().result_text, "foo");
        assert_eq!(surface.snapshot().action_label, "Summarize");
    }

    #[tokio::test(start_paused = true)]
    async fn locale_switch_clears_stale_foreign_progress_placeholder() {
        let op = Arc::new(ScriptedOp::succeeding("unused"));
        let (controller, surface, locale) = controller(op.clone());

        // A foreign-language progress phrase left behind by a missed update.
        surface.set_result_text("Loon kokkuvõtet...");
        locale.set_active("eng");
        controller.refresh_locale();

        assert_eq!(surface.snapshot().result_text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn locale_switch_mid_run_rewrites_waiting_placeholder() {
        let op = Arc::new(ScriptedOp::succeeding("unused"));
        let (controller, surface, locale) = controller(op.clone());

        controller.start();
        assert_eq!(surface.snapshot().result_text, "Loon kokkuvõtet...");

        locale.set_active("eng");
        controller.refresh_locale();

        assert_eq!(controller.state(), TaskState::Running);
        assert_eq!(surface.snapshot().result_text, "Summarizing...");
        assert_eq!(surface.snapshot().action_label, "Cancel");
    }

    #[test]
    fn join_label_inserts_colon_only_when_needed() {
        assert_eq!(join_label("Failed", "boom"), "Failed: boom");
        assert_eq!(join_label("Failed:", "boom"), "Failed: boom");
        assert_eq!(join_label("Valmis ", "boom"), "Valmis boom");
        assert_eq!(join_label("", "boom"), "boom");
    }
}
