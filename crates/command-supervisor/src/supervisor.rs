//! Single-flight task supervisor
//!
//! Owns the one task slot. A new submission always cancels and joins the task
//! in the slot before its own worker starts, so two handlers never run at the
//! same time and the previous handler's cleanup is visible to the next one.

use crate::cancel::CancelToken;
use crate::handlers::{HandlerOutcome, TaskContext};
use crate::registry::{Action, ValidatedInvocation};
use crate::{CommandError, Result};
use robot_gateway::RobotGateway;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed(_)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Running => f.write_str("running"),
            TaskStatus::Completed => f.write_str("completed"),
            TaskStatus::Cancelled => f.write_str("cancelled"),
            TaskStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Final record of a reaped task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub id: Uuid,
    pub command: String,
    pub status: TaskStatus,
    pub cancel_reason: Option<String>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl TaskReport {
    pub fn elapsed(&self) -> time::Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.cancel_reason) {
            (TaskStatus::Cancelled, Some(reason)) => {
                write!(f, "task {} cancelled ({reason})", self.command)
            }
            (status, _) => write!(f, "task {} {status}", self.command),
        }
    }
}

/// A started task, plus the report of the task it displaced, if any.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub preempted: Option<TaskReport>,
}

/// Outcome of [`TaskSupervisor::stop`]. The cancelled task's report is kept
/// even when the robot's stop call fails.
#[derive(Debug)]
pub struct StopOutcome {
    pub report: Option<TaskReport>,
    pub result: Result<()>,
}

/// What currently occupies the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotView {
    Idle,
    Busy {
        id: Uuid,
        command: String,
        status: TaskStatus,
    },
}

struct ActiveTask {
    id: Uuid,
    command: String,
    cancel: CancelToken,
    status: Arc<Mutex<TaskStatus>>,
    started_at: OffsetDateTime,
    handle: JoinHandle<()>,
}

fn lock_status(status: &Mutex<TaskStatus>) -> MutexGuard<'_, TaskStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ActiveTask {
    fn status(&self) -> TaskStatus {
        lock_status(&self.status).clone()
    }

    /// Join the worker and build its report. Blocks until the handler returns.
    fn reap(self) -> TaskReport {
        let ActiveTask {
            id,
            command,
            cancel,
            status,
            started_at,
            handle,
        } = self;
        let joined = handle.join();
        let mut status = lock_status(&status).clone();
        if joined.is_err() || !status.is_terminal() {
            status = TaskStatus::Failed("worker exited without reporting".to_string());
        }
        TaskReport {
            id,
            command,
            status,
            cancel_reason: cancel.reason(),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
        }
    }
}

fn log_report(report: &TaskReport) {
    let elapsed_ms = i64::try_from(report.elapsed().whole_milliseconds()).unwrap_or(i64::MAX);
    match &report.status {
        TaskStatus::Failed(reason) => warn!(
            task = %report.id,
            command = %report.command,
            elapsed_ms,
            "task failed: {}",
            reason
        ),
        TaskStatus::Cancelled => info!(
            task = %report.id,
            command = %report.command,
            elapsed_ms,
            reason = report.cancel_reason.as_deref().unwrap_or("unknown"),
            "task cancelled"
        ),
        status => info!(
            task = %report.id,
            command = %report.command,
            elapsed_ms,
            %status,
            "task finished"
        ),
    }
}

pub struct TaskSupervisor {
    gateway: Arc<dyn RobotGateway>,
    slot: Mutex<Option<ActiveTask>>,
}

impl TaskSupervisor {
    pub fn new(gateway: Arc<dyn RobotGateway>) -> Self {
        Self {
            gateway,
            slot: Mutex::new(None),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<ActiveTask>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `invocation` on a fresh worker, preempting whatever occupies the
    /// slot. Returns as soon as the worker is spawned.
    pub fn submit(&self, invocation: ValidatedInvocation) -> Result<Submission> {
        let handler = match &invocation.action {
            Action::Task(handler) => Arc::clone(handler),
            Action::Stop | Action::Quit => {
                return Err(CommandError::NotSubmittable(invocation.name))
            }
        };

        let mut slot = self.lock_slot();
        let preempted = slot.take().map(|previous| {
            if !previous.handle.is_finished() {
                info!(
                    task = %previous.id,
                    command = %previous.command,
                    next = %invocation.name,
                    "preempting running task"
                );
            }
            previous.cancel.cancel(&format!("preempted by {}", invocation.name));
            let report = previous.reap();
            log_report(&report);
            report
        });

        let id = Uuid::new_v4();
        let command = invocation.name.clone();
        let cancel = CancelToken::new();
        let status = Arc::new(Mutex::new(TaskStatus::Pending));
        let started_at = OffsetDateTime::now_utc();

        let worker_cancel = cancel.clone();
        let worker_status = Arc::clone(&status);
        let gateway = Arc::clone(&self.gateway);
        let handle = thread::Builder::new()
            .name(format!("task-{command}"))
            .spawn(move || {
                *lock_status(&worker_status) = TaskStatus::Running;
                let ctx = TaskContext {
                    task_id: id,
                    gateway: gateway.as_ref(),
                    cancel: &worker_cancel,
                };
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.run(&ctx, &invocation)
                }));
                let terminal = match result {
                    Ok(Ok(HandlerOutcome::Completed)) => TaskStatus::Completed,
                    Ok(Ok(HandlerOutcome::Cancelled)) => TaskStatus::Cancelled,
                    Ok(Err(e)) => TaskStatus::Failed(e.to_string()),
                    Err(_) => TaskStatus::Failed("handler panicked".to_string()),
                };
                debug!(task = %id, status = %terminal, "task reached terminal state");
                *lock_status(&worker_status) = terminal;
            })
            .map_err(|e| CommandError::Worker(e.to_string()))?;

        info!(task = %id, command = %command, "task started");
        *slot = Some(ActiveTask {
            id,
            command,
            cancel,
            status,
            started_at,
            handle,
        });
        Ok(Submission { id, preempted })
    }

    /// Raise the running task's token, wait for it to exit and clear the slot.
    /// Safe to call when idle.
    pub fn cancel_and_join(&self, reason: &str) -> Option<TaskReport> {
        let mut slot = self.lock_slot();
        Self::cancel_slot(&mut slot, reason)
    }

    fn cancel_slot(slot: &mut Option<ActiveTask>, reason: &str) -> Option<TaskReport> {
        let task = slot.take()?;
        task.cancel.cancel(reason);
        let report = task.reap();
        log_report(&report);
        Some(report)
    }

    /// Cancel any task, then send the robot one stop command regardless, in
    /// case it is still moving from something the supervisor did not start.
    pub fn stop(&self) -> StopOutcome {
        let mut slot = self.lock_slot();
        let report = Self::cancel_slot(&mut slot, "stop");
        let result = self.gateway.stop().map_err(CommandError::from);
        match &result {
            Ok(()) => info!("robot stopped"),
            Err(e) => warn!("stop command failed: {}", e),
        }
        StopOutcome { report, result }
    }

    /// Reap the slot's task if it already finished on its own. Never blocks on
    /// a running task.
    pub fn reap_finished(&self) -> Option<TaskReport> {
        let mut slot = self.lock_slot();
        if !slot.as_ref()?.handle.is_finished() {
            return None;
        }
        let report = slot.take()?.reap();
        log_report(&report);
        Some(report)
    }

    pub fn status(&self) -> SlotView {
        match self.lock_slot().as_ref() {
            None => SlotView::Idle,
            Some(task) => SlotView::Busy {
                id: task.id,
                command: task.command.clone(),
                status: task.status(),
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.lock_slot().is_none()
    }
}

impl Drop for TaskSupervisor {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        Self::cancel_slot(slot, "supervisor shutting down");
    }
}
