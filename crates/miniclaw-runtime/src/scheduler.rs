//! # Job Scheduler
//!
//! Persisted cron jobs that inject a synthetic message into the agent when
//! their schedule elapses. Every enabled job owns one timer task while the
//! scheduler is started; the reply (or an error notice) is delivered to the
//! job's chat.
//!
//! The job map, the timer handles and the JSON store are guarded by one
//! mutex, so `add`, `remove`, `start` and `stop` always observe a consistent
//! view. A change that cannot be written to the store is rolled back and
//! reported.

use chrono::{DateTime, Local, Utc};
use miniclaw_core::{MessageSender, MiniclawError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::agent_loop::AgentInvoker;
use crate::schedule::JobSchedule;

/// Ceiling on one agent invocation triggered by a job.
pub const FIRE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Prefix of the notice sent when a job's invocation fails.
pub const ERROR_NOTICE_PREFIX: &str = "⚠️ Cron job error: ";

/// A persisted job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    /// Expression as the user wrote it.
    pub schedule: String,
    /// Text handed to the agent when the job fires.
    pub message: String,
    /// Chat that receives the reply. Empty when the job has no recipient.
    #[serde(rename = "chatId", default)]
    pub chat_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

/// Where fired jobs are sent while the scheduler runs.
struct Binding {
    invoker: Arc<dyn AgentInvoker>,
    sender: Option<Arc<dyn MessageSender>>,
    fire_timeout: Duration,
}

#[derive(Default)]
struct State {
    jobs: HashMap<String, CronJob>,
    armed: HashMap<String, JoinHandle<()>>,
    binding: Option<Arc<Binding>>,
}

pub struct JobScheduler {
    path: PathBuf,
    state: TokioMutex<State>,
    fire_timeout: Duration,
}

impl JobScheduler {
    /// Open the store at `path`. A missing file means no jobs; an unreadable
    /// one is an error so it is never silently overwritten.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let jobs = load_jobs(&path)?;
        debug!(path = %path.display(), jobs = jobs.len(), "cron store loaded");
        Ok(Self {
            path,
            state: TokioMutex::new(State {
                jobs: jobs.into_iter().map(|j| (j.id.clone(), j)).collect(),
                ..Default::default()
            }),
            fire_timeout: FIRE_TIMEOUT,
        })
    }

    pub fn with_fire_timeout(mut self, timeout: Duration) -> Self {
        self.fire_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arm every enabled job. Calling `start` again re-arms from scratch.
    /// Enabled jobs whose schedule no longer parses are disabled.
    pub async fn start(
        &self,
        invoker: Arc<dyn AgentInvoker>,
        sender: Option<Arc<dyn MessageSender>>,
    ) {
        let mut state = self.state.lock().await;
        disarm_all(&mut state);

        let binding = Arc::new(Binding {
            invoker,
            sender,
            fire_timeout: self.fire_timeout,
        });
        let enabled: Vec<CronJob> = state.jobs.values().filter(|j| j.enabled).cloned().collect();
        let mut disabled = 0;
        for job in enabled {
            match JobSchedule::parse(&job.schedule) {
                Ok(schedule) => {
                    let id = job.id.clone();
                    let handle = arm(job, schedule, Arc::clone(&binding));
                    state.armed.insert(id, handle);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "disabling job with invalid schedule");
                    if let Some(stored) = state.jobs.get_mut(&job.id) {
                        stored.enabled = false;
                        disabled += 1;
                    }
                }
            }
        }
        if disabled > 0 {
            // A failed write is logged by `persist`; the jobs stay disabled
            // in memory either way.
            let _ = self.persist(&state).await;
        }
        state.binding = Some(binding);
        info!(jobs = state.jobs.len(), armed = state.armed.len(), "cron service started");
    }

    /// Disarm every job. Definitions stay on disk.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        disarm_all(&mut state);
        state.binding = None;
        info!("cron service stopped");
    }

    /// Validate the schedule, then create, persist and arm (if started) a job.
    pub async fn add(
        &self,
        name: &str,
        schedule: &str,
        message: &str,
        chat_id: &str,
    ) -> Result<CronJob> {
        let parsed = JobSchedule::parse(schedule)?;

        let mut state = self.state.lock().await;
        let id = unique_id(&state.jobs);
        let job = CronJob {
            id: id.clone(),
            name: name.to_string(),
            schedule: schedule.to_string(),
            message: message.to_string(),
            chat_id: chat_id.to_string(),
            enabled: true,
            created: Utc::now(),
        };

        state.jobs.insert(id.clone(), job.clone());
        if let Err(e) = self.persist(&state).await {
            state.jobs.remove(&id);
            return Err(e);
        }
        if let Some(binding) = state.binding.clone() {
            let handle = arm(job.clone(), parsed, binding);
            state.armed.insert(id.clone(), handle);
        }

        info!(job_id = %id, name = %name, schedule = %schedule, "cron job added");
        Ok(job)
    }

    /// Disarm and delete a job. The job stays scheduled if the store cannot
    /// be written.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.remove(id) else {
            return Err(MiniclawError::JobNotFound(id.to_string()));
        };
        if let Err(e) = self.persist(&state).await {
            state.jobs.insert(job.id.clone(), job);
            return Err(e);
        }
        if let Some(handle) = state.armed.remove(id) {
            handle.abort();
        }
        info!(job_id = %id, name = %job.name, "cron job removed");
        Ok(())
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<CronJob> {
        let state = self.state.lock().await;
        sorted(&state.jobs)
    }

    pub async fn list_formatted(&self) -> String {
        format_jobs(&self.list().await)
    }

    /// Number of jobs with a live timer.
    pub async fn armed_count(&self) -> usize {
        self.state.lock().await.armed.len()
    }

    async fn persist(&self, state: &State) -> Result<()> {
        write_jobs(&self.path, &sorted(&state.jobs)).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "failed to persist cron jobs");
            e
        })
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        disarm_all(self.state.get_mut());
    }
}

/// Human-readable listing used by `cron_list` and the CLI.
pub fn format_jobs(jobs: &[CronJob]) -> String {
    if jobs.is_empty() {
        return "No cron jobs scheduled.".into();
    }
    jobs.iter()
        .map(|j| {
            let status = if j.enabled { "enabled" } else { "disabled" };
            format!(
                "• [{}] {} — {} ({status})\n  Message: {}",
                j.id, j.name, j.schedule, j.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sorted(jobs: &HashMap<String, CronJob>) -> Vec<CronJob> {
    let mut list: Vec<CronJob> = jobs.values().cloned().collect();
    list.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
    list
}

fn disarm_all(state: &mut State) {
    for (_, handle) in state.armed.drain() {
        handle.abort();
    }
}

/// Decimal nanosecond timestamp, bumped until it collides with no job.
fn unique_id(jobs: &HashMap<String, CronJob>) -> String {
    let mut nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    while jobs.contains_key(&nanos.to_string()) {
        nanos += 1;
    }
    nanos.to_string()
}

/// Timer task for one job: sleep until the next fire time, spawn the
/// firing, repeat.
fn arm(job: CronJob, schedule: JobSchedule, binding: Arc<Binding>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let Some(next) = schedule.next_after(now) else {
                info!(job_id = %job.id, "job has no future fire time");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(job_id = %job.id, next = %next, "job armed");
            tokio::time::sleep(wait).await;
            tokio::spawn(fire(job.clone(), Arc::clone(&binding)));
        }
    })
}

async fn fire(job: CronJob, binding: Arc<Binding>) {
    info!(job_id = %job.id, name = %job.name, "cron job firing");
    let session_key = format!("cron:{}", job.id);
    let recipient = (!job.chat_id.is_empty()).then_some(job.chat_id.as_str());

    let outcome = tokio::time::timeout(
        binding.fire_timeout,
        binding.invoker.invoke(&session_key, recipient, &job.message),
    )
    .await
    .unwrap_or_else(|_| {
        Err(MiniclawError::Timeout(format!(
            "cron job exceeded {}s",
            binding.fire_timeout.as_secs()
        )))
    });

    let text = match outcome {
        Ok(reply) if reply.trim().is_empty() => return,
        Ok(reply) => reply,
        Err(e) => {
            error!(job_id = %job.id, error = %e, "cron agent error");
            format!("{ERROR_NOTICE_PREFIX}{e}")
        }
    };

    let (Some(sender), Some(to)) = (&binding.sender, recipient) else {
        return;
    };
    if let Err(e) = sender.send_text(to, &text).await {
        warn!(job_id = %job.id, error = %e, "failed to deliver cron result");
    }
}

fn load_jobs(path: &Path) -> Result<Vec<CronJob>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(vec![]);
    }
    serde_json::from_str(&raw).map_err(|e| {
        warn!(path = %path.display(), error = %e, "unreadable cron store");
        e.into()
    })
}

async fn write_jobs(path: &Path, jobs: &[CronJob]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_string_pretty(jobs)?;
    tokio::fs::write(path, data).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}
