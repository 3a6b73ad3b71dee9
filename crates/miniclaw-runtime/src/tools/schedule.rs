use async_trait::async_trait;
use miniclaw_core::{AgentTool, Result, Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

use super::str_arg;
use crate::scheduler::JobScheduler;

pub struct CronAddTool {
    scheduler: Arc<JobScheduler>,
}

impl CronAddTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for CronAddTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "cron_add".into(),
            description: "Schedule a recurring or one-shot task. The agent will be called with \
                          the given message when the schedule fires, and the response is sent to \
                          the current chat. Use standard cron expressions (e.g. '0 9 * * *' for \
                          9 AM daily) or '@every 30m', '@hourly', '@daily'."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Short human-readable name for the job."},
                    "schedule": {
                        "type": "string",
                        "description": "Cron expression (e.g. '0 9 * * *') or shorthand ('@every 30m', '@daily')."
                    },
                    "message": {"type": "string", "description": "Message the agent receives when the job fires."}
                },
                "required": ["name", "schedule", "message"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<String> {
        let name = str_arg(&input, "name");
        let schedule = str_arg(&input, "schedule");
        let recipient = ctx.recipient.as_deref().unwrap_or_default();
        self.scheduler
            .add(name, schedule, str_arg(&input, "message"), recipient)
            .await?;
        Ok(format!("✅ Cron job \"{name}\" scheduled ({schedule})."))
    }
}

pub struct CronListTool {
    scheduler: Arc<JobScheduler>,
}

impl CronListTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for CronListTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "cron_list".into(),
            description: "List all scheduled cron jobs.".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<String> {
        Ok(self.scheduler.list_formatted().await)
    }
}

pub struct CronRemoveTool {
    scheduler: Arc<JobScheduler>,
}

impl CronRemoveTool {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl AgentTool for CronRemoveTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "cron_remove".into(),
            description: "Remove a scheduled cron job by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string", "description": "Job ID to remove (from cron_list)."}
                },
                "required": ["id"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let id = str_arg(&input, "id");
        self.scheduler.remove(id).await?;
        Ok(format!("✅ Cron job \"{id}\" removed."))
    }
}
