use miniclaw_config::MiniclawConfig;
use miniclaw_core::Result;
use miniclaw_runtime::JobScheduler;

use super::CronAction;

/// Edit the job store directly. Nothing is armed here; a running gateway
/// picks up changes on its next start.
pub(super) async fn cmd_cron(config: &MiniclawConfig, action: CronAction) -> Result<()> {
    let scheduler = JobScheduler::new(config.cron_path())?;
    match action {
        CronAction::List => println!("{}", scheduler.list_formatted().await),
        CronAction::Add {
            name,
            schedule,
            message,
            chat_id,
        } => {
            let job = scheduler.add(&name, &schedule, &message, &chat_id).await?;
            println!("✅ Job added: [{}] {} — {}", job.id, job.name, job.schedule);
        }
        CronAction::Remove { id } => {
            scheduler.remove(&id).await?;
            println!("✅ Job {id} removed.");
        }
    }
    Ok(())
}
