// Job Scheduler - schedules the recurring work generation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{error, info};
use uuid::Uuid;

use super::work_generation::RecurringWorkJob;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Contract {0} not found")]
    ContractNotFound(Uuid),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How often the generation engine scans contracts, in minutes.
    pub work_generation_interval_minutes: u32,
    pub auto_generation_enabled: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            // Coarse tick; correctness comes from the idempotency checks,
            // not from exact timing.
            work_generation_interval_minutes: 5,
            auto_generation_enabled: true,
        }
    }
}

impl JobConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(minutes) = std::env::var("WORK_GENERATION_INTERVAL_MINUTES") {
            if let Ok(n) = minutes.parse() {
                config.work_generation_interval_minutes = n;
            }
        }

        if let Ok(enabled) = std::env::var("AUTO_GENERATION_ENABLED") {
            if let Ok(b) = enabled.parse() {
                config.auto_generation_enabled = b;
            }
        }

        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub contracts_processed: i32,
    pub work_orders_created: i32,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Completed,
    PartialFailure,
    Failed,
}

pub struct JobScheduler {
    scheduler: TokioScheduler,
    engine: Arc<RecurringWorkJob>,
    config: JobConfig,
    execution_logs: Arc<RwLock<Vec<JobExecutionLog>>>,
}

impl JobScheduler {
    pub async fn new(engine: Arc<RecurringWorkJob>, config: JobConfig) -> JobResult<Self> {
        let scheduler = TokioScheduler::new().await?;

        Ok(Self {
            scheduler,
            engine,
            config,
            execution_logs: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!("Starting background job scheduler");

        self.schedule_work_generation().await?;
        self.scheduler.start().await?;

        info!("Background job scheduler started successfully");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> JobResult<()> {
        info!("Shutting down background job scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }

    async fn schedule_work_generation(&self) -> JobResult<()> {
        if !self.config.auto_generation_enabled {
            info!("Automatic work generation is disabled, skipping schedule");
            return Ok(());
        }

        let interval = self.config.work_generation_interval_minutes;
        let cron_expr = format!("0 */{} * * * *", interval); // Every N minutes

        let engine = self.engine.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            let logs = logs.clone();

            Box::pin(async move {
                let log_id = Uuid::new_v4();
                let started_at = Utc::now();

                info!("Running recurring work generation job");

                let log = match engine.run(started_at).await {
                    Ok(result) => {
                        let completed_at = Utc::now();
                        let duration = (completed_at - started_at).num_milliseconds();

                        info!(
                            "Work generation completed: {} contracts processed, {} work orders created, {} skipped",
                            result.contracts_processed,
                            result.work_orders_created,
                            result.work_orders_skipped
                        );

                        JobExecutionLog {
                            id: log_id,
                            job_name: "Recurring Work Generation".to_string(),
                            started_at,
                            completed_at: Some(completed_at),
                            status: if result.errors.is_empty() {
                                JobStatus::Completed
                            } else {
                                JobStatus::PartialFailure
                            },
                            contracts_processed: result.contracts_processed,
                            work_orders_created: result.work_orders_created,
                            errors: result.errors,
                            duration_ms: Some(duration),
                        }
                    }
                    Err(e) => {
                        error!("Work generation failed: {}", e);

                        JobExecutionLog {
                            id: log_id,
                            job_name: "Recurring Work Generation".to_string(),
                            started_at,
                            completed_at: Some(Utc::now()),
                            status: JobStatus::Failed,
                            contracts_processed: 0,
                            work_orders_created: 0,
                            errors: vec![e.to_string()],
                            duration_ms: None,
                        }
                    }
                };

                let mut logs = logs.write().await;
                logs.push(log);
                // Keep only last 100 logs
                if logs.len() > 100 {
                    logs.remove(0);
                }
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled work generation to run every {} minutes", interval);

        Ok(())
    }

    pub async fn get_execution_logs(&self) -> Vec<JobExecutionLog> {
        self.execution_logs.read().await.clone()
    }
}
