//! Background survival prediction with a local fallback model
//!
//! Predictions run on a dedicated tokio task fed through a channel, so a
//! caller can queue work and keep going. The task first asks the backend
//! (`POST /survival-prediction`); when that fails for any reason it answers
//! with a coarse local estimate instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::api::ApiClient;
use crate::data::PredictionInput;

/// Errors that can occur when talking to the prediction task
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictionError {
    #[error("Prediction task is no longer running")]
    TaskClosed,
}

/// Six-month and one-year churn probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnRisk {
    pub six_month: f64,
    pub one_year: f64,
}

/// Estimate produced without the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPrediction {
    /// Expected tenure in months
    pub median_survival: i64,
    /// Expected tenure times monthly charges
    pub lifetime_value: i64,
    pub churn_risk: ChurnRisk,
}

impl LocalPrediction {
    /// Rule-of-thumb estimate from contract, charges and internet service
    ///
    /// Unknown contract types are treated as month-to-month.
    pub fn estimate(input: &PredictionInput) -> Self {
        let mut tenure: f64 = match input.contract.as_str() {
            "One year" => 32.0,
            "Two year" => 60.0,
            _ => 14.0,
        };

        let charges = input.monthly_charges;
        if charges > 100.0 {
            tenure *= 0.9;
        } else if charges > 70.0 {
            tenure *= 0.95;
        } else if charges < 35.0 {
            tenure *= 1.1;
        }

        match input.internet_service.as_str() {
            "Fiber optic" => tenure *= 0.85,
            "No" => tenure *= 1.15,
            _ => {}
        }

        let churn_risk = match input.contract.as_str() {
            "One year" => ChurnRisk {
                six_month: 0.1,
                one_year: 0.2,
            },
            "Two year" => ChurnRisk {
                six_month: 0.05,
                one_year: 0.12,
            },
            _ => ChurnRisk {
                six_month: 0.25,
                one_year: 0.5,
            },
        };

        Self {
            median_survival: tenure.round() as i64,
            lifetime_value: (tenure * charges).round() as i64,
            churn_risk,
        }
    }
}

/// Where a prediction came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "prediction", rename_all = "lowercase")]
pub enum PredictionOutcome {
    /// The backend's model answered
    Remote(Value),
    /// The backend was unavailable; this is the local estimate
    Local(LocalPrediction),
}

impl PredictionOutcome {
    pub fn is_local(&self) -> bool {
        matches!(self, PredictionOutcome::Local(_))
    }
}

struct Job {
    input: PredictionInput,
    reply: oneshot::Sender<PredictionOutcome>,
}

/// Handle to the background prediction task
///
/// Jobs are handled one at a time in submission order. Dropping every handle
/// or calling `shutdown` stops the task.
#[derive(Debug, Clone)]
pub struct PredictionTask {
    jobs: mpsc::Sender<Job>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PredictionTask {
    /// Spawns the task on the current tokio runtime
    pub fn spawn(client: ApiClient) -> Self {
        let (jobs, mut job_rx) = mpsc::channel::<Job>(16);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    job = job_rx.recv() => {
                        let Some(job) = job else { break };
                        let outcome = predict(&client, &job.input).await;
                        // The submitter may have given up waiting
                        let _ = job.reply.send(outcome);
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            tracing::debug!("prediction task stopped");
        });

        Self { jobs, shutdown_tx }
    }

    /// Queues a prediction and waits for its outcome
    pub async fn submit(&self, input: PredictionInput) -> Result<PredictionOutcome, PredictionError> {
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(Job { input, reply })
            .await
            .map_err(|_| PredictionError::TaskClosed)?;
        outcome.await.map_err(|_| PredictionError::TaskClosed)
    }

    /// Stops the task; jobs still queued are dropped
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn predict(client: &ApiClient, input: &PredictionInput) -> PredictionOutcome {
    match client.predict_customer_survival(input).await {
        Ok(prediction) => PredictionOutcome::Remote(prediction),
        Err(e) => {
            tracing::warn!(error = %e, "survival prediction unavailable, using local model");
            PredictionOutcome::Local(LocalPrediction::estimate(input))
        }
    }
}
