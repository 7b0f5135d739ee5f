//! Bounded status polling for one remote analysis job
//!
//! The loop is strictly sequential: start, then poll, sleep, poll. Every
//! await races the abort token, and the attempt counter bounds total wait
//! time to roughly `interval * max_attempts`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::AnalysisError;
use crate::api::{AnalysisStatus, DetectionApi, RemoteAnalysis};
use crate::config::AnalysisConfig;

/// Poll budget for one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for PollConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// What a single status response means for the loop
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Continue,
    Success(RemoteAnalysis),
    Failure(String),
}

impl From<AnalysisStatus> for PollOutcome {
    fn from(status: AnalysisStatus) -> Self {
        match status {
            AnalysisStatus::Processing => PollOutcome::Continue,
            AnalysisStatus::Done { result } => PollOutcome::Success(result),
            AnalysisStatus::Error { detail } => {
                PollOutcome::Failure(detail.unwrap_or_else(|| "Analysis error".to_string()))
            }
        }
    }
}

/// Start the job for `file_id` and poll until it resolves
pub async fn poll_until_done(
    api: &dyn DetectionApi,
    file_id: &str,
    config: PollConfig,
    abort: &CancellationToken,
) -> Result<RemoteAnalysis, AnalysisError> {
    debug!(%file_id, ?config, "poll_until_done: called");

    tokio::select! {
        biased;
        _ = abort.cancelled() => return Err(AnalysisError::Cancelled),
        started = api.start_analysis(file_id) => started.map_err(AnalysisError::StartFailed)?,
    }

    for attempt in 1..=config.max_attempts {
        if abort.is_cancelled() {
            debug!(%file_id, attempt, "poll_until_done: aborted");
            return Err(AnalysisError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(AnalysisError::Cancelled),
            response = api.analysis_status(file_id) => response,
        };

        match response {
            Ok(status) => match PollOutcome::from(status) {
                PollOutcome::Continue => debug!(%file_id, attempt, "poll_until_done: still processing"),
                PollOutcome::Success(result) => {
                    debug!(%file_id, attempt, "poll_until_done: done");
                    return Ok(result);
                }
                PollOutcome::Failure(detail) => {
                    debug!(%file_id, attempt, %detail, "poll_until_done: remote failure");
                    return Err(AnalysisError::Remote(detail));
                }
            },
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                warn!(%file_id, attempt, error = %e, "poll failed, retrying on next interval");
            }
            Err(e) => return Err(AnalysisError::Transport(e)),
        }

        if attempt < config.max_attempts {
            tokio::select! {
                biased;
                _ = abort.cancelled() => return Err(AnalysisError::Cancelled),
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    warn!(%file_id, attempts = config.max_attempts, "analysis poll budget exhausted");
    Err(AnalysisError::TimedOut {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::api::client::mock::MockDetectionApi;

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    fn done(name: &str) -> AnalysisStatus {
        AnalysisStatus::Done {
            result: RemoteAnalysis {
                filename: Some(name.to_string()),
                total_objects: Some(2),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_resolves_after_exactly_three_polls() {
        let api = MockDetectionApi::new().with_polls(vec![
            Ok(AnalysisStatus::Processing),
            Ok(AnalysisStatus::Processing),
            Ok(done("r.png")),
        ]);

        let result = poll_until_done(&api, "f1", fast(100), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.filename.as_deref(), Some("r.png"));
        assert_eq!(api.start_count(), 1);
        assert_eq!(api.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_timeout_not_remote_failure() {
        let api = MockDetectionApi::new().with_polls((0..100).map(|_| Ok(AnalysisStatus::Processing)).collect());

        let err = poll_until_done(&api, "f1", fast(100), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::TimedOut { attempts: 100 }));
        assert_eq!(err.to_string(), "Analysis timed out");
        assert_eq!(api.poll_count(), 100);
    }

    #[tokio::test]
    async fn test_transient_poll_error_is_retried() {
        let api = MockDetectionApi::new().with_polls(vec![
            Ok(AnalysisStatus::Processing),
            Err(ApiError::Timeout(Duration::from_secs(10))),
            Ok(AnalysisStatus::Processing),
            Ok(done("r.png")),
        ]);

        let result = poll_until_done(&api, "f1", fast(100), &CancellationToken::new()).await;

        assert!(result.is_ok());
        assert_eq!(api.poll_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_error_on_final_attempt_fails() {
        let api = MockDetectionApi::new().with_polls(vec![
            Ok(AnalysisStatus::Processing),
            Ok(AnalysisStatus::Processing),
            Err(ApiError::Status {
                status: 503,
                detail: "Service Unavailable".to_string(),
            }),
        ]);

        let err = poll_until_done(&api, "f1", fast(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Transport(_)));
        assert_eq!(err.to_string(), "Service Unavailable");
    }

    #[tokio::test]
    async fn test_remote_error_detail_is_verbatim() {
        let api = MockDetectionApi::new().with_polls(vec![
            Ok(AnalysisStatus::Processing),
            Ok(AnalysisStatus::Error {
                detail: Some("Model failed to load".to_string()),
            }),
        ]);

        let err = poll_until_done(&api, "f1", fast(100), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Model failed to load");
        assert_eq!(api.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_start_failure_is_terminal() {
        let api = MockDetectionApi::new().with_starts(vec![Err(ApiError::Status {
            status: 404,
            detail: "File not found".to_string(),
        })]);

        let err = poll_until_done(&api, "f1", fast(100), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::StartFailed(_)));
        assert_eq!(api.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_stops_polling() {
        let api = MockDetectionApi::new();
        let abort = CancellationToken::new();
        let config = PollConfig {
            interval: Duration::from_millis(20),
            max_attempts: 100,
        };

        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = poll_until_done(&api, "f1", config, &abort).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));

        let polls = api.poll_count();
        assert!(polls < 100);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(api.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_starts() {
        let api = MockDetectionApi::new();
        let abort = CancellationToken::new();
        abort.cancel();

        let err = poll_until_done(&api, "f1", fast(100), &abort).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
        assert_eq!(api.start_count(), 0);
    }

    #[test]
    fn test_error_without_detail_gets_generic_message() {
        let outcome = PollOutcome::from(AnalysisStatus::Error { detail: None });
        assert_eq!(outcome, PollOutcome::Failure("Analysis error".to_string()));
    }
}
