use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::analysis::inflight::InFlight;
use crate::analysis::retry::RetryPolicy;
use crate::analysis::schema::{AnalysisResult, ErrorCode, JobMatchAnalysis, ResumeAnalysis};
use crate::analysis::usage::{Pricing, UsageAccumulator};
use crate::analysis::validation::{
    validate_analysis_response, validate_job_match, validate_resume_analysis, SchemaViolation,
};
use crate::cache::{derive_cache_key, CacheKey, CacheStore, DEFAULT_TTL};
use crate::llm_client::{BackendError, BackendRequest, GenerativeBackend};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0} is empty")]
    EmptyInput(&'static str),

    #[error("Backend failure: {0}")]
    BackendFailure(#[from] BackendError),

    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    #[error("{stage} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        stage: &'static str,
        attempts: u32,
        last: Box<AnalysisError>,
    },
}

impl AnalysisError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AnalysisError::EmptyInput(_) => ErrorCode::EmptyInput,
            AnalysisError::BackendFailure(_) => ErrorCode::BackendFailure,
            AnalysisError::SchemaViolation(_) => ErrorCode::SchemaViolation,
            AnalysisError::Exhausted { last, .. } => last.code(),
        }
    }
}

type Validator<T> = fn(&Value) -> Result<T, SchemaViolation>;

/// Cache-first analysis pipeline.
///
/// Resume analysis is keyed on the exact resume text and cached only after it validates.
/// Job matching depends on the job description too, so it always goes to the backend.
pub struct AnalysisOrchestrator {
    cache: Arc<dyn CacheStore>,
    backend: Arc<dyn GenerativeBackend>,
    retry: RetryPolicy,
    pricing: Pricing,
    attempt_timeout: Duration,
    cache_ttl: Duration,
    inflight: InFlight,
}

impl AnalysisOrchestrator {
    pub fn new(cache: Arc<dyn CacheStore>, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            cache,
            backend,
            retry: RetryPolicy::default(),
            pricing: Pricing::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            cache_ttl: DEFAULT_TTL,
            inflight: InFlight::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Runs one analysis. Never fails: every error becomes an `error`-status result carrying
    /// whatever usage was spent before the failure.
    pub async fn analyze(&self, resume_text: &str, job_description: Option<&str>) -> AnalysisResult {
        let mut usage = UsageAccumulator::new(self.pricing);

        let outcome = self
            .run(resume_text, job_description, &mut usage)
            .await
            .and_then(|(resume, job_match)| {
                conforming(AnalysisResult::success(resume, job_match, usage.totals()))
            });

        match outcome {
            Ok(result) => {
                info!(
                    backend_calls = usage.calls(),
                    total_tokens = result.token_usage.total_tokens,
                    job_match = result.job_match_analysis.is_some(),
                    "Analysis complete"
                );
                result
            }
            Err(e) => {
                match &e {
                    AnalysisError::EmptyInput(_) => warn!("Analysis rejected: {e}"),
                    _ => error!(backend_calls = usage.calls(), "Analysis failed: {e}"),
                }
                AnalysisResult::error(e.code(), e.to_string(), usage.totals())
            }
        }
    }

    async fn run(
        &self,
        resume_text: &str,
        job_description: Option<&str>,
        usage: &mut UsageAccumulator,
    ) -> Result<(ResumeAnalysis, Option<JobMatchAnalysis>), AnalysisError> {
        if resume_text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput("Resume text"));
        }
        if job_description.is_some_and(|jd| jd.trim().is_empty()) {
            return Err(AnalysisError::EmptyInput("Job description"));
        }

        let key = derive_cache_key(resume_text);
        let resume = self.resume_analysis(resume_text, &key, usage).await?;

        let job_match = match job_description {
            Some(jd) => Some(
                self.call_with_retry(
                    &BackendRequest::job_match(resume_text, jd),
                    usage,
                    validate_job_match,
                )
                .await?,
            ),
            None => None,
        };

        Ok((resume, job_match))
    }

    async fn resume_analysis(
        &self,
        resume_text: &str,
        key: &CacheKey,
        usage: &mut UsageAccumulator,
    ) -> Result<ResumeAnalysis, AnalysisError> {
        if let Some(hit) = self.cached(key).await {
            return Ok(hit);
        }

        let _guard = self.inflight.acquire(key).await;
        // Whoever held the guard before us may have filled the cache.
        if let Some(hit) = self.cached(key).await {
            return Ok(hit);
        }

        let analysis = self
            .call_with_retry(
                &BackendRequest::resume_analysis(resume_text),
                usage,
                validate_resume_analysis,
            )
            .await?;
        info!(
            cache_key = %key,
            sections = analysis.sections.len(),
            points = analysis.sections.iter().map(|s| s.points.len()).sum::<usize>(),
            "Resume analysis validated"
        );

        match serde_json::to_value(&analysis) {
            Ok(value) => self.cache.set(key, &value, Some(self.cache_ttl)).await,
            Err(e) => warn!(cache_key = %key, "Skipping cache write, analysis did not serialize: {e}"),
        }
        Ok(analysis)
    }

    /// Entries are re-validated on the way out; one that no longer passes is a miss.
    async fn cached(&self, key: &CacheKey) -> Option<ResumeAnalysis> {
        let value = self.cache.get(key).await?;
        match validate_resume_analysis(&value) {
            Ok(analysis) => {
                info!(cache_key = %key, backend = self.cache.name(), "Serving resume analysis from cache");
                Some(analysis)
            }
            Err(e) => {
                warn!(cache_key = %key, "Ignoring cache entry that does not validate: {e}");
                None
            }
        }
    }

    async fn call_with_retry<T>(
        &self,
        request: &BackendRequest,
        usage: &mut UsageAccumulator,
        validate: Validator<T>,
    ) -> Result<T, AnalysisError> {
        let stage = request.shape.label();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.attempt(request, usage, validate).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match self.retry.should_retry(attempt, &err) {
                Some(delay) => {
                    warn!(
                        "{stage} attempt {attempt} failed, retrying after {}ms: {err}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(AnalysisError::Exhausted {
                        stage,
                        attempts: attempt,
                        last: Box::new(err),
                    })
                }
            }
        }
    }

    /// One bounded backend call. Usage is recorded as soon as the transport succeeds, so tokens
    /// spent on a payload that then fails validation still count.
    async fn attempt<T>(
        &self,
        request: &BackendRequest,
        usage: &mut UsageAccumulator,
        validate: Validator<T>,
    ) -> Result<T, AnalysisError> {
        let response = tokio::time::timeout(self.attempt_timeout, self.backend.call(request))
            .await
            .map_err(|_| BackendError::Timeout(self.attempt_timeout.as_secs()))??;

        usage.record(&response.usage);
        Ok(validate(&response.payload)?)
    }
}

/// Checks an assembled success result against the full response contract.
fn conforming(result: AnalysisResult) -> Result<AnalysisResult, AnalysisError> {
    let raw = serde_json::to_value(&result).map_err(|e| {
        SchemaViolation::new("$", format!("result did not serialize: {e}"))
    })?;
    validate_analysis_response(&raw)?;
    Ok(result)
}
