//! In-process [`GenerativeBackend`] for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::analysis::validation::fixtures::{job_match_payload, resume_payload};
use crate::llm_client::{
    BackendError, BackendRequest, BackendResponse, GenerativeBackend, ResponseShape, Usage,
};

pub enum Reply {
    Payload(Value),
    Fail,
    Hang,
}

/// Counts calls per shape and serves scripted replies, falling back to valid payloads.
#[derive(Default)]
pub struct FakeBackend {
    resume_calls: AtomicU32,
    job_calls: AtomicU32,
    resume_script: Mutex<VecDeque<Reply>>,
    job_script: Mutex<VecDeque<Reply>>,
    latency: Duration,
}

impl FakeBackend {
    pub fn scripted(resume: Vec<Reply>, job: Vec<Reply>) -> Self {
        Self {
            resume_script: Mutex::new(resume.into()),
            job_script: Mutex::new(job.into()),
            ..Self::default()
        }
    }

    /// Every call sleeps `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn resume_calls(&self) -> u32 {
        self.resume_calls.load(Ordering::SeqCst)
    }

    pub fn job_calls(&self) -> u32 {
        self.job_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, shape: ResponseShape) -> Option<Reply> {
        let (calls, script) = match shape {
            ResponseShape::ResumeAnalysis => (&self.resume_calls, &self.resume_script),
            ResponseShape::JobMatch => (&self.job_calls, &self.job_script),
        };
        calls.fetch_add(1, Ordering::SeqCst);
        let mut script = script.lock().unwrap();
        script.pop_front()
    }
}

/// Every successful fake call reports these counters.
pub fn fake_usage() -> Usage {
    Usage {
        prompt_tokens: 100,
        completion_tokens: 50,
        total_tokens: 150,
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    async fn call(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let reply = self.next_reply(request.shape);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let payload = match reply {
            Some(Reply::Payload(v)) => v,
            Some(Reply::Fail) => {
                return Err(BackendError::Api {
                    status: 503,
                    message: "overloaded".to_string(),
                })
            }
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("attempt timeout should fire first")
            }
            None => match request.shape {
                ResponseShape::ResumeAnalysis => resume_payload(),
                ResponseShape::JobMatch => job_match_payload(),
            },
        };
        Ok(BackendResponse {
            payload,
            usage: fake_usage(),
        })
    }

    fn model(&self) -> &str {
        "fake"
    }
}
