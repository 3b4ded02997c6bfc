//! Scripted transport for exercising the requester without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::Instant;

use super::transport::{OutboundRequest, Transport, TransportError, TransportResponse};

/// One scripted attempt result.
#[derive(Debug, Clone)]
pub enum Step {
    Status(u16),
    Body(u16, String),
    Timeout,
}

/// Replays a script of results; the final step repeats once the script runs out.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    latency: Duration,
    sends: Mutex<Vec<(Instant, OutboundRequest)>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            latency: Duration::ZERO,
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(step: Step) -> Self {
        Self::new(vec![step])
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.sends.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    /// Time between consecutive sends.
    pub fn send_gaps(&self) -> Vec<Duration> {
        let sends = self.sends.lock().unwrap();
        sends
            .windows(2)
            .map(|w| w[1].0.duration_since(w[0].0))
            .collect()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match steps.pop_front() {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().unwrap_or(Step::Status(200)),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.sends
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let step = self.next_step();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            Step::Status(code) => Ok(TransportResponse::new(
                StatusCode::from_u16(code).unwrap(),
                Vec::new(),
            )),
            Step::Body(code, body) => Ok(TransportResponse::new(
                StatusCode::from_u16(code).unwrap(),
                body.into_bytes(),
            )),
            Step::Timeout => Err(TransportError::Timeout(timeout)),
        }
    }
}
