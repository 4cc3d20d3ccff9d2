//! Best-effort push of the two temperature channels to the LCD display node.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::Reading;

pub const DEFAULT_DISPLAY_URL: &str = "http://192.168.1.150/mostrar";
pub const DEFAULT_DISPLAY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("field {field:?} is not numeric: {value}")]
    Payload { field: &'static str, value: Value },

    #[error("display request timed out")]
    Timeout,

    #[error("display request failed: {0}")]
    Http(String),

    #[error("display answered {0}")]
    Status(StatusCode),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if let Some(status) = err.status() {
            NotifyError::Status(status)
        } else {
            NotifyError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub sensor1: f64,
    pub sensor2: f64,
}

impl DisplayPayload {
    /// `t1`/`t2` rounded to two decimals; an absent field counts as zero and
    /// booleans count as 1 / 0.
    pub fn from_reading(reading: &Reading) -> Result<Self, NotifyError> {
        Ok(Self {
            sensor1: channel(reading, "t1")?,
            sensor2: channel(reading, "t2")?,
        })
    }
}

fn channel(reading: &Reading, field: &'static str) -> Result<f64, NotifyError> {
    let number = match reading.get(field) {
        None => return Ok(0.0),
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(value) => value.as_f64().ok_or_else(|| NotifyError::Payload {
            field,
            value: value.clone(),
        })?,
    };
    Ok(round2(number))
}

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // Near f64::MAX the scaling overflows; such values have no fractional part anyway.
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &DisplayPayload) -> Result<(), NotifyError>;
}

/// Posts payloads as JSON to the display node. One attempt, bounded by the client timeout.
pub struct DisplayForwarder {
    client: Client,
    url: String,
}

impl DisplayForwarder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[rocket::async_trait]
impl Notifier for DisplayForwarder {
    async fn notify(&self, payload: &DisplayPayload) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Derives the display payload from `reading` and sends it once.
///
/// The outcome is logged here; callers are free to drop the returned result.
pub async fn forward(notifier: &dyn Notifier, reading: &Reading) -> Result<DisplayPayload, NotifyError> {
    let outcome = match DisplayPayload::from_reading(reading) {
        Ok(payload) => notifier.notify(&payload).await.map(|()| payload),
        Err(err) => Err(err),
    };

    match &outcome {
        Ok(payload) => info!(
            "forwarded to display: sensor1={} sensor2={}",
            payload.sensor1, payload.sensor2
        ),
        Err(err) => warn!("display forward skipped: {}", err),
    }

    outcome
}
