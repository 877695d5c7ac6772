//! Worker verdicts, decoded once at the queue-store boundary.
//!
//! The worker writes loosely shaped JSON. Everything past this module deals
//! only with [`Verdict`].

#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Outcome of a single test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "passed"))]
    Passed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "error"))]
    Error,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "runtime_error"))]
    RuntimeError,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "timeout"))]
    Timeout,
    /// Any status the worker reports that is not listed above. Counts as a failure.
    #[serde(other)]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "other"))]
    Other,
}

/// Per-test-case result as reported by the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// The worker echoes the id it was sent, sometimes as a string.
    #[serde(default, deserialize_with = "lenient_id")]
    pub test_case_id: Option<i32>,
    pub status: TestOutcome,
    #[serde(default)]
    pub actual: Option<String>,
    /// Milliseconds.
    #[serde(default)]
    pub execution_time: Option<f64>,
    /// Kilobytes.
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default, alias = "error")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Number(n)) => i32::try_from(n).ok(),
        Some(RawId::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestOutcome::Passed
    }

    /// Results without a public/private tag count as public.
    pub fn is_public(&self) -> bool {
        self.is_public.unwrap_or(true)
    }
}

/// Structured error triple surfaced for compile and system errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[schema(example = "COMPILATION_FAILED")]
    pub error_type: String,
    #[schema(example = "Compilation failed")]
    pub error_message: String,
    pub full_error: Option<String>,
}

impl ErrorDetail {
    pub fn compilation_failed() -> Self {
        Self {
            error_type: "COMPILATION_FAILED".into(),
            error_message: "Compilation failed".into(),
            full_error: None,
        }
    }

    pub fn system_error() -> Self {
        Self {
            error_type: "SYSTEM_ERROR".into(),
            error_message: "The judge reported a system error".into(),
            full_error: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireErrorDetail {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    full_error: Option<String>,
}

/// Aggregate numbers derived from a result list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct VerdictMetrics {
    pub passed: u32,
    pub total: u32,
    /// Mean execution time in ms, rounded. `None` when no result reported a time.
    pub average_runtime_ms: Option<f64>,
    pub public_passed: u32,
    pub public_total: u32,
    pub private_passed: u32,
    pub private_total: u32,
}

impl VerdictMetrics {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut metrics = Self {
            total: results.len() as u32,
            ..Default::default()
        };

        let mut runtime_sum = 0.0;
        let mut runtime_count = 0u32;

        for result in results {
            let passed = result.passed();
            if passed {
                metrics.passed += 1;
            }
            if result.is_public() {
                metrics.public_total += 1;
                metrics.public_passed += passed as u32;
            } else {
                metrics.private_total += 1;
                metrics.private_passed += passed as u32;
            }
            if let Some(t) = result.execution_time {
                runtime_sum += t;
                runtime_count += 1;
            }
        }

        if runtime_count > 0 {
            metrics.average_runtime_ms = Some((runtime_sum / runtime_count as f64).round());
        }

        metrics
    }
}

/// Client-visible state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    CompileError,
    SystemError,
}

/// A worker verdict for one job.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// No verdict key yet, or the worker explicitly reported pending.
    Pending,
    Running,
    CompileError(ErrorDetail),
    Completed(Vec<TestResult>),
    SystemError(ErrorDetail),
}

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("verdict is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("verdict test results are malformed: {0}")]
    MalformedResults(#[source] serde_json::Error),
    #[error("verdict error detail is malformed: {0}")]
    MalformedError(#[source] serde_json::Error),
    #[error("unknown verdict status '{0}'")]
    UnknownStatus(String),
}

impl Verdict {
    /// Decode a raw verdict string.
    ///
    /// Accepts the tagged `{status, testResults?, error?}` shape as well as a
    /// bare result array or `{testResults}` without a status. Well-formed JSON
    /// of any other shape degrades to an empty completed verdict with a
    /// warning. Undecodable payloads are errors.
    pub fn parse(raw: &str) -> Result<Self, VerdictError> {
        let value: Value = serde_json::from_str(raw).map_err(VerdictError::InvalidJson)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, VerdictError> {
        match value {
            Value::Array(_) => Ok(Verdict::Completed(decode_results(value)?)),
            Value::Object(mut map) => {
                let status = map
                    .get("status")
                    .and_then(Value::as_str)
                    .map(str::to_owned);

                match status.as_deref() {
                    Some("pending") => Ok(Verdict::Pending),
                    Some("running") => Ok(Verdict::Running),
                    Some("compile_error") => Ok(Verdict::CompileError(decode_error(
                        map.remove("error"),
                        ErrorDetail::compilation_failed(),
                    )?)),
                    Some("system_error") => Ok(Verdict::SystemError(decode_error(
                        map.remove("error"),
                        ErrorDetail::system_error(),
                    )?)),
                    Some("completed") | None => match map.remove("testResults") {
                        Some(results) => Ok(Verdict::Completed(decode_results(results)?)),
                        None => {
                            warn!(
                                status = status.as_deref().unwrap_or("<none>"),
                                "Verdict carries no test results, treating as empty"
                            );
                            Ok(Verdict::Completed(vec![]))
                        }
                    },
                    Some(other) => Err(VerdictError::UnknownStatus(other.to_owned())),
                }
            }
            other => {
                warn!(verdict = %other, "Unexpected verdict shape, treating as empty");
                Ok(Verdict::Completed(vec![]))
            }
        }
    }

    /// The verdict handed to clients when the stored payload cannot be decoded.
    pub fn malformed(err: &VerdictError) -> Self {
        Verdict::SystemError(ErrorDetail {
            error_type: "MALFORMED_VERDICT".into(),
            error_message: "The judge returned a verdict that could not be read".into(),
            full_error: Some(err.to_string()),
        })
    }

    pub fn state(&self) -> JobState {
        match self {
            Verdict::Pending => JobState::Pending,
            Verdict::Running => JobState::Running,
            Verdict::CompileError(_) => JobState::CompileError,
            Verdict::Completed(_) => JobState::Completed,
            Verdict::SystemError(_) => JobState::SystemError,
        }
    }
}

fn decode_results(value: Value) -> Result<Vec<TestResult>, VerdictError> {
    if value.is_null() {
        warn!("Verdict test results are null, treating as empty");
        return Ok(vec![]);
    }
    serde_json::from_value(value).map_err(VerdictError::MalformedResults)
}

fn decode_error(value: Option<Value>, default: ErrorDetail) -> Result<ErrorDetail, VerdictError> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(message)) => Ok(ErrorDetail {
            full_error: Some(message.clone()),
            error_message: message,
            ..default
        }),
        Some(value) => {
            let wire: WireErrorDetail =
                serde_json::from_value(value).map_err(VerdictError::MalformedError)?;
            Ok(ErrorDetail {
                error_type: wire.error_type.unwrap_or(default.error_type),
                error_message: wire.error_message.unwrap_or(default.error_message),
                full_error: wire.full_error,
            })
        }
    }
}
