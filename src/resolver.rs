//! Fallback Resolver
//!
//! Fetches a record from the first source able to provide it, in fixed
//! precedence order (primary, remote, static fallback), and reports where the
//! data came from together with every attempt made along the way. Each
//! attempt is bounded by the per-attempt timeout and by the caller's deadline;
//! results from different sources are never merged.

use crate::entity::{EntityRecord, EntityType, EntityTypeConfig, EntityTypeRegistry};
use crate::error::ApiError;
use crate::source::{SourceClient, SourceKind};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Where resolved data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Primary,
    Remote,
    StaticFallback,
    None,
}

impl From<SourceKind> for ResolutionSource {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Primary => ResolutionSource::Primary,
            SourceKind::Remote => ResolutionSource::Remote,
            SourceKind::StaticFallback => ResolutionSource::StaticFallback,
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionSource::Primary => "primary",
            ResolutionSource::Remote => "remote",
            ResolutionSource::StaticFallback => "static_fallback",
            ResolutionSource::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Found,
    Absent,
    Unavailable { reason: String },
    TimedOut,
    /// Not attempted because the deadline had passed.
    Skipped,
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Found => "found",
            AttemptOutcome::Absent => "absent",
            AttemptOutcome::Unavailable { .. } => "unavailable",
            AttemptOutcome::TimedOut => "timed_out",
            AttemptOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: SourceKind,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionErrorKind {
    /// At least one source failed and none had the record.
    SourcesUnavailable,
    /// The deadline passed before every source was consulted.
    DeadlineExceeded,
}

/// Aggregated failure summary listing every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub message: String,
    pub attempts: Vec<SourceAttempt>,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result of one resolution.
///
/// `data` is present exactly when `source` is not `None`. When `data` is
/// absent and `error` is `None`, every source answered cleanly that it does
/// not hold the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub data: Option<EntityRecord>,
    pub source: ResolutionSource,
    pub attempts: Vec<SourceAttempt>,
    pub error: Option<ResolutionError>,
}

impl ResolutionResult {
    pub fn is_found(&self) -> bool {
        self.data.is_some()
    }

    /// True not-found: nothing failed, nobody had it.
    pub fn is_not_found(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    fn exhausted(attempts: Vec<SourceAttempt>, deadline_hit: bool) -> Self {
        let error = if deadline_hit {
            Some(ResolutionErrorKind::DeadlineExceeded)
        } else if attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Absent)
        {
            None
        } else {
            Some(ResolutionErrorKind::SourcesUnavailable)
        };

        let error = error.map(|kind| ResolutionError {
            kind,
            message: summarize(kind, &attempts),
            attempts: attempts.clone(),
        });
        Self {
            data: None,
            source: ResolutionSource::None,
            attempts,
            error,
        }
    }
}

fn summarize(kind: ResolutionErrorKind, attempts: &[SourceAttempt]) -> String {
    let head = match kind {
        ResolutionErrorKind::SourcesUnavailable => "no source could provide the record",
        ResolutionErrorKind::DeadlineExceeded => "deadline exceeded before resolution finished",
    };
    let detail = attempts
        .iter()
        .map(|a| match &a.outcome {
            AttemptOutcome::Unavailable { reason } => format!("{}: {}", a.source, reason),
            other => format!("{}: {}", a.source, other.label()),
        })
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} ({})", head, detail)
}

/// Resolver over an ordered set of sources.
pub struct FallbackResolver {
    sources: Vec<Arc<dyn SourceClient>>,
    types: EntityTypeRegistry,
    attempt_timeout: Duration,
    default_deadline: Option<Duration>,
    limiter: Arc<Semaphore>,
}

impl FallbackResolver {
    /// Sources may be passed in any order; they are consulted by precedence.
    pub fn new(
        mut sources: Vec<Arc<dyn SourceClient>>,
        types: EntityTypeRegistry,
        attempt_timeout: Duration,
        concurrency_limit: usize,
    ) -> Self {
        sources.sort_by_key(|s| s.kind());
        Self {
            sources,
            types,
            attempt_timeout,
            default_deadline: None,
            limiter: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Deadline applied by [`resolve`](Self::resolve) when the caller gives none.
    pub fn with_default_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline = deadline;
        self
    }

    pub fn sources(&self) -> &[Arc<dyn SourceClient>] {
        &self.sources
    }

    pub async fn resolve(
        &self,
        entity_type: EntityType,
        identifier: &str,
    ) -> Result<ResolutionResult, ApiError> {
        let deadline = self.default_deadline.map(|d| Instant::now() + d);
        self.resolve_inner(entity_type, identifier, deadline).await
    }

    pub async fn resolve_with_deadline(
        &self,
        entity_type: EntityType,
        identifier: &str,
        deadline: Instant,
    ) -> Result<ResolutionResult, ApiError> {
        self.resolve_inner(entity_type, identifier, Some(deadline))
            .await
    }

    /// Resolve several identifiers concurrently, bounded by the resolver's
    /// concurrency limit. Results come back in input order.
    pub async fn resolve_many(
        &self,
        entity_type: EntityType,
        identifiers: &[String],
        deadline: Option<Instant>,
    ) -> Vec<Result<ResolutionResult, ApiError>> {
        let deadline = deadline.or_else(|| self.default_deadline.map(|d| Instant::now() + d));
        join_all(
            identifiers
                .iter()
                .map(|identifier| self.resolve_inner(entity_type, identifier, deadline)),
        )
        .await
    }

    async fn resolve_inner(
        &self,
        entity_type: EntityType,
        identifier: &str,
        deadline: Option<Instant>,
    ) -> Result<ResolutionResult, ApiError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ApiError::InvalidIdentifier(
                "identifier must not be empty".to_string(),
            ));
        }
        let config = self.types.get_or_error(entity_type)?;
        let sources: Vec<&Arc<dyn SourceClient>> = self
            .sources
            .iter()
            .filter(|s| s.kind() != SourceKind::StaticFallback || config.static_fallback)
            .collect();

        let permit = match deadline {
            Some(deadline) => match timeout_at(deadline, self.limiter.acquire()).await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(%entity_type, identifier, "Deadline passed waiting for a resolution slot");
                    let attempts = sources.iter().map(|s| skipped(s.kind())).collect();
                    return Ok(ResolutionResult::exhausted(attempts, true));
                }
            },
            None => self.limiter.acquire().await,
        };
        let _permit = permit.map_err(|_| ApiError::ConfigError("resolver closed".to_string()))?;

        Ok(self
            .consult(config, identifier, &sources, deadline)
            .await)
    }

    async fn consult(
        &self,
        config: &EntityTypeConfig,
        identifier: &str,
        sources: &[&Arc<dyn SourceClient>],
        deadline: Option<Instant>,
    ) -> ResolutionResult {
        let mut attempts = Vec::with_capacity(sources.len());
        let mut deadline_hit = false;

        for (position, source) in sources.iter().enumerate() {
            let kind = source.kind();
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                deadline_hit = true;
                attempts.extend(sources[position..].iter().map(|s| skipped(s.kind())));
                break;
            }

            let attempt_deadline = match deadline {
                Some(d) => d.min(now + self.attempt_timeout),
                None => now + self.attempt_timeout,
            };
            let fetched = timeout_at(attempt_deadline, source.fetch(config, identifier)).await;
            let elapsed_ms = now.elapsed().as_millis() as u64;

            let outcome = match fetched {
                Ok(Ok(Some(record))) => {
                    attempts.push(SourceAttempt {
                        source: kind,
                        outcome: AttemptOutcome::Found,
                        elapsed_ms,
                    });
                    info!(
                        entity_type = %config.entity_type,
                        identifier,
                        source = %kind,
                        attempts = attempts.len(),
                        "Resolved"
                    );
                    return ResolutionResult {
                        data: Some(record),
                        source: kind.into(),
                        attempts,
                        error: None,
                    };
                }
                Ok(Ok(None)) => AttemptOutcome::Absent,
                Ok(Err(e)) => AttemptOutcome::Unavailable {
                    reason: e.to_string(),
                },
                Err(_) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        deadline_hit = true;
                    }
                    AttemptOutcome::TimedOut
                }
            };

            if matches!(outcome, AttemptOutcome::Unavailable { .. } | AttemptOutcome::TimedOut) {
                warn!(
                    entity_type = %config.entity_type,
                    identifier,
                    source = %kind,
                    outcome = outcome.label(),
                    elapsed_ms,
                    "Source attempt failed"
                );
            } else {
                debug!(
                    entity_type = %config.entity_type,
                    identifier,
                    source = %kind,
                    elapsed_ms,
                    "Source has no record"
                );
            }
            attempts.push(SourceAttempt {
                source: kind,
                outcome,
                elapsed_ms,
            });
        }

        let result = ResolutionResult::exhausted(attempts, deadline_hit);
        match &result.error {
            Some(error) => warn!(
                entity_type = %config.entity_type,
                identifier,
                kind = ?error.kind,
                "Resolution failed: {}",
                error.message
            ),
            None => debug!(entity_type = %config.entity_type, identifier, "Not found in any source"),
        }
        result
    }
}

fn skipped(kind: SourceKind) -> SourceAttempt {
    SourceAttempt {
        source: kind,
        outcome: AttemptOutcome::Skipped,
        elapsed_ms: 0,
    }
}
