//! Enrichment lookups against external inference services.
//!
//! # Responsibility
//! - Define the lookup contract used by the person service.
//! - Classify upstream failures into stable error kinds.
//! - Own weighted nationality selection over predicted candidates.
//!
//! # Invariants
//! - Every lookup is a single bounded attempt; nothing is retried or cached.
//! - Nationality selection is sampled by probability mass, not top-ranked.
//! - Randomness is injected, never drawn from a process-global source.

mod http;

pub use http::{EnrichmentEndpoints, HttpEnrichmentClient, DEFAULT_LOOKUP_TIMEOUT};

use crate::deadline::{Deadline, Interrupted};
use crate::model::person::{CountryCode, Gender};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EnrichResult<T> = Result<T, EnrichError>;

/// Which upstream lookup an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Age,
    Gender,
    Nationality,
}

impl Lookup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Nationality => "nationality",
        }
    }
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason an upstream call did not yield a usable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Non-success HTTP status.
    Status(u16),
    /// Per-call timeout elapsed.
    Timeout,
    /// Connection, DNS or TLS level failure.
    Transport(String),
    /// Body is not the expected JSON shape or holds out-of-domain values.
    MalformedBody(String),
}

impl Display for UpstreamFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "upstream returned status {status}"),
            Self::Timeout => f.write_str("upstream call timed out"),
            Self::Transport(message) => write!(f, "upstream transport failure: {message}"),
            Self::MalformedBody(message) => write!(f, "malformed upstream response: {message}"),
        }
    }
}

/// Error for one enrichment lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    Upstream {
        lookup: Lookup,
        failure: UpstreamFailure,
    },
    /// The service answered but has no prediction for the name.
    NoData(Lookup),
    /// The caller's deadline was cancelled or expired.
    Interrupted {
        lookup: Lookup,
        reason: Interrupted,
    },
}

impl EnrichError {
    pub fn lookup(&self) -> Lookup {
        match self {
            Self::Upstream { lookup, .. } | Self::Interrupted { lookup, .. } => *lookup,
            Self::NoData(lookup) => *lookup,
        }
    }

    /// Stable short code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Upstream {
                failure: UpstreamFailure::Status(_),
                ..
            } => "upstream_status",
            Self::Upstream {
                failure: UpstreamFailure::Timeout,
                ..
            } => "upstream_timeout",
            Self::Upstream {
                failure: UpstreamFailure::Transport(_),
                ..
            } => "upstream_transport",
            Self::Upstream {
                failure: UpstreamFailure::MalformedBody(_),
                ..
            } => "upstream_malformed",
            Self::NoData(_) => "no_data",
            Self::Interrupted { .. } => "interrupted",
        }
    }
}

impl Display for EnrichError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream { lookup, failure } => write!(f, "{lookup} lookup failed: {failure}"),
            Self::NoData(lookup) => write!(f, "{lookup} lookup returned no data"),
            Self::Interrupted { lookup, reason } => write!(f, "{lookup} lookup stopped: {reason}"),
        }
    }
}

impl Error for EnrichError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Interrupted { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Lookup contract consumed by the person service.
///
/// Implementations must be `Sync`: the service issues the three lookups of
/// one create call from parallel threads.
pub trait EnrichmentClient: Sync {
    /// Predicted age for `name`.
    fn age(&self, name: &str, deadline: &Deadline) -> EnrichResult<u32>;
    /// Predicted gender for `name`.
    fn gender(&self, name: &str, deadline: &Deadline) -> EnrichResult<Gender>;
    /// Country code drawn from the predicted nationality distribution.
    fn nationality(&self, name: &str, deadline: &Deadline) -> EnrichResult<CountryCode>;
}

impl<C: EnrichmentClient + ?Sized> EnrichmentClient for &C {
    fn age(&self, name: &str, deadline: &Deadline) -> EnrichResult<u32> {
        (**self).age(name, deadline)
    }

    fn gender(&self, name: &str, deadline: &Deadline) -> EnrichResult<Gender> {
        (**self).gender(name, deadline)
    }

    fn nationality(&self, name: &str, deadline: &Deadline) -> EnrichResult<CountryCode> {
        (**self).nationality(name, deadline)
    }
}

/// Source of uniform samples in `[0, 1)` for weighted selection.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

impl<T: rand::RngCore + Send> RandomSource for T {
    fn next_unit(&mut self) -> f64 {
        rand::Rng::gen::<f64>(self)
    }
}

/// One `{country_id, probability}` entry of a nationality prediction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CountryCandidate {
    pub country_id: String,
    pub probability: f64,
}

impl CountryCandidate {
    pub fn new(country_id: impl Into<String>, probability: f64) -> Self {
        Self {
            country_id: country_id.into(),
            probability,
        }
    }

    fn weight(&self) -> f64 {
        if self.probability.is_finite() && self.probability > 0.0 {
            self.probability
        } else {
            0.0
        }
    }
}

/// Picks a candidate by cumulative-sum sampling with `draw` in `[0, 1)`.
///
/// Probabilities need not sum to one; negative and non-finite weights count
/// as zero. When no candidate carries positive weight the first one wins.
/// Returns `None` only for an empty slice.
pub fn pick_weighted(candidates: &[CountryCandidate], draw: f64) -> Option<&CountryCandidate> {
    let first = candidates.first()?;
    let total: f64 = candidates.iter().map(CountryCandidate::weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return Some(first);
    }

    let target = draw.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    let mut last_weighted = first;
    for candidate in candidates {
        let weight = candidate.weight();
        if weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_weighted = candidate;
        if target < cumulative {
            return Some(candidate);
        }
    }
    Some(last_weighted)
}

/// Resolves a nationality prediction into a validated country code.
pub fn select_nationality(
    candidates: &[CountryCandidate],
    random: &mut dyn RandomSource,
) -> EnrichResult<CountryCode> {
    let picked =
        pick_weighted(candidates, random.next_unit()).ok_or(EnrichError::NoData(Lookup::Nationality))?;
    CountryCode::parse(&picked.country_id).ok_or_else(|| EnrichError::Upstream {
        lookup: Lookup::Nationality,
        failure: UpstreamFailure::MalformedBody(format!(
            "invalid country_id `{}`",
            picked.country_id
        )),
    })
}
