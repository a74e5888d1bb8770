//! HTTP implementation of the enrichment lookups.
//!
//! # Invariants
//! - Each call is one GET with a `name` query parameter.
//! - The effective timeout is `min(lookup timeout, caller deadline)`.
//! - Log events carry lookup kind, status and timing only, never the name.
//!   Failure text is built from error kinds, never from the request URL.
//! - A cancelled or expired deadline ends the wait at once, even while the
//!   request is still in flight.

use super::{
    select_nationality, CountryCandidate, EnrichError, EnrichResult, EnrichmentClient, Lookup,
    RandomSource, UpstreamFailure,
};
use crate::deadline::{Deadline, Interrupted};
use crate::model::person::{CountryCode, Gender};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Default bound for a single upstream lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a waiting lookup re-checks its deadline.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

const USER_AGENT: &str = concat!("people_core/", env!("CARGO_PKG_VERSION"));

/// Base URLs of the three inference services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentEndpoints {
    pub age_url: String,
    pub gender_url: String,
    pub nationality_url: String,
}

impl Default for EnrichmentEndpoints {
    fn default() -> Self {
        Self {
            age_url: "https://api.agify.io".to_string(),
            gender_url: "https://api.genderize.io".to_string(),
            nationality_url: "https://api.nationalize.io".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgeResponse {
    age: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GenderResponse {
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NationalityResponse {
    country: Vec<CountryCandidate>,
}

/// `ureq`-backed enrichment client.
pub struct HttpEnrichmentClient {
    agent: ureq::Agent,
    endpoints: EnrichmentEndpoints,
    timeout: Duration,
    random: Mutex<Box<dyn RandomSource>>,
}

impl std::fmt::Debug for HttpEnrichmentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEnrichmentClient")
            .field("endpoints", &self.endpoints)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpEnrichmentClient {
    /// Builds a client with an entropy-seeded random source.
    pub fn new(endpoints: EnrichmentEndpoints, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .try_proxy_from_env(false)
            .build();
        Self {
            agent,
            endpoints,
            timeout,
            random: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replaces the random source used for nationality sampling.
    pub fn with_random_source(mut self, source: impl RandomSource + 'static) -> Self {
        self.random = Mutex::new(Box::new(source));
        self
    }

    fn fetch<T>(&self, lookup: Lookup, base_url: &str, name: &str, deadline: &Deadline) -> EnrichResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let call_deadline = deadline.child(self.timeout);
        call_deadline
            .check()
            .map_err(|reason| EnrichError::Interrupted { lookup, reason })?;
        let timeout = call_deadline.remaining().unwrap_or(self.timeout);
        let request = self
            .agent
            .get(base_url)
            .query("name", name)
            .timeout(timeout);

        let started_at = Instant::now();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("enrich-{lookup}"))
            .spawn(move || {
                let _ = tx.send(execute::<T>(request));
            })
            .map_err(|err| EnrichError::Upstream {
                lookup,
                failure: UpstreamFailure::Transport(format!("cannot spawn lookup worker: {err}")),
            })?;

        // The blocking call stays on the worker; this thread only waits for it
        // while the deadline holds. An abandoned worker ends at its own timeout.
        let outcome = loop {
            match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(outcome) => break outcome,
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(reason) = deadline.check() {
                        debug!(
                            "event=enrich_lookup module=enrich status=interrupted lookup={} reason={:?} duration_ms={}",
                            lookup,
                            reason,
                            started_at.elapsed().as_millis()
                        );
                        return Err(EnrichError::Interrupted { lookup, reason });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(UpstreamFailure::Transport(
                        "lookup worker exited without a result".to_string(),
                    ))
                }
            }
        };

        // A response that arrives after cancellation is discarded.
        if let Err(reason) = deadline.check() {
            if reason == Interrupted::Cancelled || outcome.is_err() {
                return Err(EnrichError::Interrupted { lookup, reason });
            }
        }

        match outcome {
            Ok((status, body)) => {
                debug!(
                    "event=enrich_lookup module=enrich status=ok lookup={} http_status={} duration_ms={}",
                    lookup,
                    status,
                    started_at.elapsed().as_millis()
                );
                Ok(body)
            }
            Err(failure) => {
                warn!(
                    "event=enrich_lookup module=enrich status=error lookup={} duration_ms={} error={}",
                    lookup,
                    started_at.elapsed().as_millis(),
                    failure
                );
                Err(EnrichError::Upstream { lookup, failure })
            }
        }
    }
}

/// Performs the request and decodes the body; runs on the lookup worker.
fn execute<T: DeserializeOwned>(request: ureq::Request) -> Result<(u16, T), UpstreamFailure> {
    let response = request.call().map_err(classify_ureq_error)?;
    let status = response.status();
    let body = response
        .into_json::<T>()
        .map_err(|err| UpstreamFailure::MalformedBody(err.to_string()))?;
    Ok((status, body))
}

impl EnrichmentClient for HttpEnrichmentClient {
    fn age(&self, name: &str, deadline: &Deadline) -> EnrichResult<u32> {
        let body: AgeResponse = self.fetch(Lookup::Age, &self.endpoints.age_url, name, deadline)?;
        let age = body.age.ok_or(EnrichError::NoData(Lookup::Age))?;
        u32::try_from(age).map_err(|_| EnrichError::Upstream {
            lookup: Lookup::Age,
            failure: UpstreamFailure::MalformedBody(format!("age {age} is out of range")),
        })
    }

    fn gender(&self, name: &str, deadline: &Deadline) -> EnrichResult<Gender> {
        let body: GenderResponse =
            self.fetch(Lookup::Gender, &self.endpoints.gender_url, name, deadline)?;
        let label = body.gender.ok_or(EnrichError::NoData(Lookup::Gender))?;
        Gender::parse(&label).ok_or_else(|| EnrichError::Upstream {
            lookup: Lookup::Gender,
            failure: UpstreamFailure::MalformedBody(format!("unknown gender label `{label}`")),
        })
    }

    fn nationality(&self, name: &str, deadline: &Deadline) -> EnrichResult<CountryCode> {
        let body: NationalityResponse = self.fetch(
            Lookup::Nationality,
            &self.endpoints.nationality_url,
            name,
            deadline,
        )?;
        let mut random = self.random.lock().unwrap_or_else(PoisonError::into_inner);
        select_nationality(&body.country, &mut **random)
    }
}

/// Maps a `ureq` error to a failure whose text never includes the request
/// URL, since the URL carries the looked-up name.
fn classify_ureq_error(err: ureq::Error) -> UpstreamFailure {
    match err {
        ureq::Error::Status(status, _) => UpstreamFailure::Status(status),
        ureq::Error::Transport(transport) => {
            let io_source = Error::source(&transport).and_then(|source| source.downcast_ref::<io::Error>());
            let timed_out = io_source.is_some_and(|io_err| {
                matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
                    || io_err.to_string().to_ascii_lowercase().contains("timed out")
            }) || transport
                .message()
                .is_some_and(|message| message.to_ascii_lowercase().contains("timed out"));
            if timed_out {
                return UpstreamFailure::Timeout;
            }
            match io_source {
                Some(io_err) => UpstreamFailure::Transport(format!("{}: {:?}", transport.kind(), io_err.kind())),
                None => UpstreamFailure::Transport(transport.kind().to_string()),
            }
        }
    }
}
