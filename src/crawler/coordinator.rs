//! Crawler coordinator - traversal orchestration
//!
//! This module contains the fetch engine that drives a traversal run:
//! - Turning an id sequence or a page range into catalog requests
//! - Issuing requests sequentially or behind the admission gate
//! - Running every response through the stopping chain
//! - Filtering "not found" records and normalizing the survivors
//! - Reassembling results in submission order

use crate::config::Config;
use crate::crawler::fetcher::{CatalogClient, ReqwestCatalogClient, RequestParams, SearchQuery};
use crate::crawler::retry::{get_with_retry, Backoff};
use crate::crawler::scheduler::{AdmissionGate, ScheduledFetch, Scheduler};
use crate::ids::VideoId;
use crate::normalize::{RecordTransform, Resource, VideoNormalizer};
use crate::payload;
use crate::stopping::{StopSignal, StoppingChain, Verdict};
use crate::{CrawlError, NormalizeError};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// How often (in evaluated responses) progress is logged
const PROGRESS_EVERY: usize = 10;

/// A finished request: submission index, parameters and payload
type Completion = (usize, RequestParams, Result<Value, CrawlError>);

/// How requests of a traversal run are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One request at a time; transport failures end the run
    Sequential,
    /// Up to `max_concurrency` requests open at once; transport failures are
    /// retried with backoff
    Concurrent { max_concurrency: usize },
}

/// Result of one traversal run
#[derive(Debug, Clone)]
pub struct RunOutcome<T> {
    /// Accepted records, in submission order
    pub records: Vec<T>,

    /// Why the run stopped early, if it did
    pub stop: Option<StopSignal>,

    /// Responses evaluated by the stopping chain
    pub responses: usize,

    /// Records skipped because the catalog reported "not found"
    pub not_found: usize,

    /// Records skipped because they could not be normalized
    pub malformed: usize,

    /// Requests that completed after a stop, successfully or not, and were
    /// discarded
    pub discarded: usize,
}

impl<T> Default for RunOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            stop: None,
            responses: 0,
            not_found: 0,
            malformed: 0,
            discarded: 0,
        }
    }
}

/// Result of a single lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The video exists
    Found(T),
    /// The catalog reported "not found"
    NotFound,
    /// A stopper fired on the response (rate limiting, out of range, ...)
    Stopped(StopSignal),
}

impl<T> Lookup<T> {
    /// The record, if the video was found
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound | Self::Stopped(_) => None,
        }
    }
}

impl<T> RunOutcome<T> {
    /// Returns true if a stopper ended the run early
    pub fn stopped(&self) -> bool {
        self.stop.is_some()
    }
}

/// Fetch engine for one catalog
///
/// The crawler owns a template [`StoppingChain`]; each run works on a fresh
/// copy, so stopper counters never leak from one run into the next.
pub struct Crawler<C, T = VideoNormalizer> {
    client: C,
    transform: T,
    stoppers: StoppingChain,
    mode: FetchMode,
    backoff: Backoff,
    thumbsize: String,
    cancel: CancellationToken,
}

impl Crawler<ReqwestCatalogClient, VideoNormalizer> {
    /// Creates a sequential crawler from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Crawler with a reqwest client and the configured stoppers
    /// * `Err(CrawlError)` - Invalid configuration or HTTP client failure
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let client = ReqwestCatalogClient::from_config(&config.api, &config.client)?;
        let stoppers = StoppingChain::from_config(&config.stopping)?;

        Ok(Crawler::new(client)
            .with_stoppers(stoppers)
            .with_backoff(Backoff::from_config(&config.fetch))
            .with_thumbsize(&config.api.thumbsize))
    }
}

impl<C: CatalogClient> Crawler<C, VideoNormalizer> {
    /// Creates a sequential crawler with no stoppers and default settings
    pub fn new(client: C) -> Self {
        Self {
            client,
            transform: VideoNormalizer,
            stoppers: StoppingChain::new(),
            mode: FetchMode::Sequential,
            backoff: Backoff::default(),
            thumbsize: "big".to_string(),
            cancel: CancellationToken::new(),
        }
    }
}

impl<C: CatalogClient, T: RecordTransform> Crawler<C, T> {
    /// Replaces the record transform
    pub fn with_transform<U: RecordTransform>(self, transform: U) -> Crawler<C, U> {
        Crawler {
            client: self.client,
            transform,
            stoppers: self.stoppers,
            mode: self.mode,
            backoff: self.backoff,
            thumbsize: self.thumbsize,
            cancel: self.cancel,
        }
    }

    pub fn with_stoppers(mut self, stoppers: StoppingChain) -> Self {
        self.stoppers = stoppers;
        self
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_thumbsize(mut self, thumbsize: &str) -> Self {
        self.thumbsize = thumbsize.to_string();
        self
    }

    /// Uses `cancel` to abort runs; cancelling it ends any run in progress
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Token that cancels runs of this crawler
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Looks up every id of `ids`, in order
    ///
    /// Stops issuing requests as soon as a stopper fires and returns the
    /// records accepted so far. "Not found" responses go through the stopping
    /// chain before being dropped.
    pub async fn fetch_by_ids<I>(&self, ids: I) -> Result<RunOutcome<T::Output>, CrawlError>
    where
        I: IntoIterator<Item = VideoId>,
    {
        let thumbsize = self.thumbsize.clone();
        let requests = ids
            .into_iter()
            .map(move |id| RequestParams::video(&thumbsize, id));
        self.run(requests).await
    }

    /// Fetches search pages `1..=n_pages`
    ///
    /// Every page may carry several records; a "not found" code on one of
    /// them drops that record only.
    pub async fn fetch_by_pages(
        &self,
        n_pages: u32,
        query: &SearchQuery,
    ) -> Result<RunOutcome<T::Output>, CrawlError> {
        let thumbsize = self.thumbsize.clone();
        let query = query.clone();
        let requests =
            (1..=n_pages).map(move |page| RequestParams::search_page(&thumbsize, page, query.clone()));
        self.run(requests).await
    }

    /// Looks up a single video
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The video exists
    /// * `Ok(None)` - The catalog reported "not found", or a stopper fired
    /// * `Err(CrawlError)` - Transport failure or malformed record
    ///
    /// Use [`Crawler::lookup_video`] to tell the two `None` cases apart.
    pub async fn get_video(&self, id: VideoId) -> Result<Option<T::Output>, CrawlError> {
        Ok(self.lookup_video(id).await?.found())
    }

    /// Looks up a single video, reporting why no record came back
    pub async fn lookup_video(&self, id: VideoId) -> Result<Lookup<T::Output>, CrawlError> {
        let params = RequestParams::video(&self.thumbsize, id);
        let payload = self.fetch_one(&params).await?;

        let mut stoppers = self.stoppers.fresh();
        if let Verdict::Stop(signal) = stoppers.after_response(&payload) {
            tracing::warn!("Lookup of {} stopped: {}", id, signal);
            return Ok(Lookup::Stopped(signal));
        }

        if payload::is_not_found(&payload) {
            tracing::info!("Video {} not found", id);
            return Ok(Lookup::NotFound);
        }

        let video = payload
            .get("video")
            .ok_or_else(|| NormalizeError::MissingField("video".to_string()))?;
        let record = self.transform.transform(video, Resource::VideoById)?;
        Ok(Lookup::Found(record))
    }

    /// Runs one traversal over `requests` in the configured mode
    async fn run<I>(&self, requests: I) -> Result<RunOutcome<T::Output>, CrawlError>
    where
        I: Iterator<Item = RequestParams>,
    {
        let outcome = match self.mode {
            FetchMode::Sequential => self.run_sequential(requests).await?,
            FetchMode::Concurrent { max_concurrency } => {
                self.run_concurrent(requests, max_concurrency).await?
            }
        };

        match &outcome.stop {
            Some(signal) => tracing::warn!(
                "Traversal stopped after {} responses: {}",
                outcome.responses,
                signal
            ),
            None => tracing::info!("Traversal finished after {} responses", outcome.responses),
        }
        tracing::info!(
            "Accepted {} records ({} not found, {} malformed, {} discarded)",
            outcome.records.len(),
            outcome.not_found,
            outcome.malformed,
            outcome.discarded
        );

        Ok(outcome)
    }

    /// One request at a time; the first stop ends the run immediately
    async fn run_sequential<I>(&self, requests: I) -> Result<RunOutcome<T::Output>, CrawlError>
    where
        I: Iterator<Item = RequestParams>,
    {
        let mut stoppers = self.stoppers.fresh();
        let mut outcome = RunOutcome::default();

        for params in requests {
            let payload = self.fetch_one(&params).await?;

            if let Some(records) = self.evaluate(&mut stoppers, &params, &payload, &mut outcome) {
                outcome.records.extend(records);
            } else {
                break;
            }
        }

        Ok(outcome)
    }

    /// Up to `max_concurrency` requests in flight
    ///
    /// Responses are evaluated in completion order. After a stop, no new
    /// request is admitted; requests already in flight are drained and their
    /// responses discarded. Accepted records are reassembled by submission
    /// index.
    async fn run_concurrent<I>(
        &self,
        requests: I,
        max_concurrency: usize,
    ) -> Result<RunOutcome<T::Output>, CrawlError>
    where
        I: Iterator<Item = RequestParams>,
    {
        let mut stoppers = self.stoppers.fresh();
        let mut outcome = RunOutcome::default();
        let mut accepted: BTreeMap<usize, Vec<T::Output>> = BTreeMap::new();

        let mut scheduler = Scheduler::new(requests, AdmissionGate::new(max_concurrency));
        let mut in_flight: FuturesUnordered<BoxFuture<'_, Completion>> =
            FuturesUnordered::new();

        loop {
            let dispatching = outcome.stop.is_none() && !scheduler.is_exhausted();
            if in_flight.is_empty() && !dispatching {
                break;
            }

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => return Err(CrawlError::Cancelled),

                Some((index, params, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    if outcome.stop.is_some() {
                        match &result {
                            Ok(_) => tracing::debug!("Discarding {} received after stop", params),
                            Err(e) => tracing::debug!("Discarding failed {} after stop: {}", params, e),
                        }
                        outcome.discarded += 1;
                        continue;
                    }

                    let payload: Value = result?;

                    if let Some(records) = self.evaluate(&mut stoppers, &params, &payload, &mut outcome) {
                        accepted.insert(index, records);
                    }
                }

                scheduled = scheduler.next_fetch(), if dispatching => {
                    if let Some(fetch) = scheduled? {
                        in_flight.push(self.dispatch(fetch).boxed());
                    }
                }
            }
        }

        outcome.records = accepted.into_values().flatten().collect();
        Ok(outcome)
    }

    /// Issues one admitted request with retry; the slot is released when
    /// the returned future completes or is dropped
    async fn dispatch(&self, fetch: ScheduledFetch<RequestParams>) -> Completion {
        let ScheduledFetch {
            index,
            item: params,
            permit,
        } = fetch;
        let result = get_with_retry(&self.client, &params, self.backoff, &self.cancel).await;
        drop(permit);
        (index, params, result)
    }

    /// Single attempt, abandoned on cancellation
    async fn fetch_one(&self, params: &RequestParams) -> Result<Value, CrawlError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CrawlError::Cancelled),
            result = self.client.get(params) => Ok(result?),
        }
    }

    /// Runs a response through the stopping chain, then extracts its records
    ///
    /// Returns `None` when the run must stop.
    fn evaluate(
        &self,
        stoppers: &mut StoppingChain,
        params: &RequestParams,
        payload: &Value,
        outcome: &mut RunOutcome<T::Output>,
    ) -> Option<Vec<T::Output>> {
        outcome.responses += 1;
        if outcome.responses % PROGRESS_EVERY == 0 {
            tracing::info!(
                "Progress: {} responses, {} not found, {} malformed",
                outcome.responses,
                outcome.not_found,
                outcome.malformed
            );
        }

        if let Verdict::Stop(signal) = stoppers.after_response(payload) {
            tracing::debug!("Stop raised by {}", params);
            outcome.stop = Some(signal);
            return None;
        }

        Some(self.extract(params, payload, outcome))
    }

    /// Pulls the normalizable records out of one response
    fn extract(
        &self,
        params: &RequestParams,
        payload: &Value,
        outcome: &mut RunOutcome<T::Output>,
    ) -> Vec<T::Output> {
        let resource = params.resource();

        let wrappers: Vec<&Value> = match resource {
            Resource::VideoById => vec![payload],
            Resource::Search => match payload.get("videos").and_then(Value::as_array) {
                Some(videos) => videos.iter().collect(),
                None if payload::is_not_found(payload) => {
                    outcome.not_found += 1;
                    return Vec::new();
                }
                None => {
                    tracing::warn!("Skipping {}: response has no 'videos' array", params);
                    outcome.malformed += 1;
                    return Vec::new();
                }
            },
        };

        let mut records = Vec::with_capacity(wrappers.len());
        for wrapper in wrappers {
            if payload::is_not_found(wrapper) {
                outcome.not_found += 1;
                continue;
            }

            let normalized = wrapper
                .get("video")
                .ok_or_else(|| NormalizeError::MissingField("video".to_string()))
                .and_then(|video| self.transform.transform(video, resource));

            match normalized {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed record from {}: {}", params, e);
                    outcome.malformed += 1;
                }
            }
        }
        records
    }
}
