//! The advertisement pipeline: decode, enrich, render, emit.
//!
//! Nothing here registers for advertisements. Whatever receives them from the host (a background task trigger, a
//! scanner stream) hands batches to [`Watcher::handle_batch`] or drives [`Watcher::run`].

use futures_core::Stream;
use futures_lite::{FutureExt, StreamExt};
use futures_util::future::join_all;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::gatt::GattClient;
use crate::render::{render, render_parse_error, RenderOptions};
use crate::resolver::{Resolver, ResolverConfig};
use crate::sink::LogSink;
use crate::AdvertisementEvent;

/// Decodes, enriches and renders one event.
///
/// A payload that fails to decode part way is still enriched and rendered from what was recovered, followed by a
/// `Parse Error` line. Lookups still running when `cancel` fires are rendered as timed out.
pub async fn process_event<C: GattClient>(
    event: &AdvertisementEvent,
    resolver: &Resolver<C>,
    options: &RenderOptions,
    cancel: &CancelToken,
) -> Vec<String> {
    let (record, parse_error) = match crate::parse(&event.payload) {
        Ok(record) => (record, None),
        Err(err) => (err.partial().clone(), Some(err)),
    };

    let enrichment = resolver.resolve_record(&record, event.address, cancel).await;
    let mut lines = render(event, &record, &enrichment, 0, options);
    if let Some(err) = &parse_error {
        lines.push(render_parse_error(err, 1, options));
    }
    lines
}

/// Processes every event of a batch concurrently, returning one report per event in batch order.
///
/// When [`ResolverConfig::batch_budget`] is set, lookups still in flight once it has elapsed are cancelled.
pub async fn process_batch<C: GattClient>(
    events: &[AdvertisementEvent],
    resolver: &Resolver<C>,
    options: &RenderOptions,
    cancel: &CancelToken,
) -> Vec<Vec<String>> {
    let cancel = match resolver.config().batch_budget {
        Some(budget) => cancel.clone().with_budget(budget),
        None => cancel.clone(),
    };

    join_all(
        events
            .iter()
            .map(|event| process_event(event, resolver, options, &cancel)),
    )
    .await
}

/// Runs the pipeline against a [`GattClient`] and emits reports to a [`LogSink`].
#[derive(Debug)]
pub struct Watcher<C, S> {
    resolver: Resolver<C>,
    sink: S,
    options: RenderOptions,
}

impl<C: GattClient, S: LogSink> Watcher<C, S> {
    /// Creates a watcher with the default [`ResolverConfig`] and [`RenderOptions`].
    pub fn new(client: C, sink: S) -> Self {
        Self::with_config(client, sink, ResolverConfig::default())
    }

    /// Creates a watcher with the given resolver settings.
    pub fn with_config(client: C, sink: S, config: ResolverConfig) -> Self {
        Watcher {
            resolver: Resolver::new(client, config),
            sink,
            options: RenderOptions::default(),
        }
    }

    /// Replaces the report layout settings.
    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Processes one batch and emits a report per event.
    pub async fn handle_batch(&self, events: &[AdvertisementEvent], cancel: &CancelToken) {
        debug!("processing batch of {} advertisement(s)", events.len());
        for report in process_batch(events, &self.resolver, &self.options, cancel).await {
            self.sink.emit(&report);
        }
    }

    /// Processes batches from `source` until it ends or `cancel` fires.
    ///
    /// Cancellation is observed while waiting for the next batch. A batch that arrives after cancellation is
    /// dropped.
    pub async fn run<St>(&self, mut source: St, cancel: &CancelToken)
    where
        St: Stream<Item = Vec<AdvertisementEvent>> + Unpin,
    {
        let mut batches = 0usize;
        loop {
            let next = async { Some(source.next().await) }.or(async {
                cancel.cancelled().await;
                None
            });
            match next.await {
                Some(Some(batch)) if cancel.is_cancelled() => {
                    info!("cancelled; dropping batch of {} advertisement(s)", batch.len());
                    break;
                }
                Some(Some(batch)) => {
                    self.handle_batch(&batch, cancel).await;
                    batches += 1;
                }
                Some(None) => {
                    info!("advertisement source finished after {} batch(es)", batches);
                    break;
                }
                None => {
                    info!("cancelled after {} batch(es)", batches);
                    break;
                }
            }
        }
    }
}
