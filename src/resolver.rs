//! Enrichment of advertised identifiers with live GATT metadata.

use std::collections::HashMap;
use std::time::Duration;

use futures_lite::future;
use futures_util::future::join_all;
use tracing::{debug, trace};

use crate::gatt::{GattClient, ServiceDescriptor};
use crate::util::bounded;
use crate::{Address, AdvertisementRecord, CancelToken, LookupError, Uuid};

/// Settings for a [`Resolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// Upper bound on each individual lookup attempt
    pub lookup_timeout: Duration,
    /// Upper bound on all lookups of one batch, measured from the start of the batch. `None` means unbounded.
    pub batch_budget: Option<Duration>,
    /// Also resolve the advertising device by its address
    pub resolve_device: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            lookup_timeout: Duration::from_secs(5),
            batch_budget: None,
            resolve_device: true,
        }
    }
}

/// What an enrichment lookup was triggered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Identifier {
    /// An advertised service UUID
    Service(Uuid),
    /// The advertising device
    Device(Address),
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Service(uuid) => write!(f, "service {uuid}"),
            Identifier::Device(address) => write!(f, "device {address}"),
        }
    }
}

/// The two ways an identifier can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookupPath {
    /// Directly by service UUID
    ByUuid,
    /// By opening the advertising device and enumerating its services
    ByAddress,
}

/// Outcome of one lookup attempt: the number of matching services found, or why none were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LookupAttempt {
    /// Which lookup was made
    pub path: LookupPath,
    /// Number of services found, or the failure
    pub outcome: Result<usize, LookupError>,
}

/// The merged outcome of resolving one [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnrichmentResult {
    /// The identifier that triggered the lookup
    pub identifier: Identifier,
    /// Services found by any attempt, without duplicate UUIDs, or the most significant failure if every attempt
    /// failed
    pub services: Result<Vec<ServiceDescriptor>, LookupError>,
    /// Each attempt made, in [`LookupPath`] order
    pub attempts: Vec<LookupAttempt>,
}

impl EnrichmentResult {
    /// A result recording that the lookup never completed.
    pub fn timed_out(identifier: Identifier) -> Self {
        EnrichmentResult {
            identifier,
            services: Err(LookupError::Timeout),
            attempts: Vec::new(),
        }
    }

    fn merge(identifier: Identifier, attempts: Vec<(LookupPath, Result<Vec<ServiceDescriptor>, LookupError>)>) -> Self {
        let mut services: Vec<ServiceDescriptor> = Vec::new();
        let mut failure: Option<LookupError> = None;
        let mut any_ok = false;
        let mut summary = Vec::with_capacity(attempts.len());

        for (path, outcome) in attempts {
            summary.push(LookupAttempt {
                path,
                outcome: outcome.as_ref().map(Vec::len).map_err(|e| *e),
            });
            match outcome {
                Ok(found) => {
                    any_ok = true;
                    for service in found {
                        if !services.iter().any(|s| s.uuid == service.uuid) {
                            services.push(service);
                        }
                    }
                }
                Err(err) => {
                    if failure.map_or(true, |f| err.precedence() > f.precedence()) {
                        failure = Some(err);
                    }
                }
            }
        }

        let services = match (any_ok, failure) {
            (true, _) => Ok(services),
            (false, Some(err)) => Err(err),
            (false, None) => Err(LookupError::NotFound),
        };

        EnrichmentResult {
            identifier,
            services,
            attempts: summary,
        }
    }
}

/// Enrichment results keyed by the identifier that triggered them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment(HashMap<Identifier, EnrichmentResult>);

impl Enrichment {
    /// Adds a result, replacing any earlier result for the same identifier.
    pub fn insert(&mut self, result: EnrichmentResult) {
        self.0.insert(result.identifier, result);
    }

    /// The result for `identifier`, if one was recorded.
    pub fn get(&self, identifier: &Identifier) -> Option<&EnrichmentResult> {
        self.0.get(identifier)
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no results.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the results in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EnrichmentResult> {
        self.0.values()
    }
}

impl FromIterator<EnrichmentResult> for Enrichment {
    fn from_iter<I: IntoIterator<Item = EnrichmentResult>>(iter: I) -> Self {
        let mut enrichment = Enrichment::default();
        for result in iter {
            enrichment.insert(result);
        }
        enrichment
    }
}

/// Resolves identifiers against a [`GattClient`].
///
/// Every lookup is a point-in-time snapshot: nothing is retried or cached between calls.
#[derive(Debug, Clone)]
pub struct Resolver<C> {
    client: C,
    config: ResolverConfig,
}

impl<C: GattClient> Resolver<C> {
    /// Creates a resolver.
    pub fn new(client: C, config: ResolverConfig) -> Self {
        Resolver { client, config }
    }

    /// The resolver's settings.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves a single identifier.
    ///
    /// A service UUID is looked up directly and, when `origin` is known, among the services of the advertising
    /// device; both attempts run concurrently and either success satisfies the call. A device is looked up by its
    /// address. Each attempt is bounded by [`ResolverConfig::lookup_timeout`], and an attempt still running when
    /// `cancel` fires is recorded as [`LookupError::Timeout`].
    pub async fn resolve(&self, identifier: Identifier, origin: Option<Address>, cancel: &CancelToken) -> EnrichmentResult {
        let timeout = self.config.lookup_timeout;

        let attempts = match identifier {
            Identifier::Service(uuid) => {
                let by_uuid = bounded(
                    async { self.client.lookup_by_uuid(uuid).await.map(|s| vec![s]) },
                    timeout,
                    cancel,
                );
                match origin {
                    Some(address) => {
                        let by_address = bounded(
                            async {
                                let services = self.client.lookup_by_address(address).await?;
                                let matching: Vec<_> = services.into_iter().filter(|s| s.uuid == uuid).collect();
                                if matching.is_empty() {
                                    Err(LookupError::NotFound)
                                } else {
                                    Ok(matching)
                                }
                            },
                            timeout,
                            cancel,
                        );
                        let (a, b) = future::zip(by_uuid, by_address).await;
                        vec![(LookupPath::ByUuid, a), (LookupPath::ByAddress, b)]
                    }
                    None => vec![(LookupPath::ByUuid, by_uuid.await)],
                }
            }
            Identifier::Device(address) => {
                let outcome = bounded(self.client.lookup_by_address(address), timeout, cancel).await;
                vec![(LookupPath::ByAddress, outcome)]
            }
        };

        for (path, outcome) in &attempts {
            match outcome {
                Ok(found) => trace!("{} {:?}: {} service(s)", identifier, path, found.len()),
                Err(err) => debug!("{} {:?}: {}", identifier, path, err),
            }
        }

        EnrichmentResult::merge(identifier, attempts)
    }

    /// Resolves every distinct service UUID of `record`, plus the advertising device when
    /// [`ResolverConfig::resolve_device`] is set, all concurrently.
    ///
    /// The returned map has exactly one result per identifier, whatever happened to the lookup.
    pub async fn resolve_record(&self, record: &AdvertisementRecord, origin: Address, cancel: &CancelToken) -> Enrichment {
        let identifiers = identifiers(record, origin, self.config.resolve_device);
        debug!("resolving {} identifier(s) for {}", identifiers.len(), origin);

        join_all(
            identifiers
                .into_iter()
                .map(|identifier| self.resolve(identifier, Some(origin), cancel)),
        )
        .await
        .into_iter()
        .collect()
    }
}

/// Distinct identifiers to resolve for `record`, service UUIDs in first-appearance order followed by the device.
pub fn identifiers(record: &AdvertisementRecord, origin: Address, include_device: bool) -> Vec<Identifier> {
    let mut ids: Vec<Identifier> = Vec::with_capacity(record.services.len() + 1);
    for uuid in &record.services {
        let id = Identifier::Service(*uuid);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if include_device {
        ids.push(Identifier::Device(origin));
    }
    ids
}
