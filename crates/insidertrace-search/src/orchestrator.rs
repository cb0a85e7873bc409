//! Finds every entity a person has filed ownership disclosures at.
//!
//! A search runs `discover -> filter -> classify -> sort`. Discovery either
//! asks the full-text index which entities' documents mention the person, or
//! walks the entity directory. Either way each candidate is then verified by
//! reading its listed disclosures in a bounded pool.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveDate;
use futures::StreamExt;
use futures::future::ready;
use futures::stream;
use insidertrace_core::status::{sort_by_recency, summarize};
use insidertrace_core::{
    Clock, EntityActivity, EntityRef, EntityRelationshipSummary, NameResolver,
    RelationshipStatus, SearchResult, Strategy, TransactionExtractor, TransactionFilter,
    TransactionRecord,
};
use insidertrace_edgar::{
    CacheKey, DateRange, DirectoryEntry, DocumentFetcher, DocumentLister, EntityDirectory,
    FetchError, FullTextIndex, IndexHit, IndexQuery, ResponseCache, TtlClass,
};
use tracing::{debug, info, warn};

use crate::config::{SearchConfig, SearchRequest, StrategyHint};
use crate::error::SearchError;

/// The external collaborators a search reads from.
#[derive(Clone)]
pub struct Sources {
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub lister: Arc<dyn DocumentLister>,
    pub index: Arc<dyn FullTextIndex>,
    pub directory: Arc<dyn EntityDirectory>,
}

impl Sources {
    /// All four roles served by one client.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: DocumentFetcher + DocumentLister + FullTextIndex + EntityDirectory + 'static,
    {
        Self {
            fetcher: client.clone(),
            lister: client.clone(),
            index: client.clone(),
            directory: client,
        }
    }
}

/// Submission budget and stop state for one search.
struct Control {
    started: Instant,
    deadline: Option<std::time::Duration>,
    max_entities: Option<usize>,
    submitted: AtomicUsize,
    halted: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl Control {
    fn new(deadline: Option<std::time::Duration>, max_entities: Option<usize>) -> Self {
        Self {
            started: Instant::now(),
            deadline,
            max_entities,
            submitted: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    /// Whether one more entity scan may start. Counts it if so.
    fn admit(&self) -> bool {
        if self.is_halted() {
            return false;
        }
        if let Some(max) = self.max_entities
            && self.submitted.load(Ordering::SeqCst) >= max
        {
            self.stop(format!("entity budget of {max} reached"));
            return false;
        }
        if let Some(deadline) = self.deadline
            && self.started.elapsed() >= deadline
        {
            self.stop(format!("deadline of {}s reached", deadline.as_secs_f64()));
            return false;
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn halt(&self, err: &FetchError) {
        self.halted.store(true, Ordering::SeqCst);
        self.stop(format!("upstream refused further requests: {err}"));
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// The first reason recorded wins.
    fn stop(&self, reason: String) {
        let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            info!(reason = %reason, "search stopped early");
            *slot = Some(reason);
        }
    }

    fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

/// An entity surfaced by the full-text index, with the documents that named it.
struct Candidate {
    entity: EntityRef,
    urls: Vec<String>,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

/// Per-search inputs shared by every entity scan.
struct Scope<'a> {
    person: &'a str,
    min_transactions: usize,
    range: DateRange,
    today: NaiveDate,
    control: &'a Control,
}

pub struct SearchOrchestrator {
    sources: Sources,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
    resolver: NameResolver,
    extractor: TransactionExtractor,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(sources: Sources, cache: Arc<ResponseCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources,
            cache,
            clock,
            resolver: NameResolver::default(),
            extractor: TransactionExtractor::default(),
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: NameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_extractor(mut self, extractor: TransactionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Parse one raw document without touching any source.
    pub fn extract_document(&self, raw: &str, document_id: &str) -> Vec<TransactionRecord> {
        self.extractor.extract(raw, document_id)
    }

    /// Every entity where `request.person_name` has disclosed ownership activity.
    ///
    /// Partial data never fails the call; the result is flagged incomplete
    /// instead. Fails only on an empty name or when the chosen discovery
    /// source cannot be reached at all.
    pub async fn find_relationships(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let person = request.person_name.trim();
        if person.is_empty() {
            return Err(SearchError::EmptyName);
        }

        let today = self.clock.today();
        let control = Control::new(request.deadline, request.max_entities);
        let scope = Scope {
            person,
            min_transactions: request.min_transactions.max(1),
            range: DateRange::years_back(today, request.years_back),
            today,
            control: &control,
        };
        let variations: Vec<String> = self
            .resolver
            .generate_variations(person)
            .into_iter()
            .map(|v| v.text)
            .collect();
        info!(person, hint = ?request.strategy, years_back = request.years_back, "search started");

        let (strategy, mut entities) = match (&request.entity, request.strategy) {
            (Some(entity), _) => {
                let found = self.run_pool(vec![entity.clone()], &control, |e| {
                    self.scan_entity(e, &scope)
                });
                (Strategy::Direct, found.await)
            }
            (None, StrategyHint::Exhaustive) => {
                (Strategy::Exhaustive, self.exhaustive(&scope).await?)
            }
            (None, StrategyHint::IndexedOnly) => match self.indexed(&variations, &scope).await {
                Ok(found) => (Strategy::Indexed, found),
                Err(err) => return Err(SearchError::IndexUnavailable(err)),
            },
            (None, StrategyHint::Auto) => match self.indexed(&variations, &scope).await {
                Ok(found) => (Strategy::Indexed, found),
                Err(err) => {
                    warn!(error = %err, "full-text index unavailable; enumerating entities");
                    (Strategy::Exhaustive, self.exhaustive(&scope).await?)
                }
            },
        };

        if !request.include_former {
            entities.retain(|e| e.status != RelationshipStatus::Former);
        }
        sort_by_recency(&mut entities);
        let summary = summarize(&entities);

        let message = entities.is_empty().then(|| {
            format!(
                "No ownership disclosures found for \"{person}\" in the last {} years. \
                 Try one of the listed name variations or widen the date range.",
                request.years_back
            )
        });
        let reason = control.reason();

        info!(
            person,
            strategy = strategy.as_str(),
            entities = summary.total_entities,
            current = summary.current_count,
            former = summary.former_count,
            transactions = summary.total_transactions,
            incomplete = reason.is_some(),
            "search complete"
        );

        Ok(SearchResult {
            person_name: person.to_string(),
            as_of: today,
            strategy,
            summary,
            entities,
            message,
            name_variations_tried: variations
                .into_iter()
                .take(self.config.diagnostic_variations)
                .collect(),
            incomplete: reason.is_some(),
            incomplete_reason: reason,
            entities_searched: control.submitted(),
        })
    }

    /// The person's records at one entity that pass `filter`, newest first.
    ///
    /// Documents are listed over the filter's date bounds, defaulting to the
    /// last `years_back` years.
    pub async fn entity_transactions(
        &self,
        person: &str,
        entity: &EntityRef,
        years_back: u32,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, SearchError> {
        let person = person.trim();
        if person.is_empty() {
            return Err(SearchError::EmptyName);
        }
        let today = self.clock.today();
        let range = listing_range(filter, DateRange::years_back(today, years_back));
        let urls = self.entity_documents(&entity.entity_id, &range).await?;
        let mut records = self
            .collect_records(&urls, &Control::new(None, None), |r| {
                filter.matches(r) && self.resolver.is_match(person, &r.person_name)
            })
            .await?;
        records.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        Ok(records)
    }

    /// Every filer's activity at one entity over the last `days_back` days,
    /// or the filter's date bounds when set.
    pub async fn entity_activity(
        &self,
        entity: &EntityRef,
        days_back: u32,
        filter: &TransactionFilter,
    ) -> Result<EntityActivity, SearchError> {
        let today = self.clock.today();
        let default = DateRange {
            start: today - chrono::Duration::days(i64::from(days_back)),
            end: today,
        };
        let range = listing_range(filter, default);
        let urls = self.entity_documents(&entity.entity_id, &range).await?;
        let records = self
            .collect_records(&urls, &Control::new(None, None), |r| filter.matches(r))
            .await?;
        let activity = EntityActivity::from_records(entity, range.start, range.end, records);
        info!(
            entity = %entity.entity_id,
            documents = urls.len(),
            transactions = activity.transaction_count,
            insiders = activity.insider_count(),
            "entity activity"
        );
        Ok(activity)
    }

    async fn indexed(
        &self,
        variations: &[String],
        scope: &Scope<'_>,
    ) -> Result<Vec<EntityRelationshipSummary>, FetchError> {
        let mut seen_phrases = HashSet::new();
        let phrases: Vec<&String> = variations
            .iter()
            .filter(|v| seen_phrases.insert(v.to_lowercase()))
            .take(self.config.index_variations)
            .collect();

        let mut seen_documents = HashSet::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_entity: HashMap<String, usize> = HashMap::new();
        let mut answered = false;
        let mut last_err = None;

        for phrase in phrases {
            let query = IndexQuery {
                phrase: phrase.clone(),
                document_type: self.config.document_type.clone(),
                range: scope.range,
                page_size: self.config.index_page_size,
            };
            let key = CacheKey::builder("index_search").arg("query", &query).build();
            let hits = self
                .cache
                .get_or_compute(&key, TtlClass::TransactionEvent, || {
                    self.sources.index.search(&query)
                })
                .await;
            match hits {
                Ok(hits) => {
                    answered = true;
                    debug!(phrase = %phrase, hits = hits.len(), "index query answered");
                    for hit in hits {
                        if seen_documents.insert(hit.document_id.clone()) {
                            add_hit(&mut candidates, &mut by_entity, hit);
                        }
                    }
                }
                Err(err) if err.is_quota() => {
                    scope.control.halt(&err);
                    break;
                }
                Err(err) => {
                    warn!(phrase = %phrase, error = %err, "index query failed");
                    last_err = Some(err);
                }
            }
        }

        if !answered && !scope.control.is_halted() {
            return Err(last_err
                .unwrap_or_else(|| FetchError::Unavailable("no index queries issued".into())));
        }

        info!(
            candidates = candidates.len(),
            documents = seen_documents.len(),
            "index discovery complete"
        );
        Ok(self
            .run_pool(candidates, scope.control, |c| self.verify_candidate(c, scope))
            .await)
    }

    async fn exhaustive(
        &self,
        scope: &Scope<'_>,
    ) -> Result<Vec<EntityRelationshipSummary>, SearchError> {
        let key = CacheKey::builder("entity_directory").build();
        let directory: Vec<DirectoryEntry> = self
            .cache
            .get_or_compute(&key, TtlClass::Directory, || self.sources.directory.entities())
            .await
            .map_err(SearchError::DirectoryUnavailable)?;

        info!(entities = directory.len(), "enumerating entity directory");
        let entities = directory.iter().map(DirectoryEntry::entity_ref).collect();
        Ok(self
            .run_pool(entities, scope.control, |e| self.scan_entity(e, scope))
            .await)
    }

    /// Drive `work` over `items` with bounded concurrency, honouring `control`.
    async fn run_pool<T, F, Fut>(
        &self,
        items: Vec<T>,
        control: &Control,
        work: F,
    ) -> Vec<EntityRelationshipSummary>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Option<EntityRelationshipSummary>>,
    {
        let total = items.len();
        let every = self.config.progress_every.max(1);
        let mut results = stream::iter(items)
            .take_while(|_| ready(control.admit()))
            .map(work)
            .buffer_unordered(self.config.concurrency.max(1));

        let mut found = Vec::new();
        let mut processed = 0usize;
        while let Some(result) = results.next().await {
            processed += 1;
            if let Some(summary) = result {
                found.push(summary);
            }
            if processed % every == 0 {
                info!(processed, total, found = found.len(), "progress");
            }
        }
        found
    }

    /// Verify an index candidate against the entity's full listing.
    ///
    /// The hit documents are read first, then the rest of the listing.
    /// Index metadata stands in only when no document can be read.
    async fn verify_candidate(
        &self,
        candidate: Candidate,
        scope: &Scope<'_>,
    ) -> Option<EntityRelationshipSummary> {
        let urls = match self.entity_documents(&candidate.entity.entity_id, &scope.range).await {
            Ok(listed) => hits_then_listing(&candidate.urls, listed),
            Err(err) if err.is_quota() => {
                scope.control.halt(&err);
                return None;
            }
            Err(err) => {
                warn!(
                    entity = %candidate.entity.entity_id,
                    error = %err,
                    "document listing failed; reading indexed documents only"
                );
                candidate.urls.clone()
            }
        };

        match self.person_records(scope.person, &urls, scope.control).await {
            Ok(records) if records.len() >= scope.min_transactions => Some(
                EntityRelationshipSummary::from_records(&candidate.entity, &records, scope.today),
            ),
            Ok(_) => None,
            Err(err) if err.is_quota() => {
                scope.control.halt(&err);
                None
            }
            Err(err) => {
                warn!(
                    entity = %candidate.entity.entity_id,
                    error = %err,
                    "could not read any document; keeping index metadata"
                );
                (candidate.urls.len() >= scope.min_transactions).then(|| {
                    EntityRelationshipSummary::from_index_metadata(
                        &candidate.entity,
                        candidate.urls.len(),
                        candidate.first,
                        candidate.last,
                    )
                })
            }
        }
    }

    async fn scan_entity(
        &self,
        entity: EntityRef,
        scope: &Scope<'_>,
    ) -> Option<EntityRelationshipSummary> {
        let result = match self.entity_documents(&entity.entity_id, &scope.range).await {
            Ok(urls) => self.person_records(scope.person, &urls, scope.control).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(records) if records.len() >= scope.min_transactions => {
                debug!(entity = %entity.entity_id, records = records.len(), "entity qualifies");
                Some(EntityRelationshipSummary::from_records(&entity, &records, scope.today))
            }
            Ok(_) => None,
            Err(err) if err.is_quota() => {
                scope.control.halt(&err);
                None
            }
            Err(err) => {
                warn!(entity = %entity.entity_id, error = %err, "entity scan failed");
                None
            }
        }
    }

    /// Disclosure URLs for an entity, deduplicated in listing order and capped.
    async fn entity_documents(
        &self,
        entity_id: &str,
        range: &DateRange,
    ) -> Result<Vec<String>, FetchError> {
        let document_type = &self.config.document_type;
        let key = CacheKey::builder("list_documents")
            .arg("entity_id", entity_id)
            .arg("document_type", document_type)
            .arg("range", range)
            .build();
        let listed: Vec<String> = self
            .cache
            .get_or_compute(&key, TtlClass::TransactionEvent, || {
                self.sources.lister.list_documents(entity_id, document_type, range)
            })
            .await?;

        let mut seen = HashSet::new();
        Ok(listed
            .into_iter()
            .filter(|u| seen.insert(u.clone()))
            .take(self.config.max_documents_per_entity)
            .collect())
    }

    /// Records in `urls` filed by someone matching `person`.
    async fn person_records(
        &self,
        person: &str,
        urls: &[String],
        control: &Control,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        self.collect_records(urls, control, |r| self.resolver.is_match(person, &r.person_name))
            .await
    }

    /// Records in `urls` that pass `keep`.
    ///
    /// Individual document failures are skipped. Fails when every document
    /// failed, or immediately on a quota refusal.
    async fn collect_records<F>(
        &self,
        urls: &[String],
        control: &Control,
        keep: F,
    ) -> Result<Vec<TransactionRecord>, FetchError>
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut last_err = None;

        for url in urls {
            if control.is_halted() {
                break;
            }
            match self.document_records(url).await {
                Ok(doc) => records.extend(doc.iter().filter(|&r| keep(r)).cloned()),
                Err(err) if err.is_quota() => return Err(err),
                Err(err) => {
                    warn!(url = %url, error = %err, "document fetch failed");
                    failures += 1;
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if failures == urls.len() => Err(err),
            _ => Ok(records),
        }
    }

    async fn document_records(&self, url: &str) -> Result<Arc<Vec<TransactionRecord>>, FetchError> {
        let key = CacheKey::builder("extract_document").arg("url", url).build();
        self.cache
            .get_or_compute(&key, TtlClass::TransactionEvent, || async {
                let raw = self.sources.fetcher.fetch(url).await?;
                Ok::<_, FetchError>(Arc::new(self.extractor.extract(&raw, document_id(url))))
            })
            .await
    }
}

fn add_hit(candidates: &mut Vec<Candidate>, by_entity: &mut HashMap<String, usize>, hit: IndexHit) {
    let idx = *by_entity.entry(hit.entity_id.clone()).or_insert_with(|| {
        candidates.push(Candidate {
            entity: hit.entity_ref(),
            urls: Vec::new(),
            first: None,
            last: None,
        });
        candidates.len() - 1
    });
    let candidate = &mut candidates[idx];
    if let Some(date) = hit.date {
        candidate.first = Some(candidate.first.map_or(date, |d| d.min(date)));
        candidate.last = Some(candidate.last.map_or(date, |d| d.max(date)));
    }
    if !candidate.urls.contains(&hit.url) {
        candidate.urls.push(hit.url);
    }
}

/// Hit documents first, then listed documents not already named by a hit.
fn hits_then_listing(hits: &[String], listed: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = hits.iter().map(|u| document_id(u).to_string()).collect();
    let mut urls = hits.to_vec();
    urls.extend(listed.into_iter().filter(|u| seen.insert(document_id(u).to_string())));
    urls
}

/// The filter's date bounds, each falling back to `default`.
fn listing_range(filter: &TransactionFilter, default: DateRange) -> DateRange {
    DateRange {
        start: filter.start.unwrap_or(default.start),
        end: filter.end.unwrap_or(default.end),
    }
}

/// Archive URLs end in `<accession>/<file>`; the accession names the document.
fn document_id(url: &str) -> &str {
    let mut parts = url.trim_end_matches('/').rsplit('/');
    let file = parts.next().unwrap_or(url);
    parts.next().filter(|p| !p.is_empty()).unwrap_or(file)
}
