//! HTTP client for the EDGAR archive, full-text search, and ticker directory.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use insidertrace_core::extract::values::{normalize_entity_id, parse_date};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::governor::Governor;
use crate::source::{
    DateRange, DirectoryEntry, DocumentFetcher, DocumentLister, EntityDirectory, FullTextIndex,
    IndexHit, IndexQuery,
};

pub const USER_AGENT_ENV: &str = "SEC_EDGAR_USER_AGENT";
const DEFAULT_USER_AGENT: &str = "insidertrace/0.1 (contact@example.com)";
const QUOTA_MARKER: &str = "Request Rate Threshold";
const ERROR_BODY_LIMIT: usize = 200;

/// "WEC ENERGY GROUP, INC.  (WEC)  (CIK 0000783325)"
static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.*?)\s*(?:\((?P<ticker>[A-Z0-9.\-, ]+)\))?\s*\(CIK (?P<cik>\d+)\)\s*$")
        .unwrap()
});

#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// The archive rejects anonymous clients; include contact details.
    pub user_agent: String,
    pub archives_url: String,
    pub submissions_url: String,
    pub search_url: String,
    pub tickers_url: String,
    pub timeout: Duration,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            archives_url: "https://www.sec.gov/Archives/edgar/data".to_string(),
            submissions_url: "https://data.sec.gov/submissions".to_string(),
            search_url: "https://efts.sec.gov/LATEST/search-index".to_string(),
            tickers_url: "https://www.sec.gov/files/company_tickers.json".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EdgarConfig {
    /// Defaults, with the user agent taken from `SEC_EDGAR_USER_AGENT` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ua) = std::env::var(USER_AGENT_ENV)
            && !ua.trim().is_empty()
        {
            config.user_agent = ua;
        }
        config
    }
}

/// Rate-governed EDGAR client implementing every document source.
pub struct EdgarClient {
    client: reqwest::Client,
    config: EdgarConfig,
    governor: Arc<dyn Governor>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Deserialize)]
struct HitSource {
    #[serde(default)]
    adsh: Option<String>,
    #[serde(default)]
    ciks: Vec<String>,
    #[serde(default)]
    display_names: Vec<String>,
    #[serde(default)]
    file_date: Option<String>,
}

#[derive(Deserialize)]
struct Submissions {
    filings: Filings,
}

#[derive(Deserialize)]
struct Filings {
    recent: RecentFilings,
    /// Older filings, split into separately fetched pages.
    #[serde(default)]
    files: Vec<FilingsPage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilingsPage {
    name: String,
    #[serde(default)]
    filing_from: Option<String>,
    #[serde(default)]
    filing_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

#[derive(Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
    title: String,
}

impl EdgarClient {
    pub fn new(config: EdgarConfig, governor: Arc<dyn Governor>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config: EdgarConfig {
                archives_url: config.archives_url.trim_end_matches('/').to_string(),
                submissions_url: config.submissions_url.trim_end_matches('/').to_string(),
                ..config
            },
            governor,
        })
    }

    pub fn config(&self) -> &EdgarConfig {
        &self.config
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, FetchError> {
        self.governor.admit().await;
        debug!(url = %url, "GET");
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let text = self.get(url, query).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn status_error(status: u16, body: String) -> FetchError {
    if status == 429 || (status == 403 && body.contains(QUOTA_MARKER)) {
        return FetchError::QuotaExhausted { status };
    }
    FetchError::Server {
        status,
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

/// Archive path segment for an entity: the identifier without zero padding.
fn archive_entity(entity_id: &str) -> &str {
    let trimmed = entity_id.trim().trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}

/// XSL-rendered views live under `xsl<variant>/`; the raw XML sits beside them.
fn raw_filename(document: &str) -> &str {
    match document.split_once('/') {
        Some((dir, file)) if dir.starts_with("xsl") => file,
        _ => document,
    }
}

fn document_url(archives_url: &str, entity_id: &str, accession: &str, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        archives_url,
        archive_entity(entity_id),
        accession.replace('-', ""),
        raw_filename(filename)
    )
}

struct DisplayName {
    name: String,
    ticker: Option<String>,
    cik: Option<String>,
}

fn parse_display_name(raw: &str) -> DisplayName {
    match DISPLAY_NAME.captures(raw.trim()) {
        Some(caps) => DisplayName {
            name: caps["name"].trim().to_string(),
            ticker: caps.name("ticker").and_then(|t| {
                t.as_str()
                    .split(',')
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            }),
            cik: Some(caps["cik"].to_string()),
        },
        None => DisplayName {
            name: raw.trim().to_string(),
            ticker: None,
            cik: None,
        },
    }
}

fn index_hits(response: SearchResponse, archives_url: &str, limit: usize) -> Vec<IndexHit> {
    response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| {
            let (id_accession, filename) = hit.id.split_once(':')?;
            let accession = hit.source.adsh.clone().unwrap_or_else(|| id_accession.to_string());

            let names: Vec<DisplayName> =
                hit.source.display_names.iter().map(|n| parse_display_name(n)).collect();
            // The issuer is the name listed with a ticker; otherwise the last one.
            let idx = names
                .iter()
                .position(|n| n.ticker.is_some())
                .or_else(|| names.len().checked_sub(1))?;
            let issuer = &names[idx];
            let cik = issuer
                .cik
                .clone()
                .or_else(|| hit.source.ciks.get(idx).cloned())?;
            let entity_id = normalize_entity_id(&cik);

            Some(IndexHit {
                url: document_url(archives_url, &entity_id, &accession, filename),
                document_id: accession,
                entity_name: issuer.name.clone(),
                entity_id,
                ticker: issuer.ticker.clone(),
                date: hit.source.file_date.as_deref().and_then(parse_date),
                score: hit.score.unwrap_or(0.0),
            })
        })
        .take(limit)
        .collect()
}

fn submission_urls(
    recent: &RecentFilings,
    archives_url: &str,
    entity_id: &str,
    document_type: &str,
    range: &DateRange,
) -> Vec<String> {
    let amended = format!("{document_type}/A");
    recent
        .form
        .iter()
        .enumerate()
        .filter(|(_, form)| *form == document_type || **form == amended)
        .filter_map(|(i, _)| {
            let date = parse_date(recent.filing_date.get(i)?)?;
            if !range.contains(date) {
                return None;
            }
            let accession = recent.accession_number.get(i)?;
            let document = recent.primary_document.get(i)?;
            Some(document_url(archives_url, entity_id, accession, document))
        })
        .collect()
}

/// Pages whose filing span overlaps `range`. A page with an unreadable
/// bound is kept.
fn pages_in_range<'a>(pages: &'a [FilingsPage], range: &DateRange) -> Vec<&'a str> {
    pages
        .iter()
        .filter(|page| {
            let from = page.filing_from.as_deref().and_then(parse_date);
            let to = page.filing_to.as_deref().and_then(parse_date);
            from.is_none_or(|d| d <= range.end) && to.is_none_or(|d| d >= range.start)
        })
        .map(|page| page.name.as_str())
        .collect()
}

fn directory_entries(raw: HashMap<String, TickerEntry>) -> Vec<DirectoryEntry> {
    let mut rows: Vec<(u64, TickerEntry)> = raw
        .into_iter()
        .map(|(k, v)| (k.parse().unwrap_or(u64::MAX), v))
        .collect();
    rows.sort_by_key(|(k, _)| *k);

    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|(_, t)| {
            let entity_id = normalize_entity_id(&t.cik_str.to_string());
            seen.insert(entity_id.clone()).then(|| DirectoryEntry {
                ticker: Some(t.ticker),
                name: t.title,
                entity_id,
            })
        })
        .collect()
}

#[async_trait]
impl DocumentFetcher for EdgarClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.get(url, &[]).await?.text().await?)
    }
}

#[async_trait]
impl DocumentLister for EdgarClient {
    async fn list_documents(
        &self,
        entity_id: &str,
        document_type: &str,
        range: &DateRange,
    ) -> Result<Vec<String>, FetchError> {
        let padded = normalize_entity_id(entity_id);
        let url = format!("{}/CIK{}.json", self.config.submissions_url, padded);
        let submissions: Submissions = self.get_json(&url, &[]).await?;
        let mut urls = submission_urls(
            &submissions.filings.recent,
            &self.config.archives_url,
            &padded,
            document_type,
            range,
        );

        let pages = pages_in_range(&submissions.filings.files, range);
        for name in &pages {
            let url = format!("{}/{name}", self.config.submissions_url);
            let page: RecentFilings = self.get_json(&url, &[]).await?;
            urls.extend(submission_urls(
                &page,
                &self.config.archives_url,
                &padded,
                document_type,
                range,
            ));
        }
        debug!(entity = %padded, pages = pages.len(), count = urls.len(), "listed documents");
        Ok(urls)
    }
}

#[async_trait]
impl FullTextIndex for EdgarClient {
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>, FetchError> {
        let params = [
            ("q", format!("\"{}\"", query.phrase)),
            ("forms", query.document_type.clone()),
            ("dateRange", "custom".to_string()),
            ("startdt", query.range.start.to_string()),
            ("enddt", query.range.end.to_string()),
            ("from", "0".to_string()),
        ];
        let response: SearchResponse = self.get_json(&self.config.search_url, &params).await?;
        let hits = index_hits(response, &self.config.archives_url, query.page_size);
        info!(phrase = %query.phrase, count = hits.len(), "full-text search");
        Ok(hits)
    }
}

#[async_trait]
impl EntityDirectory for EdgarClient {
    async fn entities(&self) -> Result<Vec<DirectoryEntry>, FetchError> {
        let raw: HashMap<String, TickerEntry> = self.get_json(&self.config.tickers_url, &[]).await?;
        let entries = directory_entries(raw);
        info!(count = entries.len(), "loaded entity directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::Unthrottled;
    use chrono::NaiveDate;

    const ARCHIVES: &str = "https://www.sec.gov/Archives/edgar/data";

    #[test]
    fn display_name_with_ticker() {
        let d = parse_display_name("WEC ENERGY GROUP, INC.  (WEC)  (CIK 0000783325)");
        assert_eq!(d.name, "WEC ENERGY GROUP, INC.");
        assert_eq!(d.ticker.as_deref(), Some("WEC"));
        assert_eq!(d.cik.as_deref(), Some("0000783325"));

        let owner = parse_display_name("KLAPPA GALE E  (CIK 0001183372)");
        assert_eq!(owner.name, "KLAPPA GALE E");
        assert_eq!(owner.ticker, None);

        let multi = parse_display_name("Alphabet Inc.  (GOOGL, GOOG)  (CIK 0001652044)");
        assert_eq!(multi.ticker.as_deref(), Some("GOOGL"));
    }

    #[test]
    fn search_hits_pick_issuer() {
        let json = r#"{"hits": {"total": {"value": 2}, "hits": [
            {"_id": "0001193125-24-000001:xslF345X05/wk-form4_1.xml", "_score": 12.5,
             "_source": {"adsh": "0001193125-24-000001",
                         "ciks": ["0001183372", "0000783325"],
                         "display_names": ["KLAPPA GALE E  (CIK 0001183372)",
                                           "WEC ENERGY GROUP, INC.  (WEC)  (CIK 0000783325)"],
                         "file_date": "2024-03-18"}},
            {"_id": "0000009092-15-000010:doc4.xml",
             "_source": {"ciks": ["0001183372", "0000009092"],
                         "display_names": ["KLAPPA GALE E  (CIK 0001183372)",
                                           "BADGER METER INC  (CIK 0000009092)"]}}
        ]}}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let hits = index_hits(response, ARCHIVES, 100);
        assert_eq!(hits.len(), 2);

        assert_eq!(hits[0].entity_id, "0000783325");
        assert_eq!(hits[0].ticker.as_deref(), Some("WEC"));
        assert_eq!(hits[0].document_id, "0001193125-24-000001");
        assert_eq!(
            hits[0].url,
            "https://www.sec.gov/Archives/edgar/data/783325/000119312524000001/wk-form4_1.xml"
        );
        assert_eq!(hits[0].date, NaiveDate::from_ymd_opt(2024, 3, 18));
        assert_eq!(hits[0].score, 12.5);

        assert_eq!(hits[1].entity_name, "BADGER METER INC");
        assert_eq!(hits[1].entity_id, "0000009092");
        assert_eq!(hits[1].document_id, "0000009092-15-000010");
        assert_eq!(hits[1].date, None);

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(index_hits(response, ARCHIVES, 1).len(), 1);
    }

    #[test]
    fn submissions_filtered_by_form_and_date() {
        let recent = RecentFilings {
            accession_number: vec![
                "0001-24-000001".into(),
                "0001-24-000002".into(),
                "0001-24-000003".into(),
                "0001-10-000004".into(),
            ],
            filing_date: vec![
                "2024-03-18".into(),
                "2024-03-19".into(),
                "2024-03-20".into(),
                "2010-01-05".into(),
            ],
            form: vec!["4".into(), "10-K".into(), "4/A".into(), "4".into()],
            primary_document: vec![
                "xslF345X05/form4.xml".into(),
                "10k.htm".into(),
                "form4a.xml".into(),
                "old.xml".into(),
            ],
        };
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        let urls = submission_urls(&recent, ARCHIVES, "0000783325", "4", &range);
        assert_eq!(
            urls,
            vec![
                format!("{ARCHIVES}/783325/000124000001/form4.xml"),
                format!("{ARCHIVES}/783325/000124000003/form4a.xml"),
            ]
        );
    }

    #[test]
    fn older_pages_followed_only_when_they_overlap() {
        let json = r#"{
            "filings": {
                "recent": { "accessionNumber": [], "filingDate": [], "form": [], "primaryDocument": [] },
                "files": [
                    { "name": "CIK0000783325-submissions-001.json", "filingCount": 2000,
                      "filingFrom": "2012-01-03", "filingTo": "2018-06-29" },
                    { "name": "CIK0000783325-submissions-002.json", "filingCount": 2000,
                      "filingFrom": "1994-02-01", "filingTo": "2011-12-30" }
                ]
            }
        }"#;
        let submissions: Submissions = serde_json::from_str(json).unwrap();
        let files = &submissions.filings.files;

        let recent_only = DateRange {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        assert!(pages_in_range(files, &recent_only).is_empty());

        let decade = DateRange {
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        assert_eq!(pages_in_range(files, &decade), vec!["CIK0000783325-submissions-001.json"]);

        let undated = [FilingsPage {
            name: "page.json".into(),
            filing_from: None,
            filing_to: Some("not a date".into()),
        }];
        assert_eq!(pages_in_range(&undated, &recent_only), vec!["page.json"]);
    }

    #[test]
    fn submissions_without_older_pages() {
        let json = r#"{ "filings": { "recent": { "form": ["4"] } } }"#;
        let submissions: Submissions = serde_json::from_str(json).unwrap();
        assert!(submissions.filings.files.is_empty());
        assert_eq!(submissions.filings.recent.form, vec!["4"]);
    }

    #[test]
    fn directory_deduplicates_entities() {
        let json = r#"{
            "0": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."},
            "1": {"cik_str": 783325, "ticker": "WEC", "title": "WEC ENERGY GROUP, INC."},
            "2": {"cik_str": 1652044, "ticker": "GOOG", "title": "Alphabet Inc."}
        }"#;
        let raw: HashMap<String, TickerEntry> = serde_json::from_str(json).unwrap();
        let entries = directory_entries(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ticker.as_deref(), Some("GOOGL"));
        assert_eq!(entries[0].entity_id, "0001652044");
        assert_eq!(entries[1].entity_id, "0000783325");
    }

    #[test]
    fn quota_statuses() {
        assert!(status_error(429, String::new()).is_quota());
        assert!(status_error(403, "Your Request Rate Threshold exceeded".into()).is_quota());
        assert!(!status_error(403, "Forbidden".into()).is_quota());
        match status_error(500, "x".repeat(1000)) {
            FetchError::Server { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = EdgarConfig {
            archives_url: "https://archive.test/data/".into(),
            ..Default::default()
        };
        let client = EdgarClient::new(config, Arc::new(Unthrottled)).unwrap();
        assert_eq!(client.config().archives_url, "https://archive.test/data");
    }
}
