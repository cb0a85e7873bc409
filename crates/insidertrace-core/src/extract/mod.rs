//! Ownership-disclosure extraction.
//!
//! Turns one raw disclosure document (structured markup, optionally wrapped
//! in an SGML submission envelope) into zero or more [`TransactionRecord`]s.
//! Extraction is layered: a strict tree parse first, a tag-soup parse when
//! that fails, then per-element parsing where one bad transaction never
//! discards the rest of the document.

mod markup;
pub mod values;

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::ElementError;
use crate::record::{Ownership, TransactionKind, TransactionRecord};

use markup::{Element, Mode};
use values::{normalize_entity_id, parse_date, parse_flag, parse_number};

/// Element names that may carry the filer's name, tried in order.
pub const DEFAULT_OWNER_NAME_TAGS: &[&str] = &["rptOwnerName", "reportingOwnerName", "ownerName"];

const DOCUMENT_OPEN: &str = "<ownershipDocument";
const DOCUMENT_CLOSE: &str = "</ownershipDocument>";
const DEFAULT_FORM_TYPE: &str = "4";

static NAMESPACE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+xmlns(?::[\w.-]+)?\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap()
});

/// Which side of the disclosure a transaction or holding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    NonDerivative,
    Derivative,
}

impl Table {
    fn transaction_tag(self) -> &'static str {
        match self {
            Self::NonDerivative => "nonDerivativeTransaction",
            Self::Derivative => "derivativeTransaction",
        }
    }

    fn holding_tag(self) -> &'static str {
        match self {
            Self::NonDerivative => "nonDerivativeHolding",
            Self::Derivative => "derivativeHolding",
        }
    }

    /// Code assumed when an element carries none.
    fn default_code(self) -> &'static str {
        match self {
            Self::NonDerivative => "P",
            Self::Derivative => "M",
        }
    }
}

/// Document-level fields shared by every record in one filing.
#[derive(Debug, Clone)]
struct FilingContext {
    entity_name: String,
    entity_id: String,
    ticker: Option<String>,
    owner_name: String,
    owner_role: Option<String>,
    period: Option<NaiveDate>,
    document_date: Option<NaiveDate>,
    form_type: String,
}

/// Parses ownership-disclosure documents into transaction records.
#[derive(Debug, Clone)]
pub struct TransactionExtractor {
    owner_name_tags: Vec<String>,
}

impl Default for TransactionExtractor {
    fn default() -> Self {
        Self {
            owner_name_tags: DEFAULT_OWNER_NAME_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TransactionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append additional element names to try for the filer's name.
    pub fn with_owner_name_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.owner_name_tags.contains(&tag) {
                self.owner_name_tags.push(tag);
            }
        }
        self
    }

    /// Extract every transaction and holding in `raw`.
    ///
    /// Never fails: an unusable document yields an empty list, and a bad
    /// element is logged and skipped.
    pub fn extract(&self, raw: &str, document_id: &str) -> Vec<TransactionRecord> {
        let cleaned = NAMESPACE_DECL.replace_all(ownership_slice(raw), "");

        let root = match markup::parse(&cleaned, Mode::Strict) {
            Ok(root) => root,
            Err(err) => {
                debug!(document_id, error = %err, "strict parse failed, retrying as tag soup");
                match markup::parse(&cleaned, Mode::Permissive) {
                    Ok(root) => root,
                    Err(err) => {
                        warn!(document_id, error = %err, "document unreadable");
                        return Vec::new();
                    }
                }
            }
        };

        let Some(filing) = self.filing_context(&root) else {
            debug!(document_id, "no issuer or filer name; skipping document");
            return Vec::new();
        };

        let mut records = table_records(&root, &filing, document_id, Table::NonDerivative);
        records.extend(table_records(&root, &filing, document_id, Table::Derivative));
        debug!(document_id, count = records.len(), "extracted records");
        records
    }

    fn filing_context(&self, root: &Element) -> Option<FilingContext> {
        let entity_name = root
            .text_at(&["issuer", "issuerName"])
            .or_else(|| root.text_at(&["issuerName"]))?
            .to_string();
        let entity_id = root
            .text_at(&["issuerCik"])
            .map(normalize_entity_id)
            .unwrap_or_default();
        let ticker = root
            .text_at(&["issuerTradingSymbol"])
            .map(|t| t.to_ascii_uppercase())
            .filter(|t| !matches!(t.as_str(), "NONE" | "N/A" | "NA"));

        let owner = root.find("reportingOwner").unwrap_or(root);
        let owner_id = owner.find("reportingOwnerId").unwrap_or(owner);
        let owner_name = self
            .owner_name_tags
            .iter()
            .find_map(|tag| owner_id.text_at(&[tag.as_str()]))
            .or_else(|| {
                self.owner_name_tags
                    .iter()
                    .find_map(|tag| root.text_at(&[tag.as_str()]))
            })?
            .to_string();

        let owner_role = owner_role(owner);
        let period = root.text_at(&["periodOfReport"]).and_then(parse_date);
        let document_date = root
            .text_at(&["ownerSignature", "signatureDate"])
            .or_else(|| root.text_at(&["signatureDate"]))
            .and_then(parse_date)
            .or(period);
        let form_type = root
            .text_at(&["documentType"])
            .unwrap_or(DEFAULT_FORM_TYPE)
            .to_string();

        Some(FilingContext {
            entity_name,
            entity_id,
            ticker,
            owner_name,
            owner_role,
            period,
            document_date,
            form_type,
        })
    }
}

/// Slice the ownership document out of a submission envelope, if wrapped.
fn ownership_slice(raw: &str) -> &str {
    let Some(start) = raw.find(DOCUMENT_OPEN) else {
        return raw;
    };
    match raw.rfind(DOCUMENT_CLOSE) {
        Some(end) if end > start => &raw[start..end + DOCUMENT_CLOSE.len()],
        _ => &raw[start..],
    }
}

fn owner_role(owner: &Element) -> Option<String> {
    let Some(rel) = owner.find("reportingOwnerRelationship") else {
        return owner.text_at(&["officerTitle"]).map(str::to_string);
    };
    let flag = |tag: &str| rel.text_at(&[tag]).is_some_and(parse_flag);

    let mut roles = Vec::new();
    if flag("isDirector") {
        roles.push("Director".to_string());
    }
    if flag("isOfficer") {
        roles.push(rel.text_at(&["officerTitle"]).unwrap_or("Officer").to_string());
    }
    if flag("isTenPercentOwner") {
        roles.push("10% Owner".to_string());
    }
    if flag("isOther")
        && let Some(other) = rel.text_at(&["otherText"])
    {
        roles.push(other.to_string());
    }
    (!roles.is_empty()).then(|| roles.join(", "))
}

fn table_records(
    root: &Element,
    filing: &FilingContext,
    document_id: &str,
    table: Table,
) -> Vec<TransactionRecord> {
    let mut records = collect(root.find_all(table.transaction_tag()), document_id, |el| {
        transaction_record(el, filing, document_id, table)
    });
    if records.is_empty() {
        records = collect(root.find_all(table.holding_tag()), document_id, |el| {
            holding_record(el, filing, document_id, table)
        });
    }
    records
}

fn collect<F>(elements: Vec<&Element>, document_id: &str, parse: F) -> Vec<TransactionRecord>
where
    F: Fn(&Element) -> Result<TransactionRecord, ElementError>,
{
    elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, el)| match parse(el) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(document_id, element = %el.name, index, error = %err, "skipping element");
                None
            }
        })
        .collect()
}

fn security_title(el: &Element, table: Table) -> Result<String, ElementError> {
    let title = el
        .text_at(&["securityTitle", "value"])
        .or_else(|| el.text_at(&["securityTitle"]))
        .ok_or(ElementError::MissingField("securityTitle"))?;
    Ok(match table {
        Table::NonDerivative => title.to_string(),
        Table::Derivative => format!("{title} (Derivative)"),
    })
}

/// A present-but-unparseable required number is an error; absence is `None`.
fn required_number(
    el: &Element,
    path: &[&str],
    field: &'static str,
) -> Result<Option<f64>, ElementError> {
    match el.text_at(path) {
        None => Ok(None),
        Some(raw) => parse_number(raw).map(Some).ok_or_else(|| ElementError::BadNumber {
            field,
            raw: raw.to_string(),
        }),
    }
}

fn optional_number(el: &Element, path: &[&str]) -> Option<f64> {
    el.text_at(path).and_then(parse_number)
}

fn ownership(el: &Element) -> Ownership {
    match el.text_at(&["ownershipNature", "directOrIndirectOwnership", "value"]) {
        Some(v) if v.trim().eq_ignore_ascii_case("I") => Ownership::Indirect,
        _ => Ownership::Direct,
    }
}

fn shares_after(el: &Element, table: Table) -> Option<f64> {
    let owned = ["sharesOwnedFollowingTransaction", "value"];
    match table {
        Table::NonDerivative => optional_number(el, &owned),
        Table::Derivative => optional_number(el, &["underlyingSecurityShares", "value"])
            .or_else(|| optional_number(el, &owned)),
    }
}

fn transaction_record(
    el: &Element,
    filing: &FilingContext,
    document_id: &str,
    table: Table,
) -> Result<TransactionRecord, ElementError> {
    let security_title = security_title(el, table)?;
    let shares = required_number(el, &["transactionShares", "value"], "transactionShares")?
        .ok_or(ElementError::MissingField("transactionShares"))?;
    if shares < 0.0 {
        return Err(ElementError::NegativeQuantity(shares));
    }

    let price_per_share = optional_number(el, &["transactionPricePerShare", "value"]);
    let transaction_code = el
        .text_at(&["transactionCoding", "transactionCode"])
        .or_else(|| el.text_at(&["transactionCode"]))
        .map(|c| c.trim().to_ascii_uppercase());
    let kind = TransactionKind::from_code(
        transaction_code.as_deref().unwrap_or(table.default_code()),
    );
    let transaction_date = el
        .text_at(&["transactionDate", "value"])
        .and_then(parse_date)
        .or(filing.period);
    let exercise_price = match table {
        Table::Derivative => optional_number(el, &["conversionOrExercisePrice", "value"]),
        Table::NonDerivative => None,
    };

    Ok(TransactionRecord {
        person_name: filing.owner_name.clone(),
        person_role: filing.owner_role.clone(),
        entity_name: filing.entity_name.clone(),
        entity_id: filing.entity_id.clone(),
        ticker: filing.ticker.clone(),
        transaction_date,
        kind,
        transaction_code,
        security_title,
        shares,
        price_per_share,
        total_value: price_per_share.map(|p| shares * p),
        exercise_price,
        ownership: ownership(el),
        shares_owned_after: shares_after(el, table),
        is_derivative: table == Table::Derivative,
        is_holding: false,
        document_date: filing.document_date,
        document_id: document_id.to_string(),
        form_type: filing.form_type.clone(),
    })
}

fn holding_record(
    el: &Element,
    filing: &FilingContext,
    document_id: &str,
    table: Table,
) -> Result<TransactionRecord, ElementError> {
    let security_title = security_title(el, table)?;
    let held = shares_after(el, table).ok_or(ElementError::MissingField("sharesOwned"))?;

    Ok(TransactionRecord {
        person_name: filing.owner_name.clone(),
        person_role: filing.owner_role.clone(),
        entity_name: filing.entity_name.clone(),
        entity_id: filing.entity_id.clone(),
        ticker: filing.ticker.clone(),
        transaction_date: filing.period,
        kind: TransactionKind::Other,
        transaction_code: None,
        security_title,
        shares: 0.0,
        price_per_share: None,
        total_value: None,
        exercise_price: match table {
            Table::Derivative => optional_number(el, &["conversionOrExercisePrice", "value"]),
            Table::NonDerivative => None,
        },
        ownership: ownership(el),
        shares_owned_after: Some(held),
        is_derivative: table == Table::Derivative,
        is_holding: true,
        document_date: filing.document_date,
        document_id: document_id.to_string(),
        form_type: filing.form_type.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameResolver;

    fn doc(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<ownershipDocument xmlns="http://www.sec.gov/edgar/ownership">
  <documentType>4</documentType>
  <periodOfReport>2024-03-15</periodOfReport>
  <issuer>
    <issuerCik>783325</issuerCik>
    <issuerName>WEC Energy Group, Inc.</issuerName>
    <issuerTradingSymbol>wec</issuerTradingSymbol>
  </issuer>
  <reportingOwner>
    <reportingOwnerId>
      <rptOwnerCik>0001183372</rptOwnerCik>
      <rptOwnerName>KLAPPA GALE E</rptOwnerName>
    </reportingOwnerId>
    <reportingOwnerRelationship>
      <isDirector>1</isDirector>
      <isOfficer>1</isOfficer>
      <officerTitle>Executive Chairman</officerTitle>
      <isTenPercentOwner>0</isTenPercentOwner>
    </reportingOwnerRelationship>
  </reportingOwner>
  {body}
  <ownerSignature>
    <signatureName>/s/ Attorney-in-fact</signatureName>
    <signatureDate>2024-03-18</signatureDate>
  </ownerSignature>
</ownershipDocument>"#
        )
    }

    const SALE: &str = r#"
  <nonDerivativeTable>
    <nonDerivativeTransaction>
      <securityTitle><value>Common Stock</value></securityTitle>
      <transactionDate><value>2024-03-15</value></transactionDate>
      <transactionCoding><transactionFormType>4</transactionFormType><transactionCode>S</transactionCode></transactionCoding>
      <transactionAmounts>
        <transactionShares><value>1000</value></transactionShares>
        <transactionPricePerShare><value>50</value></transactionPricePerShare>
        <transactionAcquiredDisposedCode><value>D</value></transactionAcquiredDisposedCode>
      </transactionAmounts>
      <postTransactionAmounts>
        <sharesOwnedFollowingTransaction><value>250,000</value></sharesOwnedFollowingTransaction>
      </postTransactionAmounts>
      <ownershipNature><directOrIndirectOwnership><value>D</value></directOrIndirectOwnership></ownershipNature>
    </nonDerivativeTransaction>
  </nonDerivativeTable>"#;

    #[test]
    fn extracts_sale_and_matches_filer() {
        let records = TransactionExtractor::new().extract(&doc(SALE), "0001193125-24-000001");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.kind, TransactionKind::Sale);
        assert_eq!(r.transaction_code.as_deref(), Some("S"));
        assert_eq!(r.shares, 1000.0);
        assert_eq!(r.price_per_share, Some(50.0));
        assert_eq!(r.total_value, Some(50_000.0));
        assert_eq!(r.shares_owned_after, Some(250_000.0));
        assert_eq!(r.entity_id, "0000783325");
        assert_eq!(r.ticker.as_deref(), Some("WEC"));
        assert_eq!(r.entity_name, "WEC Energy Group, Inc.");
        assert_eq!(r.person_role.as_deref(), Some("Director, Executive Chairman"));
        assert_eq!(r.ownership, Ownership::Direct);
        assert_eq!(r.document_date, NaiveDate::from_ymd_opt(2024, 3, 18));
        assert_eq!(r.form_type, "4");
        assert!(!r.is_derivative && !r.is_holding);

        assert!(NameResolver::default().is_match("Gale Klappa", &r.person_name));
    }

    #[test]
    fn missing_price_leaves_value_absent() {
        let body = r#"<nonDerivativeTable><nonDerivativeTransaction>
            <securityTitle><value>Common Stock</value></securityTitle>
            <transactionCoding><transactionCode>G</transactionCode></transactionCoding>
            <transactionAmounts><transactionShares><value>500</value></transactionShares></transactionAmounts>
            <ownershipNature><directOrIndirectOwnership><value>I</value></directOrIndirectOwnership></ownershipNature>
        </nonDerivativeTransaction></nonDerivativeTable>"#;
        let records = TransactionExtractor::new().extract(&doc(body), "d1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::Gift);
        assert_eq!(records[0].price_per_share, None);
        assert_eq!(records[0].total_value, None);
        assert_eq!(records[0].ownership, Ownership::Indirect);
        // Falls back to the reporting period.
        assert_eq!(records[0].transaction_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn bad_element_is_skipped_not_fatal() {
        let body = r#"<nonDerivativeTable>
          <nonDerivativeTransaction>
            <securityTitle><value>Common Stock</value></securityTitle>
            <transactionAmounts><transactionShares><value>lots</value></transactionShares></transactionAmounts>
          </nonDerivativeTransaction>
          <nonDerivativeTransaction>
            <transactionAmounts><transactionShares><value>10</value></transactionShares></transactionAmounts>
          </nonDerivativeTransaction>
          <nonDerivativeTransaction>
            <securityTitle><value>Common Stock</value></securityTitle>
            <transactionCoding><transactionCode>P</transactionCode></transactionCoding>
            <transactionAmounts><transactionShares><value>200</value></transactionShares>
            <transactionPricePerShare><value>$10.00</value></transactionPricePerShare></transactionAmounts>
          </nonDerivativeTransaction>
        </nonDerivativeTable>"#;
        let records = TransactionExtractor::new().extract(&doc(body), "d2");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::Purchase);
        assert_eq!(records[0].total_value, Some(2000.0));
    }

    #[test]
    fn missing_code_uses_table_default() {
        let body = r#"
        <nonDerivativeTable><nonDerivativeTransaction>
            <securityTitle><value>Common Stock</value></securityTitle>
            <transactionAmounts><transactionShares><value>5</value></transactionShares></transactionAmounts>
        </nonDerivativeTransaction></nonDerivativeTable>
        <derivativeTable><derivativeTransaction>
            <securityTitle><value>Stock Option</value></securityTitle>
            <conversionOrExercisePrice><value>32.10</value></conversionOrExercisePrice>
            <transactionAmounts><transactionShares><value>3000</value></transactionShares></transactionAmounts>
            <underlyingSecurity><underlyingSecurityShares><value>3000</value></underlyingSecurityShares></underlyingSecurity>
        </derivativeTransaction></derivativeTable>"#;
        let records = TransactionExtractor::new().extract(&doc(body), "d3");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, TransactionKind::Purchase);
        let d = &records[1];
        assert_eq!(d.kind, TransactionKind::Exercise);
        assert!(d.is_derivative);
        assert_eq!(d.security_title, "Stock Option (Derivative)");
        assert_eq!(d.exercise_price, Some(32.10));
        assert_eq!(d.shares_owned_after, Some(3000.0));
    }

    #[test]
    fn holdings_used_when_no_transactions() {
        let body = r#"<nonDerivativeTable><nonDerivativeHolding>
            <securityTitle><value>Common Stock</value></securityTitle>
            <postTransactionAmounts><sharesOwnedFollowingTransaction><value>12000</value></sharesOwnedFollowingTransaction></postTransactionAmounts>
        </nonDerivativeHolding></nonDerivativeTable>"#;
        let records = TransactionExtractor::new().extract(&doc(body), "d4");
        assert_eq!(records.len(), 1);
        let h = &records[0];
        assert!(h.is_holding);
        assert_eq!(h.shares, 0.0);
        assert_eq!(h.kind, TransactionKind::Other);
        assert_eq!(h.shares_owned_after, Some(12000.0));
        assert_eq!(h.transaction_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn derivative_holdings_used_when_no_derivative_transactions() {
        let body = r#"<derivativeTable><derivativeHolding>
            <securityTitle><value>Stock Option (right to buy)</value></securityTitle>
            <conversionOrExercisePrice><value>41.25</value></conversionOrExercisePrice>
            <underlyingSecurity>
              <underlyingSecurityTitle><value>Common Stock</value></underlyingSecurityTitle>
              <underlyingSecurityShares><value>8,500</value></underlyingSecurityShares>
            </underlyingSecurity>
            <ownershipNature><directOrIndirectOwnership><value>D</value></directOrIndirectOwnership></ownershipNature>
        </derivativeHolding></derivativeTable>"#;
        let records = TransactionExtractor::new().extract(&doc(body), "d4b");
        assert_eq!(records.len(), 1);
        let h = &records[0];
        assert!(h.is_holding);
        assert!(h.is_derivative);
        assert_eq!(h.shares, 0.0);
        assert_eq!(h.total_value, None);
        assert_eq!(h.security_title, "Stock Option (right to buy) (Derivative)");
        assert_eq!(h.shares_owned_after, Some(8500.0));
        assert_eq!(h.exercise_price, Some(41.25));
        assert_eq!(h.transaction_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn negative_shares_rejected() {
        let body = r#"<nonDerivativeTable><nonDerivativeTransaction>
            <securityTitle><value>Common Stock</value></securityTitle>
            <transactionAmounts><transactionShares><value>(100)</value></transactionShares></transactionAmounts>
        </nonDerivativeTransaction></nonDerivativeTable>"#;
        assert!(TransactionExtractor::new().extract(&doc(body), "d5").is_empty());
    }

    #[test]
    fn envelope_and_truncation_recovered() {
        let full = doc(SALE);
        let cut = full.find("<ownerSignature>").unwrap();
        let raw = format!(
            "<SEC-DOCUMENT>0001193125-24-000001.txt\n<TYPE>4\n<XML>\n{}",
            &full[..cut]
        );
        let records = TransactionExtractor::new().extract(&raw, "d6");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shares, 1000.0);
        // Signature was cut off; the period stands in.
        assert_eq!(records[0].document_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn missing_filer_yields_nothing() {
        let raw = r#"<ownershipDocument><issuer><issuerName>Acme</issuerName></issuer></ownershipDocument>"#;
        assert!(TransactionExtractor::new().extract(raw, "d7").is_empty());
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(TransactionExtractor::new().extract("", "d8").is_empty());
        assert!(TransactionExtractor::new().extract("not a document", "d9").is_empty());
    }

    #[test]
    fn extra_owner_name_tags() {
        let raw = r#"<ownershipDocument>
            <issuer><issuerCik>1</issuerCik><issuerName>Acme</issuerName></issuer>
            <reportingOwner><reportingOwnerId><filerName>Doe Jane</filerName></reportingOwnerId></reportingOwner>
            <nonDerivativeTable><nonDerivativeTransaction>
              <securityTitle><value>Common</value></securityTitle>
              <transactionAmounts><transactionShares><value>1</value></transactionShares></transactionAmounts>
            </nonDerivativeTransaction></nonDerivativeTable>
        </ownershipDocument>"#;
        assert!(TransactionExtractor::new().extract(raw, "d10").is_empty());
        let records = TransactionExtractor::new()
            .with_owner_name_tags(["filerName"])
            .extract(raw, "d10");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].person_name, "Doe Jane");
        assert_eq!(records[0].entity_id, "0000000001");
        assert_eq!(records[0].person_role, None);
    }
}
