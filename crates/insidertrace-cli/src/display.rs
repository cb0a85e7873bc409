//! Plain-text rendering of search results, profiles, entity activity, and
//! extracted records.
//!
//! Everything renders into a `String` so the caller decides where it goes.

use std::fmt::Write;

use chrono::NaiveDate;
use insidertrace_core::{
    EntityActivity, EntityRelationshipSummary, InsiderProfile, NameVariant, SearchResult,
    TransactionRecord,
};

const MAX_LIST_ITEMS: usize = 10;
const LABEL_WIDTH: usize = 26;

// ── Search results ──

pub fn render_search_result(result: &SearchResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", result.person_name);
    let _ = writeln!(
        out,
        "as of {} via {} search ({} entities searched)",
        result.as_of,
        result.strategy.as_str(),
        result.entities_searched
    );
    if let Some(reason) = &result.incomplete_reason {
        let _ = writeln!(out, "INCOMPLETE: {reason}");
    }
    out.push('\n');

    let s = &result.summary;
    let _ = writeln!(out, "Summary");
    field(&mut out, "entities", s.total_entities);
    field(&mut out, "current", s.current_count);
    field(&mut out, "former", s.former_count);
    field(&mut out, "transactions", s.total_transactions);
    out.push('\n');

    if let Some(message) = &result.message {
        let _ = writeln!(out, "{message}");
        if !result.name_variations_tried.is_empty() {
            let _ = writeln!(out, "  tried: {}", result.name_variations_tried.join(" | "));
        }
        return out;
    }

    for entity in &result.entities {
        render_entity(&mut out, entity);
    }
    out
}

fn render_entity(out: &mut String, e: &EntityRelationshipSummary) {
    let ticker = e.ticker.as_deref().map(|t| format!(" ({t})")).unwrap_or_default();
    let unverified = if e.verified { "" } else { " [unverified]" };
    let _ = writeln!(
        out,
        "{}{ticker}  [{}]{unverified}",
        e.entity_name,
        e.status.as_str()
    );
    if let Some(role) = &e.role {
        field(out, "role", role);
    }
    field(out, "transactions", e.transaction_count);
    field(out, "active", date_span(e.first_transaction, e.last_transaction));
    if e.shares_bought > 0.0 {
        field(out, "bought", format!("{} shares (${})", group(e.shares_bought), group(e.value_bought)));
    }
    if e.shares_sold > 0.0 {
        field(out, "sold", format!("{} shares (${})", group(e.shares_sold), group(e.value_sold)));
    }
    field(out, "net", signed(e.net_shares));
    out.push('\n');
}

// ── Profiles ──

pub fn render_profile(profile: &InsiderProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", profile.person_name);
    let _ = writeln!(out, "profile as of {}", profile.as_of);
    if profile.incomplete {
        let _ = writeln!(out, "INCOMPLETE: search stopped early; figures are partial");
    }
    out.push('\n');

    let st = &profile.statistics;
    let _ = writeln!(out, "Career");
    field(&mut out, "entities", st.total_entities);
    field(&mut out, "current / former / unknown", format!("{} / {} / {}", st.current_count, st.former_count, st.unknown_count));
    field(&mut out, "transactions", st.total_transactions);
    field(&mut out, "avg per entity", format!("{:.1}", st.average_transactions_per_entity));
    field(&mut out, "net buyer / seller", format!("{} / {}", st.net_buyer_entities, st.net_seller_entities));
    if let Some(name) = &st.most_active_entity {
        field(&mut out, "most active", name);
    }
    if let Some(years) = st.career_span_years {
        field(&mut out, "career span", format!("{years} years"));
    }
    if let Some(years) = st.average_tenure_years {
        field(&mut out, "average tenure", format!("{years:.1} years"));
    }
    out.push('\n');

    if !profile.comparisons.is_empty() {
        let _ = writeln!(out, "Entities");
        let _ = writeln!(
            out,
            "  {:<30} {:<8} {:>6} {:>14}  {:<10} {}",
            "name", "status", "txns", "net shares", "activity", "position"
        );
        for c in profile.comparisons.iter().take(MAX_LIST_ITEMS) {
            let _ = writeln!(
                out,
                "  {:<30} {:<8} {:>6} {:>14}  {:<10} {:?}",
                truncate(&c.entity_name, 30),
                c.status.as_str(),
                c.transaction_count,
                signed(c.net_shares),
                c.activity_level.label(),
                c.net_position
            );
        }
        more(&mut out, profile.comparisons.len());
        out.push('\n');
    }

    if !profile.current_board_positions.is_empty() || !profile.former_board_positions.is_empty() {
        let _ = writeln!(out, "Board positions");
        for p in &profile.current_board_positions {
            let _ = writeln!(out, "  {:<30} {} (current)", truncate(&p.entity_name, 30), p.title);
        }
        for p in &profile.former_board_positions {
            let _ = writeln!(out, "  {:<30} {} (former)", truncate(&p.entity_name, 30), p.title);
        }
        out.push('\n');
    }

    if !profile.timeline.is_empty() {
        let _ = writeln!(out, "Timeline");
        for event in &profile.timeline {
            let _ = writeln!(out, "  {}  {}", event.date, event.description);
        }
        out.push('\n');
    }

    if !profile.insights.is_empty() {
        let _ = writeln!(out, "Insights");
        for insight in &profile.insights {
            let _ = writeln!(out, "  - {insight}");
        }
    }
    out
}

// ── Entity activity ──

pub fn render_activity(activity: &EntityActivity) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", activity.entity.name);
    let _ = writeln!(out, "insider activity {} .. {}", activity.start, activity.end);
    out.push('\n');

    let _ = writeln!(out, "Summary");
    field(&mut out, "transactions", activity.transaction_count);
    field(&mut out, "insiders", activity.insider_count());
    field(&mut out, "bought", group(activity.shares_bought));
    field(&mut out, "sold", group(activity.shares_sold));
    field(&mut out, "net", signed(activity.net_shares));
    if let Some(ratio) = activity.buy_sell_ratio {
        field(&mut out, "buy / sell", format!("{ratio:.2}"));
    }
    out.push('\n');

    if activity.insiders.is_empty() {
        let _ = writeln!(out, "no transactions");
        return out;
    }

    let _ = writeln!(out, "Insiders");
    let _ = writeln!(
        out,
        "  {:<30} {:>6} {:>14} {:>14}  {}",
        "name", "txns", "net shares", "value sold", "last"
    );
    for i in activity.insiders.iter().take(MAX_LIST_ITEMS) {
        let last = i.last_transaction.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "  {:<30} {:>6} {:>14} {:>14}  {last}",
            truncate(&i.person_name, 30),
            i.transaction_count,
            signed(i.net_shares),
            format!("${}", group(i.value_sold))
        );
    }
    more(&mut out, activity.insiders.len());
    out.push('\n');

    let _ = writeln!(out, "Recent");
    out.push_str(&render_records(&activity.recent));
    out
}

// ── Records and names ──

pub fn render_records(records: &[TransactionRecord]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        let _ = writeln!(out, "no transactions");
        return out;
    }
    for r in records {
        let date = r.transaction_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let price = r.price_per_share.map(|p| format!("@ ${p:.2}")).unwrap_or_default();
        let _ = writeln!(
            out,
            "{date}  {:<10} {:>14} {price:<12} {} | {} | {}",
            r.kind.as_str(),
            group(r.shares),
            r.security_title,
            r.person_name,
            r.entity_name
        );
    }
    out
}

pub fn render_variations(variations: &[NameVariant]) -> String {
    let mut out = String::new();
    for v in variations {
        let _ = writeln!(out, "  {:<30} {:?}", v.text, v.source);
    }
    out
}

// ── Helpers ──

fn field(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
}

fn more(out: &mut String, len: usize) {
    if len > MAX_LIST_ITEMS {
        let _ = writeln!(out, "  ... and {} more", len - MAX_LIST_ITEMS);
    }
}

fn date_span(first: Option<NaiveDate>, last: Option<NaiveDate>) -> String {
    let show = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "?".into());
    format!("{} .. {}", show(first), show(last))
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width - 3).collect();
        format!("{cut}...")
    }
}

/// Whole-number rendering with thousands separators.
fn group(value: f64) -> String {
    let rounded = value.abs().round() as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 && rounded > 0 {
        format!("-{out}")
    } else {
        out
    }
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", group(value))
    } else {
        group(value)
    }
}
