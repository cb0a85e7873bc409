mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use insidertrace_core::extract::values::normalize_entity_id;
use insidertrace_core::names::DEFAULT_MATCH_THRESHOLD;
use insidertrace_core::{
    AggregationReporter, BoardPosition, Clock, EntityRef, NameResolver, SystemClock,
    TransactionExtractor, TransactionFilter, TransactionKind,
};
use insidertrace_edgar::{EdgarClient, EdgarConfig, Governor, RateGovernor, ResponseCache};
use insidertrace_search::{SearchConfig, SearchOrchestrator, SearchRequest, Sources, StrategyHint};

const SWEEP_PERIOD: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "insidertrace")]
#[command(about = "Find every company a person has reported insider ownership at")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the archive for a person's insider relationships
    Find {
        #[command(flatten)]
        search: SearchArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build a cross-entity profile for a person
    Report {
        #[command(flatten)]
        search: SearchArgs,
        /// JSON array of board positions to merge into the profile
        #[arg(long)]
        board_positions: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List a person's transactions at one entity, newest first
    Transactions {
        person: String,
        /// Entity identifier (CIK)
        #[arg(long)]
        entity_id: String,
        #[arg(long, default_value_t = 10)]
        years_back: u32,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        client: ClientArgs,
        #[arg(long)]
        json: bool,
    },
    /// Summarize every insider's recent activity at one entity
    Activity {
        /// Entity identifier (CIK)
        #[arg(long)]
        entity_id: String,
        #[arg(long, default_value_t = 90)]
        days_back: u32,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        client: ClientArgs,
        #[arg(long)]
        json: bool,
    },
    /// Extract transactions from a local disclosure document
    Extract {
        file: PathBuf,
        /// Identifier stamped on each record (defaults to the file stem)
        #[arg(long)]
        document_id: Option<String>,
        /// Extra element names to read the filer name from
        #[arg(long = "owner-tag")]
        owner_tags: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the name variations used as search queries
    Variations { name: String },
    /// Score two names against each other
    Match {
        a: String,
        b: String,
        #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f64,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Person to search for, e.g. "Gale Klappa"
    person: String,
    /// Only report current relationships
    #[arg(long)]
    current_only: bool,
    /// Minimum matching transactions for an entity to count
    #[arg(long, default_value_t = 1)]
    min_transactions: usize,
    #[arg(long, default_value_t = 10)]
    years_back: u32,
    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    strategy: StrategyArg,
    /// Look only at this entity (CIK), skipping discovery
    #[arg(long)]
    entity_id: Option<String>,
    /// Stop after probing this many entities
    #[arg(long)]
    max_entities: Option<usize>,
    /// Stop starting new entity scans after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
    /// Name match threshold in [0, 1]
    #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
    threshold: f64,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Args)]
struct ClientArgs {
    /// Entities scanned in parallel
    #[arg(long, env = "INSIDERTRACE_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,
    /// Identifying User-Agent sent to the archive
    #[arg(long, env = "SEC_EDGAR_USER_AGENT")]
    user_agent: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Earliest transaction date, e.g. 2024-01-01
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Latest transaction date
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Keep only these kinds (repeatable)
    #[arg(long = "kind", value_enum)]
    kinds: Vec<KindArg>,
    /// Smallest total value to keep, in dollars
    #[arg(long)]
    min_value: Option<f64>,
}

impl FilterArgs {
    fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            start: self.start,
            end: self.end,
            kinds: self.kinds.iter().map(|&k| k.into()).collect(),
            min_value: self.min_value,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Purchase,
    Sale,
    Gift,
    Conversion,
    Exercise,
    Other,
}

impl From<KindArg> for TransactionKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Purchase => Self::Purchase,
            KindArg::Sale => Self::Sale,
            KindArg::Gift => Self::Gift,
            KindArg::Conversion => Self::Conversion,
            KindArg::Exercise => Self::Exercise,
            KindArg::Other => Self::Other,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Auto,
    Indexed,
    Exhaustive,
}

impl From<StrategyArg> for StrategyHint {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => Self::Auto,
            StrategyArg::Indexed => Self::IndexedOnly,
            StrategyArg::Exhaustive => Self::Exhaustive,
        }
    }
}

impl SearchArgs {
    fn request(&self) -> SearchRequest {
        let mut request = SearchRequest::new(self.person.clone())
            .include_former(!self.current_only)
            .min_transactions(self.min_transactions)
            .years_back(self.years_back)
            .strategy(self.strategy.into());
        if let Some(id) = &self.entity_id {
            request = request.entity(entity_ref(id));
        }
        if let Some(max) = self.max_entities {
            request = request.max_entities(max);
        }
        if let Some(secs) = self.deadline_secs {
            request = request.deadline(Duration::from_secs(secs));
        }
        request
    }
}

fn entity_ref(id: &str) -> EntityRef {
    let entity_id = normalize_entity_id(id);
    EntityRef {
        name: entity_id.clone(),
        entity_id,
        ticker: None,
    }
}

fn orchestrator(client: &ClientArgs, resolver: NameResolver) -> anyhow::Result<SearchOrchestrator> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(ResponseCache::new(clock.clone()));
    cache.spawn_sweeper(SWEEP_PERIOD);

    let mut config = EdgarConfig::from_env();
    if let Some(ua) = &client.user_agent {
        config.user_agent = ua.clone();
    }
    let governor: Arc<dyn Governor> = Arc::new(RateGovernor::default());
    let edgar = Arc::new(EdgarClient::new(config, governor).context("building archive client")?);

    let search_config = SearchConfig {
        concurrency: client.concurrency.max(1),
        ..SearchConfig::default()
    };
    Ok(SearchOrchestrator::new(Sources::from_client(edgar), cache, clock)
        .with_config(search_config)
        .with_resolver(resolver))
}

fn load_board_positions(path: &Path) -> anyhow::Result<Vec<BoardPosition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn extract_file(
    path: &Path,
    document_id: Option<&str>,
    owner_tags: &[String],
) -> anyhow::Result<Vec<insidertrace_core::TransactionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extractor = TransactionExtractor::new().with_owner_name_tags(owner_tags.iter().cloned());
    Ok(extractor.extract(&raw, document_id.unwrap_or(&stem)))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Find { search, json } => {
            let orch = orchestrator(&search.client, NameResolver::new(search.threshold))?;
            let result = orch.find_relationships(&search.request()).await?;
            if json {
                print_json(&result)?;
            } else {
                print!("{}", display::render_search_result(&result));
            }
        }
        Command::Report {
            search,
            board_positions,
            json,
        } => {
            let positions = match &board_positions {
                Some(path) => load_board_positions(path)?,
                None => Vec::new(),
            };
            let resolver = NameResolver::new(search.threshold);
            let orch = orchestrator(&search.client, resolver)?;
            let result = orch.find_relationships(&search.request()).await?;
            let profile = AggregationReporter::new(resolver).build_profile(&result, &positions);
            if json {
                print_json(&profile)?;
            } else {
                print!("{}", display::render_profile(&profile));
            }
        }
        Command::Transactions {
            person,
            entity_id,
            years_back,
            filter,
            client,
            json,
        } => {
            let orch = orchestrator(&client, NameResolver::default())?;
            let records = orch
                .entity_transactions(&person, &entity_ref(&entity_id), years_back, &filter.filter())
                .await?;
            if json {
                print_json(&records)?;
            } else {
                print!("{}", display::render_records(&records));
            }
        }
        Command::Activity {
            entity_id,
            days_back,
            filter,
            client,
            json,
        } => {
            let orch = orchestrator(&client, NameResolver::default())?;
            let activity = orch
                .entity_activity(&entity_ref(&entity_id), days_back, &filter.filter())
                .await?;
            if json {
                print_json(&activity)?;
            } else {
                print!("{}", display::render_activity(&activity));
            }
        }
        Command::Extract {
            file,
            document_id,
            owner_tags,
            json,
        } => {
            let records = extract_file(&file, document_id.as_deref(), &owner_tags)?;
            tracing::info!(file = %file.display(), records = records.len(), "extracted");
            if json {
                print_json(&records)?;
            } else {
                print!("{}", display::render_records(&records));
            }
        }
        Command::Variations { name } => {
            let variations = NameResolver::default().generate_variations(&name);
            print!("{}", display::render_variations(&variations));
        }
        Command::Match { a, b, threshold } => {
            let resolver = NameResolver::new(threshold);
            println!("{:<12} {}", "normalized", resolver.normalize(&a));
            println!("{:<12} {}", "", resolver.normalize(&b));
            println!("{:<12} {:.3}", "similarity", resolver.similarity(&a, &b));
            println!("{:<12} {}", "match", if resolver.is_match(&a, &b) { "yes" } else { "no" });
        }
    }
    Ok(())
}
