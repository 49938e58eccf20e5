use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crmcache::cache::{EntityStore, NoopStorage, SqliteStorage, Storage};
use crmcache::config::Config;
use crmcache::crm::types::{LeadDraft, LeadSource};
use crmcache::crm::{CrmClient, StubCrm};
use crmcache::query::{Field, Filter, ListQuery, SortDirection, SortKey};

#[derive(Parser, Debug)]
#[command(name = "crmcache")]
#[command(about = "Operator console for the CRM entity cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/crmcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the cache purely in memory for this run
  #[arg(long)]
  no_persist: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List cached records of one kind, with optional filters and sort
  List {
    kind: KindArg,
    /// Case-insensitive substring over names/titles
    #[arg(long)]
    search: Option<String>,
    /// Exact status value (e.g. new, qualified, sent)
    #[arg(long)]
    status: Option<String>,
    /// Exact lead source value (e.g. web, ads)
    #[arg(long)]
    source: Option<String>,
    /// Exact opportunity stage value (e.g. proposal)
    #[arg(long)]
    stage: Option<String>,
    /// Sort key
    #[arg(long)]
    sort: Option<SortArg>,
    /// Sort descending instead of ascending
    #[arg(long)]
    desc: bool,
  },
  /// Create a lead through the mutation layer
  CreateLead {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "web")]
    source: SourceArg,
  },
  /// Qualify a lead
  Qualify { id: String },
  /// Disqualify a lead
  Disqualify { id: String },
  /// Convert a lead
  Convert { id: String },
  /// Reset every cached map
  Clear,
  /// Walk the cache through fetch, cached read, and invalidation
  Demo,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
  Accounts,
  Leads,
  Opportunities,
  Quotations,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
  Name,
  Created,
  Updated,
  Value,
  Score,
  Probability,
  Total,
}

impl From<SortArg> for SortKey {
  fn from(arg: SortArg) -> Self {
    match arg {
      SortArg::Name => SortKey::Name,
      SortArg::Created => SortKey::CreatedAt,
      SortArg::Updated => SortKey::UpdatedAt,
      SortArg::Value => SortKey::Value,
      SortArg::Score => SortKey::Score,
      SortArg::Probability => SortKey::Probability,
      SortArg::Total => SortKey::Total,
    }
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
  Web,
  Referral,
  Ads,
  Event,
  ColdCall,
}

impl From<SourceArg> for LeadSource {
  fn from(arg: SourceArg) -> Self {
    match arg {
      SourceArg::Web => LeadSource::Web,
      SourceArg::Referral => LeadSource::Referral,
      SourceArg::Ads => LeadSource::Ads,
      SourceArg::Event => LeadSource::Event,
      SourceArg::ColdCall => LeadSource::ColdCall,
    }
  }
}

/// Route logs to a file so stdout stays clean for command output.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("crmcache");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::never(log_dir, "crmcache.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_tracing()?;

  let storage: Box<dyn Storage> = if args.no_persist || !config.storage.persist {
    Box::new(NoopStorage)
  } else if let Some(path) = &config.storage.path {
    Box::new(SqliteStorage::open_at(path)?)
  } else {
    Box::new(SqliteStorage::open()?)
  };

  let store = EntityStore::load(storage)?;
  let client =
    CrmClient::new(StubCrm::seeded(config.latency()), store).with_stale_time(config.stale_time());

  match args.command {
    Command::List {
      kind,
      search,
      status,
      source,
      stage,
      sort,
      desc,
    } => {
      let mut query = ListQuery::default();
      if let Some(needle) = search {
        query = query.with_filter(Filter::Search(needle));
      }
      if let Some(value) = status {
        query = query.with_filter(Filter::Exact {
          field: Field::Status,
          value,
        });
      }
      if let Some(value) = source {
        query = query.with_filter(Filter::Exact {
          field: Field::Source,
          value,
        });
      }
      if let Some(value) = stage {
        query = query.with_filter(Filter::Exact {
          field: Field::Stage,
          value,
        });
      }
      if let Some(key) = sort {
        let direction = if desc {
          SortDirection::Descending
        } else {
          SortDirection::Ascending
        };
        query = query.with_sort(key.into(), direction);
      }

      list(&client, kind, &query).await?;
    }
    Command::CreateLead {
      name,
      email,
      source,
    } => {
      let lead = client
        .create_lead(LeadDraft {
          name,
          email,
          phone: None,
          source: source.into(),
          assigned_to: None,
          notes: None,
        })
        .await?;
      println!("created lead {} ({})", lead.id, lead.name);
    }
    Command::Qualify { id } => {
      let lead = client.qualify_lead(&id).await?;
      println!("{} is now {}", lead.name, lead.status.as_str());
    }
    Command::Disqualify { id } => {
      let lead = client.disqualify_lead(&id).await?;
      println!("{} is now {}", lead.name, lead.status.as_str());
    }
    Command::Convert { id } => {
      let lead = client.convert_lead(&id).await?;
      println!("{} is now {}", lead.name, lead.status.as_str());
    }
    Command::Clear => {
      client.clear()?;
      println!("cache cleared");
    }
    Command::Demo => demo(&client).await?,
  }

  Ok(())
}

async fn list(
  client: &CrmClient<StubCrm, Box<dyn Storage>>,
  kind: KindArg,
  query: &ListQuery,
) -> Result<()> {
  match kind {
    KindArg::Accounts => {
      let result = client.list_accounts(query).await?;
      for a in &result.data {
        println!("{}  {}  {}/{}  {}", a.id, a.name, a.kind.as_str(), a.status.as_str(), a.email);
      }
      summary(result.data.len(), result.is_from_cache());
    }
    KindArg::Leads => {
      let result = client.list_leads(query).await?;
      for l in &result.data {
        let score = l.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        println!(
          "{}  {}  {}  {}  score {}",
          l.id,
          l.name,
          l.source.as_str(),
          l.status.as_str(),
          score
        );
      }
      summary(result.data.len(), result.is_from_cache());
    }
    KindArg::Opportunities => {
      let result = client.list_opportunities(query).await?;
      for o in &result.data {
        println!(
          "{}  {}  {}  {:.0} ({}%)",
          o.id,
          o.title,
          o.stage.as_str(),
          o.value,
          o.probability
        );
      }
      summary(result.data.len(), result.is_from_cache());
    }
    KindArg::Quotations => {
      let result = client.list_quotations(query).await?;
      for q in &result.data {
        println!("{}  {}  {}  {:.2}", q.id, q.number, q.status.as_str(), q.total);
      }
      summary(result.data.len(), result.is_from_cache());
    }
  }
  Ok(())
}

fn summary(count: usize, from_cache: bool) {
  let origin = if from_cache { "cache" } else { "backend" };
  eprintln!("{} record(s), served from {}", count, origin);
}

/// Exercise the read path, the freshness window, and mutation invalidation
/// in one process.
async fn demo(client: &CrmClient<StubCrm, Box<dyn Storage>>) -> Result<()> {
  let query = ListQuery::default().with_sort(SortKey::Name, SortDirection::Ascending);

  let first = client.list_leads(&query).await?;
  println!(
    "initial read: {} leads, from {}",
    first.data.len(),
    if first.is_from_cache() { "cache" } else { "backend" }
  );

  let second = client.list_leads(&query).await?;
  println!(
    "repeat read: {} leads, from {}",
    second.data.len(),
    if second.is_from_cache() { "cache" } else { "backend" }
  );

  let target = first
    .data
    .first()
    .ok_or_else(|| eyre!("stub returned no leads"))?;
  let qualified = client.qualify_lead(&target.id).await?;
  println!("qualified {} ({})", qualified.name, qualified.status.as_str());

  let third = client.list_leads(&query).await?;
  println!(
    "post-mutation read: {} leads, from {}",
    third.data.len(),
    if third.is_from_cache() { "cache" } else { "backend" }
  );

  Ok(())
}
