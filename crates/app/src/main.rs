use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use engine::{
    CandidateQuery, CreateOffsetCmd, Currency, Engine, OffsetCandidate, OffsetLink, OffsetStatus,
    ResyncQueue, TotalsScope, spawn_resync_worker,
};
use migration::{Migrator, MigratorTrait};
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "netspend")]
#[command(about = "Link expenses to their refunds and report net spend")]
struct Cli {
    /// Configuration file, without extension.
    #[arg(long, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Database connection string, overrides the configured database.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FamilyArg {
    #[arg(long)]
    family: Uuid,
}

#[derive(Args, Debug)]
struct OffsetIdArgs {
    #[command(flatten)]
    family: FamilyArg,
    #[arg(long)]
    offset_id: Uuid,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propose expense/refund pairs.
    Candidates {
        #[command(flatten)]
        family: FamilyArg,
        /// Refund candidates for this expense.
        #[arg(long, conflicts_with_all = ["offset", "transaction"])]
        expense: Option<Uuid>,
        /// Expense candidates for this refund.
        #[arg(long, conflicts_with = "transaction")]
        offset: Option<Uuid>,
        /// Candidates for this transaction, direction chosen by its sign.
        #[arg(long, conflicts_with = "window_days")]
        transaction: Option<Uuid>,
        #[arg(long)]
        window_days: Option<i64>,
    },
    /// Link an expense to an offset.
    Link {
        #[command(flatten)]
        family: FamilyArg,
        #[arg(long)]
        expense: Uuid,
        #[arg(long)]
        offset: Uuid,
        /// Store the link as pending instead of confirmed.
        #[arg(long)]
        pending: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Confirm a proposed match from either side.
    Match {
        #[command(flatten)]
        family: FamilyArg,
        #[arg(long)]
        anchor: Uuid,
        #[arg(long)]
        matched: Uuid,
    },
    /// List the family's offset links.
    Offsets(FamilyArg),
    Confirm(OffsetIdArgs),
    /// Reject a link: the pair is never proposed again.
    Reject(OffsetIdArgs),
    /// Remove a link without rejecting the pair.
    Unlink(OffsetIdArgs),
    /// Per-category totals net of confirmed offsets.
    Totals {
        #[command(flatten)]
        family: FamilyArg,
        /// Inclusive.
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Exclusive.
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Expense amount net of its confirmed offsets.
    Net {
        #[command(flatten)]
        family: FamilyArg,
        #[arg(long)]
        transaction: Uuid,
    },
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "netspend={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect(&url).await?;

    let (queue, receiver) = ResyncQueue::channel();
    let worker_engine = Engine::builder().database(db.clone()).build().await?;
    let worker = spawn_resync_worker(worker_engine, receiver);

    let engine = Engine::builder()
        .database(db)
        .candidate_window_days(settings.matching.date_window_days)
        .resync_queue(queue)
        .build()
        .await?;

    let result = run(&engine, cli.command).await;

    // Closing the queue lets the worker drain pending resyncs and stop.
    drop(engine);
    if let Err(err) = worker.await {
        tracing::error!("resync worker failed: {err}");
    }
    result
}

async fn connect(url: &str) -> AppResult<sea_orm::DatabaseConnection> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::debug!("database ready");
    Ok(database)
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::Candidates {
            family,
            expense,
            offset,
            transaction,
            window_days,
        } => {
            let family_id = family.family;
            let candidates = match (expense, offset, transaction) {
                (Some(expense), _, _) => {
                    engine
                        .offset_candidates_for(family_id, expense, window_days)
                        .await?
                }
                (_, Some(offset), _) => {
                    engine
                        .expense_candidates_for(family_id, offset, window_days)
                        .await?
                }
                (_, _, Some(transaction)) => {
                    engine.match_candidates_for(family_id, transaction).await?
                }
                (None, None, None) => {
                    let query = CandidateQuery {
                        window_days,
                        anchor: None,
                    };
                    engine.offset_match_candidates(family_id, &query).await?
                }
            };
            candidates.iter().for_each(print_candidate);
        }
        Command::Link {
            family,
            expense,
            offset,
            pending,
            notes,
        } => {
            let status = if pending {
                OffsetStatus::Pending
            } else {
                OffsetStatus::Confirmed
            };
            let cmd = CreateOffsetCmd {
                notes,
                ..CreateOffsetCmd::new(expense, offset, status)
            };
            print_link(&engine.create_offset(family.family, cmd).await?);
        }
        Command::Match {
            family,
            anchor,
            matched,
        } => {
            print_link(&engine.link_match(family.family, anchor, matched).await?);
        }
        Command::Offsets(family) => {
            for link in engine.list_offsets(family.family).await? {
                print_link(&link);
            }
        }
        Command::Confirm(args) => {
            let link = engine.offset(args.family.family, args.offset_id).await?;
            print_link(&engine.confirm_offset(args.family.family, &link).await?);
        }
        Command::Reject(args) => {
            let link = engine.offset(args.family.family, args.offset_id).await?;
            let rejected = engine.reject_offset(args.family.family, link).await?;
            println!(
                "rejected {} -> {}",
                rejected.expense_transaction_id, rejected.offset_transaction_id
            );
        }
        Command::Unlink(args) => {
            engine
                .delete_offset(args.family.family, args.offset_id)
                .await?;
            println!("unlinked {}", args.offset_id);
        }
        Command::Totals {
            family,
            from,
            to,
            currency,
        } => {
            let target_currency = currency
                .as_deref()
                .map(Currency::try_from)
                .transpose()?;
            let scope = TotalsScope {
                from,
                to,
                target_currency,
                ..TotalsScope::default()
            };
            for row in engine.compute_totals(family.family, &scope).await? {
                println!(
                    "{:<8} parent={} category={} total={} count={}",
                    row.classification.as_str(),
                    display_id(row.parent_category_id),
                    display_id(row.category_id),
                    row.total,
                    row.transactions_count
                );
            }
        }
        Command::Net {
            family,
            transaction,
        } => {
            let offsets = engine
                .total_offset_amount(family.family, transaction)
                .await?;
            let net = engine
                .net_expense_amount(family.family, transaction)
                .await?;
            println!("offsets={offsets} net={net}");
        }
    }
    Ok(())
}

fn print_candidate(candidate: &OffsetCandidate) {
    println!(
        "{} -> {} days={} expense={} offset={}",
        candidate.expense_transaction_id,
        candidate.offset_transaction_id,
        candidate.date_diff_days,
        candidate.expense_amount,
        candidate.offset_amount
    );
}

fn print_link(link: &OffsetLink) {
    println!(
        "{} {} -> {} [{}]{}",
        link.id,
        link.expense_transaction_id,
        link.offset_transaction_id,
        link.status.as_str(),
        link.notes
            .as_deref()
            .map(|notes| format!(" {notes}"))
            .unwrap_or_default()
    );
}

fn display_id(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}
