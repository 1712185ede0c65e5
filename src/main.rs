use std::path::PathBuf;

use anyhow::Context;
use attendance_discipline::models::{AttendanceEvent, EventRecord, TraineeSummary};
use attendance_discipline::scoring::{self, NoteFormula};
use attendance_discipline::{db, report};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "attendance-discipline")]
#[command(about = "Absence hours, disciplinary status and notes for trainees", long_about = None)]
struct Cli {
    /// Postgres connection string, required by every command except `evaluate`
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    /// Disciplinary note formula
    #[arg(long, value_enum, global = true, default_value_t = FormulaArg::Graduated)]
    note_formula: FormulaArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormulaArg {
    /// Half a point per full 2.5 hours
    Graduated,
    /// One point per full 5 hours
    Points,
}

impl From<FormulaArg> for NoteFormula {
    fn from(arg: FormulaArg) -> Self {
        match arg {
            FormulaArg::Graduated => NoteFormula::Graduated,
            FormulaArg::Points => NoteFormula::Points,
        }
    }
}

#[derive(Debug, Args)]
#[group(required = false, multiple = false)]
struct Scope {
    /// Restrict to one class group
    #[arg(long)]
    group: Option<String>,
    /// Restrict to one trainee
    #[arg(long)]
    email: Option<String>,
}

impl Scope {
    fn label(&self) -> Option<&str> {
        self.group.as_deref().or(self.email.as_deref())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score a JSON array of attendance events without a database
    Evaluate {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        json: bool,
    },
    #[command(flatten)]
    Database(DatabaseCommand),
}

#[derive(Debug, Subcommand)]
enum DatabaseCommand {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Confirm an attendance event so it counts (supervisor action)
    Validate {
        #[arg(long)]
        source_key: String,
        #[arg(long)]
        revoke: bool,
    },
    /// Mark an absence as justified (supervisor action)
    Justify {
        #[arg(long)]
        source_key: String,
        #[arg(long)]
        revoke: bool,
    },
    /// Print per-trainee totals, status and note
    Summary {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
    /// Export per-trainee summaries as CSV
    Export {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long, default_value = "attendance-summary.csv")]
        out: PathBuf,
    },
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url = database_url
        .context("DATABASE_URL must be set (or pass --database-url) for this command")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    info!("connected to Postgres");
    Ok(pool)
}

async fn load_summaries(
    pool: &PgPool,
    scope: &Scope,
    since_days: Option<i64>,
    formula: NoteFormula,
) -> anyhow::Result<(Option<NaiveDate>, Vec<EventRecord>, Vec<TraineeSummary>)> {
    let since = since_days.map(scoring::cutoff_date);
    let records =
        db::fetch_events(pool, since, scope.group.as_deref(), scope.email.as_deref()).await?;
    let summaries = scoring::summarize_trainees(&records, formula);
    Ok((since, records, summaries))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let formula = NoteFormula::from(cli.note_formula);

    match cli.command {
        Commands::Evaluate { events, json } => evaluate(&events, json, formula),
        Commands::Database(command) => {
            let pool = connect(cli.database_url.as_deref()).await?;
            run(command, &pool, formula).await
        }
    }
}

fn evaluate(path: &std::path::Path, json: bool, formula: NoteFormula) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let events: Vec<AttendanceEvent> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of events", path.display()))?;
    let result = scoring::aggregate(&events, formula);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Total absence hours: {:.1}", result.total_absence_hours);
        println!(
            "Disciplinary status: {} ({})",
            result.disciplinary_status.text, result.disciplinary_status.color
        );
        println!("Disciplinary note: {:.1}/20", result.disciplinary_note);
    }
    Ok(())
}

async fn run(command: DatabaseCommand, pool: &PgPool, formula: NoteFormula) -> anyhow::Result<()> {
    match command {
        DatabaseCommand::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        DatabaseCommand::Seed => {
            let inserted = db::seed(pool).await?;
            println!("Seed data inserted ({inserted} new events).");
        }
        DatabaseCommand::Import { csv } => {
            let inserted = db::import_csv(pool, &csv).await?;
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        DatabaseCommand::Validate { source_key, revoke } => {
            db::set_validated(pool, &source_key, !revoke).await?;
            println!("Event {source_key} validated: {}.", !revoke);
        }
        DatabaseCommand::Justify { source_key, revoke } => {
            db::set_justified(pool, &source_key, !revoke).await?;
            println!("Event {source_key} justified: {}.", !revoke);
        }
        DatabaseCommand::Summary {
            scope,
            since_days,
            limit,
            json,
        } => {
            let (_, _, summaries) = load_summaries(pool, &scope, since_days, formula).await?;
            let shown = &summaries[..summaries.len().min(limit)];

            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
                return Ok(());
            }

            if summaries.is_empty() {
                println!("No attendance events found for this window.");
                return Ok(());
            }

            println!("Trainees by chargeable absence hours:");
            for summary in shown {
                println!(
                    "- {} ({}, {}) {:.1} h, {} lates, {} [{}], note {:.1}/20",
                    summary.trainee_name,
                    summary.trainee_email,
                    summary.group_name,
                    summary.result.total_absence_hours,
                    summary.late_count,
                    summary.result.disciplinary_status.text,
                    summary.result.disciplinary_status.color,
                    summary.result.disciplinary_note
                );
            }
        }
        DatabaseCommand::Report {
            scope,
            since_days,
            out,
        } => {
            let (since, records, summaries) =
                load_summaries(pool, &scope, since_days, formula).await?;
            let report = report::build_report(scope.label(), since, &summaries, &records);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), trainees = summaries.len(), "report written");
            println!("Report written to {}.", out.display());
        }
        DatabaseCommand::Export {
            scope,
            since_days,
            out,
        } => {
            let (_, _, summaries) = load_summaries(pool, &scope, since_days, formula).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_summary_csv(file, &summaries)?;
            println!("Exported {} trainees to {}.", summaries.len(), out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn evaluate_parses_outside_database_commands() {
        let cli = Cli::try_parse_from([
            "attendance-discipline",
            "--note-formula",
            "points",
            "evaluate",
            "--events",
            "demos/events.json",
        ])
        .unwrap();

        assert_eq!(NoteFormula::from(cli.note_formula), NoteFormula::Points);
        assert!(matches!(cli.command, Commands::Evaluate { json: false, .. }));
    }

    #[test]
    fn database_commands_keep_their_own_enum() {
        let cli = Cli::try_parse_from([
            "attendance-discipline",
            "summary",
            "--group",
            "TDI-101",
            "--limit",
            "5",
        ])
        .unwrap();

        assert_eq!(NoteFormula::from(cli.note_formula), NoteFormula::Graduated);
        match cli.command {
            Commands::Database(DatabaseCommand::Summary { scope, limit, .. }) => {
                assert_eq!(scope.label(), Some("TDI-101"));
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn group_and_email_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "attendance-discipline",
            "report",
            "--group",
            "TDI-101",
            "--email",
            "omar.benali@ofppt-demo.ma",
        ]);
        assert!(parsed.is_err());
    }
}
