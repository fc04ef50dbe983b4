//! Operator CLI for the Tally posting engine.
//!
//! Runs one engine operation against PostgreSQL and prints the result as
//! JSON. Rejections print the error code and exit with status 2; an
//! in-progress posting exits with status 75 so scripts can retry.
//!
//! Usage:
//!   tally-ledger --tenant <ID> --actor <ID> submit <TRANSACTION_SET>
//!   tally-ledger --tenant <ID> --actor <ID> post <TRANSACTION_SET>
//!   tally-ledger --tenant <ID> --actor <ID> reverse <ENTRY> --reason <TEXT>
//!   tally-ledger --tenant <ID> --actor <ID> post-inventory <TRANSACTION_SET>

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use tally_core::{
    InventoryPostingOptions, InventoryPostingResult, PostingEngine, PostingError, PostingResult,
    ReversalResult,
};
use tally_db::{SeaAuditSink, SeaLedgerStore, connect};
use tally_shared::types::{ActorId, JournalEntryId, TenantId, TransactionSetId};
use tally_shared::{AppConfig, ErrorKind, telemetry};

#[derive(Parser)]
#[command(name = "tally-ledger")]
#[command(about = "Post, reverse and inventory-post Tally transaction sets")]
#[command(version)]
struct Cli {
    /// Tenant the operation runs for
    #[arg(long, env = "TALLY_TENANT_ID")]
    tenant: TenantId,

    /// User or system recorded as the actor
    #[arg(long, env = "TALLY_ACTOR_ID")]
    actor: ActorId,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move a draft transaction set to review
    Submit {
        /// Transaction set to submit
        transaction_set: TransactionSetId,
    },

    /// Post the intent of a reviewed transaction set
    Post {
        /// Transaction set to post
        transaction_set: TransactionSetId,
    },

    /// Append a mirror entry for a posted journal entry
    Reverse {
        /// Journal entry to reverse
        journal_entry: JournalEntryId,

        /// Why the entry is reversed
        #[arg(long)]
        reason: String,

        /// Posting date of the reversal (default: today, UTC)
        #[arg(long)]
        posting_date: Option<NaiveDate>,

        /// Memo of the reversal entry
        #[arg(long)]
        memo: Option<String>,
    },

    /// Apply the draft inventory movements of a transaction set
    PostInventory {
        /// Transaction set carrying the movements
        transaction_set: TransactionSetId,

        /// Memo of the cost entry
        #[arg(long)]
        memo: Option<String>,

        /// Inventory asset account code (default: posting.inventory_account_code)
        #[arg(long)]
        inventory_account: Option<String>,

        /// COGS account code (default: posting.cogs_account_code)
        #[arg(long)]
        cogs_account: Option<String>,
    },
}

/// What a successful command prints.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Submitted {
        transaction_set_id: TransactionSetId,
        status: &'static str,
    },
    Posted(PostingResult),
    Reversed(ReversalResult),
    InventoryPosted(InventoryPostingResult),
}

/// Exit status for a rejected operation.
const EXIT_REJECTED: u8 = 2;
/// Exit status for a posting that is already in progress (`EX_TEMPFAIL`).
const EXIT_IN_PROGRESS: u8 = 75;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging).context("Failed to install tracing subscriber")?;

    let db = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let store = Arc::new(SeaLedgerStore::new(db.clone()));
    let engine = PostingEngine::new(
        store.clone(),
        store,
        Arc::new(SeaAuditSink::new(db)),
        config.posting,
    );

    let output = run(&engine, cli.tenant, cli.actor, cli.command).await;
    match output {
        Ok(output) => {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialize result")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report(&err),
    }
}

async fn run(
    engine: &PostingEngine,
    tenant: TenantId,
    actor: ActorId,
    command: Command,
) -> Result<Output, PostingError> {
    let output = match command {
        Command::Submit { transaction_set } => {
            let set = engine
                .submit_for_review(tenant, actor, transaction_set)
                .await?;
            Output::Submitted {
                transaction_set_id: set.id,
                status: set.status.as_str(),
            }
        }
        Command::Post { transaction_set } => {
            Output::Posted(engine.post(tenant, actor, transaction_set).await?)
        }
        Command::Reverse {
            journal_entry,
            reason,
            posting_date,
            memo,
        } => Output::Reversed(
            engine
                .reverse(tenant, actor, journal_entry, &reason, posting_date, memo)
                .await?,
        ),
        Command::PostInventory {
            transaction_set,
            memo,
            inventory_account,
            cogs_account,
        } => {
            let options = InventoryPostingOptions {
                memo,
                inventory_account_code: inventory_account,
                cogs_account_code: cogs_account,
            };
            Output::InventoryPosted(
                engine
                    .post_inventory_movements(tenant, actor, transaction_set, options)
                    .await?,
            )
        }
    };
    Ok(output)
}

fn report(err: &PostingError) -> anyhow::Result<ExitCode> {
    let status = match err.kind() {
        ErrorKind::Concurrency => EXIT_IN_PROGRESS,
        ErrorKind::Precondition | ErrorKind::Integrity => EXIT_REJECTED,
        ErrorKind::Infrastructure => {
            tracing::error!(error = %err, "operation failed");
            return Err(anyhow::anyhow!("{err}"));
        }
    };
    eprintln!("{}: {err}", err.error_code());
    Ok(ExitCode::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_output_is_flat_json() {
        let id = TransactionSetId::new();
        let output = Output::Submitted {
            transaction_set_id: id,
            status: "review",
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "transaction_set_id": id, "status": "review" })
        );
    }

    #[test]
    fn test_cli_parses_reverse() {
        let cli = Cli::try_parse_from([
            "tally-ledger",
            "--tenant",
            "550e8400-e29b-41d4-a716-446655440000",
            "--actor",
            "550e8400-e29b-41d4-a716-446655440001",
            "reverse",
            "550e8400-e29b-41d4-a716-446655440002",
            "--reason",
            "Duplicate invoice",
            "--posting-date",
            "2026-10-14",
        ])
        .unwrap();
        let Command::Reverse {
            reason,
            posting_date,
            ..
        } = cli.command
        else {
            panic!("expected reverse");
        };
        assert_eq!(reason, "Duplicate invoice");
        assert_eq!(posting_date, NaiveDate::from_ymd_opt(2026, 10, 14));
    }
}
