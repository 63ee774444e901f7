//! # Ledger Commands
//!
//! Command-line surface of the node: one command per invocation.

use clap::{Parser, Subcommand};
use fl_01_ledger_chain::{AccountId, SequenceNumber};

/// FarmLink ledger node
#[derive(Parser, Debug)]
#[command(name = "fl-node")]
#[command(about = "Run one command against the FarmLink ledger in FL_DATA_DIR")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// A single ledger command.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record a transfer between two accounts (account 0 is the system account)
    Record {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
        #[arg(value_parser = parse_account)]
        from: AccountId,
        #[arg(value_parser = parse_account)]
        to: AccountId,
        /// Amount in minor units
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(default_value = "")]
        description: String,
        /// JSON metadata
        #[arg(default_value = "{}")]
        metadata: String,
    },
    /// Reverse a recorded transaction with a compensating entry
    Reverse {
        #[arg(value_name = "ORIGINAL_TX_ID")]
        original_transaction_id: String,
        #[arg(value_name = "REVERSAL_TX_ID")]
        reversal_transaction_id: String,
        #[arg(default_value = "")]
        reason: String,
    },
    /// Attach an external settlement reference to a transaction
    Reference {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
        #[arg(value_name = "EXTERNAL_REFERENCE")]
        reference: String,
    },
    /// Net balance of an account
    Balance {
        #[arg(value_parser = parse_account)]
        account: AccountId,
    },
    /// Entries touching an account, oldest first
    History {
        #[arg(value_parser = parse_account)]
        account: AccountId,
    },
    /// Verify the chain between two sequence numbers, stopping at the first violation
    Verify {
        #[arg(value_name = "FROM_SEQ")]
        from: Option<SequenceNumber>,
        #[arg(value_name = "TO_SEQ")]
        to: Option<SequenceNumber>,
    },
    /// Verify the whole chain and report every violation (Ctrl+C cancels)
    VerifyFull,
    /// Show the latest entry
    Tip,
}

fn parse_account(raw: &str) -> Result<AccountId, String> {
    raw.parse::<u64>()
        .map(AccountId)
        .map_err(|e| format!("{raw:?} is not an account number: {e}"))
}
