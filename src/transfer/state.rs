//! Ledger Entry Status
//!
//! Status IDs are persisted as SMALLINT in `transactions_tb.status`.

use std::fmt;
use std::str::FromStr;

/// Ledger entry status
///
/// ```text
/// PENDING ──► COMPLETED
///    │
///    ├──────► FAILED
///    └──────► CANCELLED
/// ```
///
/// Terminal states: COMPLETED (40), FAILED (-10), CANCELLED (-20).
/// A terminal entry is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransactionStatus {
    /// Entry written inside the unit of work, balances not yet final
    Pending = 0,

    /// Terminal: balances mutated and committed
    Completed = 40,

    /// Terminal: unit of work rolled back after an internal failure (audit only)
    Failed = -10,

    /// Terminal: rejected before any balance mutation (audit only)
    Cancelled = -20,
}

impl TransactionStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Status transitions are monotonic: only `Pending` may move, and only
    /// into a terminal state.
    #[inline]
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(self, TransactionStatus::Pending) && next.is_terminal()
    }

    /// Get the numeric status ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL status ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            40 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            -20 => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(value).ok_or(())
    }
}
