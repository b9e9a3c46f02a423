use anyhow::Result;
use sqlx::PgPool;

/// Create ledger tables and indexes if they do not exist
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing ledger schema...");

    for (name, ddl) in [
        ("accounts_tb", CREATE_ACCOUNTS_TABLE),
        ("transactions_tb", CREATE_TRANSACTIONS_TABLE),
        ("idx_transactions_from", CREATE_FROM_INDEX),
        ("idx_transactions_to", CREATE_TO_INDEX),
        ("idx_accounts_owner", CREATE_OWNER_INDEX),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}

/// Accounts
///
/// `version` is bumped on every balance or status change.
/// `retired_at IS NOT NULL` marks a soft-deleted account.
pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts_tb (
    id              BIGSERIAL PRIMARY KEY,
    owner_id        BIGINT        NOT NULL,
    account_number  VARCHAR(10)   NOT NULL UNIQUE,
    account_type    SMALLINT      NOT NULL,         -- 1=checking, 2=savings, 3=credit
    currency        CHAR(3)       NOT NULL DEFAULT 'USD',
    balance         NUMERIC(28,8) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    is_active       BOOLEAN       NOT NULL DEFAULT TRUE,
    version         BIGINT        NOT NULL DEFAULT 0,
    retired_at      TIMESTAMPTZ,
    created_at      TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ   NOT NULL DEFAULT NOW()
)
"#;

/// Ledger entries
///
/// Idempotency keys are unique per source account; NULL keys never conflict.
pub const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions_tb (
    id                BIGSERIAL PRIMARY KEY,
    from_account_id   BIGINT        NOT NULL REFERENCES accounts_tb(id),
    to_account_id     BIGINT        REFERENCES accounts_tb(id),
    amount            NUMERIC(28,8) NOT NULL CHECK (amount > 0),
    transaction_type  SMALLINT      NOT NULL,       -- 1=debit, 2=credit, 3=transfer
    status            SMALLINT      NOT NULL,       -- 0=pending, 40=completed, -10=failed, -20=cancelled
    description       TEXT          NOT NULL DEFAULT '',
    reference         VARCHAR(64)   NOT NULL UNIQUE,
    idempotency_key   VARCHAR(64),
    balance_before    NUMERIC(28,8) NOT NULL,
    balance_after     NUMERIC(28,8) NOT NULL,
    created_at        TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
    UNIQUE (from_account_id, idempotency_key)
)
"#;

const CREATE_FROM_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transactions_from \
     ON transactions_tb (from_account_id, created_at DESC)";

const CREATE_TO_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transactions_to \
     ON transactions_tb (to_account_id, created_at DESC)";

const CREATE_OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts_tb (owner_id)";
