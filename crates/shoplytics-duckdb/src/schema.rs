/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `SHOPLYTICS_DUCKDB_MEMORY`, default `"1GB"`).
///
/// NOTE: no FOREIGN KEY from `track_data.session_id` to `track_sessions`.
/// DuckDB enforces FKs immediately, and merge may move events between
/// sessions and drop the emptied session inside one transaction.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SESSIONS
-- ===========================================
-- One row per (customer, shop, client session token). Created by upsert on
-- the first event of a session; merge rewrites session_token in place.
CREATE SEQUENCE IF NOT EXISTS track_sessions_id_seq START 1;
CREATE TABLE IF NOT EXISTS track_sessions (
    id              BIGINT PRIMARY KEY DEFAULT nextval('track_sessions_id_seq'),
    customer_id     BIGINT NOT NULL,
    shop_id         BIGINT NOT NULL,
    session_token   VARCHAR(32) NOT NULL,
    created_at      TIMESTAMP NOT NULL,
    updated_at      TIMESTAMP NOT NULL,
    UNIQUE (customer_id, shop_id, session_token)
);
CREATE INDEX IF NOT EXISTS idx_track_sessions_token
    ON track_sessions(session_token);

-- ===========================================
-- EVENTS
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS track_data_id_seq START 1;
CREATE TABLE IF NOT EXISTS track_data (
    id              BIGINT PRIMARY KEY DEFAULT nextval('track_data_id_seq'),
    session_id      BIGINT,                        -- track_sessions.id; NULL only for out-of-band rows
    client_uuid     VARCHAR(32) NOT NULL,          -- client-generated, not unique
    url             VARCHAR(255),
    type            INTEGER NOT NULL,              -- code from the event-type table
    payload         VARCHAR,                       -- JSON document; derivation adds duration / view_time
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_track_data_created_at
    ON track_data(created_at);
CREATE INDEX IF NOT EXISTS idx_track_data_session_type
    ON track_data(session_id, type, created_at);

-- ===========================================
-- AGGREGATES (written by the external aggregation pipeline, read-only here)
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS aggregate_id_seq START 1;

CREATE TABLE IF NOT EXISTS registered_customers (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    duration        DOUBLE,                        -- seconds between sign and register
    with_autofill   BOOLEAN NOT NULL DEFAULT false,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_registered_customers_shop
    ON registered_customers(shop_id, created_at);

-- type = popup_show | popup_click code; data_count = impressions in the row
CREATE TABLE IF NOT EXISTS popup_data (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    type            INTEGER NOT NULL,
    data_count      BIGINT NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_popup_data_shop
    ON popup_data(shop_id, type, created_at);

-- one row per popup-attributed order line
CREATE TABLE IF NOT EXISTS popup_revenue (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    article_id      VARCHAR,
    quantity        BIGINT NOT NULL DEFAULT 0,
    amount          DOUBLE NOT NULL DEFAULT 0,
    title           VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_popup_revenue_shop
    ON popup_revenue(shop_id, created_at);

-- type = recommendation_show | recommendation_click code
CREATE TABLE IF NOT EXISTS recommendation_data (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    type            INTEGER NOT NULL,
    data_count      BIGINT NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_recommendation_data_shop
    ON recommendation_data(shop_id, type, created_at);

CREATE TABLE IF NOT EXISTS recommendation_revenue (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    article_id      VARCHAR,
    quantity        BIGINT NOT NULL DEFAULT 0,
    amount          DOUBLE NOT NULL DEFAULT 0,
    title           VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_recommendation_revenue_shop
    ON recommendation_revenue(shop_id, created_at);

-- shop orders and their line items; source of purchase counts and item titles
CREATE TABLE IF NOT EXISTS transactions (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    shop_id         BIGINT NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_transactions_shop
    ON transactions(shop_id, created_at);

CREATE TABLE IF NOT EXISTS transaction_items (
    id              BIGINT PRIMARY KEY DEFAULT nextval('aggregate_id_seq'),
    transaction_id  BIGINT NOT NULL,
    article_id      VARCHAR NOT NULL,
    title           VARCHAR,
    number          VARCHAR,                       -- shop article number; orders title lookup
    quantity        BIGINT NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_transaction_items_article
    ON transaction_items(article_id, transaction_id);
"#
    )
}

/// Migrations tracking table SQL.
///
/// Run before the init SQL. Tracks which numbered migrations have been
/// applied so restarts don't re-run them.
pub const MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    id          VARCHAR PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
