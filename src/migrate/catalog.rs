//! The fixed, ordered list of schema changes.
//!
//! Order in this slice is the application order; names are the identity
//! recorded in the ledger. Never reorder or rename an entry that has
//! shipped; append new migrations at the end.

pub(crate) struct Migration {
    pub(crate) name: &'static str,
    pub(crate) up: &'static str,
    pub(crate) down: &'static str,
}

pub(crate) const CATALOG: &[Migration] = &[
    Migration {
        name: "0001_create_users",
        up: r"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                tier TEXT NOT NULL DEFAULT 'free',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        ",
        down: "DROP TABLE IF EXISTS users",
    },
    Migration {
        name: "0002_create_api_keys",
        up: r"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users (id),
                key_hash BYTEA NOT NULL UNIQUE,
                name TEXT NOT NULL,
                permissions JSONB NOT NULL DEFAULT '[]'::jsonb,
                rate_limit JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ,
                last_used_at TIMESTAMPTZ
            )
        ",
        down: "DROP TABLE IF EXISTS api_keys",
    },
    Migration {
        name: "0003_index_api_keys_user_id",
        up: "CREATE INDEX IF NOT EXISTS api_keys_user_id_idx ON api_keys (user_id)",
        down: "DROP INDEX IF EXISTS api_keys_user_id_idx",
    },
];

pub(crate) fn find(name: &str) -> Option<&'static Migration> {
    CATALOG.iter().find(|migration| migration.name == name)
}
