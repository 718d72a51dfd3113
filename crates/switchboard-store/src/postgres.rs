//! PostgreSQL-backed `StoreGateway` against the schema:
//! `extensions`, `fork_ranks`, `fork_rank_members`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use switchboard_types::{
    Extension, ExtensionKind, ForkRank, ForwardingMode, MemberKind, PresentationAttributes,
    RankMember, RankMode,
};

use crate::error::StoreError;
use crate::gateway::StoreGateway;

#[derive(Debug, FromRow)]
struct ExtensionRow {
    id: i64,
    number: String,
    name: Option<String>,
    short_name: Option<String>,
    // Historical column name in the schema; holds the home telephone server id.
    yate_id: Option<i64>,
    outgoing_extension: Option<String>,
    outgoing_name: Option<String>,
    dialout_allowed: Option<bool>,
    ringback: Option<bool>,
    forwarding_delay: Option<i32>,
    forwarding_extension_id: Option<i64>,
    lang: Option<String>,
    #[sqlx(rename = "type")]
    kind: String,
    forwarding_mode: String,
}

impl ExtensionRow {
    fn into_extension(self) -> Option<Extension> {
        let kind = ExtensionKind::from_db_str(&self.kind)?;
        let forwarding_mode = ForwardingMode::from_db_str(&self.forwarding_mode)?;
        Some(Extension {
            id: self.id,
            number: self.number,
            home_server_id: self.yate_id,
            kind,
            forwarding_mode,
            forward_target_id: self.forwarding_extension_id,
            forwarding_delay: self.forwarding_delay,
            presentation: PresentationAttributes {
                display_name: self.name,
                short_name: self.short_name,
                outgoing_number: self.outgoing_extension,
                outgoing_name: self.outgoing_name,
                dialout_allowed: self.dialout_allowed.unwrap_or(false),
                ringback: self.ringback.unwrap_or(false),
                lang: self.lang,
            },
        })
    }
}

#[derive(Debug, FromRow)]
struct ForkRankRow {
    id: i64,
    extension_id: i64,
    index: i32,
    delay: Option<i32>,
    mode: String,
}

#[derive(Debug, FromRow)]
struct ForkRankMemberRow {
    fork_rank_id: i64,
    extension_id: i64,
    active: bool,
    #[sqlx(rename = "type")]
    kind: String,
}

/// Read-only loader for extension, fork-rank, and membership records.
#[derive(Clone)]
pub struct PostgresStoreGateway {
    pool: PgPool,
}

impl PostgresStoreGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreGateway for PostgresStoreGateway {
    async fn load_extension_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Extension>, StoreError> {
        let row = sqlx::query_as::<_, ExtensionRow>(
            r#"SELECT id, number, name, short_name, yate_id, outgoing_extension,
                      outgoing_name, dialout_allowed, ringback, forwarding_delay,
                      forwarding_extension_id, lang, type, forwarding_mode
               FROM extensions WHERE number = $1"#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(ExtensionRow::into_extension))
    }

    async fn load_extension_by_id(&self, id: i64) -> Result<Option<Extension>, StoreError> {
        let row = sqlx::query_as::<_, ExtensionRow>(
            r#"SELECT id, number, name, short_name, yate_id, outgoing_extension,
                      outgoing_name, dialout_allowed, ringback, forwarding_delay,
                      forwarding_extension_id, lang, type, forwarding_mode
               FROM extensions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(ExtensionRow::into_extension))
    }

    async fn load_fork_ranks_for(&self, extension_id: i64) -> Result<Vec<ForkRank>, StoreError> {
        let rank_rows = sqlx::query_as::<_, ForkRankRow>(
            r#"SELECT id, extension_id, index, delay, mode
               FROM fork_ranks WHERE extension_id = $1 ORDER BY index ASC"#,
        )
        .bind(extension_id)
        .fetch_all(&self.pool)
        .await?;

        if rank_rows.is_empty() {
            return Ok(Vec::new());
        }

        let rank_ids: Vec<i64> = rank_rows.iter().map(|r| r.id).collect();
        let member_rows = sqlx::query_as::<_, ForkRankMemberRow>(
            r#"SELECT fork_rank_id, extension_id, active, type
               FROM fork_rank_members WHERE fork_rank_id = ANY($1) ORDER BY id ASC"#,
        )
        .bind(&rank_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut members_by_rank: HashMap<i64, Vec<RankMember>> = HashMap::new();
        for row in member_rows {
            let Some(kind) = MemberKind::from_db_str(&row.kind) else {
                tracing::warn!(fork_rank_id = row.fork_rank_id, kind = %row.kind, "unknown member kind, skipping");
                continue;
            };
            members_by_rank
                .entry(row.fork_rank_id)
                .or_default()
                .push(RankMember {
                    target_extension_id: row.extension_id,
                    active: row.active,
                    kind,
                });
        }

        let mut ranks = Vec::with_capacity(rank_rows.len());
        for row in rank_rows {
            let Some(mode) = RankMode::from_db_str(&row.mode) else {
                tracing::warn!(fork_rank_id = row.id, mode = %row.mode, "unknown rank mode, skipping rank");
                continue;
            };
            ranks.push(ForkRank {
                id: row.id,
                extension_id: row.extension_id,
                index: row.index,
                delay: row.delay,
                mode,
                members: members_by_rank.remove(&row.id).unwrap_or_default(),
            });
        }

        Ok(ranks)
    }
}
