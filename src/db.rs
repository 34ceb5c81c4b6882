use sqlx::{MySql, MySqlPool, QueryBuilder, mysql::MySqlPoolOptions};

use crate::config::AppConfig;

pub async fn establish_connection(config: &AppConfig) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("Gagal membuat pool database: {:?}", e);
            e
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        log::error!("Gagal menjalankan migrasi: {:?}", e);
        sqlx::Error::from(e)
    })?;

    Ok(pool)
}

/// Creates the bootstrap admin account from ADMIN_EMAIL / ADMIN_PASSWORD if it
/// does not exist yet.
pub async fn ensure_admin(pool: &MySqlPool, config: &AppConfig) -> Result<(), sqlx::Error> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM admin_users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| sqlx::Error::Protocol(format!("bcrypt: {}", e)))?;
    sqlx::query("INSERT INTO admin_users (name, email, password_hash) VALUES (?, ?, ?)")
        .bind(&config.admin_name)
        .bind(email)
        .bind(hash)
        .execute(pool)
        .await?;

    log::info!("Akun admin awal dibuat untuk {}", email);
    Ok(())
}

/// `DELETE FROM <table> WHERE id IN (...)`. Table names come from the
/// controllers' own constants, never from requests.
pub async fn delete_by_ids(
    pool: &MySqlPool,
    table: &'static str,
    ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("DELETE FROM {} WHERE id IN (", table));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    Ok(qb.build().execute(pool).await?.rows_affected())
}

pub async fn count_rows(pool: &MySqlPool, table: &'static str) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// Maps a unique or foreign-key violation to `Some(message)`.
pub fn constraint_message(
    e: &sqlx::Error,
    on_unique: &'static str,
    on_foreign_key: &'static str,
) -> Option<&'static str> {
    let db = e.as_database_error()?;
    if db.is_unique_violation() {
        Some(on_unique)
    } else if db.is_foreign_key_violation() {
        Some(on_foreign_key)
    } else {
        None
    }
}
