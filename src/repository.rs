// repository.rs
use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::{
    db,
    models::submission::{NewSubmission, Submission},
};

pub const SUBMISSIONS_TABLE: &str = "pik_r_submissions";

const SUBMISSION_COLUMNS: &str = "id, nama, ttl, asal_pikr, alamat_lengkap, tlpn, email, \
     jabatan_pikr, bukti_ss, submitted_at";

/// Persistence for registration forms, the one table written by the public.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, new: NewSubmission) -> Result<Submission, sqlx::Error>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Submission>, sqlx::Error>;

    async fn delete_many(&self, ids: &[i64]) -> Result<u64, sqlx::Error>;

    async fn count(&self) -> Result<i64, sqlx::Error>;
}

pub struct MySqlSubmissionStore {
    pool: MySqlPool,
}

impl MySqlSubmissionStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for MySqlSubmissionStore {
    async fn insert(&self, new: NewSubmission) -> Result<Submission, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO pik_r_submissions \
             (nama, ttl, asal_pikr, alamat_lengkap, tlpn, email, jabatan_pikr, bukti_ss) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.nama)
        .bind(&new.ttl)
        .bind(&new.asal_pikr)
        .bind(&new.alamat_lengkap)
        .bind(&new.tlpn)
        .bind(&new.email)
        .bind(&new.jabatan_pikr)
        .bind(&new.bukti_ss)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id() as i64;
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {} FROM pik_r_submissions WHERE id = ?",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list(&self) -> Result<Vec<Submission>, sqlx::Error> {
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {} FROM pik_r_submissions ORDER BY submitted_at DESC, id DESC",
            SUBMISSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
        db::delete_by_ids(&self.pool, SUBMISSIONS_TABLE, ids).await
    }

    async fn count(&self) -> Result<i64, sqlx::Error> {
        db::count_rows(&self.pool, SUBMISSIONS_TABLE).await
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    /// Vec-backed store for handler tests; `failing()` makes every call error.
    #[derive(Default)]
    pub struct MemoryStore {
        rows: Mutex<Vec<Submission>>,
        fail: bool,
    }

    impl MemoryStore {
        pub fn failing() -> Self {
            Self {
                rows: Mutex::default(),
                fail: true,
            }
        }

        pub fn rows(&self) -> Vec<Submission> {
            self.rows.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), sqlx::Error> {
            if self.fail {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SubmissionStore for MemoryStore {
        async fn insert(&self, new: NewSubmission) -> Result<Submission, sqlx::Error> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let row = Submission {
                id: rows.len() as i64 + 1,
                nama: new.nama,
                ttl: new.ttl,
                asal_pikr: new.asal_pikr,
                alamat_lengkap: new.alamat_lengkap,
                tlpn: new.tlpn,
                email: new.email,
                jabatan_pikr: new.jabatan_pikr,
                bukti_ss: new.bukti_ss,
                submitted_at: Utc::now(),
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn list(&self) -> Result<Vec<Submission>, sqlx::Error> {
            self.check()?;
            let mut rows = self.rows();
            rows.reverse();
            Ok(rows)
        }

        async fn delete_many(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| !ids.contains(&r.id));
            Ok((before - rows.len()) as u64)
        }

        async fn count(&self) -> Result<i64, sqlx::Error> {
            self.check()?;
            Ok(self.rows.lock().unwrap().len() as i64)
        }
    }
}
