use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::AppError,
    export::{Cell, Table},
    utils::{any_contains, check_contact, non_empty, normalize_query},
};

pub const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub nama: String,
    pub ttl: Option<String>,
    pub asal_pikr: String,
    pub alamat_lengkap: String,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub jabatan_pikr: String,
    pub bukti_ss: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Registration form as posted; every field may be missing or blank.
#[derive(Debug, Default, Deserialize)]
pub struct SubmissionPayload {
    pub nama: Option<String>,
    pub ttl: Option<String>,
    pub asal_pikr: Option<String>,
    pub alamat_lengkap: Option<String>,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub jabatan_pikr: Option<String>,
    pub bukti_ss: Option<String>,
}

/// Validated row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub nama: String,
    pub ttl: Option<String>,
    pub asal_pikr: String,
    pub alamat_lengkap: String,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub jabatan_pikr: String,
    pub bukti_ss: Option<String>,
}

impl SubmissionPayload {
    /// Sets a form field by name; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "nama" => &mut self.nama,
            "ttl" => &mut self.ttl,
            "asal_pikr" => &mut self.asal_pikr,
            "alamat_lengkap" => &mut self.alamat_lengkap,
            "tlpn" => &mut self.tlpn,
            "email" => &mut self.email,
            "jabatan_pikr" => &mut self.jabatan_pikr,
            _ => return,
        };
        *slot = Some(value);
    }

    pub fn into_new(self) -> Result<NewSubmission, AppError> {
        let (Some(nama), Some(asal_pikr), Some(alamat_lengkap), Some(jabatan_pikr)) = (
            non_empty(self.nama),
            non_empty(self.asal_pikr),
            non_empty(self.alamat_lengkap),
            non_empty(self.jabatan_pikr),
        ) else {
            return Err(AppError::validation(MISSING_FIELDS));
        };

        let email = non_empty(self.email);
        let tlpn = non_empty(self.tlpn);
        let tlpn = check_contact(email.as_deref(), tlpn.as_deref()).map_err(AppError::validation)?;

        Ok(NewSubmission {
            nama,
            ttl: non_empty(self.ttl),
            asal_pikr,
            alamat_lengkap,
            tlpn,
            email,
            jabatan_pikr,
            bukti_ss: non_empty(self.bukti_ss),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionQuery {
    pub q: Option<String>,
    pub format: Option<String>,
}

/// Search over the text columns and the `d/m/yyyy` submission date.
pub fn filter_submissions(rows: Vec<Submission>, q: Option<&str>) -> Vec<Submission> {
    let Some(q) = normalize_query(q) else {
        return rows;
    };

    rows.into_iter()
        .filter(|s| {
            let date = s.submitted_at.format("%-d/%-m/%Y").to_string();
            any_contains(
                [
                    Some(s.nama.as_str()),
                    s.email.as_deref(),
                    Some(s.asal_pikr.as_str()),
                    s.tlpn.as_deref(),
                    Some(s.jabatan_pikr.as_str()),
                    Some(s.alamat_lengkap.as_str()),
                    Some(date.as_str()),
                ],
                &q,
            )
        })
        .collect()
}

pub fn submissions_table(rows: &[Submission]) -> Table {
    Table::new(
        "Pendaftar",
        &[
            "ID",
            "Nama Lengkap",
            "Tanggal Lahir",
            "Asal PIK-R",
            "Alamat Lengkap",
            "No. Telepon",
            "Email",
            "Jabatan di PIK-R",
            "URL Bukti SS",
            "Waktu Pendaftaran",
        ],
        rows.iter()
            .map(|s| {
                vec![
                    Cell::Number(s.id as f64),
                    Cell::text(&s.nama),
                    Cell::opt(s.ttl.as_deref()),
                    Cell::text(&s.asal_pikr),
                    Cell::text(&s.alamat_lengkap),
                    Cell::opt(s.tlpn.as_deref()),
                    Cell::opt(s.email.as_deref()),
                    Cell::text(&s.jabatan_pikr),
                    Cell::opt(s.bukti_ss.as_deref()),
                    Cell::Text(s.submitted_at.format("%-d/%-m/%Y %H.%M.%S").to_string()),
                ]
            })
            .collect(),
    )
    .highlighted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            nama: Some("Siti Aminah".into()),
            ttl: Some("".into()),
            asal_pikr: Some("PIK-R Harapan".into()),
            alamat_lengkap: Some("Jl. Merdeka 1".into()),
            tlpn: Some("0812-3456-7890".into()),
            email: Some(" ".into()),
            jabatan_pikr: Some("Ketua".into()),
            bukti_ss: None,
        }
    }

    fn row(id: i64, nama: &str, day: u32) -> Submission {
        Submission {
            id,
            nama: nama.into(),
            ttl: None,
            asal_pikr: "PIK-R Harapan".into(),
            alamat_lengkap: "Jl. Merdeka".into(),
            tlpn: None,
            email: Some(format!("{}@mail.id", id)),
            jabatan_pikr: "Anggota".into(),
            bukti_ss: None,
            submitted_at: Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn blanks_become_null_and_phone_is_canonical() {
        let new = payload().into_new().unwrap();
        assert_eq!(new.ttl, None);
        assert_eq!(new.email, None);
        assert_eq!(new.tlpn.as_deref(), Some("+6281234567890"));
        assert_eq!(new.bukti_ss, None);
    }

    #[test]
    fn each_required_field_is_enforced() {
        for field in ["nama", "asal_pikr", "alamat_lengkap", "jabatan_pikr"] {
            let mut p = payload();
            p.set(field, "   ".into());
            let err = p.into_new().unwrap_err();
            assert_eq!(err.to_string(), MISSING_FIELDS, "{field}");
        }
        let mut p = payload();
        p.nama = None;
        assert!(p.into_new().is_err());
    }

    #[test]
    fn malformed_contact_is_rejected() {
        let mut p = payload();
        p.email = Some("a@b".into());
        assert_eq!(
            p.into_new().unwrap_err().to_string(),
            "Format email tidak valid"
        );

        let mut p = payload();
        p.tlpn = Some("1234".into());
        assert_eq!(
            p.into_new().unwrap_err().to_string(),
            "Format nomor telepon tidak valid"
        );
    }

    #[test]
    fn search_matches_text_and_date() {
        let rows = vec![row(1, "Budi", 5), row(2, "Ani", 17)];
        let hits = filter_submissions(rows.clone(), Some("budi"));
        assert_eq!(hits.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);

        let hits = filter_submissions(rows.clone(), Some("17/3/2025"));
        assert_eq!(hits.iter().map(|s| s.id).collect::<Vec<_>>(), vec![2]);

        assert_eq!(filter_submissions(rows, None).len(), 2);
    }
}
