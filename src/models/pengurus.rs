use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, mysql::MySqlRow};

use crate::{
    error::AppError,
    export::{Cell, Table},
    utils::{any_contains, check_contact, non_empty, normalize_query},
};

/// Members without a position sort after every real one.
pub const UNRANKED: i32 = 999;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct StrukturJabatan {
    pub id: i64,
    pub nama_jabatan: String,
    pub urutan: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Administrator,
    Member,
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::Administrator => "administrator",
            RoleType::Member => "member",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "administrator" => Some(RoleType::Administrator),
            "member" => Some(RoleType::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pengurus {
    pub id: i64,
    pub nama: String,
    pub ttl: Option<String>,
    pub jabatan_pengurus: Option<String>,
    pub asal_pikr: Option<String>,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub jabatan_id: i64,
    pub periode: String,
    pub role_type: Option<RoleType>,
    pub struktur_jabatan: Option<StrukturJabatan>,
}

/// Select list matching the manual [`FromRow`] below.
pub const PENGURUS_SELECT: &str = "SELECT p.id, p.nama, p.ttl, p.jabatan_pengurus, p.asal_pikr, \
     p.tlpn, p.email, p.instagram, p.image_url, p.jabatan_id, p.periode, p.role_type, \
     sj.id AS sj_id, sj.nama_jabatan AS sj_nama_jabatan, sj.urutan AS sj_urutan \
     FROM pengurus p LEFT JOIN struktur_jabatan sj ON sj.id = p.jabatan_id";

impl<'r> FromRow<'r, MySqlRow> for Pengurus {
    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let role_type = match row.try_get::<Option<String>, _>("role_type")? {
            Some(raw) => Some(RoleType::parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "role_type".into(),
                source: format!("role_type tidak dikenal: {}", raw).into(),
            })?),
            None => None,
        };

        let struktur_jabatan = match row.try_get::<Option<i64>, _>("sj_id")? {
            Some(id) => Some(StrukturJabatan {
                id,
                nama_jabatan: row.try_get("sj_nama_jabatan")?,
                urutan: row.try_get("sj_urutan")?,
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            nama: row.try_get("nama")?,
            ttl: row.try_get("ttl")?,
            jabatan_pengurus: row.try_get("jabatan_pengurus")?,
            asal_pikr: row.try_get("asal_pikr")?,
            tlpn: row.try_get("tlpn")?,
            email: row.try_get("email")?,
            instagram: row.try_get("instagram")?,
            image_url: row.try_get("image_url")?,
            jabatan_id: row.try_get("jabatan_id")?,
            periode: row.try_get("periode")?,
            role_type,
            struktur_jabatan,
        })
    }
}

impl Pengurus {
    fn urutan(&self) -> i32 {
        self.struktur_jabatan
            .as_ref()
            .map(|j| j.urutan)
            .unwrap_or(UNRANKED)
    }

    fn nama_jabatan(&self) -> Option<&str> {
        self.struktur_jabatan
            .as_ref()
            .map(|j| j.nama_jabatan.as_str())
    }

    fn effective_role(&self) -> RoleType {
        self.role_type.unwrap_or(RoleType::Administrator)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PengurusPayload {
    pub nama: Option<String>,
    pub ttl: Option<String>,
    pub jabatan_pengurus: Option<String>,
    pub asal_pikr: Option<String>,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub jabatan_id: Option<i64>,
    pub periode: Option<String>,
    pub role_type: Option<RoleType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PengurusInput {
    pub nama: String,
    pub ttl: Option<String>,
    pub jabatan_pengurus: Option<String>,
    pub asal_pikr: Option<String>,
    pub tlpn: Option<String>,
    pub email: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub jabatan_id: i64,
    pub periode: String,
    pub role_type: RoleType,
}

impl PengurusPayload {
    pub fn validate(self) -> Result<PengurusInput, AppError> {
        let (Some(nama), Some(jabatan_id), Some(periode)) =
            (non_empty(self.nama), self.jabatan_id, non_empty(self.periode))
        else {
            return Err(AppError::validation(
                "Nama, Jabatan, dan Periode wajib diisi.",
            ));
        };

        let email = non_empty(self.email);
        let tlpn = non_empty(self.tlpn);
        let tlpn = check_contact(email.as_deref(), tlpn.as_deref()).map_err(AppError::validation)?;

        Ok(PengurusInput {
            nama,
            ttl: non_empty(self.ttl),
            jabatan_pengurus: non_empty(self.jabatan_pengurus),
            asal_pikr: non_empty(self.asal_pikr),
            tlpn,
            email,
            instagram: non_empty(self.instagram),
            image_url: non_empty(self.image_url),
            jabatan_id,
            periode,
            role_type: self.role_type.unwrap_or(RoleType::Administrator),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StrukturJabatanPayload {
    pub nama_jabatan: Option<String>,
    pub urutan: Option<i32>,
}

impl StrukturJabatanPayload {
    pub fn validate(self) -> Result<(String, i32), AppError> {
        match (non_empty(self.nama_jabatan), self.urutan) {
            (Some(nama), Some(urutan)) => Ok((nama, urutan)),
            _ => Err(AppError::validation(
                "Nama Jabatan dan Urutan wajib diisi.",
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PengurusQuery {
    pub periode: Option<String>,
    pub role_type: Option<RoleType>,
    pub q: Option<String>,
    pub format: Option<String>,
}

/// Admin table filter; rows are expected newest periode first.
pub fn filter_pengurus(rows: Vec<Pengurus>, query: &PengurusQuery) -> Vec<Pengurus> {
    let periode = query.periode.as_deref().filter(|p| !p.is_empty());
    let q = normalize_query(query.q.as_deref());

    rows.into_iter()
        .filter(|p| periode.is_none_or(|periode| p.periode == periode))
        .filter(|p| query.role_type.is_none_or(|role| p.effective_role() == role))
        .filter(|p| {
            q.as_deref().is_none_or(|q| {
                any_contains(
                    [
                        Some(p.nama.as_str()),
                        p.email.as_deref(),
                        Some(p.periode.as_str()),
                        p.nama_jabatan(),
                    ],
                    q,
                )
            })
        })
        .collect()
}

pub fn filter_jabatan(rows: Vec<StrukturJabatan>, q: Option<&str>) -> Vec<StrukturJabatan> {
    match normalize_query(q) {
        Some(q) => rows
            .into_iter()
            .filter(|j| j.nama_jabatan.to_lowercase().contains(&q))
            .collect(),
        None => rows,
    }
}

/// Distinct periodes, newest first.
pub fn periodes(rows: &[Pengurus]) -> Vec<String> {
    let set: BTreeSet<&str> = rows.iter().map(|p| p.periode.as_str()).collect();
    set.into_iter().rev().map(str::to_string).collect()
}

/// Requested periode, else `"{year}-{year+1}"` when it exists, else the newest.
pub fn active_periode(periodes: &[String], requested: Option<&str>, year: i32) -> String {
    if let Some(requested) = requested.filter(|r| !r.trim().is_empty()) {
        return requested.to_string();
    }
    let current = format!("{}-{}", year, year + 1);
    if periodes.contains(&current) {
        return current;
    }
    periodes.first().cloned().unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct StructureView {
    pub periodes: Vec<String>,
    pub active_periode: String,
    pub pengurus: Vec<Pengurus>,
}

/// Public organization page: administrators of one periode, ordered by
/// position rank. Members are never listed publicly.
pub fn structure_view(
    rows: Vec<Pengurus>,
    requested: Option<&str>,
    q: Option<&str>,
    year: i32,
) -> StructureView {
    let rows: Vec<Pengurus> = rows
        .into_iter()
        .filter(|p| p.effective_role() == RoleType::Administrator)
        .collect();
    let periodes = periodes(&rows);
    let active = active_periode(&periodes, requested, year);
    let q = normalize_query(q);

    let mut pengurus: Vec<Pengurus> = rows
        .into_iter()
        .filter(|p| p.periode == active)
        .filter(|p| {
            q.as_deref().is_none_or(|q| {
                any_contains(
                    [
                        Some(p.nama.as_str()),
                        p.nama_jabatan(),
                        p.jabatan_pengurus.as_deref(),
                    ],
                    q,
                )
            })
        })
        .collect();
    // stable, so equal ranks keep their fetch order
    pengurus.sort_by_key(Pengurus::urutan);

    StructureView {
        periodes,
        active_periode: active,
        pengurus,
    }
}

/// Splits requested position ids into (deletable, still referenced by a member).
pub fn partition_deletable_jabatan(ids: &[i64], in_use: &HashSet<i64>) -> (Vec<i64>, Vec<i64>) {
    ids.iter().partition(|id| !in_use.contains(*id))
}

pub fn pengurus_table(rows: &[Pengurus]) -> Table {
    Table::new(
        "Pengurus",
        &[
            "ID",
            "Nama",
            "TTL",
            "Jabatan",
            "Asal PIK-R",
            "Telepon",
            "Email",
            "Instagram",
            "Periode",
        ],
        rows.iter()
            .map(|p| {
                vec![
                    Cell::Number(p.id as f64),
                    Cell::text(&p.nama),
                    Cell::opt(p.ttl.as_deref()),
                    Cell::opt(p.nama_jabatan()),
                    Cell::opt(p.asal_pikr.as_deref()),
                    Cell::opt(p.tlpn.as_deref()),
                    Cell::opt(p.email.as_deref()),
                    Cell::opt(p.instagram.as_deref()),
                    Cell::text(&p.periode),
                ]
            })
            .collect(),
    )
}
