use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, mysql::MySqlRow};

use crate::{
    error::AppError,
    export::{Cell, Table},
    utils::{any_contains, non_empty, normalize_query},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DutaGenreCategory {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub order: i32,
    pub desired_count: i32,
}

impl<'r> FromRow<'r, MySqlRow> for DutaGenreCategory {
    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            key: row.try_get("category_key")?,
            title: row.try_get("title")?,
            order: row.try_get("display_order")?,
            desired_count: row.try_get("desired_count")?,
        })
    }
}

impl DutaGenreCategory {
    /// Village-level categories are single-person only.
    pub fn allows_duo(&self) -> bool {
        !self.key.to_lowercase().contains("kelurahan")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Putra,
    Putri,
    Duo,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Putra => "putra",
            Gender::Putri => "putri",
            Gender::Duo => "duo",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "putra" => Some(Gender::Putra),
            "putri" => Some(Gender::Putri),
            "duo" => Some(Gender::Duo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DutaGenreWinner {
    pub id: i64,
    pub category_id: i64,
    pub nama: String,
    pub gender: Option<Gender>,
    pub asal: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub periode: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, MySqlRow> for DutaGenreWinner {
    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let gender = match row.try_get::<Option<String>, _>("gender")? {
            // legacy rows store "" for no gender
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(Gender::parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "gender".into(),
                source: format!("gender tidak dikenal: {}", raw).into(),
            })?),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            category_id: row.try_get("category_id")?,
            nama: row.try_get("nama")?,
            gender,
            asal: row.try_get("asal")?,
            instagram: row.try_get("instagram")?,
            image_url: row.try_get("image_url")?,
            periode: row.try_get("periode")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPayload {
    pub key: Option<String>,
    pub title: Option<String>,
    pub order: Option<i32>,
    pub desired_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub key: String,
    pub title: String,
    pub order: i32,
    pub desired_count: i32,
}

impl CategoryPayload {
    pub fn validate(self) -> Result<CategoryInput, AppError> {
        let key = non_empty(self.key).ok_or_else(|| AppError::validation("Key kategori wajib diisi"))?;
        let title =
            non_empty(self.title).ok_or_else(|| AppError::validation("Judul kategori wajib diisi"))?;
        Ok(CategoryInput {
            key,
            title,
            order: self.order.unwrap_or(0),
            desired_count: self.desired_count.unwrap_or(0).max(0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WinnerPayload {
    pub category_id: Option<i64>,
    pub nama: Option<String>,
    pub gender: Option<Gender>,
    pub asal: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub periode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinnerInput {
    pub category_id: i64,
    pub nama: String,
    pub gender: Option<Gender>,
    pub asal: Option<String>,
    pub instagram: Option<String>,
    pub image_url: Option<String>,
    pub periode: String,
}

impl WinnerPayload {
    pub fn validate(self) -> Result<WinnerInput, AppError> {
        let category_id = self
            .category_id
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::validation("Kategori wajib dipilih"))?;
        let nama = non_empty(self.nama).ok_or_else(|| AppError::validation("Nama wajib diisi"))?;
        let periode =
            non_empty(self.periode).ok_or_else(|| AppError::validation("Periode wajib diisi"))?;

        Ok(WinnerInput {
            category_id,
            nama,
            gender: self.gender,
            asal: non_empty(self.asal),
            instagram: non_empty(self.instagram),
            image_url: non_empty(self.image_url),
            periode,
        })
    }
}

impl WinnerInput {
    pub fn check_category(&self, category: &DutaGenreCategory) -> Result<(), AppError> {
        if self.gender == Some(Gender::Duo) && !category.allows_duo() {
            return Err(AppError::validation(format!(
                "Kategori {} tidak menerima pemenang duo",
                category.title
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WinnerQuery {
    pub periode: Option<String>,
    pub category_id: Option<i64>,
    pub gender: Option<Gender>,
    pub q: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub q: Option<String>,
    pub format: Option<String>,
}

pub fn filter_categories(rows: Vec<DutaGenreCategory>, q: Option<&str>) -> Vec<DutaGenreCategory> {
    let Some(q) = normalize_query(q) else {
        return rows;
    };
    rows.into_iter()
        .filter(|c| any_contains([Some(c.key.as_str()), Some(c.title.as_str())], &q))
        .collect()
}

/// Winner filter shared by the admin table and the public showcase.
pub fn filter_winners(
    winners: Vec<DutaGenreWinner>,
    categories: &[DutaGenreCategory],
    query: &WinnerQuery,
) -> Vec<DutaGenreWinner> {
    let titles: HashMap<i64, &str> = categories.iter().map(|c| (c.id, c.title.as_str())).collect();
    let periode = query.periode.as_deref().filter(|p| !p.is_empty());
    let q = normalize_query(query.q.as_deref());

    winners
        .into_iter()
        .filter(|w| periode.is_none_or(|p| w.periode == p))
        .filter(|w| query.category_id.is_none_or(|id| w.category_id == id))
        .filter(|w| query.gender.is_none_or(|g| w.gender == Some(g)))
        .filter(|w| {
            q.as_deref().is_none_or(|q| {
                any_contains(
                    [
                        Some(w.nama.as_str()),
                        w.asal.as_deref(),
                        Some(w.periode.as_str()),
                        w.instagram.as_deref(),
                        titles.get(&w.category_id).copied(),
                    ],
                    q,
                )
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CategoryGroup {
    pub category: DutaGenreCategory,
    pub winners: Vec<DutaGenreWinner>,
}

#[derive(Debug, Serialize)]
pub struct Showcase {
    pub periodes: Vec<String>,
    pub active_periode: String,
    pub groups: Vec<CategoryGroup>,
}

/// Public page: requested periode, else `default_periode` when it has
/// winners, else the newest one; winners grouped by category `order`.
/// Categories without a matching winner are left out.
pub fn showcase(
    mut categories: Vec<DutaGenreCategory>,
    winners: Vec<DutaGenreWinner>,
    query: &WinnerQuery,
    default_periode: &str,
) -> Showcase {
    let mut periodes: Vec<String> = winners.iter().map(|w| w.periode.clone()).collect();
    periodes.sort();
    periodes.dedup();
    periodes.reverse();

    let active = match query.periode.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(requested) => requested.to_string(),
        None if periodes.iter().any(|p| p == default_periode) => default_periode.to_string(),
        None => periodes.first().cloned().unwrap_or_default(),
    };

    let scoped = WinnerQuery {
        periode: Some(active.clone()),
        category_id: query.category_id,
        gender: query.gender,
        q: query.q.clone(),
        format: None,
    };
    let filtered = filter_winners(winners, &categories, &scoped);

    let mut by_category: HashMap<i64, Vec<DutaGenreWinner>> = HashMap::new();
    for w in filtered {
        by_category.entry(w.category_id).or_default().push(w);
    }

    categories.sort_by_key(|c| c.order);
    let groups = categories
        .into_iter()
        .filter_map(|category| {
            let winners = by_category.remove(&category.id)?;
            Some(CategoryGroup { category, winners })
        })
        .collect();

    Showcase {
        periodes,
        active_periode: active,
        groups,
    }
}

pub fn categories_table(rows: &[DutaGenreCategory]) -> Table {
    Table::new(
        "Categories",
        &["ID", "Key", "Judul", "Urutan", "Target Kartu"],
        rows.iter()
            .map(|c| {
                vec![
                    Cell::Number(c.id as f64),
                    Cell::text(&c.key),
                    Cell::text(&c.title),
                    Cell::Number(c.order as f64),
                    Cell::Number(c.desired_count as f64),
                ]
            })
            .collect(),
    )
}

pub fn winners_table(rows: &[DutaGenreWinner], categories: &[DutaGenreCategory]) -> Table {
    let titles: HashMap<i64, &str> = categories.iter().map(|c| (c.id, c.title.as_str())).collect();
    Table::new(
        "Winners",
        &[
            "ID", "Nama", "Kategori", "Gender", "Asal", "Instagram", "Periode", "Gambar",
        ],
        rows.iter()
            .map(|w| {
                vec![
                    Cell::Number(w.id as f64),
                    Cell::text(&w.nama),
                    Cell::opt(titles.get(&w.category_id).copied()),
                    Cell::opt(w.gender.map(Gender::as_str)),
                    Cell::opt(w.asal.as_deref()),
                    Cell::opt(w.instagram.as_deref()),
                    Cell::text(&w.periode),
                    Cell::opt(w.image_url.as_deref()),
                ]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn category(id: i64, key: &str, title: &str, order: i32) -> DutaGenreCategory {
        DutaGenreCategory {
            id,
            key: key.into(),
            title: title.into(),
            order,
            desired_count: 2,
        }
    }

    fn winner(id: i64, category_id: i64, nama: &str, gender: Gender, periode: &str) -> DutaGenreWinner {
        DutaGenreWinner {
            id,
            category_id,
            nama: nama.into(),
            gender: Some(gender),
            asal: Some("Kecamatan Gading Cempaka".into()),
            instagram: Some(format!("@{}", nama.to_lowercase())),
            image_url: None,
            periode: periode.into(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn categories() -> Vec<DutaGenreCategory> {
        vec![
            category(1, "kota", "Duta GenRe Kota", 2),
            category(2, "kelurahan", "Duta GenRe Kelurahan", 1),
            category(3, "favorit", "Favorit", 3),
        ]
    }

    fn winners() -> Vec<DutaGenreWinner> {
        vec![
            winner(1, 1, "Raka", Gender::Putra, "2025-2026"),
            winner(2, 1, "Nadia", Gender::Putri, "2025-2026"),
            winner(3, 2, "Sari", Gender::Putri, "2025-2026"),
            winner(4, 1, "Lama", Gender::Putra, "2024-2025"),
        ]
    }

    #[test]
    fn showcase_groups_by_category_order() {
        let view = showcase(categories(), winners(), &WinnerQuery::default(), "2025-2026");
        assert_eq!(view.periodes, vec!["2025-2026", "2024-2025"]);
        assert_eq!(view.active_periode, "2025-2026");
        let keys: Vec<_> = view.groups.iter().map(|g| g.category.key.as_str()).collect();
        assert_eq!(keys, vec!["kelurahan", "kota"]);
        assert_eq!(view.groups[1].winners.len(), 2);
    }

    #[test]
    fn showcase_falls_back_to_newest_periode() {
        let view = showcase(categories(), winners(), &WinnerQuery::default(), "2030-2031");
        assert_eq!(view.active_periode, "2025-2026");

        let old = WinnerQuery {
            periode: Some("2024-2025".into()),
            ..Default::default()
        };
        let view = showcase(categories(), winners(), &old, "2025-2026");
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].winners[0].nama, "Lama");
    }

    #[test]
    fn winner_filters_combine() {
        let query = WinnerQuery {
            gender: Some(Gender::Putri),
            q: Some("kota".into()),
            ..Default::default()
        };
        let hits = filter_winners(winners(), &categories(), &query);
        assert_eq!(hits.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2]);

        let query = WinnerQuery {
            q: Some("@raka".into()),
            ..Default::default()
        };
        assert_eq!(filter_winners(winners(), &categories(), &query).len(), 1);
    }

    #[test]
    fn payload_messages() {
        assert_eq!(
            WinnerPayload::default().validate().unwrap_err().to_string(),
            "Kategori wajib dipilih"
        );
        let err = WinnerPayload {
            category_id: Some(1),
            nama: Some("Raka".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "Periode wajib diisi");
        assert_eq!(
            CategoryPayload::default().validate().unwrap_err().to_string(),
            "Key kategori wajib diisi"
        );
    }

    #[test]
    fn duo_is_rejected_for_kelurahan() {
        let input = WinnerPayload {
            category_id: Some(2),
            nama: Some("Sari & Dimas".into()),
            gender: Some(Gender::Duo),
            periode: Some("2025-2026".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let cats = categories();
        assert!(input.check_category(&cats[1]).is_err());
        assert!(input.check_category(&cats[0]).is_ok());
    }
}
