use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, mysql::MySqlRow};

use crate::{
    error::AppError,
    utils::{any_contains, non_empty, normalize_query},
};

pub const MAX_IMAGES: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardRatio {
    #[default]
    Landscape,
    #[serde(rename = "insta_4_5")]
    Insta4x5,
    #[serde(rename = "poster_2_3")]
    Poster2x3,
}

impl CardRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            CardRatio::Landscape => "landscape",
            CardRatio::Insta4x5 => "insta_4_5",
            CardRatio::Poster2x3 => "poster_2_3",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "landscape" => Some(CardRatio::Landscape),
            "insta_4_5" => Some(CardRatio::Insta4x5),
            "poster_2_3" => Some(CardRatio::Poster2x3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Kegiatan {
    pub id: i64,
    pub judul: String,
    pub deskripsi: Option<String>,
    pub tanggal: Option<String>,
    pub image_url_1: Option<String>,
    pub image_url_2: Option<String>,
    pub image_url_3: Option<String>,
    pub card_ratio: CardRatio,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, MySqlRow> for Kegiatan {
    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let raw: Option<String> = row.try_get("card_ratio")?;
        let card_ratio = match raw {
            Some(raw) => CardRatio::parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "card_ratio".into(),
                source: format!("card_ratio tidak dikenal: {}", raw).into(),
            })?,
            None => CardRatio::default(),
        };

        Ok(Self {
            id: row.try_get("id")?,
            judul: row.try_get("judul")?,
            deskripsi: row.try_get("deskripsi")?,
            tanggal: row.try_get("tanggal")?,
            image_url_1: row.try_get("image_url_1")?,
            image_url_2: row.try_get("image_url_2")?,
            image_url_3: row.try_get("image_url_3")?,
            card_ratio,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Kegiatan {
    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        [&self.image_url_1, &self.image_url_2, &self.image_url_3]
            .into_iter()
            .filter_map(|u| u.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KegiatanPayload {
    pub judul: Option<String>,
    pub deskripsi: Option<String>,
    pub tanggal: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub card_ratio: Option<CardRatio>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KegiatanInput {
    pub judul: String,
    pub deskripsi: Option<String>,
    pub tanggal: Option<String>,
    pub images: [Option<String>; MAX_IMAGES],
    pub card_ratio: CardRatio,
}

impl KegiatanPayload {
    pub fn validate(self) -> Result<KegiatanInput, AppError> {
        let judul = non_empty(self.judul).ok_or_else(|| AppError::validation("Judul wajib diisi"))?;

        let urls: Vec<String> = self
            .image_urls
            .into_iter()
            .filter_map(|u| non_empty(Some(u)))
            .collect();
        if urls.len() > MAX_IMAGES {
            return Err(AppError::validation("Maksimal 3 gambar."));
        }
        let mut images: [Option<String>; MAX_IMAGES] = Default::default();
        for (slot, url) in images.iter_mut().zip(urls) {
            *slot = Some(url);
        }

        Ok(KegiatanInput {
            judul,
            deskripsi: non_empty(self.deskripsi),
            tanggal: non_empty(self.tanggal),
            images,
            card_ratio: self.card_ratio.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KegiatanQuery {
    pub q: Option<String>,
}

pub fn filter_kegiatan(rows: Vec<Kegiatan>, q: Option<&str>) -> Vec<Kegiatan> {
    let Some(q) = normalize_query(q) else {
        return rows;
    };
    rows.into_iter()
        .filter(|k| {
            any_contains(
                [
                    Some(k.judul.as_str()),
                    k.deskripsi.as_deref(),
                    k.tanggal.as_deref(),
                ],
                &q,
            )
        })
        .collect()
}
