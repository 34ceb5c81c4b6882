pub mod duta_genre;
pub mod form_control;
pub mod kegiatan;
pub mod pengurus;
pub mod submission;
pub mod user;

use serde::Deserialize;

/// Body of every `.../bulk-delete` call.
#[derive(Debug, Deserialize)]
pub struct IdsPayload {
    pub ids: Vec<i64>,
}

impl IdsPayload {
    pub fn checked(self) -> Result<Vec<i64>, crate::error::AppError> {
        if self.ids.is_empty() {
            return Err(crate::error::AppError::validation(
                "Tidak ada data yang dipilih",
            ));
        }
        Ok(self.ids)
    }
}
