pub mod auth_controller;
pub mod dashboard_controller;
pub mod duta_genre_controller;
pub mod form_control_controller;
pub mod form_data;
pub mod kegiatan_controller;
pub mod organization_controller;
pub mod sitemap_controller;
pub mod submission_controller;
pub mod upload_controller;
