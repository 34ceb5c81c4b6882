// main.rs
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::web::JsonConfig;
use actix_web::{App, HttpServer, web};
use dotenv::dotenv;

mod auth;
mod config;
mod controllers;
mod db;
mod error;
mod export;
mod image_utils;
mod models;
mod realtime;
mod repository;
mod storage;
mod utils;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::realtime::ChangeHub;
use crate::repository::{MySqlSubmissionStore, SubmissionStore};
use crate::storage::Storage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting up...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Konfigurasi tidak valid: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::establish_connection(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Gagal inisialisasi pool database: {:?}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::ensure_admin(&pool, &config).await {
        log::error!("Gagal menyiapkan akun admin: {:?}", e);
        std::process::exit(1);
    }

    let store: Arc<dyn SubmissionStore> = Arc::new(MySqlSubmissionStore::new(pool.clone()));
    let store = web::Data::from(store);
    let hub = web::Data::new(ChangeHub::default());
    let storage = web::Data::new(Storage::new(
        config.upload_dir.clone(),
        &config.public_base_url,
    ));
    tokio::fs::create_dir_all(storage.root()).await?;
    let bind = (config.host.clone(), config.port);
    let config = web::Data::new(config);

    log::info!("listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .supports_credentials()
            .max_age(3600);

        let json_config = JsonConfig::default()
            .limit(1024 * 1024)
            .error_handler(|err, _req| {
                log::warn!("JSON payload error: {}", err);
                AppError::validation(format!("Payload error: {}", err)).into()
            });

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .app_data(store.clone())
            .app_data(hub.clone())
            .app_data(storage.clone())
            .app_data(json_config)
            .wrap(cors)
            .wrap(Logger::default())
            .service(Files::new("/uploads", storage.root().to_path_buf()))
            .service(controllers::sitemap_controller::sitemap)
            //auth
            .service(controllers::auth_controller::login)
            .service(controllers::auth_controller::logout)
            .service(controllers::auth_controller::me)
            .service(controllers::dashboard_controller::get_dashboard)
            //form control
            .service(controllers::form_control_controller::get_form_control)
            .service(controllers::form_control_controller::set_form_window)
            .service(controllers::form_control_controller::quick_open)
            .service(controllers::form_control_controller::close_form)
            //pendaftaran PIK-R
            .service(controllers::submission_controller::submit_pikr)
            .service(controllers::submission_controller::submit_pikr_form)
            .service(controllers::submission_controller::list_submissions)
            .service(controllers::submission_controller::bulk_delete_submissions)
            .service(controllers::submission_controller::export_submissions)
            //struktur organisasi
            .service(controllers::organization_controller::get_structure)
            .service(controllers::organization_controller::list_jabatan)
            .service(controllers::organization_controller::create_jabatan)
            .service(controllers::organization_controller::update_jabatan)
            .service(controllers::organization_controller::delete_jabatan)
            .service(controllers::organization_controller::bulk_delete_jabatan)
            .service(controllers::organization_controller::list_pengurus)
            .service(controllers::organization_controller::create_pengurus)
            .service(controllers::organization_controller::update_pengurus)
            .service(controllers::organization_controller::delete_pengurus)
            .service(controllers::organization_controller::bulk_delete_pengurus)
            .service(controllers::organization_controller::export_pengurus)
            //kegiatan, changes sebelum {id}
            .service(controllers::kegiatan_controller::list_kegiatan)
            .service(controllers::kegiatan_controller::kegiatan_changes)
            .service(controllers::kegiatan_controller::get_kegiatan)
            .service(controllers::kegiatan_controller::create_kegiatan)
            .service(controllers::kegiatan_controller::update_kegiatan)
            .service(controllers::kegiatan_controller::delete_kegiatan)
            //duta genre
            .service(controllers::duta_genre_controller::get_showcase)
            .service(controllers::duta_genre_controller::list_categories)
            .service(controllers::duta_genre_controller::create_category)
            .service(controllers::duta_genre_controller::export_categories)
            .service(controllers::duta_genre_controller::bulk_delete_categories)
            .service(controllers::duta_genre_controller::update_category)
            .service(controllers::duta_genre_controller::delete_category)
            .service(controllers::duta_genre_controller::list_winners)
            .service(controllers::duta_genre_controller::create_winner)
            .service(controllers::duta_genre_controller::export_winners)
            .service(controllers::duta_genre_controller::bulk_delete_winners)
            .service(controllers::duta_genre_controller::update_winner)
            .service(controllers::duta_genre_controller::delete_winner)
            //uploads
            .service(controllers::upload_controller::upload_images)
    })
    .bind(bind)?
    .run()
    .await
}
