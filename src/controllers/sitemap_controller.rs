use std::fmt::Write;

use actix_web::{HttpResponse, Responder, get, web};
use chrono::{NaiveDate, Utc};
use sqlx::MySqlPool;

use crate::{
    config::AppConfig, controllers::kegiatan_controller::fetch_kegiatan, error::AppError,
};

struct Route {
    path: &'static str,
    change_frequency: &'static str,
    priority: f32,
}

const STATIC_ROUTES: [Route; 6] = [
    Route {
        path: "/",
        change_frequency: "weekly",
        priority: 1.0,
    },
    Route {
        path: "/kegiatans",
        change_frequency: "weekly",
        priority: 0.8,
    },
    Route {
        path: "/structure",
        change_frequency: "monthly",
        priority: 0.7,
    },
    Route {
        path: "/duta-genre",
        change_frequency: "monthly",
        priority: 0.7,
    },
    Route {
        path: "/duta-genre/faq",
        change_frequency: "yearly",
        priority: 0.5,
    },
    Route {
        path: "/pik-rform",
        change_frequency: "monthly",
        priority: 0.7,
    },
];

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn push_url(xml: &mut String, loc: &str, lastmod: NaiveDate, change_frequency: &str, priority: f32) {
    // writing into a String cannot fail
    let _ = write!(
        xml,
        "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    \
         <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
        escape_xml(loc),
        lastmod.format("%Y-%m-%d"),
        change_frequency,
        priority
    );
}

/// Static pages dated `today`, then one detail page per activity dated by
/// its creation day.
pub fn render_sitemap(site_url: &str, kegiatan: &[(i64, NaiveDate)], today: NaiveDate) -> String {
    let site_url = site_url.trim_end_matches('/');
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for route in &STATIC_ROUTES {
        let loc = format!("{}{}", site_url, route.path);
        push_url(&mut xml, &loc, today, route.change_frequency, route.priority);
    }
    for (id, created) in kegiatan {
        let loc = format!("{}/kegiatans/{}", site_url, id);
        push_url(&mut xml, &loc, *created, "monthly", 0.6);
    }
    xml.push_str("</urlset>\n");
    xml
}

#[get("/sitemap.xml")]
pub async fn sitemap(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
) -> Result<impl Responder, AppError> {
    let entries: Vec<(i64, NaiveDate)> = fetch_kegiatan(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal membuat sitemap", e))?
        .into_iter()
        .map(|k| (k.id, k.created_at.date_naive()))
        .collect();

    let xml = render_sitemap(&config.site_url, &entries, Utc::now().date_naive());
    Ok(HttpResponse::Ok()
        .content_type("application/xml; charset=utf-8")
        .body(xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_static_pages_and_each_activity() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 17).unwrap();
        let created = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let xml = render_sitemap("https://genre.example/", &[(12, created)], today);

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://genre.example/</loc>"));
        assert!(xml.contains("<loc>https://genre.example/pik-rform</loc>"));
        assert!(xml.contains("<loc>https://genre.example/kegiatans/12</loc>"));
        assert!(xml.contains("<lastmod>2025-03-02</lastmod>"));
        assert!(xml.contains("<priority>1.0</priority>"));
        assert_eq!(xml.matches("<url>").count(), STATIC_ROUTES.len() + 1);
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn site_url_is_escaped() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let xml = render_sitemap("https://a.example/?x=1&y=2", &[], today);
        assert!(xml.contains("x=1&amp;y=2"));
    }
}
