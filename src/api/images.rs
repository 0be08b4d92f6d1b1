use std::io::Cursor;
use std::sync::Arc;

use rocket::http::{ContentType, Header, Status};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use rocket::{request::Request, response::{self, Responder, Response}};

use crate::api::ApiError;
use crate::cache::{FetchStats, ImageFetcher, MemoryPressure};
use crate::images::FetchedImage;

// Responder for image data
pub struct ImageResponse {
    pub image: FetchedImage,
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let content_type = ContentType::parse_flexible(self.image.content_type()).unwrap_or(ContentType::Binary);
        let etag = format!("\"{:x}\"", md5::compute(self.image.data()));

        // Check If-None-Match header
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .header(Header::new("Cache-Control", "public, max-age=86400"))
                    .ok();
            }
        }

        let data = self.image.data().to_vec();
        Response::build()
            .header(content_type)
            .header(Header::new("Cache-Control", "public, max-age=86400"))
            .header(Header::new("ETag", etag))
            .sized_body(data.len(), Cursor::new(data))
            .ok()
    }
}

#[get("/?<url>&<cache>")]
pub async fn get_image(
    url: &str,
    cache: Option<bool>,
    fetcher: &State<Arc<ImageFetcher>>,
) -> Result<ImageResponse, ApiError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        log::warn!("Rejected non-http image URL: {}", url);
        return Err(ApiError::InvalidUrl(format!("Unsupported image URL '{}'", url)));
    }

    log::debug!("Fetching image {}", url);
    let image = fetcher.fetch_image(url, cache.unwrap_or(true)).await?;

    Ok(ImageResponse { image })
}

#[delete("/cache/memory")]
pub fn clear_memory(pressure: &State<MemoryPressure>) -> Json<Value> {
    let cleared = pressure.notify();
    Json(json!({ "clearedCaches": cleared }))
}

#[delete("/cache/disk")]
pub async fn clear_disk(fetcher: &State<Arc<ImageFetcher>>) -> Json<Value> {
    let fetcher = Arc::clone(fetcher.inner());
    let removed = rocket::tokio::task::spawn_blocking(move || fetcher.clear_disk_cache())
        .await
        .unwrap_or_else(|e| {
            log::error!("Disk cache clear task failed: {}", e);
            0
        });

    Json(json!({ "removedFiles": removed }))
}

#[get("/stats")]
pub fn stats(fetcher: &State<Arc<ImageFetcher>>) -> Json<FetchStats> {
    Json(fetcher.stats())
}
