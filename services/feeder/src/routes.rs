//! Feeder HTTP routes

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::json;

use crate::{
    AppState,
    download_cache::CachedPayload,
    error::{ServeError, ServeResult},
};

/// Create the router for the feeder service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(slideshow))
        .route("/media", get(next_media))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "feeder",
        "metadata_items": state.metadata.len().await,
    }))
}

/// Slideshow page embedding the next downloaded item
pub async fn slideshow(State(state): State<AppState>) -> ServeResult<Html<String>> {
    let payload = next_payload(&state).await?;
    Ok(Html(render_page(&payload, state.reload_secs)))
}

/// Raw bytes of the next downloaded item
pub async fn next_media(State(state): State<AppState>) -> ServeResult<impl IntoResponse> {
    let payload = next_payload(&state).await?;
    let content_type = if payload.record.mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        payload.record.mime_type.clone()
    };

    Ok(([(header::CONTENT_TYPE, content_type)], payload.bytes))
}

async fn next_payload(state: &AppState) -> ServeResult<CachedPayload> {
    state
        .downloads
        .next(&state.cancel)
        .await
        .ok_or(ServeError::Unavailable)
}

/// Render one payload as a self-reloading page
pub fn render_page(payload: &CachedPayload, reload_secs: u64) -> String {
    let record = &payload.record;
    let encoded = STANDARD.encode(&payload.bytes);

    let media = if record.is_video() {
        format!(
            r#"<video autoplay muted loop><source type="{mime}" src="data:{mime};base64,{data}" /></video>"#,
            mime = record.mime_type,
            data = encoded
        )
    } else {
        format!(r#"<img src="data:image/jpeg;base64,{}" />"#, encoded)
    };

    let caption = record
        .creation_time
        .map(|time| time.format("%B %-d, %Y").to_string())
        .unwrap_or_default();

    format!(
        r#"<html>
<head>
<style>
div {{ position: absolute; height: 100vh; width: 100%; top: 0; left: 0; margin: 0; padding: 0; }}
img, video {{ margin: 0 auto; height: 100%; display: block; }}
span {{ color: #fff; margin: 10px auto; font-family: ui-sans-serif, system-ui, sans-serif; text-align: center; width: 100%; display: block; }}
</style>
</head>
<body>
<div>
<span>{caption}</span>
{media}
</div>
<script type="text/javascript">
window.setTimeout(function() {{ window.location.reload(); }}, {reload_ms});
</script>
</body>
</html>
"#,
        caption = caption,
        media = media,
        reload_ms = reload_secs * 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download_cache::DownloadQueue;
    use crate::metadata_cache::MetadataCache;
    use crate::store::MediaStore;
    use axum::{body::Body, http::Request, http::StatusCode};
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use common::{MediaRecord, VideoStatus};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn payload(mime_type: &str, video_status: VideoStatus) -> CachedPayload {
        CachedPayload {
            record: MediaRecord {
                mime_type: mime_type.to_string(),
                video_status,
                creation_time: Some(Utc.with_ymd_and_hms(2021, 6, 1, 10, 0, 0).unwrap()),
                ..MediaRecord::from_id("1")
            },
            bytes: Bytes::from_static(b"hello"),
        }
    }

    fn state(downloads: DownloadQueue, cancel: CancellationToken) -> AppState {
        AppState {
            metadata: MetadataCache::with_store(MediaStore::from_records(vec![
                MediaRecord::from_id("1"),
                MediaRecord::from_id("2"),
            ])),
            downloads,
            cancel,
            reload_secs: 5,
        }
    }

    #[test]
    fn test_render_image_page() {
        let page = render_page(&payload("image/jpeg", VideoStatus::Unknown), 5);

        assert!(page.contains(r#"<img src="data:image/jpeg;base64,aGVsbG8=" />"#));
        assert!(page.contains("June 1, 2021"));
        assert!(page.contains("5000"));
    }

    #[test]
    fn test_render_ready_video_page() {
        let page = render_page(&payload("video/mp4", VideoStatus::Ready), 5);

        assert!(page.contains("<video autoplay muted loop>"));
        assert!(page.contains(r#"src="data:video/mp4;base64,aGVsbG8=""#));
    }

    #[test]
    fn test_render_processing_video_as_still() {
        let page = render_page(&payload("video/mp4", VideoStatus::Processing), 5);

        assert!(!page.contains("<video"));
        assert!(page.contains("<img"));
    }

    #[tokio::test]
    async fn test_media_route_serves_one_payload() {
        let (sender, queue) = DownloadQueue::bounded(2);
        sender
            .send(payload("image/png", VideoStatus::Unknown))
            .await
            .expect("queue open");
        let app = create_router(state(queue, CancellationToken::new()));

        let response = app
            .oneshot(Request::builder().uri("/media").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_closed_queue_is_unavailable() {
        let (sender, queue) = DownloadQueue::bounded(1);
        drop(sender);
        let app = create_router(state(queue, CancellationToken::new()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_reports_metadata_size() {
        let (_sender, queue) = DownloadQueue::bounded(1);
        let app = create_router(state(queue, CancellationToken::new()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["metadata_items"], 2);
        assert_eq!(json["status"], "ok");
    }
}
