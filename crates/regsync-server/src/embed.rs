use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct PageAssets;

fn serve_asset(path: &str) -> Response {
    match <PageAssets as Embed>::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

pub async fn index_page() -> Response {
    serve_asset("index.html")
}

pub async fn config_page() -> Response {
    serve_asset("config.html")
}

/// Serve files under `assets/static/`.
pub async fn static_handler(Path(path): Path<String>) -> Response {
    if path.split('/').any(|seg| seg == "..") {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    serve_asset(&format!("static/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_embedded() {
        assert!(<PageAssets as Embed>::get("index.html").is_some());
        assert!(<PageAssets as Embed>::get("config.html").is_some());
        assert!(<PageAssets as Embed>::get("static/main.js").is_some());
        assert!(<PageAssets as Embed>::get("static/config.js").is_some());
    }

    #[test]
    fn missing_asset_is_404() {
        assert_eq!(serve_asset("nope.html").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn javascript_gets_js_mime() {
        let response = serve_asset("static/main.js");
        let ct = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(ct.to_str().unwrap().contains("javascript"));
    }
}
