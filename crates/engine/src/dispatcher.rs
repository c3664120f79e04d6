//! HTTP front of the engine.
//!
//! Every request lands on one fallback handler that looks the path up in the
//! operation table; the method is ignored. Handler failures become a 500
//! whose body is `"<path>: <message>"`, unknown paths a 404 `not found`.

use crate::page::{Page, PageError, PageFactory};
use crate::registry::{Registry, RegistryError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use phantom_core::protocol::{
    webpage, CreateResponse, OpenRequest, OpenResponse, Operation, RefJson, RefRequest, SetClipRectRequest,
    SetContentRequest, ValueResponse, NOT_FOUND_BODY, PING_BODY, PING_PATH,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

type SharedPage = Arc<Mutex<Box<dyn Page>>>;

#[derive(Error, Debug)]
enum HandlerError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("bad request: {0}")]
    BadRequest(#[from] serde_json::Error),

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Shared state of a running engine.
pub struct EngineContext {
    pages: Registry<Box<dyn Page>>,
    factory: Arc<dyn PageFactory>,
}

impl EngineContext {
    pub fn new(factory: Arc<dyn PageFactory>) -> Self {
        Self {
            pages: Registry::new(),
            factory,
        }
    }

    pub async fn live_pages(&self) -> usize {
        self.pages.len().await
    }

    async fn target(&self, body: &[u8]) -> Result<(String, SharedPage), HandlerError> {
        let request: RefRequest = decode(body)?;
        let page = self.pages.resolve(&request.reference).await?;
        Ok((request.reference, page))
    }
}

pub fn router(ctx: Arc<EngineContext>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve the dispatcher on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, ctx: Arc<EngineContext>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn dispatch(State(ctx): State<Arc<EngineContext>>, uri: Uri, body: Bytes) -> Response {
    let path = uri.path();
    match handle(&ctx, path, &body).await {
        Ok(response) => response,
        Err(HandlerError::NotFound) => {
            debug!(path = %path, "Unknown path");
            (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
        }
        Err(e) => {
            warn!(path = %path, error = %e, "Handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", path, e)).into_response()
        }
    }
}

async fn handle(ctx: &EngineContext, path: &str, body: &[u8]) -> Result<Response, HandlerError> {
    match path {
        PING_PATH => Ok((StatusCode::OK, PING_BODY).into_response()),

        p if p == webpage::Create::PATH => {
            let id = ctx.pages.create(ctx.factory.create()).await;
            debug!(id = %id, "Page created");
            Ok(reply(CreateResponse {
                reference: RefJson { id },
            }))
        }

        p if p == webpage::Open::PATH => {
            let request: OpenRequest = decode(body)?;
            let page = ctx.pages.resolve(&request.reference).await?;
            let settings = request.settings.unwrap_or_default();
            let status = page.lock().await.open(&request.url, &settings).await?;
            debug!(id = %request.reference, url = %request.url, status = status.as_str(), "Page opened");
            Ok(reply(OpenResponse {
                status: status.as_str().to_string(),
            }))
        }

        p if p == webpage::CanGoBack::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.can_go_back()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::CanGoForward::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.can_go_forward()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::ClipRect::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.clip_rect()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::SetClipRect::PATH => {
            let request: SetClipRectRequest = decode(body)?;
            let page = ctx.pages.resolve(&request.reference).await?;
            page.lock().await.set_clip_rect(request.rect)?;
            Ok(StatusCode::OK.into_response())
        }

        p if p == webpage::Content::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.content()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::SetContent::PATH => {
            let request: SetContentRequest = decode(body)?;
            let page = ctx.pages.resolve(&request.reference).await?;
            page.lock().await.set_content(request.content, request.url)?;
            Ok(StatusCode::OK.into_response())
        }

        p if p == webpage::Title::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.title()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::Url::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.url()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::PlainText::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.plain_text()?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::GoBack::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.go_back().await?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::GoForward::PATH => {
            let (_, page) = ctx.target(body).await?;
            let value = page.lock().await.go_forward().await?;
            Ok(reply(ValueResponse { value }))
        }

        p if p == webpage::Reload::PATH => {
            let (_, page) = ctx.target(body).await?;
            page.lock().await.reload().await?;
            Ok(StatusCode::OK.into_response())
        }

        // Teardown first; a failed close leaves the entry resolvable.
        p if p == webpage::Close::PATH => {
            let (id, page) = ctx.target(body).await?;
            page.lock().await.close().await?;
            ctx.pages.remove(&id).await;
            info!(id = %id, "Page closed");
            Ok(StatusCode::OK.into_response())
        }

        _ => Err(HandlerError::NotFound),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, HandlerError> {
    Ok(serde_json::from_slice(body)?)
}

fn reply<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchPageFactory;
    use crate::page::LoadStatus;
    use async_trait::async_trait;
    use phantom_core::{EngineConfig, Error, OpenSettings, Rect};
    use phantom_host::{RpcClient, WebPage};
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn start(factory: Arc<dyn PageFactory>) -> (RpcClient, Arc<EngineContext>) {
        let ctx = Arc::new(EngineContext::new(factory));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let served = ctx.clone();
        tokio::spawn(async move {
            serve(listener, served, std::future::pending()).await.ok();
        });
        (RpcClient::with_base_url(format!("http://127.0.0.1:{}", port)), ctx)
    }

    fn fetch_factory() -> Arc<dyn PageFactory> {
        Arc::new(FetchPageFactory::new(&EngineConfig::default()).unwrap())
    }

    /// Page whose teardown can be made to fail on demand.
    struct StubbornPage {
        refuse_close: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Page for StubbornPage {
        async fn open(&mut self, _url: &str, _settings: &OpenSettings) -> Result<LoadStatus, PageError> {
            Ok(LoadStatus::Success)
        }
        fn can_go_back(&self) -> Result<bool, PageError> {
            Ok(false)
        }
        fn can_go_forward(&self) -> Result<bool, PageError> {
            Ok(false)
        }
        async fn go_back(&mut self) -> Result<bool, PageError> {
            Ok(false)
        }
        async fn go_forward(&mut self) -> Result<bool, PageError> {
            Ok(false)
        }
        async fn reload(&mut self) -> Result<(), PageError> {
            Ok(())
        }
        fn clip_rect(&self) -> Result<Rect, PageError> {
            Ok(Rect::default())
        }
        fn set_clip_rect(&mut self, _rect: Rect) -> Result<(), PageError> {
            Ok(())
        }
        fn content(&self) -> Result<String, PageError> {
            Ok(String::new())
        }
        fn set_content(&mut self, _content: String, _url: Option<String>) -> Result<(), PageError> {
            Ok(())
        }
        fn title(&self) -> Result<String, PageError> {
            Ok("stubborn".to_string())
        }
        fn url(&self) -> Result<String, PageError> {
            Ok(String::new())
        }
        fn plain_text(&self) -> Result<String, PageError> {
            Ok(String::new())
        }
        async fn close(&mut self) -> Result<(), PageError> {
            if self.refuse_close.load(Ordering::SeqCst) {
                return Err(PageError::Other("renderer busy".to_string()));
            }
            Ok(())
        }
    }

    struct StubbornFactory {
        refuse_close: Arc<AtomicBool>,
    }

    impl PageFactory for StubbornFactory {
        fn create(&self) -> Box<dyn Page> {
            Box::new(StubbornPage {
                refuse_close: self.refuse_close.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_ping_ignores_method() {
        let (client, _) = start(fetch_factory()).await;
        client.ping().await.unwrap();

        let resp = reqwest::Client::new()
            .post(format!("{}{}", client.base_url(), PING_PATH))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), PING_BODY);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (client, _) = start(fetch_factory()).await;
        let result = client
            .invoke::<(), serde_json::Value>(reqwest::Method::POST, "/webpage/render", None)
            .await;
        assert!(matches!(result, Err(Error::NotFound(path)) if path == "/webpage/render"));
    }

    #[tokio::test]
    async fn test_create_issues_fresh_ids() {
        let (client, ctx) = start(fetch_factory()).await;
        let a = WebPage::create(&client).await.unwrap();
        let b = WebPage::create(&client).await.unwrap();
        assert_eq!(a.id(), "1");
        assert_eq!(b.id(), "2");
        assert_eq!(ctx.live_pages().await, 2);

        a.close().await.unwrap();
        let c = WebPage::create(&client).await.unwrap();
        assert_eq!(c.id(), "3");
        assert_eq!(ctx.live_pages().await, 2);
    }

    #[tokio::test]
    async fn test_clip_rect_and_content_round_trip() {
        let (client, _) = start(fetch_factory()).await;
        let page = WebPage::create(&client).await.unwrap();

        assert_eq!(page.clip_rect().await.unwrap(), Rect::default());
        page.set_clip_rect(Rect::new(10, 20, 300, 400)).await.unwrap();
        assert_eq!(page.clip_rect().await.unwrap(), Rect::new(10, 20, 300, 400));

        page.set_content("<html><head><title>Hi</title></head><body>there</body></html>", None)
            .await
            .unwrap();
        assert_eq!(page.title().await.unwrap(), "Hi");
        assert_eq!(page.plain_text().await.unwrap(), "there");
        assert_eq!(page.url().await.unwrap(), "about:blank");
        assert!(!page.can_go_back().await.unwrap());
        assert!(!page.go_back().await.unwrap());
        page.reload().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_ref_is_remote_error() {
        let (client, _) = start(fetch_factory()).await;
        let result = client
            .call::<webpage::Title>(&RefRequest::new("42"))
            .await;
        match result {
            Err(Error::Remote(msg)) => assert_eq!(msg, "/webpage/title: unknown ref 42"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_remote_error() {
        let (client, _) = start(fetch_factory()).await;
        let result = client
            .invoke::<_, serde_json::Value>(
                reqwest::Method::POST,
                webpage::Title::PATH,
                Some(&serde_json::json!({"nope": true})),
            )
            .await;
        assert!(matches!(result, Err(Error::Remote(msg)) if msg.starts_with("/webpage/title: bad request")));
    }

    #[tokio::test]
    async fn test_closed_ref_is_gone() {
        let (client, ctx) = start(fetch_factory()).await;
        let page = WebPage::create(&client).await.unwrap();
        let id = page.id().to_string();
        page.close().await.unwrap();
        assert_eq!(ctx.live_pages().await, 0);

        let result = client.call::<webpage::Url>(&RefRequest::new(id.clone())).await;
        assert!(matches!(result, Err(Error::Remote(msg)) if msg.ends_with(&format!("unknown ref {}", id))));

        let again = client.call::<webpage::Close>(&RefRequest::new(id)).await;
        assert!(matches!(again, Err(Error::Remote(_))));
    }

    #[tokio::test]
    async fn test_failed_close_keeps_entry() {
        let refuse_close = Arc::new(AtomicBool::new(true));
        let (client, ctx) = start(Arc::new(StubbornFactory {
            refuse_close: refuse_close.clone(),
        }))
        .await;

        let page = WebPage::create(&client).await.unwrap();
        let id = page.id().to_string();
        let result = client.call::<webpage::Close>(&RefRequest::new(id.clone())).await;
        assert!(matches!(result, Err(Error::Remote(msg)) if msg == "/webpage/close: renderer busy"));
        assert_eq!(ctx.live_pages().await, 1);
        assert_eq!(page.title().await.unwrap(), "stubborn");

        refuse_close.store(false, Ordering::SeqCst);
        page.close().await.unwrap();
        assert_eq!(ctx.live_pages().await, 0);
        let gone = client.call::<webpage::Title>(&RefRequest::new(id)).await;
        assert!(matches!(gone, Err(Error::Remote(_))));
    }

    #[tokio::test]
    async fn test_open_and_navigate_local_site() {
        use axum::routing::get;

        let site = Router::new()
            .route(
                "/one",
                get(|| async { axum::response::Html("<title>One</title><body>first page</body>") }),
            )
            .route(
                "/two",
                get(|| async { axum::response::Html("<title>Two</title><body>second page</body>") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let site_url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            axum::serve(listener, site).await.ok();
        });

        let (client, _) = start(fetch_factory()).await;
        let page = WebPage::create(&client).await.unwrap();

        page.open(&format!("{}/one", site_url)).await.unwrap();
        assert_eq!(page.title().await.unwrap(), "One");
        page.open(&format!("{}/two", site_url)).await.unwrap();
        assert_eq!(page.plain_text().await.unwrap(), "second page");

        assert!(page.can_go_back().await.unwrap());
        assert!(page.go_back().await.unwrap());
        assert_eq!(page.url().await.unwrap(), format!("{}/one", site_url));
        assert!(page.can_go_forward().await.unwrap());
        assert!(page.go_forward().await.unwrap());
        assert_eq!(page.title().await.unwrap(), "Two");
        assert!(page.content().await.unwrap().contains("second page"));
    }

    #[tokio::test]
    async fn test_failed_load_is_navigation_error() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = dead.local_addr().unwrap().port();
        drop(dead);

        let (client, _) = start(fetch_factory()).await;
        let page = WebPage::create(&client).await.unwrap();
        let result = page.open(&format!("http://127.0.0.1:{}/", port)).await;
        assert!(matches!(result, Err(Error::Navigation(_))));

        let raw = client
            .call::<webpage::Open>(&OpenRequest {
                reference: page.id().to_string(),
                url: format!("http://127.0.0.1:{}/", port),
                settings: None,
            })
            .await
            .unwrap();
        assert_eq!(raw.status, "fail");
    }

    #[tokio::test]
    async fn test_request_queued_behind_close_sees_closed_page() {
        use axum::routing::get;
        use std::time::Duration;

        let site = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                axum::response::Html("<title>Slow</title>")
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let slow_url = format!("http://127.0.0.1:{}/slow", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            axum::serve(listener, site).await.ok();
        });

        let (client, ctx) = start(fetch_factory()).await;
        let page = WebPage::create(&client).await.unwrap();
        let id = page.id().to_string();

        // The load holds the page lock; close and content queue up behind it
        // in that order.
        let loading = tokio::spawn({
            let client = client.clone();
            let request = OpenRequest {
                reference: id.clone(),
                url: slow_url,
                settings: None,
            };
            async move { client.call::<webpage::Open>(&request).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let closing = tokio::spawn({
            let client = client.clone();
            let request = RefRequest::new(id.clone());
            async move { client.call::<webpage::Close>(&request).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let reading = tokio::spawn({
            let client = client.clone();
            let request = RefRequest::new(id.clone());
            async move { client.call::<webpage::Content>(&request).await }
        });

        assert_eq!(loading.await.unwrap().unwrap().status, "success");
        closing.await.unwrap().unwrap();
        match reading.await.unwrap() {
            Err(Error::Remote(msg)) => assert_eq!(msg, "/webpage/content: page is closed"),
            other => panic!("expected closed page error, got {:?}", other),
        }
        assert_eq!(ctx.live_pages().await, 0);
    }
}
