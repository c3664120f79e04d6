use crate::client::RpcClient;
use crate::reference::Ref;
use phantom_core::protocol::{
    webpage, OpenRequest, SetClipRectRequest, SetContentRequest, NAVIGATION_SUCCESS,
};
use phantom_core::{Error, OpenSettings, Rect, Result};
use tracing::debug;

/// A remote `webpage` object.
///
/// [`WebPage::close`] consumes the handle, so a released page cannot be
/// used again from the host.
#[derive(Debug, PartialEq, Eq)]
pub struct WebPage {
    reference: Ref,
}

impl WebPage {
    /// Ask the dispatcher for a fresh page.
    pub async fn create(client: &RpcClient) -> Result<Self> {
        let resp = client.call_empty::<webpage::Create>().await?;
        debug!(id = %resp.reference.id, "Created remote page");
        Ok(Self {
            reference: Ref::new(client.clone(), resp.reference.id),
        })
    }

    pub fn reference(&self) -> &Ref {
        &self.reference
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Navigate to `url`. Any load status other than `success` is an error.
    pub async fn open(&self, url: &str) -> Result<()> {
        self.navigate(url, None).await
    }

    pub async fn open_with(&self, url: &str, settings: OpenSettings) -> Result<()> {
        self.navigate(url, Some(settings)).await
    }

    async fn navigate(&self, url: &str, settings: Option<OpenSettings>) -> Result<()> {
        let req = OpenRequest {
            reference: self.reference.id().to_string(),
            url: url.to_string(),
            settings,
        };
        let resp = self.client().call::<webpage::Open>(&req).await?;
        if resp.status != NAVIGATION_SUCCESS {
            return Err(Error::Navigation(format!("{}: status {}", url, resp.status)));
        }
        Ok(())
    }

    pub async fn can_go_back(&self) -> Result<bool> {
        let resp = self
            .client()
            .call::<webpage::CanGoBack>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn can_go_forward(&self) -> Result<bool> {
        let resp = self
            .client()
            .call::<webpage::CanGoForward>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    /// Clipping rectangle used when rendering. All zeros means no clipping.
    pub async fn clip_rect(&self) -> Result<Rect> {
        let resp = self
            .client()
            .call::<webpage::ClipRect>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn set_clip_rect(&self, rect: Rect) -> Result<()> {
        let req = SetClipRectRequest {
            reference: self.reference.id().to_string(),
            rect,
        };
        self.client().call::<webpage::SetClipRect>(&req).await
    }

    /// Serialized markup of the current document.
    pub async fn content(&self) -> Result<String> {
        let resp = self
            .client()
            .call::<webpage::Content>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    /// Replace the document with `content`, optionally recording `url` as
    /// its address.
    pub async fn set_content(&self, content: &str, url: Option<&str>) -> Result<()> {
        let req = SetContentRequest {
            reference: self.reference.id().to_string(),
            content: content.to_string(),
            url: url.map(str::to_string),
        };
        self.client().call::<webpage::SetContent>(&req).await
    }

    pub async fn title(&self) -> Result<String> {
        let resp = self
            .client()
            .call::<webpage::Title>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn url(&self) -> Result<String> {
        let resp = self
            .client()
            .call::<webpage::Url>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn plain_text(&self) -> Result<String> {
        let resp = self
            .client()
            .call::<webpage::PlainText>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    /// Returns false when there was no history entry to move to.
    pub async fn go_back(&self) -> Result<bool> {
        let resp = self
            .client()
            .call::<webpage::GoBack>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn go_forward(&self) -> Result<bool> {
        let resp = self
            .client()
            .call::<webpage::GoForward>(&self.reference.request())
            .await?;
        Ok(resp.value)
    }

    pub async fn reload(&self) -> Result<()> {
        self.client()
            .call::<webpage::Reload>(&self.reference.request())
            .await
    }

    /// Release the page and its resources in the engine.
    pub async fn close(self) -> Result<()> {
        self.client()
            .call::<webpage::Close>(&self.reference.request())
            .await?;
        debug!(id = %self.id(), "Closed remote page");
        Ok(())
    }

    fn client(&self) -> &RpcClient {
        self.reference.client()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;

    async fn stub_dispatcher() -> RpcClient {
        let app = Router::new()
            .route("/webpage/create", post(|| async { r#"{"ref":{"id":"9"}}"# }))
            .route("/webpage/open", post(|| async { r#"{"status":"fail"}"# }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        RpcClient::with_base_url(format!("http://127.0.0.1:{}", port))
    }

    #[tokio::test]
    async fn test_create_wraps_returned_id() {
        let client = stub_dispatcher().await;
        let page = WebPage::create(&client).await.unwrap();
        assert_eq!(page.id(), "9");
    }

    #[tokio::test]
    async fn test_failed_navigation_is_error() {
        let client = stub_dispatcher().await;
        let page = WebPage::create(&client).await.unwrap();
        let err = page.open("http://unreachable.invalid/").await.unwrap_err();
        assert!(matches!(err, Error::Navigation(msg) if msg.contains("fail")));
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_found() {
        let client = stub_dispatcher().await;
        let page = WebPage::create(&client).await.unwrap();
        assert!(matches!(page.title().await, Err(Error::NotFound(_))));
    }
}
