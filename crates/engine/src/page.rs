use async_trait::async_trait;
use phantom_core::{OpenSettings, Rect};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("page is closed")]
    Closed,

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported method {0}")]
    UnsupportedMethod(String),

    #[error("{0}")]
    Other(String),
}

/// Outcome of a navigation, reported to the host as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Fail,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => phantom_core::protocol::NAVIGATION_SUCCESS,
            Self::Fail => phantom_core::protocol::NAVIGATION_FAIL,
        }
    }
}

/// A native page object held by the engine.
#[async_trait]
pub trait Page: Send {
    /// Load `url`. Network failures are a `Fail` status, not an error;
    /// errors are reserved for requests the page cannot even attempt.
    async fn open(&mut self, url: &str, settings: &OpenSettings) -> Result<LoadStatus, PageError>;

    fn can_go_back(&self) -> Result<bool, PageError>;
    fn can_go_forward(&self) -> Result<bool, PageError>;

    async fn go_back(&mut self) -> Result<bool, PageError>;
    async fn go_forward(&mut self) -> Result<bool, PageError>;
    async fn reload(&mut self) -> Result<(), PageError>;

    fn clip_rect(&self) -> Result<Rect, PageError>;
    fn set_clip_rect(&mut self, rect: Rect) -> Result<(), PageError>;

    fn content(&self) -> Result<String, PageError>;
    fn set_content(&mut self, content: String, url: Option<String>) -> Result<(), PageError>;
    fn title(&self) -> Result<String, PageError>;
    fn url(&self) -> Result<String, PageError>;
    fn plain_text(&self) -> Result<String, PageError>;

    /// Release native resources. The registry entry is removed only after
    /// this succeeds. Every call on a closed page fails with
    /// [`PageError::Closed`], including requests that resolved the page
    /// before it was removed.
    async fn close(&mut self) -> Result<(), PageError>;
}

/// Produces the pages handed out by `/webpage/create`.
pub trait PageFactory: Send + Sync {
    fn create(&self) -> Box<dyn Page>;
}
