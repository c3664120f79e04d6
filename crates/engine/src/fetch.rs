//! Page implementation that loads documents over HTTP(S) or from local files.
//!
//! It does not run scripts or lay anything out; it keeps the loaded markup,
//! a navigation history and the render clip rectangle.

use crate::page::{LoadStatus, Page, PageError, PageFactory};
use async_trait::async_trait;
use phantom_core::{EngineConfig, OpenSettings, Rect};
use reqwest::{Client, Method};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const BLANK_URL: &str = "about:blank";
pub const BLANK_CONTENT: &str = "<html><head></head><body></body></html>";

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    settings: OpenSettings,
}

pub struct FetchPage {
    client: Client,
    history: Vec<Entry>,
    index: Option<usize>,
    url: String,
    content: String,
    clip_rect: Rect,
    closed: bool,
}

impl FetchPage {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            history: Vec::new(),
            index: None,
            url: BLANK_URL.to_string(),
            content: BLANK_CONTENT.to_string(),
            clip_rect: Rect::default(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), PageError> {
        if self.closed {
            return Err(PageError::Closed);
        }
        Ok(())
    }

    /// Load `url` into the page without touching the history.
    async fn load(&mut self, url: &str, settings: &OpenSettings) -> Result<LoadStatus, PageError> {
        if url == BLANK_URL {
            self.url = BLANK_URL.to_string();
            self.content = BLANK_CONTENT.to_string();
            return Ok(LoadStatus::Success);
        }

        let parsed = Url::parse(url).map_err(|e| PageError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => self.load_http(parsed, settings).await,
            "file" => self.load_file(parsed).await,
            other => Err(PageError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", other),
            }),
        }
    }

    async fn load_http(&mut self, url: Url, settings: &OpenSettings) -> Result<LoadStatus, PageError> {
        let method = Method::from_bytes(settings.method.to_uppercase().as_bytes())
            .map_err(|_| PageError::UnsupportedMethod(settings.method.clone()))?;

        let mut request = self.client.request(method, url.clone());
        if let Some(data) = &settings.data {
            request = request.body(data.clone());
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "Page load failed");
                return Ok(LoadStatus::Fail);
            }
        };
        let final_url = response.url().to_string();
        let status = response.status();
        match response.text().await {
            Ok(body) => {
                debug!(url = %final_url, status = %status, bytes = body.len(), "Page loaded");
                self.url = final_url;
                self.content = body;
                Ok(LoadStatus::Success)
            }
            Err(e) => {
                warn!(url = %final_url, error = %e, "Failed to read page body");
                Ok(LoadStatus::Fail)
            }
        }
    }

    async fn load_file(&mut self, url: Url) -> Result<LoadStatus, PageError> {
        let path = url.to_file_path().map_err(|_| PageError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local path".to_string(),
        })?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => {
                self.url = url.to_string();
                self.content = body;
                Ok(LoadStatus::Success)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read page file");
                Ok(LoadStatus::Fail)
            }
        }
    }

    async fn revisit(&mut self, index: usize) -> Result<bool, PageError> {
        let entry = self.history[index].clone();
        let status = self.load(&entry.url, &entry.settings).await?;
        if status == LoadStatus::Success {
            self.index = Some(index);
        }
        Ok(status == LoadStatus::Success)
    }
}

#[async_trait]
impl Page for FetchPage {
    async fn open(&mut self, url: &str, settings: &OpenSettings) -> Result<LoadStatus, PageError> {
        self.ensure_open()?;
        let status = self.load(url, settings).await?;
        if status == LoadStatus::Success {
            let keep = self.index.map_or(0, |i| i + 1);
            self.history.truncate(keep);
            self.history.push(Entry {
                url: url.to_string(),
                settings: settings.clone(),
            });
            self.index = Some(self.history.len() - 1);
        }
        Ok(status)
    }

    fn can_go_back(&self) -> Result<bool, PageError> {
        self.ensure_open()?;
        Ok(matches!(self.index, Some(i) if i > 0))
    }

    fn can_go_forward(&self) -> Result<bool, PageError> {
        self.ensure_open()?;
        Ok(matches!(self.index, Some(i) if i + 1 < self.history.len()))
    }

    async fn go_back(&mut self) -> Result<bool, PageError> {
        self.ensure_open()?;
        match self.index {
            Some(i) if i > 0 => self.revisit(i - 1).await,
            _ => Ok(false),
        }
    }

    async fn go_forward(&mut self) -> Result<bool, PageError> {
        self.ensure_open()?;
        match self.index {
            Some(i) if i + 1 < self.history.len() => self.revisit(i + 1).await,
            _ => Ok(false),
        }
    }

    async fn reload(&mut self) -> Result<(), PageError> {
        self.ensure_open()?;
        if let Some(i) = self.index {
            self.revisit(i).await?;
        }
        Ok(())
    }

    fn clip_rect(&self) -> Result<Rect, PageError> {
        self.ensure_open()?;
        Ok(self.clip_rect)
    }

    fn set_clip_rect(&mut self, rect: Rect) -> Result<(), PageError> {
        self.ensure_open()?;
        self.clip_rect = rect;
        Ok(())
    }

    fn content(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        Ok(self.content.clone())
    }

    fn set_content(&mut self, content: String, url: Option<String>) -> Result<(), PageError> {
        self.ensure_open()?;
        self.content = content;
        self.url = url.unwrap_or_else(|| BLANK_URL.to_string());
        Ok(())
    }

    fn title(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.content);
        let Ok(selector) = Selector::parse("title") else {
            return Ok(String::new());
        };
        Ok(document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    fn url(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        Ok(self.url.clone())
    }

    fn plain_text(&self) -> Result<String, PageError> {
        self.ensure_open()?;
        Ok(extract_text(&self.content))
    }

    async fn close(&mut self) -> Result<(), PageError> {
        self.ensure_open()?;
        self.closed = true;
        self.history.clear();
        self.index = None;
        self.content.clear();
        Ok(())
    }
}

/// Visible text of the document body with whitespace collapsed.
fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = match Selector::parse("body") {
        Ok(selector) => document.select(&selector).next(),
        Err(_) => None,
    };
    let text: Vec<&str> = match root {
        Some(body) => body.text().collect(),
        None => document.root_element().text().collect(),
    };
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds [`FetchPage`]s sharing one HTTP client.
pub struct FetchPageFactory {
    client: Client,
}

impl FetchPageFactory {
    pub fn new(config: &EngineConfig) -> Result<Self, PageError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| PageError::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl PageFactory for FetchPageFactory {
    fn create(&self) -> Box<dyn Page> {
        Box::new(FetchPage::new(self.client.clone()))
    }
}
