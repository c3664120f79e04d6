//! Wire types shared by the host client and the engine dispatcher.
//!
//! Every remote call is a POST of a JSON object to a fixed path, answered by
//! a JSON object (or an empty body). Each call is described once as an
//! [`Operation`]: its path plus its request and response shapes. The host
//! sends operations through one generic invoke, and the engine matches
//! incoming paths against the same constants.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const PING_PATH: &str = "/ping";
pub const PING_BODY: &str = "ok";
pub const NOT_FOUND_BODY: &str = "not found";
pub const NAVIGATION_SUCCESS: &str = "success";
pub const NAVIGATION_FAIL: &str = "fail";

/// A typed remote call.
pub trait Operation {
    const PATH: &'static str;
    type Request: Serialize;
    type Response: DeserializeOwned;
}

/// Rectangle used by the clip-rect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: i64,
    pub left: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(top: i64, left: i64, width: i64, height: i64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }
}

/// Reference as returned by create calls: `{"id": "<id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefJson {
    pub id: String,
}

/// Settings accepted by `webpage.open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSettings {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for OpenSettings {
    fn default() -> Self {
        Self {
            method: default_method(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefRequest {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl RefRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "ref")]
    pub reference: RefJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<OpenSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClipRectRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContentRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `{"value": ...}` wrapper used by every getter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse<T> {
    pub value: T,
}

macro_rules! operation {
    ($(#[$doc:meta])* $name:ident, $path:literal, $req:ty => $resp:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl Operation for $name {
            const PATH: &'static str = $path;
            type Request = $req;
            type Response = $resp;
        }
    };
}

/// Operations on remote `webpage` objects.
pub mod webpage {
    use super::*;

    operation!(
        /// Allocates a new page and returns its reference.
        Create, "/webpage/create", () => CreateResponse
    );
    operation!(Open, "/webpage/open", OpenRequest => OpenResponse);
    operation!(CanGoBack, "/webpage/can_go_back", RefRequest => ValueResponse<bool>);
    operation!(CanGoForward, "/webpage/can_go_forward", RefRequest => ValueResponse<bool>);
    operation!(ClipRect, "/webpage/clip_rect", RefRequest => ValueResponse<Rect>);
    operation!(SetClipRect, "/webpage/set_clip_rect", SetClipRectRequest => ());
    operation!(Content, "/webpage/content", RefRequest => ValueResponse<String>);
    operation!(SetContent, "/webpage/set_content", SetContentRequest => ());
    operation!(Title, "/webpage/title", RefRequest => ValueResponse<String>);
    operation!(Url, "/webpage/url", RefRequest => ValueResponse<String>);
    operation!(PlainText, "/webpage/plain_text", RefRequest => ValueResponse<String>);
    operation!(GoBack, "/webpage/go_back", RefRequest => ValueResponse<bool>);
    operation!(GoForward, "/webpage/go_forward", RefRequest => ValueResponse<bool>);
    operation!(Reload, "/webpage/reload", RefRequest => ());
    operation!(
        /// Tears down the page and releases its reference.
        Close, "/webpage/close", RefRequest => ()
    );
}
