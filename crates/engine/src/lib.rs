//! Native engine serving the page protocol over HTTP.
//!
//! Pages live in a [`Registry`] keyed by never-reused IDs and are driven by
//! the dispatcher in [`dispatcher`]. The stock [`FetchPage`] loads documents
//! over HTTP(S) without running scripts.

pub mod dispatcher;
pub mod fetch;
pub mod page;
pub mod registry;

pub use dispatcher::{router, serve, EngineContext};
pub use fetch::{FetchPage, FetchPageFactory};
pub use page::{LoadStatus, Page, PageError, PageFactory};
pub use registry::{Registry, RegistryError};
