//! Host side of the phantom RPC: launches a PhantomJS-compatible engine,
//! injects the dispatcher script and drives remote objects through it.

pub mod client;
pub mod page;
pub mod probe;
pub mod process;
pub mod reference;
pub mod shim;

pub use client::RpcClient;
pub use page::WebPage;
pub use probe::ReadinessProbe;
pub use process::{OutputSink, Process};
pub use reference::Ref;
