pub mod config_cmd;
pub mod fetch;
pub mod ping;
pub mod shim;
