pub mod api;
pub mod config;
pub mod dispatch;
pub mod iface;
pub mod ping;
pub mod wol;
