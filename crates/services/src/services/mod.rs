pub mod admin;
pub mod billing;
pub mod config;
pub mod events;
pub mod items;
pub mod maintenance;
pub mod notifications;
pub mod qr;
pub mod shop;
pub mod storage;
pub mod usage;
