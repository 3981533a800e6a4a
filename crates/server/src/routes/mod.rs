pub mod admin;
pub mod events;
pub mod health;
pub mod info;
pub mod items;
pub mod maintenance;
pub mod notifications;
pub mod qr;
pub mod shop;
pub mod subscription;
