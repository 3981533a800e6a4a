pub mod billing_event;
pub mod checkout_session;
pub mod event_outbox;
pub mod ids;
pub mod item;
pub mod item_document;
pub mod maintenance_task;
pub mod notification;
pub mod patch;
pub mod qr_code;
pub mod shop_order;
pub mod subscription;
