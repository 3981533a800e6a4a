pub mod billing_event;
pub mod checkout_session;
pub mod event_outbox;
pub mod item;
pub mod item_document;
pub mod maintenance_task;
pub mod notification;
pub mod qr_code;
pub mod qr_code_claim;
pub mod shop_order;
pub mod subscription;
