//! Business logic services for the warehouse back office

pub mod audit;
pub mod auth;
pub mod badge;
pub mod category;
pub mod item;
pub mod ledger;
pub mod notification;
pub mod reporting;
pub mod request;
pub mod stock;

pub use audit::AuditService;
pub use auth::AuthService;
pub use badge::{BadgeCache, BadgeService};
pub use category::CategoryService;
pub use item::ItemService;
pub use notification::NotificationService;
pub use reporting::ReportingService;
pub use request::RequestService;
pub use stock::StockService;
