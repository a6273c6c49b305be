//! Application layer: the command interpreter plus the bulk document
//! loader and the notification reconciliation handlers, all methods on
//! [`dispatch::CommandService`].

pub mod dispatch;
pub mod loader;
pub mod reconcile;
