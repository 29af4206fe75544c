//! Route handlers organized by resource

pub mod admin;
pub mod boards;
pub mod comments;
pub mod health;
pub mod posts;
pub mod roadmap;
pub mod subscriptions;
pub mod votes;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod testing;
