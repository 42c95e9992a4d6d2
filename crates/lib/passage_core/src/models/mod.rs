//! Domain models.
//!
//! Plain data passed by value between components. Persistence lives behind
//! [`crate::users::store::UserStore`]; nothing here holds a live database handle.

pub mod auth;
pub mod oauth;
pub mod user;
