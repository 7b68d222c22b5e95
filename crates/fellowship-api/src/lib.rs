//! HTTP API for the fellowship site: handlers, auth middleware, file
//! storage and notification delivery.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod error;
pub mod events;
pub mod extract;
pub mod feedback;
pub mod kids;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod playlists;
pub mod prayers;
pub mod recipes;
pub mod reflections;
pub mod router;
pub mod settings;
pub mod social;
pub mod state;
pub mod storage;
pub mod users;
pub mod views;
