pub mod api;
pub mod game;
pub mod models;
pub mod validate;
