pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod services;
pub mod state;
