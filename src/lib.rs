//! Order-management core: product catalog, per-user carts, checkout and the
//! order status lifecycle, served over an axum JSON API backed by PostgreSQL.

pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
