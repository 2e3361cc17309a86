//! Cruscotto: sessione, gateway API e proxy con cache per la dashboard finanziaria

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod testing;
