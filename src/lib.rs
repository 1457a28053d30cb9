//! lib.rs
//! Servidor de control (`mailout`) y motor de campañas (`mailout-worker`)
//! comparten estos módulos.

pub mod app;
pub mod config;
pub mod database;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod services;

#[cfg(test)]
mod tests;
