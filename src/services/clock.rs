//! services/clock.rs
//! Reloj del worker. Los únicos puntos de suspensión son sleeps; en tests se
//! sustituye por un reloj virtual.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Epoch en milisegundos
    fn now_ms(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}
