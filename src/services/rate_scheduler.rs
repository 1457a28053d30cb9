//! services/rate_scheduler.rs
//! Ritmo de envío en ráfagas aleatorias.
//!
//! Se combinan dos límites independientes: el del proveedor (`count` cada
//! `period_hours`) y el de la campaña (por minuto). De ambos sale un techo de
//! mensajes por ventana de 5 minutos:
//!
//! - techo >= 1: ventana fija de 5 min, ráfaga = floor(techo), repartida en dos
//!   instantes aleatorios dentro de la ventana.
//! - techo < 1: ventana de `60s / tasa_por_minuto` con un solo envío.
//!
//! Nunca se supera el más estricto de los dos límites.

use std::time::Duration;

use rand::Rng;

use crate::models::provider_model::ProviderRateLimit;

pub const STANDARD_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Pausa fija entre envíos de una misma ráfaga.
pub const SEND_PACING: Duration = Duration::from_millis(200);
const MAX_TRAILING_MARGIN: Duration = Duration::from_secs(60);
const WINDOW_MINUTES: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePlan {
    pub window: Duration,
    /// Máximo de mensajes por ventana.
    pub burst_size: u64,
    /// 2 en modo normal, 1 en modo de bajo caudal.
    pub offsets_per_window: usize,
}

/// Un grupo de envíos a realizar `offset` después del inicio de la ventana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub offset: Duration,
    pub size: u64,
}

impl RatePlan {
    pub fn derive(provider: ProviderRateLimit, campaign_per_minute: u32) -> RatePlan {
        let campaign_per_window = f64::from(campaign_per_minute.max(1)) * WINDOW_MINUTES;
        let provider_per_window = if provider.is_unbounded() {
            f64::INFINITY
        } else {
            f64::from(provider.count) / (provider.period_hours * 60.0) * WINDOW_MINUTES
        };

        let ceiling = campaign_per_window.min(provider_per_window);

        if ceiling >= 1.0 {
            return RatePlan {
                window: STANDARD_WINDOW,
                burst_size: ceiling.floor() as u64,
                offsets_per_window: 2,
            };
        }

        let per_minute = ceiling / WINDOW_MINUTES;
        let window =
            Duration::try_from_secs_f64(60.0 / per_minute).unwrap_or(Duration::MAX);
        RatePlan {
            window,
            burst_size: 1,
            offsets_per_window: 1,
        }
    }

    /// min(60s, 10% de la ventana)
    pub fn trailing_margin(&self) -> Duration {
        (self.window / 10).min(MAX_TRAILING_MARGIN)
    }

    /// Planifica una ventana: instantes ordenados y cuántos mensajes en cada uno.
    /// Nunca planifica más de `remaining` ni más de `burst_size`.
    pub fn plan_window<R: Rng + ?Sized>(&self, rng: &mut R, remaining: u64) -> Vec<Burst> {
        let usable_ms = self
            .window
            .saturating_sub(self.trailing_margin())
            .as_millis()
            .min(u128::from(u64::MAX)) as u64;

        let shares: Vec<u64> = if self.offsets_per_window >= 2 && self.burst_size >= 2 {
            let first = self.burst_size.div_ceil(2);
            vec![first, self.burst_size - first]
        } else {
            vec![self.burst_size]
        };

        let mut offsets: Vec<Duration> = shares
            .iter()
            .map(|_| {
                let ms = if usable_ms == 0 {
                    0
                } else {
                    rng.gen_range(0..usable_ms)
                };
                Duration::from_millis(ms)
            })
            .collect();
        offsets.sort();

        let mut left = remaining;
        offsets
            .into_iter()
            .zip(shares)
            .filter_map(|(offset, share)| {
                let size = share.min(left);
                left -= size;
                (size > 0).then_some(Burst { offset, size })
            })
            .collect()
    }
}
