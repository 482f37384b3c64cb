use std::time::{Duration, Instant};

const REPORT_INTERVAL_SECS: f32 = 0.5;

pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_rate_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    tick_ms: f32,
    last_rate: Option<f32>,
    label: String,
}

impl FrameTiming {
    pub fn new(label: impl Into<String>, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_rate_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            tick_ms: 0.0,
            last_rate: None,
            label: label.into(),
        }
    }

    pub fn set_tick_ms(&mut self, tick_ms: f32) {
        self.tick_ms = tick_ms;
    }

    /// Ticks per second over the last completed report window.
    pub fn rate(&self) -> Option<f32> {
        self.last_rate
    }

    pub fn update(&mut self, now: Instant) {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_rate_time);
        if elapsed.as_secs_f32() >= REPORT_INTERVAL_SECS {
            let rate = self.frame_count as f32 / elapsed.as_secs_f32();
            log::debug!(
                "{} - {:.1} ticks/s (cadence {:.2} ms, tick {:.2} ms)",
                self.label,
                rate,
                self.frame_dt * 1000.0,
                self.tick_ms
            );
            self.last_rate = Some(rate);
            self.frame_count = 0;
            self.last_rate_time = now;
        }
    }
}
