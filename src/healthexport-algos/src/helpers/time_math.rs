use chrono::TimeDelta;

/// `delta` in minutes, down to the millisecond.
pub fn minutes(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 60_000_f64
}

pub fn round_float(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
