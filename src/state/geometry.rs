//! Court dimensions and physics constants derived from a single base width.

use std::{f64::consts::FRAC_PI_4, time::Duration};

/// Width of the court every room is simulated on.
pub const BASE_WIDTH: f64 = 1200.0;
/// Court aspect ratio (width / height) shared with the browser renderer.
pub const ASPECT_RATIO: f64 = 1.796_721_311_48;
/// Simulation steps per second.
pub const TICKS_PER_SECOND: u64 = 60;
/// Delay between two simulation steps.
pub const TICK_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / TICKS_PER_SECOND);
/// Speed multiplier applied on every paddle return.
pub const RETURN_ACCELERATION: f64 = 1.05;
/// Deflection applied when the ball hits the very edge of a paddle.
pub const MAX_BOUNCE_ANGLE: f64 = FRAC_PI_4;
/// Minimum score needed to win a match.
pub const POINTS_TO_WIN: u32 = 11;
/// Lead required over the opponent once [`POINTS_TO_WIN`] is reached.
pub const WIN_MARGIN: u32 = 2;

/// Derived table of court and object sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Court width.
    pub width: f64,
    /// Court height, rounded from the width and aspect ratio.
    pub height: f64,
    /// Wall and center line thickness.
    pub line_width: f64,
    /// Paddle thickness.
    pub paddle_width: f64,
    /// Paddle length along the y axis.
    pub paddle_height: f64,
    /// Space between a side wall and its paddle.
    pub paddle_gap: f64,
    /// Paddle travel per tick.
    pub paddle_speed: f64,
    /// Ball radius.
    pub ball_radius: f64,
    /// Ball travel per tick at serve.
    pub ball_speed: f64,
}

impl Geometry {
    /// Derive every dimension from the court width.
    pub fn from_width(width: f64) -> Self {
        let height = (width / ASPECT_RATIO).round();
        Self {
            width,
            height,
            line_width: width / 92.0,
            paddle_width: height / 50.8,
            paddle_height: width * 2.0 / 17.96,
            paddle_gap: width / 46.0,
            paddle_speed: width / 92.0,
            ball_radius: width / 90.0,
            ball_speed: width / 90.0,
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::from_width(BASE_WIDTH)
    }
}
