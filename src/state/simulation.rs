//! Per-room Pong simulation: paddles, ball, scoring and the fixed-rate step.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use super::geometry::{Geometry, MAX_BOUNCE_ANGLE, POINTS_TO_WIN, RETURN_ACCELERATION, WIN_MARGIN};

/// Fixed identity of a player inside a room, assigned at join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Slot 0, defends the left goal.
    Left,
    /// Slot 1, defends the right goal.
    Right,
}

impl Slot {
    /// Both slots in index order.
    pub const ALL: [Slot; 2] = [Slot::Left, Slot::Right];

    /// Wire index of the slot (0 or 1).
    pub fn index(self) -> usize {
        match self {
            Slot::Left => 0,
            Slot::Right => 1,
        }
    }

    /// The other player's slot.
    pub fn opponent(self) -> Slot {
        match self {
            Slot::Left => Slot::Right,
            Slot::Right => Slot::Left,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index() as u8)
    }
}

/// Raised when a client sends a paddle direction outside `{-1, 0, 1}`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid paddle direction `{0}`")]
pub struct InvalidDirection(pub i8);

/// Requested paddle movement, as sent by clients (`-1`, `0` or `1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    /// Towards y = 0.
    Up,
    /// No movement.
    #[default]
    Idle,
    /// Towards the bottom wall.
    Down,
}

impl Direction {
    fn delta(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Idle => 0.0,
            Direction::Down => 1.0,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Up),
            0 => Ok(Direction::Idle),
            1 => Ok(Direction::Down),
            other => Err(InvalidDirection(other)),
        }
    }
}

impl From<Direction> for i8 {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Up => -1,
            Direction::Idle => 0,
            Direction::Down => 1,
        }
    }
}

/// Ball position, heading and scalar speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ball {
    /// Horizontal center position.
    pub x: f64,
    /// Vertical center position.
    pub y: f64,
    /// Horizontal heading component, negative towards slot 0.
    pub dx: f64,
    /// Vertical heading component, negative towards the top wall.
    pub dy: f64,
    /// Distance travelled per tick along `(dx, dy)`.
    pub speed: f64,
    pub radius: f64,
}

/// Paddle position, score and display name of one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerState {
    /// Top edge of the paddle.
    pub y: f64,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Snapshot broadcast to both clients on every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub width: f64,
    pub height: f64,
    /// Thickness of the walls and center line.
    pub line_width: f64,
    pub paddle_width: f64,
    /// Distance between a side wall and the paddle's back face.
    pub paddle_gap: f64,
    pub paddle_height: f64,
    /// Paddle travel per tick while a direction is held.
    #[serde(rename = "playerSpeed")]
    pub paddle_speed: f64,
    pub ball: Ball,
    /// The ball only travels once a paddle has moved since the last serve.
    pub active: bool,
    /// Indexed by slot.
    pub players: [PlayerState; 2],
    #[serde(skip)]
    serve_speed: f64,
}

impl SimulationState {
    /// Fresh state: ball at center heading left, paddles in opposite corners.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            width: geometry.width,
            height: geometry.height,
            line_width: geometry.line_width,
            paddle_width: geometry.paddle_width,
            paddle_gap: geometry.paddle_gap,
            paddle_height: geometry.paddle_height,
            paddle_speed: geometry.paddle_speed,
            ball: Ball {
                x: geometry.width / 2.0,
                y: geometry.height / 2.0,
                dx: -1.0,
                dy: 0.0,
                speed: geometry.ball_speed,
                radius: geometry.ball_radius,
            },
            active: false,
            players: [
                PlayerState {
                    y: geometry.paddle_width,
                    ..PlayerState::default()
                },
                PlayerState {
                    y: geometry.height - geometry.paddle_width - geometry.paddle_height,
                    ..PlayerState::default()
                },
            ],
            serve_speed: geometry.ball_speed,
        }
    }

    /// Paddle and score of `slot`.
    pub fn player(&self, slot: Slot) -> &PlayerState {
        &self.players[slot.index()]
    }

    pub fn player_mut(&mut self, slot: Slot) -> &mut PlayerState {
        &mut self.players[slot.index()]
    }

    /// Scores indexed by slot.
    pub fn scores(&self) -> [u32; 2] {
        [self.players[0].score, self.players[1].score]
    }

    /// Advance the simulation by one tick.
    ///
    /// `directions` holds the latest requested direction of each bound slot
    /// (`None` when nobody occupies the slot). Returns the slot that scored, if
    /// the ball crossed a goal line during this step; paddle collisions are
    /// skipped on such a step.
    pub fn step(&mut self, directions: [Option<Direction>; 2]) -> Option<Slot> {
        for slot in Slot::ALL {
            match directions[slot.index()] {
                Some(Direction::Idle) | None => {}
                Some(direction) => {
                    self.move_paddle(slot, direction);
                    self.active = true;
                }
            }
        }

        if self.active {
            self.ball.x += self.ball.dx * self.ball.speed;
            self.ball.y += self.ball.dy * self.ball.speed;
        }

        self.bounce_off_walls();

        if let Some(scorer) = self.detect_goal() {
            return Some(scorer);
        }

        self.collide_with_paddles();
        None
    }

    /// Credit a point to `scorer`, returning the winner if the match is decided.
    ///
    /// A non-decisive point re-serves the ball from the center.
    pub fn award_point(&mut self, scorer: Slot) -> Option<Slot> {
        self.player_mut(scorer).score += 1;
        match self.winner() {
            Some(winner) => {
                self.active = false;
                Some(winner)
            }
            None => {
                self.reset_ball();
                None
            }
        }
    }

    /// Slot that satisfies the win-by-two rule, if any.
    pub fn winner(&self) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| {
            let own = self.player(*slot).score;
            let other = self.player(slot.opponent()).score;
            own >= POINTS_TO_WIN && own.saturating_sub(other) >= WIN_MARGIN
        })
    }

    /// Put the ball back in the center for the next serve.
    ///
    /// The serve heads left for cumulative points 0-1, right for 2-3, and so on.
    pub fn reset_ball(&mut self) {
        let total = self.players[0].score + self.players[1].score;
        self.ball.x = self.width / 2.0;
        self.ball.y = self.height / 2.0;
        self.ball.dx = if total % 4 < 2 { -1.0 } else { 1.0 };
        self.ball.dy = 0.0;
        self.ball.speed = self.serve_speed;
        self.active = false;
    }

    fn move_paddle(&mut self, slot: Slot, direction: Direction) {
        let max_y = self.height - self.paddle_height;
        let speed = self.paddle_speed;
        let player = self.player_mut(slot);
        player.y = (player.y + direction.delta() * speed).clamp(0.0, max_y);
    }

    fn bounce_off_walls(&mut self) {
        let ball = &mut self.ball;
        let hits_top = ball.dy < 0.0 && ball.y < self.line_width;
        let hits_bottom = ball.dy > 0.0 && self.height - ball.y < self.line_width;
        if hits_top || hits_bottom {
            ball.dy = -ball.dy;
        }
    }

    fn detect_goal(&self) -> Option<Slot> {
        let goal_line = self.line_width / 2.0;
        if self.ball.x < goal_line {
            Some(Slot::Right)
        } else if self.width - self.ball.x < goal_line {
            Some(Slot::Left)
        } else {
            None
        }
    }

    fn collide_with_paddles(&mut self) {
        let face = self.paddle_gap + self.paddle_width;
        let radius = self.ball.radius;

        if self.ball.dx < 0.0
            && self.ball.x - radius <= face
            && self.covers(Slot::Left, self.ball.y)
        {
            self.ball.x = face + radius;
            self.deflect(Slot::Left);
        } else if self.ball.dx > 0.0
            && self.ball.x + radius >= self.width - face
            && self.covers(Slot::Right, self.ball.y)
        {
            self.ball.x = self.width - face - radius;
            self.deflect(Slot::Right);
        }
    }

    fn covers(&self, slot: Slot, y: f64) -> bool {
        let top = self.player(slot).y;
        y >= top && y <= top + self.paddle_height
    }

    /// Send the ball back with an angle proportional to where it hit the paddle.
    fn deflect(&mut self, slot: Slot) {
        let half = self.paddle_height / 2.0;
        let center = self.player(slot).y + half;
        let offset = ((self.ball.y - center) / half).clamp(-1.0, 1.0);
        let angle = offset * MAX_BOUNCE_ANGLE;
        let heading = if self.ball.dx < 0.0 { 1.0 } else { -1.0 };

        self.ball.dx = angle.cos() * heading;
        self.ball.dy = angle.sin();
        self.ball.speed *= RETURN_ACCELERATION;
    }
}
