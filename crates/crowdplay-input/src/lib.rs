//! Frame-coherent audience input aggregation.
//!
//! Raw button and joystick events arrive from the network at any time. They
//! only ever touch the `next` generation of the counters; the host rotates
//! the generations once per poll so that every query during a frame sees the
//! same answer.
//!
//! State is kept both per control (across all participants) and per
//! (participant, control) pair.

mod aggregator;
mod button;
mod joystick;

pub use aggregator::{InputAggregator, Scope};
pub use button::{ButtonCounters, ButtonEdge, CounterBuffer};
pub use joystick::JoystickAverage;
