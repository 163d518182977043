//! Motor control path
//!
//! Movement commands and the safety watchdog race against each other on
//! the same pair of motors:
//!
//! ```text
//!  [control server] --drive()/stop()--+
//!                                     v
//!                         Arc<ActuatorControl>  (one lock: motors + last command time)
//!                                     ^
//!  [watchdog tick]  --stop_if_stale()-+
//! ```
//!
//! No caller ever holds the lock across an await point or alongside any
//! other lock.

pub mod control;
pub mod motor;
pub mod watchdog;

pub use control::{ActuatorControl, Direction, UnknownDirection};
pub use motor::{GpioMotor, LogMotor, Motion, Motor, EXPLORER_HAT_PINS};
pub use watchdog::{Watchdog, WatchdogConfig};
