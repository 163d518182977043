//! Motor drivers
//!
//! A [`Motor`] is one independently drivable channel. The control path only
//! ever calls these through [`ActuatorControl`](super::ActuatorControl),
//! which serializes every call behind a single lock.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Direction a channel is being driven in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    Forwards,
    Backwards,
    #[default]
    Stopped,
}

impl std::fmt::Display for Motion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Motion::Forwards => write!(f, "forwards"),
            Motion::Backwards => write!(f, "backwards"),
            Motion::Stopped => write!(f, "stopped"),
        }
    }
}

/// One actuator channel
pub trait Motor: Send + 'static {
    fn forwards(&mut self) -> std::io::Result<()>;

    fn backwards(&mut self) -> std::io::Result<()>;

    fn stop(&mut self) -> std::io::Result<()>;

    /// Drive the channel to the given motion
    fn apply(&mut self, motion: Motion) -> std::io::Result<()> {
        match motion {
            Motion::Forwards => self.forwards(),
            Motion::Backwards => self.backwards(),
            Motion::Stopped => self.stop(),
        }
    }
}

/// Motor that only logs what it is told
///
/// For hosts without motor hardware.
#[derive(Debug)]
pub struct LogMotor {
    name: &'static str,
}

impl LogMotor {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Motor for LogMotor {
    fn forwards(&mut self) -> std::io::Result<()> {
        tracing::debug!(motor = self.name, "forwards");
        Ok(())
    }

    fn backwards(&mut self) -> std::io::Result<()> {
        tracing::debug!(motor = self.name, "backwards");
        Ok(())
    }

    fn stop(&mut self) -> std::io::Result<()> {
        tracing::trace!(motor = self.name, "stop");
        Ok(())
    }
}

/// GPIO line numbers of the two motor channels on an Explorer HAT
pub const EXPLORER_HAT_PINS: [(u32, u32); 2] = [(19, 20), (21, 26)];

const GPIO_ROOT: &str = "/sys/class/gpio";

/// Motor driven by two sysfs GPIO lines
///
/// One line drives the channel forwards, the other backwards; both low is
/// stop. Lines are exported and configured as outputs on open.
#[derive(Debug)]
pub struct GpioMotor {
    forward: File,
    backward: File,
}

impl GpioMotor {
    /// Open the two lines under `/sys/class/gpio`
    pub fn open(forward_pin: u32, backward_pin: u32) -> std::io::Result<Self> {
        Self::open_at(Path::new(GPIO_ROOT), forward_pin, backward_pin)
    }

    /// Open the two lines under an explicit sysfs root
    pub fn open_at(root: &Path, forward_pin: u32, backward_pin: u32) -> std::io::Result<Self> {
        let mut motor = Self {
            forward: open_output(root, forward_pin)?,
            backward: open_output(root, backward_pin)?,
        };
        motor.stop()?;
        Ok(motor)
    }

    fn set(&mut self, forward: bool, backward: bool) -> std::io::Result<()> {
        // Release before engaging so both lines are never high together
        if !forward {
            write_level(&mut self.forward, false)?;
        }
        if !backward {
            write_level(&mut self.backward, false)?;
        }
        if forward {
            write_level(&mut self.forward, true)?;
        }
        if backward {
            write_level(&mut self.backward, true)?;
        }
        Ok(())
    }
}

impl Motor for GpioMotor {
    fn forwards(&mut self) -> std::io::Result<()> {
        self.set(true, false)
    }

    fn backwards(&mut self) -> std::io::Result<()> {
        self.set(false, true)
    }

    fn stop(&mut self) -> std::io::Result<()> {
        self.set(false, false)
    }
}

fn open_output(root: &Path, pin: u32) -> std::io::Result<File> {
    let line: PathBuf = root.join(format!("gpio{}", pin));
    if !line.exists() {
        fs::write(root.join("export"), pin.to_string())?;
    }
    fs::write(line.join("direction"), "out")?;
    OpenOptions::new().write(true).open(line.join("value"))
}

fn write_level(file: &mut File, high: bool) -> std::io::Result<()> {
    file.write_all(if high { b"1" } else { b"0" })?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(pins: &[u32]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "robocast-gpio-{}-{}",
            std::process::id(),
            pins.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("-")
        ));
        for pin in pins {
            let line = root.join(format!("gpio{}", pin));
            fs::create_dir_all(&line).unwrap();
            fs::write(line.join("value"), "").unwrap();
        }
        root
    }

    fn level(root: &Path, pin: u32) -> String {
        fs::read_to_string(root.join(format!("gpio{}", pin)).join("value")).unwrap()
    }

    #[test]
    fn test_gpio_levels() {
        let root = fake_sysfs(&[5, 6]);
        let mut motor = GpioMotor::open_at(&root, 5, 6).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("gpio5").join("direction")).unwrap(),
            "out"
        );

        motor.forwards().unwrap();
        assert!(level(&root, 5).ends_with('1'));
        assert!(level(&root, 6).ends_with('0'));

        motor.backwards().unwrap();
        assert!(level(&root, 5).ends_with('0'));
        assert!(level(&root, 6).ends_with('1'));

        motor.stop().unwrap();
        assert!(level(&root, 5).ends_with('0'));
        assert!(level(&root, 6).ends_with('0'));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_apply_dispatch() {
        let mut motor = LogMotor::new("test");
        assert!(motor.apply(Motion::Forwards).is_ok());
        assert!(motor.apply(Motion::Stopped).is_ok());
    }

    #[test]
    fn test_motion_default_is_stopped() {
        assert_eq!(Motion::default(), Motion::Stopped);
    }
}
