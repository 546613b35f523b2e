//! Board LED through the Linux GPIO sysfs interface.

use std::io;
use std::path::{Path, PathBuf};

/// Default GPIO wired to the MicroZed user LED (MIO 47).
pub const DEFAULT_LED_GPIO: u32 = 185;

const SYSFS_GPIO: &str = "/sys/class/gpio";

pub trait Led {
    fn set(&mut self, on: bool) -> io::Result<()>;
}

/// LED driven by writing `/sys/class/gpio/gpioN/value`.
pub struct SysfsLed {
    root: PathBuf,
    gpio: u32,
}

impl SysfsLed {
    pub fn new(gpio: u32) -> Self {
        Self::with_root(SYSFS_GPIO, gpio)
    }

    /// Use `root` in place of `/sys/class/gpio`.
    pub fn with_root(root: impl AsRef<Path>, gpio: u32) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            gpio,
        }
    }

    /// Export the pin if needed, configure it as output and switch the LED off.
    pub fn init(&mut self) -> io::Result<()> {
        if !self.pin_dir().exists() {
            std::fs::write(self.root.join("export"), self.gpio.to_string())?;
        }
        std::fs::write(self.pin_dir().join("direction"), "out")?;
        self.set(false)
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.gpio))
    }
}

impl Led for SysfsLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        std::fs::write(self.pin_dir().join("value"), if on { "1" } else { "0" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(p: PathBuf) -> String {
        std::fs::read_to_string(p).unwrap()
    }

    #[test]
    fn init_configures_exported_pin() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("gpio185")).unwrap();
        let mut led = SysfsLed::with_root(root.path(), 185);
        led.init().unwrap();
        assert_eq!(read(root.path().join("gpio185/direction")), "out");
        assert_eq!(read(root.path().join("gpio185/value")), "0");
        assert!(!root.path().join("export").exists());

        led.set(true).unwrap();
        assert_eq!(read(root.path().join("gpio185/value")), "1");
    }

    #[test]
    fn init_exports_missing_pin() {
        let root = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::with_root(root.path(), 42);
        // Without a kernel behind it the pin directory never appears.
        assert!(led.init().is_err());
        assert_eq!(read(root.path().join("export")), "42");
    }
}
