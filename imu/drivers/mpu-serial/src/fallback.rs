// Picks between the tilt sensor and the keyboard as a 2D input source.

use imu_traits::{ConnectionState, Reading, TiltReader};

/// Direction keys currently held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl KeyState {
    /// Unit direction with screen coordinates (y grows downwards).
    /// Right wins over left and down over up when both are held.
    pub fn direction(&self) -> Reading {
        let mut x = 0.0;
        let mut y = 0.0;
        if self.left {
            x = -1.0;
        }
        if self.right {
            x = 1.0;
        }
        if self.up {
            y = -1.0;
        }
        if self.down {
            y = 1.0;
        }
        Reading::new(x, y)
    }
}

pub enum TiltInput<R: TiltReader> {
    Sensor(R),
    Keyboard,
}

impl<R: TiltReader> TiltInput<R> {
    /// Uses `reader` if it is connected, the keyboard otherwise.
    pub fn from_reader(reader: R) -> Self {
        if reader.state() == ConnectionState::Connected {
            TiltInput::Sensor(reader)
        } else {
            TiltInput::Keyboard
        }
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self, TiltInput::Sensor(r) if r.state() == ConnectionState::Connected)
    }

    /// Player input in [-1, 1]². The sensor's horizontal axis is mirrored
    /// to match how the board is held.
    pub fn read(&self, keys: &KeyState) -> Reading {
        match self {
            TiltInput::Sensor(reader) if reader.state() == ConnectionState::Connected => {
                reader.snapshot().mirrored_x().clamped()
            }
            _ => keys.direction(),
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_sensor() {
            "MPU: Connected"
        } else {
            "Keyboard Mode"
        }
    }

    pub fn stop(&self) {
        if let TiltInput::Sensor(reader) = self {
            reader.stop();
        }
    }
}
