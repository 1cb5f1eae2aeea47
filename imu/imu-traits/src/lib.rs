use std::error::Error as StdError;
use std::fmt;
use std::io;

#[cfg(feature = "high_precision")]
pub type Float = f64;
#[cfg(not(feature = "high_precision"))]
pub type Float = f32;

// --- Basic Types ---
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    pub x: Float,
    pub y: Float,
}

/// One parsed two-axis sample (horizontal, vertical).
pub type Reading = Vector2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: Float, y: Float) -> Self {
        Self { x, y }
    }

    pub fn scale(&self, k: Float) -> Self {
        Self {
            x: self.x * k,
            y: self.y * k,
        }
    }

    /// Clamps both axes to [-1, 1].
    pub fn clamped(&self) -> Self {
        Self {
            x: self.x.clamp(-1.0, 1.0),
            y: self.y.clamp(-1.0, 1.0),
        }
    }

    /// Negates the horizontal axis, for sensors mounted facing the user.
    pub fn mirrored_x(&self) -> Self {
        Self {
            x: -self.x,
            y: self.y,
        }
    }
}

impl From<(Float, Float)> for Vector2 {
    fn from((x, y): (Float, Float)) -> Self {
        Self { x, y }
    }
}

impl From<Vector2> for (Float, Float) {
    fn from(v: Vector2) -> Self {
        (v.x, v.y)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector2(x={}, y={})", self.x, self.y)
    }
}

impl Vector3 {
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector3(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

/// Orientation in degrees as reported by the sensor firmware.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Euler {
    pub pitch: Float,
    pub roll: Float,
    pub yaw: Float,
}

impl Euler {
    pub fn new(pitch: Float, roll: Float, yaw: Float) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Rotation matrix `Rz(yaw) * Ry(pitch) * Rx(roll)`, row major.
    pub fn rotation_matrix(&self) -> [[Float; 3]; 3] {
        let (sr, cr) = self.roll.to_radians().sin_cos();
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();

        [
            [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
            [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
            [-sp, cp * sr, cp * cr],
        ]
    }

    pub fn rotate(&self, vector: Vector3) -> Vector3 {
        let m = self.rotation_matrix();
        Vector3 {
            x: m[0][0] * vector.x + m[0][1] * vector.y + m[0][2] * vector.z,
            y: m[1][0] * vector.x + m[1][1] * vector.y + m[1][2] * vector.z,
            z: m[2][0] * vector.x + m[2][1] * vector.y + m[2][2] * vector.z,
        }
    }
}

impl fmt::Display for Euler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Euler(pitch={}, roll={}, yaw={})",
            self.pitch, self.roll, self.yaw
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Scanning => write!(f, "scanning"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

// --- Standard Error Type ---
#[derive(Debug)]
pub enum ImuError {
    /// Error originating from the underlying device communication
    DeviceError(String),
    /// Error reading data from the device
    ReadError(String),
    /// Invalid reader configuration
    ConfigurationError(String),
    /// Poisoned lock shared with the reader thread
    LockError(String),
    /// Line received from the device could not be parsed
    InvalidPacket(String),
}

impl fmt::Display for ImuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImuError::DeviceError(s) => write!(f, "Device error: {}", s),
            ImuError::ReadError(s) => write!(f, "Read error: {}", s),
            ImuError::ConfigurationError(s) => write!(f, "Configuration error: {}", s),
            ImuError::LockError(s) => write!(f, "Lock error: {}", s),
            ImuError::InvalidPacket(s) => write!(f, "Invalid packet: {}", s),
        }
    }
}

impl StdError for ImuError {}

impl From<io::Error> for ImuError {
    fn from(err: io::Error) -> Self {
        ImuError::ReadError(err.to_string())
    }
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for ImuError {
    fn from(err: serialport::Error) -> Self {
        ImuError::DeviceError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ImuError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ImuError::LockError(err.to_string())
    }
}

/// Consumer-facing side of a tilt source.
pub trait TiltReader {
    /// Latest smoothed tilt; zero when no data is available.
    fn snapshot(&self) -> Reading;

    fn state(&self) -> ConnectionState;

    fn stop(&self);
}
