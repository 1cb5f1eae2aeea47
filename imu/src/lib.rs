pub use imu_traits::*;
pub use mpu_serial::fallback::{KeyState, TiltInput};
pub use mpu_serial::{
    parse_axis_line, parse_orientation_line, History, LineSource, MpuSerialReader, PortProvider,
    ReaderConfig, SystemPorts, WeightSchedule,
};
