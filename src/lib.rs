#![doc = include_str!("../README.md")]
#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod bits;
mod config;
mod current;
mod driver;
mod error;
mod profiles;
mod registers;
mod transport;

pub use config::{ChopperMode, Configuration, CoolStepCurrentFloor, DriveMode, SlopeControl};
pub use current::SenseVoltage;
pub use driver::Tmc26x;
pub use error::{ConfigError, Error};
pub use profiles::{MotorProfile, StepDirSpreadCycleProfile};
pub use registers::{ReadbackChannel, Register};
pub use transport::{SpiTransport, SpiTransportError, Transport};
