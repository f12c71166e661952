//! Errors for the capture pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Element size {element} is not an integer # of {sample}-byte samples")]
    ElementSize { element: usize, sample: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown sample type {0}")]
    UnknownSampleType(String),

    #[error("Unknown wire format {0}")]
    UnknownWireFormat(String),

    #[error("Receiver error: {0}")]
    Receiver(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Timed out waiting for consecutive locks on sensor \"{0}\"")]
    SensorLock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header encoding error: {0}")]
    Header(#[from] serde_json::Error),

    #[error("Could not install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("The {0} thread panicked")]
    ThreadPanic(&'static str),
}
