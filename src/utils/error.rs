use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Pixel format error: {message}")]
    Format { message: String },

    #[error("Mastering display metadata error: {message}")]
    MasteringData { message: String },

    #[error("HDR extraction failed with exit code {code}: {stderr}")]
    HdrExtract { code: i32, stderr: String },

    #[error("HDR injection failed with exit code {code}: {stderr}")]
    HdrInject { code: i32, stderr: String },

    #[error("Transcode error: {message}")]
    Transcode { message: String },

    #[error("Remux error: {message}")]
    Remux { message: String },
}

impl Error {
    pub fn probe<T: Into<String>>(message: T) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }

    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn format<T: Into<String>>(message: T) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn mastering_data<T: Into<String>>(message: T) -> Self {
        Self::MasteringData {
            message: message.into(),
        }
    }

    pub fn transcode<T: Into<String>>(message: T) -> Self {
        Self::Transcode {
            message: message.into(),
        }
    }

    pub fn remux<T: Into<String>>(message: T) -> Self {
        Self::Remux {
            message: message.into(),
        }
    }
}
