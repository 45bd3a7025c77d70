use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetcountError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),

    #[error("Count store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {message}")]
    Ledger { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SheetcountError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures of the frame source collaborator
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unable to open source {uri}: {details}")]
    Unavailable { uri: String, details: String },

    #[error("Undecodable frame record at line {line}: {details}")]
    Decode { line: u64, details: String },
}

/// Failures of the persistence collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request to {endpoint} failed: {details}")]
    Request { endpoint: String, details: String },

    #[error("Malformed store response: {details}")]
    Decode { details: String },

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SheetcountError>;
