use derive_more::{Display, Error, From};

/// Errors that stop the server or a single session
#[derive(Debug, Display, Error, From)]
pub enum ServerError {
    #[display("I/O error: {_0}")]
    Io(std::io::Error),
    #[display("Invalid config: {_0}")]
    Config(serde_json::Error),
}
