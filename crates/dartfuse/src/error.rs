/// Errors returned by the named-key flag surface.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown flag `{0}`")]
    UnknownKey(String),
}

impl ConfigError {
    /// Integer status for callers that speak status codes (0 is success).
    pub fn code(&self) -> i32 {
        match self {
            ConfigError::UnknownKey(_) => -1,
        }
    }
}

/// Status code of a flag update: 0 on success, the error's code otherwise.
pub fn status_code(result: &Result<(), ConfigError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
