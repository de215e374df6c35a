use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Workspace discovery failed: {0}")]
    Discovery(String),

    #[error("Git command failed: {0}")]
    Git(String),

    #[error("Invalid repository reference: {0}")]
    InvalidRepository(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
