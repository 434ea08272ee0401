pub type MockupResult<T> = Result<T, MockupError>;

#[derive(thiserror::Error, Debug)]
pub enum MockupError {
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("load error: {0}")]
    Load(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MockupError {
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            MockupError::contract("x")
                .to_string()
                .contains("contract violation:")
        );
        assert!(MockupError::load("x").to_string().contains("load error:"));
        assert!(
            MockupError::encode("x")
                .to_string()
                .contains("encoding error:")
        );
        assert!(
            MockupError::metadata("x")
                .to_string()
                .contains("metadata error:")
        );
        assert!(MockupError::config("x").to_string().contains("config error:"));
        assert!(MockupError::worker("x").to_string().contains("worker error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = MockupError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
