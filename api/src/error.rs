use shelver::ShelverError;
use thiserror::Error;

/// What a request layer would turn into a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }
}

impl From<ShelverError> for ApiError {
    fn from(e: ShelverError) -> Self {
        match e {
            ShelverError::NotFound(_) | ShelverError::InvalidSelection { .. } => {
                ApiError::NotFound(e.to_string())
            }
            ShelverError::NoPathResult(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
