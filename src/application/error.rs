use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError, presentation::views::TemplateRenderError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
}

impl From<crate::infra::api::ApiError> for AppError {
    fn from(error: crate::infra::api::ApiError) -> Self {
        Self::Infra(InfraError::from(error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Infra(InfraError::from(error))
    }
}
