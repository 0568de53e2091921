use std::io;

use thiserror::Error;

use crate::settings::SettingError;

#[derive(Error, Debug)]
pub enum ApiError {
    /* mapped errors */
    #[error(transparent)]
    IOError(#[from] io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    MdnsSdError(#[from] mdns_sd::Error),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    SettingError(#[from] SettingError),

    /* vicecity errors */
    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Plugin constructed without a name")]
    MissingPluginName,

    #[error("Settings file {0:?} must exist and be writable")]
    SettingsFile(String),
}

impl ApiError {
    #[must_use]
    pub fn service_error(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
