use std::io::Cursor;
use rocket::{
    http::{ContentType, Status},
    request::Request,
    response::{self, Responder, Response},
};
use serde_json::json;
use thiserror::Error;


pub type SiagaResult<T> = Result<T, SiagaError>;


#[derive(Debug, Error)]
pub enum SiagaError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("The map view has been disposed")]
    Disposed,
    #[error("The fetch was cancelled")]
    Cancelled,
    #[error("Database error: {0}")]
    Database(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SiagaError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SiagaError::Validation(msg.into())
    }

    /// Builds the error for a non-success backend response, using the
    /// `message` field of a JSON body when there is one.
    pub fn rejected(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|m| m.to_owned()))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("The request failed with status {}", status));

        SiagaError::Rejected { status, message }
    }

    pub fn status(&self) -> Status {
        match self {
            SiagaError::Validation(_) => Status::UnprocessableEntity,
            SiagaError::Rejected { status: 422, .. } => Status::UnprocessableEntity,
            SiagaError::Rejected { status: 404, .. } | SiagaError::NotFound => Status::NotFound,
            SiagaError::Rejected { .. } | SiagaError::Network(_) => Status::BadGateway,
            SiagaError::Disposed => Status::Gone,
            SiagaError::Cancelled => Status::Conflict,
            _ => Status::InternalServerError,
        }
    }
}

impl From<diesel::result::Error> for SiagaError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => SiagaError::NotFound,
            err => SiagaError::Database(err.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for SiagaError {
    fn from(err: diesel::ConnectionError) -> Self {
        SiagaError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for SiagaError {
    fn from(err: reqwest::Error) -> Self {
        SiagaError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SiagaError {
    fn from(err: serde_json::Error) -> Self {
        SiagaError::Parse(err.to_string())
    }
}

impl From<quick_xml::Error> for SiagaError {
    fn from(err: quick_xml::Error) -> Self {
        SiagaError::Parse(err.to_string())
    }
}

impl<'r> Responder<'r> for SiagaError {
    fn respond_to(self, _: &Request) -> response::Result<'r> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{}", self);
        }

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(Cursor::new(json!({ "message": self.to_string() }).to_string()))
            .ok()
    }
}
