use crate::images::{FetchError, TransportError};
use rocket::http::Status;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    FetchError(FetchError),
    InvalidUrl(String),
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        ApiError::FetchError(error)
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::InvalidUrl(_) => Status::BadRequest,
            ApiError::FetchError(FetchError::EmptyData) => Status::BadGateway,
            ApiError::FetchError(FetchError::BadUrl) => Status::UnprocessableEntity,
            ApiError::FetchError(FetchError::Transport(TransportError::Timeout)) => Status::GatewayTimeout,
            ApiError::FetchError(FetchError::Transport(TransportError::Status(_))) => Status::BadGateway,
            ApiError::FetchError(FetchError::Transport(_)) => Status::ServiceUnavailable,
            ApiError::FetchError(FetchError::Decode(_)) => Status::InternalServerError,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::InvalidUrl(_) => "Invalid URL",
            ApiError::FetchError(FetchError::EmptyData) => "Empty image data",
            ApiError::FetchError(FetchError::BadUrl) => "Bad image URL",
            ApiError::FetchError(FetchError::Transport(_)) => "Image network error",
            ApiError::FetchError(FetchError::Decode(_)) => "Image decode error",
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let message = match &self {
            ApiError::InvalidUrl(message) => message.clone(),
            ApiError::FetchError(error) => error.to_string(),
        };

        let body = json!({
            "error": self.label(),
            "message": message
        })
        .to_string();

        rocket::Response::build()
            .status(self.status())
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), std::io::Cursor::new(body))
            .ok()
    }
}
