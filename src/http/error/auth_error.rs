use actix_web::{error, http::StatusCode, HttpResponse, HttpResponseBuilder};
use derive_more::{Display, Error};

/// Request-time authentication failure.
///
/// Authenticators signal failure with typed errors instead of writing to the
/// response; only the security handler turns an error into an HTTP response.
/// A `Protocol` error means the authentication scheme itself broke down
/// (credential store unavailable, malformed credential) and is reported as a
/// 500 with the error's message.
#[derive(Debug, Display, Error)]
pub enum AuthError {
    #[display("unauthorized")]
    Unauthorized,
    #[display("{message}")]
    Protocol {
        #[error(not(source))]
        message: String,
    },
}

impl AuthError {
    /// Wraps a low-level scheme failure.
    pub fn protocol(message: impl Into<String>) -> Self {
        AuthError::Protocol {
            message: message.into(),
        }
    }
}

impl error::ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match *self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Protocol { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.status_code()).body(self.to_string())
    }
}
