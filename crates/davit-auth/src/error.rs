use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("The credentials were missing, or were insufficient to perform the operation requested")]
    Unauthorized,
    #[error("The credentials supplied were invalid")]
    InvalidCredentials,
    #[error("Encountered internal error in auth operation")]
    ServiceError(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthorized | Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                [(
                    header::WWW_AUTHENTICATE,
                    r#"Basic realm="Authorization Required""#,
                )],
                self.to_string(),
            )
                .into_response(),
            Self::ServiceError(error) => {
                tracing::error!(?error, "Encountered service error in auth operation");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
