use crate::prelude::*;

/// Semantic app error.
/// * For HTML responses, gets templated into a nice error page.
/// * For JSON responses, gets rendered as `{"error": "message"}`.
#[derive(Debug)]
pub enum AppError {
    NotFound,
    Unauthorized,
    Invalid(String),
    CreateFailed,
    UpdateFailed,
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound => "Not found.",
            AppError::Unauthorized => "Unauthorized.",
            AppError::Invalid(message) => message,
            AppError::CreateFailed => "Creation failed.",
            AppError::UpdateFailed => "Update failed.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::CreateFailed | AppError::UpdateFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Extractor rejections render like any other page error.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        HtmlError::App(self).into_response()
    }
}

/// API-only JSON handler return type.
/// Returns either T as JSON, or {error: "message"}
pub type JsonResult<T> = Result<Json<T>, JsonError>;
#[derive(Debug)]
pub enum JsonError {
    App(AppError),
    Any(anyhow::Error),
}
impl From<AppError> for JsonError {
    fn from(e: AppError) -> Self {
        Self::App(e)
    }
}
macro_rules! impl_json_from {
    ( $from:ty ) => {
        impl From<$from> for JsonError {
            fn from(e: $from) -> Self {
                Self::Any(anyhow::Error::from(e))
            }
        }
    };
}

/// User-visible HTML handler return type.
pub type HtmlResult = Result<Response, HtmlError>;
#[derive(Debug)]
pub enum HtmlError {
    App(AppError),
    Any(anyhow::Error),
}
impl From<AppError> for HtmlError {
    fn from(e: AppError) -> Self {
        Self::App(e)
    }
}
macro_rules! impl_html_from {
    ( $from:ty ) => {
        impl From<$from> for HtmlError {
            fn from(e: $from) -> Self {
                Self::Any(anyhow::Error::from(e))
            }
        }
    };
}

#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorHtml {
    pub user: Option<User>,
    pub title: String,
    pub message: String,
    pub context: Option<String>,
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        if let HtmlError::Any(e) = &self {
            tracing::error!("{e:#}");
        }

        #[cfg(debug_assertions)]
        let context = match &self {
            HtmlError::App(_) => None,
            HtmlError::Any(e) => Some(format!("{e:?}")),
        };
        #[cfg(not(debug_assertions))]
        let context = None;

        let (status, html) = match &self {
            HtmlError::App(e) => (e.status(), ErrorHtml {
                user: None,
                title: "Error".into(),
                message: e.message().into(),
                context,
            }),
            HtmlError::Any(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorHtml {
                user: None,
                title: "We encountered an unexpected error".into(),
                message: "Something went wrong on our end. Please try again in a moment.".into(),
                context,
            }),
        };
        (status, html).into_response()
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            JsonError::App(e) => (e.status(), e.message()),
            JsonError::Any(e) => {
                tracing::error!("{e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        };

        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// Conversions from any and all other error types to our app error types
macro_rules! impl_from {
    ( $($from:ty),* ) => {
        $(
            impl_html_from!($from);
            impl_json_from!($from);
        )*
    }
}
impl_from! {
    askama::Error,
    lettre::error::Error,
    lettre::transport::smtp::Error,
    sqlx::Error
}
impl From<anyhow::Error> for JsonError {
    fn from(e: anyhow::Error) -> Self {
        Self::Any(e)
    }
}
impl From<anyhow::Error> for HtmlError {
    fn from(e: anyhow::Error) -> Self {
        Self::Any(e)
    }
}

// Helpers
pub fn not_found() -> AppError {
    AppError::NotFound
}
pub fn unauthorized() -> AppError {
    AppError::Unauthorized
}
pub fn invalid(message: impl Into<String>) -> AppError {
    AppError::Invalid(message.into())
}
