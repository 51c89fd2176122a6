pub use std::convert::Infallible;
pub use std::sync::Arc;
pub use std::time::Duration;

pub use anyhow::{Context as _, Result};
pub use askama::Template;
pub use askama_web::WebTemplate;
pub use axum::extract::{Path, Query, Request, State};
pub use axum::http::request::Parts;
pub use axum::http::{header, StatusCode};
pub use axum::middleware::Next;
pub use axum::response::{IntoResponse, Redirect, Response};
pub use axum::routing::{get, post};
pub use axum::Form;
pub use axum::Json;
pub use axum_extra::extract::cookie::{Cookie, CookieJar};
pub use chrono::Utc;

pub use crate::db::user::{Role, User};
pub use crate::db::Db;
pub use crate::utils::config::Config;
pub use crate::utils::error::{invalid, not_found, unauthorized, AppError, HtmlResult, JsonResult};
pub use crate::utils::routing::{AppRouter, AxumRouter, SharedAppState};
