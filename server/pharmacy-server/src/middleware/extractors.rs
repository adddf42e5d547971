//! Extractors whose rejections render as `ApiError` JSON bodies

use crate::error::ApiError;
use axum::extract::{FromRequest, FromRequestParts};

/// `axum::Json` with a 400 `ApiError` on malformed or missing bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path`; non-integer ids are rejected with 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
