use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

/// JSON body extractor and response whose rejections and failures surface as [`ServerError`].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// The success envelope: `{"status": "success", "message": ..., ...body}`.
#[derive(Clone, Debug, Serialize)]
pub struct Reply<T> {
    #[serde(skip)]
    code: StatusCode,
    status: &'static str,
    message: &'static str,
    #[serde(flatten)]
    body: T,
}

/// A reply body without extra fields.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct Empty {}

/// A reply body carrying `{"data": ...}`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Reply<T> {
    pub fn ok(message: &'static str, body: T) -> Self {
        Self {
            code: StatusCode::OK,
            status: "success",
            message,
            body,
        }
    }

    pub fn created(message: &'static str, body: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::ok(message, body)
        }
    }
}

impl Reply<Empty> {
    pub fn message(message: &'static str) -> Self {
        Self::ok(message, Empty {})
    }
}

impl<T> Reply<Data<T>> {
    pub fn data(message: &'static str, data: T) -> Self {
        Self::ok(message, Data { data })
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
