use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

/// Outcome class of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub enum Status {
  Success,
  Failure,
}

impl Status {
  pub fn code(self) -> u16 {
    match self {
      Status::Success => 200,
      Status::Failure => 300,
    }
  }
}

impl From<Status> for u16 {
  fn from(status: Status) -> Self {
    status.code()
  }
}

/// What every invocation returns: `{"statusCode": 200|300, "body": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
  pub status_code: Status,
  pub body: String,
}

impl Envelope {
  pub fn success(body: impl Into<String>) -> Self {
    Self {
      status_code: Status::Success,
      body: body.into(),
    }
  }

  pub fn failure(body: impl Into<String>) -> Self {
    Self {
      status_code: Status::Failure,
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    self.status_code == Status::Success
  }
}

impl IntoResponse for Envelope {
  fn into_response(self) -> Response {
    let status = if self.is_success() {
      StatusCode::OK
    } else {
      StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(self)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_serialized_shape() {
    let json = serde_json::to_value(Envelope::success("There were no players")).unwrap();
    assert_eq!(
      json,
      serde_json::json!({ "statusCode": 200, "body": "There were no players" })
    );

    let json = serde_json::to_value(Envelope::failure("boom")).unwrap();
    assert_eq!(json["statusCode"], 300);
  }

  #[test]
  fn test_http_status() {
    assert_eq!(
      Envelope::success("ok").into_response().status(),
      StatusCode::OK
    );
    assert_eq!(
      Envelope::failure("no").into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
