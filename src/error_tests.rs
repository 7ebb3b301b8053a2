use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::forbidden("forbidden", "denied").http_status(), 403);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::read("read_error", "corrupt").http_status(), 500);
    assert_eq!(AppError::config("config", "bad pattern").http_status(), 500);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn io_errors_split_missing_from_unreadable() {
    let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: AppError = missing.into();
    assert_eq!(err.http_status(), 404);
    assert_eq!(err.code_str(), "source_not_found");

    let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    let err: AppError = denied.into();
    assert_eq!(err.http_status(), 500);
    assert_eq!(err.code_str(), "source_unreadable");
}

#[test]
fn json_body_carries_code_and_message() {
    let body = AppError::not_found("source_not_found", "no such table").to_json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "source_not_found");
    assert_eq!(body["message"], "no such table");
    assert_eq!(AppError::read("read_error", "x").to_string(), "read_error: x");
}
