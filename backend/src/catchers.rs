use rocket::{Request, catch, http::Status, serde::json::Json};
use shared::{envelope::MALFORMED, ErrorReply};

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorReply> {
    Json(ErrorReply::new(400, MALFORMED))
}

// Body parsed as JSON but is not a request envelope.
#[catch(422)]
pub fn unprocessable(_req: &Request) -> (Status, Json<ErrorReply>) {
    (Status::BadRequest, Json(ErrorReply::new(400, MALFORMED)))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ErrorReply> {
    Json(ErrorReply::new(404, "not found"))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorReply> {
    Json(ErrorReply::new(500, "internal server error"))
}
