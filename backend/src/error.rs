use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::ErrorReply;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Ledger(#[from] shared::Error),
    #[error("Vote ledger lock poisoned")]
    LockPoisoned,
}

impl ApiError {
    pub fn reply(&self) -> ErrorReply {
        match self {
            ApiError::Ledger(e) => ErrorReply::from(e),
            ApiError::LockPoisoned => ErrorReply::new(500, "internal server error"),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let reply = self.reply();
        let status = Status::from_code(reply.status).unwrap_or(Status::InternalServerError);

        rocket::Response::build_from(Json(reply).respond_to(req)?)
            .status(status)
            .ok()
    }
}
