// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::session::{CandidateRef, JobRef},
};

/// Candidate token claims, as minted by the embedding application.
///
/// The identifier triple travels as optional fields because upstream
/// payloads are loosely typed; it is checked exactly once, in the auth
/// middleware, and everything past that boundary works with a fully
/// resolved [`CandidateRef`].
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the employee ID (as string).
    pub sub: String,
    /// Exam the token grants an attempt on.
    pub exam_id: Option<i64>,
    /// Job posting id; `0` marks a refresher exam.
    pub job_id: Option<i64>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// Resolves the identifier triple. Fails fast on any missing or
    /// malformed component instead of degrading downstream.
    pub fn candidate_ref(&self) -> Result<CandidateRef, AppError> {
        let employee_id: i64 = self
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Token has no employee id".to_string()))?;
        let exam_id = self
            .exam_id
            .ok_or_else(|| AppError::AuthError("Token has no exam id".to_string()))?;
        let job = self
            .job_id
            .and_then(JobRef::from_raw)
            .ok_or_else(|| AppError::AuthError("Token has no valid job id".to_string()))?;

        Ok(CandidateRef {
            employee_id,
            exam_id,
            job,
        })
    }
}

/// Signs a candidate token. The embedding application does this when it
/// hands a candidate to the exam step; tests use it to mint fixtures.
pub fn sign_jwt(
    employee_id: i64,
    exam_id: i64,
    job_id: i64,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: employee_id.to_string(),
        exam_id: Some(exam_id),
        job_id: Some(job_id),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a candidate token.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Candidate Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header, resolves the
/// identifier triple, and injects the validated `CandidateRef` into the
/// request extensions. Requests with a missing or incomplete triple never
/// reach a handler.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    let claims = match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    match claims.candidate_ref() {
        Ok(candidate) => {
            req.extensions_mut().insert(candidate);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}
