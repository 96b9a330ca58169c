use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use tandem_chat::ChatClient;
use tandem_db::Database;
use tandem_types::api::{
    AuthResponse, Claims, LoginRequest, OnboardingRequest, SignupRequest, StatusMessage,
};

use crate::convert::account_from_row;
use crate::error::{ApiError, INVALID_CREDENTIALS};
use crate::middleware::CurrentUser;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub chat: ChatClient,
    pub secure_cookies: bool,
}

pub const SESSION_COOKIE: &str = "jwt";

const SESSION_TTL_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.full_name.trim();
    let email = req.email.trim();

    // Validate input
    if full_name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::Validation("Invalid email format".into()));
    }

    // Check if email is taken
    if state.db.get_user_by_email(email)?.is_some() {
        return Err(ApiError::Conflict(
            "Email already exists, please use a different one".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    // Random default avatar from the pool the clients know how to render.
    let idx = rand::rng().random_range(1..=100);
    let profile_pic = format!("https://avatar.iran.liara.run/public/{idx}.png");

    if let Err(err) =
        state
            .db
            .create_user(&user_id.to_string(), full_name, email, &password_hash, &profile_pic)
    {
        // A concurrent signup can slip past the pre-check; the UNIQUE index
        // on email turns the loser into a conflict, not a second row.
        if tandem_db::is_constraint_violation(&err) {
            return Err(ApiError::Conflict(
                "Email already exists, please use a different one".into(),
            ));
        }
        return Err(err.into());
    }

    let row = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("account missing right after insert"))?;
    let account = account_from_row(row);

    // The provider profile is a non-authoritative cache: a failed sync is
    // logged and never fails the signup.
    sync_chat_profile(&state, &account.id, &account.full_name, &account.profile_pic).await;

    let token = issue_session_token(&state.jwt_secret, account.id)?;
    let jar = jar.add(session_cookie(token, state.secure_cookies));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse { success: true, user: account }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }

    // Unknown email and wrong password are indistinguishable to the caller.
    let row = state
        .db
        .get_user_by_email(req.email.trim())?
        .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;

    if !verify_password(&row.password, &req.password)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    let account = account_from_row(row);
    let token = issue_session_token(&state.jwt_secret, account.id)?;
    let jar = jar.add(session_cookie(token, state.secure_cookies));

    Ok((jar, Json(AuthResponse { success: true, user: account })))
}

/// Clears the session cookie unconditionally. The token itself stays valid
/// until its natural expiry; there is no server-side revocation.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(clear_session_cookie());
    (
        jar,
        Json(StatusMessage {
            success: true,
            message: "Logged out successfully".into(),
        }),
    )
}

pub async fn onboarding(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<OnboardingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut missing = Vec::new();
    let full_name = required_field(&req.full_name, "fullName", &mut missing);
    let bio = required_field(&req.bio, "bio", &mut missing);
    let native_language = required_field(&req.native_language, "nativeLanguage", &mut missing);
    let learning_language = required_field(&req.learning_language, "learningLanguage", &mut missing);
    let location = required_field(&req.location, "location", &mut missing);

    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "All fields are required. Missing: {}",
            missing.join(", ")
        )));
    }

    let row = state
        .db
        .complete_onboarding(
            &user.account.id.to_string(),
            full_name,
            bio,
            native_language,
            learning_language,
            location,
        )?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let account = account_from_row(row);

    // Same best-effort policy as signup.
    sync_chat_profile(&state, &account.id, &account.full_name, &account.profile_pic).await;

    Ok(Json(AuthResponse { success: true, user: account }))
}

fn required_field<'a>(
    value: &'a Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(name);
            ""
        }
    }
}

async fn sync_chat_profile(state: &AppState, id: &Uuid, name: &str, image: &str) {
    if let Err(err) = state.chat.upsert_user(&id.to_string(), name, image).await {
        warn!("Chat profile sync failed for {}: {:#}", id, err);
    }
}

// -- Password hashing --

fn hash_password(raw: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(stored_hash: &str, candidate: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash unparseable: {}", e))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

// -- Session tokens --

pub fn issue_session_token(secret: &str, account_id: Uuid) -> Result<String, ApiError> {
    let claims = Claims {
        sub: account_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("token signing failed: {}", e))?;
    Ok(token)
}

/// Signature check plus expiry. Tampering, malformed input and expiry all
/// come back as None — callers treat every failure as unauthenticated.
pub fn verify_session_token(secret: &str, token: &str) -> Option<Uuid> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_ordinary_addresses() {
        assert!(EMAIL_RE.is_match("ana@example.com"));
        assert!(EMAIL_RE.is_match("a.b+c@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_malformed_addresses() {
        assert!(!EMAIL_RE.is_match("no-at-sign.com"));
        assert!(!EMAIL_RE.is_match("missing@dot"));
        assert!(!EMAIL_RE.is_match("white space@example.com"));
        assert!(!EMAIL_RE.is_match("two@@example.com"));
        assert!(!EMAIL_RE.is_match("trailing@example.com "));
    }

    #[test]
    fn password_is_stored_salted_and_never_plaintext() {
        let hash = hash_password("hunter2secret").unwrap();
        assert_ne!(hash, "hunter2secret");
        assert!(!hash.contains("hunter2secret"));
        assert!(hash.starts_with("$argon2"));

        // Salting: hashing twice never yields the same string.
        let other = hash_password("hunter2secret").unwrap();
        assert_ne!(hash, other);
    }

    #[test]
    fn password_verification_round_trips() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn session_token_round_trips() {
        let id = Uuid::new_v4();
        let token = issue_session_token("secret", id).unwrap();
        assert_eq!(verify_session_token("secret", &token), Some(id));
    }

    #[test]
    fn tampered_expired_and_garbage_tokens_all_fail_identically() {
        let id = Uuid::new_v4();

        // Wrong signing key.
        let token = issue_session_token("secret", id).unwrap();
        assert_eq!(verify_session_token("other-secret", &token), None);

        // Tampered payload.
        let mut tampered = token.clone();
        tampered.replace_range(10..11, if &token[10..11] == "A" { "B" } else { "A" });
        assert_eq!(verify_session_token("secret", &tampered), None);

        // Expired (well past the verifier's leeway).
        let claims = Claims {
            sub: id,
            exp: (chrono::Utc::now() - chrono::Duration::days(1)).timestamp() as usize,
        };
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(verify_session_token("secret", &expired), None);

        // Garbage.
        assert_eq!(verify_session_token("secret", "not-a-token"), None);
        assert_eq!(verify_session_token("secret", ""), None);
    }

    #[test]
    fn session_cookie_is_locked_down() {
        let cookie = session_cookie("tok".into(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn missing_onboarding_fields_are_each_named() {
        let mut missing = Vec::new();
        required_field(&None, "fullName", &mut missing);
        required_field(&Some("  ".into()), "bio", &mut missing);
        required_field(&Some("Portuguese".into()), "nativeLanguage", &mut missing);
        assert_eq!(missing, vec!["fullName", "bio"]);
    }
}
