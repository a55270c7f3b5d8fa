use jsonwebtoken::{decode, DecodingKey, TokenData as JwtTokenData, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,    // Subject (user ID)
    pub email: String,
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

/// Verify a token issued by the identity service sharing our secret.
pub fn verify_jwt(token: &str) -> Result<JwtTokenData<Claims>, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let validation = Validation::default();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
}

fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set, using default (insecure for production)");
        "your-secret-key".to_string()
    })
}
