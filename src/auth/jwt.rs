//! JWT Token处理模块

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::business::domain::AuthUser;

/// JWT Claims结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // 用户ID
    pub email: String,        // 邮箱
    pub role: String,         // 角色
    #[serde(default)]
    pub demo: bool,           // 是否为演示身份
    pub exp: i64,             // 过期时间
    pub iat: i64,             // 签发时间
    pub iss: String,          // 签发者
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            is_demo: claims.demo,
        }
    }
}

/// JWT Token服务
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry_hours: i64,
}

impl JwtService {
    /// 创建新的JWT服务
    pub fn new(secret: &str, issuer: String, expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            expiry_hours: expiry_hours.max(1),
        }
    }

    /// 为用户签发Token
    pub fn generate_token(&self, user: &AuthUser) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.expiry_hours);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            demo: user.is_demo,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::AuthenticationFailed(format!("Token生成失败: {}", e)))
    }

    /// 验证JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    pub fn expiry_hours(&self) -> i64 {
        self.expiry_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: "demo-user".to_string(),
            email: "demo@promptstack.dev".to_string(),
            role: "admin".to_string(),
            is_demo: true,
        }
    }

    #[test]
    fn test_round_trip_identity() {
        let service = JwtService::new("secret", "promptstack-gateway".to_string(), 24);
        let token = service.generate_token(&user()).unwrap();
        let identity: AuthUser = service.verify_token(&token).unwrap().into();
        assert_eq!(identity, user());
    }

    #[test]
    fn test_rejects_other_secret_and_issuer() {
        let issuer = JwtService::new("secret", "promptstack-gateway".to_string(), 24);
        let token = issuer.generate_token(&user()).unwrap();

        let wrong_secret = JwtService::new("other", "promptstack-gateway".to_string(), 24);
        assert!(matches!(wrong_secret.verify_token(&token), Err(AuthError::InvalidToken)));

        let wrong_issuer = JwtService::new("secret", "someone-else".to_string(), 24);
        assert!(matches!(wrong_issuer.verify_token(&token), Err(AuthError::InvalidToken)));

        assert!(issuer.verify_token("not-a-jwt").is_err());
    }
}
