use crate::error::{AppError, AppResult};
use crate::utils::permissions::{Permission, Principal};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    #[serde(default)]
    pub perms: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access"
}

impl Claims {
    /// 转换为请求主体；未知权限名直接忽略
    pub fn into_principal(self) -> AppResult<Principal> {
        let user_id = self
            .sub
            .parse::<i32>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        let permissions = self
            .perms
            .iter()
            .filter_map(|p| p.parse::<Permission>().ok())
            .collect();
        Ok(Principal::new(user_id, permissions))
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
        }
    }

    /// 签发访问令牌。令牌通常由外部认证服务签发，这里主要供运维脚本与测试使用
    pub fn generate_access_token(
        &self,
        user_id: i32,
        permissions: &[Permission],
    ) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_expires_in);

        let claims = Claims {
            sub: user_id.to_string(),
            perms: permissions.iter().map(|p| p.to_string()).collect(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != "access" {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }
}
