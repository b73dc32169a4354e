use serde::Serialize;
use tracing::info;

use crate::client::IdeasHub;
use crate::models::{
    Credentials, MessageResponse, SignupRequest, TokenGrant, UserProfile, VerificationStatus,
};
use crate::transport::{ApiError, ApiRequest};

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct EmailTokenBody<'a> {
    email: &'a str,
    token: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordBody<'a> {
    token: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

fn require(value: &str, what: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{what} is required")));
    }
    Ok(())
}

impl IdeasHub {
    /// Sign in with email and password and remember the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        require(email, "email")?;
        require(password, "password")?;
        let body = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let grant: TokenGrant = self
            .primary
            .json(ApiRequest::post("/login").json(&body)?)
            .await?;
        self.start_session(grant, "password").await
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        require(name, "name")?;
        require(email, "email")?;
        require(password, "password")?;
        let body = SignupRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let grant: TokenGrant = self
            .primary
            .json(ApiRequest::post("/signup").json(&body)?)
            .await?;
        self.start_session(grant, "signup").await
    }

    async fn start_session(&self, grant: TokenGrant, method: &str) -> Result<UserProfile, ApiError> {
        self.cache.clear().await;
        match self.session.establish(grant, method).await? {
            Some(user) => Ok(user),
            None => self.me().await,
        }
    }

    /// Fetch the signed-in profile and keep it on the session.
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let user: UserProfile = self.primary.json(ApiRequest::get("/me")).await?;
        self.session.set_user(user.clone()).await;
        Ok(user)
    }

    /// Finish an OAuth redirect: store its tokens, then confirm with `/me`.
    pub async fn complete_oauth_callback(&self, callback: &str) -> Result<UserProfile, ApiError> {
        self.session.establish_from_callback(callback).await?;
        self.cache.clear().await;
        let user = self.me().await?;
        info!(user_id = %user.id, "oauth session verified");
        Ok(user)
    }

    pub fn google_login_url(&self) -> String {
        format!("{}/auth/google/login", self.primary.base_url())
    }

    /// Local sign-out; the backend keeps no server-side session to revoke.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.cache.clear().await;
        self.session.logout().await
    }

    /// Confirm an email address from the link token.
    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse, ApiError> {
        require(token, "verification token")?;
        self.primary
            .json(ApiRequest::get("/verify-email").query("token", token.trim()))
            .await
    }

    /// Confirm an email address with a code typed by the user.
    pub async fn confirm_email(&self, email: &str, token: &str) -> Result<MessageResponse, ApiError> {
        require(email, "email")?;
        require(token, "verification token")?;
        let body = EmailTokenBody {
            email: email.trim(),
            token: token.trim(),
        };
        self.primary
            .json(ApiRequest::post("/verify-email").json(&body)?)
            .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse, ApiError> {
        require(email, "email")?;
        self.primary
            .json(ApiRequest::post("/resend-verification").json(&EmailBody { email: email.trim() })?)
            .await
    }

    pub async fn verification_status(&self) -> Result<VerificationStatus, ApiError> {
        self.primary.json(ApiRequest::get("/verification-status")).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        require(email, "email")?;
        self.primary
            .json(ApiRequest::post("/auth/forgot-password").json(&EmailBody { email: email.trim() })?)
            .await
    }

    pub async fn resend_reset_email(&self, email: &str) -> Result<MessageResponse, ApiError> {
        require(email, "email")?;
        self.primary
            .json(
                ApiRequest::post("/auth/resend-reset-email")
                    .json(&EmailBody { email: email.trim() })?,
            )
            .await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        require(token, "reset token")?;
        if new_password.is_empty() || confirm_password.is_empty() {
            return Err(ApiError::validation("both password fields are required"));
        }
        if new_password != confirm_password {
            return Err(ApiError::validation("passwords do not match"));
        }
        let body = ResetPasswordBody {
            token: token.trim(),
            new_password,
            confirm_password,
        };
        self.primary
            .json(ApiRequest::post("/auth/reset-password").json(&body)?)
            .await
    }
}
