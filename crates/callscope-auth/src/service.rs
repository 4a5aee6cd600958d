//! Authentication service: registration, login, credential resolution,
//! password reset and user provisioning.

use callscope_core::error::{CallscopeError, CallscopeResult};
use callscope_core::models::api_key::{ApiKey, CreateApiKey};
use callscope_core::models::organization::{
    CreateOrganization, Organization, SubscriptionTier, UpdateOrganization, normalize_code,
};
use callscope_core::models::user::{CreateUser, Role, UpdateUser, User, normalize_email};
use callscope_core::policy::{Principal, TenantScope};
use callscope_core::repository::{ApiKeyRepository, OrganizationRepository, UserRepository};
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api_key;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::mailer::{EmailMessage, Mailer};
use crate::password;
use crate::token;

const MAX_DERIVED_CODE_LEN: usize = 10;

/// Self-service signup: a new organization with its first admin.
#[derive(Debug)]
pub struct RegisterInput {
    pub organization_name: String,
    /// Derived from the organization name when absent.
    pub organization_code: Option<String>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Successful registration or login.
#[derive(Debug)]
pub struct AuthOutput {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: User,
    pub organization: Option<Organization>,
}

/// A user provisioned by an administrator. Without a password the user
/// receives an invitation to set one.
#[derive(Debug)]
pub struct NewUser {
    pub organization_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Option<String>,
    pub role: Role,
    pub is_master_admin: bool,
}

#[derive(Debug)]
pub struct CreatedUser {
    pub user: User,
    /// Handle of the spawned invitation delivery, if one was sent.
    pub invitation: Option<JoinHandle<()>>,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U, O, K, M> {
    users: U,
    organizations: O,
    api_keys: K,
    mailer: M,
    config: AuthConfig,
}

impl<U, O, K, M> AuthService<U, O, K, M>
where
    U: UserRepository,
    O: OrganizationRepository,
    K: ApiKeyRepository,
    M: Mailer + Clone + 'static,
{
    pub fn new(users: U, organizations: O, api_keys: K, mailer: M, config: AuthConfig) -> Self {
        Self {
            users,
            organizations,
            api_keys,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an organization (Free tier) and its first admin user, then
    /// issue a token for that user.
    pub async fn register(&self, input: RegisterInput) -> CallscopeResult<AuthOutput> {
        password::check_policy(&input.password, self.config.min_password_length)?;
        self.ensure_email_available(&input.email).await?;

        let code = match input.organization_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let code = normalize_code(code);
                if self.organizations.get_by_code(&code).await.is_ok() {
                    return Err(CallscopeError::AlreadyExists {
                        entity: "organization code".into(),
                    });
                }
                code
            }
            _ => self.derive_code(&input.organization_name).await?,
        };

        let organization = self
            .organizations
            .create(CreateOrganization {
                name: input.organization_name,
                code,
                subscription_tier: SubscriptionTier::Free,
                features: None,
                is_master: false,
                metadata: None,
            })
            .await?;

        let password_hash = password::hash_password(&input.password, self.config.pepper.as_deref())?;
        let user = match self
            .users
            .create(CreateUser {
                organization_id: Some(organization.id),
                email: input.email,
                first_name: input.first_name,
                last_name: input.last_name,
                password_hash,
                role: Role::Admin,
                is_master_admin: false,
            })
            .await
        {
            Ok(user) => user,
            Err(e) => {
                // Leave no usable tenant without an admin behind.
                let deactivate = UpdateOrganization {
                    is_active: Some(false),
                    ..Default::default()
                };
                if let Err(cleanup) = self.organizations.update(organization.id, deactivate).await {
                    warn!(organization_id = %organization.id, error = %cleanup, "Failed to deactivate orphaned organization");
                }
                return Err(e);
            }
        };

        self.organizations
            .increment_usage(organization.id, 1, 0)
            .await?;

        info!(organization_id = %organization.id, user_id = %user.id, "Organization registered");

        let access_token = token::issue_access_token(&user, &self.config)?;
        let organization = self.organizations.get_by_id(organization.id).await?;
        Ok(AuthOutput {
            access_token,
            expires_in: self.config.jwt_expiry_secs,
            user,
            organization: Some(organization),
        })
    }

    pub async fn login(&self, input: LoginInput) -> CallscopeResult<AuthOutput> {
        let user = match self.users.get_by_email(&input.email).await {
            Ok(user) => user,
            Err(CallscopeError::NotFound { .. }) => {
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        let organization = self.active_organization_of(&user).await?;

        let user = self
            .users
            .update(
                TenantScope::All,
                user.id,
                UpdateUser {
                    last_login_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let access_token = token::issue_access_token(&user, &self.config)?;
        Ok(AuthOutput {
            access_token,
            expires_in: self.config.jwt_expiry_secs,
            user,
            organization,
        })
    }

    /// Resolve a bearer token into a principal. Role, flags and the
    /// organization's master status are read from the current records,
    /// so changes apply without re-login.
    pub async fn authenticate_token(&self, bearer: &str) -> CallscopeResult<Principal> {
        let claims = token::decode_access_token(bearer, &self.config)?;
        let user_id = claims.user_id()?;

        let user = match self.users.get_by_id(TenantScope::All, user_id).await {
            Ok(user) => user,
            Err(CallscopeError::NotFound { .. }) => {
                return Err(AuthError::TokenInvalid("user no longer exists".into()).into());
            }
            Err(e) => return Err(e),
        };
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        let organization = self.active_organization_of(&user).await?;
        Ok(Principal {
            user_id: Some(user.id),
            organization_id: user.organization_id,
            role: user.role,
            is_master_admin: user.is_master_admin,
            organization_is_master: organization.is_some_and(|o| o.is_master),
        })
    }

    /// Resolve an `x-api-key` value into a principal pinned to the key's
    /// organization with the `user` role.
    pub async fn authenticate_api_key(&self, raw: &str) -> CallscopeResult<Principal> {
        let (prefix, secret) = api_key::parse(raw)?;

        let key = match self.api_keys.get_by_prefix(prefix).await {
            Ok(key) => key,
            Err(CallscopeError::NotFound { .. }) => return Err(AuthError::InvalidApiKey.into()),
            Err(e) => return Err(e),
        };
        if !key.is_active || !api_key::verify_secret(secret, &key.secret_hash) {
            return Err(AuthError::InvalidApiKey.into());
        }

        let organization = self.organizations.get_by_id(key.organization_id).await?;
        if !organization.is_active {
            return Err(AuthError::OrganizationInactive.into());
        }
        if !organization.features.api_access {
            return Err(AuthError::ApiAccessDisabled.into());
        }

        if let Err(e) = self.api_keys.touch(key.id, Utc::now()).await {
            warn!(api_key_id = %key.id, error = %e, "Failed to record API key use");
        }

        Ok(Principal {
            user_id: None,
            organization_id: Some(organization.id),
            role: Role::User,
            is_master_admin: false,
            organization_is_master: false,
        })
    }

    /// Start a password reset. Unknown or inactive emails succeed
    /// silently so the endpoint cannot be used to discover accounts.
    pub async fn forgot_password(&self, email: &str) -> CallscopeResult<Option<JoinHandle<()>>> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(CallscopeError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let raw = self.store_reset_token(user.id).await?;
        let message = EmailMessage {
            to: user.email.clone(),
            subject: "Reset your CallScope password".into(),
            body: format!(
                "Hello {},\n\nUse the link below to choose a new password. \
                 It expires in {} minutes.\n\n{}\n\n\
                 If you did not request this, you can ignore this email.\n",
                user.first_name,
                self.config.reset_token_lifetime_secs / 60,
                self.config.reset_link(&raw),
            ),
        };
        Ok(Some(self.dispatch(message)))
    }

    /// Complete a password reset with the emailed token.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> CallscopeResult<()> {
        password::check_policy(new_password, self.config.min_password_length)?;

        let user = match self
            .users
            .get_by_reset_token_hash(&token::hash_token(raw_token))
            .await
        {
            Ok(user) => user,
            Err(CallscopeError::NotFound { .. }) => {
                return Err(AuthError::TokenInvalid("unknown reset token".into()).into());
            }
            Err(e) => return Err(e),
        };
        let expired = user
            .reset_token_expires_at
            .is_none_or(|expires_at| expires_at <= Utc::now());

        let mut update = UpdateUser {
            reset_token_hash: Some(None),
            reset_token_expires_at: Some(None),
            ..Default::default()
        };
        if !expired {
            update.password_hash = Some(password::hash_password(
                new_password,
                self.config.pepper.as_deref(),
            )?);
        }
        // The token is single-use either way.
        self.users.update(TenantScope::All, user.id, update).await?;

        if expired {
            return Err(AuthError::TokenExpired.into());
        }
        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> CallscopeResult<()> {
        let user = self.users.get_by_id(TenantScope::All, user_id).await?;
        let valid = password::verify_password(
            current_password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }
        password::check_policy(new_password, self.config.min_password_length)?;

        self.users
            .update(
                TenantScope::All,
                user.id,
                UpdateUser {
                    password_hash: Some(password::hash_password(
                        new_password,
                        self.config.pepper.as_deref(),
                    )?),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Provision a user, enforcing the organization's `max_users` limit.
    ///
    /// The usage counter is bumped by a separate write after the user is
    /// stored.
    pub async fn create_user(&self, input: NewUser) -> CallscopeResult<CreatedUser> {
        if let Some(org_id) = input.organization_id {
            let organization = self.organizations.get_by_id(org_id).await?;
            if !organization.is_active {
                return Err(CallscopeError::validation("organization is inactive"));
            }
            if !organization
                .features
                .allows_users(organization.usage.user_count)
            {
                return Err(CallscopeError::LimitExceeded {
                    limit: "max_users".into(),
                });
            }
        }
        self.ensure_email_available(&input.email).await?;

        let invite = input.password.is_none();
        let password = match input.password {
            Some(password) => {
                password::check_policy(&password, self.config.min_password_length)?;
                password
            }
            // Unusable until the invitation is accepted.
            None => token::generate_opaque_token(),
        };
        let password_hash = password::hash_password(&password, self.config.pepper.as_deref())?;

        let user = self
            .users
            .create(CreateUser {
                organization_id: input.organization_id,
                email: input.email,
                first_name: input.first_name,
                last_name: input.last_name,
                password_hash,
                role: input.role,
                is_master_admin: input.is_master_admin,
            })
            .await?;

        if let Some(org_id) = user.organization_id {
            self.organizations.increment_usage(org_id, 1, 0).await?;
        }

        let invitation = if invite {
            let raw = self.store_reset_token(user.id).await?;
            Some(self.dispatch(EmailMessage {
                to: user.email.clone(),
                subject: "You have been invited to CallScope".into(),
                body: format!(
                    "Hello {},\n\nAn account has been created for you. \
                     Choose a password to get started:\n\n{}\n",
                    user.first_name,
                    self.config.reset_link(&raw),
                ),
            }))
        } else {
            None
        };

        info!(user_id = %user.id, invited = invite, "User created");
        Ok(CreatedUser { user, invitation })
    }

    /// Soft-delete a user and release its seat.
    pub async fn deactivate_user(&self, scope: TenantScope, user_id: Uuid) -> CallscopeResult<User> {
        let user = self.users.get_by_id(scope, user_id).await?;
        if !user.is_active {
            return Ok(user);
        }
        let user = self
            .users
            .update(
                scope,
                user_id,
                UpdateUser {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        if let Some(org_id) = user.organization_id {
            self.organizations.increment_usage(org_id, -1, 0).await?;
        }
        Ok(user)
    }

    /// Mint an API key for an organization with API access. Returns the
    /// stored key and the raw `prefix_secret` value.
    pub async fn create_api_key(
        &self,
        organization_id: Uuid,
        name: String,
        created_by: Option<Uuid>,
    ) -> CallscopeResult<(ApiKey, String)> {
        if name.trim().is_empty() {
            return Err(CallscopeError::validation("API key name is required"));
        }
        let organization = self.organizations.get_by_id(organization_id).await?;
        if !organization.features.api_access {
            return Err(AuthError::ApiAccessDisabled.into());
        }

        let generated = api_key::generate();
        let key = self
            .api_keys
            .create(CreateApiKey {
                organization_id,
                name: name.trim().to_string(),
                prefix: generated.prefix,
                secret_hash: generated.secret_hash,
                created_by,
            })
            .await?;
        info!(organization_id = %organization_id, api_key_id = %key.id, "API key created");
        Ok((key, generated.raw))
    }

    async fn ensure_email_available(&self, email: &str) -> CallscopeResult<()> {
        if normalize_email(email).is_empty() {
            return Err(CallscopeError::validation("email is required"));
        }
        match self.users.get_by_email(email).await {
            Ok(_) => Err(CallscopeError::AlreadyExists {
                entity: "user with this email".into(),
            }),
            Err(CallscopeError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn active_organization_of(&self, user: &User) -> CallscopeResult<Option<Organization>> {
        let Some(org_id) = user.organization_id else {
            return Ok(None);
        };
        let organization = self.organizations.get_by_id(org_id).await?;
        if !organization.is_active && !user.is_master_admin {
            return Err(AuthError::OrganizationInactive.into());
        }
        Ok(Some(organization))
    }

    async fn derive_code(&self, name: &str) -> CallscopeResult<String> {
        let mut base: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(MAX_DERIVED_CODE_LEN)
            .collect::<String>()
            .to_ascii_uppercase();
        if base.is_empty() {
            base = "ORG".into();
        }
        if self.organizations.get_by_code(&base).await.is_err() {
            return Ok(base);
        }
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{base}-{}", suffix[..4].to_ascii_uppercase()))
    }

    /// Store a fresh reset token hash on the user and return the raw token.
    async fn store_reset_token(&self, user_id: Uuid) -> CallscopeResult<String> {
        let raw = token::generate_opaque_token();
        let expires_at =
            Utc::now() + Duration::seconds(self.config.reset_token_lifetime_secs as i64);
        self.users
            .update(
                TenantScope::All,
                user_id,
                UpdateUser {
                    reset_token_hash: Some(Some(token::hash_token(&raw))),
                    reset_token_expires_at: Some(Some(expires_at)),
                    ..Default::default()
                },
            )
            .await?;
        Ok(raw)
    }

    fn dispatch(&self, message: EmailMessage) -> JoinHandle<()> {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let to = message.to.clone();
            if let Err(e) = mailer.send(message).await {
                warn!(to = %to, error = %e, "Email delivery failed");
            }
        })
    }
}
