//! Credential manager — login, second-factor challenge and token refresh.
//!
//! ```text
//! LoggedOut --login--> AwaitingChallenge --submit_challenge--> LoggedIn
//!     ^  \______________________login___________________________/ |
//!     +---------------- invalidate / upstream rejection ----------+
//! ```
//!
//! One flow (login, challenge or refresh) runs at a time; a concurrent
//! attempt fails with [`MiniCamError::OperationInProgress`] instead of
//! queueing behind the first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

use minicam_domain::credential::{
    AccessToken, AuthStatus, LoginOutcome, Secret, SessionCredential,
};
use minicam_domain::error::{MiniCamError, UpstreamError, ValidationError};

use crate::config::ProviderConfig;
use crate::ports::{Grant, LoginResponse, UpstreamAccount};

enum AuthState {
    LoggedOut,
    AwaitingChallenge {
        credential: SessionCredential,
        expires_at: Instant,
    },
    LoggedIn {
        credential: SessionCredential,
        access_token: AccessToken,
        expires_at: Option<Instant>,
    },
}

impl AuthState {
    fn status(&self, now: Instant) -> AuthStatus {
        match self {
            Self::LoggedOut => AuthStatus::LoggedOut,
            Self::AwaitingChallenge { expires_at, .. } if now >= *expires_at => {
                AuthStatus::LoggedOut
            }
            Self::AwaitingChallenge { .. } => AuthStatus::AwaitingChallenge,
            Self::LoggedIn { .. } => AuthStatus::LoggedIn,
        }
    }

    fn logged_in(mut credential: SessionCredential, grant: Grant) -> Self {
        credential.multi_factor_challenge = None;
        credential.refresh_token = grant.refresh_token;
        Self::LoggedIn {
            credential,
            access_token: grant.access_token,
            expires_at: grant.expires_in.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Replace with [`AuthState::LoggedOut`], wiping the secret material held.
    fn reset(&mut self) {
        match std::mem::replace(self, Self::LoggedOut) {
            Self::LoggedOut => {}
            Self::AwaitingChallenge { mut credential, .. } => credential.wipe(),
            Self::LoggedIn {
                mut credential,
                mut access_token,
                ..
            } => {
                credential.wipe();
                access_token.clear();
            }
        }
    }
}

/// Owns the login state of the single upstream account.
pub struct CredentialManager<U> {
    upstream: Arc<U>,
    challenge_ttl: Duration,
    upstream_timeout: Duration,
    state: Mutex<AuthState>,
    flow: Mutex<()>,
    invalidations: watch::Sender<u64>,
}

impl<U: UpstreamAccount> CredentialManager<U> {
    pub fn new(upstream: Arc<U>, config: &ProviderConfig) -> Self {
        let (invalidations, _) = watch::channel(0);
        Self {
            upstream,
            challenge_ttl: config.challenge_ttl(),
            upstream_timeout: config.upstream_timeout(),
            state: Mutex::new(AuthState::LoggedOut),
            flow: Mutex::new(()),
            invalidations,
        }
    }

    /// Current login state. An expired challenge reads as logged out.
    pub async fn status(&self) -> AuthStatus {
        self.state.lock().await.status(Instant::now())
    }

    /// Whether a second-factor challenge is held, expired or not.
    pub async fn challenge_pending(&self) -> bool {
        matches!(*self.state.lock().await, AuthState::AwaitingChallenge { .. })
    }

    /// Receiver that changes every time the session is invalidated, so the
    /// provider can rediscover devices.
    #[must_use]
    pub fn subscribe_invalidations(&self) -> watch::Receiver<u64> {
        self.invalidations.subscribe()
    }

    /// Authenticate `account` with `secret`.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::InvalidArgument`] when either value is empty
    /// - [`MiniCamError::OperationInProgress`] while another flow runs or a
    ///   challenge is pending
    /// - [`MiniCamError::UpstreamUnavailable`] when the upstream cannot be reached
    #[tracing::instrument(skip(self, secret))]
    pub async fn login(&self, account: &str, secret: Secret) -> Result<LoginOutcome, MiniCamError> {
        if account.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "account identifier",
            }
            .into());
        }
        if secret.is_empty() {
            return Err(ValidationError::EmptyField { field: "secret" }.into());
        }
        let _flow = self
            .flow
            .try_lock()
            .map_err(|_| MiniCamError::OperationInProgress)?;
        if self.status().await == AuthStatus::AwaitingChallenge {
            return Err(MiniCamError::OperationInProgress);
        }

        let generation = *self.invalidations.borrow();
        let response = self
            .call_upstream(self.upstream.login(account, &secret))
            .await?;
        let credential = SessionCredential::new(account, secret);
        Ok(self.settle(generation, credential, response, None).await)
    }

    /// Answer the pending second-factor challenge with `code`.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::ChallengeExpired`] when the challenge TTL elapsed;
    ///   the manager is logged out afterwards
    /// - [`MiniCamError::InvalidArgument`] when no challenge is pending or
    ///   `code` is empty
    /// - [`MiniCamError::OperationInProgress`] while another flow runs
    /// - [`MiniCamError::UpstreamUnavailable`] when the upstream cannot be reached
    #[tracing::instrument(skip_all)]
    pub async fn submit_challenge(&self, code: &str) -> Result<LoginOutcome, MiniCamError> {
        if code.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "two factor code",
            }
            .into());
        }
        let _flow = self
            .flow
            .try_lock()
            .map_err(|_| MiniCamError::OperationInProgress)?;

        let (credential, expires_at) = {
            let mut state = self.state.lock().await;
            match &*state {
                AuthState::AwaitingChallenge {
                    credential,
                    expires_at,
                } if Instant::now() < *expires_at => (credential.clone(), *expires_at),
                AuthState::AwaitingChallenge { .. } => {
                    state.reset();
                    tracing::warn!("second factor arrived after the challenge expired");
                    return Err(MiniCamError::ChallengeExpired);
                }
                _ => return Err(ValidationError::NoPendingChallenge.into()),
            }
        };
        let Some(challenge) = credential.multi_factor_challenge.clone() else {
            return Err(ValidationError::NoPendingChallenge.into());
        };

        let generation = *self.invalidations.borrow();
        let response = self
            .call_upstream(self.upstream.verify_challenge(
                &credential.account_identifier,
                &challenge,
                code,
            ))
            .await?;
        Ok(self
            .settle(generation, credential, response, Some(expires_at))
            .await)
    }

    /// Return a valid access token, refreshing it when it has expired.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::UpstreamUnavailable`] with
    ///   [`UpstreamError::NotLoggedIn`] when no session exists
    /// - [`MiniCamError::AuthRejected`] when the refresh was refused; the
    ///   manager is logged out afterwards
    /// - [`MiniCamError::OperationInProgress`] while another flow runs
    pub async fn access_token(&self) -> Result<AccessToken, MiniCamError> {
        let refresh_token = {
            let mut state = self.state.lock().await;
            match &*state {
                AuthState::LoggedIn {
                    access_token,
                    expires_at,
                    ..
                } if expires_at.is_none_or(|at| Instant::now() < at) => {
                    return Ok(access_token.clone());
                }
                AuthState::LoggedIn { credential, .. } => {
                    if let Some(token) = credential.refresh_token.clone() {
                        token
                    } else {
                        tracing::info!("access token expired and cannot be refreshed");
                        state.reset();
                        return Err(MiniCamError::AuthRejected);
                    }
                }
                _ => return Err(UpstreamError::NotLoggedIn.into()),
            }
        };

        let _flow = self
            .flow
            .try_lock()
            .map_err(|_| MiniCamError::OperationInProgress)?;
        let generation = *self.invalidations.borrow();
        let response = self
            .call_upstream(self.upstream.refresh(&refresh_token))
            .await?;

        let mut state = self.state.lock().await;
        if *self.invalidations.borrow() != generation {
            return Err(UpstreamError::NotLoggedIn.into());
        }
        let AuthState::LoggedIn { credential, .. } = &*state else {
            return Err(UpstreamError::NotLoggedIn.into());
        };
        let credential = credential.clone();
        match response {
            LoginResponse::Authenticated(grant) => {
                let token = grant.access_token.clone();
                *state = AuthState::logged_in(credential, grant);
                tracing::debug!("access token refreshed");
                Ok(token)
            }
            LoginResponse::ChallengeRequired { .. } | LoginResponse::Rejected { .. } => {
                tracing::warn!("token refresh rejected");
                state.reset();
                Err(MiniCamError::AuthRejected)
            }
        }
    }

    /// Force [`AuthStatus::LoggedOut`], wipe secrets and ask for rediscovery.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self) {
        self.state.lock().await.reset();
        self.invalidations.send_modify(|generation| *generation += 1);
        tracing::info!("session invalidated");
    }

    /// Drop the session after the upstream refused it, without asking for
    /// rediscovery.
    pub async fn expire_session(&self) {
        self.state.lock().await.reset();
        tracing::warn!("upstream rejected the session, logged out");
    }

    async fn call_upstream<F>(&self, request: F) -> Result<LoginResponse, MiniCamError>
    where
        F: Future<Output = Result<LoginResponse, MiniCamError>>,
    {
        tokio::time::timeout(self.upstream_timeout, request)
            .await
            .map_err(|_| UpstreamError::Timeout)?
    }

    /// Apply an upstream answer, unless the session was invalidated while
    /// the request was in flight.
    async fn settle(
        &self,
        generation: u64,
        mut credential: SessionCredential,
        response: LoginResponse,
        challenge_deadline: Option<Instant>,
    ) -> LoginOutcome {
        let mut state = self.state.lock().await;
        if *self.invalidations.borrow() != generation {
            credential.wipe();
            return LoginOutcome::Failure {
                reason: "credentials changed during login".to_string(),
            };
        }

        match response {
            LoginResponse::Authenticated(grant) => {
                tracing::info!(account = %credential.account_identifier, "logged in");
                *state = AuthState::logged_in(credential, grant);
                LoginOutcome::Success
            }
            LoginResponse::ChallengeRequired { challenge } => {
                tracing::info!(account = %credential.account_identifier, "second factor required");
                credential.multi_factor_challenge = Some(challenge);
                *state = AuthState::AwaitingChallenge {
                    credential,
                    expires_at: challenge_deadline
                        .unwrap_or_else(|| Instant::now() + self.challenge_ttl),
                };
                LoginOutcome::ChallengeRequired
            }
            LoginResponse::Rejected { reason } => {
                tracing::warn!(account = %credential.account_identifier, %reason, "login rejected");
                credential.wipe();
                state.reset();
                LoginOutcome::Failure { reason }
            }
        }
    }
}
