//! Player registration and the tournament OAuth (PKCE) flow.
//!
//! The HTTP side is an external collaborator consumed through
//! [`RegistrationApi`]; this module owns only the client-side
//! artifacts: the typed pending-authorization context carried across
//! the redirect boundary, PKCE material generation, and callback
//! validation. OAuth failures are terminal — surfaced to the caller
//! for a manual recovery action, never retried automatically.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::PathBuf;

const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;
// RFC 7636 unreserved characters.
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// The local player as known after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub user_id: String,
    pub nick_name: String,
    pub tournament_mode: bool,
    pub account_id: Option<String>,
    pub game_session_id: Option<String>,
}

/// Everything that must survive the authorization redirect, as one
/// explicit record instead of ambient key-value storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOauthContext {
    pub state: String,
    pub code_verifier: String,
    pub nickname: Option<String>,
    pub game_session_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OauthError {
    /// The provider redirected back with an error parameter.
    Provider(String),
    /// The callback lacked the authorization code or state parameter.
    MissingParams,
    /// No pending context was found; the verifier and expected state
    /// are gone, so the exchange cannot proceed.
    MissingContext,
    /// CSRF check failed: callback state did not match the saved state.
    StateMismatch,
    /// The context store could not serialize or recover the record.
    Storage(String),
    /// The registration collaborator reported a failure.
    Api(String),
}

impl fmt::Display for OauthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OauthError::Provider(e) => write!(f, "authorization provider error: {}", e),
            OauthError::MissingParams => write!(f, "callback is missing code or state"),
            OauthError::MissingContext => write!(f, "no pending authorization context"),
            OauthError::StateMismatch => write!(f, "state verification failed"),
            OauthError::Storage(e) => write!(f, "context storage error: {}", e),
            OauthError::Api(e) => write!(f, "registration request failed: {}", e),
        }
    }
}

impl Error for OauthError {}

/// Serialization collaborator for the pending context. Artifacts are
/// single-use: `take` removes the record it returns.
pub trait ContextStore {
    fn save(&mut self, context: &PendingOauthContext) -> Result<(), OauthError>;
    fn take(&mut self) -> Result<Option<PendingOauthContext>, OauthError>;
}

#[derive(Default)]
pub struct InMemoryContextStore {
    context: Option<PendingOauthContext>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextStore for InMemoryContextStore {
    fn save(&mut self, context: &PendingOauthContext) -> Result<(), OauthError> {
        self.context = Some(context.clone());
        Ok(())
    }

    fn take(&mut self) -> Result<Option<PendingOauthContext>, OauthError> {
        Ok(self.context.take())
    }
}

/// File-backed store for hosts that restart between the authorization
/// request and the callback.
pub struct FileContextStore {
    path: PathBuf,
}

impl FileContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContextStore for FileContextStore {
    fn save(&mut self, context: &PendingOauthContext) -> Result<(), OauthError> {
        let data =
            bincode::serialize(context).map_err(|e| OauthError::Storage(e.to_string()))?;
        fs::write(&self.path, data).map_err(|e| OauthError::Storage(e.to_string()))
    }

    fn take(&mut self) -> Result<Option<PendingOauthContext>, OauthError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OauthError::Storage(e.to_string())),
        };
        let context =
            bincode::deserialize(&data).map_err(|e| OauthError::Storage(e.to_string()))?;
        // Single-use: a replayed callback must not find the artifacts.
        fs::remove_file(&self.path).map_err(|e| OauthError::Storage(e.to_string()))?;
        Ok(Some(context))
    }
}

/// Parameters to put on the provider's authorization URL.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeRequest {
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

/// Query parameters the provider sends back to the redirect target.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Validated output of the callback, ready for the token exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OauthExchange {
    pub authorization_code: String,
    pub code_verifier: String,
    pub nickname: Option<String>,
    pub game_session_id: Option<String>,
}

/// S256 code challenge for `verifier`.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// Starts an authorization attempt: generates the PKCE pair and state
/// token, saves the pending context, and returns the parameters for
/// the authorization URL.
pub fn begin_authorization(
    store: &mut impl ContextStore,
    rng: &mut impl Rng,
    nickname: Option<String>,
    game_session_id: Option<String>,
) -> Result<AuthorizeRequest, OauthError> {
    let code_verifier = random_token(rng, VERIFIER_LEN);
    let state = random_token(rng, STATE_LEN);

    store.save(&PendingOauthContext {
        state: state.clone(),
        code_verifier: code_verifier.clone(),
        nickname,
        game_session_id,
    })?;

    Ok(AuthorizeRequest {
        state,
        code_challenge: code_challenge(&code_verifier),
        code_challenge_method: "S256",
    })
}

/// Validates the provider callback against the pending context and
/// hands back the material for the server-side token exchange.
pub fn complete_authorization(
    store: &mut impl ContextStore,
    callback: &CallbackParams,
) -> Result<OauthExchange, OauthError> {
    if let Some(error) = &callback.error {
        return Err(OauthError::Provider(error.clone()));
    }

    let (code, state) = match (&callback.code, &callback.state) {
        (Some(code), Some(state)) => (code, state),
        _ => return Err(OauthError::MissingParams),
    };

    let context = store.take()?.ok_or(OauthError::MissingContext)?;
    if context.state != *state {
        return Err(OauthError::StateMismatch);
    }

    Ok(OauthExchange {
        authorization_code: code.clone(),
        code_verifier: context.code_verifier,
        nickname: context.nickname,
        game_session_id: context.game_session_id,
    })
}

/// Request body for the tournament registration endpoint; the token
/// exchange itself happens server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentRegistration {
    pub nick_name: String,
    pub authorization_code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    pub game_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentAccount {
    pub user_id: String,
    pub account_id: String,
}

/// The HTTP registration collaborator. Implementations live outside
/// this crate; tests script it.
pub trait RegistrationApi {
    /// Registers (or re-registers) a casual player; returns the user id.
    async fn register_player(
        &self,
        user_id: Option<&str>,
        nick_name: &str,
    ) -> Result<String, OauthError>;

    /// Exchanges the authorization code and registers a tournament player.
    async fn register_tournament_player(
        &self,
        registration: &TournamentRegistration,
    ) -> Result<TournamentAccount, OauthError>;

    /// Links a game account from an intent one-time token.
    async fn verify_game_account(
        &self,
        account_linking_token: &str,
    ) -> Result<TournamentAccount, OauthError>;
}

/// Completes a tournament sign-in: validated callback material goes to
/// the registration collaborator and comes back as the local identity.
pub async fn register_tournament(
    api: &impl RegistrationApi,
    exchange: OauthExchange,
    redirect_uri: &str,
) -> Result<PlayerIdentity, OauthError> {
    let nick_name = exchange.nickname.clone().unwrap_or_default();
    let account = api
        .register_tournament_player(&TournamentRegistration {
            nick_name: nick_name.clone(),
            authorization_code: exchange.authorization_code,
            code_verifier: exchange.code_verifier,
            redirect_uri: redirect_uri.to_string(),
            game_session_id: exchange.game_session_id.clone(),
        })
        .await?;

    Ok(PlayerIdentity {
        user_id: account.user_id,
        nick_name,
        tournament_mode: true,
        account_id: Some(account.account_id),
        game_session_id: exchange.game_session_id,
    })
}
