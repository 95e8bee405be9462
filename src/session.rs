//! Session bootstrap: every user authenticates and seeds baseline notes before it may
//! generate steady-state traffic.
//!
//! ```text
//! Unauthenticated -> Authenticating -> Seeding -> Active
//!                          |              |
//!                          +--> Aborted <-+
//! ```
//!
//! Sign-up is best effort, since the identity may already exist. The token exchange must
//! return 200 with a non-empty `access_token`, otherwise the session is
//! [`Aborted`](SessionState::Aborted) and the user exits without running a single task.
//! Nothing is retried.
//!
//! Seeding creates `--seed-records` notes so update and delete have targets from the first
//! scheduler cycle. Failed seed requests are counted and logged, then ignored, unless the
//! API rejects the token itself (401 or 403), which aborts the session.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::{Expect, SwarmMethod, Target};
use crate::metrics::Outcome;
use crate::user::{SwarmUser, SwarmUserCommand};

/// Default username prefix of generated identities.
pub const DEFAULT_USERNAME_PREFIX: &str = "swarm";
/// Default email domain of generated identities.
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";
/// Default password of generated identities.
pub const DEFAULT_PASSWORD: &str = "Swarm-Passw0rd!";
/// Default number of notes created while seeding.
pub const DEFAULT_SEED_RECORDS: usize = 10;

/// Upper bound (exclusive) of the random username suffix.
pub(crate) const SUFFIX_SPACE: u32 = 1_000_000;

pub(crate) const SIGN_UP_LABEL: &str = "sign up";
pub(crate) const LOG_IN_LABEL: &str = "log in";
pub(crate) const SEED_LABEL: &str = "seed note";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Seeding,
    Active,
    Aborted(AuthAbort),
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition(&self, next: &SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Unauthenticated, SessionState::Authenticating)
                | (SessionState::Authenticating, SessionState::Seeding)
                | (SessionState::Seeding, SessionState::Active)
                | (SessionState::Authenticating, SessionState::Aborted(_))
                | (SessionState::Seeding, SessionState::Aborted(_))
        )
    }
}

/// Why a session could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthAbort {
    /// The token exchange didn't return 200. Status 0 means no response arrived.
    TokenExchange { status: u16 },
    /// The token exchange returned 200 without a usable `access_token`.
    MissingToken,
    /// The notes API refused the token while seeding.
    TokenRejected { status: u16 },
}

impl fmt::Display for AuthAbort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthAbort::TokenExchange { status: 0 } => {
                write!(f, "token exchange failed, no response")
            }
            AuthAbort::TokenExchange { status } => write!(f, "token exchange returned {}", status),
            AuthAbort::MissingToken => write!(f, "token exchange returned no access token"),
            AuthAbort::TokenRejected { status } => write!(f, "token rejected with {}", status),
        }
    }
}

/// Credentials a user signs up and logs in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub password: String,
    /// A pre-provisioned account used by every user, never signed up.
    pub shared: bool,
}

impl Identity {
    /// Generate a unique synthetic identity.
    ///
    /// # Example
    /// ```rust
    /// use notesync_swarm::session::Identity;
    /// use rand::SeedableRng;
    ///
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    /// let identity = Identity::generate("load", "notes.test", "secret", &mut rng);
    /// assert!(identity.username.starts_with("load_"));
    /// assert_eq!(identity.email, format!("{}@notes.test", identity.username));
    /// assert!(!identity.shared);
    /// ```
    pub fn generate<R: Rng + ?Sized>(
        prefix: &str,
        domain: &str,
        password: &str,
        rng: &mut R,
    ) -> Self {
        let username = format!("{}_{}", prefix, rng.random_range(0..SUFFIX_SPACE));
        Identity {
            email: format!("{}@{}", username, domain),
            username,
            password: password.to_string(),
            shared: false,
        }
    }

    /// A shared account. A username that is already an email address is used as is.
    pub fn shared(username: &str, password: &str, domain: &str) -> Self {
        let email = if username.contains('@') {
            username.to_string()
        } else {
            format!("{}@{}", username, domain)
        };
        Identity {
            username: username.to_string(),
            email,
            password: password.to_string(),
            shared: true,
        }
    }

    /// JSON body accepted by both the sign-up and the token endpoints.
    pub(crate) fn credentials(&self) -> serde_json::Value {
        serde_json::json!({
            "email": self.email,
            "password": self.password,
        })
    }
}

/// One user's authentication state.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    identity: Identity,
    token: Option<String>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Session {
            state: SessionState::Unauthenticated,
            identity,
            token: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The bearer token, present once authenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Only an active session may run scheduler tasks.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Move to `next`, refusing illegal transitions.
    pub(crate) fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_transition(&next) {
            trace!("session {}: {:?} -> {:?}", self.identity.username, self.state, next);
            self.state = next;
            true
        } else {
            debug_assert!(
                false,
                "illegal session transition {:?} -> {:?}",
                self.state, next
            );
            false
        }
    }

    pub(crate) fn authenticated(&mut self, token: String) -> bool {
        if self.transition(SessionState::Seeding) {
            self.token = Some(token);
            true
        } else {
            false
        }
    }

    pub(crate) fn abort(&mut self, reason: AuthAbort) {
        self.token = None;
        self.transition(SessionState::Aborted(reason));
    }
}

/// How seeding went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Notes created and tracked in the pool.
    pub seeded: usize,
    /// Seed requests that failed.
    pub failures: usize,
}

/// Take a user from `Unauthenticated` to `Active`, or to `Aborted`.
pub(crate) async fn bootstrap(
    user: &mut SwarmUser,
    receiver: &flume::Receiver<SwarmUserCommand>,
) -> Result<SeedReport, AuthAbort> {
    authenticate(user).await?;
    seed(user, receiver).await
}

async fn authenticate(user: &mut SwarmUser) -> Result<(), AuthAbort> {
    user.session.transition(SessionState::Authenticating);
    let credentials = user.session.identity().credentials();

    if !user.session.identity().shared {
        let signup = user.client.routes.signup.clone();
        let (_, outcome) = user
            .request(
                Target::Auth,
                SIGN_UP_LABEL,
                None,
                SwarmMethod::Post,
                &signup,
                Some(&credentials),
                Expect::Nothing,
            )
            .await;
        if !outcome.is_success() {
            debug!(
                "user {}: sign up of {} ignored: {}",
                user.index,
                user.session.identity().email,
                outcome
            );
        }
    }

    let token_path = user.client.routes.token.clone();
    let (response, outcome) = user
        .request(
            Target::Auth,
            LOG_IN_LABEL,
            None,
            SwarmMethod::Post,
            &token_path,
            Some(&credentials),
            Expect::AccessToken,
        )
        .await;

    let token = match (outcome, response.access_token()) {
        (Outcome::Success, Some(token)) => token,
        (Outcome::HttpFailure(status), _) => {
            let reason = AuthAbort::TokenExchange { status };
            user.session.abort(reason.clone());
            return Err(reason);
        }
        _ => {
            user.session.abort(AuthAbort::MissingToken);
            return Err(AuthAbort::MissingToken);
        }
    };

    user.session.authenticated(token);
    Ok(())
}

async fn seed(
    user: &mut SwarmUser,
    receiver: &flume::Receiver<SwarmUserCommand>,
) -> Result<SeedReport, AuthAbort> {
    let mut report = SeedReport::default();
    let seed_records = user.config.seed_records();

    for _ in 0..seed_records {
        if user.received_exit(receiver) {
            debug!("user {}: exit received while seeding", user.index);
            break;
        }
        match user.create_note(SEED_LABEL, None).await {
            Outcome::Success => report.seeded += 1,
            Outcome::HttpFailure(status) if status == 401 || status == 403 => {
                let reason = AuthAbort::TokenRejected { status };
                user.session.abort(reason.clone());
                return Err(reason);
            }
            _ => report.failures += 1,
        }
    }

    if report.failures > 0 {
        warn!(
            "user {}: seeded {} of {} notes, {} failed",
            user.index, report.seeded, seed_records, report.failures
        );
    }

    user.session.transition(SessionState::Active);
    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn identities_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(42);
        let first = Identity::generate("swarm", "example.com", "pw", &mut rng);
        let second = Identity::generate("swarm", "example.com", "pw", &mut rng);
        assert_ne!(first.username, second.username);

        let suffix: u32 = first.username["swarm_".len()..].parse().unwrap();
        assert!(suffix < SUFFIX_SPACE);
        assert_eq!(first.email, format!("{}@example.com", first.username));
        assert_eq!(first.credentials()["password"], "pw");

        let shared = Identity::shared("qa@notes.test", "pw", "example.com");
        assert!(shared.shared);
        assert_eq!(shared.email, "qa@notes.test");
        let shared = Identity::shared("qa", "pw", "notes.test");
        assert_eq!(shared.email, "qa@notes.test");
    }

    #[test]
    fn happy_path_transitions() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut session = Session::new(Identity::generate("s", "d", "p", &mut rng));
        assert_eq!(session.state(), &SessionState::Unauthenticated);
        assert!(!session.is_active());
        assert!(session.transition(SessionState::Authenticating));
        assert!(session.authenticated("token".to_string()));
        assert_eq!(session.token(), Some("token"));
        assert_eq!(session.state(), &SessionState::Seeding);
        assert!(!session.is_active());
        assert!(session.transition(SessionState::Active));
        assert!(session.is_active());
    }

    #[test]
    fn aborted_is_terminal() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut session = Session::new(Identity::generate("s", "d", "p", &mut rng));
        session.transition(SessionState::Authenticating);
        session.abort(AuthAbort::TokenExchange { status: 401 });
        assert_eq!(
            session.state(),
            &SessionState::Aborted(AuthAbort::TokenExchange { status: 401 })
        );
        assert_eq!(session.token(), None);
        assert!(!session.is_active());

        let aborted = SessionState::Aborted(AuthAbort::MissingToken);
        assert!(!aborted.can_transition(&SessionState::Active));
        assert!(!aborted.can_transition(&SessionState::Seeding));
        assert!(!SessionState::Unauthenticated.can_transition(&SessionState::Active));
        assert!(!SessionState::Active
            .can_transition(&SessionState::Aborted(AuthAbort::MissingToken)));
    }

    #[test]
    fn abort_reasons_display() {
        assert_eq!(
            AuthAbort::TokenExchange { status: 401 }.to_string(),
            "token exchange returned 401"
        );
        assert_eq!(
            AuthAbort::TokenExchange { status: 0 }.to_string(),
            "token exchange failed, no response"
        );
        assert_eq!(
            AuthAbort::TokenRejected { status: 403 }.to_string(),
            "token rejected with 403"
        );
    }
}
