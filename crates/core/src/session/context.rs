//! Client session context - auth state machine over the identity provider
//!
//! One [`SessionContext`] owns the current [`SessionState`] and publishes it
//! through a `watch` channel. Every provider auth event re-fetches the
//! profile. Each trigger takes a generation number when it starts; a result
//! is published only while its generation is still the newest, so a slow
//! fetch can never overwrite a fresher state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use userhub_domain::{
    AccountError, AuthEvent, ProfileAttributes, ProfileIdentity, Result, Session, SessionState,
    SignUpOutcome, SyncRequest, UserProfile,
};

use super::ports::ProfileApi;
use crate::identity::ports::IdentityClient;

type SharedFetch = Shared<BoxFuture<'static, Result<Option<UserProfile>>>>;

struct InFlightFetch {
    id: u64,
    external_id: String,
    fetch: SharedFetch,
}

/// Holds the signed-in session and its profile for a client
pub struct SessionContext {
    identity: Arc<dyn IdentityClient>,
    api: Arc<dyn ProfileApi>,
    state: watch::Sender<SessionState>,
    generation: Mutex<u64>,
    /// Generation of the last state that made it onto the channel
    published: AtomicU64,
    in_flight: Mutex<Option<InFlightFetch>>,
    fetch_ids: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    pub fn new(identity: Arc<dyn IdentityClient>, api: Arc<dyn ProfileApi>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        Arc::new(Self {
            identity,
            api,
            state,
            generation: Mutex::new(0),
            published: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            fetch_ids: AtomicU64::new(0),
            listener: Mutex::new(None),
        })
    }

    /// Probe the provider for an existing session and start following its
    /// auth events.
    ///
    /// Returns once the initial probe has settled the state. Calling `start`
    /// again replaces the previous listener.
    pub async fn start(self: &Arc<Self>) {
        // Subscribe first so no event slips between the probe and the listener.
        let events = self.identity.subscribe();
        self.probe().await;

        let listener = tokio::spawn(listen(Arc::downgrade(self), events));
        if let Some(previous) = self.listener.lock().replace(listener) {
            previous.abort();
        }
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Register with the provider, then create the profile row.
    ///
    /// A failed profile creation is logged and does not fail the sign-up; the
    /// row is created on the next sync instead.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: ProfileAttributes,
    ) -> Result<SignUpOutcome> {
        let outcome = self.identity.sign_up(email, password, &attributes).await?;

        let owner_email = outcome.user.email.clone().unwrap_or_else(|| email.to_string());
        let request = SyncRequest::new(
            ProfileIdentity::new(Some(owner_email), Some(outcome.user.id.clone())),
            attributes,
        );
        if let Err(err) = self.api.sync_profile(&request).await {
            warn!(error = %err, "profile creation after sign-up failed");
        }

        if let Some(session) = outcome.session.clone() {
            let generation = self.next_generation();
            self.apply_session(generation, Some(session)).await;
            self.settled(generation).await;
        }

        Ok(outcome)
    }

    /// Sign in and wait for the resulting state to be published.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.identity.sign_in(email, password).await?;
        let generation = self.next_generation();
        self.apply_session(generation, Some(session.clone())).await;
        self.settled(generation).await;
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        let generation = self.next_generation();
        self.publish(generation, SessionState::Unauthenticated);
        self.settled(generation).await;
        Ok(())
    }

    /// Re-fetch the profile of the current session.
    ///
    /// # Errors
    /// `Unauthorized` without a session; fetch errors are returned and leave
    /// the state untouched.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfile>> {
        let session = self.require_session()?;
        let generation = self.next_generation();

        let profile = self.fetch_coalesced(&session.user.id).await?;
        self.publish(generation, SessionState::Authenticated { session, profile: profile.clone() });
        Ok(profile)
    }

    /// Merge attribute updates into the signed-in user's profile.
    pub async fn update_profile(&self, attributes: ProfileAttributes) -> Result<UserProfile> {
        let session = self.require_session()?;
        let request = SyncRequest::new(
            ProfileIdentity::new(session.user.email.clone(), Some(session.user.id.clone())),
            attributes,
        );

        let profile = self.api.sync_profile(&request).await?;
        let generation = self.next_generation();
        self.publish(
            generation,
            SessionState::Authenticated { session, profile: Some(profile.clone()) },
        );
        Ok(profile)
    }

    /// Upload an avatar and store its reference in the profile.
    ///
    /// Returns the public reference of the stored image.
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let state = self.state();
        if state.session().is_none() {
            return Err(AccountError::Unauthorized("no active session".into()));
        }
        let owner_email = state
            .profile()
            .map(|profile| profile.email.clone())
            .ok_or_else(|| AccountError::Validation("profile is not loaded".into()))?;

        let url = self.api.upload_avatar(&owner_email, file_name, content_type, bytes).await?;
        self.update_profile(ProfileAttributes::profile_image(url.clone())).await?;
        Ok(url)
    }

    fn require_session(&self) -> Result<Session> {
        self.state
            .borrow()
            .session()
            .cloned()
            .ok_or_else(|| AccountError::Unauthorized("no active session".into()))
    }

    /// Wait until a trigger no older than `generation` has published a state
    /// that is not loading.
    ///
    /// The provider emits an auth event for the caller's own sign-in or
    /// sign-out. The listener gives that event a newer generation, which can
    /// discard the caller's publish; the event's publish then settles it.
    async fn settled(&self, generation: u64) {
        let mut states = self.state.subscribe();
        let reached = states
            .wait_for(|state| {
                !state.is_loading() && self.published.load(Ordering::SeqCst) >= generation
            })
            .await
            .is_ok();
        if !reached {
            warn!(generation, "session state channel closed while settling");
        }
    }

    async fn probe(&self) {
        let generation = self.next_generation();
        let session = match self.identity.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "session probe failed, treating as signed out");
                None
            }
        };
        self.apply_session(generation, session).await;
    }

    fn next_generation(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        *generation
    }

    /// Publish `state` if no newer trigger has started since `generation`.
    fn publish(&self, generation: u64, state: SessionState) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            debug!(generation, current = *current, "discarding stale session state");
            return false;
        }
        self.published.store(generation, Ordering::SeqCst);
        self.state.send_replace(state);
        true
    }

    async fn apply_session(&self, generation: u64, session: Option<Session>) {
        let Some(session) = session else {
            self.publish(generation, SessionState::Unauthenticated);
            return;
        };

        let same_user =
            self.state.borrow().session().is_some_and(|current| current.user.id == session.user.id);
        if !same_user {
            self.publish(generation, SessionState::AuthenticatingOrSyncing);
        }

        let profile = match self.fetch_coalesced(&session.user.id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "profile fetch failed, keeping session without profile");
                None
            }
        };

        if self.publish(generation, SessionState::Authenticated { session, profile }) {
            info!(generation, "session state updated");
        }
    }

    /// Fetch a profile, joining a request already in flight for the same user.
    async fn fetch_coalesced(&self, external_id: &str) -> Result<Option<UserProfile>> {
        let (id, fetch) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) if in_flight.external_id == external_id => {
                    debug!("joining in-flight profile fetch");
                    (in_flight.id, in_flight.fetch.clone())
                }
                _ => {
                    let api = Arc::clone(&self.api);
                    let owned = external_id.to_string();
                    let fetch = async move { api.fetch_profile(&owned).await }.boxed().shared();
                    let id = self.fetch_ids.fetch_add(1, Ordering::SeqCst);
                    *slot = Some(InFlightFetch {
                        id,
                        external_id: external_id.to_string(),
                        fetch: fetch.clone(),
                    });
                    (id, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
        result
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Follow provider auth events until the context is dropped or the
/// provider closes the channel.
async fn listen(context: Weak<SessionContext>, mut events: broadcast::Receiver<AuthEvent>) {
    loop {
        let received = events.recv().await;
        let Some(context) = context.upgrade() else {
            break;
        };

        match received {
            Ok(event) => {
                debug!(event = event.name(), "auth state changed");
                // Generations are taken in event order; the fetches may
                // finish in any order.
                let generation = context.next_generation();
                let session = event.session().cloned();
                tokio::spawn(async move { context.apply_session(generation, session).await });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed auth events, re-probing session");
                tokio::spawn(async move { context.probe().await });
            }
            Err(RecvError::Closed) => break,
        }
    }
}
