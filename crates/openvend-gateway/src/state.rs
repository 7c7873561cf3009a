//! Shared state handed to every request handler.

use openvend_issuance::IssuanceCoordinator;
use openvend_verifier::EventVerifier;

/// Everything a handler needs, built once at startup and shared behind an
/// `Arc` by the router. Fields are public so tests can wire their own
/// verifier and coordinator directly.
pub struct AppState {
    pub verifier: EventVerifier,
    pub coordinator: IssuanceCoordinator,
}
