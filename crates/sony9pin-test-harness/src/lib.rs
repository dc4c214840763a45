//! sony9pin-test-harness: scripted deck for protocol tests.
//!
//! [`MockTransport`] plays the deck side of a 9-pin conversation so the
//! protocol engine can be tested without a cable.

pub mod mock;

pub use mock::MockTransport;
