//! Application layer for Keepsake.
//!
//! Coordinates the domain state machine with storage, the backend and the
//! authentication state.

pub mod auth;
pub mod chat_session;
pub mod question_provider;
pub mod submission_coordinator;

pub use auth::AuthChannel;
pub use chat_session::{
    AuthReaction, ChatSession, SessionConfig, StartOutcome, SubmitOutcome, TurnOutcome,
};
pub use question_provider::QuestionProvider;
pub use submission_coordinator::SubmissionCoordinator;
