//! Error Types
//!
//! This module defines the error types used throughout the toolkit.
//!
//! # Overview
//!
//! The main error type [`StageError`] covers the failure modes that are
//! surfaced at the public API boundary:
//! - invalid handle usage
//! - duplicate registrations
//! - graphics backend failures that callers must react to
//!
//! Internal invariant violations are *not* modelled here — they assert,
//! because they indicate a bug rather than a runtime condition.
//! Environment-driven failures inside the resource layer (pool growth,
//! swapchain loss) are modelled as explicit states or `Option` returns on
//! the owning objects, not as errors.

use thiserror::Error;

use crate::graphics::SwapchainError;

/// The main error type for the stagekit toolkit.
#[derive(Error, Debug)]
pub enum StageError {
    // ========================================================================
    // Public API misuse (catchable at the boundary)
    // ========================================================================
    /// An operation was attempted through a handle whose target no longer
    /// exists (node, camera, renderer or render task).
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A type, property or notifier was registered twice under the same key.
    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    // ========================================================================
    // Graphics backend
    // ========================================================================
    /// The swapchain reported a non-success result and must be recreated.
    #[error("Swapchain error: {0:?}")]
    Swapchain(SwapchainError),

    /// The event-side channel to the update thread has been closed.
    #[error("Update thread disconnected")]
    UpdateThreadDisconnected,
}

/// Alias for `Result<T, StageError>`.
pub type Result<T> = std::result::Result<T, StageError>;
