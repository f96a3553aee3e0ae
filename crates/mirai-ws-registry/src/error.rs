//! Error types for the call registry.

/// Errors that can occur while registering a call.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Every slot is taken by a call still waiting for its response.
    ///
    /// Nothing was recorded; outstanding calls are unaffected.
    #[error("call registry is full ({capacity} calls outstanding)")]
    Full {
        /// The registry's capacity.
        capacity: usize,
    },
}
