//! Lock specifications: which resource to lock and on what terms.

use std::fmt::Display;
use std::time::Duration;

use crate::error::{LockError, LockResult};

/// Separator placed between identifier tokens in a resource key.
pub const KEY_SEPARATOR: &str = "-";

/// Describes a lock to acquire.
///
/// The resource key is derived from an ordered list of identifier tokens,
/// each rendered with [`Display`] and joined with [`KEY_SEPARATOR`]. A
/// specification can only be obtained through validation, so every value of
/// this type names a resource.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use lease_lock_core::LockSpec;
///
/// let spec = LockSpec::builder()
///     .token("invoice")
///     .token(42)
///     .lease_duration(Duration::from_secs(30))
///     .description("nightly settlement")
///     .build()?;
///
/// assert_eq!(spec.resource_key(), "invoice-42");
/// # Ok::<(), lease_lock_core::LockError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    resource_key: String,
    lease_duration: Option<Duration>,
    description: Option<String>,
}

impl LockSpec {
    /// Returns a new builder.
    pub fn builder() -> LockSpecBuilder {
        LockSpecBuilder::new()
    }

    /// Creates a specification from identifier tokens with no lease override
    /// and no description.
    pub fn of<I, T>(tokens: I) -> LockResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        Self::builder().tokens(tokens).build()
    }

    /// The key identifying the protected resource.
    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }

    /// Lease length requested for this lock, if it overrides the default.
    pub fn lease_duration(&self) -> Option<Duration> {
        self.lease_duration
    }

    /// Free-form annotation stored alongside the lock.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Builder for [`LockSpec`].
#[derive(Debug, Default, Clone)]
pub struct LockSpecBuilder {
    tokens: Vec<Option<String>>,
    lease_duration: Option<Duration>,
    description: Option<String>,
}

impl LockSpecBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an identifier token.
    pub fn token(mut self, token: impl Display) -> Self {
        self.tokens.push(Some(token.to_string()));
        self
    }

    /// Appends a token that may be absent. Absent tokens are skipped when the
    /// key is built, but a builder holding only absent tokens is rejected.
    pub fn maybe_token<T: Display>(mut self, token: Option<T>) -> Self {
        self.tokens.push(token.map(|t| t.to_string()));
        self
    }

    /// Appends several identifier tokens in order.
    pub fn tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        self.tokens
            .extend(tokens.into_iter().map(|t| Some(t.to_string())));
        self
    }

    /// Overrides the manager's default lease length.
    pub fn lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = Some(lease_duration);
        self
    }

    /// Sets an optional lease length override.
    pub fn maybe_lease_duration(mut self, lease_duration: Option<Duration>) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    /// Attaches a description to the lock.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the tokens and builds the specification.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidSpecification`] when no tokens were given,
    /// when every token is absent, or when the resulting key is empty.
    pub fn build(self) -> LockResult<LockSpec> {
        if self.tokens.is_empty() {
            return Err(LockError::identifier_required());
        }

        let resource_key = self
            .tokens
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        if resource_key.is_empty() {
            return Err(LockError::identifier_required());
        }

        Ok(LockSpec {
            resource_key,
            lease_duration: self.lease_duration,
            description: self.description,
        })
    }
}
