//! Resource fetch seam.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Fetcher
// ============================================================================

/// Reads the current value of a watched resource, typically via HTTP GET.
///
/// Called only while the resource's subscription is active.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// The fetched value.
    type Output: Clone + Send + Sync + 'static;

    /// Fetches the resource.
    ///
    /// # Errors
    ///
    /// Implementations typically return [`Error::Fetch`](crate::Error::Fetch).
    async fn fetch(&self) -> Result<Self::Output>;
}

// ============================================================================
// FnFetcher
// ============================================================================

/// [`Fetcher`] backed by an async closure.
///
/// # Example
///
/// ```ignore
/// let fetcher = FnFetcher::new(|| async { Ok(http.get_motd().await?) });
/// ```
#[derive(Debug, Clone)]
pub struct FnFetcher<F> {
    fetch: F,
}

impl<F> FnFetcher<F> {
    /// Wraps `fetch`.
    #[inline]
    #[must_use]
    pub const fn new(fetch: F) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl<F, Fut, T> Fetcher for FnFetcher<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    async fn fetch(&self) -> Result<T> {
        (self.fetch)().await
    }
}

// ============================================================================
// Tests
// ============================================================================
