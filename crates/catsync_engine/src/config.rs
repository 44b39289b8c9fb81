//! Configuration for the sync engine.

use std::time::Duration;

/// Largest page the remote catalog will serve.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records requested per page.
    pub page_size: u32,
    /// Retry configuration for whole-page processing.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with the default page size and retry policy.
    pub fn new() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a policy with the given attempt budget and a 1 second delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::from_secs(1),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Sets the delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Connection settings for a Shopify Admin GraphQL catalog.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Shop subdomain (`{shop}.myshopify.com`).
    pub shop_name: String,
    /// Admin API access token.
    pub access_token: String,
    /// Admin API version.
    pub api_version: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl ShopifyConfig {
    /// Creates a configuration for a shop.
    pub fn new(shop_name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            access_token: access_token.into(),
            api_version: "2025-07".into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GraphQL endpoint URL.
    pub fn endpoint(&self) -> String {
        format!(
            "https://{}.myshopify.com/admin/api/{}/graphql.json",
            self.shop_name, self.api_version
        )
    }
}
