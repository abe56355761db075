//! Free-text flow handlers.
//!
//! A handler turns one piece of user text (a city, an area, a question) into
//! the final line(s) shown to the user. Handlers always answer: provider
//! failures are logged with their error kind and converted to a sentence.

mod ai_query;
mod store_locator;
mod weather;

pub use ai_query::{AiQueryHandler, SYSTEM_INSTRUCTION};
pub use store_locator::{SearchSettings, StoreLocatorHandler, MAX_RESULTS};
pub use weather::WeatherHandler;

use async_trait::async_trait;

/// Resolve free text to the body of a terminal response.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Handler name, used in logs.
    fn name(&self) -> &'static str;

    /// False when the feature's credential was missing at startup.
    fn is_available(&self) -> bool {
        true
    }

    /// Produce the final text for `input`. Never fails.
    async fn resolve(&self, input: &str) -> String;
}
