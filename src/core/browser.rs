use crate::errors::Result;
use crate::types::BrowserConfig;
use async_trait::async_trait;

/// Capability object over a browser automation backend.
///
/// A backend hands out three nested handles: an engine (the automation runtime),
/// a browser process launched from it, and a page inside that browser. The session
/// owns at most one of each and releases them page first, engine last.
#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type Engine: Send + Sync;
    type Browser: Send + Sync;
    type Page: Send + Sync;
    type Locator: Send + Sync;

    /// Start the automation engine
    async fn start_engine(&self) -> Result<Self::Engine>;

    /// Launch a new browser instance
    async fn launch(
        &self,
        engine: &Self::Engine,
        config: &BrowserConfig,
        headless: bool,
    ) -> Result<Self::Browser>;

    /// Create a new tab/page
    async fn new_page(&self, browser: &Self::Browser) -> Result<Self::Page>;

    /// Navigate to a URL
    async fn navigate(&self, page: &Self::Page, url: &str) -> Result<()>;

    /// Get current URL
    async fn get_url(&self, page: &Self::Page) -> Result<String>;

    /// Full HTML of the current document
    async fn get_content(&self, page: &Self::Page) -> Result<String>;

    /// Structural text of the page with `[ref=eN]` annotations
    async fn snapshot(&self, page: &Self::Page) -> Result<String>;

    /// Click with the mouse at viewport coordinates
    async fn mouse_click(&self, page: &Self::Page, x: f64, y: f64) -> Result<()>;

    /// Type into whatever element currently has focus
    async fn keyboard_type(&self, page: &Self::Page, text: &str) -> Result<()>;

    /// Build a page-scoped locator; `None` when the selector cannot be bound to the page
    fn locator(&self, page: &Self::Page, selector: &str) -> Option<Self::Locator>;

    async fn is_visible(&self, locator: &Self::Locator) -> Result<bool>;

    async fn click(&self, locator: &Self::Locator) -> Result<()>;

    async fn close_page(&self, page: &Self::Page) -> Result<()>;

    async fn close_browser(&self, browser: &Self::Browser) -> Result<()>;

    async fn close_engine(&self, engine: &Self::Engine) -> Result<()>;
}
