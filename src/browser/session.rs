use crate::browser::outcome::Outcome;
use crate::browser::resolver::{self, ResolvedElement};
use crate::core::BrowserTrait;
use crate::errors::BrowserAgentError;
use crate::types::BrowserConfig;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The most recent snapshot taken in a session.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub text: String,
    pub url: Option<String>,
    pub taken_at: DateTime<Utc>,
}

/// Owns the single engine/browser/page triple of an agent run.
///
/// Every public operation returns an [`Outcome`]; failures of the underlying driver are
/// converted into `Error` outcomes by [`execute_safely`] instead of being propagated.
pub struct BrowserSession<B: BrowserTrait> {
    driver: B,
    config: BrowserConfig,
    engine: ArcSwapOption<B::Engine>,
    browser: ArcSwapOption<B::Browser>,
    page: ArcSwapOption<B::Page>,
    last_snapshot: Mutex<Option<SnapshotRecord>>,
    page_hashes: Mutex<HashMap<String, String>>,
    session_id: String,
}

impl<B: BrowserTrait> BrowserSession<B> {
    pub fn new(driver: B, config: BrowserConfig) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(session_id = %session_id, "Created browser session");

        Self {
            driver,
            config,
            engine: ArcSwapOption::empty(),
            browser: ArcSwapOption::empty(),
            page: ArcSwapOption::empty(),
            last_snapshot: Mutex::new(None),
            page_hashes: Mutex::new(HashMap::new()),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn driver(&self) -> &B {
        &self.driver
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.page.load().is_some()
    }

    pub fn last_snapshot(&self) -> Option<SnapshotRecord> {
        self.last_snapshot.lock().clone()
    }

    /// Launch a browser with one page, replacing any browser that is already running.
    pub async fn start_browser(&self, headless: bool) -> Outcome {
        execute_safely("Failed to start browser", || async {
            if self.browser.load().is_some() || self.page.load().is_some() {
                info!(session_id = %self.session_id, "Replacing running browser");
                self.release_page_and_browser().await;
            }

            let engine = match self.engine.load_full() {
                Some(engine) => engine,
                None => {
                    let engine = Arc::new(self.driver.start_engine().await?);
                    self.engine.store(Some(engine.clone()));
                    engine
                }
            };

            let browser = Arc::new(
                self.driver
                    .launch(&engine, &self.config, headless)
                    .await?,
            );
            self.browser.store(Some(browser.clone()));

            let page = match self.driver.new_page(&browser).await {
                Ok(page) => page,
                Err(e) => {
                    if let Some(browser) = self.browser.swap(None) {
                        if let Err(close_err) = self.driver.close_browser(&browser).await {
                            warn!(session_id = %self.session_id, error = %close_err, "Failed to close browser");
                        }
                    }
                    return Err(e);
                }
            };
            self.page.store(Some(Arc::new(page)));
            self.last_snapshot.lock().take();

            info!(session_id = %self.session_id, headless, "Browser started");
            Ok::<_, BrowserAgentError>(Outcome::success("Browser started"))
        })
        .await
    }

    /// Release page, browser and engine in that order.
    ///
    /// Each slot is emptied before its own release is attempted, so a failure on one
    /// handle leaves the session cleared and does not stop the remaining releases.
    pub async fn close_browser(&self) -> Outcome {
        let mut failures = self.release_page_and_browser().await;

        if let Some(engine) = self.engine.swap(None) {
            if let Err(e) = self.driver.close_engine(&engine).await {
                warn!(session_id = %self.session_id, error = %e, "Failed to release engine");
                failures.push(format!("engine: {}", e));
            }
        }

        self.last_snapshot.lock().take();

        if failures.is_empty() {
            info!(session_id = %self.session_id, "Browser closed");
            Outcome::success("Browser closed")
        } else {
            Outcome::error(format!(
                "Browser closed, but releasing resources failed: {}",
                failures.join("; ")
            ))
        }
    }

    async fn release_page_and_browser(&self) -> Vec<String> {
        let mut failures = Vec::new();

        if let Some(page) = self.page.swap(None) {
            if let Err(e) = self.driver.close_page(&page).await {
                warn!(session_id = %self.session_id, error = %e, "Failed to close page");
                failures.push(format!("page: {}", e));
            }
        }

        if let Some(browser) = self.browser.swap(None) {
            if let Err(e) = self.driver.close_browser(&browser).await {
                warn!(session_id = %self.session_id, error = %e, "Failed to close browser");
                failures.push(format!("browser: {}", e));
            }
        }

        failures
    }

    /// The live page, recording its content hash on the way.
    pub async fn current_page(&self) -> std::result::Result<Arc<B::Page>, BrowserAgentError> {
        let page = self
            .page
            .load_full()
            .ok_or(BrowserAgentError::PageNotInitialized)?;
        self.record_page_hash(&page).await;
        Ok(page)
    }

    async fn record_page_hash(&self, page: &B::Page) {
        match self.page_fingerprint(page).await {
            Ok((url, hash)) => {
                self.page_hashes.lock().insert(url, hash);
            }
            Err(e) => debug!(error = %e, "Skipping page hash"),
        }
    }

    async fn page_fingerprint(
        &self,
        page: &B::Page,
    ) -> std::result::Result<(String, String), BrowserAgentError> {
        let url = normalize_url(&self.driver.get_url(page).await?);
        let content = self.driver.get_content(page).await?;
        Ok((url, content_hash(&content)))
    }

    /// Whether the current page differs from the last content recorded for its URL.
    ///
    /// Pages that were never recorded count as unchanged.
    pub async fn is_changed(&self) -> bool {
        let Some(page) = self.page.load_full() else {
            return false;
        };
        match self.page_fingerprint(&page).await {
            Ok((url, hash)) => self
                .page_hashes
                .lock()
                .get(&url)
                .map(|known| *known != hash)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn current_url(&self) -> Option<String> {
        let page = self.page.load_full()?;
        self.driver.get_url(&page).await.ok()
    }

    pub async fn open_link(&self, url: &str) -> Outcome {
        execute_safely(&format!("Failed to open link {}", url), || async {
            let page = self
                .page
                .load_full()
                .ok_or(BrowserAgentError::PageNotInitialized)?;
            self.driver.navigate(&page, url).await?;
            info!(session_id = %self.session_id, url, "Link opened");
            Ok::<_, BrowserAgentError>(Outcome::success("Link opened"))
        })
        .await
    }

    /// Capture the current page and remember it as the snapshot references resolve against.
    pub async fn get_snapshot(&self) -> Outcome {
        execute_safely("Failed to get page snapshot", || async {
            let page = self.current_page().await?;
            let text = self.driver.snapshot(&page).await?;

            if text.trim().is_empty() {
                return Err(BrowserAgentError::SnapshotFailed(
                    "empty snapshot returned".to_string(),
                ));
            }

            let url = self.driver.get_url(&page).await.ok();
            debug!(
                session_id = %self.session_id,
                refs = resolver::snapshot_refs(&text).len(),
                "Snapshot captured"
            );

            *self.last_snapshot.lock() = Some(SnapshotRecord {
                text: text.clone(),
                url,
                taken_at: Utc::now(),
            });

            Ok::<_, BrowserAgentError>(Outcome::success(format!("Snapshot captured\n{}", text)))
        })
        .await
    }

    /// Bind a `[ref=eN]` token from the latest snapshot to a locator on the live page.
    pub async fn resolve_reference(
        &self,
        token: &str,
    ) -> std::result::Result<ResolvedElement<B::Locator>, Outcome> {
        let reference = {
            let snapshot = self.last_snapshot.lock();
            resolver::validate_reference(snapshot.as_ref().map(|s| s.text.as_str()), token)?
        };

        let page = self.current_page().await.map_err(|e| {
            Outcome::error(format!("Failed to get page: {}, start browser before", e))
        })?;

        let selector = reference.selector();
        let locator = self.driver.locator(&page, &selector).ok_or_else(|| {
            Outcome::error(format!("Failed to create locator for reference: {}", token))
        })?;

        Ok(ResolvedElement {
            reference,
            selector,
            locator,
        })
    }

    pub async fn mouse_click(&self, x: i64, y: i64) -> Outcome {
        execute_safely(
            &format!("Failed to click at coordinates ({}, {})", x, y),
            || async {
                let page = self.current_page().await?;
                self.driver.mouse_click(&page, x as f64, y as f64).await?;
                Ok::<_, BrowserAgentError>(Outcome::success(format!(
                    "Clicked at coordinates ({}, {})",
                    x, y
                )))
            },
        )
        .await
    }

    pub async fn keyboard_type(&self, text: &str) -> Outcome {
        execute_safely(&format!("Failed to type text: {}", text), || async {
            let page = self.current_page().await?;
            self.driver.keyboard_type(&page, text).await?;
            Ok::<_, BrowserAgentError>(Outcome::success(format!("Typed text \"{}\"", text)))
        })
        .await
    }

    pub async fn element_visible(
        &self,
        element: &ResolvedElement<B::Locator>,
    ) -> std::result::Result<bool, BrowserAgentError> {
        self.driver.is_visible(&element.locator).await
    }

    pub async fn click_element(&self, element: &ResolvedElement<B::Locator>) -> Outcome {
        let token = &element.reference.token;
        execute_safely(
            &format!("Failed to click on element with reference {}", token),
            || async {
                self.driver.click(&element.locator).await.map_err(|e| {
                    format!("Failed to click on {} - {}", token, e)
                })?;
                Ok::<_, String>(Outcome::success(format!("Clicked on element {}", token)))
            },
        )
        .await
    }
}

/// Run `action` and fold whatever it produces into an [`Outcome`].
///
/// An `Err` becomes `Error: <message>` (or `default_error` when the message is blank)
/// unless the message already carries an outcome prefix. An `Ok` value goes through
/// its `Into<Outcome>` conversion, which treats unprefixed text as an error.
pub async fn execute_safely<F, Fut, T, E>(default_error: &str, action: F) -> Outcome
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    T: Into<Outcome>,
    E: Display,
{
    match action().await {
        Ok(value) => value.into(),
        Err(e) => {
            let message = e.to_string();
            if message.trim().is_empty() {
                Outcome::normalize(default_error)
            } else {
                Outcome::normalize(&message)
            }
        }
    }
}

fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.to_string(),
    }
}
