use crate::core::BrowserTrait;
use crate::dom::{render_snapshot, ANNOTATE_SCRIPT};
use crate::errors::{BrowserAgentError, Result};
use crate::types::BrowserConfig;
use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Located Chrome executable; browsers are launched from it.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    pub executable: PathBuf,
}

/// A CSS selector bound to the tab it is evaluated in.
#[derive(Clone)]
pub struct ChromeLocator {
    tab: Arc<Tab>,
    selector: String,
}

impl ChromeLocator {
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Chrome driver over the DevTools protocol
#[derive(Debug, Default)]
pub struct ChromeBrowser;

impl ChromeBrowser {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(tab: &Tab, script: &str) -> Result<Value> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| BrowserAgentError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type Engine = ChromeEngine;
    type Browser = Browser;
    type Page = Arc<Tab>;
    type Locator = ChromeLocator;

    async fn start_engine(&self) -> Result<ChromeEngine> {
        let executable = headless_chrome::browser::default_executable()
            .map_err(BrowserAgentError::LaunchFailed)?;
        debug!(executable = %executable.display(), "Found Chrome executable");
        Ok(ChromeEngine { executable })
    }

    async fn launch(
        &self,
        engine: &ChromeEngine,
        config: &BrowserConfig,
        headless: bool,
    ) -> Result<Browser> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(headless)
            .path(Some(engine.executable.clone()))
            .idle_browser_timeout(Duration::from_millis(config.idle_timeout_ms))
            .args(args)
            .build()
            .map_err(|e| BrowserAgentError::LaunchFailed(e.to_string()))?;

        Browser::new(launch_options).map_err(|e| BrowserAgentError::LaunchFailed(e.to_string()))
    }

    async fn new_page(&self, browser: &Browser) -> Result<Arc<Tab>> {
        browser
            .new_tab()
            .map_err(|e| BrowserAgentError::PageCreationFailed(e.to_string()))
    }

    async fn navigate(&self, page: &Arc<Tab>, url: &str) -> Result<()> {
        page.navigate_to(url)
            .map_err(|e| BrowserAgentError::NavigationFailed(e.to_string()))?;

        page.wait_until_navigated()
            .map_err(|e| BrowserAgentError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn get_url(&self, page: &Arc<Tab>) -> Result<String> {
        Ok(page.get_url())
    }

    async fn get_content(&self, page: &Arc<Tab>) -> Result<String> {
        page.get_content().map_err(BrowserAgentError::from_any_error)
    }

    async fn snapshot(&self, page: &Arc<Tab>) -> Result<String> {
        let html = Self::evaluate(page, ANNOTATE_SCRIPT)?;
        let html = html.as_str().ok_or_else(|| {
            BrowserAgentError::SnapshotFailed("annotation script returned no markup".to_string())
        })?;
        Ok(render_snapshot(html))
    }

    async fn mouse_click(&self, page: &Arc<Tab>, x: f64, y: f64) -> Result<()> {
        page.click_point(Point { x, y })
            .map_err(|e| BrowserAgentError::InputFailed(e.to_string()))?;
        Ok(())
    }

    async fn keyboard_type(&self, page: &Arc<Tab>, text: &str) -> Result<()> {
        page.type_str(text)
            .map_err(|e| BrowserAgentError::InputFailed(e.to_string()))?;
        Ok(())
    }

    fn locator(&self, page: &Arc<Tab>, selector: &str) -> Option<ChromeLocator> {
        if selector.trim().is_empty() {
            return None;
        }
        Some(ChromeLocator {
            tab: page.clone(),
            selector: selector.to_string(),
        })
    }

    async fn is_visible(&self, locator: &ChromeLocator) -> Result<bool> {
        let selector = serde_json::to_string(&locator.selector)?;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' && style.visibility !== 'hidden'
                    && rect.width > 0 && rect.height > 0;
            }})()"#,
            selector
        );

        Ok(Self::evaluate(&locator.tab, &script)?
            .as_bool()
            .unwrap_or(false))
    }

    async fn click(&self, locator: &ChromeLocator) -> Result<()> {
        let element = locator
            .tab
            .find_element(&locator.selector)
            .map_err(|e| BrowserAgentError::ElementNotFound(e.to_string()))?;
        element
            .click()
            .map_err(|e| BrowserAgentError::InputFailed(e.to_string()))?;
        Ok(())
    }

    async fn close_page(&self, page: &Arc<Tab>) -> Result<()> {
        page.close(true)?;
        Ok(())
    }

    async fn close_browser(&self, browser: &Browser) -> Result<()> {
        let tabs = match browser.get_tabs().lock() {
            Ok(tabs) => tabs.clone(),
            Err(_) => {
                return Err(BrowserAgentError::ChromeError(
                    "tab list lock poisoned".to_string(),
                ))
            }
        };

        for tab in tabs {
            if let Err(e) = tab.close(false) {
                debug!(error = %e, "Tab already gone");
            }
        }
        Ok(())
    }

    async fn close_engine(&self, _engine: &ChromeEngine) -> Result<()> {
        // The process exits once the last Browser handle is dropped.
        Ok(())
    }
}
