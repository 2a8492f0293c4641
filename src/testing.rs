//! In-memory doubles for the browser driver and the language model.

use crate::agent::history::{Message, ToolCall};
use crate::core::{BrowserTrait, ModelClient, ModelReply, ModelRequest};
use crate::errors::{BrowserAgentError, Result};
use crate::types::BrowserConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_SNAPSHOT: &str = "- heading \"Example Domain\" [ref=e1] [level=1]\n\
- paragraph \"This domain is for use in illustrative examples in documents.\"\n\
- link \"More information...\" [ref=e2]";

/// Driver operations a [`MockBrowser`] has seen, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    StartEngine,
    Launch { headless: bool },
    NewPage,
    Navigate(String),
    Snapshot,
    MouseClick { x: i64, y: i64 },
    Type(String),
    Locator(String),
    IsVisible(String),
    Click(String),
    ClosePage,
    CloseBrowser,
    CloseEngine,
}

#[derive(Debug)]
pub struct MockEngine;

#[derive(Debug)]
pub struct MockBrowserHandle;

#[derive(Debug)]
pub struct MockPage;

#[derive(Debug, Clone)]
pub struct MockLocator {
    pub selector: String,
}

struct MockState {
    calls: Vec<DriverCall>,
    url: String,
    content: String,
    snapshot: String,
    locator_available: bool,
    hidden: HashSet<String>,
    fail_launch: Option<String>,
    fail_new_page: Option<String>,
    fail_navigate: Option<String>,
    fail_click: Option<String>,
    fail_close_page: Option<String>,
}

/// Scriptable [`BrowserTrait`] that records every call it receives.
pub struct MockBrowser {
    state: Mutex<MockState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                url: "about:blank".to_string(),
                content: "<html><body></body></html>".to_string(),
                snapshot: DEFAULT_SNAPSHOT.to_string(),
                locator_available: true,
                hidden: HashSet::new(),
                fail_launch: None,
                fail_new_page: None,
                fail_navigate: None,
                fail_click: None,
                fail_close_page: None,
            }),
        }
    }

    pub fn fail_launch(self, message: &str) -> Self {
        self.state.lock().fail_launch = Some(message.to_string());
        self
    }

    pub fn fail_new_page(self, message: &str) -> Self {
        self.state.lock().fail_new_page = Some(message.to_string());
        self
    }

    pub fn fail_navigate(self, message: &str) -> Self {
        self.state.lock().fail_navigate = Some(message.to_string());
        self
    }

    pub fn fail_click(self, message: &str) -> Self {
        self.state.lock().fail_click = Some(message.to_string());
        self
    }

    pub fn fail_close_page(self, message: &str) -> Self {
        self.state.lock().fail_close_page = Some(message.to_string());
        self
    }

    pub fn set_snapshot(&self, snapshot: &str) {
        self.state.lock().snapshot = snapshot.to_string();
    }

    pub fn set_content(&self, content: &str) {
        self.state.lock().content = content.to_string();
    }

    pub fn set_locator_available(&self, available: bool) {
        self.state.lock().locator_available = available;
    }

    /// Make the element tagged with `ref_id` report as not visible.
    pub fn hide_ref(&self, ref_id: &str) {
        self.state
            .lock()
            .hidden
            .insert(format!("[data-agent-ref=\"{}\"]", ref_id));
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: DriverCall) {
        self.state.lock().calls.push(call);
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for MockBrowser {
    type Engine = MockEngine;
    type Browser = MockBrowserHandle;
    type Page = MockPage;
    type Locator = MockLocator;

    async fn start_engine(&self) -> Result<MockEngine> {
        self.record(DriverCall::StartEngine);
        Ok(MockEngine)
    }

    async fn launch(
        &self,
        _engine: &MockEngine,
        _config: &BrowserConfig,
        headless: bool,
    ) -> Result<MockBrowserHandle> {
        self.record(DriverCall::Launch { headless });
        match self.state.lock().fail_launch.clone() {
            Some(message) => Err(BrowserAgentError::LaunchFailed(message)),
            None => Ok(MockBrowserHandle),
        }
    }

    async fn new_page(&self, _browser: &MockBrowserHandle) -> Result<MockPage> {
        self.record(DriverCall::NewPage);
        match self.state.lock().fail_new_page.clone() {
            Some(message) => Err(BrowserAgentError::PageCreationFailed(message)),
            None => Ok(MockPage),
        }
    }

    async fn navigate(&self, _page: &MockPage, url: &str) -> Result<()> {
        self.record(DriverCall::Navigate(url.to_string()));
        let mut state = self.state.lock();
        if let Some(message) = state.fail_navigate.clone() {
            return Err(BrowserAgentError::NavigationFailed(message));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn get_url(&self, _page: &MockPage) -> Result<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn get_content(&self, _page: &MockPage) -> Result<String> {
        Ok(self.state.lock().content.clone())
    }

    async fn snapshot(&self, _page: &MockPage) -> Result<String> {
        self.record(DriverCall::Snapshot);
        Ok(self.state.lock().snapshot.clone())
    }

    async fn mouse_click(&self, _page: &MockPage, x: f64, y: f64) -> Result<()> {
        self.record(DriverCall::MouseClick {
            x: x as i64,
            y: y as i64,
        });
        Ok(())
    }

    async fn keyboard_type(&self, _page: &MockPage, text: &str) -> Result<()> {
        self.record(DriverCall::Type(text.to_string()));
        Ok(())
    }

    fn locator(&self, _page: &MockPage, selector: &str) -> Option<MockLocator> {
        self.record(DriverCall::Locator(selector.to_string()));
        if !self.state.lock().locator_available {
            return None;
        }
        Some(MockLocator {
            selector: selector.to_string(),
        })
    }

    async fn is_visible(&self, locator: &MockLocator) -> Result<bool> {
        self.record(DriverCall::IsVisible(locator.selector.clone()));
        Ok(!self.state.lock().hidden.contains(&locator.selector))
    }

    async fn click(&self, locator: &MockLocator) -> Result<()> {
        self.record(DriverCall::Click(locator.selector.clone()));
        match self.state.lock().fail_click.clone() {
            Some(message) => Err(BrowserAgentError::ElementNotFound(message)),
            None => Ok(()),
        }
    }

    async fn close_page(&self, _page: &MockPage) -> Result<()> {
        self.record(DriverCall::ClosePage);
        match self.state.lock().fail_close_page.clone() {
            Some(message) => Err(BrowserAgentError::ChromeError(message)),
            None => Ok(()),
        }
    }

    async fn close_browser(&self, _browser: &MockBrowserHandle) -> Result<()> {
        self.record(DriverCall::CloseBrowser);
        Ok(())
    }

    async fn close_engine(&self, _engine: &MockEngine) -> Result<()> {
        self.record(DriverCall::CloseEngine);
        Ok(())
    }
}

/// A model that replays a fixed list of replies and keeps every request it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn tool(name: &str, arguments: Value) -> ModelReply {
        ModelReply::ToolCall(ToolCall::new(name, arguments))
    }

    pub fn text(content: &str) -> ModelReply {
        ModelReply::Assistant(content.to_string())
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        self.requests.lock().push(request.messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| BrowserAgentError::Model("scripted model has no replies left".to_string()))
    }
}
