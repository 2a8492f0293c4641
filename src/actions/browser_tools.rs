//! The browser actions exposed to the model.
//!
//! Arguments are validated here, before any browser round trip; everything else is
//! delegated to [`BrowserSession`], whose operations never fail outright.

use crate::actions::base::parse_arguments;
use crate::actions::{Tool, ToolRegistry};
use crate::browser::{BrowserSession, Outcome};
use crate::core::{AgentSettings, BrowserTrait};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Reserved name of the tool that ends the agent run.
pub const EXIT_TOOL: &str = "__exit__";

/// The high-volume tool whose old results are compacted away.
pub const SNAPSHOT_TOOL: &str = "getSnapshot";

pub const TOOL_NAMES: &[&str] = &[
    "startBrowser",
    "closeBrowser",
    SNAPSHOT_TOOL,
    "click",
    "clickByRef",
    "typeText",
    "navigateTo",
    EXIT_TOOL,
];

const REF_DESCRIPTION: &str = "Element ref from the page snapshot, format: [ref=eNUMBER], \
for example [ref=e1] or [ref=e35]";

const KNOWN_SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// Browser actions over one session, with local argument checks.
pub struct BrowserToolset<B: BrowserTrait> {
    session: Arc<BrowserSession<B>>,
    headless: bool,
}

impl<B: BrowserTrait> BrowserToolset<B> {
    pub fn new(session: Arc<BrowserSession<B>>, headless: bool) -> Self {
        Self { session, headless }
    }

    pub fn session(&self) -> &Arc<BrowserSession<B>> {
        &self.session
    }

    pub async fn start_browser(&self) -> Outcome {
        self.session.start_browser(self.headless).await
    }

    pub async fn close_browser(&self) -> Outcome {
        self.session.close_browser().await
    }

    pub async fn get_snapshot(&self) -> Outcome {
        self.session.get_snapshot().await
    }

    pub async fn click(&self, x: i64, y: i64) -> Outcome {
        if x < 0 || y < 0 {
            return Outcome::error("Invalid coordinates - x and y must be non-negative");
        }
        self.session.mouse_click(x, y).await
    }

    pub async fn click_by_ref(&self, reference: &str) -> Outcome {
        if reference.trim().is_empty() {
            return Outcome::error("Element reference cannot be empty");
        }

        let element = match self.session.resolve_reference(reference).await {
            Ok(element) => element,
            Err(outcome) => return outcome,
        };

        let visible = self
            .session
            .element_visible(&element)
            .await
            .unwrap_or_else(|e| {
                debug!(reference, error = %e, "Visibility check failed");
                false
            });

        let clicked = self.session.click_element(&element).await;
        if visible || clicked.is_error() {
            clicked
        } else {
            Outcome::warning(format!(
                "Element {} is not visible, click attempted anyway",
                reference
            ))
        }
    }

    pub async fn type_text(&self, text: &str) -> Outcome {
        if text.is_empty() {
            return Outcome::error("Text to type cannot be empty");
        }
        self.session.keyboard_type(text).await
    }

    /// Navigate to `url`. Unrecognized schemes are tried anyway; a navigation that went
    /// through is reported as a warning, a failed one stays an error.
    pub async fn navigate_to(&self, url: &str) -> Outcome {
        let url = url.trim();
        if url.is_empty() {
            return Outcome::error("URL cannot be empty");
        }

        let outcome = self.session.open_link(url).await;
        if KNOWN_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return outcome;
        }

        match outcome {
            Outcome::Error(detail) => Outcome::error(format!(
                "{} (URL should start with http://, https://, or file://)",
                detail
            )),
            proceeded => Outcome::warning(format!(
                "URL should start with http://, https://, or file:// - navigation attempted anyway ({})",
                proceeded
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserToolKind {
    StartBrowser,
    CloseBrowser,
    GetSnapshot,
    Click,
    ClickByRef,
    TypeText,
    NavigateTo,
}

impl BrowserToolKind {
    pub const ALL: [BrowserToolKind; 7] = [
        BrowserToolKind::StartBrowser,
        BrowserToolKind::CloseBrowser,
        BrowserToolKind::GetSnapshot,
        BrowserToolKind::Click,
        BrowserToolKind::ClickByRef,
        BrowserToolKind::TypeText,
        BrowserToolKind::NavigateTo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BrowserToolKind::StartBrowser => "startBrowser",
            BrowserToolKind::CloseBrowser => "closeBrowser",
            BrowserToolKind::GetSnapshot => SNAPSHOT_TOOL,
            BrowserToolKind::Click => "click",
            BrowserToolKind::ClickByRef => "clickByRef",
            BrowserToolKind::TypeText => "typeText",
            BrowserToolKind::NavigateTo => "navigateTo",
        }
    }

    fn description(self) -> &'static str {
        match self {
            BrowserToolKind::StartBrowser => "Start browser, use it before any other action",
            BrowserToolKind::CloseBrowser => {
                "Close the browser, use when you are done with the browser actions"
            }
            BrowserToolKind::GetSnapshot => {
                "Current page state snapshot with element refs for clickByRef"
            }
            BrowserToolKind::Click => "Click by viewport coordinates",
            BrowserToolKind::ClickByRef => "Click on an element by its ref",
            BrowserToolKind::TypeText => "Type text into the focused element using the keyboard",
            BrowserToolKind::NavigateTo => "Open url",
        }
    }

    fn parameter_schema(self) -> Value {
        match self {
            BrowserToolKind::StartBrowser
            | BrowserToolKind::CloseBrowser
            | BrowserToolKind::GetSnapshot => json!({"type": "object", "properties": {}}),
            BrowserToolKind::Click => json!({
                "type": "object",
                "properties": {
                    "x": {"type": "integer", "description": "X coordinate in pixels"},
                    "y": {"type": "integer", "description": "Y coordinate in pixels"}
                },
                "required": ["x", "y"]
            }),
            BrowserToolKind::ClickByRef => json!({
                "type": "object",
                "properties": {
                    "ref": {"type": "string", "description": REF_DESCRIPTION}
                },
                "required": ["ref"]
            }),
            BrowserToolKind::TypeText => json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to type"}
                },
                "required": ["text"]
            }),
            BrowserToolKind::NavigateTo => json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute URL to open"}
                },
                "required": ["url"]
            }),
        }
    }
}

#[derive(Deserialize)]
struct NoArgs {}

#[derive(Deserialize)]
struct ClickArgs {
    x: i64,
    y: i64,
}

#[derive(Deserialize)]
struct ClickByRefArgs {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct TypeTextArgs {
    text: String,
}

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
}

/// Adapter exposing one [`BrowserToolset`] action through the [`Tool`] trait.
pub struct BrowserTool<B: BrowserTrait> {
    kind: BrowserToolKind,
    toolset: Arc<BrowserToolset<B>>,
}

impl<B: BrowserTrait> BrowserTool<B> {
    pub fn new(kind: BrowserToolKind, toolset: Arc<BrowserToolset<B>>) -> Self {
        Self { kind, toolset }
    }

    async fn dispatch(&self, arguments: Value) -> Result<Outcome, Outcome> {
        let tool = self.kind.name();
        let toolset = &self.toolset;

        let outcome = match self.kind {
            BrowserToolKind::StartBrowser => {
                parse_arguments::<NoArgs>(tool, arguments)?;
                toolset.start_browser().await
            }
            BrowserToolKind::CloseBrowser => {
                parse_arguments::<NoArgs>(tool, arguments)?;
                toolset.close_browser().await
            }
            BrowserToolKind::GetSnapshot => {
                parse_arguments::<NoArgs>(tool, arguments)?;
                toolset.get_snapshot().await
            }
            BrowserToolKind::Click => {
                let args: ClickArgs = parse_arguments(tool, arguments)?;
                toolset.click(args.x, args.y).await
            }
            BrowserToolKind::ClickByRef => {
                let args: ClickByRefArgs = parse_arguments(tool, arguments)?;
                toolset.click_by_ref(&args.reference).await
            }
            BrowserToolKind::TypeText => {
                let args: TypeTextArgs = parse_arguments(tool, arguments)?;
                toolset.type_text(&args.text).await
            }
            BrowserToolKind::NavigateTo => {
                let args: NavigateArgs = parse_arguments(tool, arguments)?;
                toolset.navigate_to(&args.url).await
            }
        };

        Ok(outcome)
    }
}

#[async_trait]
impl<B: BrowserTrait + 'static> Tool for BrowserTool<B> {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameter_schema(&self) -> Value {
        self.kind.parameter_schema()
    }

    async fn execute(&self, arguments: Value) -> Outcome {
        self.dispatch(arguments).await.unwrap_or_else(|outcome| outcome)
    }
}

#[derive(Deserialize)]
struct ExitArgs {
    #[serde(default)]
    result: String,
}

/// The termination tool. The agent loop stops on it before it ever executes; executing
/// it directly just echoes the result.
pub struct ExitTool;

#[async_trait]
impl Tool for ExitTool {
    fn name(&self) -> &str {
        EXIT_TOOL
    }

    fn description(&self) -> &str {
        "Finish the task. Put the final answer with all gathered information into `result`"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result": {"type": "string", "description": "Final answer for the user"}
            },
            "required": ["result"]
        })
    }

    async fn execute(&self, arguments: Value) -> Outcome {
        match parse_arguments::<ExitArgs>(EXIT_TOOL, arguments) {
            Ok(args) => Outcome::success(args.result),
            Err(outcome) => outcome,
        }
    }
}

/// Register the enabled browser tools plus the exit tool.
pub fn register_browser_tools<B: BrowserTrait + 'static>(
    registry: &mut ToolRegistry,
    toolset: Arc<BrowserToolset<B>>,
    settings: &AgentSettings,
) {
    for kind in BrowserToolKind::ALL {
        if settings.tool_enabled(kind.name()) {
            registry.register(BrowserTool::new(kind, toolset.clone()));
        }
    }
    registry.register(ExitTool);
}
