//! Static USSD menu tree.
//!
//! Every node is keyed by the `*`-joined input path that reaches it. The
//! table is read-only; position in the menu is carried entirely by the path
//! the telecom gateway resends on every turn.
//!
//! ```text
//! ""   Welcome
//! ├── 1    Agri-Tips ── 1*1 Maize │ 1*2 Beans │ 1*3 Coffee
//! ├── 2    Weather (free text: city)
//! ├── 3    My Account ── 3*1 View Phone │ 3*2 Change Preference
//! └── 4    Agro-Dealer Locator (free text: area)
//! ```

use crate::engine::DialogContext;
use crate::session::FlowKind;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '*';

/// Whether a node awaits more input or ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Continuation,
    Terminal,
}

/// How a node's text is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBody {
    Static(&'static str),
    /// "Your registered phone number is: ..." from the request context
    PhoneNumber,
}

/// A single entry in the menu table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuNode {
    pub path: &'static str,
    pub kind: NodeKind,
    pub body: NodeBody,
    /// Free-text flow installed when this node is reached
    pub flow: Option<FlowKind>,
}

impl MenuNode {
    const fn menu(path: &'static str, text: &'static str) -> Self {
        Self {
            path,
            kind: NodeKind::Continuation,
            body: NodeBody::Static(text),
            flow: None,
        }
    }

    const fn entry(path: &'static str, text: &'static str, flow: FlowKind) -> Self {
        Self {
            path,
            kind: NodeKind::Continuation,
            body: NodeBody::Static(text),
            flow: Some(flow),
        }
    }

    const fn leaf(path: &'static str, body: NodeBody) -> Self {
        Self {
            path,
            kind: NodeKind::Terminal,
            body,
            flow: None,
        }
    }

    /// Render the node's text for this request.
    pub fn render(&self, ctx: &DialogContext) -> String {
        match self.body {
            NodeBody::Static(text) => text.to_string(),
            NodeBody::PhoneNumber => format!(
                "Your registered phone number is: {}",
                ctx.phone_number.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

const NODES: &[MenuNode] = &[
    MenuNode::menu(
        "",
        "Welcome to MkulimaMkononi!\n\
         1. Get Agri-Tips\n\
         2. Weather Forecast\n\
         3. My Account\n\
         4. Find Agro-Dealer",
    ),
    MenuNode::menu(
        "1",
        "Select crop for tips:\n\
         1. Maize\n\
         2. Beans\n\
         3. Coffee",
    ),
    MenuNode::leaf(
        "1*1",
        NodeBody::Static(
            "Maize Tip: Ensure proper spacing for optimal growth. \
             Look out for Fall Armyworm during early stages.",
        ),
    ),
    MenuNode::leaf(
        "1*2",
        NodeBody::Static(
            "Beans Tip: Plant disease-resistant varieties. \
             Provide support for climbing beans.",
        ),
    ),
    MenuNode::leaf(
        "1*3",
        NodeBody::Static(
            "Coffee Tip: Prune regularly for better yield. \
             Monitor for Coffee Berry Disease.",
        ),
    ),
    MenuNode::entry("2", "Enter your city or town name:", FlowKind::Weather),
    MenuNode::menu(
        "3",
        "My Account:\n\
         1. View Phone Number\n\
         2. Change Crop Preference",
    ),
    MenuNode::leaf("3*1", NodeBody::PhoneNumber),
    MenuNode::leaf(
        "3*2",
        NodeBody::Static(
            "Feature under development. Please contact support to change preferences.",
        ),
    ),
    MenuNode::entry(
        "4",
        "Enter your area or town to find agro-dealers:",
        FlowKind::StoreLocator,
    ),
];

/// Read-only lookup table over the menu.
#[derive(Debug, Clone, Copy)]
pub struct MenuTree {
    nodes: &'static [MenuNode],
}

impl Default for MenuTree {
    fn default() -> Self {
        Self::standard()
    }
}

impl MenuTree {
    /// The MkulimaMkononi menu.
    pub const fn standard() -> Self {
        Self { nodes: NODES }
    }

    /// Find the node reached by `path`.
    pub fn lookup(&self, path: &str) -> Option<&'static MenuNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// The welcome menu.
    pub fn root(&self) -> &'static MenuNode {
        // The standard table always starts with the root node
        &self.nodes[0]
    }

    /// All nodes, in table order.
    pub fn nodes(&self) -> &'static [MenuNode] {
        self.nodes
    }
}

/// Last `*`-separated segment of a path, trimmed.
pub fn last_segment(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path).trim()
}
