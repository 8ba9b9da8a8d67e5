//! Tool table.

use super::schema::{Param, ParamKind};

/// Where a tool call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forwarded to the peer as a command with the tool's name.
    Peer,
    ConnectionStatus,
    ListCatalogs,
    SearchComponents,
    ListStyles,
}

#[derive(Debug)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
    pub route: Route,
}

const IMAGE_FORMATS: &[&str] = &["PNG", "JPG", "SVG", "PDF"];
const LAYOUT_MODES: &[&str] = &["NONE", "HORIZONTAL", "VERTICAL"];

const NODE_ID: Param = Param::required("nodeId", ParamKind::String, "Id of the target node");
const PARENT_ID: Param = Param::optional(
    "parentId",
    ParamKind::String,
    "Id of the parent node; defaults to the current page",
);
const X: Param = Param::optional("x", ParamKind::Number, "X position");
const Y: Param = Param::optional("y", ParamKind::Number, "Y position");
const NAME: Param = Param::optional("name", ParamKind::String, "Layer name");

pub static TOOLS: &[Tool] = &[
    Tool {
        name: "get_document_info",
        description: "Get the open document's name, pages and top-level nodes",
        params: &[],
        route: Route::Peer,
    },
    Tool {
        name: "get_selection",
        description: "Get the nodes currently selected in the editor",
        params: &[],
        route: Route::Peer,
    },
    Tool {
        name: "get_node_info",
        description: "Get the properties of one node",
        params: &[NODE_ID],
        route: Route::Peer,
    },
    Tool {
        name: "create_frame",
        description: "Create a frame",
        params: &[
            NAME,
            X,
            Y,
            Param::required("width", ParamKind::Number, "Width in pixels"),
            Param::required("height", ParamKind::Number, "Height in pixels"),
            PARENT_ID,
        ],
        route: Route::Peer,
    },
    Tool {
        name: "create_rectangle",
        description: "Create a rectangle",
        params: &[
            NAME,
            X,
            Y,
            Param::required("width", ParamKind::Number, "Width in pixels"),
            Param::required("height", ParamKind::Number, "Height in pixels"),
            PARENT_ID,
        ],
        route: Route::Peer,
    },
    Tool {
        name: "create_text",
        description: "Create a text layer",
        params: &[
            Param::required("text", ParamKind::String, "Text content"),
            NAME,
            X,
            Y,
            Param::optional("fontSize", ParamKind::Number, "Font size in pixels"),
            PARENT_ID,
        ],
        route: Route::Peer,
    },
    Tool {
        name: "set_fill_color",
        description: "Set a node's solid fill; channels are 0 to 1",
        params: &[
            NODE_ID,
            Param::required("r", ParamKind::Number, "Red"),
            Param::required("g", ParamKind::Number, "Green"),
            Param::required("b", ParamKind::Number, "Blue"),
            Param::optional("a", ParamKind::Number, "Alpha"),
        ],
        route: Route::Peer,
    },
    Tool {
        name: "move_node",
        description: "Move a node",
        params: &[
            NODE_ID,
            Param::required("x", ParamKind::Number, "New X position"),
            Param::required("y", ParamKind::Number, "New Y position"),
        ],
        route: Route::Peer,
    },
    Tool {
        name: "resize_node",
        description: "Resize a node",
        params: &[
            NODE_ID,
            Param::required("width", ParamKind::Number, "New width"),
            Param::required("height", ParamKind::Number, "New height"),
        ],
        route: Route::Peer,
    },
    Tool {
        name: "delete_node",
        description: "Delete a node",
        params: &[NODE_ID],
        route: Route::Peer,
    },
    Tool {
        name: "set_layout_mode",
        description: "Set a frame's auto-layout direction",
        params: &[
            NODE_ID,
            Param::required("layoutMode", ParamKind::Enum(LAYOUT_MODES), "Layout direction"),
        ],
        route: Route::Peer,
    },
    Tool {
        name: "create_component_instance",
        description: "Place an instance of a component by key",
        params: &[
            Param::required("componentKey", ParamKind::String, "Key of the component"),
            X,
            Y,
            PARENT_ID,
        ],
        route: Route::Peer,
    },
    Tool {
        name: "export_node_as_image",
        description: "Export a node as an image",
        params: &[
            NODE_ID,
            Param::optional("format", ParamKind::Enum(IMAGE_FORMATS), "Image format"),
            Param::optional("scale", ParamKind::Number, "Export scale"),
        ],
        route: Route::Peer,
    },
    Tool {
        name: "connection_status",
        description: "Report whether a design-tool peer is connected",
        params: &[],
        route: Route::ConnectionStatus,
    },
    Tool {
        name: "list_catalogs",
        description: "List the component catalogs the peer has pushed",
        params: &[],
        route: Route::ListCatalogs,
    },
    Tool {
        name: "search_components",
        description: "Find components whose name, description, set or container contains the query (case-insensitive)",
        params: &[Param::required("query", ParamKind::String, "Text to look for")],
        route: Route::SearchComponents,
    },
    Tool {
        name: "list_styles",
        description: "List every shared style across pushed catalogs",
        params: &[],
        route: Route::ListStyles,
    },
];

pub fn find(name: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|t| t.name == name)
}
