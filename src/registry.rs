use std::{collections::HashMap, sync::Arc};

use serde_json::{json, Value};

use crate::layout::Block;

/// Displays and edits the content of one block type.
pub trait BlockRenderer: Send + Sync {
    fn kind(&self) -> &str;

    /// Content a freshly inserted block of this type starts with.
    fn default_content(&self) -> Value;

    fn render(&self, content: &Value) -> String;

    /// Applies a text edit and reports the resulting content through `on_change`.
    fn edit_text(&self, content: &Value, text: &str, on_change: &mut dyn FnMut(Value)) {
        let mut next = match content {
            Value::Object(_) => content.clone(),
            _ => json!({}),
        };
        next["text"] = Value::String(text.to_string());
        on_change(next);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Block { kind: String, output: String },
    /// Placeholder for a type nobody registered.
    Unknown { kind: String },
}

impl Rendered {
    pub fn text(&self) -> String {
        match self {
            Self::Block { output, .. } => output.clone(),
            Self::Unknown { kind } => format!("Unknown: {kind}"),
        }
    }
}

#[derive(Clone, Default)]
pub struct BlockRegistry {
    renderers: HashMap<String, Arc<dyn BlockRenderer>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text, heading, image, video, chart and table.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextRenderer { kind: "text" }));
        registry.register(Arc::new(TextRenderer { kind: "heading" }));
        registry.register(Arc::new(MediaRenderer { kind: "image" }));
        registry.register(Arc::new(MediaRenderer { kind: "video" }));
        registry.register(Arc::new(ChartRenderer));
        registry.register(Arc::new(TableRenderer));
        registry
    }

    pub fn register(&mut self, renderer: Arc<dyn BlockRenderer>) {
        self.renderers.insert(renderer.kind().to_string(), renderer);
    }

    pub fn renderer_for(&self, kind: &str) -> Option<&dyn BlockRenderer> {
        self.renderers.get(kind).map(|renderer| renderer.as_ref())
    }

    pub fn default_content(&self, kind: &str) -> Value {
        self.renderer_for(kind)
            .map(|renderer| renderer.default_content())
            .unwrap_or_else(|| json!({}))
    }

    pub fn render_block(&self, block: &Block) -> Rendered {
        match self.renderer_for(&block.kind) {
            Some(renderer) => Rendered::Block {
                kind: block.kind.clone(),
                output: renderer.render(&block.content),
            },
            None => {
                tracing::debug!(kind = %block.kind, block_id = %block.id, "no renderer registered");
                Rendered::Unknown {
                    kind: block.kind.clone(),
                }
            }
        }
    }

    /// Routes a text edit to the block's renderer. Unknown types swallow it.
    pub fn edit_text(&self, block: &Block, text: &str, on_change: &mut dyn FnMut(Value)) {
        if let Some(renderer) = self.renderer_for(&block.kind) {
            renderer.edit_text(&block.content, text, on_change);
        }
    }
}

fn string_field<'a>(content: &'a Value, field: &str) -> Option<&'a str> {
    content.get(field).and_then(Value::as_str)
}

struct TextRenderer {
    kind: &'static str,
}

impl BlockRenderer for TextRenderer {
    fn kind(&self) -> &str {
        self.kind
    }

    fn default_content(&self) -> Value {
        json!({ "text": "" })
    }

    fn render(&self, content: &Value) -> String {
        string_field(content, "text").unwrap_or_default().to_string()
    }
}

struct MediaRenderer {
    kind: &'static str,
}

impl BlockRenderer for MediaRenderer {
    fn kind(&self) -> &str {
        self.kind
    }

    fn default_content(&self) -> Value {
        json!({ "url": "", "caption": "" })
    }

    fn render(&self, content: &Value) -> String {
        match (string_field(content, "url"), string_field(content, "caption")) {
            (Some(url), Some(caption)) if !url.is_empty() && !caption.is_empty() => {
                format!("[{}: {url}] {caption}", self.kind)
            }
            (Some(url), _) if !url.is_empty() => format!("[{}: {url}]", self.kind),
            _ => format!("[{}]", self.kind),
        }
    }

    fn edit_text(&self, content: &Value, text: &str, on_change: &mut dyn FnMut(Value)) {
        let mut next = match content {
            Value::Object(_) => content.clone(),
            _ => self.default_content(),
        };
        next["caption"] = Value::String(text.to_string());
        on_change(next);
    }
}

struct ChartRenderer;

impl BlockRenderer for ChartRenderer {
    fn kind(&self) -> &str {
        "chart"
    }

    fn default_content(&self) -> Value {
        json!({ "title": "Chart" })
    }

    fn render(&self, content: &Value) -> String {
        string_field(content, "title").unwrap_or("Chart").to_string()
    }

    fn edit_text(&self, content: &Value, text: &str, on_change: &mut dyn FnMut(Value)) {
        let mut next = match content {
            Value::Object(_) => content.clone(),
            _ => json!({}),
        };
        next["title"] = Value::String(text.to_string());
        on_change(next);
    }
}

struct TableRenderer;

impl BlockRenderer for TableRenderer {
    fn kind(&self) -> &str {
        "table"
    }

    fn default_content(&self) -> Value {
        json!({ "rows": [["", ""], ["", ""]] })
    }

    fn render(&self, content: &Value) -> String {
        let rows = content
            .get("rows")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        format!("Table ({rows} rows)")
    }
}
