use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::ls_types::*;

use super::super::{LOG_TARGET, QccLs};
use crate::docs::{completion_items, component_items, header_items, hover_markdown};
use crate::text::PositionMapper;

static INCLUDE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"#include\s*["<][^">]*$"#).expect("valid include regex"));
static MEMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\.$").expect("valid member regex"));

/// Who produced a completion item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CompletionOrigin {
    Clangd,
    Basilisk,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaggedData {
    origin: CompletionOrigin,
    #[serde(default)]
    payload: Value,
}

fn tag(mut item: CompletionItem, origin: CompletionOrigin) -> CompletionItem {
    let payload = item.data.take().unwrap_or(Value::Null);
    item.data = serde_json::to_value(TaggedData { origin, payload }).ok();
    item
}

/// Restore the original `data` and report where the item came from.
/// Items without a tag are treated as local.
fn untag(mut item: CompletionItem) -> (CompletionItem, CompletionOrigin) {
    let Some(data) = item.data.take() else {
        return (item, CompletionOrigin::Basilisk);
    };
    match serde_json::from_value::<TaggedData>(data.clone()) {
        Ok(TaggedData { origin, payload }) => {
            item.data = (!payload.is_null()).then_some(payload);
            (item, origin)
        }
        Err(_) => {
            item.data = Some(data);
            (item, CompletionOrigin::Basilisk)
        }
    }
}

/// Local items that fit the text before the cursor.
fn local_items(line_prefix: &str) -> Vec<CompletionItem> {
    if INCLUDE_PREFIX.is_match(line_prefix) {
        header_items()
    } else if MEMBER_PREFIX.is_match(line_prefix) {
        component_items()
    } else {
        completion_items().to_vec()
    }
}

/// clangd items first, then local ones whose label clangd did not offer.
fn merge(clangd: Vec<CompletionItem>, local: Vec<CompletionItem>) -> Vec<CompletionItem> {
    let mut seen = HashSet::new();
    clangd
        .into_iter()
        .map(|item| tag(item, CompletionOrigin::Clangd))
        .chain(local.into_iter().map(|item| tag(item, CompletionOrigin::Basilisk)))
        .filter(|item| seen.insert(item.label.clone()))
        .collect()
}

fn line_prefix(text: &str, position: Position) -> String {
    let mapper = PositionMapper::new(text);
    let line_start = mapper.position_to_byte(Position {
        line: position.line,
        character: 0,
    });
    let cursor = mapper.position_to_byte(position);
    text.get(line_start..cursor).unwrap_or_default().to_string()
}

fn split_response(response: CompletionResponse) -> (Vec<CompletionItem>, bool) {
    match response {
        CompletionResponse::Array(items) => (items, false),
        CompletionResponse::List(list) => (list.items, list.is_incomplete),
    }
}

impl QccLs {
    pub(crate) async fn completion_impl(
        &self,
        params: CompletionParams,
    ) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri.clone();
        let position = params.text_document_position.position;
        let prefix = self
            .inner
            .documents
            .text(&uri)
            .map(|text| line_prefix(&text, position))
            .unwrap_or_default();
        let local = local_items(&prefix);

        let settings = self.settings_for(&uri).await;
        let clangd: Option<CompletionResponse> = self
            .request_clangd(&settings, "textDocument/completion", &params)
            .await;
        let (clangd_items, is_incomplete) = clangd.map(split_response).unwrap_or_default();

        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete,
            items: merge(clangd_items, local),
        })))
    }

    pub(crate) async fn completion_resolve_impl(&self, item: CompletionItem) -> Result<CompletionItem> {
        let (item, origin) = untag(item);
        let mut item = match origin {
            CompletionOrigin::Clangd => {
                let settings = self.global_settings();
                let resolved: Option<CompletionItem> = self
                    .request_clangd(&settings, "completionItem/resolve", &item)
                    .await;
                if resolved.is_none() {
                    log::debug!(target: LOG_TARGET, "clangd could not resolve '{}'", item.label);
                }
                resolved.unwrap_or(item)
            }
            CompletionOrigin::Basilisk => item,
        };

        if item.documentation.is_none() {
            if let Some(markdown) = hover_markdown(&item.label) {
                item.documentation = Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: markdown,
                }));
            }
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(label: &str) -> CompletionItem {
        CompletionItem {
            label: label.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn tags_round_trip_original_payload() {
        let mut original = item("printf");
        original.data = Some(json!({"id": 7}));
        let tagged = tag(original, CompletionOrigin::Clangd);
        assert_eq!(
            tagged.data,
            Some(json!({"origin": "clangd", "payload": {"id": 7}}))
        );

        let (restored, origin) = untag(tagged);
        assert_eq!(origin, CompletionOrigin::Clangd);
        assert_eq!(restored.data, Some(json!({"id": 7})));
    }

    #[test]
    fn untagged_or_foreign_data_is_local() {
        let (restored, origin) = untag(item("foreach"));
        assert_eq!(origin, CompletionOrigin::Basilisk);
        assert_eq!(restored.data, None);

        let (_, origin) = untag(tag(item("dt"), CompletionOrigin::Basilisk));
        assert_eq!(origin, CompletionOrigin::Basilisk);
    }

    #[test]
    fn merge_prefers_clangd_and_dedupes_by_label() {
        let merged = merge(
            vec![item("foreach"), item("printf")],
            vec![item("foreach"), item("dt")],
        );
        let labels: Vec<_> = merged.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, ["foreach", "printf", "dt"]);
        assert_eq!(merged[0].data.as_ref().unwrap()["origin"], "clangd");
        assert_eq!(merged[2].data.as_ref().unwrap()["origin"], "basilisk");
    }

    #[test]
    fn narrows_to_headers_and_components() {
        let headers = local_items("#include \"navier-st");
        assert!(!headers.is_empty());
        assert!(headers.iter().all(|i| i.label.ends_with(".h") || i.label.contains('/')));

        let components: Vec<_> = local_items("  u.")
            .into_iter()
            .map(|i| i.label)
            .collect();
        assert_eq!(components, ["x", "y", "z"]);

        assert_eq!(local_items("  fore").len(), completion_items().len());
    }

    #[test]
    fn line_prefix_stops_at_cursor() {
        let text = "int a;\n  u.x = 1;\n";
        assert_eq!(line_prefix(text, Position { line: 1, character: 4 }), "  u.");
    }
}
