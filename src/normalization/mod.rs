//! Document normalization
//!
//! Maps each provider's raw listing item onto [`NormalizedDocument`] using a
//! per-provider field priority list. Normalization is pure: it never reads a
//! clock or any other ambient state, so the same input always produces the
//! same document.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::models::ProviderType;

/// Placeholder title used when every candidate field is missing or blank.
pub const UNTITLED: &str = "Untitled";

/// Unified shape of a piece of external content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDocument {
    /// Provider-native identifier
    pub id: String,
    /// Display name, never empty
    pub title: String,
    /// Best-effort text body, may be empty
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub source_integration_type: ProviderType,
    /// ISO-8601 timestamp when the provider supplies one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// JSON pointers tried in order for each document field.
struct FieldPriority {
    id: &'static [&'static str],
    title: &'static [&'static str],
    content: &'static [&'static str],
    url: &'static [&'static str],
    modified: &'static [&'static str],
}

const GOOGLE_DRIVE_FIELDS: FieldPriority = FieldPriority {
    id: &["/id"],
    title: &["/name", "/title"],
    content: &["/content"],
    url: &["/webViewLink", "/url", "/sourceUrl"],
    modified: &["/modifiedTime", "/lastModified"],
};

const NOTION_FIELDS: FieldPriority = FieldPriority {
    id: &["/id"],
    title: &["/title", "/name"],
    content: &["/content", "/plain_text"],
    url: &["/url", "/public_url"],
    modified: &["/last_edited_time", "/lastModified"],
};

const GITHUB_FIELDS: FieldPriority = FieldPriority {
    id: &["/id", "/number"],
    title: &["/full_name", "/fullName", "/title", "/name"],
    content: &["/body", "/description"],
    url: &["/html_url", "/url"],
    modified: &["/updated_at", "/updatedAt", "/pushed_at"],
};

const MESSAGE_FIELDS: FieldPriority = FieldPriority {
    id: &["/id", "/ts"],
    title: &["/title", "/name", "/subject", "/username"],
    content: &["/text", "/content", "/message"],
    url: &["/permalink", "/url"],
    modified: &["/edited_timestamp", "/timestamp"],
};

const EMAIL_FIELDS: FieldPriority = FieldPriority {
    id: &["/id", "/message_id"],
    title: &["/subject", "/title"],
    content: &["/text", "/html", "/message", "/body"],
    url: &["/url"],
    modified: &["/created_at", "/date"],
};

const WEBHOOK_FIELDS: FieldPriority = FieldPriority {
    id: &["/id", "/key"],
    title: &["/title", "/name", "/subject"],
    content: &["/content", "/body", "/text", "/message"],
    url: &["/url", "/link"],
    modified: &["/updated_at", "/lastModified", "/timestamp"],
};

fn priorities(provider: ProviderType) -> &'static FieldPriority {
    match provider {
        ProviderType::GoogleDrive => &GOOGLE_DRIVE_FIELDS,
        ProviderType::Notion => &NOTION_FIELDS,
        ProviderType::Github => &GITHUB_FIELDS,
        ProviderType::Slack | ProviderType::Discord => &MESSAGE_FIELDS,
        ProviderType::Email => &EMAIL_FIELDS,
        ProviderType::Webhook => &WEBHOOK_FIELDS,
    }
}

/// Normalize one raw provider item.
pub fn normalize(provider: ProviderType, raw: &Value) -> NormalizedDocument {
    let fields = priorities(provider);

    let id = first_text(raw, fields.id).unwrap_or_else(|| content_hash_id(raw));

    let title = match provider {
        ProviderType::Notion => notion_property_title(raw),
        _ => None,
    }
    .or_else(|| first_text(raw, fields.title))
    .unwrap_or_else(|| UNTITLED.to_string());

    let source_url = first_text(raw, fields.url).or_else(|| match provider {
        ProviderType::GoogleDrive => first_text(raw, fields.id)
            .map(|file_id| format!("https://drive.google.com/file/d/{file_id}/view")),
        _ => None,
    });

    NormalizedDocument {
        id,
        title,
        content: first_text(raw, fields.content).unwrap_or_default(),
        source_url,
        source_integration_type: provider,
        last_modified: first_text(raw, fields.modified).map(|value| normalize_timestamp(&value)),
    }
}

fn first_text(raw: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| raw.pointer(pointer))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Notion pages keep their title in whichever property has `type: "title"`.
fn notion_property_title(raw: &Value) -> Option<String> {
    let properties = raw.get("properties")?.as_object()?;
    let segments = properties
        .values()
        .find(|property| property.get("type").and_then(Value::as_str) == Some("title"))
        .or_else(|| properties.get("title"))?
        .get("title")?
        .as_array()?;

    let title: String = segments
        .iter()
        .filter_map(|segment| {
            segment
                .get("plain_text")
                .or_else(|| segment.pointer("/text/content"))
                .and_then(Value::as_str)
        })
        .collect();

    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// RFC 3339 inputs are re-emitted in UTC; anything else passes through untouched.
fn normalize_timestamp(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Err(_) => value.to_string(),
    }
}

fn content_hash_id(raw: &Value) -> String {
    let digest = Sha256::digest(raw.to_string().as_bytes());
    format!("sha256:{}", hex::encode(&digest[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn title_is_never_empty_for_any_provider() {
        for provider in ProviderType::ALL {
            for raw in [json!({}), json!({"name": "   ", "title": ""}), json!(null)] {
                let doc = normalize(provider, &raw);
                assert_eq!(doc.title, UNTITLED, "provider {provider}");
                assert_eq!(doc.source_integration_type, provider);
            }
        }
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!({
            "id": "abc",
            "name": "Roadmap",
            "modifiedTime": "2024-03-01T10:15:00+02:00",
        });
        for provider in ProviderType::ALL {
            let first = serde_json::to_vec(&normalize(provider, &raw)).unwrap();
            let second = serde_json::to_vec(&normalize(provider, &raw)).unwrap();
            assert_eq!(first, second);
        }
        let no_id = json!({"text": "hello"});
        assert_eq!(
            normalize(ProviderType::Slack, &no_id).id,
            normalize(ProviderType::Slack, &no_id).id
        );
    }

    #[test]
    fn google_drive_file_maps_name_link_and_modified_time() {
        let raw = json!({
            "id": "file-1",
            "name": "Quarterly plan",
            "mimeType": "application/vnd.google-apps.document",
            "modifiedTime": "2024-03-01T10:15:00.000Z",
            "content": "Plan body",
        });
        let doc = normalize(ProviderType::GoogleDrive, &raw);
        assert_eq!(doc.id, "file-1");
        assert_eq!(doc.title, "Quarterly plan");
        assert_eq!(doc.content, "Plan body");
        assert_eq!(
            doc.source_url.as_deref(),
            Some("https://drive.google.com/file/d/file-1/view")
        );
        assert_eq!(doc.last_modified.as_deref(), Some("2024-03-01T10:15:00Z"));
    }

    #[test]
    fn google_drive_prefers_web_view_link() {
        let raw = json!({"id": "f", "name": "n", "webViewLink": "https://docs.google.com/d/f"});
        let doc = normalize(ProviderType::GoogleDrive, &raw);
        assert_eq!(doc.source_url.as_deref(), Some("https://docs.google.com/d/f"));
    }

    #[test]
    fn notion_title_comes_from_title_typed_property() {
        let raw = json!({
            "id": "page-1",
            "url": "https://www.notion.so/page-1",
            "last_edited_time": "2024-02-02T08:00:00.000Z",
            "properties": {
                "Name": {
                    "type": "title",
                    "title": [
                        {"plain_text": "Onboarding "},
                        {"text": {"content": "guide"}}
                    ]
                },
                "Tags": {"type": "multi_select", "multi_select": []}
            }
        });
        let doc = normalize(ProviderType::Notion, &raw);
        assert_eq!(doc.title, "Onboarding guide");
        assert_eq!(doc.source_url.as_deref(), Some("https://www.notion.so/page-1"));
        assert_eq!(doc.last_modified.as_deref(), Some("2024-02-02T08:00:00Z"));
    }

    #[test]
    fn notion_page_without_title_property_is_untitled() {
        let raw = json!({"id": "p", "properties": {"title": {"title": []}}});
        assert_eq!(normalize(ProviderType::Notion, &raw).title, UNTITLED);
    }

    #[test]
    fn github_repository_uses_full_name_and_html_url() {
        let raw = json!({
            "id": 42,
            "name": "api",
            "full_name": "acme/api",
            "html_url": "https://github.com/acme/api",
            "description": "Public API",
            "updated_at": "2024-01-05T12:00:00Z",
        });
        let doc = normalize(ProviderType::Github, &raw);
        assert_eq!(doc.id, "42");
        assert_eq!(doc.title, "acme/api");
        assert_eq!(doc.content, "Public API");
        assert_eq!(doc.source_url.as_deref(), Some("https://github.com/acme/api"));
    }

    #[test]
    fn unparsable_timestamps_pass_through() {
        let raw = json!({"ts": "1712345678.000100", "text": "hi", "timestamp": "yesterday"});
        let doc = normalize(ProviderType::Slack, &raw);
        assert_eq!(doc.id, "1712345678.000100");
        assert_eq!(doc.last_modified.as_deref(), Some("yesterday"));
    }

    #[test]
    fn missing_id_falls_back_to_content_hash() {
        let doc = normalize(ProviderType::Webhook, &json!({"title": "Ping"}));
        assert!(doc.id.starts_with("sha256:"));
        assert_eq!(doc.id.len(), "sha256:".len() + 32);
    }
}
