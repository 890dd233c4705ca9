//! Export document parser
//!
//! Walks a loosely-typed TikTok data export and produces a flat, ordered
//! list of [`WorkItem`]s plus per-category counts. The export format has no
//! published schema, so every traversal step is a defensive lookup: a
//! missing or mistyped substructure means "zero items in this category",
//! never an error. The only hard requirement is that the document root is a
//! JSON object.
//!
//! Parsing is a pure function of its input: the same document always yields
//! the same counts and the same item list, in the same order. Duplicate URLs
//! across categories are intentionally NOT deduplicated here; the
//! orchestrator resolves them against the ledger and in-flight set.

use crate::error::{Error, Result};
use crate::types::{Category, CategoryCounts, ParsedExport, WorkItem};
use crate::utils::sanitize_filename;
use serde_json::Value;
use std::path::PathBuf;

/// Canonical prefix of video-share URLs embedded in chat messages
pub const SHARE_URL_PREFIX: &str = "https://www.tiktokv.com/share/video/";

/// URL field-name variants tried on each list entry, in priority order.
/// The first present, non-empty string value wins.
const URL_FIELDS: [&str; 6] = [
    "link",
    "Link",
    "shareURL",
    "ShareURL",
    "videoURL",
    "VideoURL",
];

/// Fixed lookup path for one list-based category
struct CategorySpec {
    category: Category,
    /// Top-level section key
    section: &'static str,
    /// Subsection key within the section
    name: &'static str,
    /// Key of the entry list within the subsection
    list_key: &'static str,
}

/// The four list-based categories, in the order their items are emitted
const LIST_CATEGORIES: [CategorySpec; 4] = [
    CategorySpec {
        category: Category::Likes,
        section: "Activity",
        name: "Like List",
        list_key: "ItemFavoriteList",
    },
    CategorySpec {
        category: Category::Favorites,
        section: "Activity",
        name: "Favorite Videos",
        list_key: "FavoriteVideoList",
    },
    CategorySpec {
        category: Category::History,
        section: "Activity",
        name: "Video Browsing History",
        list_key: "VideoList",
    },
    CategorySpec {
        category: Category::Shared,
        section: "Activity",
        name: "Share History",
        list_key: "ShareHistoryList",
    },
];

/// Chat section lookup path
const CHAT_SECTION: &str = "Direct Messages";
const CHAT_NAME: &str = "Chat History";
const CHAT_MAP_KEY: &str = "ChatHistory";
const CHAT_KEY_PREFIX: &str = "Chat History with ";

/// Profile section lookup path (section, subsection, map, field)
const PROFILE_PATH: [&str; 4] = ["Profile", "Profile Information", "ProfileMap", "userName"];

/// Options controlling what the parser emits
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Emit a profile work item when the export carries an account name
    pub include_profile: bool,
}

/// Parse a raw export document from bytes.
///
/// Fails with [`Error::Document`] if the bytes are not valid JSON or the
/// root is not an object; every other shape irregularity degrades to empty
/// categories.
pub fn parse_export(bytes: &[u8], options: ParseOptions) -> Result<ParsedExport> {
    let document: Value = serde_json::from_slice(bytes).map_err(|e| Error::Document {
        message: format!("not valid JSON: {}", e),
    })?;
    parse_document(&document, options)
}

/// Parse an already-decoded export document.
///
/// See [`parse_export`] for the contract.
pub fn parse_document(document: &Value, options: ParseOptions) -> Result<ParsedExport> {
    if !document.is_object() {
        return Err(Error::Document {
            message: "document root is not a JSON object".to_string(),
        });
    }

    let mut counts = CategoryCounts::default();
    let mut items = Vec::new();

    for spec in &LIST_CATEGORIES {
        collect_list_category(document, spec, &mut counts, &mut items);
    }
    collect_chat_items(document, &mut counts, &mut items);

    let account = extract_account(document);
    if options.include_profile {
        if let Some(name) = &account {
            items.push(profile_item(name));
            counts.bump(Category::Profile);
        }
    }

    tracing::info!(
        total = counts.total,
        likes = counts.likes,
        favorites = counts.favorites,
        history = counts.history,
        shared = counts.shared,
        chat = counts.chat,
        "Parsed export document"
    );

    Ok(ParsedExport {
        counts,
        items,
        account,
    })
}

/// Collect items for one list-based category.
///
/// Entries that are not objects, or that lack a usable URL field, are
/// silently excluded from both the count and the item list.
fn collect_list_category(
    document: &Value,
    spec: &CategorySpec,
    counts: &mut CategoryCounts,
    items: &mut Vec<WorkItem>,
) {
    let Some(list) = document
        .get(spec.section)
        .and_then(|s| s.get(spec.name))
        .and_then(|n| n.get(spec.list_key))
        .and_then(Value::as_array)
    else {
        return;
    };

    let source_path = format!("{} > {} > {}", spec.section, spec.name, spec.list_key);

    for entry in list {
        let Some(url) = extract_url(entry) else {
            continue;
        };
        items.push(WorkItem {
            url,
            destination: PathBuf::from(spec.category.folder()),
            category: spec.category,
            source_path: source_path.clone(),
        });
        counts.bump(spec.category);
    }
}

/// Read a URL from a list entry, trying each known field-name variant in
/// priority order. Returns the first present, non-empty string value.
fn extract_url(entry: &Value) -> Option<String> {
    let obj = entry.as_object()?;
    for field in URL_FIELDS {
        if let Some(url) = obj.get(field).and_then(Value::as_str) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    None
}

/// Collect items shared inside direct-message conversations.
///
/// The chat map is keyed by `"Chat History with <name>"`; each matching
/// message contributes at most one item, taken from the first whitespace
/// token in its `Content` that carries the canonical share-URL prefix.
fn collect_chat_items(document: &Value, counts: &mut CategoryCounts, items: &mut Vec<WorkItem>) {
    let Some(chat_map) = document
        .get(CHAT_SECTION)
        .and_then(|s| s.get(CHAT_NAME))
        .and_then(|n| n.get(CHAT_MAP_KEY))
        .and_then(Value::as_object)
    else {
        return;
    };

    for (key, messages) in chat_map {
        let Some(raw_name) = key.strip_prefix(CHAT_KEY_PREFIX) else {
            continue;
        };
        let name = raw_name.trim_end_matches(':');
        let Some(messages) = messages.as_array() else {
            continue;
        };

        let folder = PathBuf::from(Category::Chat.folder()).join(sanitize_filename(name));
        let source_path = format!("{} > {} > {}", CHAT_SECTION, CHAT_NAME, name);

        for message in messages {
            let Some(content) = message.get("Content").and_then(Value::as_str) else {
                continue;
            };
            let Some(url) = content
                .split_whitespace()
                .find(|word| word.contains(SHARE_URL_PREFIX))
            else {
                continue;
            };
            items.push(WorkItem {
                url: url.trim().to_string(),
                destination: folder.clone(),
                category: Category::Chat,
                source_path: source_path.clone(),
            });
            counts.bump(Category::Chat);
        }
    }
}

/// Extract the account name from the fixed profile path, if present.
fn extract_account(document: &Value) -> Option<String> {
    let mut node = document;
    for key in PROFILE_PATH {
        node = node.get(key)?;
    }
    let name = node.as_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Build the single profile work item for an account name.
fn profile_item(name: &str) -> WorkItem {
    WorkItem {
        url: format!("https://www.tiktok.com/@{}", name),
        destination: PathBuf::from(format!(
            "{}_{}",
            Category::Profile.folder(),
            sanitize_filename(name)
        )),
        category: Category::Profile,
        source_path: format!("Profile > {}", name),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> ParsedExport {
        parse_document(&value, ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_like_list_produces_items_and_counts() {
        let doc = json!({
            "Activity": {
                "Like List": {
                    "ItemFavoriteList": [
                        {"Link": "https://x/1"},
                        {"Link": "https://x/2"}
                    ]
                }
            }
        });

        let parsed = parse(doc);
        assert_eq!(parsed.counts.likes, 2);
        assert_eq!(parsed.counts.total, 2);
        assert_eq!(parsed.items.len(), 2);
        assert!(
            parsed
                .items
                .iter()
                .all(|item| item.category == Category::Likes)
        );
        assert_eq!(parsed.items[0].url, "https://x/1");
        assert_eq!(parsed.items[0].destination, PathBuf::from("Likes"));
        assert_eq!(
            parsed.items[0].source_path,
            "Activity > Like List > ItemFavoriteList"
        );
    }

    #[test]
    fn test_chat_message_yields_one_item_with_correspondent_folder() {
        let doc = json!({
            "Direct Messages": {
                "Chat History": {
                    "ChatHistory": {
                        "Chat History with Alice": [
                            {"Content": "check this https://www.tiktokv.com/share/video/123 out"}
                        ]
                    }
                }
            }
        });

        let parsed = parse(doc);
        assert_eq!(parsed.counts.chat, 1);
        assert_eq!(parsed.items.len(), 1);

        let item = &parsed.items[0];
        assert_eq!(item.url, "https://www.tiktokv.com/share/video/123");
        assert_eq!(item.category, Category::Chat);
        assert!(item.destination.to_string_lossy().contains("Alice"));
    }

    #[test]
    fn test_url_field_priority_order() {
        let doc = json!({
            "Activity": {
                "Like List": {
                    "ItemFavoriteList": [
                        {"VideoURL": "https://x/low", "link": "https://x/high"},
                        {"ShareURL": "https://x/mid"}
                    ]
                }
            }
        });

        let parsed = parse(doc);
        assert_eq!(parsed.items[0].url, "https://x/high");
        assert_eq!(parsed.items[1].url, "https://x/mid");
    }

    #[test]
    fn test_entries_without_url_are_dropped_from_count() {
        let doc = json!({
            "Activity": {
                "Like List": {
                    "ItemFavoriteList": [
                        {"Link": "https://x/1"},
                        {"Date": "2024-01-01"},
                        {"Link": ""},
                        "not-an-object"
                    ]
                }
            }
        });

        let parsed = parse(doc);
        assert_eq!(parsed.counts.likes, 1);
        assert_eq!(parsed.counts.total, parsed.items.len());
    }

    #[test]
    fn test_missing_and_mistyped_sections_yield_zero_counts() {
        let doc = json!({
            "Activity": {
                "Like List": "oops-a-string",
                "Favorite Videos": {"FavoriteVideoList": {"not": "a list"}}
            },
            "Direct Messages": 42
        });

        let parsed = parse(doc);
        assert_eq!(parsed.counts.total, 0);
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn test_root_must_be_object() {
        let err = parse_document(&json!(["a", "b"]), ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Document { .. }));

        let err = parse_export(b"not json at all", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Document { .. }));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let doc = json!({
            "Activity": {
                "Like List": {"ItemFavoriteList": [{"Link": "https://x/1"}]},
                "Share History": {"ShareHistoryList": [{"shareURL": "https://x/2"}]}
            },
            "Direct Messages": {
                "Chat History": {
                    "ChatHistory": {
                        "Chat History with Bob": [
                            {"Content": "https://www.tiktokv.com/share/video/9"}
                        ]
                    }
                }
            }
        });

        let first = parse(doc.clone());
        let second = parse(doc);
        assert_eq!(first.counts, second.counts);
        assert_eq!(first.items, second.items);
    }

    #[test]
    fn test_duplicate_urls_across_categories_are_kept() {
        let doc = json!({
            "Activity": {
                "Like List": {"ItemFavoriteList": [{"Link": "https://x/same"}]},
                "Video Browsing History": {"VideoList": [{"Link": "https://x/same"}]}
            }
        });

        let parsed = parse(doc);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.counts.likes, 1);
        assert_eq!(parsed.counts.history, 1);
    }

    #[test]
    fn test_account_extracted_and_profile_item_gated_by_options() {
        let doc = json!({
            "Profile": {
                "Profile Information": {
                    "ProfileMap": {"userName": "carol"}
                }
            }
        });

        let without = parse_document(&doc, ParseOptions::default()).unwrap();
        assert_eq!(without.account.as_deref(), Some("carol"));
        assert!(without.items.is_empty());

        let with = parse_document(
            &doc,
            ParseOptions {
                include_profile: true,
            },
        )
        .unwrap();
        assert_eq!(with.counts.profile, 1);
        assert_eq!(with.items.len(), 1);
        assert_eq!(with.items[0].url, "https://www.tiktok.com/@carol");
        assert_eq!(
            with.items[0].destination,
            PathBuf::from("UserProfile_carol")
        );
    }

    #[test]
    fn test_chat_keys_without_prefix_are_ignored() {
        let doc = json!({
            "Direct Messages": {
                "Chat History": {
                    "ChatHistory": {
                        "Settings": [{"Content": "https://www.tiktokv.com/share/video/1"}],
                        "Chat History with Dave:": [
                            {"Content": "no url here"},
                            {"Content": 17},
                            {"Content": "two https://www.tiktokv.com/share/video/5 and https://www.tiktokv.com/share/video/6"}
                        ]
                    }
                }
            }
        });

        let parsed = parse(doc);
        // One item per matching message, first token wins, trailing ':' stripped
        assert_eq!(parsed.counts.chat, 1);
        assert_eq!(parsed.items[0].url, "https://www.tiktokv.com/share/video/5");
        assert!(parsed.items[0].destination.to_string_lossy().ends_with("Dave"));
    }
}
