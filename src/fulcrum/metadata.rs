//! Caption discovery inside record documents.
//!
//! Photo fields can sit at any depth (top-level photo fields, photos inside
//! repeatable sections, repeatables nested in repeatables), so the document is
//! walked as a tree. Any object carrying both a `photo_id` and a `caption` key
//! is a photo entry.

use serde_json::Value;

/// Nesting depth at which the walk stops descending.
const MAX_DEPTH: usize = 64;

/// A photo entry found in a record document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoMetadata {
    pub photo_id: String,
    pub caption: Option<String>,
}

/// Collect every photo entry in `doc`, in traversal order.
pub fn collect_photo_metadata(doc: &Value) -> Vec<PhotoMetadata> {
    let mut found = Vec::new();
    visit(doc, 0, &mut found);
    found
}

fn visit(value: &Value, depth: usize, found: &mut Vec<PhotoMetadata>) {
    if depth > MAX_DEPTH {
        tracing::warn!(depth, "Record document nested too deeply, skipping subtree");
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                visit(item, depth + 1, found);
            }
        }
        Value::Object(map) => {
            if let (Some(id), Some(caption)) = (map.get("photo_id"), map.get("caption")) {
                if let Some(entry) = photo_entry(id, caption) {
                    found.push(entry);
                }
            }
            for child in map.values() {
                visit(child, depth + 1, found);
            }
        }
        _ => {}
    }
}

fn photo_entry(id: &Value, caption: &Value) -> Option<PhotoMetadata> {
    let photo_id = id.as_str().filter(|s| !s.is_empty())?;
    Some(PhotoMetadata {
        photo_id: photo_id.to_string(),
        caption: caption.as_str().map(str::to_string),
    })
}

/// First non-blank caption recorded for `photo_id`.
pub fn caption_for<'a>(photos: &'a [PhotoMetadata], photo_id: &str) -> Option<&'a str> {
    photos
        .iter()
        .filter(|p| p.photo_id == photo_id)
        .find_map(|p| p.caption.as_deref().filter(|c| !c.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collects_nested_entries() {
        let doc = json!({
            "id": "rec",
            "form_values": {
                "top": [{"photo_id": "a", "caption": "Front"}],
                "section": [{
                    "id": "child",
                    "form_values": {
                        "inner": [{"photo_id": "b", "caption": "Back"}]
                    }
                }]
            }
        });
        let photos = collect_photo_metadata(&doc);
        let mut ids: Vec<&str> = photos.iter().map(|p| p.photo_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_requires_both_keys() {
        let doc = json!([
            {"photo_id": "only-id"},
            {"caption": "only caption"},
            {"photo_id": "both", "caption": "ok"}
        ]);
        let photos = collect_photo_metadata(&doc);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].photo_id, "both");
    }

    #[test]
    fn test_null_caption_is_kept_as_none() {
        let doc = json!({"photo_id": "a", "caption": null});
        let photos = collect_photo_metadata(&doc);
        assert_eq!(
            photos,
            vec![PhotoMetadata {
                photo_id: "a".into(),
                caption: None
            }]
        );
    }

    #[test]
    fn test_non_string_photo_id_ignored() {
        let doc = json!({"photo_id": 12, "caption": "x"});
        assert!(collect_photo_metadata(&doc).is_empty());
    }

    #[test]
    fn test_depth_bound_stops_descent() {
        let mut doc = json!({"photo_id": "deep", "caption": "too far"});
        for _ in 0..(MAX_DEPTH + 5) {
            doc = json!([doc]);
        }
        assert!(collect_photo_metadata(&doc).is_empty());

        let mut shallow = json!({"photo_id": "near", "caption": "fine"});
        for _ in 0..10 {
            shallow = json!([shallow]);
        }
        assert_eq!(collect_photo_metadata(&shallow).len(), 1);
    }

    #[test]
    fn test_caption_for_skips_blank_captions() {
        let photos = vec![
            PhotoMetadata {
                photo_id: "a".into(),
                caption: Some("  ".into()),
            },
            PhotoMetadata {
                photo_id: "a".into(),
                caption: Some("Gutter".into()),
            },
        ];
        assert_eq!(caption_for(&photos, "a"), Some("Gutter"));
        assert_eq!(caption_for(&photos, "missing"), None);
    }
}
