use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fieldkit::error::LookupError;
use fieldkit::schema::FieldSchema;
use fieldkit::session::{Capabilities, RenderContext};
use fieldkit::slug::{SlugAvailability, SlugLookup, SlugQuery};

/// Install the log subscriber once per test binary; RUST_LOG controls
/// verbosity
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ctx() -> RenderContext {
    RenderContext {
        capabilities: Capabilities {
            rich_text: true,
            enhanced_media: true,
        },
        collection_id: "posts".to_string(),
        content_id: None,
    }
}

pub fn schema(definition: Value) -> FieldSchema {
    FieldSchema::from_definition(definition).expect("definition normalizes")
}

/// Object schema with a text title and a string-array tags member,
/// the smallest shape exercising nested carriers
pub fn title_and_tags() -> FieldSchema {
    schema(json!({
        "type": "object",
        "properties": {
            "title": {"type": "text", "label": "Title"},
            "tags": {"type": "array", "item": {"type": "text"}}
        }
    }))
}

/// Blocks schema with quote and image definitions
pub fn quote_and_image_blocks() -> FieldSchema {
    schema(json!({
        "type": "blocks",
        "blocks": [
            {
                "name": "quote",
                "label": "Quote",
                "properties": {
                    "text": {"type": "textarea", "label": "Quote text"},
                    "attribution": {"type": "text"}
                }
            },
            {
                "name": "image",
                "label": "Image",
                "properties": {
                    "media": {"type": "media"},
                    "caption": {"type": "text"}
                }
            }
        ]
    }))
}

/// Scripted in-memory availability collaborator. Each expected slug
/// maps to a reply and an artificial latency, so response ordering is
/// fully controlled under paused tokio time.
#[derive(Default)]
pub struct ScriptedLookup {
    replies: Mutex<HashMap<String, (Duration, Result<bool, String>)>>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, slug: &str, latency: Duration, available: bool) {
        self.replies
            .lock()
            .unwrap()
            .insert(slug.to_string(), (latency, Ok(available)));
    }

    pub fn fail(&self, slug: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(slug.to_string(), (Duration::ZERO, Err("down".to_string())));
    }

    /// Slugs that actually reached the collaborator, in order
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlugLookup for ScriptedLookup {
    async fn check(&self, query: &SlugQuery) -> Result<SlugAvailability, LookupError> {
        self.seen.lock().unwrap().push(query.slug.clone());
        let scripted = self.replies.lock().unwrap().get(&query.slug).cloned();
        match scripted {
            Some((latency, Ok(available))) => {
                tokio::time::sleep(latency).await;
                Ok(SlugAvailability {
                    available,
                    message: None,
                })
            }
            Some((_, Err(reason))) => Err(LookupError::InvalidResponse(reason)),
            None => Err(LookupError::InvalidResponse(format!(
                "no scripted reply for '{}'",
                query.slug
            ))),
        }
    }
}
