//! Slug availability checker.
//!
//! Attached to slug-kind leaf fields that declare an owning
//! collection. Keystrokes are debounced before the availability
//! lookup; overlapping lookups resolve by value comparison - only the
//! response matching the field's current slug may update the status,
//! and stale responses are dropped silently. There is no cancellation
//! and no timeout: an arbitrarily slow response is simply ignored once
//! stale.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::config::config;
use crate::error::LookupError;
use crate::schema::SlugOptions;
use crate::session::RenderContext;

/// Visible state of the slug field's status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugStatus {
    Idle,
    /// Fails the slug pattern; no lookup is issued
    Invalid,
    /// Debounce elapsed, lookup in flight
    Checking,
    Available,
    Taken,
    /// Collaborator unreachable; editing proceeds unverified
    Unknown,
}

/// Lookup request, scoped by collection and excluding the content
/// being edited
#[derive(Debug, Clone, Serialize)]
pub struct SlugQuery {
    pub collection_id: String,
    pub slug: String,
    pub exclude_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlugAvailability {
    pub available: bool,
    pub message: Option<String>,
}

/// External availability collaborator. Must be idempotent and
/// side-effect free.
#[async_trait]
pub trait SlugLookup: Send + Sync {
    async fn check(&self, query: &SlugQuery) -> Result<SlugAvailability, LookupError>;
}

/// GET-based lookup against an HTTP collaborator
pub struct HttpSlugLookup {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSlugLookup {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl SlugLookup for HttpSlugLookup {
    async fn check(&self, query: &SlugQuery) -> Result<SlugAvailability, LookupError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("collectionId", &query.collection_id);
            pairs.append_pair("slug", &query.slug);
            if let Some(id) = query.exclude_id {
                pairs.append_pair("excludeId", &id.to_string());
            }
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        let availability = response.json::<SlugAvailability>().await?;
        Ok(availability)
    }
}

/// Convert free text to a URL-safe slug: lowercase, fold common
/// diacritics, collapse everything else to single hyphens
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars().flat_map(|c| c.to_lowercase()) {
        match fold_diacritic(c) {
            Some(folded) => out.push_str(folded),
            None if c.is_alphanumeric() && c.is_ascii() => out.push(c),
            None if c.is_whitespace() || c == '-' || c == '_' => out.push('-'),
            None => {}
        }
    }
    out.split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn fold_diacritic(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ą' | 'ā' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ę' | 'ě' | 'ē' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ı' | 'ī' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ő' | 'ō' => "o",
        'œ' => "oe",
        'ř' => "r",
        'š' | 'ş' | 'ś' => "s",
        'ß' => "ss",
        'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ű' | 'ū' => "u",
        'ý' | 'ÿ' => "y",
        'ž' | 'ź' | 'ż' => "z",
        _ => return None,
    })
}

struct CheckerState {
    current: String,
    status: SlugStatus,
    message: Option<String>,
    manually_edited: bool,
    /// Bumped per keystroke; a debounce timer only survives if its
    /// epoch is still current when it wakes
    epoch: u64,
}

/// Debounced availability checker for one slug field
pub struct SlugChecker {
    lookup: Arc<dyn SlugLookup>,
    collection_id: String,
    exclude_id: Option<Uuid>,
    pattern: Regex,
    /// Regenerate from the sibling title field until manually edited
    auto: bool,
    debounce: Duration,
    state: Arc<Mutex<CheckerState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SlugChecker {
    pub fn new(ctx: &RenderContext, options: &SlugOptions, lookup: Arc<dyn SlugLookup>) -> Self {
        let pattern_text = options
            .pattern
            .clone()
            .unwrap_or_else(|| config().slug.pattern.clone());
        let pattern = Regex::new(&pattern_text).unwrap_or_else(|err| {
            tracing::warn!(pattern = %pattern_text, error = %err, "invalid slug pattern; using default");
            Regex::new(&config().slug.pattern).expect("default slug pattern compiles")
        });
        Self {
            lookup,
            collection_id: ctx.collection_id.clone(),
            exclude_id: ctx.content_id,
            pattern,
            auto: options.source_field.is_some(),
            debounce: Duration::from_millis(config().slug.debounce_ms),
            state: Arc::new(Mutex::new(CheckerState {
                current: String::new(),
                status: SlugStatus::Idle,
                message: None,
                manually_edited: false,
                epoch: 0,
            })),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> SlugStatus {
        self.state.lock().expect("slug state lock").status
    }

    pub fn message(&self) -> Option<String> {
        self.state.lock().expect("slug state lock").message.clone()
    }

    pub fn value(&self) -> String {
        self.state.lock().expect("slug state lock").current.clone()
    }

    /// The user typed into the slug control directly. Detaches the
    /// field from its title source for the rest of the session.
    pub fn on_input(&self, text: &str) {
        self.apply(text, true);
    }

    /// The sibling title field changed; regenerate unless the slug has
    /// been manually edited
    pub fn on_title_change(&self, title: &str) {
        if !self.auto {
            return;
        }
        if self.state.lock().expect("slug state lock").manually_edited {
            return;
        }
        self.apply(&slugify(title), false);
    }

    fn apply(&self, text: &str, manual: bool) {
        let epoch = {
            let mut state = self.state.lock().expect("slug state lock");
            if manual {
                state.manually_edited = true;
            }
            state.current = text.to_string();
            state.epoch += 1;
            state.message = None;
            if text.is_empty() {
                state.status = SlugStatus::Idle;
                return;
            }
            if !self.pattern.is_match(text) {
                state.status = SlugStatus::Invalid;
                return;
            }
            state.status = SlugStatus::Checking;
            state.epoch
        };

        let lookup = Arc::clone(&self.lookup);
        let state = Arc::clone(&self.state);
        let query = SlugQuery {
            collection_id: self.collection_id.clone(),
            slug: text.to_string(),
            exclude_id: self.exclude_id,
        };
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // A later keystroke restarted the debounce; this timer
            // lost and must not issue a lookup.
            if state.lock().expect("slug state lock").epoch != epoch {
                return;
            }
            let result = lookup.check(&query).await;
            let mut state = state.lock().expect("slug state lock");
            // Last-request-wins by value: only the response for the
            // field's current slug may land.
            if state.current != query.slug {
                tracing::debug!(slug = %query.slug, "dropping stale availability response");
                return;
            }
            match result {
                Ok(availability) => {
                    state.status = if availability.available {
                        SlugStatus::Available
                    } else {
                        SlugStatus::Taken
                    };
                    state.message = availability.message;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "slug availability lookup failed");
                    state.status = SlugStatus::Unknown;
                    state.message = Some("Could not verify availability".to_string());
                }
            }
        });
        let mut tasks = self.tasks.lock().expect("slug task lock");
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Spawned probes not yet known to have finished
    pub fn pending_lookups(&self) -> usize {
        self.tasks.lock().expect("slug task lock").len()
    }

    /// Await every outstanding probe, including stale ones. Useful for
    /// orderly teardown and deterministic tests.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> =
            self.tasks.lock().expect("slug task lock").drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}
