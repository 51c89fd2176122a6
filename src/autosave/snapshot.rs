use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::post::PostStatus;

/// The complete state of a post as seen by an editor, sent whole on every save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    /// Absent until the first successful save assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image_alt: Option<String>,
    #[serde(default)]
    pub seo: Seo,
    #[serde(default)]
    pub status: PostStatus,
    /// Only ever set from a persistence response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Seo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Keywords are a set: order and duplicates don't count.
impl PartialEq for Seo {
    fn eq(&self, other: &Self) -> bool {
        fn set(keywords: &[String]) -> BTreeSet<&str> {
            keywords.iter().map(String::as_str).collect()
        }
        self.title == other.title
            && self.description == other.description
            && self.slug == other.slug
            && set(&self.keywords) == set(&other.keywords)
    }
}

impl DraftSnapshot {
    /// Whether the editor has started writing anything worth saving.
    pub fn is_meaningful(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }

    /// Compare only what the author edits, ignoring server-assigned `identifier` and `last_saved`.
    pub fn same_content(&self, other: &DraftSnapshot) -> bool {
        self.title == other.title
            && self.body == other.body
            && self.featured_image == other.featured_image
            && self.featured_image_alt == other.featured_image_alt
            && self.seo == other.seo
            && self.status == other.status
    }
}

/// Body of a request to the persistence endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveRequest {
    #[serde(flatten)]
    pub draft: DraftSnapshot,
    pub author_id: String,
}
