use serde::{Deserialize, Serialize};

/// Separator placed between title and comment in the text sent for translation.
pub const TRANSLATION_SEPARATOR: &str = "[SEP]";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub review_id: String,
    pub product_id: String,
    pub purchased_size: Option<String>,
    pub fit: Option<String>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub age_range: Option<String>,
    pub height_range: Option<String>,
    pub weight_range: Option<String>,
    pub review_name: Option<String>,
    pub title: Option<String>,
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_comment: Option<String>,
    pub rate: Option<f64>,
    pub created_date: Option<String>,
    pub scraped_time: i64,
    #[serde(default)]
    pub translated: bool,
    /// Failed backfill attempts; capped reviews are no longer selected.
    #[serde(default)]
    pub translation_attempts: i32,
}

impl Review {
    pub fn combined_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title.as_deref().unwrap_or_default(),
            TRANSLATION_SEPARATOR,
            self.comment.as_deref().unwrap_or_default()
        )
    }

    /// Merge a translated payload into the review.
    ///
    /// The payload must split into exactly a title and a comment on
    /// [`TRANSLATION_SEPARATOR`], both non-empty; otherwise the review is left
    /// untranslated and `false` is returned.
    pub fn apply_translation(&mut self, translated: Option<&str>) -> bool {
        if self.translated {
            return false;
        }
        let Some((title, comment)) = translated.and_then(split_translation) else {
            return false;
        };
        self.translated_title = Some(title);
        self.translated_comment = Some(comment);
        self.translated = true;
        true
    }
}

fn split_translation(text: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = text.split(TRANSLATION_SEPARATOR).map(str::trim).collect();
    match parts.as_slice() {
        [title, comment] if !title.is_empty() && !comment.is_empty() => {
            Some((title.to_string(), comment.to_string()))
        }
        _ => None,
    }
}
