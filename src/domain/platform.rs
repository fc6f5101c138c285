use serde::{Deserialize, Serialize};

/// Marketplace a rating or deal originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "platform", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Tradera,
    Blocket,
    Ebay,
    Airbnb,
    Husknuten,
    Tiptap,
    #[default]
    Other,
}

impl Platform {
    /// Strict parse of a free-text source tag. Unknown values fall back to `Other`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "tradera" | "tradera.se" => Platform::Tradera,
            "blocket" | "blocket.se" => Platform::Blocket,
            "ebay" | "ebay.com" | "ebay.se" => Platform::Ebay,
            "airbnb" | "airbnb.com" => Platform::Airbnb,
            "husknuten" | "husknuten.se" => Platform::Husknuten,
            "tiptap" | "tiptap.se" => Platform::Tiptap,
            _ => Platform::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tradera => "TRADERA",
            Platform::Blocket => "BLOCKET",
            Platform::Ebay => "EBAY",
            Platform::Airbnb => "AIRBNB",
            Platform::Husknuten => "HUSKNUTEN",
            Platform::Tiptap => "TIPTAP",
            Platform::Other => "OTHER",
        }
    }

    /// `Other` cannot anchor a deal.
    pub fn is_known(&self) -> bool {
        *self != Platform::Other
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
