use crate::chart::ChartVariant;

/// Helper trait for string formatting
pub trait ToTitleCase {
    fn to_title_case(&self) -> String;
}

impl ToTitleCase for str {
    fn to_title_case(&self) -> String {
        self.split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Playlist naming utilities
pub struct PlaylistNaming;

impl PlaylistNaming {
    pub const CUSTOM_NAME: &'static str = "Custom Generated Playlist";

    /// "billboard_hot_100" becomes "Billboard Hot 100 Playlist"
    pub fn for_chart(variant: ChartVariant) -> String {
        format!(
            "{} Playlist",
            variant.key().replace('_', " ").to_title_case()
        )
    }

    pub fn description_for(name: &str) -> String {
        format!("Automatically generated playlist: {name}")
    }
}
