use crate::error::ChartError;
use std::fmt;
use std::str::FromStr;

/// Selectors and source URL for one chart page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartTagSchema {
    pub chart_item_selector: &'static str,
    pub title_selector: &'static str,
    pub artist_selector: &'static str,
    pub source_url: &'static str,
}

impl ChartTagSchema {
    /// All four fields must be non-empty for the schema to be usable
    pub fn is_usable(&self) -> bool {
        [
            self.chart_item_selector,
            self.title_selector,
            self.artist_selector,
            self.source_url,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// The closed set of supported charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartVariant {
    BillboardHot100,
    BillboardTiktokTop50,
    BillboardDecadeEndHot100,
}

impl ChartVariant {
    pub const ALL: [ChartVariant; 3] = [
        ChartVariant::BillboardHot100,
        ChartVariant::BillboardTiktokTop50,
        ChartVariant::BillboardDecadeEndHot100,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ChartVariant::BillboardHot100 => "billboard_hot_100",
            ChartVariant::BillboardTiktokTop50 => "billboard_tiktok_top_50",
            ChartVariant::BillboardDecadeEndHot100 => "billboard_decade_end_hot_100",
        }
    }

    pub fn schema(self) -> ChartTagSchema {
        match self {
            ChartVariant::BillboardHot100 => ChartTagSchema {
                chart_item_selector: "ul.o-chart-results-list-row",
                title_selector: "h3.c-title",
                artist_selector: "span.c-label.a-no-trucate.a-font-primary-s",
                source_url: "https://www.billboard.com/charts/hot-100",
            },
            ChartVariant::BillboardTiktokTop50 => ChartTagSchema {
                chart_item_selector: "div.o-chart-results-list-row-container",
                title_selector: "h3.c-title",
                artist_selector: "span.c-label.a-font-primary-s",
                source_url: "https://www.billboard.com/charts/tiktok-billboard-top-50/",
            },
            ChartVariant::BillboardDecadeEndHot100 => ChartTagSchema {
                chart_item_selector: "div.o-chart-results-list-row-container",
                title_selector: "h3.c-title",
                artist_selector: "span.c-label.a-font-primary-s",
                source_url: "https://www.billboard.com/charts/decade-end/hot-100",
            },
        }
    }
}

impl fmt::Display for ChartVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ChartVariant {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        ChartVariant::ALL
            .into_iter()
            .find(|variant| variant.key() == key)
            .ok_or_else(|| ChartError::UnsupportedVariant(s.to_string()))
    }
}

/// Resolve a variant key to its schema. Unknown keys are an error, never a default.
pub fn lookup(variant_key: &str) -> Result<(ChartVariant, ChartTagSchema), ChartError> {
    let variant: ChartVariant = variant_key.parse()?;
    let schema = variant.schema();
    if !schema.is_usable() {
        return Err(ChartError::InvalidSchema(variant.key().to_string()));
    }
    Ok((variant, schema))
}
