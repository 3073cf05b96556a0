use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

const PREVIEW_CHARS: usize = 100;

/// Waste material classes the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Plastic,
    Metal,
    Paper,
    Glass,
    Organic,
    Mixed,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Plastic,
        Category::Metal,
        Category::Paper,
        Category::Glass,
        Category::Organic,
        Category::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Plastic => "plastic",
            Category::Metal => "metal",
            Category::Paper => "paper",
            Category::Glass => "glass",
            Category::Organic => "organic",
            Category::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

/// Explanation and disposal tips for one category, both markdown.
#[derive(Debug, Clone, Copy)]
pub struct CategoryInfo {
    pub explanation: &'static str,
    pub tips: &'static str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CategoryPreview {
    pub explanation_preview: String,
    pub tips_preview: String,
}

/// Read-only lookup table from category to its guidance text.
///
/// Built once at startup and shared between requests. Every [`Category`]
/// has an entry, so lookups cannot fail.
#[derive(Debug)]
pub struct Catalog {
    entries: BTreeMap<Category, CategoryInfo>,
}

impl Catalog {
    pub fn new() -> Self {
        let entries = Category::ALL
            .into_iter()
            .map(|category| (category, builtin_info(category)))
            .collect();

        Catalog { entries }
    }

    pub fn get(&self, category: Category) -> &CategoryInfo {
        self.entries
            .get(&category)
            .or_else(|| self.entries.get(&Category::Mixed))
            .unwrap_or(&MIXED)
    }

    pub fn previews(&self) -> BTreeMap<Category, CategoryPreview> {
        self.entries
            .iter()
            .map(|(category, info)| {
                let preview = CategoryPreview {
                    explanation_preview: preview(info.explanation),
                    tips_preview: preview(info.tips),
                };
                (*category, preview)
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// First line of body text (skipping blanks and headings), cut to
/// [`PREVIEW_CHARS`] characters.
fn preview(markdown: &str) -> String {
    let line = markdown
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .unwrap_or_default();

    let mut preview: String = line.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

const MIXED: CategoryInfo = CategoryInfo {
    explanation: include_str!("catalog/mixed.explanation.md"),
    tips: include_str!("catalog/mixed.tips.md"),
};

fn builtin_info(category: Category) -> CategoryInfo {
    match category {
        Category::Plastic => CategoryInfo {
            explanation: include_str!("catalog/plastic.explanation.md"),
            tips: include_str!("catalog/plastic.tips.md"),
        },
        Category::Metal => CategoryInfo {
            explanation: include_str!("catalog/metal.explanation.md"),
            tips: include_str!("catalog/metal.tips.md"),
        },
        Category::Paper => CategoryInfo {
            explanation: include_str!("catalog/paper.explanation.md"),
            tips: include_str!("catalog/paper.tips.md"),
        },
        Category::Glass => CategoryInfo {
            explanation: include_str!("catalog/glass.explanation.md"),
            tips: include_str!("catalog/glass.tips.md"),
        },
        Category::Organic => CategoryInfo {
            explanation: include_str!("catalog/organic.explanation.md"),
            tips: include_str!("catalog/organic.tips.md"),
        },
        Category::Mixed => MIXED,
    }
}
