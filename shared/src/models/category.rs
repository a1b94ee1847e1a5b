//! Item category models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named, ordered grouping of warehouse items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub display_order: i32,
    pub is_active: bool,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category as shown in listings; `id` is `None` for the uncategorized bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryView {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub display_order: i32,
    pub is_active: bool,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: Some(category.id),
            name: category.name.clone(),
            slug: category.slug.clone(),
            display_order: category.display_order,
            is_active: category.is_active,
            icon: category.icon.clone(),
            color: category.color.clone(),
        }
    }
}

/// Direction for manual category reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderDirection {
    Up,
    Down,
}

/// Palette keys accepted for category colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryColor {
    Slate,
    Red,
    Orange,
    Amber,
    Green,
    Teal,
    Blue,
    Indigo,
    Purple,
    Pink,
}

impl CategoryColor {
    pub const ALL: [CategoryColor; 10] = [
        CategoryColor::Slate,
        CategoryColor::Red,
        CategoryColor::Orange,
        CategoryColor::Amber,
        CategoryColor::Green,
        CategoryColor::Teal,
        CategoryColor::Blue,
        CategoryColor::Indigo,
        CategoryColor::Purple,
        CategoryColor::Pink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryColor::Slate => "slate",
            CategoryColor::Red => "red",
            CategoryColor::Orange => "orange",
            CategoryColor::Amber => "amber",
            CategoryColor::Green => "green",
            CategoryColor::Teal => "teal",
            CategoryColor::Blue => "blue",
            CategoryColor::Indigo => "indigo",
            CategoryColor::Purple => "purple",
            CategoryColor::Pink => "pink",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value))
    }
}
