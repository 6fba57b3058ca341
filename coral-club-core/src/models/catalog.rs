use serde::{Deserialize, Serialize};

/// A purchasable extra (towel, cooler, drink...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub img: String,
}

impl Item {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            price,
            img: String::new(),
        }
    }

    pub fn with_img(mut self, img: impl Into<String>) -> Self {
        self.img = img.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    pub fn find_item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

/// Lowercases a name and collapses every run of non `[a-z0-9]` into `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_gap = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Bebidas"), "bebidas");
        assert_eq!(slugify("Agua Mineral"), "agua-mineral");
        assert_eq!(slugify("Sombrilla (1 mesa + 2 sillas)"), "sombrilla-1-mesa-2-sillas-");
        assert_eq!(slugify("Toalla  Extra"), "toalla-extra");
    }

    #[test]
    fn test_item_ids_from_name() {
        let cat = Category::new("Snacks").with_items(vec![Item::new("Papas Fritas", 3.5)]);
        assert_eq!(cat.id, "snacks");
        assert!(cat.find_item("papas-fritas").is_some());
        assert!(cat.find_item("papas").is_none());
    }
}
