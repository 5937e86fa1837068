use serde::{Deserialize, Serialize};

/// Reserved sentinel category for transactions deliberately excluded from
/// auto-categorization: credits awaiting manual review and fallback
/// proposals that failed validation.
pub const UNSPECIFIED: &str = "Unspecified";

/// The ordered set of valid category paths. Constructed explicitly by the
/// caller (design-time configuration, not a hidden global) and guaranteed
/// to contain the `Unspecified` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    categories: Vec<String>,
}

impl CategoryTaxonomy {
    pub fn new(mut categories: Vec<String>) -> Self {
        if !categories.iter().any(|c| c == UNSPECIFIED) {
            categories.push(UNSPECIFIED.to_string());
        }
        CategoryTaxonomy { categories }
    }

    pub fn is_valid(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        CategoryTaxonomy::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_always_present() {
        let taxonomy = CategoryTaxonomy::new(vec!["Expenses.Groceries".to_string()]);
        assert!(taxonomy.is_valid(UNSPECIFIED));
        assert!(taxonomy.is_valid("Expenses.Groceries"));
    }

    #[test]
    fn sentinel_is_not_duplicated() {
        let taxonomy = CategoryTaxonomy::new(vec![
            UNSPECIFIED.to_string(),
            "Expenses.Dining Out".to_string(),
        ]);
        assert_eq!(taxonomy.len(), 2);
    }

    #[test]
    fn unknown_category_is_invalid() {
        let taxonomy = CategoryTaxonomy::default();
        assert!(!taxonomy.is_valid("Expenses.Made Up"));
    }
}
