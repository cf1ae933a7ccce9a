use regex::Regex;

use crate::config::ActionRuleConfig;

/// A compiled route-pattern to action-name rule.
#[derive(Debug)]
struct ActionRule {
    pattern: Regex,
    action: String,
}

/// Ordered table mapping inbound routes to abstract action names.
///
/// Built once at startup and read-only afterwards. Evaluation is
/// first-match-wins over the comparison string `"{method} {path}"`, so
/// overlapping patterns are resolved by declaration order, not specificity.
/// Patterns are standard regex and are anchored by the rule author.
#[derive(Debug)]
pub struct ActionTable {
    rules: Vec<ActionRule>,
}

impl ActionTable {
    pub fn compile(rules: &[ActionRuleConfig]) -> Result<Self, anyhow::Error> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                anyhow::anyhow!("Invalid action rule pattern {:?}: {}", rule.pattern, e)
            })?;
            compiled.push(ActionRule {
                pattern,
                action: rule.action.clone(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Map a (method, path) pair to the action of the first matching rule.
    pub fn resolve(&self, method: &str, path: &str) -> Option<&str> {
        let route = format!("{} {}", method, path);
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&route))
            .map(|rule| rule.action.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, action: &str) -> ActionRuleConfig {
        ActionRuleConfig {
            pattern: pattern.to_string(),
            action: action.to_string(),
        }
    }

    #[test]
    fn maps_product_routes() {
        let table = ActionTable::compile(&[
            rule("^POST /products/?$", "CreateProduct"),
            rule("^GET /products(?:/.*)?", "ViewProduct"),
        ])
        .unwrap();

        assert_eq!(table.resolve("GET", "/products/42"), Some("ViewProduct"));
        assert_eq!(table.resolve("POST", "/products"), Some("CreateProduct"));
        assert_eq!(table.resolve("POST", "/products/"), Some("CreateProduct"));
        assert_eq!(table.resolve("DELETE", "/products/42"), None);
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        let table = ActionTable::compile(&[
            rule("^GET /products/.*", "First"),
            rule("^GET /products/42$", "Second"),
        ])
        .unwrap();

        assert_eq!(table.resolve("GET", "/products/42"), Some("First"));
    }

    #[test]
    fn unmatched_route_yields_no_action() {
        let table = ActionTable::compile(&[rule("^GET /orders$", "ViewOrder")]).unwrap();

        assert_eq!(table.resolve("GET", "/invoices"), None);
        assert_eq!(table.resolve("PATCH", "/orders"), None);
    }

    #[test]
    fn patterns_are_not_implicitly_anchored() {
        let table = ActionTable::compile(&[rule("products", "Loose")]).unwrap();

        assert_eq!(table.resolve("GET", "/api/products/42"), Some("Loose"));
    }

    #[test]
    fn invalid_pattern_is_a_startup_error() {
        let result = ActionTable::compile(&[rule("^GET /products(", "Broken")]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_table_matches_nothing() {
        let table = ActionTable::compile(&[]).unwrap();
        assert_eq!(table.resolve("GET", "/anything"), None);
    }
}
