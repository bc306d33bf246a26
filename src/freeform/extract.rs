use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Query,
    Snippet,
}

impl ActionKind {
    /// Fence language tag the model uses to request this action.
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::Query => "sql",
            ActionKind::Snippet => "python",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub body: String,
}

// Opening fence+tag must end its line and the closing fence must start one;
// the lazy body stops at the first closing fence.
static FENCES: Lazy<Vec<(ActionKind, Regex)>> = Lazy::new(|| {
    [ActionKind::Query, ActionKind::Snippet]
        .into_iter()
        .map(|kind| {
            let pattern = format!(r"(?s)```{}\n(.*?)\n```", regex::escape(kind.tag()));
            (kind, Regex::new(&pattern).expect("fence pattern is valid"))
        })
        .collect()
});

/// Collect fenced action requests from a model reply.
///
/// Results are grouped by kind: every Query block in document order, then
/// every Snippet block in document order. A reply without recognized fences
/// yields an empty list.
pub fn extract_actions(response: &str) -> Vec<Action> {
    FENCES
        .iter()
        .flat_map(|(kind, pattern)| {
            pattern.captures_iter(response).map(move |caps| Action {
                kind: *kind,
                body: caps[1].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_no_actions() {
        assert!(extract_actions("The means are listed above. Done!").is_empty());
        assert!(extract_actions("").is_empty());
    }

    #[test]
    fn test_unknown_tags_are_ignored() {
        let text = "```bash\nls -la\n```\n```\nno tag\n```\n```SQL\nSELECT 1\n```";
        assert!(extract_actions(text).is_empty());
    }

    #[test]
    fn test_single_query_block() {
        let text = "Let me check.\n```sql\nSELECT species, COUNT(*)\nFROM iris\nGROUP BY species;\n```\n";
        let actions = extract_actions(text);
        assert_eq!(
            actions,
            vec![Action {
                kind: ActionKind::Query,
                body: "SELECT species, COUNT(*)\nFROM iris\nGROUP BY species;".to_string(),
            }]
        );
    }

    #[test]
    fn test_groups_by_kind_then_document_order() {
        let text = "\
```python
print('first snippet')
```
Then a query:
```sql
SELECT 1;
```
```python
print('second snippet')
```
```sql
SELECT 2;
```";
        let actions = extract_actions(text);
        let summary: Vec<(ActionKind, &str)> = actions
            .iter()
            .map(|a| (a.kind, a.body.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ActionKind::Query, "SELECT 1;"),
                (ActionKind::Query, "SELECT 2;"),
                (ActionKind::Snippet, "print('first snippet')"),
                (ActionKind::Snippet, "print('second snippet')"),
            ]
        );
    }

    #[test]
    fn test_counts_partition_by_kind() {
        let mut text = String::new();
        for i in 0..3 {
            text.push_str(&format!("```sql\nSELECT {i};\n```\nprose\n"));
        }
        for i in 0..2 {
            text.push_str(&format!("```python\nprint({i})\n```\n"));
        }

        let actions = extract_actions(&text);
        assert_eq!(actions.len(), 5);
        assert_eq!(actions.iter().filter(|a| a.kind == ActionKind::Query).count(), 3);
        assert_eq!(actions.iter().filter(|a| a.kind == ActionKind::Snippet).count(), 2);
    }

    #[test]
    fn test_body_never_spans_a_closing_fence() {
        let text = "```python\na = 1\n```\nnot code\n```\n";
        let actions = extract_actions(text);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].body, "a = 1");
    }

    #[test]
    fn test_unterminated_or_inline_fences_do_not_match() {
        assert!(extract_actions("```sql\nSELECT 1;").is_empty());
        assert!(extract_actions("```sql SELECT 1 ```").is_empty());
        assert!(extract_actions("```sql\n```").is_empty());
    }

    #[test]
    fn test_empty_body_between_fences_is_an_action() {
        let actions = extract_actions("```sql\n\n```");
        assert_eq!(
            actions,
            vec![Action {
                kind: ActionKind::Query,
                body: String::new(),
            }]
        );
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(ActionKind::Query.tag(), "sql");
        assert_eq!(ActionKind::Snippet.to_string(), "python");
    }
}
