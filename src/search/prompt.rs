use serde::Serialize;

use crate::items::{truncate_chars, Searchable};

/// Characters of content shown per item inside the prompt.
const PROMPT_CONTENT_CHARS: usize = 800;

/// What the remote ranker sees of one item.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemSummary {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub tags: String,
    pub content: String,
}

pub fn summarize<T: Searchable>(items: &[T], budget: usize) -> Vec<ItemSummary> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| ItemSummary {
            index,
            id: item.id().to_string(),
            title: item.title().to_string(),
            tags: item.tags().join(", "),
            content: item.search_content(budget),
        })
        .collect()
}

fn render_item(item: &ItemSummary) -> String {
    let tags = if item.tags.is_empty() {
        "No tags"
    } else {
        item.tags.as_str()
    };

    let mut rendered = format!("{}. {}\n   Tags: {tags}", item.index, item.title);
    if !item.content.trim().is_empty() {
        rendered.push_str(&format!(
            "\n   Content: {}...",
            truncate_chars(&item.content, PROMPT_CONTENT_CHARS)
        ));
    }
    rendered
}

/// Ranking instruction for `label` ("bookmarks", "PDFs", ...). Biased towards
/// recall: loosely related items are requested too.
pub fn build_prompt(label: &str, query: &str, items: &[ItemSummary]) -> String {
    let listing = items
        .iter()
        .map(render_item)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are an advanced universal semantic search engine that understands concepts, topics, and relationships across ANY domain.

Your task: Find ALL {label} semantically related to the search query, understanding that related content may use:
- Different terminology for the same concept (e.g., "database" = "SQL", "DBMS", "data storage", "PostgreSQL")
- Related concepts (e.g., "machine learning" relates to "AI", "neural networks", "data science")
- Synonyms and alternative terms (e.g., "programming" = "coding", "development", "software engineering")
- Different languages (e.g., "election" = "निर्वाचन", "चुनाव")
- Broader/narrower terms (e.g., "Python" relates to "programming", "data science", "web development")
- Related topics in the same domain (e.g., "React" relates to "JavaScript", "frontend", "component library")
- Cross-domain relationships (e.g., "authentication" = "login", "OAuth", "JWT", "security")

Search Query: "{query}"

{upper} to search through:
{listing}

INSTRUCTIONS:
1. Understand the core concept behind the search query
2. Find items that discuss the same topic, even if they use different words
3. Match on semantic meaning, not just exact word matches
4. Be inclusive: if there is ANY semantic connection to the query's core concept, include it
5. Order by relevance, most conceptually similar first

Return ONLY a JSON array of the indices (numbers) of matching {label}, ordered by relevance.
Example: [2, 5, 1, 8, 3]

IMPORTANT: Return ONLY the JSON array, nothing else."#,
        upper = label.to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(index: usize, tags: &str, content: &str) -> ItemSummary {
        ItemSummary {
            index,
            id: format!("id{index}"),
            title: format!("Title {index}"),
            tags: tags.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_prompt_lists_items_and_query() {
        let items = vec![summary(0, "rust, async", "tokio runtime"), summary(1, "", "")];
        let prompt = build_prompt("bookmarks", "concurrency", &items);

        assert!(prompt.contains("Search Query: \"concurrency\""));
        assert!(prompt.contains("BOOKMARKS to search through:"));
        assert!(prompt.contains("0. Title 0\n   Tags: rust, async\n   Content: tokio runtime..."));
        assert!(prompt.contains("1. Title 1\n   Tags: No tags"));
        assert!(!prompt.contains("1. Title 1\n   Tags: No tags\n   Content"));
    }

    #[test]
    fn test_prompt_content_is_clipped() {
        let items = vec![summary(0, "", &"x".repeat(2000))];
        let prompt = build_prompt("PDFs", "q", &items);
        assert!(prompt.contains(&format!("Content: {}...", "x".repeat(PROMPT_CONTENT_CHARS))));
        assert!(!prompt.contains(&"x".repeat(PROMPT_CONTENT_CHARS + 1)));
    }
}
