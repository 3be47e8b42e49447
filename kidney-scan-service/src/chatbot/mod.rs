mod retrieval;
mod spelling;

pub use retrieval::{FastEmbedder, KnowledgeIndex, QueryEmbedder};
pub use spelling::SpellCorrector;

use std::sync::Arc;

use tracing::info;

use crate::models::ChatReply;

/// Minimum normalized edit-distance ratio for a fuzzy keyword hit
const FUZZY_THRESHOLD: f64 = 0.8;
/// How many knowledge documents back a retrieval answer
const RETRIEVAL_TOP_K: usize = 3;

const LOCATION_KEYWORDS: [&str; 6] = ["city", "town", "place", "area", "near me", "location"];
const MEDICAL_KEYWORDS: [&str; 6] = ["cyst", "kidney", "disease", "tumor", "stone", "cancer"];

const LOCATION_PROMPT: &str = "🧠 I see you're looking for nephrologists near you. Please specify your location (e.g., 'Bangalore', 'New York').";

fn disease_info(term: &str) -> Option<&'static str> {
    match term {
        "cyst" => Some(
            "- What is a Kidney Cyst?\n- A kidney cyst is a fluid-filled sac that forms within the kidney. Most are benign but may cause symptoms if infected or large.\n- How is a Kidney Cyst Treated?\n- Most kidney cysts require no treatment unless symptomatic. Large cysts may require aspiration or surgery.",
        ),
        "stone" => Some(
            "- What is a Kidney Stone?\n- A kidney stone is a solid mineral deposit formed in the kidneys. They may cause severe pain when moving through the urinary tract.\n- How are Kidney Stones Treated?\n- Treatment includes hydration, pain control, and possibly procedures like lithotripsy or surgery.",
        ),
        "tumor" => Some(
            "- What is a Renal Tumor?\n- A kidney tumor may be benign or malignant. RCC is the most common cancer.\n- How are Renal Tumors Treated?\n- Treatment includes surgery, ablation, or immunotherapy based on staging.",
        ),
        "cancer" => Some(
            "- What is Kidney Cancer?\n- It includes various malignancies in the kidney.\n- Treatment usually involves surgery and systemic therapy.",
        ),
        "kidney" => Some(
            "- What is the Function of the Kidney?\n- Kidneys filter blood and manage electrolytes.\n- Common conditions: infections, stones, cysts, tumors.",
        ),
        _ => None,
    }
}

/// The three mutually exclusive reply branches, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRoute {
    /// Location-flavored query; we only ever ask for a city, no lookup
    LocationIntent,
    /// Fuzzy hit on a medical term with a canned explanation block
    Keyword(&'static str),
    /// Fallback: nearest-neighbor retrieval over the knowledge index
    Retrieval,
}

/// Compare each query token and adjacent-token bigram against the options;
/// the best-scoring option at or above the threshold wins, first-listed on
/// ties.
fn fuzzy_match<'a>(query: &str, options: &[&'a str]) -> Option<&'a str> {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let mut candidates: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for pair in tokens.windows(2) {
        candidates.push(format!("{} {}", pair[0], pair[1]));
    }

    let mut best: Option<(&'a str, f64)> = None;
    for option in options {
        for candidate in &candidates {
            let score = strsim::normalized_levenshtein(candidate, &option.to_lowercase());
            if score >= FUZZY_THRESHOLD && best.is_none_or(|(_, top)| score > top) {
                best = Some((option, score));
            }
        }
    }

    best.map(|(option, _)| option)
}

/// Decide the reply branch for an already spell-corrected query.
pub fn route_query(query: &str) -> ChatRoute {
    if fuzzy_match(query, &LOCATION_KEYWORDS).is_some() {
        return ChatRoute::LocationIntent;
    }

    if let Some(term) = fuzzy_match(query, &MEDICAL_KEYWORDS) {
        // "disease" is a routing keyword without a canned block; let those
        // queries fall through to retrieval instead of failing
        if let Some(info) = disease_info(term) {
            return ChatRoute::Keyword(info);
        }
    }

    ChatRoute::Retrieval
}

/// Retrieval-augmented chatbot over the fixed knowledge index. Stateless
/// across calls; every query is independent.
pub struct ChatService {
    embedder: Arc<dyn QueryEmbedder>,
    index: KnowledgeIndex,
    speller: SpellCorrector,
}

impl ChatService {
    pub fn new(embedder: Arc<dyn QueryEmbedder>, index: KnowledgeIndex) -> Self {
        let vocabulary: Vec<String> = MEDICAL_KEYWORDS
            .iter()
            .chain(LOCATION_KEYWORDS.iter())
            .map(|s| s.to_string())
            .chain(index.documents().iter().cloned())
            .collect();

        Self {
            embedder,
            index,
            speller: SpellCorrector::new(vocabulary),
        }
    }

    pub async fn respond(&self, message: &str) -> anyhow::Result<ChatReply> {
        let corrected = self.speller.correct(message);
        let route = route_query(&corrected);
        info!("Chat query routed as {route:?}");

        let text = match route {
            ChatRoute::LocationIntent => LOCATION_PROMPT.to_string(),
            ChatRoute::Keyword(info) => format!(
                "🧠 Based on nephrology knowledge:\n\n{info}\n\nNeed more help? Ask me another question!"
            ),
            ChatRoute::Retrieval => {
                let embedding = self.embedder.embed(&corrected).await?;
                let documents = self.index.nearest(&embedding, RETRIEVAL_TOP_K);
                let answer = documents
                    .iter()
                    .map(|doc| format!("- {doc}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "🧠 Based on nephrology knowledge:\n{answer}\n\nNeed more help? Ask me another question!"
                )
            }
        };

        Ok(ChatReply { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeEmbedder(Vec<f32>);

    #[async_trait]
    impl QueryEmbedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn service() -> ChatService {
        let index = KnowledgeIndex::new(
            vec![
                "Drinking water lowers stone risk.".to_string(),
                "Most cysts are benign.".to_string(),
                "Tumors need staging.".to_string(),
                "Kidneys filter blood.".to_string(),
            ],
            vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![3.0, 3.0],
            ],
        )
        .unwrap();
        ChatService::new(Arc::new(FakeEmbedder(vec![0.1, 0.0])), index)
    }

    #[test]
    fn keyword_branch_wins_over_retrieval() {
        let route = route_query("cyst treatment");
        assert_eq!(route, ChatRoute::Keyword(disease_info("cyst").unwrap()));
    }

    #[test]
    fn location_intent_wins_over_everything() {
        assert_eq!(route_query("nephrologist near me"), ChatRoute::LocationIntent);
        assert_eq!(route_query("which city has doctors"), ChatRoute::LocationIntent);
    }

    #[test]
    fn unmatched_queries_fall_back_to_retrieval() {
        assert_eq!(route_query("how long is recovery"), ChatRoute::Retrieval);
    }

    #[test]
    fn disease_keyword_has_no_canned_block_and_retrieves() {
        assert_eq!(route_query("what is this disease"), ChatRoute::Retrieval);
    }

    #[test]
    fn misspelled_keyword_still_routes_to_keyword_branch() {
        // one edit away from "stone": 4/5 similarity, exactly at threshold
        let route = route_query("stnne");
        assert_eq!(route, ChatRoute::Keyword(disease_info("stone").unwrap()));
    }

    #[tokio::test]
    async fn location_reply_is_the_fixed_prompt() {
        let reply = service().respond("nephrologist near me").await.unwrap();
        assert_eq!(reply.text, LOCATION_PROMPT);
    }

    #[tokio::test]
    async fn keyword_reply_contains_block_verbatim() {
        let reply = service().respond("cyst treatment").await.unwrap();
        assert!(reply.text.contains(disease_info("cyst").unwrap()));
        assert!(reply.text.starts_with("🧠 Based on nephrology knowledge:"));
        assert!(reply.text.ends_with("Need more help? Ask me another question!"));
    }

    #[tokio::test]
    async fn retrieval_reply_lists_three_nearest_documents() {
        let reply = service().respond("how long is recovery").await.unwrap();
        assert!(reply.text.contains("- Drinking water lowers stone risk."));
        assert!(reply.text.contains("- Most cysts are benign."));
        assert!(reply.text.contains("- Tumors need staging."));
        assert!(!reply.text.contains("Kidneys filter blood."));
    }

    #[tokio::test]
    async fn spelling_correction_feeds_the_keyword_branch() {
        let reply = service().respond("kidny cancr").await.unwrap();
        // "kidny" corrects to "kidney" and routes to its canned block
        assert!(reply.text.contains("Function of the Kidney"));
    }
}
