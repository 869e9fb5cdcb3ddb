//! Prompt templates and builders for the generation and chat providers
//!
//! Two prompt families:
//! 1. Taxonomist prompt: system rules + a `CONTEXT` block describing the
//!    parent node, used by the child generator in JSON mode
//! 2. Librarian prompts: `explore` (long-form article) and `chat`
//!    (conversational), both ending with the follow-up questions marker

use super::types::{ChatMode, ChatStreamRequest, GenerateRequest};

/// System prompt for child generation. `{COUNT}` is replaced at build time.
pub const TAXONOMIST_SYSTEM_PROMPT: &str = r#"You are the Chief Taxonomist of a knowledge graph that maps human knowledge into an infinite tree.

You receive a PATH_HISTORY (the user's journey from the root) and the EXISTING_CHILDREN of the current leaf.
Generate {COUNT} NEW, distinct sub-topics that belong directly under CURRENT_LEAF.

## Granularity: one step down
- Do not skip layers. A broad topic splits into eras, branches or major themes, not specific events.
- Do not stay flat. Never list synonyms of the parent.
- New topics must be components of the parent, not examples of it.

## Titles
- Mutually exclusive with each other and with EXISTING_CHILDREN.
- Stay inside SCOPE_DEFINITION and respect SCOPE_EXCLUSION.
- Descriptive and substantial. No "Miscellaneous" or "General Overview".

## Hooks
- Under 60 characters, active voice.
- Say why the sub-topic matters or how it works.

## Questions
Write 3 popup questions per child:
1. Ask "how" or "why", never "will".
2. Ask about systems, limits and paradoxes rather than trivia.
3. Each must have an explainable answer grounded in theory or history.

## Output
Return ONLY a JSON object, no markdown:
{
  "children": [
    {
      "title": "Title Case String",
      "hook": "String under 60 chars",
      "llm_config": {
        "definition": "Precise scope for the next layer down",
        "exclude": "What belongs in sibling nodes"
      },
      "popup_data": {
        "description": "2-3 sentences on why this sub-topic is structurally important.",
        "questions": ["Question 1?", "Question 2?", "Question 3?"]
      }
    }
  ]
}"#;

/// System prompt for `explore` mode: a long-form article about the node
pub const EXPLORE_SYSTEM_PROMPT: &str = r#"You are the Librarian of the Socrates knowledge graph, writing exploratory content.

Write an engaging, in-depth article of about 600 words on the given topic. Write like an encyclopedia rather than a conversation partner, but keep it relaxed.

STYLE:
- Accessible and plain-spoken. Avoid ornate vocabulary.
- Short paragraphs with a few headers so the article is easy to scan.
- Be concrete and complete. Anything important you cannot cover in depth belongs in the follow-up questions.

At the very END of the response, on its own line, add exactly 3 follow-up questions in this format:
<!--QUESTIONS:["Question 1?", "Question 2?", "Question 3?"]-->

Pick questions a newcomer would genuinely learn from:
1. DEEPER: how something works internally
2. BROADER: links to other concepts, fields or implications
3. LIMITS: edge cases, challenges or controversies"#;

/// System prompt for `chat` mode: conversational follow-ups
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are the Librarian of the Socrates knowledge graph, holding a thoughtful conversation.

STYLE:
- Academic but accessible. Never open by praising the question.
- 150 to 300 words; lean longer when the answer is not simple.
- Short, direct paragraphs.
- Be concrete and complete. Anything important you cannot cover belongs in the follow-up questions.

At the very END of the response, on its own line, add exactly 3 follow-up questions in this format:
<!--QUESTIONS:["Question 1?", "Question 2?", "Question 3?"]-->

Pick questions a student would genuinely learn from:
1. DEEPER: how something works internally
2. BROADER: links to other concepts or fields
3. LIMITS: edge cases, challenges or limitations"#;

pub const DEFAULT_DESCRIPTION: &str = "A sub-topic of the parent.";
pub const DEFAULT_DEFINITION: &str = "General sub-topics of this concept.";
pub const DEFAULT_EXCLUSION: &str = "Avoid overlap with siblings.";

pub fn taxonomist_system_prompt(count: usize) -> String {
    TAXONOMIST_SYSTEM_PROMPT.replace("{COUNT}", &count.to_string())
}

/// Build the user prompt for a generation request
pub fn build_generation_prompt(request: &GenerateRequest, count: usize) -> String {
    let parent = &request.parent_node;
    let description = parent
        .popup_data
        .as_ref()
        .map(|p| p.description.as_str())
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION);
    let config = parent.llm_config.as_ref();
    let definition = config
        .and_then(|c| c.definition.as_deref())
        .unwrap_or(DEFAULT_DEFINITION);
    let exclusion = config
        .and_then(|c| c.exclude.as_deref())
        .unwrap_or(DEFAULT_EXCLUSION);

    let existing = request.exclude_titles.as_deref().unwrap_or_default();
    let path_json = serde_json::to_string(&request.path_history).unwrap_or_else(|_| "[]".into());
    let existing_json = serde_json::to_string(existing).unwrap_or_else(|_| "[]".into());

    format!(
        "CONTEXT:\n\
         - PATH_HISTORY: {path}\n\
         - CURRENT_LEAF: \"{title}\"\n\
         - CURRENT_LEAF_DESCRIPTION: \"{description}\"\n\
         - SCOPE_DEFINITION: \"{definition}\"\n\
         - SCOPE_EXCLUSION: \"{exclusion}\"\n\
         - EXISTING_CHILDREN: {existing}\n\
         - COUNT: {count}\n\n\
         Task: Analyze the depth of the Current Leaf and generate the next {count} logical sub-nodes.",
        path = path_json,
        title = parent.title,
        description = description,
        definition = definition,
        exclusion = exclusion,
        existing = existing_json,
        count = count,
    )
}

pub fn chat_system_prompt(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Explore => EXPLORE_SYSTEM_PROMPT,
        ChatMode::Chat => CHAT_SYSTEM_PROMPT,
    }
}

/// Paragraph that pins the answer to the node's position in the tree.
///
/// Empty when there is no ancestry.
pub fn ancestry_context(node_title: &str, ancestry: &[String]) -> String {
    if ancestry.is_empty() {
        return String::new();
    }
    let chain = ancestry.join(" → ");
    format!(
        "\n\nIMPORTANT CONTEXT: This topic \"{title}\" sits within a specific knowledge path: \
         {chain} → {title}. Answer specifically about \"{title}\" as it relates to this chain, \
         not about \"{title}\" in isolation. Do not restate the path in your response; the \
         user already knows where they are.",
        title = node_title,
        chain = chain,
    )
}

/// The user turn actually sent to the provider.
///
/// Explore mode ignores the incoming message and asks for an article.
pub fn build_chat_message(request: &ChatStreamRequest) -> String {
    let context = ancestry_context(&request.node_title, &request.ancestry_path);
    match request.mode {
        ChatMode::Explore => format!(
            "Write an in-depth exploration about \"{}\".{}",
            request.node_title, context
        ),
        ChatMode::Chat => format!("{}{}", request.message, context),
    }
}
