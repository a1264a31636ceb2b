//! System prompt assembly for the handbook assistant.

use crate::llm::ChatMessage;

use super::passage::ScoredPassage;

/// Answer the model is instructed to give when neither source covers
/// the question.
pub const REFUSAL_GUIDANCE: &str = "I don't have enough information to answer that question. \
     Please refer to your local church leaders for more specific guidance.";

const HEADER: &str = "You are an AI assistant focused on providing information about \
     The Church of Jesus Christ of Latter-day Saints, with special emphasis on the Elders Quorum.";

const SECONDARY_SOURCE: &str = "\
SECONDARY SOURCE - Official Church Website (churchofjesuschrist.org):
If you cannot find specific information in the handbook excerpts above, you may ONLY reference official information from churchofjesuschrist.org.";

const GUIDELINES: &str = "\
RESPONSE GUIDELINES:
1. First, try to answer using the handbook excerpts provided above
2. If the handbook excerpts don't contain the information, you may provide information from churchofjesuschrist.org
3. Always cite your source:
   - For handbook excerpts, cite as [Handbook Excerpt #]
   - For church website, cite as [churchofjesuschrist.org]
4. Do not make assumptions or add information from any other sources
5. If the information cannot be found in either source, say";

/// Render the retrieved passages into the fixed system message.
///
/// Pure function of its input; identical passages always produce an
/// identical message. Excerpts keep their retrieval order and are
/// numbered from 1.
pub fn build_system_message(passages: &[ScoredPassage]) -> ChatMessage {
    let excerpts = passages
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "[{}] {} [Source: {}]",
                i + 1,
                entry.passage.text,
                entry.passage.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let content = format!(
        "{HEADER}\n\nPRIMARY SOURCE - Church Handbook excerpts:\n{excerpts}\n\n{SECONDARY_SOURCE}\n\n{GUIDELINES} \"{REFUSAL_GUIDANCE}\""
    );

    ChatMessage::system(content)
}
