//! Prompt construction for each deliberation stage.
//!
//! The stage-2 prompt carries the ranking format contract the parser relies
//! on (`FINAL RANKING:` heading, `1. Response A` lines); keep the two in
//! sync when changing either side.

/// Synthesis body used when the chairman call fails. The run still
/// completes with this text in place of a real synthesis.
pub const FALLBACK_SYNTHESIS: &str =
    "Error: the chairman was unable to produce the final synthesis.";

/// Title used when title generation fails.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Stage-2 prompt: the original query plus every anonymized stage-1
/// response, with the ranking format contract spelled out.
pub fn ranking_prompt(query: &str, labeled_responses: &[(String, String)]) -> String {
    let responses_text = labeled_responses
        .iter()
        .map(|(label, response)| format!("{label}:\n{response}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an impartial judge. Several AI models have each answered the \
question below; their responses are presented anonymized.\n\
\n\
Question: {query}\n\
\n\
Here are the responses from the different models (anonymized):\n\
\n\
{responses_text}\n\
\n\
Your tasks:\n\
1. First, evaluate each response individually. For each one, explain what it \
does well and what it does poorly.\n\
2. Then, at the end of your evaluation, give a final ranking.\n\
\n\
IMPORTANT: the final ranking MUST be formatted EXACTLY like this:\n\
\n\
- Start with the line \"FINAL RANKING:\" (capitals, with the colon)\n\
- Then list the responses from best to worst as a numbered list.\n\
- Each line must contain: a number, a period, a space, then ONLY the response \
label (for example \"1. Response A\").\n\
- Do not add any other text or explanation on those lines.\n\
\n\
Example of the correct format for the ranking section:\n\
\n\
FINAL RANKING:\n\
1. Response C\n\
2. Response A\n\
3. Response B\n\
\n\
Now provide your evaluation and your ranking:"
    )
}

/// Stage-3 prompt: query, every stage-1 response (attributed), and every
/// raw stage-2 ranking, for the chairman to fold into one answer.
pub fn synthesis_prompt(
    query: &str,
    responses: &[(String, String)],
    rankings: &[(String, String)],
) -> String {
    let stage1_text = responses
        .iter()
        .map(|(model, response)| format!("Model: {model}\nResponse: {response}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    let stage2_text = rankings
        .iter()
        .map(|(model, ranking)| format!("Model: {model}\nRanking: {ranking}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are the chairman of a council of AI models. Each model answered \
the user's question independently, then the models ranked each other's \
anonymized responses.\n\
\n\
Question: {query}\n\
\n\
Stage 1 - individual responses:\n\
{stage1_text}\n\
\n\
Stage 2 - peer rankings:\n\
{stage2_text}\n\
\n\
As chairman, synthesize all of this into a single, complete, and accurate \
answer to the user's original question. Take into account:\n\
\n\
- The individual responses and the insights each one brings\n\
- The peer rankings and what they reveal about response quality\n\
- Any points of convergence or divergence\n\
\n\
Provide a clear, well-argued final answer that represents the collective \
wisdom of the council:"
    )
}

/// Single-call prompt for the secondary title-generation operation.
pub fn title_prompt(query: &str) -> String {
    format!(
        "Create a very short title (3 to 5 words maximum) that summarizes the \
following message. The title must be concise and descriptive. Do not use \
quotes or punctuation.\n\
\n\
Message: {query}\n\
\n\
Title:"
    )
}
