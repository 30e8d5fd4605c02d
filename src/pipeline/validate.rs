use crate::llm::{CompletionClient, LlmError, ResponseFormat, Tier};

fn prompt(today: &str, query: &str, draft: &str) -> String {
    format!(
        r#"Today is {today}. Review and polish this answer so that it meets every requirement below.

Requirements:
1. The answer strictly follows markdown formatting.
2. In-text citations look like this:
   This is a sentence. [1](https://...)
   where 1 is the number of [Title 1](https://...) in the reference list.
   The answer ends with a reference list in this format:
   ## References
   1. [Title 1](url)
   2. [Title 2](url)
   The reference list follows the order of the in-text citations.
   Replace non-ASCII brackets such as 【】 and （） with [] and ().
3. The answer stays relevant to the question.
4. The answer is written in the language of the question; translate it if it is not.

Question: {query}
Answer: {draft}

Return only the validated and polished answer, without these instructions or any commentary."#
    )
}

/// Normalizes citation syntax, reference ordering and language of a draft.
pub async fn validate(
    llm: &impl CompletionClient,
    today: &str,
    query: &str,
    draft: &str,
    tier: Tier,
) -> Result<String, LlmError> {
    llm.complete(&prompt(today, query, draft), ResponseFormat::Text, tier)
        .await
}
