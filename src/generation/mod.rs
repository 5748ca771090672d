// Generation module
// Completion-service client and the prompts composed around retrieved context

pub mod openai;

pub use openai::CompletionClient;

/// Build the answer prompt from a user query and the assembled review context.
#[inline]
pub fn answer_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert assistant for depression drug recommendations. Based on the following context, \
         answer the user's question concisely and accurately:\n\n\
         Context:\n{context}\n\n\
         User Query: {query}\n\n\
         Response:"
    )
}

/// Build the yes/no prompt deciding whether a query is on topic.
#[inline]
pub fn relevance_prompt(query: &str) -> String {
    format!(
        "You are an assistant that determines whether a query is related to depression drug recommendations. \
         Only respond with 'Yes' or 'No'. Here are examples of related queries:\n\
         - 'Which drug works best for depression in women aged 30 to 40?'\n\
         - 'Is Prozac effective for treating anxiety along with depression?'\n\
         - 'What are the best-rated drugs for men suffering from depression?'\n\n\
         Now analyze the following query:\n\
         '{query}'\n\
         Is this query related to depression drug recommendations? Respond with 'Yes' or 'No' only."
    )
}
