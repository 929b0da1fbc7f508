//! Prompt templates for query expansion and context compression.

/// Sentinel the extractor returns when a passage has nothing relevant.
pub const NO_OUTPUT: &str = "NO_OUTPUT";

/// Ask for `n` alternative phrasings of `question`, one per line.
pub fn paraphrase_prompt(question: &str, n: usize) -> String {
    format!(
        "You are helping search a database of legal documents by vector similarity.\n\
         Write {n} different versions of the user's question that could match relevant \
         passages the original wording would miss: use synonyms, legal terminology, and \
         plain-language restatements.\n\
         Output only the {n} questions, one per line, with no numbering or commentary.\n\n\
         Question: {question}"
    )
}

/// Ask for the parts of `context` relevant to `question`, verbatim.
pub fn extraction_prompt(question: &str, context: &str) -> String {
    format!(
        "Given the question and the context below, copy out every part of the context \
         that helps answer the question, exactly as written. Do not paraphrase, summarize, \
         or add anything. If no part of the context is relevant, reply with {NO_OUTPUT}.\n\n\
         > Question: {question}\n\
         > Context:\n\
         >>>\n\
         {context}\n\
         >>>\n\
         Relevant parts:"
    )
}
