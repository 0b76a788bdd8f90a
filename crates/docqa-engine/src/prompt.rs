/// The fixed reply for questions the corpus cannot answer.
pub const REFUSAL: &str = "I'm sorry, I cannot find that information in the provided documents.";

/// Grounding prompt: answer only from `context`, otherwise refuse verbatim.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an assistant answering questions about a private set of documents.\n\
         You are given extracted passages from those documents and a question.\n\
         Answer using only the information in the CONTEXT below. Do not use prior knowledge.\n\
         If the context does not contain the answer, reply exactly: \"{REFUSAL}\" \
         Do not try to make up an answer.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         ANSWER:\n"
    )
}
