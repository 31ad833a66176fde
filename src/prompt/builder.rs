use crate::constants::{
    AUX_DOCUMENT_BUDGET_FLOOR, FIM_BEGIN, FIM_END, FIM_HOLE, MAX_PROMPT_TOKEN_HARD_LIMIT,
};
use crate::error::EngineError;
use crate::logging::log_component;
use crate::prompt::counter::TokenCounter;
use crate::prompt::fitter::{fit_around_cursor, fit_prefix};

/// An auxiliary open document offered as extra prompt context.
#[derive(Debug, Clone)]
pub struct ContextDocument {
    /// Workspace-relative path, shown to the model as a header line.
    pub name: String,
    pub text: String,
}

/// Source text must not smuggle in its own fill markers; the model would
/// treat them as structure.
pub fn normalize_source(text: &str) -> String {
    text.replace(FIM_BEGIN, "")
        .replace(FIM_HOLE, "")
        .replace(FIM_END, "")
}

/// Build a fill-in-middle prompt around the cursor, stuffing auxiliary
/// documents into whatever budget the active document leaves over.
///
/// Documents are fitted in priority order, each against the remaining
/// budget; once that drops below a floor the rest are skipped. The active
/// document gets a file-name header only when auxiliary context is
/// present, matching how the models were prompted during tuning.
pub async fn build_fim_prompt<C: TokenCounter>(
    counter: &C,
    active_name: &str,
    text_before: &str,
    text_after: &str,
    context_documents: &[ContextDocument],
    max_tokens: usize,
) -> Result<String, EngineError> {
    let budget = max_tokens.min(MAX_PROMPT_TOKEN_HARD_LIMIT);

    let before = normalize_source(text_before);
    let after = normalize_source(text_after);
    let window = fit_around_cursor(counter, &before, &after, budget).await?;

    let mut context_text = String::new();
    let mut rest_tokens = budget.saturating_sub(window.token_count);

    if !context_documents.is_empty() && rest_tokens > AUX_DOCUMENT_BUDGET_FLOOR {
        for document in context_documents {
            if rest_tokens <= AUX_DOCUMENT_BUDGET_FLOOR {
                break;
            }
            let prefix = fit_prefix(counter, &normalize_source(&document.text), rest_tokens).await?;
            context_text.push('\n');
            context_text.push_str(&document.name);
            context_text.push('\n');
            context_text.push_str(&prefix.text);
            rest_tokens = rest_tokens.saturating_sub(prefix.token_count);
        }
    }

    let active_header = if context_text.is_empty() {
        String::new()
    } else {
        format!("\n{}\n", active_name)
    };

    log_component(
        "prompt",
        &format!(
            "fitted {} tokens of budget {} (context docs: {})",
            window.token_count,
            budget,
            context_documents.len()
        ),
    );

    Ok(format!(
        "{}{}{}{}{}{}{}",
        FIM_BEGIN, context_text, active_header, window.before, FIM_HOLE, window.after, FIM_END
    ))
}
