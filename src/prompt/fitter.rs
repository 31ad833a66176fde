use crate::constants::{FIT_STEP_PADDING_CHARS, MAX_FIT_ITERATIONS, MIN_TOLERANCE_TOKENS};
use crate::error::EngineError;
use crate::prompt::counter::TokenCounter;

/// Cursor-anchored window: text kept before and after the cursor, with
/// the token count actually measured for the pair.
#[derive(Debug, Clone)]
pub struct CursorWindow {
    pub before: String,
    pub after: String,
    pub token_count: usize,
    pub budget: usize,
}

/// Prefix-anchored window over a whole document.
#[derive(Debug, Clone)]
pub struct PrefixWindow {
    pub text: String,
    pub token_count: usize,
    pub budget: usize,
}

/// Acceptable distance from the budget, scaled with the budget itself.
pub fn tolerance_for(budget: usize) -> usize {
    (budget / 10).max(MIN_TOLERANCE_TOKENS)
}

/// Fit a `{before, after}` window around the cursor to the token budget.
///
/// Window lengths are tracked in characters and rescaled each iteration
/// by `budget / measured_tokens`, so large deviations take large steps
/// and near-convergence takes small ones. Terminates when the measured
/// count is within tolerance, when the window already spans both source
/// strings while under budget, or at the iteration cap, in which case the
/// closest window measured so far is returned rather than failing the
/// completion outright.
pub async fn fit_around_cursor<C: TokenCounter>(
    counter: &C,
    before: &str,
    after: &str,
    budget: usize,
) -> Result<CursorWindow, EngineError> {
    let tolerance = tolerance_for(budget);
    let before_total = before.chars().count();
    let after_total = after.chars().count();

    let mut before_len = (budget / 2).max(1);
    let mut after_len = (budget / 2).max(1);
    let mut best: Option<CursorWindow> = None;

    for _ in 0..MAX_FIT_ITERATIONS {
        let before_slice = tail_chars(before, before_len);
        let after_slice = head_chars(after, after_len);
        let token_count = counter
            .count(&format!("{}{}", before_slice, after_slice))
            .await?;

        let window = CursorWindow {
            before: before_slice.to_string(),
            after: after_slice.to_string(),
            token_count,
            budget,
        };

        let covers_all = before_len >= before_total && after_len >= after_total;
        if (covers_all && token_count <= budget) || token_count.abs_diff(budget) <= tolerance {
            return Ok(window);
        }

        if best
            .as_ref()
            .is_none_or(|b| window_distance(token_count, budget) < window_distance(b.token_count, budget))
        {
            best = Some(window);
        }

        (before_len, after_len) = (
            rescale(before_len, token_count, budget),
            rescale(after_len, token_count, budget),
        );
    }

    let best = best.expect("at least one window measured");
    log::warn!(
        "[prompt] window fit did not converge: {} tokens for budget {}, using best window",
        best.token_count,
        best.budget
    );
    Ok(best)
}

/// Fit a leading slice of `text` to the token budget. Used for stuffing
/// auxiliary documents, each against its remaining share of the budget.
pub async fn fit_prefix<C: TokenCounter>(
    counter: &C,
    text: &str,
    budget: usize,
) -> Result<PrefixWindow, EngineError> {
    let tolerance = tolerance_for(budget);
    let total = text.chars().count();

    let mut len = budget.max(1);
    let mut best: Option<PrefixWindow> = None;

    for _ in 0..MAX_FIT_ITERATIONS {
        let slice = head_chars(text, len);
        let token_count = counter.count(slice).await?;

        let window = PrefixWindow {
            text: slice.to_string(),
            token_count,
            budget,
        };

        let covers_all = len >= total;
        if (covers_all && token_count <= budget) || token_count.abs_diff(budget) <= tolerance {
            return Ok(window);
        }

        if best
            .as_ref()
            .is_none_or(|b| window_distance(token_count, budget) < window_distance(b.token_count, budget))
        {
            best = Some(window);
        }

        len = rescale(len, token_count, budget);
    }

    let best = best.expect("at least one window measured");
    log::warn!(
        "[prompt] prefix fit did not converge: {} tokens for budget {}, using best window",
        best.token_count,
        best.budget
    );
    Ok(best)
}

/// Proportional-control step. A zero token count for a non-empty window
/// carries no ratio information, so the window just doubles; the
/// iteration cap bounds the search either way.
fn rescale(len: usize, token_count: usize, budget: usize) -> usize {
    if token_count == 0 {
        return len * 2 + FIT_STEP_PADDING_CHARS;
    }
    let ratio = budget as f64 / token_count as f64;
    (len as f64 * ratio).round() as usize + FIT_STEP_PADDING_CHARS
}

/// Distance metric for best-so-far tracking: overshoot is penalized
/// double, since an over-budget prompt risks truncation server-side.
fn window_distance(token_count: usize, budget: usize) -> usize {
    if token_count > budget {
        (token_count - budget) * 2
    } else {
        budget - token_count
    }
}

/// First `n` characters, sliced on a char boundary.
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `n` characters, sliced on a char boundary.
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let total = text.chars().count();
    if n >= total {
        return text;
    }
    match text.char_indices().nth(total - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
