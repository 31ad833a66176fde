use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::EngineError;
use crate::prompt::counter::TokenCounter;
use crate::prompt::fitter::{
    fit_around_cursor, fit_prefix, head_chars, tail_chars, tolerance_for,
};

/// Counter approximating a real tokenizer: one token per `divisor`
/// characters. Records how often it was called.
struct CharRatioCounter {
    divisor: usize,
    calls: AtomicUsize,
}

impl CharRatioCounter {
    fn new(divisor: usize) -> Self {
        Self {
            divisor,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl TokenCounter for CharRatioCounter {
    async fn count(&self, text: &str) -> Result<usize, EngineError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(text.chars().count() / self.divisor)
    }
}

/// Tokenizer that misbehaves by reporting zero tokens for everything.
struct ZeroCounter;

impl TokenCounter for ZeroCounter {
    async fn count(&self, _text: &str) -> Result<usize, EngineError> {
        Ok(0)
    }
}

#[tokio::test]
async fn cursor_fit_converges_within_tolerance() {
    let counter = CharRatioCounter::new(4);
    let before = "a".repeat(5_000);
    let after = "b".repeat(5_000);

    let window = fit_around_cursor(&counter, &before, &after, 100).await.unwrap();

    assert!(
        window.token_count.abs_diff(100) <= tolerance_for(100),
        "token count {} not within tolerance of 100",
        window.token_count
    );
    assert!(counter.calls() < 50, "took {} iterations", counter.calls());
}

#[tokio::test]
async fn short_document_returns_full_text() {
    let counter = CharRatioCounter::new(4);

    let window = fit_around_cursor(&counter, "before", "after", 100).await.unwrap();

    assert_eq!(window.before, "before");
    assert_eq!(window.after, "after");
    // One slice covers everything; no growth rounds needed after that.
    assert!(counter.calls() <= 2, "took {} iterations", counter.calls());
}

#[tokio::test]
async fn prefix_fit_converges_within_tolerance() {
    let counter = CharRatioCounter::new(4);
    let text = "x".repeat(10_000);

    let window = fit_prefix(&counter, &text, 100).await.unwrap();

    assert!(
        window.token_count.abs_diff(100) <= tolerance_for(100),
        "token count {} not within tolerance of 100",
        window.token_count
    );
    assert!(counter.calls() < 50);
}

#[tokio::test]
async fn prefix_fit_returns_short_document_whole() {
    let counter = CharRatioCounter::new(4);

    let window = fit_prefix(&counter, "tiny document", 100).await.unwrap();

    assert_eq!(window.text, "tiny document");
    assert!(window.token_count <= 100);
}

#[tokio::test]
async fn zero_token_counter_terminates_and_fails_safe() {
    let text = "y".repeat(1_000);

    // Must terminate despite the counter never reporting progress, and
    // must hand back a window instead of erroring.
    let window = fit_prefix(&ZeroCounter, &text, 100).await.unwrap();
    assert_eq!(window.token_count, 0);
    assert_eq!(window.budget, 100);
}

/// Counter stuck far over budget no matter how small the window gets.
struct StuckCounter {
    calls: AtomicUsize,
}

impl TokenCounter for StuckCounter {
    async fn count(&self, _text: &str) -> Result<usize, EngineError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(200)
    }
}

#[tokio::test]
async fn non_convergent_search_stops_at_the_iteration_cap() {
    let counter = StuckCounter {
        calls: AtomicUsize::new(0),
    };
    let text = "z".repeat(1_000_000);

    let window = fit_prefix(&counter, &text, 100).await.unwrap();

    assert_eq!(
        counter.calls.load(Ordering::Relaxed),
        crate::constants::MAX_FIT_ITERATIONS as usize
    );
    // Best-so-far window, not an error.
    assert_eq!(window.token_count, 200);
}

#[tokio::test]
async fn windows_respect_char_boundaries() {
    let counter = CharRatioCounter::new(4);
    let before = "héllo wörld ".repeat(400);
    let after = "日本語のテキスト".repeat(200);

    // Would panic on a byte-boundary slice inside a multibyte char.
    let window = fit_around_cursor(&counter, &before, &after, 150).await.unwrap();
    assert!(!window.before.is_empty());
    assert!(!window.after.is_empty());
}

#[test]
fn tolerance_scales_with_budget_with_a_floor() {
    assert_eq!(tolerance_for(10), 10);
    assert_eq!(tolerance_for(100), 10);
    assert_eq!(tolerance_for(1000), 100);
    assert_eq!(tolerance_for(4000), 400);
}

#[test]
fn char_slicing_helpers() {
    assert_eq!(head_chars("hello", 2), "he");
    assert_eq!(head_chars("hello", 99), "hello");
    assert_eq!(tail_chars("hello", 2), "lo");
    assert_eq!(tail_chars("hello", 99), "hello");
    assert_eq!(tail_chars("hello", 0), "");
    assert_eq!(head_chars("héllo", 2), "hé");
    assert_eq!(tail_chars("日本語", 2), "本語");
}
