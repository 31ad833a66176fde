use serde_json::{Map, json};

use crate::completion::params::{SamplingParams, build_completion_body};

#[test]
fn default_params_match_the_inline_completion_profile() {
    let params = SamplingParams::default();

    assert_eq!(params.n_predict, 128);
    assert_eq!(params.temperature, 0.3);
    assert_eq!(params.stop, vec!["\n".to_string()]);
    assert_eq!(params.repeat_penalty, 1.18);
    assert_eq!(params.slot_id, -1);
    assert!(!params.cache_prompt);
}

#[test]
fn multiline_profile_drops_the_newline_stop() {
    let params = SamplingParams::multiline();

    assert!(params.stop.is_empty());
    assert!(params.cache_prompt);
    assert_eq!(params.n_predict, 128);
}

#[test]
fn body_carries_prompt_params_and_stream_flag() {
    let body = build_completion_body("fn main() {", &SamplingParams::default(), &Map::new());

    assert_eq!(body["prompt"], json!("fn main() {"));
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["n_predict"], json!(128));
    assert_eq!(body["top_k"], json!(20));
    assert_eq!(body["stop"], json!(["\n"]));
}

#[test]
fn overrides_merge_over_defaults() {
    let mut overrides = Map::new();
    overrides.insert("n_predict".to_string(), json!(400));
    overrides.insert("grammar".to_string(), json!("root ::= \"x\""));

    let body = build_completion_body("p", &SamplingParams::default(), &overrides);

    assert_eq!(body["n_predict"], json!(400));
    assert_eq!(body["grammar"], json!("root ::= \"x\""));
    assert_eq!(body["temperature"], json!(0.3));
}

#[test]
fn overrides_cannot_unset_streaming_or_replace_the_prompt() {
    let mut overrides = Map::new();
    overrides.insert("stream".to_string(), json!(false));
    overrides.insert("prompt".to_string(), json!("injected"));

    let body = build_completion_body("real prompt", &SamplingParams::default(), &overrides);

    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["prompt"], json!("real prompt"));
}
