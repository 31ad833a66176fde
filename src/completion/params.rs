use serde::Serialize;
use serde_json::{Map, Value};

/// Sampling configuration sent with every completion request. Field names
/// follow the server's completion API; the defaults are tuned for short
/// inline completions.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingParams {
    pub n_predict: u32,
    pub temperature: f64,
    pub stop: Vec<String>,
    pub repeat_last_n: u32,
    pub repeat_penalty: f64,
    pub penalize_nl: bool,
    pub top_k: u32,
    pub top_p: f64,
    pub min_p: f64,
    pub tfs_z: f64,
    pub typical_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub mirostat: u32,
    pub mirostat_tau: f64,
    pub mirostat_eta: f64,
    pub n_probs: u32,
    pub cache_prompt: bool,
    pub slot_id: i64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            n_predict: 128,
            temperature: 0.3,
            stop: vec!["\n".to_string()],
            repeat_last_n: 256,
            repeat_penalty: 1.18,
            penalize_nl: false,
            top_k: 20,
            top_p: 0.5,
            min_p: 0.05,
            tfs_z: 1.0,
            typical_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            mirostat: 0,
            mirostat_tau: 5.0,
            mirostat_eta: 0.1,
            n_probs: 0,
            cache_prompt: false,
            slot_id: -1,
        }
    }
}

impl SamplingParams {
    /// Multi-line generation variant: no newline stop sequence and prompt
    /// caching enabled, for longer assistant-style output.
    pub fn multiline() -> Self {
        Self {
            stop: Vec::new(),
            cache_prompt: true,
            ..Self::default()
        }
    }
}

/// Assemble the JSON body for `POST /completion`: serialized sampling
/// params, caller overrides merged on top (opaque to the engine), then
/// the prompt and the stream flag, which overrides can never unset.
pub fn build_completion_body(
    prompt: &str,
    params: &SamplingParams,
    overrides: &Map<String, Value>,
) -> Value {
    let mut body = match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in overrides {
        body.insert(key.clone(), value.clone());
    }
    body.insert("prompt".to_string(), Value::String(prompt.to_string()));
    body.insert("stream".to_string(), Value::Bool(true));
    Value::Object(body)
}
