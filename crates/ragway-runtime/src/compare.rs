//! Comparison statistics over the successful answers of a fan-out.

use std::collections::HashSet;

use ragway_chat::Provider;
use serde::Serialize;

use crate::types::ProviderResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseLength {
    pub provider: Provider,
    /// Length in characters.
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTime {
    pub provider: Provider,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub response_lengths: Vec<ResponseLength>,
    pub response_times: Vec<ResponseTime>,
    /// Whether any two providers returned byte-identical text.
    pub has_duplicates: bool,
    pub unique_responses: usize,
    pub longest: Option<Provider>,
    pub shortest: Option<Provider>,
    /// Lowest latency; ties go to the earliest provider.
    pub fastest: Option<Provider>,
    pub providers_used: Vec<Provider>,
}

/// Compare answers in the order given. Ties for longest and shortest go to
/// the earliest provider.
pub fn compare_responses(responses: &[ProviderResponse]) -> ComparisonResult {
    let response_lengths: Vec<ResponseLength> = responses
        .iter()
        .map(|r| ResponseLength {
            provider: r.provider,
            length: r.response.chars().count(),
        })
        .collect();

    let mut longest: Option<&ResponseLength> = None;
    let mut shortest: Option<&ResponseLength> = None;
    for entry in &response_lengths {
        if longest.map_or(true, |l| entry.length > l.length) {
            longest = Some(entry);
        }
        if shortest.map_or(true, |s| entry.length < s.length) {
            shortest = Some(entry);
        }
    }

    let response_times: Vec<ResponseTime> = responses
        .iter()
        .map(|r| ResponseTime {
            provider: r.provider,
            latency_ms: r.latency_ms,
        })
        .collect();
    let fastest = response_times
        .iter()
        .fold(None::<&ResponseTime>, |best, t| match best {
            Some(b) if b.latency_ms <= t.latency_ms => Some(b),
            _ => Some(t),
        })
        .map(|t| t.provider);

    let unique_responses = responses
        .iter()
        .map(|r| r.response.as_str())
        .collect::<HashSet<_>>()
        .len();

    ComparisonResult {
        has_duplicates: unique_responses < responses.len(),
        unique_responses,
        longest: longest.map(|l| l.provider),
        shortest: shortest.map(|s| s.provider),
        fastest,
        providers_used: responses.iter().map(|r| r.provider).collect(),
        response_lengths,
        response_times,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(provider: Provider, text: &str) -> ProviderResponse {
        timed(provider, text, 1.0)
    }

    fn timed(provider: Provider, text: &str, latency_ms: f64) -> ProviderResponse {
        ProviderResponse {
            provider,
            model: "m".into(),
            response: text.into(),
            latency_ms,
            token_count: None,
        }
    }

    #[test]
    fn test_lengths_and_extremes() {
        let result = compare_responses(&[
            answer(Provider::OpenAI, "medium text"),
            answer(Provider::Gemini, "a much longer answer"),
            answer(Provider::DeepSeek, "tiny"),
        ]);

        assert_eq!(result.response_lengths[1].length, 20);
        assert_eq!(result.longest, Some(Provider::Gemini));
        assert_eq!(result.shortest, Some(Provider::DeepSeek));
        assert_eq!(result.unique_responses, 3);
        assert!(!result.has_duplicates);
        assert_eq!(
            result.providers_used,
            vec![Provider::OpenAI, Provider::Gemini, Provider::DeepSeek]
        );
    }

    #[test]
    fn test_ties_go_to_first_provider() {
        let result = compare_responses(&[
            answer(Provider::DeepSeek, "same"),
            answer(Provider::OpenRouter, "same"),
        ]);
        assert_eq!(result.longest, Some(Provider::DeepSeek));
        assert_eq!(result.shortest, Some(Provider::DeepSeek));
        assert!(result.has_duplicates);
        assert_eq!(result.unique_responses, 1);
    }

    #[test]
    fn test_length_counts_characters() {
        let result = compare_responses(&[answer(Provider::OpenAI, "ção")]);
        assert_eq!(result.response_lengths[0].length, 3);
    }

    #[test]
    fn test_response_times_follow_input_order() {
        let result = compare_responses(&[
            timed(Provider::Gemini, "a", 420.5),
            timed(Provider::OpenAI, "b", 95.0),
            timed(Provider::DeepSeek, "c", 95.0),
        ]);

        let times: Vec<(Provider, f64)> = result
            .response_times
            .iter()
            .map(|t| (t.provider, t.latency_ms))
            .collect();
        assert_eq!(
            times,
            vec![
                (Provider::Gemini, 420.5),
                (Provider::OpenAI, 95.0),
                (Provider::DeepSeek, 95.0)
            ]
        );
        assert_eq!(result.fastest, Some(Provider::OpenAI));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["responseTimes"][0]["provider"], "gemini");
        assert_eq!(json["responseTimes"][0]["latencyMs"], 420.5);
    }

    #[test]
    fn test_empty_input() {
        let result = compare_responses(&[]);
        assert_eq!(result.longest, None);
        assert_eq!(result.fastest, None);
        assert!(result.response_times.is_empty());
        assert_eq!(result.unique_responses, 0);
        assert!(!result.has_duplicates);
    }
}
