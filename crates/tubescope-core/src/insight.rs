use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::{Result, TubescopeError},
    format::{format_count, format_video_table},
    provider::Provider,
    stats::ContentBreakdown,
    types::{ChannelStats, ChatTurn, Role, VideoRecord},
};

static CONSULTANT_SYSTEM_PROMPT: &str = r#"You are a YouTube growth consultant who keeps up with current platform trends.
You write in Markdown. Be specific, cite the numbers you were given, and do not invent data."#;

/// Anything that turns a prompt into Markdown text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client that walks the provider's model list until one answers.
pub struct ProviderClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
}

impl ProviderClient {
    pub fn new(provider: Provider, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            provider,
            api_key: api_key.into(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete_with_model(&self, model: &str, prompt: &str) -> Result<String> {
        let config = self.provider.config();

        let response = self
            .http
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": model,
                "messages": [
                    {
                        "role": "system",
                        "content": CONSULTANT_SYSTEM_PROMPT,
                    },
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": 0.7,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if matches!(status.as_u16(), 401 | 403) {
                return Err(TubescopeError::InvalidCredentials {
                    service: self.provider.name().to_string(),
                    reason: body,
                });
            }
            return Err(TubescopeError::Api {
                endpoint: format!("{} ({})", self.provider.name(), model),
                status: status.as_u16(),
                body,
            });
        }

        let response = response.json::<serde_json::Value>().await?;
        extract_message_content(&response)
    }
}

#[async_trait]
impl TextGenerator for ProviderClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        complete_with_fallback(self.provider.name(), self.provider.config().models, |model| {
            self.complete_with_model(model, prompt)
        })
        .await
    }
}

/// Try `models` in order with `call` until one succeeds. Rejected credentials
/// stop the walk at once; otherwise the last failure is reported.
pub async fn complete_with_fallback<F, Fut>(
    provider_name: &str,
    models: &[&'static str],
    mut call: F,
) -> Result<String>
where
    F: FnMut(&'static str) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut last_error = None;

    for &model in models {
        match call(model).await {
            Ok(text) => {
                tracing::info!(provider = provider_name, model, "Completion received");
                return Ok(text);
            }
            Err(e @ TubescopeError::InvalidCredentials { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(model, error = %e, "Model failed, trying next");
                last_error = Some(e);
            }
        }
    }

    Err(TubescopeError::ReportFailed {
        reason: match last_error {
            Some(e) => format!("all {} models failed, last error: {}", provider_name, e),
            None => format!("no models configured for {}", provider_name),
        },
    })
}

/// Pull `choices[0].message.content` out of a chat-completions response.
pub fn extract_message_content(response: &serde_json::Value) -> Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TubescopeError::ReportFailed {
            reason: format!("Invalid API response: {:?}", response),
        })
}

/// Prompt asking for the full channel report.
pub fn build_insight_prompt(
    channel: &ChannelStats,
    videos: &[VideoRecord],
    report_lang: &str,
    today: NaiveDate,
) -> String {
    let breakdown = ContentBreakdown::from_videos(videos).summary_lines().join("\n");

    format!(
        r#"Reference date: {today}

IMPORTANT: Write the whole report in {lang} language.

[Policy guide]
- Shorts can be up to 3 minutes long. Do not assume a 60 second limit.

[Channel]
- Name: {title}
- Subscribers: {subs}
- Total views: {views}
- Public videos: {video_count}

[Shorts vs long-form]
{breakdown}

[Recent videos]
{table}
Based on this data, write a Markdown report with these sections:
1. Fact check (views and audience loyalty). You MUST use a Markdown table to compare the data.
2. Honest critique (why growth has stalled)
3. Three solutions (concrete, actionable steps)"#,
        today = today.format("%Y-%m-%d"),
        lang = report_lang,
        title = channel.title,
        subs = format_count(channel.subscribers),
        views = format_count(channel.views),
        video_count = format_count(channel.video_count),
        breakdown = breakdown,
        table = format_video_table(videos),
    )
}

/// Prompt for a follow-up question about an existing report.
pub fn build_chat_prompt(report: &str, history: &[ChatTurn], question: &str) -> String {
    let mut prompt = format!("[Report]\n{}\n", report);

    if !history.is_empty() {
        prompt.push_str("\n[Conversation so far]\n");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Consultant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
        }
    }

    prompt.push_str(&format!("\n[Question]\n{}\nPlease answer.", question));
    prompt
}

pub async fn generate_report(
    generator: &dyn TextGenerator,
    channel: &ChannelStats,
    videos: &[VideoRecord],
    report_lang: &str,
    today: NaiveDate,
) -> Result<String> {
    let prompt = build_insight_prompt(channel, videos, report_lang, today);
    generator.complete(&prompt).await
}

pub async fn answer_question(
    generator: &dyn TextGenerator,
    report: &str,
    history: &[ChatTurn],
    question: &str,
) -> Result<String> {
    let prompt = build_chat_prompt(report, history, question);
    generator.complete(&prompt).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::ContentType;

    fn channel() -> ChannelStats {
        ChannelStats {
            id: "UC1".to_string(),
            title: "Cooking With Kim".to_string(),
            thumbnail: None,
            subscribers: 12500,
            views: 3_400_000,
            video_count: 210,
            uploads_playlist: "UU1".to_string(),
            description: String::new(),
        }
    }

    fn videos() -> Vec<VideoRecord> {
        vec![VideoRecord {
            id: "v1".to_string(),
            title: "Kimchi in 60 seconds".to_string(),
            views: 42000,
            likes: 3100,
            comments: 87,
            duration_seconds: 58,
            duration: "0:58".to_string(),
            published: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            content_type: ContentType::Shorts,
        }]
    }

    #[test]
    fn insight_prompt_carries_data() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let prompt = build_insight_prompt(&channel(), &videos(), "en", today);
        assert!(prompt.contains("Reference date: 2025-04-01"));
        assert!(prompt.contains("Cooking With Kim"));
        assert!(prompt.contains("Subscribers: 12,500"));
        assert!(prompt.contains("Shorts | Kimchi in 60 seconds | 42000 | 3100 | 87 | 0:58 | 2025-03-14"));
        assert!(prompt.contains("Shorts: 1 videos"));
        assert!(prompt.contains("up to 3 minutes"));
        assert!(prompt.contains("in en language"));
    }

    #[test]
    fn chat_prompt_includes_history() {
        let history = vec![ChatTurn::user("First?"), ChatTurn::assistant("Yes.")];
        let prompt = build_chat_prompt("# Report", &history, "Second?");
        assert!(prompt.starts_with("[Report]\n# Report\n"));
        assert!(prompt.contains("User: First?\nConsultant: Yes.\n"));
        assert!(prompt.ends_with("[Question]\nSecond?\nPlease answer."));
    }

    #[test]
    fn extracts_chat_completion_content() {
        let response = serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "## Hi"}}]
        });
        assert_eq!(extract_message_content(&response).unwrap(), "## Hi");

        let broken = serde_json::json!({"error": {"message": "nope"}});
        assert!(matches!(
            extract_message_content(&broken),
            Err(TubescopeError::ReportFailed { .. })
        ));
    }

    fn api_error(model: &str, status: u16) -> TubescopeError {
        TubescopeError::Api {
            endpoint: format!("Gemini ({})", model),
            status,
            body: "upstream unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn fallback_moves_past_server_error() {
        let tried = Mutex::new(Vec::new());
        let text = complete_with_fallback("Gemini", &["first", "second"], |model| {
            tried.lock().unwrap().push(model);
            let outcome = match model {
                "first" => Err(api_error(model, 503)),
                _ => Ok("## Report".to_string()),
            };
            async move { outcome }
        })
        .await
        .unwrap();

        assert_eq!(text, "## Report");
        assert_eq!(*tried.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn fallback_stops_on_rejected_credentials() {
        let tried = Mutex::new(Vec::new());
        let err = complete_with_fallback("Gemini", &["first", "second"], |model| {
            tried.lock().unwrap().push(model);
            let outcome: Result<String> = Err(TubescopeError::InvalidCredentials {
                service: "Gemini".to_string(),
                reason: "bad key".to_string(),
            });
            async move { outcome }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TubescopeError::InvalidCredentials { .. }));
        assert_eq!(*tried.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn fallback_reports_last_error_when_all_fail() {
        let err = complete_with_fallback("Gemini", &["first", "second"], |model| {
            let outcome: Result<String> = Err(api_error(model, 502));
            async move { outcome }
        })
        .await
        .unwrap_err();

        let TubescopeError::ReportFailed { reason } = &err else {
            panic!("expected ReportFailed, got {:?}", err);
        };
        assert!(reason.contains("all Gemini models failed"));
        assert!(reason.contains("second"), "{reason}");
        assert!(!reason.contains("(first)"), "{reason}");
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn answer_question_routes_through_generator() {
        let answer = answer_question(&Echo, "report", &[], "why?").await.unwrap();
        assert!(answer.contains("why?"));
    }
}
