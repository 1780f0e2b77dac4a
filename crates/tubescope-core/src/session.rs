//! One user's analysis, from the first lookup to the last chat answer.

use chrono::{DateTime, Local, NaiveDate};
use uuid::Uuid;

use crate::{
    error::{Result, TubescopeError},
    insight::{TextGenerator, answer_question, generate_report},
    types::{AnalysisSnapshot, ChannelStats, ChatTurn, VideoRecord},
    youtube::{ChannelSource, normalize_handle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStep {
    ResolvingChannel,
    ListingVideos,
    FetchingStatistics { videos: usize },
    GeneratingReport,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub video_limit: usize,
    pub report_lang: String,
    pub today: NaiveDate,
}

#[derive(Debug)]
pub struct AnalysisSession {
    id: Uuid,
    created_at: DateTime<Local>,
    handle: String,
    channel: Option<ChannelStats>,
    videos: Vec<VideoRecord>,
    report: Option<String>,
    history: Vec<ChatTurn>,
}

impl AnalysisSession {
    pub fn new(handle: &str) -> Result<Self> {
        let session = Self {
            id: Uuid::new_v4(),
            created_at: Local::now(),
            handle: normalize_handle(handle)?,
            channel: None,
            videos: Vec::new(),
            report: None,
            history: Vec::new(),
        };
        tracing::info!(session = %session.id, handle = %session.handle, "Session started");
        Ok(session)
    }

    /// Resume from a cached snapshot; chat history starts empty.
    pub fn from_snapshot(handle: &str, snapshot: AnalysisSnapshot) -> Result<Self> {
        let mut session = Self::new(handle)?;
        session.channel = Some(snapshot.channel);
        session.videos = snapshot.videos;
        session.report = Some(snapshot.report);
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn channel(&self) -> Option<&ChannelStats> {
        self.channel.as_ref()
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn snapshot(&self) -> Option<AnalysisSnapshot> {
        Some(AnalysisSnapshot {
            channel: self.channel.clone()?,
            videos: self.videos.clone(),
            report: self.report.clone()?,
        })
    }

    /// Ask a follow-up question about the report. The question is only kept
    /// in the history once an answer arrives.
    pub async fn ask(&mut self, generator: &dyn TextGenerator, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TubescopeError::InvalidInput {
                reason: "question is empty".to_string(),
            });
        }
        let report = self.report.as_deref().ok_or_else(|| TubescopeError::InvalidInput {
            reason: "no report to ask about yet".to_string(),
        })?;

        let answer = answer_question(generator, report, &self.history, question).await?;
        self.history.push(ChatTurn::user(question));
        self.history.push(ChatTurn::assistant(answer.clone()));
        Ok(answer)
    }

    pub fn finish(self) {
        let elapsed = Local::now() - self.created_at;
        tracing::info!(
            session = %self.id,
            turns = self.history.len(),
            seconds = elapsed.num_seconds(),
            "Session finished"
        );
    }
}

/// Fetch channel and videos, then generate the report, filling `session`.
pub async fn run_analysis(
    session: &mut AnalysisSession,
    source: &dyn ChannelSource,
    generator: &dyn TextGenerator,
    options: &AnalysisOptions,
    on_step: &mut dyn FnMut(AnalysisStep),
) -> Result<()> {
    on_step(AnalysisStep::ResolvingChannel);
    let channel = source
        .find_channel(&session.handle)
        .await?
        .ok_or_else(|| TubescopeError::ChannelNotFound {
            handle: session.handle.clone(),
        })?;
    tracing::info!(channel = %channel.title, id = %channel.id, "Channel resolved");

    on_step(AnalysisStep::ListingVideos);
    let ids = source
        .recent_video_ids(&channel.uploads_playlist, options.video_limit)
        .await?;

    on_step(AnalysisStep::FetchingStatistics { videos: ids.len() });
    let videos = source.fetch_videos(&ids).await?;
    if videos.is_empty() {
        session.channel = Some(channel);
        return Err(TubescopeError::InvalidInput {
            reason: format!("{} has no public videos to analyze", session.handle),
        });
    }

    on_step(AnalysisStep::GeneratingReport);
    let report = generate_report(
        generator,
        &channel,
        &videos,
        &options.report_lang,
        options.today,
    )
    .await?;

    session.channel = Some(channel);
    session.videos = videos;
    session.report = Some(report);
    session.history.clear();
    Ok(())
}
