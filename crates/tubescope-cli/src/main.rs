use std::{
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use tubescope_core::{
    AnalysisOptions, AnalysisSession, AnalysisStep, AnalyzerConfig, ContentBreakdown, Provider,
    ProviderClient, TubescopeError, VideoRecord, YouTubeClient, format_count, get_cache_dir,
    get_snapshot_path, load_snapshot, run_analysis, save_snapshot, write_exports,
    youtube::normalize_handle,
};

fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    #[default]
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "tubescope")]
#[command(
    about = "Analyze a YouTube channel's recent videos, generate an AI report, and export it to Word and Excel"
)]
struct Cli {
    /// Channel handle (e.g. "@veritasium") or channel URL
    handle: String,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    youtube_key: Option<String>,

    /// Report language (e.g., "en", "ko", "uk")
    #[arg(short, long)]
    lang: Option<String>,

    /// AI provider for report generation
    #[arg(short, long, default_value = "gemini")]
    provider: CliProvider,

    /// Number of most recent uploads to analyze
    #[arg(short = 'n', long, default_value_t = 50)]
    limit: usize,

    /// Directory for the .docx and .xlsx exports
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Force re-fetching even if a cached analysis exists
    #[arg(short, long)]
    force: bool,

    /// Skip the follow-up question prompt
    #[arg(long)]
    no_chat: bool,

    /// Do not write export files
    #[arg(long)]
    no_export: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn step_message(step: AnalysisStep, handle: &str, provider: Provider) -> String {
    match step {
        AnalysisStep::ResolvingChannel => format!("Looking up {}...", handle),
        AnalysisStep::ListingVideos => "Listing recent uploads...".to_string(),
        AnalysisStep::FetchingStatistics { videos } => {
            format!("Fetching statistics for {} videos...", videos)
        }
        AnalysisStep::GeneratingReport => format!("Generating report with {}...", provider.name()),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn print_videos(videos: &[VideoRecord]) {
    println!(
        "{}",
        style(format!(
            "{:<10}  {:<9}  {:<48}  {:>8}  {:>11}  {:>9}  {:>8}",
            "Date", "Type", "Title", "Length", "Views", "Likes", "Comments"
        ))
        .bold()
    );
    for video in videos {
        println!(
            "{:<10}  {:<9}  {:<48}  {:>8}  {:>11}  {:>9}  {:>8}",
            video.published.format("%Y-%m-%d"),
            video.content_type.label(),
            truncate(&video.title, 48),
            video.duration,
            format_count(video.views),
            format_count(video.likes),
            format_count(video.comments),
        );
    }
}

fn fail(e: &TubescopeError) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), e);
    std::process::exit(1);
}

async fn chat_loop(session: &mut AnalysisSession, client: &ProviderClient) -> Result<()> {
    println!(
        "\n{} {}",
        style("Ask the consultant").cyan().bold(),
        style("(empty line or \"exit\" to finish)").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        let spinner = create_spinner("Thinking...");
        match session.ask(client, question).await {
            Ok(answer) => {
                spinner.finish_and_clear();
                println!("\n{}\n", answer);
            }
            Err(e) => {
                spinner.finish_and_clear();
                tracing::warn!(error = %e, "Follow-up question failed");
                eprintln!("{} {}", style("Error:").red().bold(), e);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider: Provider = cli.provider.into();

    // Validate API keys early
    let config = match AnalyzerConfig::resolve(cli.youtube_key, provider, cli.lang, cli.limit) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    let handle = match normalize_handle(&cli.handle) {
        Ok(handle) => handle,
        Err(e) => fail(&e),
    };
    let ai = ProviderClient::new(provider, &config.provider_api_key, config.completion_timeout)?;

    println!(
        "\n{}  {}\n",
        style("tubescope").cyan().bold(),
        style("Channel Analyzer").dim()
    );

    let total_start = Instant::now();
    let cache_dir = get_cache_dir(&handle);
    let snapshot_path = get_snapshot_path(
        &cache_dir,
        &provider,
        &config.report_lang,
        config.video_limit,
    );

    let mut session = if !cli.force && snapshot_path.exists() {
        let snapshot = load_snapshot(&snapshot_path).await?;
        println!(
            "{} Report generated ({}) {}",
            style("✓").green().bold(),
            provider.name(),
            style("(cached)").dim()
        );
        AnalysisSession::from_snapshot(&handle, snapshot)?
    } else {
        let mut session = AnalysisSession::new(&handle)?;
        let youtube = YouTubeClient::new(&config.youtube_api_key, config.probe_timeout)?;
        let options = AnalysisOptions {
            video_limit: config.video_limit,
            report_lang: config.report_lang.clone(),
            today: Local::now().date_naive(),
        };

        let spinner = create_spinner(&step_message(AnalysisStep::ResolvingChannel, &handle, provider));
        let outcome = run_analysis(
            &mut session,
            &youtube,
            &ai,
            &options,
            &mut |step: AnalysisStep| spinner.set_message(step_message(step, &handle, provider)),
        )
        .await;

        if let Err(e) = outcome {
            spinner.finish_and_clear();
            if e.is_recoverable() {
                eprintln!("{}", style("The run failed upstream; try again in a moment.").yellow());
            }
            fail(&e);
        }

        spinner.finish_with_message(format!(
            "{} Analyzed {} videos ({}) {}",
            style("✓").green().bold(),
            session.videos().len(),
            provider.name(),
            style(format!("[{}]", format_elapsed(total_start.elapsed()))).dim()
        ));

        if let Some(snapshot) = session.snapshot() {
            save_snapshot(&snapshot, &snapshot_path).await?;
        }
        session
    };

    let Some(channel) = session.channel().cloned() else {
        anyhow::bail!("analysis finished without channel data");
    };
    let report = session.report().unwrap_or_default().to_string();

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}  {}",
        style(&channel.title).bold(),
        style(format!(
            "{} subscribers · {} views · {} videos",
            format_count(channel.subscribers),
            format_count(channel.views),
            format_count(channel.video_count)
        ))
        .dim()
    );
    if let Some(thumbnail) = &channel.thumbnail {
        println!("{}", style(thumbnail).dim());
    }
    println!();

    for line in ContentBreakdown::from_videos(session.videos()).summary_lines() {
        println!("  {}", line);
    }
    println!();
    print_videos(session.videos());

    println!("{}", style("─".repeat(60)).dim());
    println!("{}", report);
    println!("{}", style("─".repeat(60)).dim());

    if !cli.no_chat {
        chat_loop(&mut session, &ai).await?;
    }

    if !cli.no_export {
        let spinner = create_spinner("Writing exports...");
        let paths = write_exports(&session, &cli.out_dir, Local::now().date_naive()).await?;
        spinner.finish_with_message(format!("{} Exports written", style("✓").green().bold()));

        println!("\n{} {}", style("Report:").dim(), style(paths.report.display()).cyan());
        println!("{} {}", style("Data:").dim(), style(paths.data.display()).cyan());
        if let Some(chat) = &paths.chat {
            println!("{} {}", style("Chat:").dim(), style(chat.display()).cyan());
        }
    }

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_elapsed(total_start.elapsed())).cyan().bold()
    );

    session.finish();
    Ok(())
}
