//! Word and Excel output.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, RunFonts, SpecialIndentType, Start, Style, StyleType, Table,
    TableCell, TableRow,
};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tokio::fs;

use crate::{
    error::{Result, TubescopeError},
    format::format_chat_transcript,
    markdown::{DocumentBlock, StructuredTable, parse_document},
    session::AnalysisSession,
    types::{ChatTurn, VideoRecord},
};

/// East Asian font so Korean report text renders in Word.
const EAST_ASIA_FONT: &str = "Malgun Gothic";
const BULLET_NUMBERING_ID: usize = 1;
const SHEET_NAME: &str = "Videos";
const SHEET_COLUMNS: [&str; 7] = [
    "Title",
    "Views",
    "Likes",
    "Comments",
    "Duration",
    "Published",
    "Type",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub report: PathBuf,
    pub data: PathBuf,
    pub chat: Option<PathBuf>,
}

fn run(text: &str) -> Run {
    Run::new()
        .add_text(text)
        .fonts(RunFonts::new().east_asia(EAST_ASIA_FONT))
}

fn heading_style(level: u8, size: usize) -> Style {
    Style::new(format!("Heading{}", level), StyleType::Paragraph)
        .name(format!("Heading {}", level))
        .size(size)
        .bold()
}

fn table_to_docx(table: &StructuredTable) -> Table {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            TableRow::new(
                row.iter()
                    .map(|cell| TableCell::new().add_paragraph(Paragraph::new().add_run(run(cell))))
                    .collect(),
            )
        })
        .collect();
    Table::new(rows)
}

/// Render Markdown report text as a `.docx` document.
pub fn report_to_docx(title: &str, markdown: &str) -> Result<Vec<u8>> {
    let bullet_level = Level::new(
        0,
        Start::new(1),
        NumberFormat::new("bullet"),
        LevelText::new("•"),
        LevelJc::new("left"),
    )
    .indent(Some(720), Some(SpecialIndentType::Hanging(360)), None, None);

    let mut docx = Docx::new()
        .add_style(
            Style::new("Title", StyleType::Paragraph)
                .name("Title")
                .size(48)
                .bold(),
        )
        .add_style(heading_style(1, 36))
        .add_style(heading_style(2, 30))
        .add_style(heading_style(3, 26))
        .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING_ID).add_level(bullet_level))
        .add_numbering(Numbering::new(BULLET_NUMBERING_ID, BULLET_NUMBERING_ID))
        .add_paragraph(Paragraph::new().add_run(run(title)).style("Title"));

    for block in parse_document(markdown) {
        docx = match block {
            DocumentBlock::Heading { level, text } => docx.add_paragraph(
                Paragraph::new()
                    .add_run(run(&text))
                    .style(&format!("Heading{}", level)),
            ),
            DocumentBlock::Bullet(text) => docx.add_paragraph(
                Paragraph::new()
                    .add_run(run(&text))
                    .numbering(NumberingId::new(BULLET_NUMBERING_ID), IndentLevel::new(0)),
            ),
            DocumentBlock::Paragraph(text) => {
                docx.add_paragraph(Paragraph::new().add_run(run(&text)))
            }
            DocumentBlock::Table(table) => docx.add_table(table_to_docx(&table)),
        };
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| TubescopeError::Export {
            path: PathBuf::from(format!("{}.docx", title)),
            reason: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

fn write_video_sheet(workbook: &mut Workbook, videos: &[VideoRecord]) -> std::result::Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in SHEET_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    worksheet.set_column_width(0, 60)?;
    worksheet.set_freeze_panes(1, 0)?;

    for (i, video) in videos.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_string(row, 0, video.title.as_str())?;
        worksheet.write_number(row, 1, video.views as f64)?;
        worksheet.write_number(row, 2, video.likes as f64)?;
        worksheet.write_number(row, 3, video.comments as f64)?;
        worksheet.write_string(row, 4, video.duration.as_str())?;
        worksheet.write_string(row, 5, video.published.format("%Y-%m-%d").to_string())?;
        worksheet.write_string(row, 6, video.content_type.label())?;
    }

    Ok(())
}

/// One sheet, one row per video, same columns as the in-memory table.
pub fn videos_to_xlsx(videos: &[VideoRecord]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let to_export_error = |e: XlsxError| TubescopeError::Export {
        path: PathBuf::from(format!("{}.xlsx", SHEET_NAME)),
        reason: e.to_string(),
    };

    write_video_sheet(&mut workbook, videos).map_err(to_export_error)?;
    workbook.save_to_buffer().map_err(to_export_error)
}

pub fn chat_to_docx(title: &str, history: &[ChatTurn]) -> Result<Vec<u8>> {
    report_to_docx(title, &format_chat_transcript(history))
}

/// Keep letters (any script), digits, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_').to_string();
    if cleaned.is_empty() {
        "channel".to_string()
    } else {
        cleaned
    }
}

pub fn export_file_prefix(channel_title: &str, date: NaiveDate) -> String {
    format!(
        "tubescope_{}_{}",
        sanitize_file_component(channel_title),
        date.format("%Y%m%d")
    )
}

/// Write the session's report, its data sheet and (when there is one) the chat
/// transcript into `out_dir`. `date` stamps the file names.
pub async fn write_exports(
    session: &AnalysisSession,
    out_dir: &Path,
    date: NaiveDate,
) -> Result<ExportPaths> {
    let (Some(channel), Some(report)) = (session.channel(), session.report()) else {
        return Err(TubescopeError::InvalidInput {
            reason: format!("{} has no finished analysis to export", session.handle()),
        });
    };

    fs::create_dir_all(out_dir).await?;
    let prefix = export_file_prefix(&channel.title, date);

    let report_path = out_dir.join(format!("{}_Report.docx", prefix));
    let report_doc = report_to_docx(&format!("{} channel report", channel.title), report)?;
    fs::write(&report_path, report_doc).await?;

    let data_path = out_dir.join(format!("{}_Data.xlsx", prefix));
    fs::write(&data_path, videos_to_xlsx(session.videos())?).await?;

    let chat = session.history();
    let chat_path = if chat.is_empty() {
        None
    } else {
        let path = out_dir.join(format!("{}_Chat.docx", prefix));
        let doc = chat_to_docx(&format!("{} consultation log", channel.title), chat)?;
        fs::write(&path, doc).await?;
        Some(path)
    };

    tracing::info!(
        session = %session.id(),
        report = %report_path.display(),
        data = %data_path.display(),
        "Exports written"
    );

    Ok(ExportPaths {
        report: report_path,
        data: data_path,
        chat: chat_path,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
    use docx_rs::{DocumentChild, TableChild, TableRowChild};

    use super::*;
    use crate::{
        insight::TextGenerator,
        types::{AnalysisSnapshot, ChannelStats, ContentType},
    };

    const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

    fn channel() -> ChannelStats {
        ChannelStats {
            id: "UC1".to_string(),
            title: "Café / Vlog".to_string(),
            thumbnail: None,
            subscribers: 1,
            views: 1,
            video_count: 1,
            uploads_playlist: "UU1".to_string(),
            description: String::new(),
        }
    }

    fn video() -> VideoRecord {
        VideoRecord {
            id: "v1".to_string(),
            title: "First upload".to_string(),
            views: 1200,
            likes: 80,
            comments: 4,
            duration_seconds: 605,
            duration: "10:05".to_string(),
            published: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            content_type: ContentType::LongForm,
        }
    }

    fn finished_session() -> AnalysisSession {
        let snapshot = AnalysisSnapshot {
            channel: channel(),
            videos: vec![video()],
            report: "## Hi".to_string(),
        };
        AnalysisSession::from_snapshot("@cafe", snapshot).unwrap()
    }

    struct Because;

    #[async_trait]
    impl TextGenerator for Because {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("Because.".to_string())
        }
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("Café / Vlog"), "Café___Vlog");
        assert_eq!(sanitize_file_component("한국 채널"), "한국_채널");
        assert_eq!(sanitize_file_component("???"), "channel");
    }

    #[test]
    fn test_export_file_prefix() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();
        assert_eq!(export_file_prefix("My Channel", date), "tubescope_My_Channel_20250709");
    }

    #[test]
    fn docx_carries_headings_bullets_and_tables() {
        let report = "# Report\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\n- point\nclosing words";
        let bytes = report_to_docx("Title", report).unwrap();
        assert!(bytes.starts_with(ZIP_MAGIC));

        let docx = docx_rs::read_docx(&bytes).unwrap();
        let children = &docx.document.children;

        let tables: Vec<_> = children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Table(table) => Some(table),
                _ => None,
            })
            .collect();
        assert_eq!(tables.len(), 1);
        let rows: Vec<usize> = tables[0]
            .rows
            .iter()
            .filter_map(|child| match child {
                TableChild::TableRow(row) => Some(
                    row.cells
                        .iter()
                        .filter(|cell| matches!(cell, TableRowChild::TableCell(_)))
                        .count(),
                ),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .collect();
        assert_eq!(rows, vec![2, 2]);

        let paragraphs: Vec<_> = children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(paragraph) => Some(paragraph),
                _ => None,
            })
            .collect();
        assert!(paragraphs.iter().any(|p| {
            p.property
                .style
                .as_ref()
                .is_some_and(|style| style.val == "Heading1")
        }));
        assert!(paragraphs.iter().any(|p| {
            p.property
                .numbering_property
                .as_ref()
                .and_then(|numbering| numbering.id.as_ref())
                .is_some_and(|id| id.id == BULLET_NUMBERING_ID)
        }));
    }

    #[test]
    fn xlsx_has_header_and_numeric_cells() {
        let bytes = videos_to_xlsx(&[video()]).unwrap();
        assert!(bytes.starts_with(ZIP_MAGIC));

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        let header: Vec<String> = (0..SHEET_COLUMNS.len() as u32)
            .map(|col| range.get_value((0, col)).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(header, SHEET_COLUMNS);

        assert_eq!(range.get_value((1, 0)), Some(&Data::String("First upload".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(1200.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(80.0)));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Float(4.0)));
        assert_eq!(range.get_value((1, 6)), Some(&Data::String("Long-form".to_string())));
    }

    #[tokio::test]
    async fn write_exports_skips_empty_chat() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();

        let paths = write_exports(&finished_session(), dir.path(), date)
            .await
            .unwrap();
        assert!(paths.report.exists());
        assert!(paths.data.exists());
        assert_eq!(paths.chat, None);
        assert!(
            paths
                .report
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_20250709_Report.docx")
        );
    }

    #[tokio::test]
    async fn write_exports_includes_chat() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();
        let mut session = finished_session();
        session.ask(&Because, "Why?").await.unwrap();

        let paths = write_exports(&session, dir.path(), date).await.unwrap();
        let chat_path = paths.chat.expect("chat export");
        assert!(chat_path.exists());
    }

    #[tokio::test]
    async fn write_exports_needs_a_finished_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();
        let session = AnalysisSession::new("@cafe").unwrap();

        let err = write_exports(&session, dir.path(), date).await.unwrap_err();
        assert!(matches!(err, TubescopeError::InvalidInput { .. }));
        assert!(!dir.path().join("tubescope_channel_20250709_Report.docx").exists());
    }
}
