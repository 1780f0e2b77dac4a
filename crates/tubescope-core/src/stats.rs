use crate::{
    format::format_count,
    types::{ContentType, VideoRecord},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContentTotals {
    pub count: usize,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

impl ContentTotals {
    fn add(&mut self, video: &VideoRecord) {
        self.count += 1;
        self.views += video.views;
        self.likes += video.likes;
        self.comments += video.comments;
    }

    pub fn average_views(&self) -> u64 {
        self.views.checked_div(self.count as u64).unwrap_or(0)
    }

    pub fn average_likes(&self) -> u64 {
        self.likes.checked_div(self.count as u64).unwrap_or(0)
    }

    /// Likes per 100 views, the loyalty signal the report compares.
    pub fn like_rate(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.likes as f64 * 100.0 / self.views as f64
        }
    }
}

/// Shorts vs long-form performance over a set of videos.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContentBreakdown {
    pub shorts: ContentTotals,
    pub long_form: ContentTotals,
}

impl ContentBreakdown {
    pub fn from_videos(videos: &[VideoRecord]) -> Self {
        let mut breakdown = Self::default();
        for video in videos {
            match video.content_type {
                ContentType::Shorts => breakdown.shorts.add(video),
                ContentType::LongForm => breakdown.long_form.add(video),
            }
        }
        breakdown
    }

    pub fn get(&self, content_type: ContentType) -> &ContentTotals {
        match content_type {
            ContentType::Shorts => &self.shorts,
            ContentType::LongForm => &self.long_form,
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        [ContentType::Shorts, ContentType::LongForm]
            .into_iter()
            .map(|kind| {
                let totals = self.get(kind);
                format!(
                    "{}: {} videos, avg {} views, avg {} likes, {:.2} likes per 100 views",
                    kind,
                    totals.count,
                    format_count(totals.average_views()),
                    format_count(totals.average_likes()),
                    totals.like_rate()
                )
            })
            .collect()
    }
}
