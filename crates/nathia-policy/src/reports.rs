//! Community post reports
//!
//! Counts user reports per post and hides a post once the count reaches
//! the configured threshold. Reports are not deduplicated per reporter.

use nathia_core::ConfigHandle;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcome {
    pub count: u32,
    pub hidden: bool,
    /// This report is the one that hid the post
    pub newly_hidden: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct PostReports {
    count: u32,
    hidden: bool,
}

pub struct ReportLedger {
    posts: Mutex<HashMap<String, PostReports>>,
    config: ConfigHandle,
}

impl ReportLedger {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Register one report against `post_id`
    pub fn report(&self, post_id: &str) -> ReportOutcome {
        let threshold = self.config.current().report_hide_threshold;
        let mut posts = self.posts.lock();
        let entry = posts.entry(post_id.to_string()).or_default();

        entry.count = entry.count.saturating_add(1);
        let newly_hidden = !entry.hidden && entry.count >= threshold;
        if newly_hidden {
            entry.hidden = true;
            warn!(post_id, reports = entry.count, "Post hidden after reports");
        }

        ReportOutcome {
            count: entry.count,
            hidden: entry.hidden,
            newly_hidden,
        }
    }

    pub fn count(&self, post_id: &str) -> u32 {
        self.posts.lock().get(post_id).map_or(0, |p| p.count)
    }

    pub fn is_hidden(&self, post_id: &str) -> bool {
        self.posts.lock().get(post_id).is_some_and(|p| p.hidden)
    }
}
