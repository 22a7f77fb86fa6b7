//! Detail view version browser and artifact downloads.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::Session;
use crate::index::{JobRequest, PackageRecord};
use crate::state::types::{NoticeLevel, SessionState, VersionRow};

impl Session {
    /// What: Rows of the detail view's version list.
    ///
    /// Output:
    /// - One `Section` per platform subdir followed by its entries, newest
    ///   first; entries of collapsed sections are left out. Empty outside `Detail`.
    #[must_use]
    pub fn version_rows(&self) -> Vec<VersionRow> {
        let SessionState::Detail(record) = &self.state else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for (subdir, records) in self.versions_by_subdir(record) {
            let collapsed = self.collapsed.contains(&subdir);
            rows.push(VersionRow::Section {
                subdir,
                count: records.len(),
                collapsed,
            });
            if !collapsed {
                rows.extend(records.into_iter().map(VersionRow::Entry));
            }
        }
        rows
    }

    /// Highlighted version row, clamped to the list.
    #[must_use]
    pub fn version_cursor(&self) -> usize {
        self.version_cursor
            .min(self.version_rows().len().saturating_sub(1))
    }

    /// Move the version highlight by `delta` rows.
    pub fn move_version_cursor(&mut self, delta: isize) {
        let max = self.version_rows().len().saturating_sub(1);
        let current = self.version_cursor.min(max);
        self.version_cursor = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta.unsigned_abs()).min(max)
        };
    }

    /// What: Act on the highlighted version row.
    ///
    /// Details:
    /// - A section header folds or unfolds its platform.
    /// - An entry becomes the inspected record.
    pub fn activate_version_row(&mut self) {
        let rows = self.version_rows();
        let Some(row) = rows.get(self.version_cursor()) else {
            return;
        };
        match row {
            VersionRow::Section { subdir, .. } => {
                if !self.collapsed.remove(subdir) {
                    self.collapsed.insert(subdir.clone());
                }
            }
            VersionRow::Entry(record) => {
                self.transition(SessionState::Detail(Arc::clone(record)));
            }
        }
    }

    /// Put the version highlight on `record`'s row.
    pub(super) fn focus_version(&mut self, record: &PackageRecord) {
        self.version_cursor = self
            .version_rows()
            .iter()
            .position(|row| matches!(row, VersionRow::Entry(r) if **r == *record))
            .unwrap_or(0);
    }

    /// File name of the artifact being downloaded.
    #[must_use]
    pub fn download_in_progress(&self) -> Option<&str> {
        self.download.as_deref()
    }

    /// What: Download the highlighted artifact into the download directory.
    ///
    /// Output:
    /// - `true` when a download started.
    ///
    /// Details:
    /// - In the detail view the highlighted version row is downloaded, otherwise
    ///   the highlighted result.
    /// - One download runs at a time.
    pub fn request_download(&mut self) -> bool {
        let target = if matches!(self.state, SessionState::Detail(_)) {
            match self.version_rows().get(self.version_cursor()) {
                Some(VersionRow::Entry(record)) => Some(Arc::clone(record)),
                Some(VersionRow::Section { .. }) => {
                    self.set_notice("select a specific version entry to download", NoticeLevel::Warning);
                    return false;
                }
                None => None,
            }
        } else if self.state.is_browsable() {
            self.selected_record().cloned()
        } else {
            None
        };
        let Some(record) = target else {
            return false;
        };
        if self.download.is_some() {
            self.set_notice("a download is already in progress", NoticeLevel::Warning);
            return false;
        }
        let file_name = record.file_name.clone();
        let destination = self.download_dir.join(&file_name);
        info!(file = %file_name, destination = %destination.display(), "download requested");
        if self
            .job_tx
            .send(JobRequest::Download {
                record,
                destination,
            })
            .is_err()
        {
            warn!("job worker is gone, download not started");
            self.set_notice("downloads are unavailable", NoticeLevel::Warning);
            return false;
        }
        self.set_notice(format!("downloading {file_name}..."), NoticeLevel::Info);
        self.download = Some(file_name);
        true
    }

    /// Clear the download indicator and report the outcome.
    pub(super) fn download_finished(&mut self, file_name: &str, result: Result<PathBuf, String>) {
        if self.download.as_deref() == Some(file_name) {
            self.download = None;
        }
        match result {
            Ok(path) => {
                info!(file = %file_name, path = %path.display(), "download finished");
                self.set_notice(
                    format!("downloaded {file_name} to {}", path.display()),
                    NoticeLevel::Info,
                );
            }
            Err(e) => self.set_notice(
                format!("download failed for {file_name}: {e}"),
                NoticeLevel::Warning,
            ),
        }
    }
}
