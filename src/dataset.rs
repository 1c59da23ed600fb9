//! Dataset lifecycle: history, detail loading, upload and report export
//!
//! The controller owns the dashboard state, the history list and the
//! "current dataset". Both are replaced wholesale and never patched, so
//! readers always see either nothing or a complete [`DatasetDetail`].
//!
//! The state belongs to one login. Once the session is cleared or replaced
//! the controller reads as empty, and the next write starts from scratch.
//!
//! Responses are applied only if the view that asked for them is still
//! active and the session has not changed since. [`DatasetController::detach`]
//! marks the view as left; anything arriving after that is dropped without
//! touching state or notifying.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::api::EquipmentApi;
use crate::errors::{
    ClassifiedError, ErrorCategory, classify_detail, classify_report, classify_upload,
};
use crate::models::{Credential, Dataset, DatasetDetail, DatasetId};
use crate::normalizer::{UploadCandidate, normalize};
use crate::notify::{Notice, Notifier};
use crate::session::{Redirect, Session};

#[derive(Default)]
struct DashboardState {
    /// Session generation this state was built under
    generation: u64,
    history: Vec<Dataset>,
    current: Option<Arc<DatasetDetail>>,
}

/// Snapshot of what a response must still match to be applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ViewToken {
    view: u64,
    session: u64,
}

/// Resets the upload flag however the upload ends
struct UploadGuard<'a>(&'a AtomicBool);

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DatasetController {
    api: Arc<dyn EquipmentApi>,
    session: Session,
    notifier: Arc<dyn Notifier>,
    state: RwLock<DashboardState>,
    uploading: AtomicBool,
    /// Bumped whenever the view is left
    view: AtomicU64,
}

impl DatasetController {
    pub fn new(api: Arc<dyn EquipmentApi>, session: Session, notifier: Arc<dyn Notifier>) -> Self {
        DatasetController {
            api,
            session,
            notifier,
            state: RwLock::new(DashboardState::default()),
            uploading: AtomicBool::new(false),
            view: AtomicU64::new(0),
        }
    }

    /// Enter the dashboard
    ///
    /// Redirects before any request when there is no credential, otherwise
    /// refreshes the history.
    pub async fn enter(&self) -> Result<Vec<Dataset>, Redirect> {
        self.session.require()?;
        Ok(self.fetch_history().await)
    }

    /// Leave the dashboard; in-flight responses will be ignored
    pub fn detach(&self) {
        self.view.fetch_add(1, Ordering::SeqCst);
    }

    pub fn history(&self) -> Vec<Dataset> {
        self.read_state(|state| state.history.clone())
    }

    pub fn current(&self) -> Option<Arc<DatasetDetail>> {
        self.read_state(|state| state.current.clone())
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    fn read_state<T>(&self, f: impl FnOnce(&DashboardState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.session.generation() {
            f(&state)
        } else {
            f(&DashboardState::default())
        }
    }

    fn write_state(&self, f: impl FnOnce(&mut DashboardState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let generation = self.session.generation();
        if state.generation != generation {
            debug!("session changed, discarding dashboard state");
            *state = DashboardState {
                generation,
                ..DashboardState::default()
            };
        }
        f(&mut state)
    }

    fn view_token(&self) -> ViewToken {
        ViewToken {
            view: self.view.load(Ordering::SeqCst),
            session: self.session.generation(),
        }
    }

    fn still_active(&self, token: ViewToken) -> bool {
        self.view_token() == token
    }

    fn notify(&self, token: ViewToken, notice: Notice) {
        if self.still_active(token) {
            self.notifier.notify(notice);
        }
    }

    fn fail(&self, token: ViewToken, err: ClassifiedError) -> ClassifiedError {
        self.notify(token, Notice::Error(err.clone()));
        err
    }

    /// Credential for a protected call, or the given failure if there is none
    fn credential(&self, category: ErrorCategory) -> Result<Credential, ClassifiedError> {
        self.session.get().ok_or_else(|| {
            error!("protected request attempted without a credential");
            ClassifiedError::new(category, "Please log in to continue")
        })
    }

    /// Refresh the history list
    ///
    /// History is auxiliary: failures are logged, the stored list is kept,
    /// and an empty list is returned.
    pub async fn fetch_history(&self) -> Vec<Dataset> {
        let token = self.view_token();
        let Some(credential) = self.session.get() else {
            warn!("history requested without a credential");
            return Vec::new();
        };

        match self.api.history(&credential).await {
            Ok(datasets) => {
                if self.still_active(token) {
                    debug!("history has {} datasets", datasets.len());
                    let stored = datasets.clone();
                    self.write_state(|state| state.history = stored);
                }
                datasets
            }
            Err(failure) => {
                warn!("could not fetch history: {}", failure);
                Vec::new()
            }
        }
    }

    /// Load one dataset and make it current
    ///
    /// A failure leaves the previous current dataset in place.
    pub async fn load_detail(
        &self,
        id: &DatasetId,
    ) -> Result<Arc<DatasetDetail>, ClassifiedError> {
        let token = self.view_token();
        let credential = self
            .credential(ErrorCategory::DetailLoadFailed)
            .map_err(|e| self.fail(token, e))?;

        let detail = self
            .api
            .dataset(&credential, id)
            .await
            .map_err(|failure| {
                warn!("could not load dataset {}: {}", id, failure);
                self.fail(token, classify_detail(&failure))
            })?;

        let detail = Arc::new(detail);
        if self.still_active(token) {
            let current = Arc::clone(&detail);
            self.write_state(|state| state.current = Some(current));
            info!("dataset {} is now current", id);
        }
        Ok(detail)
    }

    /// Normalize and upload a file, then make the new dataset current
    ///
    /// Only one upload runs at a time; a second call while one is in flight
    /// fails immediately. The history is refreshed afterwards whatever the
    /// outcome of the upload itself.
    pub async fn upload(
        &self,
        candidate: UploadCandidate,
    ) -> Result<Arc<DatasetDetail>, ClassifiedError> {
        let token = self.view_token();
        if self
            .uploading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(self.fail(
                token,
                ClassifiedError::new(
                    ErrorCategory::UploadFailed,
                    "An upload is already in progress",
                ),
            ));
        }
        let _guard = UploadGuard(&self.uploading);

        let filename = candidate.name.clone();
        let file = normalize(candidate)
            .await
            .map_err(|e| self.fail(token, e))?;
        let credential = self
            .credential(ErrorCategory::UploadFailed)
            .map_err(|e| self.fail(token, e))?;

        let outcome = self.api.upload(&credential, &file).await;
        let result = match outcome {
            Ok(response) => {
                let detail = Arc::new(DatasetDetail {
                    id: response.dataset_id,
                    filename,
                    uploaded_at: Utc::now(),
                    summary: response.summary,
                    data: response.data,
                });
                if self.still_active(token) {
                    let current = Arc::clone(&detail);
                    self.write_state(|state| {
                        state.history.insert(0, current.entry());
                        state.current = Some(current);
                    });
                    info!("uploaded {} as dataset {}", detail.filename, detail.id);
                }
                self.notify(
                    token,
                    Notice::Success("File uploaded successfully!".to_string()),
                );
                Ok(detail)
            }
            Err(failure) => {
                warn!("upload of {} failed: {}", file.file_name, failure);
                Err(self.fail(token, classify_upload(&failure)))
            }
        };

        self.fetch_history().await;
        result
    }

    /// Download the PDF report for the current dataset into `dir`
    ///
    /// Returns `None` when there is no current dataset.
    pub async fn download_current_report(
        &self,
        dir: &Path,
    ) -> Option<Result<PathBuf, ClassifiedError>> {
        let current = self.current()?;
        Some(self.download_report(&current, dir).await)
    }

    /// Download the PDF report for `detail` as `report_<filename>.pdf`
    pub async fn download_report(
        &self,
        detail: &DatasetDetail,
        dir: &Path,
    ) -> Result<PathBuf, ClassifiedError> {
        let token = self.view_token();
        let credential = self
            .credential(ErrorCategory::ReportFailed)
            .map_err(|e| self.fail(token, e))?;

        let bytes = self
            .api
            .report(&credential, &detail.id)
            .await
            .map_err(|failure| {
                warn!("report for dataset {} failed: {}", detail.id, failure);
                self.fail(token, classify_report(&failure))
            })?;

        let path = dir.join(report_file_name(&detail.filename));
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            warn!("could not write {}: {}", path.display(), e);
            self.fail(
                token,
                ClassifiedError::new(ErrorCategory::ReportFailed, "Error generating PDF"),
            )
        })?;

        info!("saved report to {}", path.display());
        self.notify(
            token,
            Notice::Success("PDF downloaded successfully!".to_string()),
        );
        Ok(path)
    }
}

/// `report_<filename>.pdf`, using only the last component of the filename
pub fn report_file_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    format!("report_{}.pdf", base)
}
