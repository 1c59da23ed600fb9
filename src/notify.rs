use log::{error, info};
use std::sync::{Mutex, PoisonError};

use crate::errors::ClassifiedError;

#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Success(String),
    Error(ClassifiedError),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(message) => message,
            Notice::Error(err) => &err.message,
        }
    }
}

/// Where user-visible notifications go
///
/// Each finished operation sends at most one notice.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => info!("{}", message),
            Notice::Error(err) => error!("[{}] {}", err.category, err.message),
        }
    }
}

/// Keeps every notice in memory
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
