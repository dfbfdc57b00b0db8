//! Assertion helpers for status files and the disable marker

use std::path::Path;
use vmext_core::SequenceNumber;
use vmext_handler::status::StatusItem;
use vmext_handler::{StatusReport, StatusType};

/// Read `<seq>.status` and assert it holds exactly one entry
pub fn read_status(status_folder: &Path, seq: u64) -> StatusItem {
    let report = StatusReport::load(status_folder, SequenceNumber::new(seq))
        .unwrap_or_else(|e| panic!("status file for {} unreadable: {}", seq, e));
    assert_eq!(report.items().len(), 1, "status must have exactly one entry");
    report.items()[0].clone()
}

/// Assert the status file for `seq` has the given type, operation and message
pub fn assert_status(
    status_folder: &Path,
    seq: u64,
    status: StatusType,
    operation: &str,
    message: &str,
) {
    let item = read_status(status_folder, seq);
    assert_eq!(item.status.status, status);
    assert_eq!(item.status.operation, operation);
    assert_eq!(item.status.formatted_message.message, message);
}

pub fn assert_no_status(status_folder: &Path, seq: u64) {
    let path = StatusReport::path(status_folder, SequenceNumber::new(seq));
    assert!(!path.exists(), "unexpected status file {}", path.display());
}

/// Assert the status folder holds nothing at all
pub fn assert_status_folder_empty(status_folder: &Path) {
    let count = std::fs::read_dir(status_folder).unwrap().count();
    assert_eq!(count, 0, "status folder should be empty");
}
