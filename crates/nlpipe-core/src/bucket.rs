//! Task states and their on-disk bucket names.

use std::fmt;

/// The four on-disk directories a task can live in.
///
/// Grounded on `original_source/nlpipe/clients/utils.py`'s `STATUS` map
/// (`PENDING -> queue`, `STARTED -> inprogress`, `DONE -> results`,
/// `ERROR -> errors`); kept as a closed enum rather than a string so the
/// store's directory walk can't typo a bucket name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Queue,
    InProgress,
    Results,
    Errors,
}

impl Bucket {
    /// All buckets, in the priority order `Status` probes them.
    pub const ALL: [Bucket; 4] = [
        Bucket::Queue,
        Bucket::InProgress,
        Bucket::Results,
        Bucket::Errors,
    ];

    /// Directory name under `<root>/<module>/`.
    pub const fn dirname(self) -> &'static str {
        match self {
            Bucket::Queue => "queue",
            Bucket::InProgress => "inprogress",
            Bucket::Results => "results",
            Bucket::Errors => "errors",
        }
    }

    /// The externally-visible task status a task in this bucket reports.
    pub const fn status(self) -> TaskStatus {
        match self {
            Bucket::Queue => TaskStatus::Pending,
            Bucket::InProgress => TaskStatus::Started,
            Bucket::Results => TaskStatus::Done,
            Bucket::Errors => TaskStatus::Error,
        }
    }
}

/// The task lifecycle states exposed to clients.
///
/// `Unknown` has no corresponding bucket — it means "absent from all
/// four buckets".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "STARTED")]
    Started,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "ERROR")]
    Error,
}

impl TaskStatus {
    /// The bucket a task with this status lives in, or `None` for
    /// `Unknown` (absent from every bucket).
    pub const fn bucket(self) -> Option<Bucket> {
        match self {
            TaskStatus::Unknown => None,
            TaskStatus::Pending => Some(Bucket::Queue),
            TaskStatus::Started => Some(Bucket::InProgress),
            TaskStatus::Done => Some(Bucket::Results),
            TaskStatus::Error => Some(Bucket::Errors),
        }
    }

    /// The HTTP status code the REST facade maps this to (spec §4.4).
    pub const fn http_status(self) -> u16 {
        match self {
            TaskStatus::Unknown => 404,
            TaskStatus::Pending | TaskStatus::Started => 202,
            TaskStatus::Done => 200,
            TaskStatus::Error => 500,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Unknown => "UNKNOWN",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Done => "DONE",
            TaskStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
