/// Task definitions for the staged crawl
///
/// A task is one page fetch tagged with the stage that decides what happens to
/// the fetched document. Tasks are created by seeding or by routing, persisted
/// as JSON, and consumed exactly once.
use crate::url::{dedup_key, TitleId};
use crate::UrlResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Stage label of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// First page of a search listing; discovers pagination
    Start,

    /// A listing page; discovers item links
    List,

    /// Parental-guide page of a title; yields the certificate
    DetailAux,

    /// Title page; yields the record
    Detail,
}

impl Stage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::List => "list",
            Self::DetailAux => "detail_aux",
            Self::Detail => "detail",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "list" => Some(Self::List),
            "detail_aux" => Some(Self::DetailAux),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }

    pub fn all_stages() -> Vec<Self> {
        vec![Self::Start, Self::List, Self::DetailAux, Self::Detail]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Queue placement of a new task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Normal,
    Front,
}

impl Priority {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Front => "front",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "front" => Some(Self::Front),
            _ => None,
        }
    }
}

/// Lifecycle of a persisted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting to be dispatched
    Pending,

    /// Handed to the fetch pool
    InFlight,

    /// Routed successfully
    Done,

    /// Fetch or parse failed; a failure record was written
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::InFlight, Self::Done, Self::Failed]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A unit of crawl work
///
/// Each variant carries exactly the data its stage needs. The certificate
/// found on the parental-guide page travels to the title page inside
/// [`Task::Detail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Task {
    Start {
        url: Url,
    },
    List {
        url: Url,
    },
    DetailAux {
        url: Url,
        title_id: TitleId,
    },
    Detail {
        url: Url,
        title_id: TitleId,
        certificate: String,
    },
}

impl Task {
    /// Classifies a configured start URL
    ///
    /// A URL that already names a title is looked up directly (parental guide
    /// first, at the front of the queue); anything else is treated as the
    /// first page of a listing.
    pub fn seed(url: Url) -> UrlResult<(Self, Priority)> {
        if url.path().starts_with("/title/") {
            if let Some(title_id) = TitleId::from_href(url.path()) {
                let guide_url = title_id
                    .parental_guide_url(&url)
                    .map_err(|e| crate::UrlError::Parse(e.to_string()))?;
                return Ok((
                    Self::DetailAux {
                        url: guide_url,
                        title_id,
                    },
                    Priority::Front,
                ));
            }
        }

        Ok((Self::Start { url }, Priority::Normal))
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Start { .. } => Stage::Start,
            Self::List { .. } => Stage::List,
            Self::DetailAux { .. } => Stage::DetailAux,
            Self::Detail { .. } => Stage::Detail,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::Start { url }
            | Self::List { url }
            | Self::DetailAux { url, .. }
            | Self::Detail { url, .. } => url,
        }
    }

    /// Key under which the queue deduplicates this task
    pub fn dedup_key(&self) -> UrlResult<String> {
        dedup_key(self.url(), self.stage())
    }
}
