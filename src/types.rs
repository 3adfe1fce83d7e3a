use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Open,
    Assigned,
    Mentioned,
    ReviewRequests,
    Reviewed,
    RecentlyClosed,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        Self::Open,
        Self::Assigned,
        Self::Mentioned,
        Self::ReviewRequests,
        Self::Reviewed,
        Self::RecentlyClosed,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Assigned => "Assigned",
            Self::Mentioned => "Mentioned",
            Self::ReviewRequests => "Review Requests",
            Self::Reviewed => "Reviewed",
            Self::RecentlyClosed => "Recently Closed",
        }
    }

    /// Search qualifiers selecting this category, relative to the viewer.
    pub fn search_qualifiers(self) -> &'static str {
        match self {
            Self::Open => "is:pr is:open archived:false author:@me",
            Self::Assigned => "is:pr is:open archived:false assignee:@me",
            Self::Mentioned => "is:pr is:open archived:false mentions:@me",
            Self::ReviewRequests => "is:pr is:open archived:false review-requested:@me",
            Self::Reviewed => "is:pr is:open archived:false reviewed-by:@me",
            Self::RecentlyClosed => "is:pr is:closed archived:false author:@me sort:updated-desc",
        }
    }

    pub fn graphql_alias(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Mentioned => "mentioned",
            Self::ReviewRequests => "reviewRequests",
            Self::Reviewed => "reviewed",
            Self::RecentlyClosed => "recentlyClosed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Success,
    Error,
    Failure,
    Pending,
    Expected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestCommit {
    pub check_state: Option<CheckState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub permalink: String,
    pub repository: String,
    // None when the pull request has no commits.
    pub latest_commit: Option<LatestCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    /// Entries may be absent: GitHub has returned null search nodes during
    /// outages, so consumers must go through [`Section::pull_requests`].
    pub entries: Vec<Option<PullRequestSummary>>,
}

impl Section {
    pub fn new(kind: SectionKind, entries: Vec<Option<PullRequestSummary>>) -> Self {
        Self { kind, entries }
    }

    pub fn pull_requests(&self) -> impl Iterator<Item = &PullRequestSummary> + '_ {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.pull_requests().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub r#type: Option<String>,
    pub message: String,
}
