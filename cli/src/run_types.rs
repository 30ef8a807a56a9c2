use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle states a run passes through before it is finished.
pub const ACTIVE_STATUS_NAMES: [&str; 12] = [
    "queued",
    "allocated",
    "started",
    "building",
    "provstart",
    "generating",
    "up",
    "running",
    "rundone",
    "ending",
    "cancelling",
    "waiting",
];

/// One page of a run search.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub page_size: Option<u64>,
    pub amount_of_runs: Option<u64>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl RunResults {
    /// The cursor for the following page, if the server issued a usable one.
    pub fn next_page_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: Option<String>,
    pub test_structure: Option<TestStructure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestStructure {
    pub run_name: Option<String>,
    pub bundle: Option<String>,
    pub test_name: Option<String>,
    pub test_short_name: Option<String>,
    pub requestor: Option<String>,
    pub status: Option<RunStatus>,
    pub result: Option<String>,
    pub queued: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub methods: Vec<TestMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestMethod {
    pub method_name: Option<String>,
    #[serde(rename = "type")]
    pub method_type: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserData {
    #[serde(rename = "login-id")]
    pub login_id: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub clients: Vec<FrontEndClient>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrontEndClient {
    #[serde(rename = "client-name")]
    pub client_name: Option<String>,
    #[serde(rename = "last-login")]
    pub last_login: Option<String>,
}

/// Entry of the error list the resources endpoint returns on rejection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceError {
    pub error_code: Option<u32>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Allocated,
    Started,
    Building,
    Provstart,
    Generating,
    Up,
    Running,
    Rundone,
    Ending,
    Finished,
    Cancelling,
    Waiting,
    Unknown(String),
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_name(&value))
    }
}

impl Serialize for RunStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl RunStatus {
    pub fn from_name(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "queued" => Self::Queued,
            "allocated" => Self::Allocated,
            "started" => Self::Started,
            "building" => Self::Building,
            "provstart" => Self::Provstart,
            "generating" => Self::Generating,
            "up" => Self::Up,
            "running" => Self::Running,
            "rundone" => Self::Rundone,
            "ending" => Self::Ending,
            "finished" => Self::Finished,
            "cancelling" => Self::Cancelling,
            "waiting" => Self::Waiting,
            _ => Self::Unknown(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Allocated => "allocated",
            Self::Started => "started",
            Self::Building => "building",
            Self::Provstart => "provstart",
            Self::Generating => "generating",
            Self::Up => "up",
            Self::Running => "running",
            Self::Rundone => "rundone",
            Self::Ending => "ending",
            Self::Finished => "finished",
            Self::Cancelling => "cancelling",
            Self::Waiting => "waiting",
            Self::Unknown(v) => v.as_str(),
        }
    }
}
