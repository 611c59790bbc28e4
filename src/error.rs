#[derive(Debug)]
pub enum ClientError {
    /// Collaborator unreachable or the request could not be completed.
    Transport(reqwest::Error),
    /// Collaborator answered with a non-success status.
    Status { code: u16, body: String },
    /// Response body did not have the expected shape.
    Decode(String),
    Unauthorized,
    NotLoggedIn,
}

impl ClientError {
    /// Short operator-facing text for the transient message slot.
    pub fn message(&self) -> String {
        match self {
            ClientError::Transport(_) => "Unable to reach the server".to_string(),
            ClientError::Status { code, body } if body.is_empty() => {
                format!("Server returned {code}")
            }
            ClientError::Status { code, body } => format!("Server returned {code}: {body}"),
            ClientError::Decode(msg) => format!("Unexpected server response: {msg}"),
            ClientError::Unauthorized => "Invalid credentials".to_string(),
            ClientError::NotLoggedIn => "Not logged in".to_string(),
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(err) => write!(f, "Transport Error: {err}"),
            ClientError::Status { code, body } => write!(f, "HTTP {code}: {body}"),
            ClientError::Decode(msg) => write!(f, "Decode Error: {msg}"),
            ClientError::Unauthorized => write!(f, "Unauthorized"),
            ClientError::NotLoggedIn => write!(f, "Not logged in"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
