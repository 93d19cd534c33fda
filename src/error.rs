use std::fmt;

/// Why a suggestion lookup produced nothing.
#[derive(Debug)]
pub enum SourceError {
    Http(reqwest::Error),
    Status(u16),
    Decode(serde_json::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Http(err) => write!(f, "http error: {err}"),
            SourceError::Status(status) => {
                write!(f, "autocomplete endpoint returned status {status}")
            }
            SourceError::Decode(err) => write!(f, "invalid suggestion payload: {err}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Http(err) => Some(err),
            SourceError::Status(_) => None,
            SourceError::Decode(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(value: reqwest::Error) -> Self {
        SourceError::Http(value)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(value: serde_json::Error) -> Self {
        SourceError::Decode(value)
    }
}

#[derive(Debug)]
pub enum ClientError {
    Url(url::ParseError),
    Source(SourceError),
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Url(err) => write!(f, "invalid url: {err}"),
            ClientError::Source(err) => write!(f, "{err}"),
            ClientError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<url::ParseError> for ClientError {
    fn from(value: url::ParseError) -> Self {
        ClientError::Url(value)
    }
}

impl From<SourceError> for ClientError {
    fn from(value: SourceError) -> Self {
        ClientError::Source(value)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(value: std::io::Error) -> Self {
        ClientError::Io(value)
    }
}
