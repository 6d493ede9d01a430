use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarrierError {
    /// Login failed, or the carrier rejected a freshly refreshed token.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Transport error calling {endpoint}: {source}")]
    TransportError {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The carrier answered but declined the request. `body` is the raw response text.
    #[error("Carrier rejected {endpoint} (HTTP {status}): {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {body}")]
    MalformedResponse { endpoint: &'static str, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl CarrierError {
    pub fn transport(endpoint: &'static str, source: reqwest::Error) -> Self {
        CarrierError::TransportError { endpoint, source }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, CarrierError::AuthenticationError(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CarrierError::TransportError { .. })
    }

    /// Raw carrier text worth showing to an operator, when the carrier said anything.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            CarrierError::Rejected { body, .. } | CarrierError::MalformedResponse { body, .. } => {
                Some(body)
            }
            CarrierError::AuthenticationError(body) => Some(body),
            _ => None,
        }
    }
}
