//! JSON payload returned by the `/pf` route.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Outcome code reported in the `state` field.
///
/// The numeric values are part of the public JSON contract. Codes 1 to 3 are
/// reserved for preloading clients and are never produced by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum State {
    /// The `res` parameter was missing or empty.
    Err,
    WaitPreloader,
    Preloading,
    PreloadingQueue,
    /// The target was fetched and had a body.
    Ok,
    /// The target was fetched but declared a zero-length body.
    NoContent,
    /// The target could not be fetched.
    HttpFail,
}

impl State {
    /// The integer carried on the wire.
    pub fn code(self) -> i32 {
        match self {
            State::Err => -1,
            State::WaitPreloader => 1,
            State::Preloading => 2,
            State::PreloadingQueue => 3,
            State::Ok => 4,
            State::NoContent => 5,
            State::HttpFail => 6,
        }
    }

    /// Whether the code is one of the reserved preloader states.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            State::WaitPreloader | State::Preloading | State::PreloadingQueue
        )
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<State> for i32 {
    fn from(state: State) -> Self {
        state.code()
    }
}

/// Returned when an integer is outside the state code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown state code {0}")]
pub struct InvalidState(pub i32);

impl TryFrom<i32> for State {
    type Error = InvalidState;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(State::Err),
            1 => Ok(State::WaitPreloader),
            2 => Ok(State::Preloading),
            3 => Ok(State::PreloadingQueue),
            4 => Ok(State::Ok),
            5 => Ok(State::NoContent),
            6 => Ok(State::HttpFail),
            other => Err(InvalidState(other)),
        }
    }
}

/// Body of every `/pf` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Echo of the requested URL, empty when none was given.
    pub res: String,
    /// Outcome of the request.
    pub state: State,
}

impl FetchResponse {
    /// Create a response for the given URL and state.
    pub fn new(res: impl Into<String>, state: State) -> Self {
        Self {
            res: res.into(),
            state,
        }
    }

    /// The answer to a request without a target URL.
    pub fn missing() -> Self {
        Self::new(String::new(), State::Err)
    }

    /// Serialize as a single JSON line terminated by `\n`.
    pub fn to_json_line(&self) -> Result<Bytes, serde_json::Error> {
        let mut body = serde_json::to_vec(self)?;
        body.push(b'\n');
        Ok(Bytes::from(body))
    }
}
