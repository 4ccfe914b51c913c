use strum_macros::{Display, EnumString};

/// Request verbs understood by the client. `PostForm` and `PostJson` both
/// issue an HTTP POST and differ only in payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    Get,
    PostForm,
    PostJson,
    Put,
    Delete,
}

/// The HTTP method a verb resolves to on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn method(&self) -> HttpMethod {
        match self {
            Verb::Get => HttpMethod::Get,
            Verb::PostForm | Verb::PostJson => HttpMethod::Post,
            Verb::Put => HttpMethod::Put,
            Verb::Delete => HttpMethod::Delete,
        }
    }

    /// Whether a payload given to `call` is actually sent. PUT and DELETE
    /// requests never carry a body.
    pub fn carries_payload(&self) -> bool {
        matches!(self, Verb::PostForm | Verb::PostJson)
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Verb::PostForm)
    }
}
