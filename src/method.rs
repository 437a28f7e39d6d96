use std::{convert::TryFrom, fmt::Display};

const GET: &str = "GET";
const PUT: &str = "PUT";
const POST: &str = "POST";
const PATCH: &str = "PATCH";
const DELETE: &str = "DELETE";
const HEAD: &str = "HEAD";
const OPTIONS: &str = "OPTIONS";
const TRACE: &str = "TRACE";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
/// This enum represents the request methods the compiler understands,
/// and supports conversions from and to strings.
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl Method {
    /// Returns a static str reference naming the current method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => GET,
            Method::Put => PUT,
            Method::Post => POST,
            Method::Patch => PATCH,
            Method::Delete => DELETE,
            Method::Head => HEAD,
            Method::Options => OPTIONS,
            Method::Trace => TRACE,
        }
    }

    /// Methods in the order operations of a path item are compiled.
    pub const DOCUMENT_ORDER: [Method; 8] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
        Method::Trace,
    ];

    /// Whether responses of this method may supply values to other requests.
    /// DELETE and the read-only metadata methods never produce.
    pub fn is_producer(&self) -> bool {
        matches!(
            self,
            Method::Post | Method::Put | Method::Patch | Method::Get
        )
    }

    /// Rank used when several producers are equally good candidates:
    /// creating methods are preferred over reading ones.
    pub fn producer_preference(&self) -> u8 {
        match self {
            Method::Post => 0,
            Method::Put => 1,
            Method::Patch => 2,
            Method::Get => 3,
            Method::Delete | Method::Head | Method::Options | Method::Trace => 4,
        }
    }

    /// Whether a producer with this method may feed a consumer with method
    /// `consumer` on the *same* endpoint. A response to POST can seed any
    /// other operation, while a GET response must not seed the mutating
    /// operations that would have created the value in the first place.
    pub fn may_feed_same_endpoint(&self, consumer: Method) -> bool {
        match self {
            Method::Post => true,
            Method::Put => consumer != Method::Post,
            Method::Patch => !matches!(consumer, Method::Post | Method::Put),
            Method::Get => !matches!(consumer, Method::Post | Method::Put | Method::Patch),
            _ => false,
        }
    }
}

impl std::cmp::PartialEq<&str> for Method {
    /// Compares the current method to the one given in a string reference.
    /// The comparison is case insensitive, but superfluous whitespace will
    /// always result in `false`.
    fn eq(&self, other: &&str) -> bool {
        Self::try_from(*other).map(|m| *self == m).unwrap_or(false)
    }
}

impl std::cmp::PartialEq<Method> for &str {
    fn eq(&self, other: &Method) -> bool {
        other == self
    }
}

impl Ord for Method {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn method_index(method: Method) -> u8 {
            match method {
                Method::Post => 0,
                Method::Put => 1,
                Method::Patch => 2,
                Method::Get => 3,
                Method::Delete => 4,
                Method::Head => 5,
                Method::Options => 6,
                Method::Trace => 7,
            }
        }
        method_index(*self).cmp(&method_index(*other))
    }
}

impl PartialOrd for Method {
    fn partial_cmp(&self, other: &Method) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Method {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Method {
    type Error = InvalidMethodError;

    /// Converts the given string reference to a Method, if possible.
    /// The comparison is case insensitive, but superfluous whitespace will
    /// always result in an error.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.len() {
            3 if s.eq_ignore_ascii_case(GET) => Ok(Self::Get),
            3 if s.eq_ignore_ascii_case(PUT) => Ok(Self::Put),
            4 if s.eq_ignore_ascii_case(POST) => Ok(Self::Post),
            5 if s.eq_ignore_ascii_case(PATCH) => Ok(Self::Patch),
            6 if s.eq_ignore_ascii_case(DELETE) => Ok(Self::Delete),
            4 if s.eq_ignore_ascii_case(HEAD) => Ok(Self::Head),
            7 if s.eq_ignore_ascii_case(OPTIONS) => Ok(Self::Options),
            5 if s.eq_ignore_ascii_case(TRACE) => Ok(Self::Trace),
            _ => Err(InvalidMethodError(s.to_owned())),
        }
    }
}

impl TryFrom<&String> for Method {
    type Error = InvalidMethodError;

    fn try_from(s: &String) -> Result<Self, Self::Error> {
        <Method as TryFrom<&str>>::try_from(s.as_ref())
    }
}

impl TryFrom<String> for Method {
    type Error = InvalidMethodError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        <Method as TryFrom<&str>>::try_from(&s)
    }
}

/// Error type returned from `Method::try_from(_: &str)` if the given string
/// does not name a valid method.
#[derive(Debug, Clone)]
pub struct InvalidMethodError(String);
impl Display for InvalidMethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid method: {}", self.0)
    }
}
impl std::error::Error for InvalidMethodError {}
