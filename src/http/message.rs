//! HTTP message primitives
//!
//! Methods, protocol versions and status codes shared by requests,
//! responses and the wire parser.

use super::{Error, Result};
use std::fmt;

macro_rules! methods {
    ($($name:ident => $token:literal, body: $body:literal;)+) => {
        /// Request methods the dispatcher understands
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum Method {
            #[default]
            $($name,)+
        }

        impl Method {
            /// Every method, in declaration order
            pub const ALL: &'static [Method] = &[$(Method::$name,)+];

            /// Parse a method token, ignoring ASCII case
            ///
            /// Override values such as `delete` arrive lowercased from query
            /// strings, so case is not significant here.
            pub fn from_str(s: &str) -> Result<Self> {
                $(
                    if s.eq_ignore_ascii_case($token) {
                        return Ok(Method::$name);
                    }
                )+
                Err(Error::InvalidMethod(s.to_string()))
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Method::$name => $token,)+
                }
            }

            /// Whether a request with this method may carry a body
            pub fn allows_body(&self) -> bool {
                match self {
                    $(Method::$name => $body,)+
                }
            }
        }
    };
}

// `Get` must stay first: it is the default.
methods! {
    Get => "GET", body: false;
    Head => "HEAD", body: false;
    Post => "POST", body: true;
    Put => "PUT", body: true;
    Delete => "DELETE", body: true;
    Patch => "PATCH", body: true;
    Options => "OPTIONS", body: false;
    Trace => "TRACE", body: false;
    Connect => "CONNECT", body: false;
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five status code classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

/// HTTP status code in the range 100..=599
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

macro_rules! status_codes {
    ($($konst:ident = ($code:literal, $phrase:literal);)+) => {
        impl Status {
            $(
                #[doc = concat!(stringify!($code), " ", $phrase)]
                pub const $konst: Status = Status { code: $code };
            )+

            /// Reason phrase sent on the status line
            ///
            /// Codes without a registered phrase get `"Unknown"`.
            pub fn reason_phrase(&self) -> &'static str {
                match self.code {
                    $($code => $phrase,)+
                    _ => "Unknown",
                }
            }
        }
    };
}

status_codes! {
    CONTINUE = (100, "Continue");
    SWITCHING_PROTOCOLS = (101, "Switching Protocols");
    PROCESSING = (102, "Processing");

    OK = (200, "OK");
    CREATED = (201, "Created");
    ACCEPTED = (202, "Accepted");
    NON_AUTHORITATIVE_INFORMATION = (203, "Non-Authoritative Information");
    NO_CONTENT = (204, "No Content");
    RESET_CONTENT = (205, "Reset Content");
    PARTIAL_CONTENT = (206, "Partial Content");
    MULTI_STATUS = (207, "Multi-Status");

    MULTIPLE_CHOICES = (300, "Multiple Choices");
    MOVED_PERMANENTLY = (301, "Moved Permanently");
    FOUND = (302, "Found");
    SEE_OTHER = (303, "See Other");
    NOT_MODIFIED = (304, "Not Modified");
    USE_PROXY = (305, "Use Proxy");
    TEMPORARY_REDIRECT = (307, "Temporary Redirect");
    PERMANENT_REDIRECT = (308, "Permanent Redirect");

    BAD_REQUEST = (400, "Bad Request");
    UNAUTHORIZED = (401, "Unauthorized");
    PAYMENT_REQUIRED = (402, "Payment Required");
    FORBIDDEN = (403, "Forbidden");
    NOT_FOUND = (404, "Not Found");
    METHOD_NOT_ALLOWED = (405, "Method Not Allowed");
    NOT_ACCEPTABLE = (406, "Not Acceptable");
    PROXY_AUTHENTICATION_REQUIRED = (407, "Proxy Authentication Required");
    REQUEST_TIMEOUT = (408, "Request Timeout");
    CONFLICT = (409, "Conflict");
    GONE = (410, "Gone");
    LENGTH_REQUIRED = (411, "Length Required");
    PRECONDITION_FAILED = (412, "Precondition Failed");
    PAYLOAD_TOO_LARGE = (413, "Payload Too Large");
    URI_TOO_LONG = (414, "URI Too Long");
    UNSUPPORTED_MEDIA_TYPE = (415, "Unsupported Media Type");
    RANGE_NOT_SATISFIABLE = (416, "Range Not Satisfiable");
    EXPECTATION_FAILED = (417, "Expectation Failed");
    UNPROCESSABLE_ENTITY = (422, "Unprocessable Entity");
    LOCKED = (423, "Locked");
    FAILED_DEPENDENCY = (424, "Failed Dependency");
    TOO_MANY_REQUESTS = (429, "Too Many Requests");

    INTERNAL_SERVER_ERROR = (500, "Internal Server Error");
    NOT_IMPLEMENTED = (501, "Not Implemented");
    BAD_GATEWAY = (502, "Bad Gateway");
    SERVICE_UNAVAILABLE = (503, "Service Unavailable");
    GATEWAY_TIMEOUT = (504, "Gateway Timeout");
    HTTP_VERSION_NOT_SUPPORTED = (505, "HTTP Version Not Supported");
    INSUFFICIENT_STORAGE = (507, "Insufficient Storage");
    BANDWIDTH_LIMIT_EXCEEDED = (509, "Bandwidth Limit Exceeded");
}

impl Status {
    /// Any code in 100..=599 is accepted, registered or not
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn class(&self) -> StatusClass {
        match self.code / 100 {
            1 => StatusClass::Informational,
            2 => StatusClass::Success,
            3 => StatusClass::Redirection,
            4 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn is_informational(&self) -> bool {
        self.class() == StatusClass::Informational
    }

    /// Responses with this status never carry a body
    pub fn is_bodiless(&self) -> bool {
        self.is_informational() || *self == Status::NO_CONTENT || *self == Status::NOT_MODIFIED
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}
