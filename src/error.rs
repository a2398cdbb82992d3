//! Structured errors carried by every failure in the crate.
//!
//! An [`Error`] pairs a layer-of-origin [`ErrorDomain`] with a cross-cutting
//! [`ErrorCategory`] useful for decision logic (retry / abort / surface),
//! plus the raw OS code, a message, optional context and an optional shared
//! cause forming an acyclic chain. The fluent [`ErrorBuilder`] is the only
//! construction path.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

use strum::AsRefStr;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
pub enum ErrorDomain {
    None,
    Dns,
    Transport,
    Security,
    Protocol,
    System,
    Hardware,
    Config,
    State,
    Internal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
pub enum ErrorCategory {
    Success,

    Timeout,
    ConnectionRefused,
    HostUnreachable,
    NetworkDown,
    TargetNotFound,
    ResolutionFailed,

    PeerClosed,
    ConnectionReset,
    BrokenPipe,
    Aborted,

    ProtocolViolation,
    PayloadTooLarge,
    UnsupportedVersion,
    DataTruncated,

    AuthFailed,
    CertificateInvalid,
    UntrustedAuthority,

    ResourceExhausted,
    Busy,
    InvalidState,
    InvalidArgument,

    Cancelled,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct Error {
    domain: ErrorDomain,
    category: ErrorCategory,
    code: i32,
    message: String,
    context: Option<String>,
    cause: Option<Arc<Error>>,
}

impl Error {
    pub fn create() -> ErrorBuilder {
        ErrorBuilder::new()
    }

    pub fn dns() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Dns)
    }

    pub fn transport() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Transport)
    }

    pub fn protocol() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Protocol)
    }

    pub fn security() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Security)
    }

    pub fn system() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::System)
    }

    pub fn hardware() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Hardware)
    }

    pub fn config() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Config)
    }

    pub fn state() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::State)
    }

    pub fn internal() -> ErrorBuilder {
        Self::create().domain(ErrorDomain::Internal)
    }

    pub fn domain(&self) -> ErrorDomain {
        self.domain
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// Renders the whole cause chain, outermost error first.
    pub fn format(&self) -> String {
        let mut out = match &self.context {
            Some(ctx) => format!(
                "[{}]<{}>({}): {} [{}]",
                self.domain.as_ref(),
                self.category.as_ref(),
                self.code,
                self.message,
                ctx
            ),
            None => format!(
                "[{}]<{}>({}): {}",
                self.domain.as_ref(),
                self.category.as_ref(),
                self.code,
                self.message
            ),
        };

        if let Some(cause) = &self.cause {
            out.push_str(" | caused by: ");
            out.push_str(&cause.format());
        }

        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.format())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.cause.as_ref().map(|c| &**c as &(dyn error::Error + 'static))
    }
}

#[derive(Clone, Debug)]
pub struct ErrorBuilder {
    domain: ErrorDomain,
    category: ErrorCategory,
    code: i32,
    message: String,
    context: Option<String>,
    cause: Option<Arc<Error>>,
}

impl ErrorBuilder {
    fn new() -> ErrorBuilder {
        ErrorBuilder {
            domain: ErrorDomain::None,
            category: ErrorCategory::Unknown,
            code: 0,
            message: String::new(),
            context: None,
            cause: None,
        }
    }

    pub fn domain(mut self, domain: ErrorDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Chains `cause` underneath the error being built.
    pub fn wrap(mut self, cause: Error) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn timeout(self) -> Self {
        self.category(ErrorCategory::Timeout)
    }

    pub fn peer_closed(self) -> Self {
        self.category(ErrorCategory::PeerClosed)
    }

    pub fn target_not_found(self) -> Self {
        self.category(ErrorCategory::TargetNotFound)
    }

    pub fn resource_exhausted(self) -> Self {
        self.category(ErrorCategory::ResourceExhausted)
    }

    pub fn invalid_state(self) -> Self {
        self.category(ErrorCategory::InvalidState)
    }

    pub fn invalid_argument(self) -> Self {
        self.category(ErrorCategory::InvalidArgument)
    }

    pub fn protocol_violation(self) -> Self {
        self.category(ErrorCategory::ProtocolViolation)
    }

    /// Absorbs an OS error: code, normative category mapping, and the system
    /// message.
    pub fn from_io(self, err: &io::Error) -> Self {
        let code = err.raw_os_error().unwrap_or(0);
        self.code(code)
            .category(category_from_errno(code))
            .message(err.to_string())
    }

    pub fn build(self) -> Error {
        Error {
            domain: self.domain,
            category: self.category,
            code: self.code,
            message: if self.message.is_empty() {
                "unknown error".to_owned()
            } else {
                self.message
            },
            context: self.context,
            cause: self.cause,
        }
    }
}

/// Normative errno → category mapping.
pub fn category_from_errno(err_no: i32) -> ErrorCategory {
    match err_no {
        libc::ETIMEDOUT => ErrorCategory::Timeout,
        libc::ECONNREFUSED => ErrorCategory::ConnectionRefused,
        libc::ENETUNREACH | libc::EHOSTUNREACH => ErrorCategory::HostUnreachable,
        libc::ENETDOWN => ErrorCategory::NetworkDown,
        libc::EPIPE => ErrorCategory::BrokenPipe,
        libc::ECONNRESET => ErrorCategory::ConnectionReset,
        libc::ECONNABORTED => ErrorCategory::Aborted,
        libc::EMFILE | libc::ENFILE | libc::ENOMEM => ErrorCategory::ResourceExhausted,
        libc::EINVAL => ErrorCategory::InvalidArgument,
        libc::EAGAIN => ErrorCategory::Busy,
        _ => ErrorCategory::Unknown,
    }
}

/// Normative getaddrinfo result → category mapping.
pub fn category_from_gai(gai_err: i32) -> ErrorCategory {
    match gai_err {
        libc::EAI_NONAME => ErrorCategory::TargetNotFound,
        libc::EAI_AGAIN => ErrorCategory::Busy,
        libc::EAI_FAIL => ErrorCategory::ResolutionFailed,
        libc::EAI_MEMORY => ErrorCategory::ResourceExhausted,
        _ => ErrorCategory::Unknown,
    }
}
