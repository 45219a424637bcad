//! 내부 오류 (프로그래머 오류)
//!
//! 사용자 스크립트가 아니라 호스트/VM 코드의 잘못된 사용을 나타냅니다.
//! 런타임 오류(`VmError`)와 구분되어 테스트에서 어떤 범주가 발생했는지 확인할 수 있습니다.

use super::scope::ScopeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    /// Dictionary keys must be strings.
    #[error("unsupported dictionary key of type '{found}'")]
    UnsupportedKey { found: &'static str },

    /// The scope was already freed (or never belonged to this arena).
    #[error("scope {0:?} is no longer alive")]
    DanglingScope(ScopeId),

    /// `pop` was asked to leave the root scope.
    #[error("cannot pop the root scope")]
    DetachedRoot,
}

pub type InternalResult<T> = Result<T, InternalError>;
