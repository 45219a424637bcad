//! VM 유틸리티 함수
//!
//! Literal 표시, 타입 이름, 동등성 비교, 참/거짓 판정 등 VM과 컴파일러에서 공통으로 사용되는 헬퍼 함수들을 제공합니다.

use super::bytecode::Literal;
use std::rc::Rc;

/// Literal을 `print`가 출력하는 문자열로 변환
///
/// # Examples
///
/// ```ignore
/// display_literal(&Literal::Number(5.0))  // → "5"
/// display_literal(&Literal::Bool(true))   // → "true"
/// display_literal(&Literal::Nil)          // → "null"
/// ```
pub fn display_literal(v: &Literal) -> String {
    match v {
        Literal::Nil => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) => n.to_string(),
        Literal::String(s) => s.clone(),
        Literal::Array(items) => {
            let contents: Vec<String> = items.iter().map(display_literal).collect();
            format!("[{}]", contents.join(", "))
        }
        Literal::Dictionary(dict) => {
            let contents: Vec<String> = dict
                .iter()
                .map(|(k, v)| format!("{}: {}", display_literal(k), display_literal(v)))
                .collect();
            format!("[{}]", contents.join(", "))
        }
        Literal::Function(_) => "<function>".to_string(),
        Literal::Event(e) => format!("<event {}>", e.name),
    }
}

/// Literal의 타입 이름 반환 (오류 메시지용)
pub fn type_name(v: &Literal) -> &'static str {
    match v {
        Literal::Nil => "null",
        Literal::Bool(_) => "bool",
        Literal::Number(_) => "number",
        Literal::String(_) => "string",
        Literal::Array(_) => "array",
        Literal::Dictionary(_) => "dictionary",
        Literal::Function(_) => "function",
        Literal::Event(_) => "event",
    }
}

/// 구조적 동등성 비교
///
/// 함수는 같은 인스턴스일 때만 같습니다.
pub fn literals_equal(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        (Literal::Nil, Literal::Nil) => true,
        (Literal::Bool(x), Literal::Bool(y)) => x == y,
        (Literal::Number(x), Literal::Number(y)) => x == y,
        (Literal::String(x), Literal::String(y)) => x == y,
        (Literal::Array(x), Literal::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| literals_equal(l, r))
        }
        (Literal::Dictionary(x), Literal::Dictionary(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| matches!(y.get(k), Ok(Some(other)) if literals_equal(v, other)))
        }
        (Literal::Function(x), Literal::Function(y)) => Rc::ptr_eq(x, y),
        (Literal::Event(x), Literal::Event(y)) => x == y,
        _ => false,
    }
}

/// `null`, `false`, `0` 만 거짓
pub fn is_truthy(v: &Literal) -> bool {
    match v {
        Literal::Nil => false,
        Literal::Bool(b) => *b,
        Literal::Number(n) => *n != 0.0,
        _ => true,
    }
}
