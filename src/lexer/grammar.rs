pub mod dynamic;
pub mod html;
pub mod inline;

use super::cursor::Cursor;
use super::token::Token;

/// 可插拔的子文法。每个文法认领一个子语法，
/// 在当前位置不匹配时返回 `None`（由词法器恢复游标）。
pub trait Grammar {
    /// 尝试从当前位置切出一串 token。
    /// 返回 `Some` 时必须至少消费一个字符。
    fn try_parse(&mut self, cur: &mut Cursor) -> Option<Vec<Token>>;
}

/// 标签名、属性名、指令名与注入名共用的关键字字符集
pub(crate) fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}
