pub mod define_blocks;
pub mod extends_parent;
pub mod resolve_imports;
pub mod validate;

use crate::node::{Attr, Node, Tag};

/// 取标签上静态属性的文本值（`path="xxx"` 形式）。
/// 属性值含动态内容时返回 None 交由调用方报错。
pub(crate) fn static_attr<'a>(tag: &'a Tag, name: &str) -> Option<&'a str> {
    for attr in &tag.attrs {
        if let Node::Attr(Attr {
            name: attr_name,
            value,
            ..
        }) = attr
            && attr_name == name
        {
            if let [Node::Raw(raw)] = value.as_slice() {
                return Some(&raw.text);
            }
            return None;
        }
    }
    None
}

/// `前缀:名字` 形式的标签名拆分
pub(crate) fn name_suffix<'a>(tag_name: &'a str, prefix: &str) -> Option<&'a str> {
    tag_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .filter(|rest| !rest.is_empty())
}
