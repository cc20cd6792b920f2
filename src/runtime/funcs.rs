use serde_json::Value;
use std::collections::HashMap;

/// 过滤器：纯函数，输入值 + 参数 → 输出值
pub type FilterFn = fn(&Value, &[Value]) -> Result<Value, String>;

/// 函数注册表：模板表达式可用的过滤器集合。
/// 随渲染上下文传入执行器，不依赖任何进程级全局状态。
pub struct FunctionRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FunctionRegistry {
    /// 内置过滤器集合
    pub fn new() -> Self {
        let mut reg = Self {
            filters: HashMap::new(),
        };
        reg.register("upper", filter_upper);
        reg.register("lower", filter_lower);
        reg.register("capitalize", filter_capitalize);
        reg.register("truncate", filter_truncate);
        reg.register("length", filter_length);
        reg.register("default", filter_default);
        reg.register("json", filter_json);
        reg.register("slugify", filter_slugify);
        reg
    }

    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, filter: FilterFn) {
        self.filters.insert(name.into(), filter);
    }

    pub fn has(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn call(&self, name: &str, input: &Value, args: &[Value]) -> Result<Value, String> {
        match self.filters.get(name) {
            Some(filter) => filter(input, args),
            None => Err(format!("未定义的过滤器 '{name}'")),
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 值的文本化：字符串原样，null 为空，复合值序列化为 JSON
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// HTML 转义（含属性值场景的引号）
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn filter_upper(value: &Value, _: &[Value]) -> Result<Value, String> {
    Ok(Value::String(stringify(value).to_uppercase()))
}

fn filter_lower(value: &Value, _: &[Value]) -> Result<Value, String> {
    Ok(Value::String(stringify(value).to_lowercase()))
}

fn filter_capitalize(value: &Value, _: &[Value]) -> Result<Value, String> {
    let s = stringify(value);
    let mut chars = s.chars();
    let out = match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut result = first.to_uppercase().to_string();
            result.extend(chars);
            result
        }
    };
    Ok(Value::String(out))
}

fn filter_truncate(value: &Value, args: &[Value]) -> Result<Value, String> {
    let len = match args.first() {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(160) as usize,
        None => 160,
        Some(other) => return Err(format!("truncate 的长度参数无效: {other}")),
    };
    let s = stringify(value);
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= len {
        return Ok(Value::String(s));
    }
    let mut out: String = chars[..len].iter().collect();
    out.push('\u{2026}');
    Ok(Value::String(out))
}

fn filter_length(value: &Value, _: &[Value]) -> Result<Value, String> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(m) => m.len(),
        Value::Null => 0,
        other => return Err(format!("length 不适用于 {other}")),
    };
    Ok(Value::from(len))
}

fn filter_default(value: &Value, args: &[Value]) -> Result<Value, String> {
    if matches!(value, Value::Null) {
        return Ok(args.first().cloned().unwrap_or(Value::Null));
    }
    Ok(value.clone())
}

fn filter_json(value: &Value, _: &[Value]) -> Result<Value, String> {
    serde_json::to_string(value)
        .map(Value::String)
        .map_err(|e| format!("JSON 序列化失败：{e}"))
}

fn filter_slugify(value: &Value, _: &[Value]) -> Result<Value, String> {
    let out = stringify(value)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_filter_is_error() {
        let reg = FunctionRegistry::new();
        assert!(reg.call("boom", &json!(1), &[]).is_err());
    }

    #[test]
    fn builtin_filters() {
        let reg = FunctionRegistry::new();
        assert_eq!(reg.call("upper", &json!("ab"), &[]).unwrap(), json!("AB"));
        assert_eq!(
            reg.call("capitalize", &json!("ann"), &[]).unwrap(),
            json!("Ann")
        );
        assert_eq!(reg.call("length", &json!([1, 2, 3]), &[]).unwrap(), json!(3));
        assert_eq!(
            reg.call("default", &Value::Null, &[json!("x")]).unwrap(),
            json!("x")
        );
        assert_eq!(
            reg.call("truncate", &json!("abcdef"), &[json!(3)]).unwrap(),
            json!("abc…")
        );
        assert_eq!(
            reg.call("slugify", &json!("Hello World"), &[]).unwrap(),
            json!("hello-world")
        );
    }

    #[test]
    fn escape_covers_attribute_quotes() {
        assert_eq!(html_escape("<a \"'&>"), "&lt;a &quot;&#x27;&amp;&gt;");
    }
}
